//! Run configuration.
//!
//! GitHub Actions supplies every input as an environment variable; the
//! same inputs are accepted as flags for local runs. The JSON effort
//! mapping is parsed once at load time into an ordered bucket list and
//! validated before any network call is made.

use std::path::PathBuf;

use clap::Parser;
use serde_json::Value;
use thiserror::Error;

/// Command-line / environment inputs.
#[derive(Debug, Parser)]
#[command(name = "board-sync")]
#[command(about = "Attach the triggering PR/issue to a project board and stamp its fields")]
#[command(version)]
pub struct Cli {
    /// GitHub token with project and repo scope
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Project number as seen in the board URL
    #[arg(long, env = "PROJECT_NUMBER")]
    pub project_number: u64,

    /// Organization owning the project board (defaults to the repository owner)
    #[arg(long, env = "PROJECT_OWNER")]
    pub owner: Option<String>,

    /// Name of the status field
    #[arg(long, env = "STATUS_FIELD", default_value = "status")]
    pub status_field: String,

    /// Status value substring to set for pull requests
    #[arg(long, env = "PR_STATUS_VALUE", default_value = "in progress")]
    pub pr_status_value: String,

    /// Status value substring to set for issues
    #[arg(long, env = "ISSUE_STATUS_VALUE", default_value = "todo")]
    pub issue_status_value: String,

    /// Whether to estimate and set effort on pull requests
    #[arg(
        long,
        env = "INCLUDE_EFFORT",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub include_effort: bool,

    /// Name of the effort field
    #[arg(long, env = "EFFORT_FIELD", default_value = "effort")]
    pub effort_field: String,

    /// JSON object mapping effort bucket name to working-day threshold,
    /// in ascending order
    #[arg(
        long,
        env = "EFFORT_MAPPING",
        default_value = r#"{"two days": 2, "workweek": 5}"#
    )]
    pub effort_mapping: String,

    /// Name of the monthly milestone (iteration) field
    #[arg(long, env = "MONTHLY_MILESTONE_FIELD", default_value = "monthly milestone")]
    pub monthly_milestone_field: String,

    /// Name of the quarterly milestone (iteration) field
    #[arg(
        long,
        env = "QUARTERLY_MILESTONE_FIELD",
        default_value = "quarterly milestone"
    )]
    pub quarterly_milestone_field: String,

    /// Repository in `owner/name` form
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repository: String,

    /// Path to the Actions event payload file
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    pub event_path: PathBuf,

    /// REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    pub api_url: String,

    /// GraphQL endpoint URL
    #[arg(
        long,
        env = "GITHUB_GRAPHQL_URL",
        default_value = "https://api.github.com/graphql"
    )]
    pub graphql_url: String,
}

/// Configuration problems, all fatal before the run starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The effort mapping input is not a JSON object.
    #[error("effort mapping is not a JSON object: {0}")]
    MappingSyntax(#[from] serde_json::Error),

    /// A threshold is missing, zero, negative, or not a whole number.
    #[error("effort mapping entry '{name}' must be a positive whole number of days")]
    InvalidThreshold {
        /// Bucket name of the offending entry.
        name: String,
    },

    /// Thresholds must be strictly increasing in mapping order.
    #[error("effort mapping entry '{name}' must exceed the preceding threshold")]
    NonMonotonicThreshold {
        /// Bucket name of the offending entry.
        name: String,
    },

    /// `GITHUB_REPOSITORY` was not `owner/name`.
    #[error("repository must be in 'owner/name' form, got '{value}'")]
    InvalidRepository {
        /// The malformed input.
        value: String,
    },
}

/// One effort bucket: elapsed working days strictly below `max_days`
/// fall into this bucket (unless an earlier bucket claimed them).
#[derive(Debug, Clone)]
pub struct EffortBucket {
    /// Bucket name, matched against effort field options by substring.
    pub name: String,
    /// Exclusive upper bound in working days.
    pub max_days: u64,
}

/// Ordered effort buckets, validated at load time.
#[derive(Debug, Clone)]
pub struct EffortBuckets {
    buckets: Vec<EffortBucket>,
}

impl EffortBuckets {
    /// Parse the JSON mapping input, preserving the caller's key order.
    ///
    /// # Errors
    ///
    /// Rejects non-object JSON, non-positive or non-integer thresholds,
    /// and thresholds that do not strictly increase.
    pub fn from_json(mapping: &str) -> Result<Self, ConfigError> {
        let entries: serde_json::Map<String, Value> = serde_json::from_str(mapping)?;

        let mut buckets = Vec::with_capacity(entries.len());
        let mut previous: Option<u64> = None;
        for (name, value) in entries {
            let max_days = value
                .as_u64()
                .filter(|days| *days > 0)
                .ok_or_else(|| ConfigError::InvalidThreshold { name: name.clone() })?;
            if previous.is_some_and(|prev| max_days <= prev) {
                return Err(ConfigError::NonMonotonicThreshold { name });
            }
            previous = Some(max_days);
            buckets.push(EffortBucket { name, max_days });
        }

        Ok(Self { buckets })
    }

    /// First bucket whose threshold strictly exceeds `days`, in mapping
    /// order. `None` means the elapsed time is beyond every bucket (or
    /// the mapping is empty), which the caller treats as fatal.
    #[must_use]
    pub fn bucket_for(&self, days: i64) -> Option<&EffortBucket> {
        self.buckets
            .iter()
            .find(|bucket| days < i64::try_from(bucket.max_days).unwrap_or(i64::MAX))
    }

    /// Human-readable mapping summary for the PR comment.
    #[must_use]
    pub fn describe(&self) -> String {
        self.buckets
            .iter()
            .map(|bucket| format!("{} (< {} working days)", bucket.name, bucket.max_days))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Validated run configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Organization the project board belongs to.
    pub owner: String,
    /// Repository owner (event source; may differ from `owner`).
    pub repo_owner: String,
    /// Repository name.
    pub repo: String,
    /// Project number as seen in the board URL.
    pub project_number: u64,
    /// Status field name.
    pub status_field: String,
    /// Status target substring for pull requests.
    pub pr_status_value: String,
    /// Status target substring for issues.
    pub issue_status_value: String,
    /// Whether effort estimation is enabled.
    pub include_effort: bool,
    /// Effort field name.
    pub effort_field: String,
    /// Ordered effort buckets.
    pub effort_buckets: EffortBuckets,
    /// Monthly milestone field name.
    pub monthly_milestone_field: String,
    /// Quarterly milestone field name.
    pub quarterly_milestone_field: String,
}

impl SyncConfig {
    /// Validate raw inputs into a run configuration.
    ///
    /// # Errors
    ///
    /// Returns the first configuration problem found; nothing has touched
    /// the network at this point.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let (repo_owner, repo) =
            cli.repository
                .split_once('/')
                .ok_or_else(|| ConfigError::InvalidRepository {
                    value: cli.repository.clone(),
                })?;
        if repo_owner.is_empty() || repo.is_empty() {
            return Err(ConfigError::InvalidRepository {
                value: cli.repository.clone(),
            });
        }

        Ok(Self {
            owner: cli.owner.clone().unwrap_or_else(|| repo_owner.to_string()),
            repo_owner: repo_owner.to_string(),
            repo: repo.to_string(),
            project_number: cli.project_number,
            status_field: cli.status_field.clone(),
            pr_status_value: cli.pr_status_value.clone(),
            issue_status_value: cli.issue_status_value.clone(),
            include_effort: cli.include_effort,
            effort_field: cli.effort_field.clone(),
            effort_buckets: EffortBuckets::from_json(&cli.effort_mapping)?,
            monthly_milestone_field: cli.monthly_milestone_field.clone(),
            quarterly_milestone_field: cli.quarterly_milestone_field.clone(),
        })
    }
}
