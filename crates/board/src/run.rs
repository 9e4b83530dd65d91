//! The run orchestrator.
//!
//! One sequential pass per invocation: read the project schema, resolve
//! the status targets and milestones, short-circuit on draft PRs, attach
//! the item, assign the PR author, estimate effort, and issue exactly one
//! field-write mutation. Every failure propagates up unchanged; there is
//! no retry and no rollback of already-applied mutations.

use chrono::{DateTime, NaiveDate, Utc};
use github::{FieldValue, GithubClient, GithubError, ProjectSchema};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::effort;
use crate::event::{PullRequestEvent, TriggerEvent};

/// How a run ended without an error.
#[derive(Debug)]
pub enum RunOutcome {
    /// The item was attached and its fields were written.
    Completed {
        /// Project-item id created by the attach mutation.
        item_id: String,
    },
    /// The trigger was a draft PR; nothing was attached or mutated.
    SkippedDraft,
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A remote call failed; the raw message is surfaced verbatim.
    #[error(transparent)]
    Github(#[from] GithubError),

    /// A configured field name matched nothing on the board.
    #[error("project has no field named '{name}'")]
    MissingField {
        /// Configured field name.
        name: String,
    },

    /// A status target substring matched no option.
    #[error("status field '{field}' has no option matching '{target}'")]
    StatusTargetUnmatched {
        /// Status field name.
        field: String,
        /// Configured target substring.
        target: String,
    },

    /// The chosen effort bucket matched no option on the effort field.
    #[error("effort field '{field}' has no option matching '{bucket}'")]
    EffortOptionUnmatched {
        /// Effort field name.
        field: String,
        /// Bucket name that failed to match.
        bucket: String,
    },

    /// Elapsed working days exceed every configured bucket.
    #[error("no effort bucket covers {days} elapsed working days")]
    EffortOutOfRange {
        /// Elapsed working days since the earliest commit.
        days: i64,
    },

    /// The field-write mutation failed after the item was attached. The
    /// item stays on the board with no fields set; no cleanup is
    /// attempted.
    #[error("field write failed for attached item {item_id}: {source}")]
    FieldWrite {
        /// The already-attached project-item id, for manual follow-up.
        item_id: String,
        /// Underlying API error.
        source: GithubError,
    },
}

/// A resolved effort selection, kept for the PR comment.
struct EffortSelection {
    value: FieldValue,
    option_name: String,
    days: i64,
}

/// Resolve a milestone field to the iteration containing `today`.
///
/// Milestones are best-effort: an absent field or a gap between
/// iterations leaves the milestone unset rather than failing the run.
fn resolve_milestone(schema: &ProjectSchema, name: &str, today: NaiveDate) -> Option<FieldValue> {
    let Some(field) = schema.field(name) else {
        info!(field = name, "milestone field not found; leaving unset");
        return None;
    };
    match field.current_iteration(today) {
        Some(iteration) => Some(FieldValue {
            field_id: field.id.clone(),
            value_id: iteration.id.clone(),
        }),
        None => {
            info!(
                field = name,
                %today,
                "no iteration covers today; leaving milestone unset"
            );
            None
        }
    }
}

/// Execute one run.
///
/// `now` is passed in explicitly so milestone and effort decisions are
/// reproducible under test.
///
/// # Errors
///
/// Any configuration mismatch or failed remote call aborts the run; see
/// [`SyncError`].
pub async fn run(
    config: &SyncConfig,
    event: &TriggerEvent,
    client: &GithubClient,
    now: DateTime<Utc>,
) -> Result<RunOutcome, SyncError> {
    let schema = client
        .project_schema(&config.owner, config.project_number)
        .await?;
    info!(
        owner = %config.owner,
        project = config.project_number,
        fields = schema.fields.len(),
        "Read project schema"
    );

    let status_field = schema
        .field(&config.status_field)
        .ok_or_else(|| SyncError::MissingField {
            name: config.status_field.clone(),
        })?;
    // Both targets are validated up front regardless of event type, so a
    // misconfigured target surfaces on the first run of either kind.
    let pr_status =
        status_field
            .option_matching(&config.pr_status_value)
            .ok_or_else(|| SyncError::StatusTargetUnmatched {
                field: config.status_field.clone(),
                target: config.pr_status_value.clone(),
            })?;
    let issue_status = status_field
        .option_matching(&config.issue_status_value)
        .ok_or_else(|| SyncError::StatusTargetUnmatched {
            field: config.status_field.clone(),
            target: config.issue_status_value.clone(),
        })?;

    let today = now.date_naive();
    let monthly = resolve_milestone(&schema, &config.monthly_milestone_field, today);
    let quarterly = resolve_milestone(&schema, &config.quarterly_milestone_field, today);

    if let TriggerEvent::PullRequest(pr) = event {
        if pr.draft {
            info!(number = pr.number, "Draft pull request; skipping board sync");
            return Ok(RunOutcome::SkippedDraft);
        }
    }

    let node_id = match event {
        TriggerEvent::PullRequest(pr) => {
            client
                .pull_request_node_id(&config.repo_owner, &config.repo, pr.number)
                .await?
        }
        TriggerEvent::Issue(issue) => {
            client
                .issue_node_id(&config.repo_owner, &config.repo, issue.number)
                .await?
        }
    };

    let item_id = client
        .add_item_to_project(&schema.project_id, &node_id)
        .await?;
    info!(item_id = %item_id, "Attached item to project");

    match event {
        TriggerEvent::Issue(issue) => {
            let status = FieldValue {
                field_id: status_field.id.clone(),
                value_id: issue_status.id.clone(),
            };
            client
                .update_issue_status(&schema.project_id, &item_id, &status)
                .await
                .map_err(|source| SyncError::FieldWrite {
                    item_id: item_id.clone(),
                    source,
                })?;
            info!(number = issue.number, status = %issue_status.name, "Set issue status");
        }
        TriggerEvent::PullRequest(pr) => {
            let assignee = client.user_node_id(&pr.author).await?;
            client.add_assignee(&node_id, &assignee).await?;
            info!(author = %pr.author, "Assigned PR author");

            let effort = if config.include_effort {
                Some(estimate_effort(config, pr, client, &schema, now).await?)
            } else {
                None
            };

            let status = FieldValue {
                field_id: status_field.id.clone(),
                value_id: pr_status.id.clone(),
            };
            client
                .update_pull_request_fields(
                    &schema.project_id,
                    &item_id,
                    &status,
                    monthly.as_ref(),
                    quarterly.as_ref(),
                    effort.as_ref().map(|e| &e.value),
                )
                .await
                .map_err(|source| SyncError::FieldWrite {
                    item_id: item_id.clone(),
                    source,
                })?;
            info!(
                number = pr.number,
                status = %pr_status.name,
                monthly = monthly.is_some(),
                quarterly = quarterly.is_some(),
                effort = effort.is_some(),
                "Set pull request fields"
            );

            if let Some(selection) = effort {
                let body = format!(
                    "Estimated effort: **{}** ({} working days since the first commit).\n\n\
                     Mapping: {}",
                    selection.option_name,
                    selection.days,
                    config.effort_buckets.describe()
                );
                if let Err(error) = client
                    .post_comment(&config.repo_owner, &config.repo, pr.number, &body)
                    .await
                {
                    // Fields are already written; the comment is the last
                    // step, so surface the failure without unwinding.
                    warn!(error = %error, "Failed to post effort comment");
                    return Err(error.into());
                }
            }
        }
    }

    Ok(RunOutcome::Completed { item_id })
}

/// Estimate effort for a non-draft PR and resolve it to a field option.
async fn estimate_effort(
    config: &SyncConfig,
    pr: &PullRequestEvent,
    client: &GithubClient,
    schema: &ProjectSchema,
    now: DateTime<Utc>,
) -> Result<EffortSelection, SyncError> {
    let dates = client
        .pull_request_commit_dates(&config.repo_owner, &config.repo, pr.number)
        .await?;
    let started = effort::earliest(&dates, now);
    let days = effort::working_days_since(started, now);

    let bucket = config
        .effort_buckets
        .bucket_for(days)
        .ok_or(SyncError::EffortOutOfRange { days })?;

    let field = schema
        .field(&config.effort_field)
        .ok_or_else(|| SyncError::MissingField {
            name: config.effort_field.clone(),
        })?;
    let option =
        field
            .option_matching(&bucket.name)
            .ok_or_else(|| SyncError::EffortOptionUnmatched {
                field: config.effort_field.clone(),
                bucket: bucket.name.clone(),
            })?;

    info!(
        number = pr.number,
        days,
        bucket = %bucket.name,
        option = %option.name,
        "Estimated effort"
    );

    Ok(EffortSelection {
        value: FieldValue {
            field_id: field.id.clone(),
            value_id: option.id.clone(),
        },
        option_name: option.name.clone(),
        days,
    })
}
