//! Trigger event parsing.
//!
//! The Actions runtime writes the webhook payload to the file named by
//! `GITHUB_EVENT_PATH`. Exactly one of two shapes is expected: a payload
//! with a `pull_request` object or one with an `issue` object. Anything
//! else means the workflow is wired to an event this tool does not
//! handle, which is a configuration error, not a transient failure.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Problems reading or recognizing the event payload.
#[derive(Debug, Error)]
pub enum EventError {
    /// The payload file could not be read.
    #[error("failed to read event payload: {0}")]
    Read(#[from] std::io::Error),

    /// The payload file is not valid JSON.
    #[error("failed to parse event payload: {0}")]
    Parse(#[from] serde_json::Error),

    /// The payload carries neither a pull request nor an issue.
    #[error("event payload contains neither a pull request nor an issue")]
    UnrecognizedPayload,
}

/// A pull-request trigger.
#[derive(Debug, Clone)]
pub struct PullRequestEvent {
    /// PR number.
    pub number: u64,
    /// Login of the PR author, assigned to the PR during the run.
    pub author: String,
    /// Draft PRs short-circuit the run.
    pub draft: bool,
}

/// An issue trigger.
#[derive(Debug, Clone)]
pub struct IssueEvent {
    /// Issue number.
    pub number: u64,
}

/// The event that started this run.
#[derive(Debug, Clone)]
pub enum TriggerEvent {
    /// A pull-request event.
    PullRequest(PullRequestEvent),
    /// An issue event.
    Issue(IssueEvent),
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    pull_request: Option<RawPullRequest>,
    issue: Option<RawIssue>,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    #[serde(default)]
    draft: bool,
    user: RawUser,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: u64,
}

impl TriggerEvent {
    /// Parse a payload document. Pull requests take precedence when a
    /// payload somehow carries both shapes.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON or an unrecognized payload.
    pub fn from_json(payload: &str) -> Result<Self, EventError> {
        let raw: RawPayload = serde_json::from_str(payload)?;

        if let Some(pr) = raw.pull_request {
            return Ok(Self::PullRequest(PullRequestEvent {
                number: pr.number,
                author: pr.user.login,
                draft: pr.draft,
            }));
        }
        if let Some(issue) = raw.issue {
            return Ok(Self::Issue(IssueEvent {
                number: issue.number,
            }));
        }
        Err(EventError::UnrecognizedPayload)
    }

    /// Read and parse the payload file the Actions runtime provides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, EventError> {
        let payload = std::fs::read_to_string(path)?;
        Self::from_json(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pull_request_payload() {
        let payload = r#"{
            "action": "opened",
            "pull_request": {
                "number": 42,
                "draft": false,
                "user": { "login": "octocat" }
            }
        }"#;

        let TriggerEvent::PullRequest(pr) = TriggerEvent::from_json(payload).unwrap() else {
            panic!("expected a pull request event");
        };
        assert_eq!(pr.number, 42);
        assert_eq!(pr.author, "octocat");
        assert!(!pr.draft);
    }

    #[test]
    fn parses_draft_flag() {
        let payload = r#"{
            "pull_request": {
                "number": 7,
                "draft": true,
                "user": { "login": "octocat" }
            }
        }"#;

        let TriggerEvent::PullRequest(pr) = TriggerEvent::from_json(payload).unwrap() else {
            panic!("expected a pull request event");
        };
        assert!(pr.draft);
    }

    #[test]
    fn parses_issue_payload() {
        let payload = r#"{
            "action": "opened",
            "issue": { "number": 9, "title": "Something broke" }
        }"#;

        let TriggerEvent::Issue(issue) = TriggerEvent::from_json(payload).unwrap() else {
            panic!("expected an issue event");
        };
        assert_eq!(issue.number, 9);
    }

    #[test]
    fn rejects_unrecognized_payload() {
        let payload = r#"{ "action": "published", "release": { "tag_name": "v1.0" } }"#;
        assert!(matches!(
            TriggerEvent::from_json(payload).unwrap_err(),
            EventError::UnrecognizedPayload
        ));
    }
}
