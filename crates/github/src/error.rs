//! Error type for GitHub API calls.
//!
//! There is deliberately no retryable/non-retryable split: every failed
//! remote call aborts the run, and the raw message is surfaced to the
//! operator unchanged.

use thiserror::Error;

/// Errors produced by [`crate::GithubClient`].
#[derive(Debug, Error)]
pub enum GithubError {
    /// The access token cannot be encoded as an `Authorization` header.
    #[error("access token is not a valid Authorization header value")]
    InvalidToken,

    /// Transport-level failure (connection, timeout, body decode).
    #[error("GitHub request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The REST API returned a non-success status.
    #[error("GitHub API returned {status}: {body}")]
    Api {
        /// HTTP status code.
        status: reqwest::StatusCode,
        /// Raw response body, surfaced verbatim.
        body: String,
    },

    /// The GraphQL endpoint returned one or more errors.
    #[error("GitHub GraphQL error: {message}")]
    Graphql {
        /// Joined error messages from the response's `errors` array.
        message: String,
    },

    /// A response parsed, but the data we need was absent.
    ///
    /// Typically wrong project number or insufficient token permissions.
    #[error("GitHub response missing {what}")]
    MissingData {
        /// Description of the missing piece.
        what: &'static str,
    },
}
