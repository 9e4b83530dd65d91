//! Typed GitHub client for ProjectV2 board automation.
//!
//! This crate provides:
//! - A REST + GraphQL client bound to one token ([`GithubClient`])
//! - Project board schema types and their resolution rules ([`types`])
//! - PR/issue/user node-id lookups and board mutations
//!
//! All calls are one-shot: any transport or API error aborts the caller's
//! run, and no retry classification is attempted.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Every async API method can fail the same way

pub mod client;
pub mod error;
pub mod types;

pub use client::GithubClient;
pub use error::GithubError;
pub use types::{FieldOption, FieldValue, Iteration, ProjectField, ProjectSchema};
