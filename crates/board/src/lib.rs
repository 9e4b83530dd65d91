//! Project board sync for PR/issue events.
//!
//! This crate provides:
//! - Run configuration from Actions inputs, with an ordered, validated
//!   effort-bucket mapping
//! - Trigger event parsing (`pull_request` / `issues` payloads)
//! - Working-day effort estimation from commit history
//! - The sequential run orchestrator
//!
//! The `board-sync` binary under `src/bin/` wires these together.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod effort;
pub mod event;
pub mod run;

pub use config::{Cli, ConfigError, EffortBucket, EffortBuckets, SyncConfig};
pub use event::{EventError, IssueEvent, PullRequestEvent, TriggerEvent};
pub use run::{run, RunOutcome, SyncError};
