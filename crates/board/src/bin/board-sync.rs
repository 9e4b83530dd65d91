//! board-sync - attach the triggering PR/issue to a project board and
//! stamp its status, milestone, and effort fields.
//!
//! Designed to run inside a GitHub Actions job: every input is read from
//! the environment (see `--help`), the event payload comes from
//! `GITHUB_EVENT_PATH`, and a failure emits an `::error::` workflow
//! annotation before exiting nonzero. Draft pull requests are a
//! successful no-op.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use github::GithubClient;
use tracing::info;

use board::config::{Cli, SyncConfig};
use board::event::TriggerEvent;
use board::run::{run, RunOutcome};

async fn execute() -> Result<()> {
    let cli = Cli::parse();

    let config = SyncConfig::from_cli(&cli).context("Invalid configuration")?;
    let event =
        TriggerEvent::from_path(&cli.event_path).context("Failed to load trigger event")?;
    let client = GithubClient::with_endpoints(&cli.token, &cli.api_url, &cli.graphql_url)
        .context("Failed to build GitHub client")?;

    match run(&config, &event, &client, Utc::now()).await? {
        RunOutcome::Completed { item_id } => {
            info!(item_id = %item_id, "Board sync complete");
        }
        RunOutcome::SkippedDraft => {
            info!("Draft pull request; nothing to do");
        }
    }

    Ok(())
}

/// Render the Actions failure annotation: one line, full context chain.
fn failure_annotation(error: &anyhow::Error) -> String {
    format!("::error::{error:#}")
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    if let Err(error) = execute().await {
        // Marks the Actions run failed with the message surfaced verbatim.
        // Exiting here keeps this the only place the failure is reported.
        println!("{}", failure_annotation(&error));
        std::process::exit(1);
    }
}
