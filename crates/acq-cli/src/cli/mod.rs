//! CLI for acq.

mod commands;
mod docker;
mod gh;
mod process;

use acq_core::config;
use acq_core::control::CancelToken;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use commands::{run_fetch, run_limit, run_pull, FetchArgs};

/// Top-level CLI for acq.
#[derive(Debug, Parser)]
#[command(name = "acq")]
#[command(about = "acq: deduplicated image pulls and bounded batch artifact downloads", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Make container images available locally, pulling each missing one exactly once.
    Pull {
        /// Image references (e.g. ghcr.io/org/tool:1.2).
        #[arg(required = true)]
        images: Vec<String>,

        /// Block until started pulls finish instead of printing a retry hint.
        #[arg(long)]
        wait: bool,

        /// Give up after this many seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Download artifacts for a set of workflow runs concurrently.
    Fetch {
        /// Workflow run IDs.
        #[arg(required = true)]
        run_ids: Vec<String>,

        /// Parent directory for run-<id> folders (default: config download_dir, else cwd).
        #[arg(long, value_name = "DIR")]
        dest: Option<PathBuf>,

        /// Number of successful runs you need; all runs are still processed.
        #[arg(long, value_name = "N")]
        max: Option<usize>,

        /// Only download artifacts with this name (repeatable).
        #[arg(long = "artifact", value_name = "NAME")]
        artifacts: Vec<String>,

        /// Log every run as it is processed.
        #[arg(short, long)]
        verbose: bool,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,

        /// Give up after this many seconds; unfinished runs are reported skipped.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Show the effective download concurrency.
    Limit,
}

/// Token cancelled by Ctrl-C, and by `timeout` if given.
fn cancel_token(timeout: Option<u64>) -> CancelToken {
    let token = match timeout {
        Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
        None => CancelToken::new(),
    };
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling");
            on_signal.cancel();
        }
    });
    token
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Pull {
                images,
                wait,
                timeout,
            } => run_pull(&cfg, images, wait, cancel_token(timeout)).await?,
            CliCommand::Fetch {
                run_ids,
                dest,
                max,
                artifacts,
                verbose,
                json,
                timeout,
            } => {
                let dest = match dest.or_else(|| cfg.download_dir.clone()) {
                    Some(d) => d,
                    None => std::env::current_dir()?,
                };
                let args = FetchArgs {
                    run_ids,
                    dest,
                    max,
                    artifacts,
                    verbose,
                    json,
                };
                run_fetch(&cfg, args, cancel_token(timeout)).await?
            }
            CliCommand::Limit => run_limit(&cfg),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
