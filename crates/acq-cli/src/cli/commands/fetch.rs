//! `acq fetch` – download artifacts for many workflow runs concurrently.

use acq_core::batch::{
    select_qualifying, BatchFetcher, FetchJob, FetchOptions, FetchOutcome, FetchResult,
    FetchSummary,
};
use acq_core::config::AcqConfig;
use acq_core::control::CancelToken;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::gh::GhRunFetcher;

#[derive(Debug)]
pub struct FetchArgs {
    pub run_ids: Vec<String>,
    pub dest: PathBuf,
    pub max: Option<usize>,
    pub artifacts: Vec<String>,
    pub verbose: bool,
    pub json: bool,
}

/// One output row for `--json`.
#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    run_id: &'a str,
    path: String,
    outcome: &'static str,
    skipped: bool,
    cached: bool,
    error: Option<String>,
}

impl<'a> From<&'a FetchResult> for ResultRow<'a> {
    fn from(r: &'a FetchResult) -> Self {
        Self {
            run_id: r.job().id.as_str(),
            path: r.path().display().to_string(),
            outcome: outcome_label(r.outcome()),
            skipped: r.is_skipped(),
            cached: r.is_cached(),
            error: r.error().map(|e| e.to_string()),
        }
    }
}

fn outcome_label(outcome: FetchOutcome) -> &'static str {
    match outcome {
        FetchOutcome::Skipped => "skipped",
        FetchOutcome::Cached => "cached",
        FetchOutcome::Succeeded => "downloaded",
        FetchOutcome::Failed => "failed",
    }
}

pub async fn run_fetch(cfg: &AcqConfig, args: FetchArgs, token: CancelToken) -> Result<()> {
    let limit = cfg.resolve_limit();
    tracing::debug!(limit = limit.value, source = ?limit.source, "resolved download concurrency");

    let fetcher = Arc::new(GhRunFetcher::new(cfg.cancel_poll_interval()));
    let batch = BatchFetcher::new(fetcher, limit.value);
    let options = FetchOptions {
        dest_dir: args.dest,
        verbose: args.verbose,
        max_needed: args.max,
        artifact_filter: args.artifacts,
    };
    let jobs: Vec<FetchJob> = args.run_ids.into_iter().map(FetchJob::new).collect();

    let results = {
        let options = options.clone();
        tokio::task::spawn_blocking(move || batch.fetch_all(&token, jobs, &options))
            .await
            .context("fetch task join")?
    };
    let summary = FetchSummary::from_results(&results);

    if args.json {
        let rows: Vec<ResultRow<'_>> = results.iter().map(ResultRow::from).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for r in &results {
            match r.error() {
                Some(e) => println!(
                    "run {:<12} {:<10} {}",
                    r.job().id,
                    outcome_label(r.outcome()),
                    e
                ),
                None => println!(
                    "run {:<12} {:<10} {}",
                    r.job().id,
                    outcome_label(r.outcome()),
                    r.path().display()
                ),
            }
        }
        println!("{}", summary);
        if let Some(max) = options.max_needed {
            let picked = select_qualifying(&results, Some(max));
            println!("{} of {} requested run(s) available", picked.len(), max);
        }
    }

    if summary.skipped > 0 {
        anyhow::bail!("interrupted: {} run(s) not attempted", summary.skipped);
    }
    if summary.failed == summary.total {
        anyhow::bail!("all {} run(s) failed", summary.total);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use acq_core::control::Cancelled;

    #[test]
    fn json_row_for_skipped_result() {
        let r = FetchResult::skipped(
            FetchJob::new("9"),
            PathBuf::from("/d/run-9"),
            Cancelled::Canceled,
        );
        let json = serde_json::to_value(ResultRow::from(&r)).unwrap();
        assert_eq!(json["run_id"], "9");
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["skipped"], true);
        assert_eq!(json["cached"], false);
        assert_eq!(json["error"], "operation canceled");
    }

    #[test]
    fn json_row_for_cached_result() {
        let r = FetchResult::cached(FetchJob::new("10"), PathBuf::from("/d/run-10"));
        let json = serde_json::to_value(ResultRow::from(&r)).unwrap();
        assert_eq!(json["outcome"], "cached");
        assert_eq!(json["path"], "/d/run-10");
        assert!(json["error"].is_null());
    }
}
