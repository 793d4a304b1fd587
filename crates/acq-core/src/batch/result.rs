//! Per-job outcomes and batch summaries.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::control::Cancelled;

use super::job::FetchJob;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Token was done before the job started, or the fetcher stopped because of it.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
    /// The fetcher's own error, unchanged.
    #[error(transparent)]
    Fetch(#[from] anyhow::Error),
    #[error("fetcher panicked: {0}")]
    Panicked(String),
    #[error("worker exited before reporting a result")]
    WorkerLost,
}

impl FetchError {
    /// Map a fetcher error, recognising a cancellation it passed through.
    pub(crate) fn from_fetcher(err: anyhow::Error) -> Self {
        match err.downcast::<Cancelled>() {
            Ok(reason) => FetchError::Cancelled(reason),
            Err(err) => FetchError::Fetch(err),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled(_))
    }
}

/// Terminal state of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not attempted; the token was already done.
    Skipped,
    /// Already present locally.
    Cached,
    Succeeded,
    Failed,
}

/// Result for exactly one submitted job.
///
/// Built only through the constructors below, so a cached result never carries an
/// error and is never marked skipped.
#[derive(Debug)]
pub struct FetchResult {
    job: FetchJob,
    path: PathBuf,
    skipped: bool,
    cached: bool,
    error: Option<FetchError>,
}

impl FetchResult {
    pub fn succeeded(job: FetchJob, path: PathBuf) -> Self {
        Self {
            job,
            path,
            skipped: false,
            cached: false,
            error: None,
        }
    }

    pub fn cached(job: FetchJob, path: PathBuf) -> Self {
        Self {
            job,
            path,
            skipped: false,
            cached: true,
            error: None,
        }
    }

    pub fn skipped(job: FetchJob, path: PathBuf, reason: Cancelled) -> Self {
        Self {
            job,
            path,
            skipped: true,
            cached: false,
            error: Some(FetchError::Cancelled(reason)),
        }
    }

    pub fn failed(job: FetchJob, path: PathBuf, error: FetchError) -> Self {
        Self {
            job,
            path,
            skipped: false,
            cached: false,
            error: Some(error),
        }
    }

    pub fn job(&self) -> &FetchJob {
        &self.job
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.error.as_ref()
    }

    /// Fetched or cached.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn outcome(&self) -> FetchOutcome {
        if self.skipped {
            FetchOutcome::Skipped
        } else if self.cached {
            FetchOutcome::Cached
        } else if self.error.is_some() {
            FetchOutcome::Failed
        } else {
            FetchOutcome::Succeeded
        }
    }
}

/// Counts per terminal state for a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub cached: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl FetchSummary {
    pub fn from_results(results: &[FetchResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };
        for r in results {
            match r.outcome() {
                FetchOutcome::Skipped => summary.skipped += 1,
                FetchOutcome::Cached => summary.cached += 1,
                FetchOutcome::Succeeded => summary.succeeded += 1,
                FetchOutcome::Failed => summary.failed += 1,
            }
        }
        summary
    }
}

impl fmt::Display for FetchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} job(s): {} downloaded, {} cached, {} skipped, {} failed",
            self.total, self.succeeded, self.cached, self.skipped, self.failed
        )
    }
}

/// First `max_needed` successful results in input order (all of them for `None`).
/// Callers over-fetch and then pick here, since not every candidate qualifies.
pub fn select_qualifying(results: &[FetchResult], max_needed: Option<usize>) -> Vec<&FetchResult> {
    let ok = results.iter().filter(|r| r.is_success());
    match max_needed {
        Some(n) => ok.take(n).collect(),
        None => ok.collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str) -> FetchJob {
        FetchJob::new(id)
    }

    #[test]
    fn cached_result_has_no_error_and_is_not_skipped() {
        let r = FetchResult::cached(job("1"), PathBuf::from("/d/run-1"));
        assert!(r.is_cached());
        assert!(!r.is_skipped());
        assert!(r.error().is_none());
        assert!(r.is_success());
        assert_eq!(r.outcome(), FetchOutcome::Cached);
    }

    #[test]
    fn skipped_result_carries_cancellation() {
        let r = FetchResult::skipped(job("1"), PathBuf::from("/d/run-1"), Cancelled::Canceled);
        assert!(r.is_skipped());
        assert!(matches!(
            r.error(),
            Some(FetchError::Cancelled(Cancelled::Canceled))
        ));
        assert_eq!(r.outcome(), FetchOutcome::Skipped);
    }

    #[test]
    fn fetcher_cancellation_is_recognised() {
        let err = FetchError::from_fetcher(anyhow::Error::new(Cancelled::DeadlineExceeded));
        assert!(matches!(err, FetchError::Cancelled(Cancelled::DeadlineExceeded)));
        let err = FetchError::from_fetcher(anyhow::anyhow!("HTTP 404"));
        assert!(!err.is_cancelled());
        assert_eq!(err.to_string(), "HTTP 404");
    }

    #[test]
    fn summary_counts_each_state() {
        let results = vec![
            FetchResult::succeeded(job("1"), PathBuf::new()),
            FetchResult::cached(job("2"), PathBuf::new()),
            FetchResult::skipped(job("3"), PathBuf::new(), Cancelled::Canceled),
            FetchResult::failed(job("4"), PathBuf::new(), anyhow::anyhow!("boom").into()),
            FetchResult::succeeded(job("5"), PathBuf::new()),
        ];
        let s = FetchSummary::from_results(&results);
        assert_eq!(
            s,
            FetchSummary {
                total: 5,
                succeeded: 2,
                cached: 1,
                skipped: 1,
                failed: 1
            }
        );
        assert_eq!(
            s.to_string(),
            "5 job(s): 2 downloaded, 1 cached, 1 skipped, 1 failed"
        );
    }

    #[test]
    fn select_qualifying_keeps_input_order() {
        let results = vec![
            FetchResult::failed(job("1"), PathBuf::new(), FetchError::WorkerLost),
            FetchResult::cached(job("2"), PathBuf::new()),
            FetchResult::succeeded(job("3"), PathBuf::new()),
            FetchResult::succeeded(job("4"), PathBuf::new()),
        ];
        let picked: Vec<&str> = select_qualifying(&results, Some(2))
            .iter()
            .map(|r| r.job().id.as_str())
            .collect();
        assert_eq!(picked, vec!["2", "3"]);
        assert_eq!(select_qualifying(&results, None).len(), 3);
        assert!(select_qualifying(&results, Some(0)).is_empty());
    }
}
