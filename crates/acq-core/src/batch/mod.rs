//! Concurrent batch fetching.
//!
//! A batch is a fixed list of independent jobs (e.g. workflow runs whose artifacts
//! should be downloaded). The pool width comes from `crate::limit`, never from the
//! caller's `max_needed` hint: callers usually need more candidates than they
//! keep, so the whole batch always runs and `select_qualifying` picks afterwards.

mod job;
mod result;
mod run;

use std::sync::Arc;

use crate::control::CancelToken;

pub use job::{FetchJob, FetchOptions, Fetched, Fetcher};
pub use result::{select_qualifying, FetchError, FetchOutcome, FetchResult, FetchSummary};
pub use run::fetch_all;

/// A fetcher bound to a resolved pool width.
#[derive(Clone)]
pub struct BatchFetcher {
    fetcher: Arc<dyn Fetcher>,
    limit: usize,
}

impl BatchFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher>, limit: usize) -> Self {
        Self {
            fetcher,
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn fetch_all(
        &self,
        token: &CancelToken,
        jobs: Vec<FetchJob>,
        options: &FetchOptions,
    ) -> Vec<FetchResult> {
        run::fetch_all(token, Arc::clone(&self.fetcher), jobs, options, self.limit)
    }
}
