//! Bounded worker pool for a batch of fetch jobs.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};

use crate::control::CancelToken;

use super::job::{job_dir, FetchJob, FetchOptions, Fetcher};
use super::result::{FetchError, FetchResult, FetchSummary};

/// Run every job across at most `limit` worker threads and return one result per
/// job, in input order.
///
/// Workers pop from a shared queue until it is empty. A job whose turn comes after
/// `token` is done is reported skipped without calling the fetcher, so cancellation
/// drains the queue quickly but never drops a job. `options.max_needed` does not
/// stop the batch early.
pub fn fetch_all(
    token: &CancelToken,
    fetcher: Arc<dyn Fetcher>,
    jobs: Vec<FetchJob>,
    options: &FetchOptions,
    limit: usize,
) -> Vec<FetchResult> {
    if jobs.is_empty() {
        return Vec::new();
    }
    let count = jobs.len();
    let num_workers = limit.max(1).min(count);
    tracing::info!(
        jobs = count,
        workers = num_workers,
        max_needed = ?options.max_needed,
        "starting batch fetch"
    );

    let work: Arc<Mutex<VecDeque<(usize, FetchJob)>>> =
        Arc::new(Mutex::new(jobs.iter().cloned().enumerate().collect()));
    let options = Arc::new(options.clone());
    let (tx, rx) = mpsc::channel();
    let mut handles = Vec::with_capacity(num_workers);
    for worker in 0..num_workers {
        let work = Arc::clone(&work);
        let tx = tx.clone();
        let token = token.clone();
        let fetcher = Arc::clone(&fetcher);
        let options = Arc::clone(&options);
        let spawned = std::thread::Builder::new()
            .name(format!("acq-fetch-{}", worker))
            .spawn(move || loop {
                let next = work
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .pop_front();
                let Some((index, job)) = next else {
                    break;
                };
                let res = run_one(&token, fetcher.as_ref(), job, &options);
                if tx.send((index, res)).is_err() {
                    break;
                }
            });
        match spawned {
            Ok(h) => handles.push(h),
            Err(e) => tracing::warn!(worker, error = %e, "could not start fetch worker"),
        }
    }
    drop(tx);

    let mut slots: Vec<Option<FetchResult>> = (0..count).map(|_| None).collect();
    for (index, res) in rx {
        slots[index] = Some(res);
    }
    for h in handles {
        if let Err(e) = h.join() {
            tracing::warn!("fetch worker panicked: {:?}", e);
        }
    }

    let results: Vec<FetchResult> = slots
        .into_iter()
        .zip(jobs)
        .map(|(slot, job)| {
            slot.unwrap_or_else(|| {
                let path = job_dir(&options.dest_dir, &job);
                FetchResult::failed(job, path, FetchError::WorkerLost)
            })
        })
        .collect();

    tracing::info!("batch fetch finished: {}", FetchSummary::from_results(&results));
    results
}

/// Pending -> Skipped, or Pending -> Fetching -> Cached | Succeeded | Failed.
fn run_one(
    token: &CancelToken,
    fetcher: &dyn Fetcher,
    job: FetchJob,
    options: &FetchOptions,
) -> FetchResult {
    let path = options.job_dir(&job);
    if let Some(reason) = token.err() {
        tracing::debug!(job = %job, ?reason, "skipping job");
        return FetchResult::skipped(job, path, reason);
    }

    if options.verbose {
        tracing::info!(job = %job, dest = %path.display(), "fetching");
    } else {
        tracing::debug!(job = %job, dest = %path.display(), "fetching");
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| fetcher.fetch(token, &job, options)));
    match outcome {
        Ok(Ok(fetched)) if fetched.cached => {
            tracing::debug!(job = %job, "already present");
            FetchResult::cached(job, fetched.path)
        }
        Ok(Ok(fetched)) => {
            if options.verbose {
                tracing::info!(job = %job, path = %fetched.path.display(), "downloaded");
            }
            FetchResult::succeeded(job, fetched.path)
        }
        Ok(Err(e)) => {
            let err = FetchError::from_fetcher(e);
            tracing::warn!(job = %job, error = %err, "fetch failed");
            FetchResult::failed(job, path, err)
        }
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            tracing::warn!(job = %job, "fetcher panicked: {}", msg);
            FetchResult::failed(job, path, FetchError::Panicked(msg))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
