//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use acq_core::batch::{FetchJob, FetchOptions, Fetched, Fetcher};
use acq_core::control::CancelToken;

/// In-memory "local store" usable as an availability probe.
#[derive(Clone, Default)]
pub struct LocalStore(Arc<RwLock<HashSet<String>>>);

impl LocalStore {
    pub fn insert(&self, key: &str) {
        self.0.write().unwrap().insert(key.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.read().unwrap().contains(key)
    }
}

/// Fetcher that blocks each job until `open()` is called or the token is
/// cancelled, and records how many jobs reached it.
#[derive(Default)]
pub struct GatedFetcher {
    pub started: AtomicUsize,
    open: Mutex<bool>,
}

impl GatedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

impl Fetcher for GatedFetcher {
    fn fetch(
        &self,
        token: &CancelToken,
        job: &FetchJob,
        options: &FetchOptions,
    ) -> anyhow::Result<Fetched> {
        self.started.fetch_add(1, Ordering::SeqCst);
        loop {
            if *self.open.lock().unwrap() {
                return Ok(Fetched {
                    path: options.job_dir(job),
                    cached: false,
                });
            }
            if let Some(reason) = token.err() {
                return Err(reason.into());
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }
}

pub fn wait_until(limit: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let end = std::time::Instant::now() + limit;
    while std::time::Instant::now() < end {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

pub fn jobs(n: usize) -> Vec<FetchJob> {
    (0..n)
        .map(|i| FetchJob::new(format!("{}", 1000 + i)).with_name("agentic-ci"))
        .collect()
}
