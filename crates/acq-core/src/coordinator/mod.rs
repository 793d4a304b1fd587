//! Deduplicated resource pulls.
//!
//! A `PullCoordinator` guarantees that at most one caller fetches a given resource
//! key at a time. Everyone else learns that cheaply (`try_claim` returns `false`)
//! and can tell the user to retry later instead of starting a second fetch.
//!
//! The availability check and the check-and-set on the registry run under one
//! mutex, so a resource that appears locally between the two cannot be claimed.
//! The lock is never held across the fetch itself.
//!
//! Claims are tied to a `CancelToken`: a watcher thread releases a claim within one
//! poll interval of its token being cancelled, so an abandoned fetch never leaves
//! its key marked in flight.

mod claim;
mod prepare;
mod state;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::control::CancelToken;

pub use claim::PullClaim;
pub use prepare::{PrepareError, Puller};
use state::Registry;

/// Default interval at which claim watchers poll their token.
pub const DEFAULT_CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default seconds quoted to callers who hit a key that is mid-fetch.
pub const DEFAULT_RETRY_HINT_SECS: u64 = 15;

/// Answers whether a resource is already present locally. Must be side-effect
/// free and safe to call from many threads.
pub trait AvailabilityProbe: Send + Sync {
    fn is_available(&self, key: &str) -> bool;
}

impl<F> AvailabilityProbe for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_available(&self, key: &str) -> bool {
        self(key)
    }
}

/// Snapshot of one key as seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullStatus {
    /// Present locally; nothing to fetch.
    Available,
    /// Someone holds a claim and is fetching it.
    Downloading,
    /// Neither present nor being fetched.
    Missing,
}

/// Registry of in-flight pulls. Cloning shares the same registry.
#[derive(Clone)]
pub struct PullCoordinator {
    probe: Arc<dyn AvailabilityProbe>,
    registry: Arc<Mutex<Registry>>,
    poll_interval: Duration,
    retry_hint_secs: u64,
}

impl std::fmt::Debug for PullCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullCoordinator")
            .field("downloading", &self.downloading_keys())
            .field("poll_interval", &self.poll_interval)
            .field("retry_hint_secs", &self.retry_hint_secs)
            .finish()
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // Registry updates are single assignments; a panic elsewhere cannot leave it torn.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PullCoordinator {
    pub fn new(probe: impl AvailabilityProbe + 'static) -> Self {
        Self::with_probe(Arc::new(probe))
    }

    pub fn with_probe(probe: Arc<dyn AvailabilityProbe>) -> Self {
        Self {
            probe,
            registry: Arc::new(Mutex::new(Registry::default())),
            poll_interval: DEFAULT_CANCEL_POLL_INTERVAL,
            retry_hint_secs: DEFAULT_RETRY_HINT_SECS,
        }
    }

    /// How often claim watchers look at their token (bounds cancel-release latency).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_retry_hint_secs(mut self, secs: u64) -> Self {
        self.retry_hint_secs = secs;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn retry_hint_secs(&self) -> u64 {
        self.retry_hint_secs
    }

    /// Delegates to the probe; never touches the registry.
    pub fn is_available(&self, key: &str) -> bool {
        self.probe.is_available(key)
    }

    pub fn is_downloading(&self, key: &str) -> bool {
        lock(&self.registry).is_downloading(key)
    }

    pub fn status(&self, key: &str) -> PullStatus {
        if self.is_available(key) {
            PullStatus::Available
        } else if self.is_downloading(key) {
            PullStatus::Downloading
        } else {
            PullStatus::Missing
        }
    }

    /// Claim `key` for fetching. Returns `false` if the resource is already
    /// available, someone else holds the claim, or `token` is already cancelled.
    ///
    /// On `true` the caller must call `release` on every exit path. If `token` is
    /// cancelled first, the claim is released within one poll interval.
    pub fn try_claim(&self, token: &CancelToken, key: &str) -> bool {
        self.claim_generation(token, key).is_some()
    }

    /// Guard-based `try_claim`: the claim is released when the guard drops.
    pub fn claim(&self, token: &CancelToken, key: &str) -> Option<PullClaim> {
        let generation = self.claim_generation(token, key)?;
        Some(PullClaim {
            registry: Arc::clone(&self.registry),
            key: key.to_string(),
            generation,
        })
    }

    fn claim_generation(&self, token: &CancelToken, key: &str) -> Option<u64> {
        if let Some(reason) = token.err() {
            tracing::debug!(key, ?reason, "not claiming: token already done");
            return None;
        }
        let generation = {
            let mut reg = lock(&self.registry);
            if self.probe.is_available(key) {
                tracing::debug!(key, "already available, no claim needed");
                return None;
            }
            reg.claim(key)
        };
        match generation {
            Some(generation) => {
                tracing::debug!(key, generation, "claimed");
                claim::spawn_watcher(
                    Arc::clone(&self.registry),
                    key.to_string(),
                    generation,
                    token.clone(),
                    self.poll_interval,
                );
                Some(generation)
            }
            None => {
                tracing::debug!(key, "already being downloaded");
                None
            }
        }
    }

    /// Clear the downloading flag for `key`, whoever holds it.
    pub fn release(&self, key: &str) {
        if lock(&self.registry).release(key) {
            tracing::debug!(key, "released");
        }
    }

    /// Forget every claim. Meant for test isolation and cold restarts, not for use
    /// while fetches are live.
    pub fn reset_all(&self) {
        lock(&self.registry).clear();
        tracing::debug!("pull registry reset");
    }

    /// Keys currently claimed, sorted.
    pub fn downloading_keys(&self) -> Vec<String> {
        lock(&self.registry).downloading_keys()
    }
}
