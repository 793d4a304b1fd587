//! Make a set of resources available, starting background pulls for missing ones.
//!
//! `ensure_available` never blocks on a pull. Keys that are present pass; keys that
//! are mid-fetch, or whose pull this call just started, come back as
//! `PrepareError::Pending` with a retry hint the caller can show to the user.

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::control::{CancelToken, Cancelled};

use super::{PullClaim, PullCoordinator};

/// Performs the actual pull of one resource (e.g. `docker pull`). Must return
/// promptly once `token` is cancelled. Retries, if any, are its own business.
pub trait Puller: Send + Sync {
    fn pull(&self, token: &CancelToken, key: &str) -> anyhow::Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum PrepareError {
    /// Contention, not failure: the listed keys are being fetched.
    #[error("{} currently being downloaded, retry in {retry_after_secs} seconds", .keys.join(", "))]
    Pending {
        keys: Vec<String>,
        retry_after_secs: u64,
    },
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl PrepareError {
    pub fn is_pending(&self) -> bool {
        matches!(self, PrepareError::Pending { .. })
    }
}

impl PullCoordinator {
    /// Claim `key` and pull it on a background thread. The claim is released when
    /// the pull returns, fails, or the token is cancelled. Returns `None` if the key
    /// is available, already claimed, or the thread could not be started.
    pub fn start_pull(
        &self,
        token: &CancelToken,
        key: &str,
        puller: Arc<dyn Puller>,
    ) -> Option<JoinHandle<anyhow::Result<()>>> {
        let claim = self.claim(token, key)?;
        let token = token.clone();
        let spawned = std::thread::Builder::new()
            .name("acq-pull".to_string())
            .spawn(move || run_pull(claim, &token, puller.as_ref()));
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                // The closure (and the claim in it) was dropped, so the key is free again.
                tracing::warn!(key, error = %e, "could not start background pull");
                None
            }
        }
    }

    /// Check every key; start pulls for missing ones. `Ok(())` only when all keys
    /// are available right now.
    pub fn ensure_available<S: AsRef<str>>(
        &self,
        token: &CancelToken,
        keys: &[S],
        puller: Arc<dyn Puller>,
    ) -> Result<(), PrepareError> {
        if let Some(reason) = token.err() {
            return Err(reason.into());
        }
        let mut pending = Vec::new();
        for key in keys.iter().map(AsRef::as_ref) {
            if self.is_available(key) {
                tracing::debug!(key, "available");
                continue;
            }
            if self.is_downloading(key) {
                tracing::debug!(key, "pull already in progress");
            } else if self.start_pull(token, key, Arc::clone(&puller)).is_some() {
                tracing::info!(key, "started background pull");
            } else if self.is_available(key) {
                // Appeared between the checks.
                continue;
            }
            pending.push(key.to_string());
        }
        if pending.is_empty() {
            Ok(())
        } else {
            Err(PrepareError::Pending {
                keys: pending,
                retry_after_secs: self.retry_hint_secs(),
            })
        }
    }
}

fn run_pull(claim: PullClaim, token: &CancelToken, puller: &dyn Puller) -> anyhow::Result<()> {
    let key = claim.key().to_string();
    let result = puller.pull(token, &key);
    match (&result, token.err()) {
        (Ok(()), _) => tracing::info!(key = %key, "pull finished"),
        (Err(e), Some(reason)) => {
            tracing::debug!(key = %key, ?reason, error = %e, "pull stopped by cancellation")
        }
        (Err(e), None) => tracing::warn!(key = %key, error = %e, "pull failed"),
    }
    drop(claim);
    result
}
