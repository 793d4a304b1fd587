//! RAII claim guard and the cancellation watcher that releases abandoned claims.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::control::CancelToken;

use super::lock;
use super::state::Registry;

/// Exclusive right to fetch one key. Releases the key when dropped, unless the
/// claim was already released (by cancellation, `release`, or `reset_all`).
#[derive(Debug)]
pub struct PullClaim {
    pub(super) registry: Arc<Mutex<Registry>>,
    pub(super) key: String,
    pub(super) generation: u64,
}

impl PullClaim {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether this claim is still the live one for its key.
    pub fn is_held(&self) -> bool {
        lock(&self.registry).holds(&self.key, self.generation)
    }

    /// Release now instead of at end of scope.
    pub fn release(self) {}
}

impl Drop for PullClaim {
    fn drop(&mut self) {
        if lock(&self.registry).release_generation(&self.key, self.generation) {
            tracing::debug!(key = %self.key, "claim released");
        }
    }
}

/// Poll `token` every `poll` and release the claim as soon as it is cancelled.
/// Exits on its own once the claim is released by any other path.
pub(super) fn spawn_watcher(
    registry: Arc<Mutex<Registry>>,
    key: String,
    generation: u64,
    token: CancelToken,
    poll: Duration,
) {
    let spawned = std::thread::Builder::new()
        .name("acq-claim-watch".to_string())
        .spawn(move || loop {
            let cancelled = token.wait_timeout(poll, poll);
            let mut reg = lock(&registry);
            if !reg.holds(&key, generation) {
                return;
            }
            if cancelled {
                reg.release_generation(&key, generation);
                drop(reg);
                tracing::debug!(
                    key = %key,
                    reason = ?token.err(),
                    "claim released after cancellation"
                );
                return;
            }
        });
    if let Err(e) = spawned {
        // The claim is still released by its holder; only prompt cancel-release is lost.
        tracing::warn!(error = %e, "could not start claim watcher");
    }
}
