//! Key -> pull state table. Callers hold the coordinator mutex around every method.

use std::collections::HashMap;

/// Per-key claim state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct PullState {
    pub(super) downloading: bool,
    /// Generation of the claim that last set `downloading`.
    pub(super) generation: u64,
}

#[derive(Debug, Default)]
pub(super) struct Registry {
    entries: HashMap<String, PullState>,
    /// Monotonic across `clear` so a guard from before a reset never matches a
    /// claim made after it.
    next_generation: u64,
}

impl Registry {
    pub(super) fn is_downloading(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|s| s.downloading)
    }

    /// Check-and-set. Returns the new claim generation, or `None` if already held.
    pub(super) fn claim(&mut self, key: &str) -> Option<u64> {
        let entry = self.entries.entry(key.to_string()).or_default();
        if entry.downloading {
            return None;
        }
        self.next_generation += 1;
        entry.downloading = true;
        entry.generation = self.next_generation;
        Some(entry.generation)
    }

    /// Unconditional release. Returns whether the key was held.
    pub(super) fn release(&mut self, key: &str) -> bool {
        match self.entries.get_mut(key) {
            Some(state) if state.downloading => {
                state.downloading = false;
                true
            }
            _ => false,
        }
    }

    /// True if `generation` is still the live claim on `key`.
    pub(super) fn holds(&self, key: &str, generation: u64) -> bool {
        self.entries
            .get(key)
            .is_some_and(|s| s.downloading && s.generation == generation)
    }

    /// Release only if `generation` is still the live claim.
    pub(super) fn release_generation(&mut self, key: &str, generation: u64) -> bool {
        if self.holds(key, generation) {
            self.release(key)
        } else {
            false
        }
    }

    pub(super) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(super) fn downloading_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, s)| s.downloading)
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}
