//! Cancellation tokens shared by the coordinator and batch workers.
//!
//! A `CancelToken` is a cheap, cloneable handle. Every clone observes the same
//! state: either an explicit `cancel()` from any holder, or an optional deadline
//! passing. Workers poll it before starting a unit of work; claim watchers poll it
//! to release claims whose owner has gone away.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why a token stopped being live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Cancelled {
    #[error("operation canceled")]
    Canceled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

/// Shared cancel/deadline signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// A token that is only cancelled by an explicit `cancel()`.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: None,
            }),
        }
    }

    /// A token that also expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: Some(deadline),
            }),
        }
    }

    /// Cancel the token for every clone. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    /// `None` while live; otherwise the reason. Explicit cancel wins over an
    /// expired deadline.
    pub fn err(&self) -> Option<Cancelled> {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return Some(Cancelled::Canceled);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Cancelled::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.err().is_some()
    }

    /// Sleep up to `dur`, waking early (in `poll` steps) if the token is cancelled.
    /// Returns `true` if the token was cancelled when the wait ended.
    pub fn wait_timeout(&self, dur: Duration, poll: Duration) -> bool {
        let end = Instant::now() + dur;
        let poll = poll.max(Duration::from_millis(1));
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= end {
                return false;
            }
            std::thread::sleep(poll.min(end - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_live() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.err(), None);
    }

    #[test]
    fn cancel_is_visible_to_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert_eq!(token.err(), Some(Cancelled::Canceled));
        token.cancel();
        assert_eq!(clone.err(), Some(Cancelled::Canceled));
    }

    #[test]
    fn expired_deadline_reports_deadline_exceeded() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert_eq!(token.err(), Some(Cancelled::DeadlineExceeded));
        token.cancel();
        assert_eq!(token.err(), Some(Cancelled::Canceled));
    }

    #[test]
    fn far_deadline_is_live() {
        let token = CancelToken::with_timeout(Duration::from_secs(3600));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn wait_timeout_wakes_on_cancel() {
        let token = CancelToken::new();
        let t = token.clone();
        let handle = std::thread::spawn(move || {
            t.wait_timeout(Duration::from_secs(10), Duration::from_millis(5))
        });
        std::thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn wait_timeout_runs_out() {
        let token = CancelToken::new();
        assert!(!token.wait_timeout(Duration::from_millis(10), Duration::from_millis(2)));
    }
}
