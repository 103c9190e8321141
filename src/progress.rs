//! Progress-callback trait for polling events.
//!
//! Inject an [`Arc<dyn PollProgressCallback>`] via
//! [`crate::poller::TaskPoller::with_progress`] to receive an event for each
//! status observation while a task is polled.
//!
//! # Example
//!
//! ```rust
//! use docserve_client::{PollProgressCallback, TaskStatus};
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! struct CountingCallback {
//!     seen: AtomicU32,
//! }
//!
//! impl PollProgressCallback for CountingCallback {
//!     fn on_status(&self, task_id: &str, attempt: u32, max_attempts: u32, status: &TaskStatus) {
//!         self.seen.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{task_id}: {status} ({attempt}/{max_attempts})");
//!     }
//! }
//! ```

use crate::task::TaskStatus;
use std::sync::Arc;

/// Called by the poller as it observes a task.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait PollProgressCallback: Send + Sync {
    /// Called once before the first status request.
    fn on_poll_start(&self, task_id: &str, max_attempts: u32) {
        let _ = (task_id, max_attempts);
    }

    /// Called after every successful status request.
    ///
    /// # Arguments
    /// * `attempt`      — 1-indexed attempt number
    /// * `max_attempts` — attempt budget
    /// * `status`       — the status the server reported
    fn on_status(&self, task_id: &str, attempt: u32, max_attempts: u32, status: &TaskStatus) {
        let _ = (task_id, attempt, max_attempts, status);
    }

    /// Called when the result has been fetched (and saved, if configured).
    fn on_result(&self, task_id: &str, chunk_count: usize) {
        let _ = (task_id, chunk_count);
    }

    /// Called once when polling ends with an error of any kind.
    fn on_poll_error(&self, task_id: &str, error: &str) {
        let _ = (task_id, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PollProgressCallback for NoopProgressCallback {}

/// Convenience alias for the shared callback handle.
pub type ProgressCallback = Arc<dyn PollProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        statuses: AtomicUsize,
        results: AtomicUsize,
        errors: AtomicUsize,
    }

    impl PollProgressCallback for TrackingCallback {
        fn on_status(&self, _: &str, _: u32, _: u32, _: &TaskStatus) {
            self.statuses.fetch_add(1, Ordering::SeqCst);
        }

        fn on_result(&self, _: &str, _: usize) {
            self.results.fetch_add(1, Ordering::SeqCst);
        }

        fn on_poll_error(&self, _: &str, _: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_poll_start("t", 3);
        cb.on_status("t", 1, 3, &TaskStatus::Pending);
        cb.on_result("t", 7);
        cb.on_poll_error("t", "boom");
    }

    #[test]
    fn arc_dyn_callback_dispatches() {
        let tracker = Arc::new(TrackingCallback::default());
        let cb: ProgressCallback = tracker.clone();
        cb.on_status("t", 1, 3, &TaskStatus::Started);
        cb.on_status("t", 2, 3, &TaskStatus::Success);
        cb.on_result("t", 2);
        assert_eq!(tracker.statuses.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.results.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 0);
    }
}
