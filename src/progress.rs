//! Progress-callback trait for per-unit batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::SopConfigBuilder::progress`] to receive real-time
//! events as the batch orchestrator processes each archive entry.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a channel, a WebSocket, a database record, or a
//! terminal progress bar — without the library knowing anything about how
//! the host application communicates. The trait is `Send + Sync` so a
//! future parallel batch would not need an API change.

use std::sync::Arc;

/// Called by the batch orchestrator as it processes each entry.
///
/// All methods have default no-op implementations so callers only
/// override what they care about. Error arguments are owned `String`s so
/// implementations can move them into spawned tasks.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any entry is processed.
    ///
    /// # Arguments
    /// * `total_units` — number of qualifying `.pdf` entries found
    fn on_batch_start(&self, total_units: usize) {
        let _ = total_units;
    }

    /// Called just before a unit's conversion begins.
    fn on_unit_start(&self, unit_num: usize, total_units: usize, name: &str) {
        let _ = (unit_num, total_units, name);
    }

    /// Called when a unit's SOP document was produced.
    ///
    /// # Arguments
    /// * `docx_len` — byte length of the produced document
    fn on_unit_complete(&self, unit_num: usize, total_units: usize, docx_len: usize) {
        let _ = (unit_num, total_units, docx_len);
    }

    /// Called when a unit produced no output.
    fn on_unit_error(&self, unit_num: usize, total_units: usize, error: String) {
        let _ = (unit_num, total_units, error);
    }

    /// Called once after all entries have been attempted.
    fn on_batch_complete(&self, total_units: usize, success_count: usize) {
        let _ = (total_units, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopBatchProgress;

impl BatchProgressCallback for NoopBatchProgress {}

/// Convenience alias matching the type stored in [`crate::config::SopConfig`].
pub type BatchProgress = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        final_successes: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_unit_start(&self, _unit: usize, _total: usize, _name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_unit_complete(&self, _unit: usize, _total: usize, _len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_unit_error(&self, _unit: usize, _total: usize, _error: String) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _total: usize, success_count: usize) {
            self.final_successes.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopBatchProgress;
        cb.on_batch_start(2);
        cb.on_unit_start(1, 2, "a.pdf");
        cb.on_unit_complete(1, 2, 1024);
        cb.on_unit_error(2, 2, "no image".to_string());
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            final_successes: AtomicUsize::new(0),
        };

        tracker.on_batch_start(3);
        tracker.on_unit_start(1, 3, "a.pdf");
        tracker.on_unit_complete(1, 3, 100);
        tracker.on_unit_start(2, 3, "b.pdf");
        tracker.on_unit_error(2, 3, "analysis timeout".to_string());
        tracker.on_unit_start(3, 3, "c.pdf");
        tracker.on_unit_complete(3, 3, 200);
        tracker.on_batch_complete(3, 2);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.final_successes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_moves_into_spawned_task() {
        let cb: Arc<dyn BatchProgressCallback> = Arc::new(NoopBatchProgress);
        std::thread::spawn(move || {
            cb.on_unit_error(1, 1, "owned string crosses threads".to_string());
        })
        .join()
        .expect("spawned thread must not panic");
    }
}
