//! Progress reporting for long-running scans
//!
//! Scans report through an injected interface so the calling layer decides how
//! to render progress (console bar, GUI, log lines). Callbacks are synchronous
//! and fire-and-forget; they carry no error channel.

/// Receiver for scan progress events
pub trait ScanProgress {
    /// A free-form status line
    fn status(&self, _text: &str) {}

    /// A counted iteration is starting
    fn iter_init(&self, _label: &str, _total: usize) {}

    /// The current iteration advanced by `increment`; `done` marks the last update
    fn iter_update(&self, _increment: usize, _done: bool) {}
}

/// Discards all progress events
pub struct NullProgress;

impl ScanProgress for NullProgress {}

/// Routes progress events to tracing
pub struct LogProgress;

impl ScanProgress for LogProgress {
    fn status(&self, text: &str) {
        tracing::info!("{}", text);
    }

    fn iter_init(&self, label: &str, total: usize) {
        tracing::info!("{} (0/{})", label, total);
    }

    fn iter_update(&self, increment: usize, done: bool) {
        tracing::debug!(increment, done, "scan progress");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        updates: AtomicUsize,
    }

    impl ScanProgress for Counting {
        fn iter_update(&self, increment: usize, _done: bool) {
            self.updates.fetch_add(increment, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_progress_accumulates_updates() {
        let progress = Counting {
            updates: AtomicUsize::new(0),
        };
        progress.iter_init("groups", 3);
        progress.iter_update(1, false);
        progress.iter_update(1, false);
        progress.iter_update(1, true);
        assert_eq!(progress.updates.load(Ordering::Relaxed), 3);
    }
}
