//! Shared progress tracking utilities.
//!
//! Workers bump a lock-free counter as they finish files; an optional
//! callback receives `(completed, total)` so the CLI can drive a
//! progress bar without the executor knowing about terminals.

use std::sync::atomic::{AtomicU64, Ordering};

pub type ProgressFn = dyn Fn(u64, u64) + Send + Sync;

/// Atomic completed-file counter feeding an optional sink.
pub struct ProgressCounter {
    completed: AtomicU64,
    total: u64,
    callback: Option<Box<ProgressFn>>,
}

impl ProgressCounter {
    pub fn new(total: u64, callback: Option<Box<ProgressFn>>) -> Self {
        Self {
            completed: AtomicU64::new(0),
            total,
            callback,
        }
    }

    /// Record one finished file and notify the sink.
    pub fn file_done(&self) {
        let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(ref cb) = self.callback {
            cb(done, self.total);
        }
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counter_notifies_sink() {
        let seen = Arc::new(AtomicU64::new(0));
        let seen_cb = seen.clone();
        let counter = ProgressCounter::new(
            3,
            Some(Box::new(move |done, total| {
                assert_eq!(total, 3);
                seen_cb.store(done, Ordering::Relaxed);
            })),
        );
        counter.file_done();
        counter.file_done();
        assert_eq!(counter.completed(), 2);
        assert_eq!(seen.load(Ordering::Relaxed), 2);
    }
}
