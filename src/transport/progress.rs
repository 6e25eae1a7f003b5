//! Upload progress reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Receives upload progress as a whole percentage (0–100).
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Accumulates bytes handed to the network and reports percentages.
pub struct ProgressTracker {
    total: u64,
    loaded: AtomicU64,
    sink: ProgressFn,
}

impl ProgressTracker {
    pub fn new(total: u64, sink: ProgressFn) -> Self {
        Self {
            total,
            loaded: AtomicU64::new(0),
            sink,
        }
    }

    /// Record `bytes` more sent. Nothing is reported when the total is unknown.
    pub fn advance(&self, bytes: u64) {
        let loaded = self.loaded.fetch_add(bytes, Ordering::SeqCst) + bytes;
        if self.total == 0 {
            return;
        }
        let percent = (loaded.min(self.total) * 100 + self.total / 2) / self.total;
        (self.sink)(percent as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn reports_rounded_percentages() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let tracker = ProgressTracker::new(
            3,
            Arc::new(move |pct| sink_seen.lock().unwrap().push(pct)),
        );
        tracker.advance(1);
        tracker.advance(1);
        tracker.advance(1);
        assert_eq!(*seen.lock().unwrap(), vec![33, 67, 100]);
    }

    #[test]
    fn unknown_total_reports_nothing() {
        let seen = Arc::new(Mutex::new(Vec::<u8>::new()));
        let sink_seen = seen.clone();
        let tracker = ProgressTracker::new(0, Arc::new(move |pct| sink_seen.lock().unwrap().push(pct)));
        tracker.advance(10);
        assert!(seen.lock().unwrap().is_empty());
    }
}
