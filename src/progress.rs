//! Device-wide progress indicator fed by uploads and remote updates.
//!
//! The record is last-write-wins. Percent changes are pushed straight through;
//! message and byte-counter updates share one throttle so a fast upload never
//! floods the display layer or the log.

use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Minimum spacing between throttled progress updates.
pub const REPORT_INTERVAL: Duration = Duration::from_millis(1250);

/// What the display layer shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressRecord {
    /// `None` while the total size is unknown.
    pub percent: Option<u8>,
    pub message: String,
}

/// Receives every accepted change to the progress record.
pub trait ProgressListener: Send {
    fn on_progress(&mut self, record: &ProgressRecord);
}

pub struct ProgressReporter {
    record: ProgressRecord,
    interval: Duration,
    last_report: Option<Instant>,
    listener: Option<Box<dyn ProgressListener>>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::with_interval(REPORT_INTERVAL)
    }

    #[must_use]
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            record: ProgressRecord::default(),
            interval,
            last_report: None,
            listener: None,
        }
    }

    pub fn set_listener(&mut self, listener: Box<dyn ProgressListener>) {
        self.listener = Some(listener);
    }

    #[must_use]
    pub fn snapshot(&self) -> ProgressRecord {
        self.record.clone()
    }

    /// Set the percentage, clamped to 100. Never throttled.
    pub fn set_percent(&mut self, percent: u8) {
        let percent = percent.min(100);
        if self.record.percent != Some(percent) {
            self.record.percent = Some(percent);
            self.notify();
        }
    }

    pub fn set_indeterminate(&mut self) {
        if self.record.percent.is_some() {
            self.record.percent = None;
            self.notify();
        }
    }

    /// Throttled message update. Returns whether the message was taken.
    pub fn set_message(&mut self, message: &str, now: Instant) -> bool {
        if !self.due(now) {
            return false;
        }
        self.record.message = message.to_string();
        self.notify();
        true
    }

    /// Message update that bypasses the throttle, used for diagnostics.
    pub fn force_message(&mut self, message: &str) {
        self.record.message = message.to_string();
        self.notify();
    }

    /// Feed the running byte counter of an upload.
    ///
    /// The percentage is `floor(written * 100 / total)` when the total is known
    /// and indeterminate otherwise; the log line is throttled.
    pub fn report_bytes(&mut self, written: u64, total: Option<u64>, now: Instant) {
        if self.due(now) {
            match total {
                Some(total) => debug!(written, total, "Uploaded {written} / {total} bytes"),
                None => debug!(written, "Uploaded {written} bytes"),
            }
        }
        match total.and_then(|t| percent_of(written, t)) {
            Some(p) => self.set_percent(p),
            None => self.set_indeterminate(),
        }
    }

    /// Start a new session from a clean record.
    pub fn reset(&mut self, message: &str) {
        self.record = ProgressRecord {
            percent: Some(0),
            message: message.to_string(),
        };
        self.last_report = None;
        info!(message, "progress reset");
        self.notify();
    }

    fn due(&mut self, now: Instant) -> bool {
        match self.last_report {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last_report = Some(now);
                true
            }
        }
    }

    fn notify(&mut self) {
        if let Some(listener) = self.listener.as_mut() {
            listener.on_progress(&self.record);
        }
    }
}

/// Mirrors the record into the log, for hosts without a display.
pub struct LogListener;

impl ProgressListener for LogListener {
    fn on_progress(&mut self, record: &ProgressRecord) {
        debug!(percent = ?record.percent, message = %record.message, "progress");
    }
}

/// `floor(written * 100 / total)` clamped to 100; `None` for an empty total.
#[must_use]
pub fn percent_of(written: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let pct = (u128::from(written) * 100) / u128::from(total);
    Some(pct.min(100) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recorder(Arc<Mutex<Vec<ProgressRecord>>>);

    impl ProgressListener for Recorder {
        fn on_progress(&mut self, record: &ProgressRecord) {
            self.0.lock().unwrap().push(record.clone());
        }
    }

    #[test]
    fn test_percent_of_floors() {
        assert_eq!(percent_of(1, 3), Some(33));
        assert_eq!(percent_of(2, 3), Some(66));
        assert_eq!(percent_of(3, 3), Some(100));
        assert_eq!(percent_of(5, 0), None);
        assert_eq!(percent_of(u64::MAX, u64::MAX), Some(100));
    }

    #[test]
    fn test_messages_are_throttled() {
        let mut p = ProgressReporter::new();
        let t0 = Instant::now();
        assert!(p.set_message("first", t0));
        assert!(!p.set_message("second", t0 + Duration::from_millis(500)));
        assert_eq!(p.snapshot().message, "first");
        assert!(p.set_message("third", t0 + Duration::from_millis(1250)));
        assert_eq!(p.snapshot().message, "third");
    }

    #[test]
    fn test_percent_is_not_throttled() {
        let mut p = ProgressReporter::new();
        let t0 = Instant::now();
        p.report_bytes(10, Some(100), t0);
        p.report_bytes(50, Some(100), t0);
        assert_eq!(p.snapshot().percent, Some(50));
    }

    #[test]
    fn test_unknown_total_is_indeterminate() {
        let mut p = ProgressReporter::new();
        p.set_percent(10);
        p.report_bytes(4096, None, Instant::now());
        assert_eq!(p.snapshot().percent, None);
    }

    #[test]
    fn test_listener_sees_changes_only() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut p = ProgressReporter::new();
        p.set_listener(Box::new(Recorder(Arc::clone(&seen))));
        p.set_percent(40);
        p.set_percent(40);
        p.set_percent(250);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].percent, Some(100));
    }
}
