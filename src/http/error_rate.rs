//! Rolling error rate
//!
//! Each client keeps the outcome of its requests for one minute and reports
//! the share of failures (status >= 400) over that window.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Length of the rolling window, in seconds
pub const ERROR_RATE_WINDOW_SECS: i64 = 60;

/// Outcome of one completed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorHistory {
    pub url: String,
    pub status_code: u16,
    pub timestamp: DateTime<Utc>,
    pub is_error: bool,
}

/// Request outcomes of the last minute
#[derive(Debug, Clone, Default)]
pub struct ErrorRateTracker {
    history: Vec<ErrorHistory>,
}

impl ErrorRateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome now and return the error rate in percent
    pub fn record(&mut self, url: impl Into<String>, status_code: u16) -> f64 {
        self.record_at(url, status_code, Utc::now())
    }

    /// Prune entries older than the window relative to `now`, append the
    /// outcome, then compute the rate.
    pub fn record_at(&mut self, url: impl Into<String>, status_code: u16, now: DateTime<Utc>) -> f64 {
        self.prune(now);
        self.history.push(ErrorHistory {
            url: url.into(),
            status_code,
            timestamp: now,
            is_error: status_code >= 400,
        });
        self.rate()
    }

    /// Drop entries older than the window relative to `now`
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let min_time = now - Duration::seconds(ERROR_RATE_WINDOW_SECS);
        self.history.retain(|entry| entry.timestamp > min_time);
    }

    /// `100 * errors / total`, 0 when empty
    pub fn rate(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }

        let errors = self.history.iter().filter(|e| e.is_error).count();
        errors as f64 / self.history.len() as f64 * 100.0
    }

    pub fn history(&self) -> &[ErrorHistory] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}
