//! Error types for the contention monitor.
//!
//! Covers sample validation, sampler failures, configuration loading and
//! validation, and poller lifecycle errors. Only configuration and lifecycle
//! errors are fatal; sample-level errors are absorbed by the poll loop.

use std::io;
use thiserror::Error;

/// Error type for monitoring operations.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A contention entry could not be classified (negative, missing or
    /// non-finite wait ticks). The entry is skipped; the tick still advances.
    #[error("invalid sample entry for '{resource}': {reason}")]
    InvalidSample {
        /// Resource name of the offending entry.
        resource: String,
        /// Why the entry was rejected.
        reason: String,
    },

    /// The sampler could not produce a sample this iteration.
    #[error("sampler '{sampler}' unavailable: {message}")]
    SampleUnavailable {
        /// Identifier of the sampler that failed.
        sampler: &'static str,
        /// Error message describing the failure.
        message: String,
    },

    /// Invalid configuration value, detected before the poll loop starts.
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidConfig {
        /// The configuration key with invalid value.
        key: String,
        /// Error message describing why the value is invalid.
        message: String,
    },

    /// Configuration parsing error with line number.
    #[error("configuration error at line {line}: {message}")]
    ConfigParse {
        /// Line number where the error occurred (1-indexed, 0 if unknown).
        line: usize,
        /// Error message describing the issue.
        message: String,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {0}")]
    ConfigNotFound(String),

    /// A lifecycle operation was attempted in the wrong poller state.
    #[error("cannot {operation} poller in state {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// Name of the state the poller was in.
        state: &'static str,
    },

    /// The OS refused to spawn the poller thread.
    #[error("failed to spawn poller thread: {0}")]
    Spawn(#[from] io::Error),

    /// The poll loop panicked (typically inside the event callback).
    #[error("poller thread panicked")]
    PollerPanicked,
}

impl MonitorError {
    /// Shorthand for [`MonitorError::InvalidConfig`].
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig { key: key.into(), message: message.into() }
    }

    /// Shorthand for [`MonitorError::SampleUnavailable`].
    pub fn unavailable(sampler: &'static str, message: impl Into<String>) -> Self {
        Self::SampleUnavailable { sampler, message: message.into() }
    }

    /// Returns true for errors the poll loop recovers from by skipping a tick.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidSample { .. } | Self::SampleUnavailable { .. })
    }
}

/// Result type alias for monitoring operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parse_error_includes_line_number() {
        let err = MonitorError::ConfigParse { line: 42, message: "invalid value".to_string() };
        let display = err.to_string();

        assert!(display.contains("42"), "Error should include line number: {}", display);
        assert!(display.contains("invalid value"), "Error should include message: {}", display);
    }

    #[test]
    fn test_invalid_sample_includes_resource() {
        let err = MonitorError::InvalidSample {
            resource: "Lock-A (SHM_Buffer)".to_string(),
            reason: "negative wait ticks".to_string(),
        };
        let display = err.to_string();

        assert!(display.contains("Lock-A (SHM_Buffer)"));
        assert!(display.contains("negative"));
    }

    #[test]
    fn test_sample_unavailable_includes_sampler() {
        let err = MonitorError::unavailable("synthetic", "/proc/net/tcp not readable");
        let display = err.to_string();

        assert!(display.contains("synthetic"), "Error should include sampler: {}", display);
        assert!(display.contains("/proc/net/tcp"), "Error should include message: {}", display);
    }

    #[test]
    fn test_invalid_config_includes_key() {
        let err = MonitorError::invalid_config("polling.interval_ms", "must be positive");
        assert!(err.to_string().contains("polling.interval_ms"));
    }

    #[test]
    fn test_invalid_state_display() {
        let err = MonitorError::InvalidState { operation: "start", state: "Stopped" };
        assert_eq!(err.to_string(), "cannot start poller in state Stopped");
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(MonitorError::unavailable("x", "y").is_recoverable());
        assert!(MonitorError::InvalidSample { resource: "r".into(), reason: "n".into() }
            .is_recoverable());
        assert!(!MonitorError::invalid_config("k", "m").is_recoverable());
        assert!(!MonitorError::PollerPanicked.is_recoverable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::WouldBlock, "no threads left");
        let err: MonitorError = io_err.into();

        assert!(matches!(err, MonitorError::Spawn(_)));
        assert!(err.to_string().contains("no threads left"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MonitorError>();
    }
}
