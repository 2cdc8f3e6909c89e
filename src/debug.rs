//! Debug logging for the monitor.
//!
//! Writes `[+0000ms] [LEVEL] [component] message` lines to stderr. Off by
//! default; switched on by `--debug` or `CONTENTION_MONITOR_DEBUG=1`
//! (`CONTENTION_MONITOR_DEBUG=trace` also lowers the level filter).

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Environment variable consulted by [`init_from_env`].
pub const ENV_VAR: &str = "CONTENTION_MONITOR_DEBUG";

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Minimum level written, stored as `Level as u8`.
static MIN_LEVEL: AtomicU8 = AtomicU8::new(Level::Debug as u8);

/// Start time as millis since UNIX epoch.
static START_TIME_MS: AtomicU64 = AtomicU64::new(0);

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// Enables debug output globally and resets the elapsed-time origin.
pub fn enable() {
    START_TIME_MS.store(now_ms(), Ordering::SeqCst);
    DEBUG_ENABLED.store(true, Ordering::SeqCst);
}

/// Disables debug output globally.
pub fn disable() {
    DEBUG_ENABLED.store(false, Ordering::SeqCst);
}

/// Returns true if debug output is enabled.
#[inline]
pub fn is_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

/// Sets the minimum level that is written.
pub fn set_min_level(level: Level) {
    MIN_LEVEL.store(level as u8, Ordering::SeqCst);
}

/// Enables output when [`ENV_VAR`] is set to `1`, `true`, or a level name.
///
/// Returns whether output ended up enabled.
pub fn init_from_env() -> bool {
    let Ok(value) = std::env::var(ENV_VAR) else {
        return is_enabled();
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "off" => {}
        "1" | "true" | "on" => enable(),
        other => {
            if let Some(level) = Level::parse(other) {
                set_min_level(level);
            }
            enable();
        }
    }
    is_enabled()
}

fn elapsed_ms() -> u64 {
    let start = START_TIME_MS.load(Ordering::Relaxed);
    if start == 0 {
        return 0;
    }
    now_ms().saturating_sub(start)
}

/// Debug log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    /// Per-iteration timing.
    Trace = 0,
    /// Debug information.
    Debug = 1,
    /// Lifecycle messages.
    Info = 2,
    /// Recoverable problems (skipped samples, malformed entries).
    Warn = 3,
    /// Failures.
    Error = 4,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }

    fn color_code(self) -> &'static str {
        match self {
            Level::Trace => "\x1b[90m", // Gray
            Level::Debug => "\x1b[36m", // Cyan
            Level::Info => "\x1b[32m",  // Green
            Level::Warn => "\x1b[33m",  // Yellow
            Level::Error => "\x1b[31m", // Red
        }
    }

    /// Parses a level name (case-insensitive).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            _ => None,
        }
    }
}

/// Returns true if a message at `level` would be written.
#[inline]
pub fn would_log(level: Level) -> bool {
    is_enabled() && level as u8 >= MIN_LEVEL.load(Ordering::Relaxed)
}

/// Writes a log line if output is enabled and `level` passes the filter.
pub fn log(level: Level, component: &str, message: &str) {
    if !would_log(level) {
        return;
    }

    let _ = writeln!(
        io::stderr().lock(),
        "[+{:04}ms] {}[{:5}]\x1b[0m [{}] {}",
        elapsed_ms(),
        level.color_code(),
        level.as_str(),
        component,
        message
    );
}

/// Logs with format arguments.
#[macro_export]
macro_rules! debug_log {
    ($level:expr, $component:expr, $($arg:tt)*) => {
        if $crate::debug::would_log($level) {
            $crate::debug::log($level, $component, &format!($($arg)*));
        }
    };
}

/// Trace-level log line.
#[macro_export]
macro_rules! log_trace {
    ($component:expr, $($arg:tt)*) => {
        $crate::debug_log!($crate::debug::Level::Trace, $component, $($arg)*)
    };
}

/// Debug-level log line.
#[macro_export]
macro_rules! log_debug {
    ($component:expr, $($arg:tt)*) => {
        $crate::debug_log!($crate::debug::Level::Debug, $component, $($arg)*)
    };
}

/// Info-level log line.
#[macro_export]
macro_rules! log_info {
    ($component:expr, $($arg:tt)*) => {
        $crate::debug_log!($crate::debug::Level::Info, $component, $($arg)*)
    };
}

/// Warn-level log line.
#[macro_export]
macro_rules! log_warn {
    ($component:expr, $($arg:tt)*) => {
        $crate::debug_log!($crate::debug::Level::Warn, $component, $($arg)*)
    };
}

/// Error-level log line.
#[macro_export]
macro_rules! log_error {
    ($component:expr, $($arg:tt)*) => {
        $crate::debug_log!($crate::debug::Level::Error, $component, $($arg)*)
    };
}

/// RAII guard logging entry and exit (with duration) of a scope at trace level.
pub struct TimingGuard {
    component: &'static str,
    operation: String,
    start: Instant,
}

impl TimingGuard {
    /// Creates a new timing guard.
    pub fn new(component: &'static str, operation: impl Into<String>) -> Self {
        let operation = operation.into();
        if would_log(Level::Trace) {
            log(Level::Trace, component, &format!("-> {operation}"));
        }
        Self { component, operation, start: Instant::now() }
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        if would_log(Level::Trace) {
            log(
                Level::Trace,
                self.component,
                &format!(
                    "<- {} ({:.2}ms)",
                    self.operation,
                    self.start.elapsed().as_secs_f64() * 1000.0
                ),
            );
        }
    }
}

/// Creates a timing guard for the rest of the enclosing scope.
#[macro_export]
macro_rules! time_scope {
    ($component:expr, $operation:expr) => {
        let _guard = $crate::debug::TimingGuard::new($component, $operation);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_as_str() {
        assert_eq!(Level::Trace.as_str(), "TRACE");
        assert_eq!(Level::Warn.as_str(), "WARN");
        assert_eq!(Level::Error.as_str(), "ERROR");
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Warn < Level::Error);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(Level::parse("TRACE"), Some(Level::Trace));
        assert_eq!(Level::parse("warning"), Some(Level::Warn));
        assert_eq!(Level::parse("loud"), None);
    }

    #[test]
    fn test_level_has_color() {
        for level in [Level::Trace, Level::Debug, Level::Info, Level::Warn, Level::Error] {
            assert!(!level.color_code().is_empty());
        }
    }

    #[test]
    fn test_log_and_guard_do_not_panic() {
        enable();
        log(Level::Info, "test", "hello world");
        crate::log_warn!("test", "formatted {}", 42);
        {
            let _guard = TimingGuard::new("test", "operation");
        }
        disable();
        log(Level::Error, "test", "suppressed");
    }
}
