//! Contention analyzer.
//!
//! Owns the session state and turns one [`Sample`] per call into updated
//! cumulative metrics and at most one [`Event`].
//!
//! # Classification
//!
//! Entries are scanned in sample order. A wait strictly above the error
//! threshold wins immediately; otherwise the first wait strictly above the
//! warning threshold wins. Only when neither exists is the fault injector
//! consulted.
//!
//! # Concurrency
//!
//! The poller is the only writer. Consumers read snapshots from other
//! threads. Each [`Analyzer::evaluate`] holds the write lock for the whole
//! composite update, and each read holds the read lock, so a reader sees
//! either the state before a tick or the state after it, never a mix.

use crate::config::{self, Config, ThresholdConfig};
use crate::error::{MonitorError, Result};
use crate::fault::{self, FaultInjector, NoFaults};
use crate::types::{
    ContentionEntry, ContentionSnapshot, Event, EventOrigin, Sample, Severity, TimeSeriesPoint,
};
use crate::{log_debug, log_warn};
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

const COMPONENT: &str = "analyzer";

/// Validated wait-tick thresholds (`warning < error`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    warning: f64,
    error: f64,
}

impl Thresholds {
    /// Creates thresholds, rejecting `warning >= error`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidConfig`] for non-finite or inverted values.
    pub fn new(warning: f64, error: f64) -> Result<Self> {
        config::validate_thresholds(&ThresholdConfig { warning, error })?;
        Ok(Self { warning, error })
    }

    /// Warning threshold.
    #[must_use]
    pub fn warning(&self) -> f64 {
        self.warning
    }

    /// Error threshold.
    #[must_use]
    pub fn error(&self) -> f64 {
        self.error
    }

    /// Severity for a single wait value, if it breaches a threshold.
    #[must_use]
    pub fn classify(&self, wait_ticks: f64) -> Option<Severity> {
        if wait_ticks > self.error {
            Some(Severity::Error)
        } else if wait_ticks > self.warning {
            Some(Severity::Warning)
        } else {
            None
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        let t = ThresholdConfig::default();
        Self { warning: t.warning, error: t.error }
    }
}

/// Mutable session state. Cloned out as an immutable snapshot for readers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyzerState {
    elapsed_ticks: u64,
    cumulative_transferred: f64,
    throughput_series: Vec<TimeSeriesPoint>,
    event_log: Vec<Event>,
    latest_contention: Vec<ContentionEntry>,
    invalid_inputs: u64,
}

impl AnalyzerState {
    /// Number of evaluated samples.
    #[must_use]
    pub fn elapsed_ticks(&self) -> u64 {
        self.elapsed_ticks
    }

    /// Total throughput since session start.
    #[must_use]
    pub fn cumulative_transferred(&self) -> f64 {
        self.cumulative_transferred
    }

    /// Cumulative throughput series, one point per tick.
    #[must_use]
    pub fn throughput_series(&self) -> &[TimeSeriesPoint] {
        &self.throughput_series
    }

    /// Every event produced this session, oldest first.
    #[must_use]
    pub fn event_log(&self) -> &[Event] {
        &self.event_log
    }

    /// Valid entries of the most recent sample, in sample order.
    #[must_use]
    pub fn latest_contention(&self) -> &[ContentionEntry] {
        &self.latest_contention
    }

    /// Rejected inputs: malformed entries plus invalid throughput increments.
    #[must_use]
    pub fn invalid_inputs(&self) -> u64 {
        self.invalid_inputs
    }
}

/// Aggregate view of a session for status lines and reports.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionSummary {
    /// Number of evaluated samples.
    pub elapsed_ticks: u64,
    /// Simulated elapsed seconds.
    pub elapsed_seconds: f64,
    /// Total throughput.
    pub cumulative_transferred: f64,
    /// WARNING events logged.
    pub warning_events: usize,
    /// ERROR events logged (including injected ones).
    pub error_events: usize,
    /// Events synthesised by the fault injector.
    pub injected_events: usize,
    /// Rejected inputs.
    pub invalid_inputs: u64,
}

impl SessionSummary {
    /// Total number of logged events.
    #[must_use]
    pub fn total_events(&self) -> usize {
        self.warning_events + self.error_events
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ticks ({:.1}s), {:.1} transferred, {} events ({} error / {} warning, {} injected), \
             {} invalid inputs",
            self.elapsed_ticks,
            self.elapsed_seconds,
            self.cumulative_transferred,
            self.total_events(),
            self.error_events,
            self.warning_events,
            self.injected_events,
            self.invalid_inputs,
        )
    }
}

struct Inner {
    state: AnalyzerState,
    injector: Box<dyn FaultInjector>,
}

/// A threshold breach found while scanning a sample.
struct Breach {
    severity: Severity,
    resource: String,
    wait_ticks: f64,
}

/// Stateful sample classifier.
pub struct Analyzer {
    tick_size: f64,
    thresholds: Thresholds,
    inner: RwLock<Inner>,
}

impl Analyzer {
    /// Creates an analyzer with zeroed state and no fault injection.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidConfig`] for a non-positive tick size.
    pub fn new(tick_size_secs: f64, thresholds: Thresholds) -> Result<Self> {
        config::validate_tick_size(tick_size_secs)?;
        Ok(Self {
            tick_size: tick_size_secs,
            thresholds,
            inner: RwLock::new(Inner {
                state: AnalyzerState::default(),
                injector: Box::new(NoFaults),
            }),
        })
    }

    /// Builds an analyzer (and its fault injector) from a full configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let thresholds = Thresholds::new(config.thresholds.warning, config.thresholds.error)?;
        let injector = fault::from_config(&config.fault_injector, config.rng_seed)?;
        Ok(Self::new(config.polling.tick_size_secs, thresholds)?.with_injector(injector))
    }

    /// Replaces the fault injector.
    #[must_use]
    pub fn with_injector(self, injector: Box<dyn FaultInjector>) -> Self {
        {
            let mut inner = self.inner.write().expect("analyzer state lock poisoned");
            inner.injector = injector;
        }
        self
    }

    /// Tick size in seconds.
    #[must_use]
    pub fn tick_size(&self) -> f64 {
        self.tick_size
    }

    /// Classification thresholds.
    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("analyzer state lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("analyzer state lock poisoned")
    }

    /// Evaluates one sample: advances the tick, accumulates throughput,
    /// replaces the latest contention and returns at most one event.
    ///
    /// Malformed entries are skipped and logged; they never fail the call.
    pub fn evaluate(&self, sample: Sample) -> Option<Event> {
        let increment = self.accept_throughput(sample.throughput_increment);
        let (valid, mut rejected) = self.partition_entries(sample.into_entries());
        if increment.is_none() {
            rejected += 1;
        }
        let breach = self.scan(&valid);

        let mut guard = self.write();
        let Inner { state, injector } = &mut *guard;

        let ticks = state.elapsed_ticks.checked_add(1).expect("tick counter overflow");
        state.elapsed_ticks = ticks;
        let elapsed_seconds = ticks as f64 * self.tick_size;

        state.cumulative_transferred += increment.unwrap_or(0.0);
        state.throughput_series.push(TimeSeriesPoint {
            elapsed_seconds,
            cumulative_value: state.cumulative_transferred,
        });
        state.latest_contention = valid;
        state.invalid_inputs += rejected;

        let event = match breach {
            Some(breach) => Some(self.breach_event(breach, elapsed_seconds)),
            None => injector.inject(elapsed_seconds),
        };

        if let Some(event) = &event {
            if let Some(last) = state.event_log.last() {
                assert!(
                    last.timestamp() <= event.timestamp(),
                    "event log out of order: {} after {}",
                    event.timestamp(),
                    last.timestamp()
                );
            }
            state.event_log.push(event.clone());
            log_debug!(COMPONENT, "tick {ticks}: {event}");
        }

        event
    }

    /// Returns the increment to add, or `None` when it must be ignored.
    fn accept_throughput(&self, increment: f64) -> Option<f64> {
        if increment.is_finite() && increment >= 0.0 {
            Some(increment)
        } else {
            let err = MonitorError::InvalidSample {
                resource: "throughput_increment".to_string(),
                reason: format!("expected a finite value >= 0, got {increment}"),
            };
            log_warn!(COMPONENT, "{err}");
            None
        }
    }

    fn partition_entries(&self, entries: Vec<ContentionEntry>) -> (Vec<ContentionEntry>, u64) {
        let mut rejected = 0;
        let valid = entries
            .into_iter()
            .filter(|entry| match entry.record.validated_wait() {
                Ok(_) => true,
                Err(reason) => {
                    rejected += 1;
                    let err = MonitorError::InvalidSample {
                        resource: entry.resource.clone(),
                        reason: reason.to_string(),
                    };
                    log_warn!(COMPONENT, "skipping entry: {err}");
                    false
                }
            })
            .collect();
        (valid, rejected)
    }

    fn scan(&self, entries: &[ContentionEntry]) -> Option<Breach> {
        let mut warning = None;
        for entry in entries {
            let Ok(wait_ticks) = entry.record.validated_wait() else {
                continue;
            };
            match self.thresholds.classify(wait_ticks) {
                Some(Severity::Error) => {
                    return Some(Breach {
                        severity: Severity::Error,
                        resource: entry.resource.clone(),
                        wait_ticks,
                    });
                }
                Some(severity) if warning.is_none() => {
                    warning =
                        Some(Breach { severity, resource: entry.resource.clone(), wait_ticks });
                }
                _ => {}
            }
        }
        warning
    }

    fn breach_event(&self, breach: Breach, elapsed_seconds: f64) -> Event {
        let Breach { severity, resource, wait_ticks } = breach;
        let message = match severity {
            Severity::Error => format!(
                "HIGH CONTENTION: resource '{resource}' is severely contested \
                 (wait {wait_ticks:.0} > {:.0})",
                self.thresholds.error
            ),
            _ => format!(
                "CONTENTION WARNING: resource '{resource}' wait {wait_ticks:.0} exceeds {:.0}",
                self.thresholds.warning
            ),
        };
        Event::new(elapsed_seconds, severity, message, EventOrigin::Contention { resource })
    }

    /// Names and waits of the latest sample, in sample order.
    #[must_use]
    pub fn contention_snapshot(&self) -> ContentionSnapshot {
        let inner = self.read();
        let latest = &inner.state.latest_contention;
        ContentionSnapshot {
            names: latest.iter().map(|e| e.resource.clone()).collect(),
            wait_ticks: latest.iter().map(|e| e.record.total_wait_ticks.unwrap_or(0.0)).collect(),
        }
    }

    /// Copy of the cumulative throughput series.
    #[must_use]
    pub fn throughput_series(&self) -> Vec<TimeSeriesPoint> {
        self.read().state.throughput_series.clone()
    }

    /// Copy of the event log.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.read().state.event_log.clone()
    }

    /// Events logged after the first `seen` ones. Lets consumers catch up.
    #[must_use]
    pub fn events_since(&self, seen: usize) -> Vec<Event> {
        self.read().state.event_log.iter().skip(seen).cloned().collect()
    }

    /// Number of evaluated samples.
    #[must_use]
    pub fn elapsed_ticks(&self) -> u64 {
        self.read().state.elapsed_ticks
    }

    /// Simulated elapsed seconds (`elapsed_ticks * tick_size`).
    #[must_use]
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_ticks() as f64 * self.tick_size
    }

    /// Total throughput since session start.
    #[must_use]
    pub fn cumulative_transferred(&self) -> f64 {
        self.read().state.cumulative_transferred
    }

    /// Consistent copy of the whole session state.
    #[must_use]
    pub fn state(&self) -> AnalyzerState {
        self.read().state.clone()
    }

    /// Aggregate counters for the session.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        let inner = self.read();
        let state = &inner.state;
        let mut summary = SessionSummary {
            elapsed_ticks: state.elapsed_ticks,
            elapsed_seconds: state.elapsed_ticks as f64 * self.tick_size,
            cumulative_transferred: state.cumulative_transferred,
            invalid_inputs: state.invalid_inputs,
            ..SessionSummary::default()
        };
        for event in &state.event_log {
            match event.severity() {
                // Lifecycle notices are delivered by the session, never logged here
                Severity::Info => {}
                Severity::Warning => summary.warning_events += 1,
                Severity::Error => summary.error_events += 1,
            }
            if event.is_injected() {
                summary.injected_events += 1;
            }
        }
        summary
    }

    /// Discards all session state and rewinds the fault injector.
    ///
    /// Call only between sessions, never while a poller is running.
    pub fn reset(&self) {
        let mut inner = self.write();
        inner.state = AnalyzerState::default();
        inner.injector.reset();
        log_debug!(COMPONENT, "session state reset");
    }
}

impl fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        f.debug_struct("Analyzer")
            .field("tick_size", &self.tick_size)
            .field("thresholds", &self.thresholds)
            .field("injector", &inner.injector.id())
            .field("state", &inner.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FaultInjectorConfig;
    use crate::fault::CircularWaitInjector;
    use crate::types::ContentionRecord;
    use approx::assert_relative_eq;

    fn analyzer() -> Analyzer {
        Analyzer::new(1.0, Thresholds::default()).unwrap()
    }

    #[test]
    fn test_initial_state_is_zeroed() {
        let a = analyzer();
        assert_eq!(a.elapsed_ticks(), 0);
        assert_eq!(a.cumulative_transferred(), 0.0);
        assert!(a.throughput_series().is_empty());
        assert!(a.events().is_empty());
        assert!(a.contention_snapshot().is_empty());
    }

    #[test]
    fn test_ticks_and_series_advance() {
        let a = Analyzer::new(0.5, Thresholds::default()).unwrap();
        a.evaluate(Sample::new(10.0));
        a.evaluate(Sample::new(2.5));

        assert_eq!(a.elapsed_ticks(), 2);
        assert_relative_eq!(a.elapsed_seconds(), 1.0);
        assert_relative_eq!(a.cumulative_transferred(), 12.5);
        assert_eq!(
            a.throughput_series(),
            vec![
                TimeSeriesPoint { elapsed_seconds: 0.5, cumulative_value: 10.0 },
                TimeSeriesPoint { elapsed_seconds: 1.0, cumulative_value: 12.5 },
            ]
        );
    }

    #[test]
    fn test_error_breach_references_resource() {
        let a = analyzer();
        let event = a
            .evaluate(Sample::new(1.0).with("quiet", 10.0).with("R", 61.0).with("other", 30.0))
            .expect("61 > 60 must raise an error");

        assert_eq!(event.severity(), Severity::Error);
        assert!(event.message().contains("'R'"));
        assert_eq!(event.origin(), &EventOrigin::Contention { resource: "R".into() });
        assert_eq!(event.timestamp(), 1.0);
    }

    #[test]
    fn test_single_warning() {
        let a = analyzer();
        let event = a.evaluate(Sample::new(1.0).with("pipe", 45.0)).unwrap();
        assert_eq!(event.severity(), Severity::Warning);
        assert!(event.message().contains("pipe"));
    }

    #[test]
    fn test_thresholds_are_strict() {
        let a = analyzer();
        assert!(a.evaluate(Sample::new(1.0).with("a", 30.0)).is_none());
        let event = a.evaluate(Sample::new(1.0).with("a", 60.0)).unwrap();
        assert_eq!(event.severity(), Severity::Warning);
    }

    #[test]
    fn test_error_beats_earlier_warning() {
        let a = analyzer();
        let event =
            a.evaluate(Sample::new(1.0).with("warn", 45.0).with("err", 70.0)).unwrap();
        assert_eq!(event.severity(), Severity::Error);
        assert!(event.message().contains("err"));
    }

    #[test]
    fn test_first_error_wins() {
        let a = analyzer();
        let event =
            a.evaluate(Sample::new(1.0).with("first", 61.0).with("second", 99.0)).unwrap();
        assert_eq!(event.origin(), &EventOrigin::Contention { resource: "first".into() });
    }

    #[test]
    fn test_first_warning_wins() {
        let a = analyzer();
        let event =
            a.evaluate(Sample::new(1.0).with("w1", 31.0).with("w2", 59.0)).unwrap();
        assert_eq!(event.origin(), &EventOrigin::Contention { resource: "w1".into() });
    }

    #[test]
    fn test_quiet_sample_produces_no_event() {
        let a = analyzer();
        for _ in 0..20 {
            assert!(a.evaluate(Sample::new(1.0).with("a", 30.0).with("b", 5.0)).is_none());
        }
        assert!(a.events().is_empty());
    }

    #[test]
    fn test_event_log_appends_returned_events() {
        let a = analyzer();
        a.evaluate(Sample::new(1.0).with("a", 45.0));
        a.evaluate(Sample::new(1.0));
        a.evaluate(Sample::new(1.0).with("a", 90.0));

        let log = a.events();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].timestamp(), 1.0);
        assert_eq!(log[1].timestamp(), 3.0);
        assert_eq!(a.events_since(1), vec![log[1].clone()]);
    }

    #[test]
    fn test_latest_contention_is_replaced_not_merged() {
        let a = analyzer();
        a.evaluate(Sample::new(1.0).with("a", 1.0).with("b", 2.0));
        a.evaluate(Sample::new(1.0).with("c", 3.0));

        let snap = a.contention_snapshot();
        assert_eq!(snap.names, vec!["c".to_string()]);
        assert_eq!(snap.wait_ticks, vec![3.0]);
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let a = analyzer();
        let sample = Sample::new(1.0)
            .with("negative", -5.0)
            .with_record("missing", ContentionRecord::missing())
            .with("bad_but_skipped", f64::NAN)
            .with("ok", 45.0);

        let event = a.evaluate(sample).unwrap();
        assert_eq!(event.origin(), &EventOrigin::Contention { resource: "ok".into() });
        assert_eq!(a.elapsed_ticks(), 1);
        assert_eq!(a.contention_snapshot().names, vec!["ok".to_string()]);
        assert_eq!(a.state().invalid_inputs(), 3);
    }

    #[test]
    fn test_invalid_throughput_is_ignored() {
        let a = analyzer();
        a.evaluate(Sample::new(5.0));
        a.evaluate(Sample::new(-3.0));
        a.evaluate(Sample::new(f64::INFINITY));

        assert_relative_eq!(a.cumulative_transferred(), 5.0);
        assert_eq!(a.elapsed_ticks(), 3);
        assert_eq!(a.state().invalid_inputs(), 2);
    }

    #[test]
    fn test_injector_consulted_only_without_contention_event() {
        let config = FaultInjectorConfig {
            enabled: true,
            probability: 1.0,
            ..FaultInjectorConfig::default()
        };
        let a = analyzer()
            .with_injector(Box::new(CircularWaitInjector::new(&config, Some(7)).unwrap()));

        for _ in 0..15 {
            assert!(a.evaluate(Sample::new(1.0)).is_none());
        }
        // t = 16: contention takes priority over the injector
        let event = a.evaluate(Sample::new(1.0).with("lock", 45.0)).unwrap();
        assert!(!event.is_injected());

        a.reset();
        for _ in 0..15 {
            a.evaluate(Sample::new(1.0));
        }
        let injected = a.evaluate(Sample::new(1.0)).unwrap();
        assert!(injected.is_injected());
        assert_eq!(injected.severity(), Severity::Error);
        assert!(a.evaluate(Sample::new(1.0)).is_none(), "t = 17 is outside the open window");
    }

    #[test]
    fn test_summary_counts() {
        let a = analyzer();
        a.evaluate(Sample::new(2.0).with("a", 45.0));
        a.evaluate(Sample::new(2.0).with("a", 99.0));
        a.evaluate(Sample::new(2.0).with("a", -1.0));

        let summary = a.summary();
        assert_eq!(summary.elapsed_ticks, 3);
        assert_eq!(summary.warning_events, 1);
        assert_eq!(summary.error_events, 1);
        assert_eq!(summary.total_events(), 2);
        assert_eq!(summary.invalid_inputs, 1);
        assert!(summary.to_string().contains("3 ticks"));
    }

    #[test]
    fn test_reset_zeroes_state() {
        let a = analyzer();
        a.evaluate(Sample::new(2.0).with("a", 99.0));
        a.reset();
        assert_eq!(a.state(), AnalyzerState::default());
    }

    #[test]
    fn test_from_config_validates() {
        let mut config = Config::default();
        config.thresholds.warning = 80.0;
        assert!(matches!(Analyzer::from_config(&config), Err(MonitorError::InvalidConfig { .. })));

        let mut config = Config::default();
        config.polling.tick_size_secs = 0.0;
        assert!(Analyzer::from_config(&config).is_err());

        assert!(Analyzer::from_config(&Config::demo()).is_ok());
    }

    #[test]
    fn test_custom_thresholds() {
        let a = Analyzer::new(1.0, Thresholds::new(5.0, 10.0).unwrap()).unwrap();
        let severity = |wait| a.evaluate(Sample::new(0.0).with("x", wait)).unwrap().severity();
        assert_eq!(severity(6.0), Severity::Warning);
        assert_eq!(severity(11.0), Severity::Error);
        assert!(Thresholds::new(10.0, 10.0).is_err());
    }

    #[test]
    fn test_analyzer_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Analyzer>();
    }
}
