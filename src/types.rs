//! Core types for the contention monitor.
//!
//! - [`Sample`]: one poll's worth of contention records plus a throughput increment
//! - [`Event`]: an immutable, severity-tagged classification result
//! - [`TimeSeriesPoint`]: one point of the cumulative throughput series
//! - [`Sampler`]: trait for sample sources (live instrumentation or test doubles)
//!
//! # Ordering
//!
//! A [`Sample`] keeps its entries in insertion order. Classification scans
//! entries in that order, so the first breaching resource a sampler inserts
//! is the one reported. Inserting a name that already exists replaces its
//! record in place without moving it.

use super::error::Result;
use std::fmt;

/// Per-resource wait measurement for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContentionRecord {
    /// Accumulated wait ticks. `None` means the source reported no value.
    pub total_wait_ticks: Option<f64>,

    /// Identifier (PID) of the current owner, when known.
    pub owner: Option<u32>,
}

impl ContentionRecord {
    /// Creates a record with a wait value and no owner.
    #[must_use]
    pub fn new(total_wait_ticks: f64) -> Self {
        Self { total_wait_ticks: Some(total_wait_ticks), owner: None }
    }

    /// Creates a record with a missing wait value.
    #[must_use]
    pub fn missing() -> Self {
        Self { total_wait_ticks: None, owner: None }
    }

    /// Sets the owning PID.
    #[must_use]
    pub fn with_owner(mut self, pid: u32) -> Self {
        self.owner = Some(pid);
        self
    }

    /// Returns the wait ticks if they are present, finite and non-negative.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the record is malformed.
    pub fn validated_wait(&self) -> std::result::Result<f64, &'static str> {
        match self.total_wait_ticks {
            None => Err("missing wait ticks"),
            Some(w) if !w.is_finite() => Err("non-finite wait ticks"),
            Some(w) if w < 0.0 => Err("negative wait ticks"),
            Some(w) => Ok(w),
        }
    }
}

/// A named contention record.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentionEntry {
    /// Resource name (lock, pipe, socket, queue).
    pub resource: String,

    /// The measurement for this resource.
    pub record: ContentionRecord,
}

/// One sample: ordered contention entries plus a throughput increment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sample {
    entries: Vec<ContentionEntry>,

    /// Units transferred since the previous sample. Expected `>= 0`.
    pub throughput_increment: f64,
}

impl Sample {
    /// Creates an empty sample with the given throughput increment.
    #[must_use]
    pub fn new(throughput_increment: f64) -> Self {
        Self { entries: Vec::new(), throughput_increment }
    }

    /// Inserts or replaces the record for `resource`, keeping first-insertion position.
    pub fn insert(&mut self, resource: impl Into<String>, record: ContentionRecord) {
        let resource = resource.into();
        match self.entries.iter_mut().find(|e| e.resource == resource) {
            Some(existing) => existing.record = record,
            None => self.entries.push(ContentionEntry { resource, record }),
        }
    }

    /// Builder form of [`Sample::insert`] taking a plain wait value.
    #[must_use]
    pub fn with(mut self, resource: impl Into<String>, wait_ticks: f64) -> Self {
        self.insert(resource, ContentionRecord::new(wait_ticks));
        self
    }

    /// Builder form of [`Sample::insert`] taking a full record.
    #[must_use]
    pub fn with_record(mut self, resource: impl Into<String>, record: ContentionRecord) -> Self {
        self.insert(resource, record);
        self
    }

    /// Looks up the record for a resource.
    #[must_use]
    pub fn get(&self, resource: &str) -> Option<&ContentionRecord> {
        self.entries.iter().find(|e| e.resource == resource).map(|e| &e.record)
    }

    /// Entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[ContentionEntry] {
        &self.entries
    }

    /// Consumes the sample, returning its entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<ContentionEntry> {
        self.entries
    }

    /// Number of contention entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the sample carries no contention entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ordinal event severity: `Info < Warning < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational.
    Info,
    /// Significant contention.
    Warning,
    /// Severe contention or an injected fault.
    Error,
}

impl Severity {
    /// Upper-case label used in event lines.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// ANSI colour used by terminal consumers.
    #[must_use]
    pub fn color_code(&self) -> &'static str {
        match self {
            Self::Info => "\x1b[34m",    // Blue
            Self::Warning => "\x1b[33m", // Yellow
            Self::Error => "\x1b[31m",   // Red
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where an event came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOrigin {
    /// Derived from a measured contention record.
    Contention {
        /// The breaching resource.
        resource: String,
    },

    /// Synthesised by a fault injector. Not evidence of a real deadlock.
    Injected {
        /// The resource pair named in the simulated circular wait.
        pair: (String, String),
    },

    /// Emitted by a consumer or session for its own bookkeeping.
    Lifecycle,
}

/// A severity-tagged event. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    timestamp: f64,
    severity: Severity,
    message: String,
    origin: EventOrigin,
}

impl Event {
    /// Creates an event.
    #[must_use]
    pub fn new(
        timestamp: f64,
        severity: Severity,
        message: impl Into<String>,
        origin: EventOrigin,
    ) -> Self {
        Self { timestamp, severity, message: message.into(), origin }
    }

    /// Creates an informational lifecycle event.
    #[must_use]
    pub fn info(timestamp: f64, message: impl Into<String>) -> Self {
        Self::new(timestamp, Severity::Info, message, EventOrigin::Lifecycle)
    }

    /// Elapsed seconds at which the event was produced.
    #[must_use]
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Event severity.
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Event origin.
    #[must_use]
    pub fn origin(&self) -> &EventOrigin {
        &self.origin
    }

    /// Returns true if the event was synthesised by a fault injector.
    #[must_use]
    pub fn is_injected(&self) -> bool {
        matches!(self.origin, EventOrigin::Injected { .. })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Time {:.1}s: [{}] {}", self.timestamp, self.severity, self.message)
    }
}

/// One point of the cumulative throughput series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSeriesPoint {
    /// Elapsed seconds at this tick.
    pub elapsed_seconds: f64,

    /// Cumulative value at this tick.
    pub cumulative_value: f64,
}

/// Point-in-time view of the latest contention, in sample order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentionSnapshot {
    /// Resource names.
    pub names: Vec<String>,

    /// Wait ticks, index-aligned with `names`.
    pub wait_ticks: Vec<f64>,
}

impl ContentionSnapshot {
    /// Number of resources in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates `(name, wait_ticks)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names.iter().map(String::as_str).zip(self.wait_ticks.iter().copied())
    }
}

/// Trait for sample sources.
///
/// Samplers run on the poller thread, so they must be `Send`. A call to
/// [`Sampler::sample`] must return in bounded time.
///
/// # Example
///
/// ```rust,ignore
/// use contention_monitor::{Result, Sample, Sampler};
///
/// struct Fixed;
///
/// impl Sampler for Fixed {
///     fn id(&self) -> &'static str {
///         "fixed"
///     }
///
///     fn sample(&mut self) -> Result<Sample> {
///         Ok(Sample::new(10.0).with("Lock-A", 45.0))
///     }
/// }
/// ```
pub trait Sampler: Send {
    /// Returns the unique identifier for this sampler.
    fn id(&self) -> &'static str;

    /// Produces one sample.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::SampleUnavailable`](super::error::MonitorError::SampleUnavailable)
    /// when the source cannot be read this iteration.
    fn sample(&mut self) -> Result<Sample>;

    /// Returns true if this sampler can run on the current system.
    fn is_available(&self) -> bool {
        true
    }

    /// Returns a human-readable name for this sampler.
    fn display_name(&self) -> &'static str {
        self.id()
    }
}

/// A boxed sampler for dynamic dispatch.
pub type BoxedSampler = Box<dyn Sampler>;

impl Sampler for BoxedSampler {
    fn id(&self) -> &'static str {
        (**self).id()
    }

    fn sample(&mut self) -> Result<Sample> {
        (**self).sample()
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn display_name(&self) -> &'static str {
        (**self).display_name()
    }
}

/// Sampler backed by a closure. Handy for test doubles.
pub struct FnSampler<F> {
    id: &'static str,
    f: F,
}

impl<F> FnSampler<F>
where
    F: FnMut() -> Result<Sample> + Send,
{
    /// Wraps `f` as a sampler named `id`.
    pub fn new(id: &'static str, f: F) -> Self {
        Self { id, f }
    }
}

impl<F> Sampler for FnSampler<F>
where
    F: FnMut() -> Result<Sample> + Send,
{
    fn id(&self) -> &'static str {
        self.id
    }

    fn sample(&mut self) -> Result<Sample> {
        (self.f)()
    }
}
