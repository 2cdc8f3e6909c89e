//! # Contention Monitor
//!
//! Resource-contention analysis with a cancellable background poller.
//!
//! A [`Sampler`] reports, once per polling interval, how long each shared
//! resource (lock, pipe, socket, queue) has been waited on plus a throughput
//! increment. The [`Analyzer`] classifies the sample against two thresholds,
//! accumulates throughput, and appends at most one [`Event`] per tick. The
//! [`Poller`] runs that loop on its own thread and stops promptly on request.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use contention_monitor::prelude::*;
//!
//! let mut session = Session::new(Config::default())?;
//! session.start(SyntheticSampler::new(Some(42)), |event| println!("{event}"))?;
//! std::thread::sleep(std::time::Duration::from_secs(5));
//! session.shutdown()?;
//! println!("{}", session.summary());
//! ```
//!
//! ## Fault injection
//!
//! [`Config::demo`] enables a [`fault::CircularWaitInjector`] that sometimes
//! reports a *simulated* circular wait inside a time window. These events are
//! tagged [`EventOrigin::Injected`]; nothing here detects real deadlocks.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
// Allow unwrap() in tests only
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Core Modules
// ============================================================================

/// Debug logging (declared first so its macros are visible crate-wide).
pub mod debug;

/// Error types.
pub mod error;

/// Samples, events and the sampler trait.
pub mod types;

/// YAML configuration.
pub mod config;

// ============================================================================
// Analysis
// ============================================================================

/// Synthetic fault injection.
pub mod fault;

/// Threshold classification and session state.
pub mod analyzer;

// ============================================================================
// Runtime
// ============================================================================

/// Background polling loop.
pub mod poller;

/// Session composition (config, analyzer, poller).
pub mod session;

/// Sample sources.
pub mod collectors;

pub use analyzer::{Analyzer, AnalyzerState, SessionSummary, Thresholds};
pub use config::Config;
pub use error::{MonitorError, Result};
pub use poller::{Poller, PollerState, StopHandle};
pub use session::Session;
pub use types::{
    BoxedSampler, ContentionEntry, ContentionRecord, ContentionSnapshot, Event, EventOrigin,
    FnSampler, Sample, Sampler, Severity, TimeSeriesPoint,
};

// ============================================================================
// Prelude
// ============================================================================

/// Commonly used types and traits for convenient imports.
///
/// ```rust,ignore
/// use contention_monitor::prelude::*;
/// ```
pub mod prelude {
    pub use crate::analyzer::{Analyzer, SessionSummary, Thresholds};
    pub use crate::collectors::SyntheticSampler;
    pub use crate::config::Config;
    pub use crate::error::{MonitorError, Result};
    pub use crate::poller::{Poller, PollerState, StopHandle};
    pub use crate::session::Session;
    pub use crate::types::{Event, EventOrigin, Sample, Sampler, Severity};
}
