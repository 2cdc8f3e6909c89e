//! Monitoring session: the composition root.
//!
//! A [`Session`] validates a [`Config`], owns the shared [`Analyzer`] and
//! drives one [`Poller`] at a time. Stopping keeps the accumulated state for
//! display; [`Session::restart`] discards it and begins a fresh session.
//!
//! The consumer also receives two INFO notices per run: one before the first
//! tick and one after the poller has been joined. They are not analysis
//! results, so they never enter the analyzer's event log.

use crate::analyzer::{Analyzer, SessionSummary};
use crate::config::Config;
use crate::error::{MonitorError, Result};
use crate::log_info;
use crate::poller::{Poller, PollerState, StopHandle};
use crate::types::{ContentionSnapshot, Event, Sampler, TimeSeriesPoint};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const COMPONENT: &str = "session";

type Consumer = Arc<Mutex<dyn FnMut(Event) + Send>>;

/// A configured monitoring session.
pub struct Session {
    config: Config,
    analyzer: Arc<Analyzer>,
    poller: Poller,
    /// Event consumer of the current run, kept for the closing notice.
    consumer: Option<Consumer>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("analyzer", &self.analyzer)
            .field("poller", &self.poller)
            .finish_non_exhaustive()
    }
}

fn deliver(consumer: &Consumer, event: Event) {
    let mut guard = consumer.lock().expect("event consumer lock poisoned");
    let on_event = &mut *guard;
    on_event(event);
}

impl Session {
    /// Validates `config` and builds a zeroed analyzer. Does not start polling.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidConfig`](crate::MonitorError::InvalidConfig)
    /// for any rule violated by `config`.
    pub fn new(config: Config) -> Result<Self> {
        let analyzer = Arc::new(Analyzer::from_config(&config)?);
        Ok(Self { config, analyzer, poller: Poller::new(), consumer: None })
    }

    /// The configuration this session was built from.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared handle to the analyzer, for consumers that read snapshots.
    #[must_use]
    pub fn analyzer(&self) -> Arc<Analyzer> {
        Arc::clone(&self.analyzer)
    }

    /// Polling interval from the configuration.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.config.polling_interval()
    }

    /// Starts polling `sampler` at the configured interval.
    ///
    /// A session whose previous poller has stopped gets a fresh poller; the
    /// analyzer state carries on from where it stopped. `on_event` receives a
    /// "Monitoring started" notice before any analysis event.
    ///
    /// # Errors
    ///
    /// - [`MonitorError::SampleUnavailable`] if the sampler reports it cannot run here
    /// - [`Poller::start`] errors (a poller already running included)
    pub fn start<S, F>(&mut self, sampler: S, on_event: F) -> Result<()>
    where
        S: Sampler + 'static,
        F: FnMut(Event) + Send + 'static,
    {
        if !sampler.is_available() {
            return Err(MonitorError::unavailable(sampler.id(), "not available on this system"));
        }
        match self.poller.state() {
            PollerState::Stopped => self.poller = Poller::new(),
            PollerState::Created => {}
            state => {
                return Err(MonitorError::InvalidState { operation: "start", state: state.name() });
            }
        }

        let interval = self.interval();
        log_info!(COMPONENT, "monitoring with '{}' every {interval:?}", sampler.display_name());
        let consumer: Consumer = Arc::new(Mutex::new(on_event));
        deliver(
            &consumer,
            Event::info(
                self.analyzer.elapsed_seconds(),
                format!(
                    "Monitoring started with {}, polling every {}s...",
                    sampler.display_name(),
                    interval.as_secs_f64()
                ),
            ),
        );

        let forward = Arc::clone(&consumer);
        self.poller.start(sampler, Arc::clone(&self.analyzer), interval, move |event| {
            deliver(&forward, event);
        })?;
        self.consumer = Some(consumer);
        Ok(())
    }

    /// Requests the poller to stop. Non-blocking.
    pub fn stop(&self) {
        self.poller.stop();
    }

    /// Returns a handle that stops the current poller from any thread.
    ///
    /// A later [`Session::start`] after a stop uses a new poller, which this
    /// handle does not reach.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.poller.stop_handle()
    }

    /// Waits for the poller to exit, then sends the "Monitoring stopped." notice.
    ///
    /// # Errors
    ///
    /// See [`Poller::join`]. The notice is skipped if the consumer panicked.
    pub fn join(&mut self) -> Result<()> {
        let joined = self.poller.join();
        let consumer = self.consumer.take();
        joined?;
        if let Some(consumer) = consumer {
            deliver(&consumer, Event::info(self.analyzer.elapsed_seconds(), "Monitoring stopped."));
        }
        Ok(())
    }

    /// Stops and joins.
    ///
    /// # Errors
    ///
    /// See [`Poller::join`].
    pub fn shutdown(&mut self) -> Result<()> {
        self.poller.stop();
        self.join()
    }

    /// Stops any running poller, zeroes the analyzer and starts again.
    ///
    /// # Errors
    ///
    /// Propagates join and start errors.
    pub fn restart<S, F>(&mut self, sampler: S, on_event: F) -> Result<()>
    where
        S: Sampler + 'static,
        F: FnMut(Event) + Send + 'static,
    {
        self.shutdown()?;
        self.analyzer.reset();
        log_info!(COMPONENT, "session restarted");
        self.start(sampler, on_event)
    }

    /// Current poller state.
    #[must_use]
    pub fn poller_state(&self) -> PollerState {
        self.poller.state()
    }

    /// Iterations skipped because the sampler failed (current poller only).
    #[must_use]
    pub fn missed_samples(&self) -> u64 {
        self.poller.missed_samples()
    }

    /// Latest contention, in sample order.
    #[must_use]
    pub fn contention_snapshot(&self) -> ContentionSnapshot {
        self.analyzer.contention_snapshot()
    }

    /// Cumulative throughput series.
    #[must_use]
    pub fn throughput_series(&self) -> Vec<TimeSeriesPoint> {
        self.analyzer.throughput_series()
    }

    /// Aggregate counters.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        self.analyzer.summary()
    }
}
