//! Background polling loop.
//!
//! One [`Poller`] drives one sampling session on its own thread:
//!
//! ```text
//! Created --start--> Running --stop--> StopRequested --loop exits--> Stopped
//! ```
//!
//! Each iteration takes one sample, feeds it to the [`Analyzer`], hands any
//! resulting event to the callback (on the poller thread), then sleeps for
//! the interval. The sleep is a `recv_timeout` on the stop channel, so
//! [`Poller::stop`] cuts it short: shutdown latency is bounded by one
//! in-flight iteration, not by the interval.
//!
//! The callback must return promptly. Consumers that render on another
//! thread should forward events over a channel rather than render inline.
//!
//! [`Poller::join`] needs `&mut self`; a thread that must cancel while
//! another one waits in `join` takes a [`StopHandle`] first.

use crate::analyzer::Analyzer;
use crate::error::{MonitorError, Result};
use crate::types::{Event, Sampler};
use crate::{log_debug, log_error, log_info, log_warn, time_scope};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const COMPONENT: &str = "poller";

/// Lifecycle state of a [`Poller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PollerState {
    /// Constructed, loop not started.
    Created = 0,
    /// Loop running.
    Running = 1,
    /// Stop requested, loop not yet exited.
    StopRequested = 2,
    /// Loop exited. Terminal.
    Stopped = 3,
}

impl PollerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::StopRequested,
            _ => Self::Stopped,
        }
    }

    /// State name for messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Running => "Running",
            Self::StopRequested => "StopRequested",
            Self::Stopped => "Stopped",
        }
    }
}

impl fmt::Display for PollerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State and counters shared between the handle and the loop thread.
#[derive(Debug, Default)]
struct Shared {
    state: AtomicU8,
    iterations: AtomicU64,
    missed_samples: AtomicU64,
    delivered_events: AtomicU64,
}

impl Shared {
    fn state(&self) -> PollerState {
        PollerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn transition(&self, from: PollerState, to: PollerState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// `Running -> StopRequested`, then wakes the sleeping loop.
    fn request_stop(&self, stop_tx: &Sender<()>) {
        if self.transition(PollerState::Running, PollerState::StopRequested) {
            // The loop may already be gone; the state flag covers that case.
            let _ = stop_tx.send(());
            log_debug!(COMPONENT, "stop requested");
        }
    }
}

/// Marks the poller `Stopped` when the loop exits, including by panic.
struct StoppedGuard(Arc<Shared>);

impl Drop for StoppedGuard {
    fn drop(&mut self) {
        self.0.state.store(PollerState::Stopped as u8, Ordering::SeqCst);
    }
}

/// Cloneable, thread-safe way to request a stop.
///
/// Works before, during and after the run; outside `Running` it does nothing.
#[derive(Debug, Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
    stop_tx: Sender<()>,
}

impl StopHandle {
    /// Same as [`Poller::stop`]. Never blocks.
    pub fn stop(&self) {
        self.shared.request_stop(&self.stop_tx);
    }

    /// Current state of the poller this handle belongs to.
    #[must_use]
    pub fn state(&self) -> PollerState {
        self.shared.state()
    }
}

/// Handle to a background polling loop.
#[derive(Debug)]
pub struct Poller {
    shared: Arc<Shared>,
    stop_tx: Sender<()>,
    stop_rx: Option<Receiver<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Creates a poller in the `Created` state.
    #[must_use]
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = mpsc::channel();
        Self { shared: Arc::new(Shared::default()), stop_tx, stop_rx: Some(stop_rx), handle: None }
    }

    /// Returns a handle that can stop this poller from any thread.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle { shared: Arc::clone(&self.shared), stop_tx: self.stop_tx.clone() }
    }

    /// Starts the loop and returns immediately.
    ///
    /// # Errors
    ///
    /// - [`MonitorError::InvalidConfig`] for a zero interval
    /// - [`MonitorError::InvalidState`] unless the poller is `Created`
    /// - [`MonitorError::Spawn`] if the thread cannot be created
    pub fn start<S, F>(
        &mut self,
        sampler: S,
        analyzer: Arc<Analyzer>,
        interval: Duration,
        on_event: F,
    ) -> Result<()>
    where
        S: Sampler + 'static,
        F: FnMut(Event) + Send + 'static,
    {
        if interval.is_zero() {
            return Err(MonitorError::invalid_config("polling.interval_ms", "must be positive"));
        }
        if !self.shared.transition(PollerState::Created, PollerState::Running) {
            return Err(MonitorError::InvalidState {
                operation: "start",
                state: self.shared.state().name(),
            });
        }

        // Only a Created poller gets here, and only Created pollers own a receiver
        let stop_rx = self.stop_rx.take().expect("created poller owns its stop receiver");
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("poller-{}", sampler.id()))
            .spawn(move || run_loop(sampler, &analyzer, interval, on_event, &stop_rx, shared));

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                log_info!(COMPONENT, "started, interval {interval:?}");
                Ok(())
            }
            Err(e) => {
                self.shared.state.store(PollerState::Stopped as u8, Ordering::SeqCst);
                Err(MonitorError::Spawn(e))
            }
        }
    }

    /// Requests cooperative termination. Never blocks; no-op unless `Running`.
    pub fn stop(&self) {
        self.shared.request_stop(&self.stop_tx);
    }

    /// Blocks until the loop has exited. Returns immediately if it never started.
    ///
    /// Does not request a stop by itself; call [`Poller::stop`] first.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::PollerPanicked`] if the loop (or the callback) panicked.
    pub fn join(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let outcome = handle.join();
        log_info!(
            COMPONENT,
            "joined after {} iterations ({} missed samples)",
            self.iterations(),
            self.missed_samples()
        );
        outcome.map_err(|_| MonitorError::PollerPanicked)
    }

    /// Stops and joins in one call.
    ///
    /// # Errors
    ///
    /// See [`Poller::join`].
    pub fn shutdown(&mut self) -> Result<()> {
        self.stop();
        self.join()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PollerState {
        self.shared.state()
    }

    /// Returns true while the loop is running and no stop was requested.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == PollerState::Running
    }

    /// Completed loop iterations.
    #[must_use]
    pub fn iterations(&self) -> u64 {
        self.shared.iterations.load(Ordering::SeqCst)
    }

    /// Iterations skipped because the sampler failed.
    #[must_use]
    pub fn missed_samples(&self) -> u64 {
        self.shared.missed_samples.load(Ordering::SeqCst)
    }

    /// Events handed to the callback.
    #[must_use]
    pub fn delivered_events(&self) -> u64 {
        self.shared.delivered_events.load(Ordering::SeqCst)
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_loop<S, F>(
    mut sampler: S,
    analyzer: &Analyzer,
    interval: Duration,
    mut on_event: F,
    stop_rx: &Receiver<()>,
    shared: Arc<Shared>,
) where
    S: Sampler,
    F: FnMut(Event),
{
    let _stopped = StoppedGuard(Arc::clone(&shared));

    while shared.state() == PollerState::Running {
        {
            time_scope!(COMPONENT, "iteration");
            match sampler.sample() {
                Ok(sample) => {
                    if let Some(event) = analyzer.evaluate(sample) {
                        on_event(event);
                        shared.delivered_events.fetch_add(1, Ordering::SeqCst);
                    }
                }
                Err(err) => {
                    shared.missed_samples.fetch_add(1, Ordering::SeqCst);
                    if err.is_recoverable() {
                        log_warn!(COMPONENT, "skipping tick: {err}");
                    } else {
                        log_error!(COMPONENT, "skipping tick, sampler misbehaving: {err}");
                    }
                }
            }
            shared.iterations.fetch_add(1, Ordering::SeqCst);
        }

        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    log_debug!(COMPONENT, "loop exited");
}
