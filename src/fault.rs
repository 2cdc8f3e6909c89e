//! Synthetic fault injection.
//!
//! A [`FaultInjector`] may synthesise an ERROR event on ticks where measured
//! contention produced nothing. It exists to exercise consumers and demo the
//! event path. **Injected events are not deadlock detection**: they are
//! drawn from a random source, never from lock ownership or wait-for graphs,
//! and they carry [`EventOrigin::Injected`] so consumers can tell them apart.

use crate::config::FaultInjectorConfig;
use crate::error::Result;
use crate::types::{Event, EventOrigin, Severity};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Strategy that may synthesise one event per consulted tick.
pub trait FaultInjector: Send + Sync {
    /// Identifier used in logs.
    fn id(&self) -> &'static str;

    /// Called only on ticks with no contention event.
    fn inject(&mut self, elapsed_seconds: f64) -> Option<Event>;

    /// Returns the injector to its initial state (same seed, same sequence).
    fn reset(&mut self) {}
}

/// Injector that never fires.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFaults;

impl FaultInjector for NoFaults {
    fn id(&self) -> &'static str {
        "none"
    }

    fn inject(&mut self, _elapsed_seconds: f64) -> Option<Event> {
        None
    }
}

/// Randomly reports a simulated circular wait between two configured
/// resources while the elapsed time lies strictly inside a window.
#[derive(Debug)]
pub struct CircularWaitInjector {
    window: (f64, f64),
    probability: f64,
    pairs: Vec<(String, String)>,
    seed: Option<u64>,
    rng: StdRng,
}

impl CircularWaitInjector {
    /// Builds an injector from validated settings.
    ///
    /// With `seed` set, the firing sequence is reproducible across runs.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidConfig`](crate::MonitorError::InvalidConfig)
    /// for an empty pair list, a probability outside `0..=1`, or an empty window.
    pub fn new(config: &FaultInjectorConfig, seed: Option<u64>) -> Result<Self> {
        let mut enabled = config.clone();
        enabled.enabled = true;
        crate::config::validate_fault_injector(&enabled)?;

        Ok(Self {
            window: config.window,
            probability: config.probability,
            pairs: config.pairs.clone(),
            seed,
            rng: make_rng(seed),
        })
    }

    /// Returns true if `elapsed_seconds` lies strictly inside the window.
    #[must_use]
    pub fn in_window(&self, elapsed_seconds: f64) -> bool {
        self.window.0 < elapsed_seconds && elapsed_seconds < self.window.1
    }
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

impl FaultInjector for CircularWaitInjector {
    fn id(&self) -> &'static str {
        "circular_wait"
    }

    fn inject(&mut self, elapsed_seconds: f64) -> Option<Event> {
        if !self.in_window(elapsed_seconds) {
            return None;
        }
        if !self.rng.gen_bool(self.probability) {
            return None;
        }
        let (a, b) = self.pairs.choose(&mut self.rng)?.clone();
        let message = format!(
            "SIMULATED DEADLOCK: circular wait between {a} and {b} (injected fault, not observed)"
        );
        Some(Event::new(
            elapsed_seconds,
            Severity::Error,
            message,
            EventOrigin::Injected { pair: (a, b) },
        ))
    }

    fn reset(&mut self) {
        self.rng = make_rng(self.seed);
    }
}

/// Builds the injector described by `config`, or [`NoFaults`] when disabled.
///
/// # Errors
///
/// Propagates validation errors from [`CircularWaitInjector::new`].
pub fn from_config(
    config: &FaultInjectorConfig,
    seed: Option<u64>,
) -> Result<Box<dyn FaultInjector>> {
    if config.enabled {
        Ok(Box::new(CircularWaitInjector::new(config, seed)?))
    } else {
        Ok(Box::new(NoFaults))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always_fire() -> FaultInjectorConfig {
        FaultInjectorConfig { enabled: true, probability: 1.0, ..FaultInjectorConfig::default() }
    }

    #[test]
    fn test_no_faults_never_fires() {
        let mut inj = NoFaults;
        assert!((0..100).all(|t| inj.inject(f64::from(t)).is_none()));
    }

    #[test]
    fn test_window_is_open_interval() {
        let inj = CircularWaitInjector::new(&always_fire(), Some(1)).unwrap();
        assert!(!inj.in_window(15.0));
        assert!(inj.in_window(16.0));
        assert!(!inj.in_window(17.0));
    }

    #[test]
    fn test_fires_inside_window_with_certainty() {
        let mut inj = CircularWaitInjector::new(&always_fire(), Some(1)).unwrap();

        assert!(inj.inject(14.0).is_none());
        let event = inj.inject(16.0).expect("probability 1.0 inside window");
        assert_eq!(event.severity(), Severity::Error);
        assert!(event.is_injected());
        assert!(event.message().contains("SIMULATED"));
        assert_eq!(event.timestamp(), 16.0);
    }

    #[test]
    fn test_never_fires_with_zero_probability() {
        let config = FaultInjectorConfig { probability: 0.0, ..always_fire() };
        let mut inj = CircularWaitInjector::new(&config, Some(3)).unwrap();
        assert!((0..50).all(|_| inj.inject(16.0).is_none()));
    }

    #[test]
    fn test_pair_comes_from_candidates() {
        let config = always_fire();
        let mut inj = CircularWaitInjector::new(&config, Some(5)).unwrap();
        for _ in 0..20 {
            let event = inj.inject(16.0).unwrap();
            match event.origin() {
                EventOrigin::Injected { pair } => assert!(config.pairs.contains(pair)),
                other => panic!("unexpected origin {other:?}"),
            }
        }
    }

    #[test]
    fn test_seeded_sequences_repeat() {
        let config = FaultInjectorConfig { probability: 0.5, ..always_fire() };
        let run = |seed| {
            let mut inj = CircularWaitInjector::new(&config, Some(seed)).unwrap();
            (0..64).map(|_| inj.inject(16.0).map(|e| e.message().to_string())).collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn test_reset_replays_sequence() {
        let config = FaultInjectorConfig { probability: 0.5, ..always_fire() };
        let mut inj = CircularWaitInjector::new(&config, Some(9)).unwrap();
        let first: Vec<_> = (0..32).map(|_| inj.inject(16.0).is_some()).collect();
        inj.reset();
        let second: Vec<_> = (0..32).map(|_| inj.inject(16.0).is_some()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rejects_empty_pairs() {
        let config = FaultInjectorConfig { pairs: Vec::new(), ..always_fire() };
        assert!(CircularWaitInjector::new(&config, None).is_err());
    }

    #[test]
    fn test_from_config_disabled_is_noop() {
        let mut inj = from_config(&FaultInjectorConfig::default(), Some(1)).unwrap();
        assert_eq!(inj.id(), "none");
        assert!(inj.inject(16.0).is_none());
    }
}
