//! Property tests for sample evaluation.
#![allow(clippy::unwrap_used)]

use approx::assert_relative_eq;
use contention_monitor::{Analyzer, Config, EventOrigin, Sample, Severity, Thresholds};
use proptest::prelude::*;

const TICK: f64 = 0.5;

fn analyzer() -> Analyzer {
    Analyzer::new(TICK, Thresholds::new(30.0, 60.0).unwrap()).unwrap()
}

fn sample_strategy() -> impl Strategy<Value = Sample> {
    (0.0f64..50.0, prop::collection::vec(0.0f64..120.0, 0..6)).prop_map(|(inc, waits)| {
        waits
            .into_iter()
            .enumerate()
            .fold(Sample::new(inc), |s, (i, w)| s.with(format!("res-{i}"), w))
    })
}

fn expected_breach(sample: &Sample) -> Option<(Severity, String)> {
    let first = |limit: f64| {
        sample
            .entries()
            .iter()
            .find(|e| e.record.total_wait_ticks.is_some_and(|w| w > limit))
            .map(|e| e.resource.clone())
    };
    first(60.0)
        .map(|r| (Severity::Error, r))
        .or_else(|| first(30.0).map(|r| (Severity::Warning, r)))
}

proptest! {
    #[test]
    fn prop_ticks_and_series_track_calls(
        samples in prop::collection::vec(sample_strategy(), 0..40),
    ) {
        let a = analyzer();
        for s in &samples {
            a.evaluate(s.clone());
        }

        prop_assert_eq!(a.elapsed_ticks(), samples.len() as u64);
        let series = a.throughput_series();
        prop_assert_eq!(series.len(), samples.len());
        for (i, point) in series.iter().enumerate() {
            assert_relative_eq!(point.elapsed_seconds, (i + 1) as f64 * TICK);
        }
    }

    #[test]
    fn prop_cumulative_is_running_sum(samples in prop::collection::vec(sample_strategy(), 1..40)) {
        let a = analyzer();
        let mut expected = 0.0;
        for s in &samples {
            expected += s.throughput_increment;
            a.evaluate(s.clone());
        }

        assert_relative_eq!(a.cumulative_transferred(), expected, max_relative = 1e-9);
        let series = a.throughput_series();
        prop_assert!(series.windows(2).all(|w| w[0].cumulative_value <= w[1].cumulative_value));
        assert_relative_eq!(series.last().unwrap().cumulative_value, expected, max_relative = 1e-9);
    }

    #[test]
    fn prop_at_most_one_event_per_call(samples in prop::collection::vec(sample_strategy(), 0..40)) {
        let a = analyzer();
        let mut returned = Vec::new();
        for s in &samples {
            let before = a.events().len();
            let event = a.evaluate(s.clone());
            let after = a.events().len();
            prop_assert_eq!(after - before, usize::from(event.is_some()));
            returned.extend(event);
        }
        prop_assert_eq!(returned, a.events());
    }

    #[test]
    fn prop_classification_picks_first_breach(sample in sample_strategy()) {
        let a = analyzer();
        let expected = expected_breach(&sample);
        let event = a.evaluate(sample);

        match (expected, event) {
            (None, None) => {}
            (Some((severity, resource)), Some(event)) => {
                prop_assert_eq!(event.severity(), severity);
                prop_assert_eq!(event.origin(), &EventOrigin::Contention { resource });
                assert_relative_eq!(event.timestamp(), TICK);
            }
            (expected, event) => prop_assert!(false, "expected {:?}, got {:?}", expected, event),
        }
    }

    #[test]
    fn prop_snapshot_mirrors_last_sample(
        samples in prop::collection::vec(sample_strategy(), 1..10),
    ) {
        let a = analyzer();
        for s in &samples {
            a.evaluate(s.clone());
        }

        let last = samples.last().unwrap();
        let snapshot = a.contention_snapshot();
        let names: Vec<_> = last.entries().iter().map(|e| e.resource.clone()).collect();
        prop_assert_eq!(snapshot.names, names);
        prop_assert_eq!(snapshot.wait_ticks.len(), last.len());
    }

    #[test]
    fn prop_invalid_increments_never_decrease_total(
        incs in prop::collection::vec(-10.0f64..10.0, 1..30),
    ) {
        let a = analyzer();
        let mut last = 0.0;
        for inc in incs {
            a.evaluate(Sample::new(inc));
            let now = a.cumulative_transferred();
            prop_assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn prop_seeded_demo_runs_repeat(seed in any::<u64>(), ticks in 16usize..24) {
        let run = || {
            let mut config = Config::demo();
            config.rng_seed = Some(seed);
            let a = Analyzer::from_config(&config).unwrap();
            for _ in 0..ticks {
                a.evaluate(Sample::new(1.0));
            }
            a.events()
        };

        let events = run();
        prop_assert_eq!(&events, &run());
        prop_assert!(events.iter().all(|e| e.is_injected() && e.severity() == Severity::Error));
        // Window (15, 17) with 1 s ticks admits only t = 16
        prop_assert!(events.iter().all(|e| e.timestamp() == 16.0));
    }
}

#[test]
fn test_breach_suppresses_injection() {
    let mut config = Config::demo();
    config.fault_injector.probability = 1.0;
    config.rng_seed = Some(1);
    let a = Analyzer::from_config(&config).unwrap();

    for t in 1..=20 {
        let sample = if t == 16 { Sample::new(1.0).with("Lock-A", 45.0) } else { Sample::new(1.0) };
        a.evaluate(sample);
    }

    let events = a.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].severity(), Severity::Warning);
    assert!(!events[0].is_injected());
}

#[test]
fn test_threshold_boundaries_are_strict() {
    let a = analyzer();
    assert!(a.evaluate(Sample::new(0.0).with("x", 30.0)).is_none());
    assert_eq!(a.evaluate(Sample::new(0.0).with("x", 60.0)).unwrap().severity(), Severity::Warning);
    assert_eq!(a.evaluate(Sample::new(0.0).with("x", 60.5)).unwrap().severity(), Severity::Error);
}
