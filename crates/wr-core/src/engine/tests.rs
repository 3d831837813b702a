use std::collections::BTreeMap;

use wr_config::AggregateKind;

use super::*;
use crate::result::Payload;
use crate::window::WindowStatus;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn key(start: i64, end: i64) -> WindowKey {
    WindowKey::new(start, end).unwrap()
}

fn sum_engine(early: EarlyPolicy) -> WindowEngine<NumericAggregate> {
    WindowEngine::new(
        NumericAggregate::new(AggregateKind::Sum),
        WindowAssigner::tumbling(10).unwrap(),
        EngineSettings {
            early,
            ..EngineSettings::default()
        },
    )
}

fn triples(out: &EngineOutput<Payload>) -> Vec<(i64, i64, Payload, bool)> {
    out.results
        .iter()
        .map(|r| (r.start(), r.end(), r.result().clone(), r.is_early()))
        .collect()
}

/// Integer sum that refuses negative events and cannot finish on 13.
struct Picky;

impl AggregateOp for Picky {
    type Event = i64;
    type Acc = i64;
    type Output = i64;

    fn init(&self) -> i64 {
        0
    }

    fn accumulate(&self, acc: &mut i64, event: &i64) -> anyhow::Result<()> {
        if *event < 0 {
            anyhow::bail!("negative event {event}");
        }
        *acc += event;
        Ok(())
    }

    fn combine(&self, acc: &mut i64, other: i64) {
        *acc += other;
    }

    fn finish(&self, acc: &i64) -> anyhow::Result<i64> {
        if *acc == 13 {
            anyhow::bail!("unlucky sum");
        }
        Ok(*acc)
    }
}

fn picky_engine(early: EarlyPolicy) -> WindowEngine<Picky> {
    WindowEngine::new(
        Picky,
        WindowAssigner::tumbling(10).unwrap(),
        EngineSettings {
            early,
            ..EngineSettings::default()
        },
    )
}

// -- 1. early then final --------------------------------------------------

#[test]
fn periodic_early_then_final_sum() {
    let mut engine = sum_engine(EarlyPolicy::Periodic { interval_ms: 100 });

    assert!(engine.on_event(1, &1.0, 0).unwrap().results.is_empty());
    assert!(engine.on_event(3, &2.0, 10).unwrap().results.is_empty());

    let out = engine.on_watermark(5, 100);
    assert_eq!(triples(&out), vec![(0, 10, Payload::Double(3.0), true)]);
    assert_eq!(engine.window(&key(0, 10)).unwrap().status(), WindowStatus::EarlyEmitting);

    assert!(engine.on_event(7, &3.0, 110).unwrap().results.is_empty());

    let out = engine.on_watermark(10, 120);
    assert_eq!(triples(&out), vec![(0, 10, Payload::Double(6.0), false)]);
    assert_eq!(engine.open_windows(), 0);
}

#[test]
fn periodic_waits_for_interval() {
    let mut engine = sum_engine(EarlyPolicy::Periodic { interval_ms: 100 });
    engine.on_event(1, &1.0, 0).unwrap();
    assert!(engine.on_watermark(5, 99).is_empty());
    assert_eq!(engine.on_tick(100).early_count(), 1);
    // Nothing new since the last early result.
    assert!(engine.on_tick(500).is_empty());
    engine.on_event(6, &1.0, 510).unwrap();
    // The interval counts from the previous early result at 100.
    assert_eq!(engine.on_tick(520).early_count(), 1);
    engine.on_event(7, &1.0, 530).unwrap();
    assert_eq!(engine.on_tick(600).early_count(), 0);
    assert_eq!(engine.on_tick(620).early_count(), 1);
    assert_eq!(engine.window(&key(0, 10)).unwrap().early_emissions(), 3);
}

#[test]
fn count_policy_emits_every_n_events() {
    let mut engine = sum_engine(EarlyPolicy::Count { every: 2 });
    assert_eq!(engine.on_event(1, &1.0, 0).unwrap().early_count(), 0);
    let out = engine.on_event(2, &2.0, 0).unwrap();
    assert_eq!(triples(&out), vec![(0, 10, Payload::Double(3.0), true)]);
    assert_eq!(engine.on_event(3, &4.0, 0).unwrap().early_count(), 0);
    assert_eq!(engine.on_event(4, &8.0, 0).unwrap().early_count(), 1);
}

#[test]
fn no_early_policy_emits_only_finals() {
    let mut engine = sum_engine(EarlyPolicy::None);
    for ts in 0..10 {
        assert!(engine.on_event(ts, &1.0, ts).unwrap().results.is_empty());
    }
    assert!(engine.on_tick(1_000_000).is_empty());
    let out = engine.on_watermark(10, 0);
    assert_eq!(triples(&out), vec![(0, 10, Payload::Double(10.0), false)]);
}

#[test]
fn closing_window_gets_no_early_result() {
    let mut engine = sum_engine(EarlyPolicy::Periodic { interval_ms: 1 });
    engine.on_event(1, &1.0, 0).unwrap();
    let out = engine.on_watermark(10, 1_000);
    assert_eq!(out.early_count(), 0);
    assert_eq!(out.final_count(), 1);
}

// -- 2. late events -------------------------------------------------------

#[test]
fn late_event_after_close_is_dropped() {
    let mut engine = sum_engine(EarlyPolicy::None);
    engine.on_event(1, &1.0, 0).unwrap();
    assert_eq!(engine.on_watermark(12, 0).final_count(), 1);

    let out = engine.on_event(2, &5.0, 0).unwrap();
    assert_eq!(out.dropped_late, 1);
    assert!(out.results.is_empty());
    assert_eq!(engine.late_drops(), 1);
    assert_eq!(engine.open_windows(), 0);

    // Nothing left to re-emit.
    assert!(engine.on_watermark(i64::MAX, 0).results.is_empty());
}

#[test]
fn event_behind_threshold_dropped_even_if_window_open() {
    let mut engine = WindowEngine::new(
        NumericAggregate::new(AggregateKind::Count),
        WindowAssigner::tumbling(10).unwrap(),
        EngineSettings {
            watermark_delay: 5,
            ..EngineSettings::default()
        },
    );
    engine.on_event(19, &1.0, 0).unwrap();
    assert_eq!(engine.watermark(), 14);

    // Window [10, 20) is open but 12 < 14 - 0.
    assert_eq!(engine.on_event(12, &1.0, 0).unwrap().dropped_late, 1);
    assert_eq!(engine.on_event(14, &1.0, 0).unwrap().dropped_late, 0);

    let out = engine.on_watermark(20, 0);
    assert_eq!(triples(&out), vec![(10, 20, Payload::Long(2), false)]);
}

#[test]
fn allowed_lateness_admits_into_open_sliding_window() {
    let mut engine = WindowEngine::new(
        NumericAggregate::new(AggregateKind::Count),
        WindowAssigner::sliding(10, 5).unwrap(),
        EngineSettings {
            allowed_lateness: 10,
            ..EngineSettings::default()
        },
    );
    engine.on_event(12, &1.0, 0).unwrap();
    assert_eq!(engine.watermark(), 12);
    // [0, 10) is closed (and was never opened); [5, 15) is still open.
    let out = engine.on_event(7, &1.0, 0).unwrap();
    assert_eq!(out.dropped_late, 0);
    assert_eq!(engine.window(&key(5, 15)).unwrap().events_since_early(), 2);
    assert!(engine.window(&key(0, 10)).is_none());

    // Every window of ts 3 is closed at watermark 12.
    assert_eq!(engine.on_event(3, &1.0, 0).unwrap().dropped_late, 1);
}

// -- 3. watermark ---------------------------------------------------------

#[test]
fn watermark_never_moves_back() {
    let mut engine = sum_engine(EarlyPolicy::None);
    engine.on_event(25, &1.0, 0).unwrap();
    assert!(engine.on_watermark(20, 0).is_empty());
    assert!(engine.on_watermark(5, 0).is_empty());
    assert_eq!(engine.watermark(), 25);
    engine.on_event(21, &1.0, 0).unwrap();
    assert_eq!(engine.watermark(), 25);
}

#[test]
fn event_never_closes_its_own_window() {
    let mut engine = sum_engine(EarlyPolicy::None);
    let out = engine.on_event(9, &1.0, 0).unwrap();
    assert!(out.results.is_empty());
    let out = engine.on_event(10, &1.0, 0).unwrap();
    assert_eq!(triples(&out), vec![(0, 10, Payload::Double(1.0), false)]);
}

// -- 4. exactly one final per window -------------------------------------

/// Drives a sliding count engine with a scrambled stream and checks, for
/// every window, one final result preceded by all its early results, with
/// a final count equal to the events the window accepted.
#[test]
fn exactly_one_final_per_window() {
    let mut engine = WindowEngine::new(
        NumericAggregate::new(AggregateKind::Count),
        WindowAssigner::sliding(20, 5).unwrap(),
        EngineSettings {
            watermark_delay: 15,
            allowed_lateness: 5,
            early: EarlyPolicy::Count { every: 3 },
        },
    );

    let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
    let mut next = move || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed
    };

    let mut emitted = Vec::new();
    let mut accepted: BTreeMap<WindowKey, i64> = BTreeMap::new();
    let mut base = 0i64;
    for step in 0..2_000 {
        base += (next() % 3) as i64;
        if step % 50 == 49 {
            let out = engine.on_watermark(base - (next() % 40) as i64, step);
            emitted.extend(out.results);
            continue;
        }
        let ts = base - (next() % 30) as i64;
        let wm = engine.watermark();
        if ts >= wm.saturating_sub(5) {
            for k in engine.assigner().assign_windows(ts).unwrap() {
                if !k.is_closed_at(wm) {
                    *accepted.entry(k).or_default() += 1;
                }
            }
        }
        let out = engine.on_event(ts, &1.0, step).unwrap();
        emitted.extend(out.results);
    }
    emitted.extend(engine.on_watermark(i64::MAX, 0).results);
    assert_eq!(engine.open_windows(), 0);

    let mut finals: BTreeMap<WindowKey, usize> = BTreeMap::new();
    for (i, r) in emitted.iter().enumerate() {
        if r.is_early() {
            let later_final = emitted[i + 1..]
                .iter()
                .any(|f| !f.is_early() && f.key() == r.key());
            assert!(later_final, "early result for {} after its final", r.key());
        } else {
            *finals.entry(r.key()).or_default() += 1;
            assert_eq!(*r.result(), Payload::Long(accepted[&r.key()]));
        }
    }
    assert!(finals.values().all(|&n| n == 1));
    assert_eq!(
        finals.keys().collect::<Vec<_>>(),
        accepted.keys().collect::<Vec<_>>()
    );
}

// -- 5. failure isolation ------------------------------------------------

#[test]
fn accumulate_failure_errors_only_that_window() {
    let mut engine = picky_engine(EarlyPolicy::None);
    engine.on_event(1, &2, 0).unwrap();
    let out = engine.on_event(2, &-1, 0).unwrap();
    assert_eq!(out.failures.len(), 1);
    assert_eq!(out.failures[0].key, key(0, 10));
    assert_eq!(out.failures[0].stage, FailureStage::Accumulate);

    // Further input for the errored window is ignored, not re-created.
    let out = engine.on_event(3, &4, 0).unwrap();
    assert!(out.is_empty());
    assert!(engine.window(&key(0, 10)).is_none());
    assert_eq!(engine.errored_windows().collect::<Vec<_>>(), vec![key(0, 10)]);
    engine.on_event(11, &5, 0).unwrap();

    let out = engine.on_watermark(30, 0);
    assert_eq!(out.results.len(), 1);
    assert_eq!(out.results[0].key(), key(10, 20));
    assert_eq!(*out.results[0].result(), 5);
    assert_eq!(engine.errored_windows().count(), 0);
}

#[test]
fn errored_windows_retire_with_watermark() {
    let mut engine = WindowEngine::new(
        NumericAggregate::new(AggregateKind::Sum),
        WindowAssigner::tumbling(10).unwrap(),
        EngineSettings {
            watermark_delay: 1_000_000,
            ..EngineSettings::default()
        },
    );
    for i in 0..1000 {
        engine.on_event(i * 10, &f64::NAN, 0).unwrap();
    }
    assert_eq!(engine.errored_windows().count(), 1000);

    let out = engine.on_watermark(5_000, 0);
    assert!(out.results.is_empty());
    assert_eq!(engine.errored_windows().count(), 500);
    assert_eq!(engine.errored_windows().next(), Some(key(5_000, 5_010)));

    engine.on_watermark(i64::MAX, 0);
    assert_eq!(engine.open_windows(), 0);
    assert_eq!(engine.errored_windows().count(), 0);
}

#[test]
fn errored_window_can_be_discarded_before_its_end() {
    let mut engine = picky_engine(EarlyPolicy::None);
    engine.on_event(1, &-1, 0).unwrap();
    assert!(engine.discard_errored(&key(0, 10)));
    assert!(!engine.discard_errored(&key(0, 10)));
}

#[test]
fn final_finish_failure_emits_nothing() {
    let mut engine = picky_engine(EarlyPolicy::None);
    engine.on_event(1, &13, 0).unwrap();

    // Watermark 12 closes [0, 10), whose sum cannot finish.
    let out = engine.on_event(12, &1, 0).unwrap();
    assert!(out.results.is_empty());
    assert_eq!(out.failures.len(), 1);
    assert_eq!(out.failures[0].stage, FailureStage::FinalFinish);
    assert!(out.failures[0].to_string().contains("unlucky sum"));

    let out = engine.on_watermark(20, 0);
    assert_eq!(out.results.len(), 1);
    assert_eq!(out.results[0].key(), key(10, 20));
    assert!(out.failures.is_empty());

    // The failed window is past its end, so nothing is retained for it.
    assert_eq!(engine.errored_windows().count(), 0);
    assert!(!engine.discard_errored(&key(0, 10)));
}

#[test]
fn early_finish_failure_suppresses_final() {
    let mut engine = picky_engine(EarlyPolicy::Count { every: 1 });
    assert_eq!(engine.on_event(1, &6, 0).unwrap().early_count(), 1);
    let out = engine.on_event(2, &7, 0).unwrap();
    assert_eq!(out.early_count(), 0);
    assert_eq!(out.failures[0].stage, FailureStage::EarlyFinish);

    let out = engine.on_watermark(10, 0);
    assert!(out.results.is_empty());
    assert!(out.failures.is_empty());
}

// -- 6. merge / teardown -------------------------------------------------

#[test]
fn merged_partials_combine_into_final() {
    let mut engine = picky_engine(EarlyPolicy::None);
    engine.on_event(1, &2, 0).unwrap();
    assert_eq!(engine.merge_accumulator(key(0, 10), 40, 0), MergeOutcome::Merged);
    let out = engine.on_watermark(10, 0);
    assert_eq!(*out.results[0].result(), 42);

    assert_eq!(
        engine.merge_accumulator(key(0, 10), 1, 0),
        MergeOutcome::DroppedLate
    );
    assert_eq!(engine.late_drops(), 1);
}

#[test]
fn teardown_emits_nothing() {
    let mut engine = WindowEngine::new(
        Picky,
        WindowAssigner::tumbling(10).unwrap(),
        EngineSettings {
            watermark_delay: 100,
            ..EngineSettings::default()
        },
    );
    engine.on_event(1, &1, 0).unwrap();
    engine.on_event(11, &1, 0).unwrap();
    engine.on_event(25, &-1, 0).unwrap();
    assert_eq!(engine.open_windows(), 2);
    assert_eq!(engine.teardown(), 3);
    assert_eq!(engine.open_windows(), 0);
    assert_eq!(engine.errored_windows().count(), 0);
    assert!(engine.on_watermark(i64::MAX, 0).results.is_empty());
}

// -- 7. configuration ----------------------------------------------------

#[test]
fn engine_from_pipeline_config() {
    let cfg: wr_config::PipelineConfig = r#"
[server]
listen = "tcp://127.0.0.1:0"

[runtime]
partitions = 1

[window]
kind = "sliding"
size = "10s"
slide = "5s"
aggregate = "max"
allowed_lateness = "2s"

[early_results]
kind = "count"
every = 4

[sink]
kind = "jsonl"
path = "out.jsonl"
"#
    .parse()
    .unwrap();
    let engine = WindowEngine::from_config(&cfg.window, &cfg.early_results).unwrap();
    assert_eq!(
        *engine.assigner(),
        WindowAssigner::Sliding {
            size: 10_000,
            slide: 5_000
        }
    );
    assert_eq!(engine.settings().allowed_lateness, 2_000);
    assert_eq!(engine.settings().early, EarlyPolicy::Count { every: 4 });
}
