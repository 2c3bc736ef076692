//! Property-Based Tests for lapse containers.
//!
//! Random insert/advance/sweep schedules checked against the two expiry
//! guarantees: reads agree with deadlines whether or not a sweep ran, and
//! every expired value reaches listeners exactly once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use proptest::prelude::*;

use lapse_core::{DecayList, Janitor, Lifespan, ManualClock, TimeUnit, TimedMap, TimedMultimap};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Step {
    /// Insert key with a lifespan in ticks (0 = forever).
    Insert(u8, u16),
    /// Move the clock forward by ticks.
    Advance(u16),
    /// Run a janitor pass.
    Sweep,
    /// Explicitly remove a key.
    Remove(u8),
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (0..16u8, 0..60u16).prop_map(|(k, t)| Step::Insert(k, t)),
        3 => (0..30u16).prop_map(Step::Advance),
        2 => Just(Step::Sweep),
        1 => (0..16u8).prop_map(Step::Remove),
    ]
}

// ---------------------------------------------------------------------------
// Property: reads match a deadline model, sweep or no sweep
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn map_reads_follow_deadlines(steps in prop::collection::vec(arb_step(), 1..80)) {
        let clock = ManualClock::new();
        let janitor = Janitor::new(clock.clone());
        let map = TimedMap::new(&janitor, Lifespan::Forever);

        // key -> absolute expiry tick (None = forever)
        let mut model: HashMap<u8, Option<u64>> = HashMap::new();
        let mut now: u64 = 0;

        for step in steps {
            match step {
                Step::Insert(k, ticks) => {
                    map.insert_for(k, now, Lifespan::of(i64::from(ticks), TimeUnit::Ticks));
                    model.insert(k, (ticks > 0).then(|| now + u64::from(ticks)));
                }
                Step::Advance(t) => {
                    clock.advance_ticks(u64::from(t));
                    now += u64::from(t);
                }
                Step::Sweep => {
                    janitor.sweep_now();
                }
                Step::Remove(k) => {
                    let live = model.get(&k).is_some_and(|d| d.is_none_or(|at| at > now));
                    prop_assert_eq!(map.remove(&k).is_some(), live);
                    model.remove(&k);
                }
            }

            model.retain(|_, deadline| deadline.is_none_or(|at| at > now));
            for k in 0..16u8 {
                prop_assert_eq!(map.contains_key(&k), model.contains_key(&k), "key {}", k);
            }
            prop_assert_eq!(map.len(), model.len());
        }
    }
}

// ---------------------------------------------------------------------------
// Property: every expired value is reported once, never early
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn multimap_reports_each_expired_value_once(
        lifespans in prop::collection::vec(1..40u16, 1..60),
        advances in prop::collection::vec(1..10u16, 1..30),
    ) {
        let clock = ManualClock::new();
        let janitor = Janitor::new(clock.clone());
        let mm = TimedMultimap::new(&janitor, Lifespan::Forever);
        let reported: Arc<Mutex<Vec<(u8, usize)>>> = Arc::new(Mutex::new(Vec::new()));
        {
            let reported = Arc::clone(&reported);
            mm.on_lifespan_end(move |key: &u8, values: &[usize]| {
                let mut reported = reported.lock();
                reported.extend(values.iter().map(|v| (*key, *v)));
            });
        }

        for (i, ticks) in lifespans.iter().enumerate() {
            let key = u8::try_from(i % 5).unwrap_or(0);
            mm.insert_for(key, i, Lifespan::of(i64::from(*ticks), TimeUnit::Ticks));
        }

        let mut now = 0_u64;
        for t in &advances {
            clock.advance_ticks(u64::from(*t));
            now += u64::from(*t);
            janitor.sweep_now();

            let reported = reported.lock();
            for (_, idx) in reported.iter() {
                prop_assert!(u64::from(lifespans[*idx]) <= now, "value {} reported early", idx);
            }
        }

        clock.advance_ticks(100);
        janitor.sweep_now();
        janitor.sweep_now();

        let mut seen: Vec<usize> = reported.lock().iter().map(|(_, v)| *v).collect();
        seen.sort_unstable();
        let expected: Vec<usize> = (0..lifespans.len()).collect();
        prop_assert_eq!(seen, expected);
        prop_assert!(mm.is_empty());
    }
}

// ---------------------------------------------------------------------------
// Property: decay renewal
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn decay_survives_any_readd_gap_below_window(
        window_ms in 200..2_000u64,
        gaps in prop::collection::vec(1..100u64, 1..40),
    ) {
        let clock = ManualClock::new();
        let janitor = Janitor::new(clock.clone());
        let list = DecayList::new(&janitor, Duration::from_millis(window_ms)).expect("valid window");

        list.add(7_u32);
        for pct in gaps {
            // gap strictly below the window
            clock.advance_millis(window_ms * pct / 100 - 1);
            janitor.sweep_now();
            prop_assert!(list.contains(&7));
            list.add(7);
            prop_assert_eq!(list.len(), 1);
        }

        clock.advance_millis(window_ms - 1);
        prop_assert!(list.contains(&7));
        clock.advance_millis(1);
        janitor.sweep_now();
        prop_assert!(list.is_empty());
    }
}
