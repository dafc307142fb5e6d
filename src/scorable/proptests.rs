//! Property-based tests for candidate selection

use super::dispatch::Dispatcher;
use super::{Matcher, ScoreTraits, Trigger};
use crate::activity::Activity;
use crate::error::ScoreError;
use crate::testing::FixedScore;
use proptest::prelude::*;
use serde_json::Value;

fn arb_score() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), Just(0.25), Just(0.5), Just(0.75), Just(1.0)]
}

fn frame_triggers(scores: &[f64]) -> Vec<(usize, Trigger<Value>)> {
    // Innermost frame first, as the fiber lists them
    let depth = scores.len();
    scores
        .iter()
        .enumerate()
        .map(|(i, &score)| {
            let trigger = Trigger::resume(Matcher::predicate(|_| true, score), Value::Null)
                .named(format!("frame-{i}"));
            (depth - i - 1, trigger)
        })
        .collect()
}

fn dispatcher(globals: &[f64]) -> Dispatcher {
    globals
        .iter()
        .enumerate()
        .fold(Dispatcher::default(), |d, (i, &score)| {
            d.with_global(FixedScore::new(format!("global-{i}"), score))
        })
}

/// Earliest candidate holding the highest score above the floor
fn expected_winner(frames: &[f64], globals: &[f64]) -> Option<String> {
    let candidates = frames
        .iter()
        .enumerate()
        .map(|(i, &s)| (format!("frame-{i}"), s))
        .chain(globals.iter().enumerate().map(|(i, &s)| (format!("global-{i}"), s)));
    let mut best: Option<(String, f64)> = None;
    for (name, score) in candidates {
        let better = score > 0.0 && best.as_ref().map_or(true, |(_, b)| score > *b);
        if better {
            best = Some((name, score));
        }
    }
    best.map(|(name, _)| name)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Same candidates, same winner; stack before globals, inner before outer
    #[test]
    fn prop_selection_is_deterministic(
        frames in proptest::collection::vec(arb_score(), 0..5),
        globals in proptest::collection::vec(arb_score(), 0..5),
    ) {
        let dispatcher = dispatcher(&globals);
        let item = Activity::message("anything");
        let first = dispatcher
            .select(&item, frame_triggers(&frames))
            .unwrap()
            .map(|w| w.name().to_string());
        let second = dispatcher
            .select(&item, frame_triggers(&frames))
            .unwrap()
            .map(|w| w.name().to_string());

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first, expected_winner(&frames, &globals));
    }

    // Any scanned score outside the bounds aborts selection
    #[test]
    fn prop_out_of_bounds_rejected(
        frames in proptest::collection::vec(0.0f64..0.9, 0..4),
        bad in prop_oneof![Just(f64::NAN), 1.0001f64..100.0, -100.0f64..-0.0001],
    ) {
        let dispatcher = Dispatcher::new(ScoreTraits::default())
            .with_global(FixedScore::new("bad", bad));
        let result = dispatcher.select(&Activity::message("x"), frame_triggers(&frames));
        let rejected = matches!(result, Err(ScoreError::OutOfBounds { ref handler, .. }) if handler == "bad");
        prop_assert!(rejected);
    }
}
