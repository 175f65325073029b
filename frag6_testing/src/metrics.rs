//! Helpers for asserting on `frag6` metrics.
//!
//! Taking a snapshot drains the recorder's counters, so tests take one
//! snapshot after the recorder scope and pass it to these helpers.

use metrics_util::{
    CompositeKey,
    debugging::{DebugValue, DebuggingRecorder, Snapshotter},
};

/// Creates a debugging recorder and snapshotter for metrics testing.
pub fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

fn matches_key(key: &CompositeKey, name: &str, labels: &[(&str, &str)]) -> bool {
    key.key().name() == name
        && labels.iter().all(|(label, value)| {
            key.key()
                .labels()
                .any(|l| l.key() == *label && l.value() == *value)
        })
}

/// Sum of the counters named `name` carrying every `(key, value)` label in
/// `labels`, as recorded in `metrics`.
pub fn counter_value<U, D>(
    metrics: &[(CompositeKey, U, D, DebugValue)],
    name: &str,
    labels: &[(&str, &str)],
) -> u64 {
    metrics
        .iter()
        .filter(|(key, _, _, _)| matches_key(key, name, labels))
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(count) => *count,
            _ => 0,
        })
        .sum()
}

/// Value of the gauge named `name` in `metrics`, if it was recorded.
pub fn gauge_value<U, D>(metrics: &[(CompositeKey, U, D, DebugValue)], name: &str) -> Option<f64> {
    metrics
        .iter()
        .find_map(|(key, _, _, value)| match value {
            DebugValue::Gauge(value) if matches_key(key, name, &[]) => Some(value.into_inner()),
            _ => None,
        })
}
