use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gorgone_common::types::CounterSet;

use crate::refresh::SnapshotPoint;

pub const MODEL_TAG: &str = "velocity_linear_v1";

/// Per-metric velocity extrapolation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricPrediction {
    pub velocity_per_hour: f64,
    pub p1h: i64,
    pub p2h: i64,
    pub p3h: i64,
}

/// Prediction document stored on the item once at least two snapshots
/// exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Predictions {
    pub model: &'static str,
    pub confidence: f64,
    pub computed_at: DateTime<Utc>,
    pub like: MetricPrediction,
    pub share: MetricPrediction,
    pub comment: MetricPrediction,
    pub quote: MetricPrediction,
    pub view: MetricPrediction,
}

/// Velocity-linear forecast over all available snapshots.
///
/// Per metric, the rate is the clamped growth across consecutive snapshot
/// pairs divided by the total hours they span; projections never fall
/// below the current value.
pub fn compute(
    current: &CounterSet,
    snapshots: &[SnapshotPoint],
    now: DateTime<Utc>,
) -> Predictions {
    let confidence = ((snapshots.len() as f64) / 6.0).min(0.9);

    Predictions {
        model: MODEL_TAG,
        confidence,
        computed_at: now,
        like: metric(current.like, snapshots, |c| c.like),
        share: metric(current.share, snapshots, |c| c.share),
        comment: metric(current.comment, snapshots, |c| c.comment),
        quote: metric(current.quote, snapshots, |c| c.quote),
        view: metric(current.view, snapshots, |c| c.view),
    }
}

fn metric(
    current: i64,
    snapshots: &[SnapshotPoint],
    value: impl Fn(&CounterSet) -> i64,
) -> MetricPrediction {
    let mut grown: i64 = 0;
    let mut hours: f64 = 0.0;
    for pair in snapshots.windows(2) {
        grown += (value(&pair[1].counters) - value(&pair[0].counters)).max(0);
        hours += (pair[1].at - pair[0].at).num_seconds().max(0) as f64 / 3600.0;
    }

    let velocity = if hours > 0.0 { grown as f64 / hours } else { 0.0 };
    let project = |h: f64| -> i64 {
        let projected = current as f64 + velocity * h;
        (projected.round() as i64).max(current)
    };

    MetricPrediction {
        velocity_per_hour: velocity,
        p1h: project(1.0),
        p2h: project(2.0),
        p3h: project(3.0),
    }
}
