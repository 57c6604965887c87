//! Cognitive Reset Time: how long an actor's movement state takes to return
//! near their personal baseline after an error.

use nalgebra::{Matrix4, Vector4};
use tracing::{debug, warn};

use crate::data::models::{PlayerId, TrackingFrame};

use super::baseline::BaselineSet;
use super::window::{dist_to_center, locate_event_frame};

pub const MIN_WINDOW_FRAMES: usize = 10;
pub const MIN_ACTOR_SAMPLES: usize = 5;
/// Added to the covariance diagonal before inversion.
pub const REGULARIZATION: f64 = 0.01;
pub const EWMA_ALPHA: f64 = 0.3;
/// Smoothed Mahalanobis distance below which the actor counts as recovered.
pub const RECOVERY_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    timestamp: f64,
    features: Vector4<f64>,
}

/// Seconds from the event until the actor's smoothed deviation from baseline
/// drops below [`RECOVERY_THRESHOLD`].
///
/// `frames` must be the full match sequence sorted by (period, timestamp).
/// Returns `None` when the evidence is insufficient (no matching frame, fewer
/// than [`MIN_WINDOW_FRAMES`] window frames or [`MIN_ACTOR_SAMPLES`] actor
/// samples, no baseline, singular covariance). An actor who never recovers
/// inside the window gets `window_secs`.
pub fn cognitive_reset_time(
    actor: PlayerId,
    event_timestamp: f64,
    event_frame: Option<i64>,
    frames: &[TrackingFrame],
    baselines: &BaselineSet,
    window_secs: f64,
) -> Option<f64> {
    let Some(anchor) = locate_event_frame(frames, event_frame, None, event_timestamp) else {
        debug!("CRT: no tracking frame for event at {:.1}s", event_timestamp);
        return None;
    };
    let period = frames[anchor].period;

    let window: Vec<usize> = frames
        .iter()
        .enumerate()
        .filter(|(_, f)| {
            f.period == period
                && f.timestamp >= event_timestamp
                && f.timestamp <= event_timestamp + window_secs
        })
        .map(|(i, _)| i)
        .collect();
    if window.len() < MIN_WINDOW_FRAMES {
        debug!("CRT: only {} frames in window", window.len());
        return None;
    }

    let Some(baseline) = baselines.get(actor) else {
        debug!("CRT: no baseline for player {}", actor);
        return None;
    };

    let samples: Vec<Sample> = window
        .iter()
        .filter_map(|&i| actor_sample(actor, frames, i))
        .collect();
    if samples.len() < MIN_ACTOR_SAMPLES {
        debug!("CRT: player {} present in only {} frames", actor, samples.len());
        return None;
    }

    let Some(inverse) = regularized_inverse_covariance(&samples) else {
        warn!("CRT: singular covariance for player {}", actor);
        return None;
    };

    let reference = baseline.vector();
    let distances: Vec<f64> = samples
        .iter()
        .map(|s| mahalanobis(&s.features, &reference, &inverse))
        .collect();
    let smoothed = ewma(&distances, EWMA_ALPHA);

    let recovered = smoothed
        .iter()
        .position(|&d| d < RECOVERY_THRESHOLD)
        .map(|i| samples[i].timestamp - event_timestamp);
    Some(recovered.unwrap_or(window_secs))
}

/// Actor features at `frames[idx]`; speed is measured against the preceding
/// frame of the full sequence, so the first window sample has a real speed too.
fn actor_sample(actor: PlayerId, frames: &[TrackingFrame], idx: usize) -> Option<Sample> {
    let frame = &frames[idx];
    let p = frame.player(actor)?;
    let speed = idx
        .checked_sub(1)
        .map(|prev_idx| &frames[prev_idx])
        .filter(|prev| prev.period == frame.period)
        .and_then(|prev| {
            let dt = frame.timestamp - prev.timestamp;
            let q = prev.player(actor)?;
            (dt > 0.0).then(|| ((p.x - q.x).powi(2) + (p.y - q.y).powi(2)).sqrt() / dt)
        })
        .unwrap_or(0.0);
    Some(Sample {
        timestamp: frame.timestamp,
        features: Vector4::new(p.x, p.y, dist_to_center(p.x, p.y), speed),
    })
}

/// Inverse of (sample covariance + REGULARIZATION·I). Needs at least two samples.
fn regularized_inverse_covariance(samples: &[Sample]) -> Option<Matrix4<f64>> {
    if samples.len() < 2 {
        return None;
    }
    let n = samples.len() as f64;
    let mean = samples
        .iter()
        .fold(Vector4::<f64>::zeros(), |acc, s| acc + s.features)
        / n;
    let scatter = samples.iter().fold(Matrix4::<f64>::zeros(), |acc, s| {
        let d = s.features - mean;
        acc + d * d.transpose()
    });
    let covariance = scatter / (n - 1.0) + Matrix4::<f64>::identity() * REGULARIZATION;
    covariance
        .try_inverse()
        .filter(|inv| inv.iter().all(|v| v.is_finite()))
}

/// Mahalanobis distance between `u` and `v` under inverse covariance `inv`.
pub fn mahalanobis(u: &Vector4<f64>, v: &Vector4<f64>, inv: &Matrix4<f64>) -> f64 {
    let d = u - v;
    (d.transpose() * inv * d)[(0, 0)].max(0.0).sqrt()
}

/// Exponentially weighted moving average seeded with the first value.
pub fn ewma(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::with_capacity(values.len());
    for &v in values {
        let next = match out.last() {
            Some(&prev) => alpha * v + (1.0 - alpha) * prev,
            None => v,
        };
        out.push(next);
    }
    out
}
