//! Corpus-wide per-player baselines.
//!
//! Two passes per match: positional means over every (player, frame) sample,
//! then speed statistics from consecutive same-period frames. Matches are
//! accumulated independently in parallel and merged in corpus order, so the
//! result is identical across runs.

use nalgebra::Vector4;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::data::models::{PlayerId, TrackingFrame};

use super::window::dist_to_center;

/// Long-run behavior of one player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerBaseline {
    pub mean_x: f64,
    pub mean_y: f64,
    pub mean_dist_center: f64,
    pub mean_speed: f64,
    pub std_speed: f64,
}

impl PlayerBaseline {
    /// Reference point in [x, y, dist_to_center, speed] feature space.
    pub fn vector(&self) -> Vector4<f64> {
        Vector4::new(self.mean_x, self.mean_y, self.mean_dist_center, self.mean_speed)
    }
}

/// Immutable player id → baseline map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaselineSet {
    players: HashMap<PlayerId, PlayerBaseline>,
}

impl BaselineSet {
    pub fn get(&self, player_id: PlayerId) -> Option<&PlayerBaseline> {
        self.players.get(&player_id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }
}

impl FromIterator<(PlayerId, PlayerBaseline)> for BaselineSet {
    fn from_iter<I: IntoIterator<Item = (PlayerId, PlayerBaseline)>>(iter: I) -> Self {
        BaselineSet {
            players: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PositionSums {
    n: u64,
    x: f64,
    y: f64,
    dist: f64,
}

/// Welford running mean/variance, mergeable across matches.
#[derive(Debug, Clone, Copy, Default)]
struct SpeedStats {
    n: u64,
    mean: f64,
    m2: f64,
}

impl SpeedStats {
    fn push(&mut self, v: f64) {
        self.n += 1;
        let delta = v - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (v - self.mean);
    }

    fn merge(&mut self, other: &SpeedStats) {
        if other.n == 0 {
            return;
        }
        if self.n == 0 {
            *self = *other;
            return;
        }
        let n = self.n + other.n;
        let delta = other.mean - self.mean;
        self.mean += delta * other.n as f64 / n as f64;
        self.m2 += other.m2 + delta * delta * (self.n as f64 * other.n as f64) / n as f64;
        self.n = n;
    }

    /// Population standard deviation.
    fn std(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            (self.m2 / self.n as f64).max(0.0).sqrt()
        }
    }
}

#[derive(Debug, Default)]
struct MatchAccumulator {
    positions: HashMap<PlayerId, PositionSums>,
    speeds: HashMap<PlayerId, SpeedStats>,
}

impl MatchAccumulator {
    fn from_match(frames: &[TrackingFrame]) -> Self {
        let mut acc = MatchAccumulator::default();

        for frame in frames {
            for p in &frame.players {
                let sums = acc.positions.entry(p.player_id).or_default();
                sums.n += 1;
                sums.x += p.x;
                sums.y += p.y;
                sums.dist += dist_to_center(p.x, p.y);
            }
        }

        let mut ordered: Vec<&TrackingFrame> = frames.iter().collect();
        ordered.sort_by(|a, b| {
            a.period
                .cmp(&b.period)
                .then(a.timestamp.total_cmp(&b.timestamp))
        });
        for pair in ordered.windows(2) {
            let (prev, curr) = (pair[0], pair[1]);
            if prev.period != curr.period {
                continue;
            }
            let dt = curr.timestamp - prev.timestamp;
            if dt <= 0.0 {
                continue;
            }
            let before: HashMap<PlayerId, (f64, f64)> = prev
                .players
                .iter()
                .map(|p| (p.player_id, (p.x, p.y)))
                .collect();
            for p in &curr.players {
                if let Some(&(px, py)) = before.get(&p.player_id) {
                    let displacement = ((p.x - px).powi(2) + (p.y - py).powi(2)).sqrt();
                    acc.speeds
                        .entry(p.player_id)
                        .or_default()
                        .push(displacement / dt);
                }
            }
        }
        acc
    }

    fn merge(&mut self, other: MatchAccumulator) {
        for (id, s) in other.positions {
            let sums = self.positions.entry(id).or_default();
            sums.n += s.n;
            sums.x += s.x;
            sums.y += s.y;
            sums.dist += s.dist;
        }
        for (id, s) in other.speeds {
            self.speeds.entry(id).or_default().merge(&s);
        }
    }
}

/// Build baselines over every match that has tracking.
pub fn estimate_baselines(corpus: &[&[TrackingFrame]]) -> BaselineSet {
    let per_match: Vec<MatchAccumulator> = corpus
        .par_iter()
        .filter(|frames| !frames.is_empty())
        .map(|frames| MatchAccumulator::from_match(frames))
        .collect();

    let matches = per_match.len();
    let mut total = MatchAccumulator::default();
    for acc in per_match {
        total.merge(acc);
    }

    let baselines: BaselineSet = total
        .positions
        .iter()
        .filter(|(_, s)| s.n > 0)
        .map(|(&id, s)| {
            let n = s.n as f64;
            let speed = total.speeds.get(&id).copied().unwrap_or_default();
            (
                id,
                PlayerBaseline {
                    mean_x: s.x / n,
                    mean_y: s.y / n,
                    mean_dist_center: s.dist / n,
                    mean_speed: speed.mean,
                    std_speed: speed.std(),
                },
            )
        })
        .collect();

    info!(
        "Baselines built for {} player(s) from {} match(es) with tracking",
        baselines.len(),
        matches
    );
    baselines
}
