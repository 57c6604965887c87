//! Run orchestration: classify every match, build baselines once over the
//! corpus, then evaluate CRT, TSI and GIRI for each critical event.
//!
//! Baselines must be complete before any event is scored, so the two phases
//! run back to back. Both fan out across matches with rayon; nothing is shared
//! mutably.

pub mod result;
pub mod summary;

pub use result::MetricResult;
pub use summary::ResultsSummary;

use rayon::prelude::*;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::data::models::{MatchBundle, TrackingFrame};
use crate::data::LoadedMatch;
use crate::metrics::window::{is_sorted_frames, sort_frames};
use crate::metrics::{
    cognitive_reset_time, estimate_baselines, goal_impact_response_index, team_support_index,
    BaselineSet, EventClassifier, EventWeights,
};

/// Output of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub results: Vec<MetricResult>,
    pub summary: ResultsSummary,
    pub matches: usize,
    pub players_with_baseline: usize,
    pub window_secs: f64,
}

pub struct Orchestrator {
    classifier: EventClassifier,
    window_secs: f64,
}

/// A match with its tracking in (period, timestamp) order. Providers already
/// sort on load, so only out-of-order input is copied.
struct PreparedMatch<'a> {
    bundle: Arc<MatchBundle>,
    frames: Cow<'a, [TrackingFrame]>,
}

impl Orchestrator {
    pub fn new(weights: EventWeights, window_secs: f64) -> Self {
        Orchestrator {
            classifier: EventClassifier::new(weights),
            window_secs,
        }
    }

    /// Evaluate the whole corpus. Results follow corpus order, then event
    /// order within each match.
    pub fn run(&self, corpus: &[LoadedMatch]) -> RunReport {
        let started = Instant::now();

        let prepared: Vec<PreparedMatch> = corpus
            .par_iter()
            .map(|m| {
                let frames = if is_sorted_frames(&m.tracking) {
                    Cow::Borrowed(m.tracking.as_slice())
                } else {
                    let mut owned = m.tracking.to_vec();
                    sort_frames(&mut owned);
                    Cow::Owned(owned)
                };
                PreparedMatch {
                    bundle: Arc::clone(&m.bundle),
                    frames,
                }
            })
            .collect();

        let tracks: Vec<&[TrackingFrame]> = prepared.iter().map(|m| m.frames.as_ref()).collect();
        let baselines = estimate_baselines(&tracks);

        let results: Vec<MetricResult> = prepared
            .par_iter()
            .map(|m| self.evaluate_match(m, &baselines))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect();

        let summary = ResultsSummary::from_results(&results);
        info!(
            "Evaluated {} critical event(s) across {} match(es) in {:.1}s",
            results.len(),
            prepared.len(),
            started.elapsed().as_secs_f64()
        );

        RunReport {
            results,
            summary,
            matches: prepared.len(),
            players_with_baseline: baselines.len(),
            window_secs: self.window_secs,
        }
    }

    fn evaluate_match(&self, m: &PreparedMatch, baselines: &BaselineSet) -> Vec<MetricResult> {
        let bundle = &m.bundle;
        let events = self
            .classifier
            .classify(&bundle.match_id, &bundle.events, &bundle.metadata);
        info!(
            "Match {}: {} critical event(s) from {} row(s)",
            bundle.match_id,
            events.len(),
            bundle.events.len()
        );

        let has_phases = !bundle.phases.is_empty();
        if !has_phases {
            warn!(
                "Match {}: no phases of play, TSI and GIRI will be null",
                bundle.match_id
            );
        }
        if m.frames.is_empty() {
            warn!("Match {}: no tracking, all metrics will be null", bundle.match_id);
        }

        events
            .iter()
            .map(|event| {
                let mut result = MetricResult::labelled(event, &bundle.metadata, self.window_secs);
                result.crt = event.actor_player_id.and_then(|actor| {
                    cognitive_reset_time(
                        actor,
                        event.timestamp,
                        event.frame_id,
                        &m.frames,
                        baselines,
                        self.window_secs,
                    )
                });
                result.tsi = team_support_index(event, &m.frames, &bundle.phases, self.window_secs)
                    .map(|c| c.composite());
                if has_phases {
                    result.giri = goal_impact_response_index(
                        event,
                        &m.frames,
                        &bundle.phases,
                        &bundle.metadata,
                        self.window_secs,
                    );
                }
                debug!(
                    "{} {} {}: crt={:?} tsi={:?} giri={:?}",
                    bundle.match_id, event.event_id, event.category, result.crt, result.tsi, result.giri
                );
                result
            })
            .collect()
    }
}
