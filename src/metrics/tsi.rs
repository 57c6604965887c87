//! Team Support Index: how the actor's teammates react around an error.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::models::{PhaseOfPlay, PlayerId, PossessionGroup, TeamId, TrackingFrame};

use super::events::CriticalEvent;
use super::window::{locate_event_frame, mean, split_phases, split_window};

pub const MIN_COMPONENT_FRAMES: usize = 5;
pub const MIN_COMPONENT_PHASES: usize = 5;
pub const DEFAULT_PROXIMITY: f64 = 100.0;
pub const DEFAULT_STRUCTURE_AREA: f64 = 1000.0;

const PROXIMITY_WEIGHT: f64 = 0.4;
const POSSESSION_WEIGHT: f64 = 0.3;
const STRUCTURE_WEIGHT: f64 = 0.3;

/// The three relative changes TSI is built from. A starved component is 0.0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TsiComponents {
    pub proximity: f64,
    pub possession: f64,
    pub structure: f64,
}

impl TsiComponents {
    pub fn composite(&self) -> f64 {
        PROXIMITY_WEIGHT * self.proximity
            + POSSESSION_WEIGHT * self.possession
            + STRUCTURE_WEIGHT * self.structure
    }
}

/// TSI components for one event, or `None` when the match has no tracking or
/// phases, or the event cannot be placed on the tracking timeline.
///
/// `frames` must be sorted by (period, timestamp).
pub fn team_support_index(
    event: &CriticalEvent,
    frames: &[TrackingFrame],
    phases: &[PhaseOfPlay],
    window_secs: f64,
) -> Option<TsiComponents> {
    if frames.is_empty() || phases.is_empty() {
        return None;
    }
    let Some(anchor) = locate_event_frame(frames, event.frame_id, event.period, event.timestamp) else {
        debug!("TSI: no tracking frame for event {}", event.event_id);
        return None;
    };
    let anchor = &frames[anchor];

    let side = match anchor.possession.group {
        PossessionGroup::None => PossessionGroup::for_home(event.is_home),
        group => group,
    };
    let split = split_window(frames, Some(anchor.period), event.timestamp, window_secs);

    let proximity = event
        .actor_player_id
        .map(|actor| proximity_score(actor, &split.pre, &split.post))
        .unwrap_or(0.0);
    let possession = possession_score(side, &split.pre, &split.post);
    let structure = event
        .team_id
        .map(|team| structure_score(team, phases, event.timestamp, window_secs))
        .unwrap_or(0.0);

    Some(TsiComponents {
        proximity,
        possession,
        structure,
    })
}

/// Relative drop in the actor's mean distance to everyone else.
pub fn proximity_score(actor: PlayerId, pre: &[&TrackingFrame], post: &[&TrackingFrame]) -> f64 {
    if pre.len() < MIN_COMPONENT_FRAMES || post.len() < MIN_COMPONENT_FRAMES {
        return 0.0;
    }
    let before = mean_distance_to_others(actor, pre);
    let after = mean_distance_to_others(actor, post);
    if before <= 0.0 {
        return 0.0;
    }
    (before - after) / before
}

fn mean_distance_to_others(actor: PlayerId, frames: &[&TrackingFrame]) -> f64 {
    let distances: Vec<f64> = frames
        .iter()
        .filter_map(|f| f.player(actor).map(|a| (f, a)))
        .flat_map(|(f, a)| {
            f.players
                .iter()
                .filter(move |p| p.player_id != actor)
                .map(move |p| ((p.x - a.x).powi(2) + (p.y - a.y).powi(2)).sqrt())
        })
        .collect();
    mean(&distances).unwrap_or(DEFAULT_PROXIMITY)
}

/// Relative change in the share of frames where `side` holds the ball.
pub fn possession_score(
    side: PossessionGroup,
    pre: &[&TrackingFrame],
    post: &[&TrackingFrame],
) -> f64 {
    if pre.len() < MIN_COMPONENT_FRAMES || post.len() < MIN_COMPONENT_FRAMES {
        return 0.0;
    }
    let share = |frames: &[&TrackingFrame]| {
        frames.iter().filter(|f| f.possession.group == side).count() as f64 / frames.len() as f64
    };
    let before = share(pre);
    let after = share(post);
    if before == 0.0 {
        return 0.0;
    }
    (after - before) / before
}

/// Relative shrink of the team's defensive footprint while out of possession.
pub fn structure_score(team: TeamId, phases: &[PhaseOfPlay], timestamp: f64, window_secs: f64) -> f64 {
    let (pre, post) = split_phases(phases, timestamp, window_secs, |p| {
        p.team_out_of_possession_id == Some(team)
    });
    if pre.len() < MIN_COMPONENT_PHASES || post.len() < MIN_COMPONENT_PHASES {
        return 0.0;
    }
    let area = |phases: &[&PhaseOfPlay]| {
        let areas: Vec<f64> = phases.iter().filter_map(|p| p.out_of_possession_area()).collect();
        mean(&areas).unwrap_or(DEFAULT_STRUCTURE_AREA)
    };
    let before = area(&pre);
    let after = area(&post);
    if before <= 0.0 {
        return 0.0;
    }
    (before - after) / before
}
