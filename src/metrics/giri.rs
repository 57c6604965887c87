//! Tactical shift of the conceding or scoring team around a goal.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::models::{MatchMetadata, PhaseOfPlay, PlayerId, PossessionGroup, TeamId, TrackingFrame};

use super::events::CriticalEvent;
use super::window::{locate_event_frame, mean, split_window};

pub const MIN_WINDOW_FRAMES: usize = 10;
/// Phases within this many seconds of the window anchor feed compactness.
pub const PHASE_PROXIMITY_SECS: f64 = 60.0;
pub const DEFAULT_COMPACTNESS: f64 = 1000.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TacticalSnapshot {
    pub block_height: f64,
    /// Always 0.0: velocity is not derived from tracking yet.
    pub avg_velocity: f64,
    pub compactness: f64,
}

/// GIRI for a goal event. `None` for non-goal events, unattributed goals and
/// windows with fewer than [`MIN_WINDOW_FRAMES`] frames.
///
/// `frames` must be sorted by (period, timestamp).
pub fn goal_impact_response_index(
    event: &CriticalEvent,
    frames: &[TrackingFrame],
    phases: &[PhaseOfPlay],
    metadata: &MatchMetadata,
    window_secs: f64,
) -> Option<f64> {
    if !event.category.is_goal() {
        return None;
    }
    let team = event.team_id?;
    let period = locate_event_frame(frames, event.frame_id, event.period, event.timestamp)
        .map(|i| frames[i].period);
    let split = split_window(frames, period, event.timestamp, window_secs);
    if split.pre.len() < MIN_WINDOW_FRAMES || split.post.len() < MIN_WINDOW_FRAMES {
        debug!(
            "GIRI: goal {} has {}/{} frames in pre/post windows",
            event.event_id,
            split.pre.len(),
            split.post.len()
        );
        return None;
    }

    let side = PossessionGroup::for_home(metadata.is_home(Some(team)));
    let roster = metadata.roster(team);
    let pre = tactical_snapshot(
        &split.pre,
        phases,
        team,
        side,
        &roster,
        event.timestamp - window_secs,
    );
    let post = tactical_snapshot(&split.post, phases, team, side, &roster, event.timestamp);
    Some(giri_from_snapshots(&pre, &post))
}

/// Team shape over a window. `roster` narrows block height to the team's own
/// players; an empty roster counts every player in frames the team controls.
pub fn tactical_snapshot(
    frames: &[&TrackingFrame],
    phases: &[PhaseOfPlay],
    team: TeamId,
    side: PossessionGroup,
    roster: &[PlayerId],
    anchor: f64,
) -> TacticalSnapshot {
    let heights: Vec<f64> = frames
        .iter()
        .filter(|f| f.possession.group == side)
        .flat_map(|f| f.players.iter())
        .filter(|p| roster.is_empty() || roster.contains(&p.player_id))
        .map(|p| p.y)
        .collect();

    let areas: Vec<f64> = phases
        .iter()
        .filter(|p| {
            p.team_in_possession_id == Some(team) && (p.time_start - anchor).abs() < PHASE_PROXIMITY_SECS
        })
        .filter_map(|p| p.in_possession_area())
        .collect();

    TacticalSnapshot {
        block_height: mean(&heights).unwrap_or(0.0),
        avg_velocity: 0.0,
        compactness: mean(&areas).unwrap_or(DEFAULT_COMPACTNESS),
    }
}

/// Mean of the relative changes in block height, velocity and compactness.
pub fn giri_from_snapshots(pre: &TacticalSnapshot, post: &TacticalSnapshot) -> f64 {
    let changes = [
        relative_change(pre.block_height, post.block_height),
        relative_change(pre.avg_velocity, post.avg_velocity),
        relative_change(pre.compactness, post.compactness),
    ];
    changes.iter().sum::<f64>() / changes.len() as f64
}

fn relative_change(before: f64, after: f64) -> f64 {
    if before == 0.0 {
        0.0
    } else {
        (after - before) / before.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::{LineupPlayer, TeamInfo};
    use crate::metrics::events::EventCategory;
    use crate::metrics::window::fixtures::frame;
    use approx::assert_relative_eq;

    const HOME: i64 = 10;
    const AWAY: i64 = 20;

    fn metadata() -> MatchMetadata {
        MatchMetadata {
            home_team: TeamInfo {
                id: Some(HOME),
                name: Some("Home FC".into()),
            },
            away_team: TeamInfo {
                id: Some(AWAY),
                name: Some("Away FC".into()),
            },
            lineups: vec![
                LineupPlayer {
                    player_id: 1,
                    player_name: Some("A".into()),
                    team_id: Some(HOME),
                },
                LineupPlayer {
                    player_id: 2,
                    player_name: Some("B".into()),
                    team_id: Some(HOME),
                },
            ],
        }
    }

    fn goal(team: i64) -> CriticalEvent {
        CriticalEvent {
            event_id: "g1".into(),
            match_id: "m1".into(),
            timestamp: 400.0,
            frame_id: Some(400),
            period: Some(1),
            actor_player_id: Some(1),
            player_name: None,
            team_id: Some(team),
            is_home: team == HOME,
            category: EventCategory::GoalScored,
            weight: 0.05,
            x: None,
            y: None,
        }
    }

    /// Frames every 10 s over [100, 700]; home players at `pre_y` before the
    /// goal and `post_y` after, with an away player far upfield throughout.
    fn frames(pre_y: f64, post_y: f64) -> Vec<TrackingFrame> {
        (10..=70)
            .map(|i| {
                let t = i as f64 * 10.0;
                let y = if t < 400.0 { pre_y } else { post_y };
                frame(
                    t as i64,
                    t,
                    1,
                    &[(1, 0.0, y), (2, 5.0, y), (50, 0.0, -100.0)],
                    PossessionGroup::Home,
                )
            })
            .collect()
    }

    fn in_possession_phase(team: i64, start: f64, width: f64, length: f64) -> PhaseOfPlay {
        PhaseOfPlay {
            team_in_possession_id: Some(team),
            team_out_of_possession_id: Some(if team == HOME { AWAY } else { HOME }),
            time_start: start,
            time_end: start + 5.0,
            team_in_possession_width_start: width,
            team_in_possession_length_start: length,
            ..Default::default()
        }
    }

    #[test]
    fn higher_block_and_wider_shape() {
        let frames = frames(30.0, 33.0);
        let phases = vec![in_possession_phase(HOME, 410.0, 50.0, 22.0)];
        let giri = goal_impact_response_index(&goal(HOME), &frames, &phases, &metadata(), 300.0).unwrap();
        assert_relative_eq!(giri, 0.2 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn snapshot_filters_by_roster_side_and_phase_anchor() {
        let frames = frames(30.0, 30.0);
        let refs: Vec<&TrackingFrame> = frames.iter().collect();
        let phases = vec![
            in_possession_phase(HOME, 130.0, 40.0, 20.0),
            in_possession_phase(HOME, 200.0, 10.0, 10.0),
            in_possession_phase(AWAY, 110.0, 10.0, 10.0),
        ];
        let snap = tactical_snapshot(&refs, &phases, HOME, PossessionGroup::Home, &[1, 2], 100.0);
        assert_relative_eq!(snap.block_height, 30.0);
        assert_relative_eq!(snap.compactness, 800.0);
        assert_eq!(snap.avg_velocity, 0.0);

        let unfiltered = tactical_snapshot(&refs, &[], HOME, PossessionGroup::Home, &[], 100.0);
        assert_relative_eq!(unfiltered.block_height, (30.0 + 30.0 - 100.0) / 3.0, epsilon = 1e-12);
        assert_relative_eq!(unfiltered.compactness, DEFAULT_COMPACTNESS);

        let away_side = tactical_snapshot(&refs, &[], AWAY, PossessionGroup::Away, &[], 100.0);
        assert_eq!(away_side.block_height, 0.0);
    }

    #[test]
    fn zero_baseline_change_is_zero() {
        let pre = TacticalSnapshot {
            block_height: 0.0,
            avg_velocity: 0.0,
            compactness: 1000.0,
        };
        let post = TacticalSnapshot {
            block_height: 12.0,
            avg_velocity: 0.0,
            compactness: 500.0,
        };
        assert_relative_eq!(giri_from_snapshots(&pre, &post), -0.5 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn negative_pre_uses_absolute_denominator() {
        assert_relative_eq!(relative_change(-10.0, -5.0), 0.5);
    }

    #[test]
    fn non_goal_or_short_window_is_null() {
        let frames = frames(30.0, 33.0);
        let mut not_goal = goal(HOME);
        not_goal.category = EventCategory::PossessionLossMiddleThird;
        assert!(goal_impact_response_index(&not_goal, &frames, &[], &metadata(), 300.0).is_none());

        let short: Vec<TrackingFrame> = frames.iter().filter(|f| f.timestamp >= 320.0).cloned().collect();
        assert!(goal_impact_response_index(&goal(HOME), &short, &[], &metadata(), 300.0).is_none());

        let mut unattributed = goal(HOME);
        unattributed.team_id = None;
        assert!(goal_impact_response_index(&unattributed, &frames, &[], &metadata(), 300.0).is_none());
    }
}
