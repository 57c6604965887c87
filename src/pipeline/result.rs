use serde::{Deserialize, Serialize};

use crate::data::models::{MatchMetadata, PlayerId, TeamId};
use crate::metrics::{CriticalEvent, EventCategory};

/// Metric values for one critical event, with the labels needed to read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub event_id: String,
    pub match_id: String,
    /// "Home vs Away"
    pub match_name: String,
    pub category: EventCategory,
    pub weight: f64,
    pub timestamp: f64,
    pub period: Option<i64>,
    pub player_id: Option<PlayerId>,
    pub player_name: Option<String>,
    pub team_id: Option<TeamId>,
    pub team_name: Option<String>,
    pub is_home: bool,
    pub window_secs: f64,
    /// Seconds until the actor is back near baseline.
    pub crt: Option<f64>,
    pub tsi: Option<f64>,
    pub giri: Option<f64>,
}

impl MetricResult {
    /// Label an event with match and player names. Player names come from the
    /// event row, then the lineup, then the bare id.
    pub fn labelled(event: &CriticalEvent, metadata: &MatchMetadata, window_secs: f64) -> Self {
        let player_name = event.player_name.clone().or_else(|| {
            event.actor_player_id.map(|id| {
                metadata
                    .player_name(id)
                    .map(str::to_string)
                    .unwrap_or_else(|| id.to_string())
            })
        });
        MetricResult {
            event_id: event.event_id.clone(),
            match_id: event.match_id.clone(),
            match_name: metadata.match_name(),
            category: event.category,
            weight: event.weight,
            timestamp: event.timestamp,
            period: event.period,
            player_id: event.actor_player_id,
            player_name,
            team_id: event.team_id,
            team_name: event
                .team_id
                .and_then(|id| metadata.team_name(id))
                .map(str::to_string),
            is_home: event.is_home,
            window_secs,
            crt: None,
            tsi: None,
            giri: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::{LineupPlayer, TeamInfo};

    fn event(actor: Option<i64>, name: Option<&str>) -> CriticalEvent {
        CriticalEvent {
            event_id: "e".into(),
            match_id: "m".into(),
            timestamp: 12.0,
            frame_id: None,
            period: Some(1),
            actor_player_id: actor,
            player_name: name.map(String::from),
            team_id: Some(10),
            is_home: true,
            category: EventCategory::GoalConceded,
            weight: 0.1,
            x: None,
            y: None,
        }
    }

    #[test]
    fn player_name_fallbacks() {
        let metadata = MatchMetadata {
            home_team: TeamInfo {
                id: Some(10),
                name: Some("Sydney FC".into()),
            },
            away_team: TeamInfo {
                id: Some(20),
                name: None,
            },
            lineups: vec![LineupPlayer {
                player_id: 7,
                player_name: Some("J. Doe".into()),
                team_id: Some(10),
            }],
        };
        let from_row = MetricResult::labelled(&event(Some(7), Some("Row Name")), &metadata, 300.0);
        assert_eq!(from_row.player_name.as_deref(), Some("Row Name"));
        assert_eq!(from_row.match_name, "Sydney FC vs Team 20");
        assert_eq!(from_row.team_name.as_deref(), Some("Sydney FC"));

        let from_lineup = MetricResult::labelled(&event(Some(7), None), &metadata, 300.0);
        assert_eq!(from_lineup.player_name.as_deref(), Some("J. Doe"));

        let from_id = MetricResult::labelled(&event(Some(8), None), &metadata, 300.0);
        assert_eq!(from_id.player_name.as_deref(), Some("8"));

        assert_eq!(MetricResult::labelled(&event(None, None), &metadata, 300.0).player_name, None);
    }
}
