//! Critical-event classification.
//!
//! Turns a match's raw dynamic-events table into the ordered list of
//! behaviorally significant moments the metric engines evaluate. Each row is
//! checked against five independent detectors (possession losses, failed
//! passes, goals, defensive errors, interceptions); a row may trigger more than
//! one of them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::data::models::{EventRow, MatchMetadata, PlayerId, TeamId};

/// Weight assigned to a category missing from the configured table.
pub const FALLBACK_WEIGHT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    PossessionLossDefensiveThird,
    PossessionLossMiddleThird,
    PossessionLossAttackingThird,
    PossessionLossPenaltyArea,
    FailedPassDangerous,
    FailedPassLeadToShot,
    FailedPassOffside,
    /// Unsuccessful pass with no aggravating flag.
    FailedPass,
    GoalConceded,
    GoalScored,
    DefensiveErrorLeadToShot,
    InterceptionConcededDangerous,
    InterceptionConcededDefensiveThird,
    /// Interception outside the defensive third, not flagged dangerous.
    InterceptionConceded,
}

impl EventCategory {
    pub const ALL: [EventCategory; 14] = [
        EventCategory::PossessionLossDefensiveThird,
        EventCategory::PossessionLossMiddleThird,
        EventCategory::PossessionLossAttackingThird,
        EventCategory::PossessionLossPenaltyArea,
        EventCategory::FailedPassDangerous,
        EventCategory::FailedPassLeadToShot,
        EventCategory::FailedPassOffside,
        EventCategory::FailedPass,
        EventCategory::GoalConceded,
        EventCategory::GoalScored,
        EventCategory::DefensiveErrorLeadToShot,
        EventCategory::InterceptionConcededDangerous,
        EventCategory::InterceptionConcededDefensiveThird,
        EventCategory::InterceptionConceded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::PossessionLossDefensiveThird => "possession_loss_defensive_third",
            EventCategory::PossessionLossMiddleThird => "possession_loss_middle_third",
            EventCategory::PossessionLossAttackingThird => "possession_loss_attacking_third",
            EventCategory::PossessionLossPenaltyArea => "possession_loss_penalty_area",
            EventCategory::FailedPassDangerous => "failed_pass_dangerous",
            EventCategory::FailedPassLeadToShot => "failed_pass_lead_to_shot",
            EventCategory::FailedPassOffside => "failed_pass_offside",
            EventCategory::FailedPass => "failed_pass",
            EventCategory::GoalConceded => "goal_conceded",
            EventCategory::GoalScored => "goal_scored",
            EventCategory::DefensiveErrorLeadToShot => "defensive_error_lead_to_shot",
            EventCategory::InterceptionConcededDangerous => "interception_conceded_dangerous",
            EventCategory::InterceptionConcededDefensiveThird => {
                "interception_conceded_defensive_third"
            }
            EventCategory::InterceptionConceded => "interception_conceded",
        }
    }

    pub fn is_goal(&self) -> bool {
        matches!(self, EventCategory::GoalScored | EventCategory::GoalConceded)
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown event category '{}'", s))
    }
}

/// Per-category weights, normalized to sum to 1 over the configured table.
#[derive(Debug, Clone, PartialEq)]
pub struct EventWeights {
    weights: BTreeMap<EventCategory, f64>,
}

impl EventWeights {
    /// Normalize a raw table. A non-positive total leaves the values untouched.
    pub fn new(raw: BTreeMap<EventCategory, f64>) -> Self {
        let total: f64 = raw.values().sum();
        let weights = if total > 0.0 {
            raw.into_iter().map(|(k, v)| (k, v / total)).collect()
        } else {
            raw
        };
        EventWeights { weights }
    }

    /// Build from category names, rejecting names outside the taxonomy.
    pub fn from_named<'a, I>(raw: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut table = BTreeMap::new();
        for (name, weight) in raw {
            if !weight.is_finite() || weight < 0.0 {
                return Err(format!("weight for '{}' must be a non-negative number", name));
            }
            table.insert(name.parse::<EventCategory>()?, weight);
        }
        Ok(Self::new(table))
    }

    pub fn weight(&self, category: EventCategory) -> f64 {
        self.weights
            .get(&category)
            .copied()
            .unwrap_or(FALLBACK_WEIGHT)
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EventCategory, f64)> + '_ {
        self.weights.iter().map(|(k, v)| (*k, *v))
    }
}

impl Default for EventWeights {
    fn default() -> Self {
        use EventCategory::*;
        EventWeights::new(BTreeMap::from([
            (PossessionLossDefensiveThird, 1.0),
            (PossessionLossMiddleThird, 0.7),
            (PossessionLossAttackingThird, 0.5),
            (PossessionLossPenaltyArea, 1.5),
            (FailedPassDangerous, 1.2),
            (FailedPassLeadToShot, 1.5),
            (FailedPassOffside, 0.8),
            (GoalConceded, 2.0),
            (GoalScored, 2.0),
            (DefensiveErrorLeadToShot, 1.3),
            (InterceptionConcededDangerous, 0.8),
            (InterceptionConcededDefensiveThird, 1.0),
        ]))
    }
}

/// A classified, weighted moment of a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalEvent {
    pub event_id: String,
    pub match_id: String,
    /// Seconds on the match clock.
    pub timestamp: f64,
    pub frame_id: Option<i64>,
    pub period: Option<i64>,
    pub actor_player_id: Option<PlayerId>,
    pub player_name: Option<String>,
    pub team_id: Option<TeamId>,
    pub is_home: bool,
    pub category: EventCategory,
    pub weight: f64,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

pub struct EventClassifier {
    weights: EventWeights,
}

impl EventClassifier {
    pub fn new(weights: EventWeights) -> Self {
        EventClassifier { weights }
    }

    /// Classify one match's event table, ordered by timestamp (stable).
    pub fn classify(
        &self,
        match_id: &str,
        rows: &[EventRow],
        metadata: &MatchMetadata,
    ) -> Vec<CriticalEvent> {
        let mut tagged: Vec<(&EventRow, EventCategory)> = Vec::new();
        tagged.extend(rows.iter().filter_map(|r| possession_loss(r).map(|c| (r, c))));
        tagged.extend(rows.iter().filter_map(|r| failed_pass(r).map(|c| (r, c))));
        tagged.extend(goals(rows));
        tagged.extend(rows.iter().filter_map(|r| defensive_error(r).map(|c| (r, c))));
        tagged.extend(rows.iter().filter_map(|r| interception_conceded(r).map(|c| (r, c))));

        let mut events: Vec<CriticalEvent> = tagged
            .into_iter()
            .map(|(row, category)| CriticalEvent {
                event_id: row.event_id.clone(),
                match_id: match_id.to_string(),
                timestamp: row.timestamp,
                frame_id: row.frame_start,
                period: row.period,
                actor_player_id: row.player_id,
                player_name: row.player_name.clone(),
                team_id: row.team_id,
                is_home: metadata.is_home(row.team_id),
                category,
                weight: self.weights.weight(category),
                x: row.x_start,
                y: row.y_start,
            })
            .collect();

        events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        events
    }
}

fn is(field: &Option<String>, value: &str) -> bool {
    field.as_deref() == Some(value)
}

fn possession_loss(row: &EventRow) -> Option<EventCategory> {
    if !is(&row.end_type, "possession_loss")
        && !is(&row.associated_player_possession_end_type, "possession_loss")
    {
        return None;
    }
    Some(if row.penalty_area_start {
        EventCategory::PossessionLossPenaltyArea
    } else {
        match row.third_start.as_deref() {
            Some("defensive_third") => EventCategory::PossessionLossDefensiveThird,
            Some("middle_third") => EventCategory::PossessionLossMiddleThird,
            _ => EventCategory::PossessionLossAttackingThird,
        }
    })
}

fn failed_pass(row: &EventRow) -> Option<EventCategory> {
    match row.pass_outcome.as_deref() {
        Some("offside") => Some(EventCategory::FailedPassOffside),
        Some("unsuccessful") => Some(if row.dangerous {
            EventCategory::FailedPassDangerous
        } else if row.lead_to_shot {
            EventCategory::FailedPassLeadToShot
        } else {
            EventCategory::FailedPass
        }),
        _ => None,
    }
}

/// Goals come from two signals (interruption after the event, and the
/// lead-to-goal flag). Rows are de-duplicated by event id, interruption rows first.
fn goals(rows: &[EventRow]) -> Vec<(&EventRow, EventCategory)> {
    let by_interruption = rows.iter().filter(|r| {
        is(&r.game_interruption_after, "goal_for") || is(&r.game_interruption_after, "goal_against")
    });
    let by_flag = rows.iter().filter(|r| r.lead_to_goal);

    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();
    for row in by_interruption.chain(by_flag) {
        if !seen.insert(row.event_id.as_str()) {
            continue;
        }
        let category = match row.game_interruption_after.as_deref() {
            Some("goal_for") => EventCategory::GoalScored,
            Some("goal_against") => EventCategory::GoalConceded,
            _ if row.lead_to_goal => EventCategory::GoalScored,
            _ => continue,
        };
        out.push((row, category));
    }
    out
}

fn defensive_error(row: &EventRow) -> Option<EventCategory> {
    (is(&row.end_type, "clearance") && row.lead_to_shot)
        .then_some(EventCategory::DefensiveErrorLeadToShot)
}

fn interception_conceded(row: &EventRow) -> Option<EventCategory> {
    if !is(&row.start_type, "pass_interception") {
        return None;
    }
    Some(if row.dangerous {
        EventCategory::InterceptionConcededDangerous
    } else if is(&row.third_start, "defensive_third") {
        EventCategory::InterceptionConcededDefensiveThird
    } else {
        EventCategory::InterceptionConceded
    })
}
