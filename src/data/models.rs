use serde::{Deserialize, Deserializer, Serialize};

use super::parse::{lenient_bool, lenient_clock, lenient_f64, lenient_i64, lenient_string};

pub type PlayerId = i64;
pub type TeamId = i64;

/// Which side holds the ball in a tracking frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "Option<String>")]
pub enum PossessionGroup {
    Home,
    Away,
    #[default]
    None,
}

impl From<Option<String>> for PossessionGroup {
    fn from(raw: Option<String>) -> Self {
        match raw.as_deref().map(|s| s.trim().to_lowercase()).as_deref() {
            Some("home") | Some("home team") => PossessionGroup::Home,
            Some("away") | Some("away team") => PossessionGroup::Away,
            _ => PossessionGroup::None,
        }
    }
}

impl PossessionGroup {
    pub fn for_home(is_home: bool) -> Self {
        if is_home {
            PossessionGroup::Home
        } else {
            PossessionGroup::Away
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Possession {
    #[serde(default)]
    pub group: PossessionGroup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerPosition {
    pub player_id: PlayerId,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub x: f64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub y: f64,
}

/// One sample of the tracking feed. Timestamps are seconds within the match clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingFrame {
    #[serde(rename = "frame")]
    pub frame_id: i64,
    #[serde(default, deserialize_with = "tracking_timestamp")]
    pub timestamp: f64,
    #[serde(default = "first_period", deserialize_with = "period_or_first")]
    pub period: u8,
    #[serde(rename = "player_data", default, deserialize_with = "players_or_empty")]
    pub players: Vec<PlayerPosition>,
    #[serde(default, deserialize_with = "possession_or_default")]
    pub possession: Possession,
}

impl TrackingFrame {
    pub fn player(&self, player_id: PlayerId) -> Option<&PlayerPosition> {
        self.players.iter().find(|p| p.player_id == player_id)
    }
}

fn frame_order(a: &TrackingFrame, b: &TrackingFrame) -> std::cmp::Ordering {
    a.period
        .cmp(&b.period)
        .then(a.timestamp.total_cmp(&b.timestamp))
}

/// Order frames by (period, timestamp). Stable, so equal keys keep input order.
pub fn sort_frames(frames: &mut [TrackingFrame]) {
    frames.sort_by(frame_order);
}

pub fn is_sorted_frames(frames: &[TrackingFrame]) -> bool {
    frames.windows(2).all(|w| frame_order(&w[0], &w[1]).is_le())
}

/// One row of the per-match dynamic events table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    #[serde(deserialize_with = "lenient_string_required")]
    pub event_id: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub team_id: Option<TeamId>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub player_id: Option<PlayerId>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub player_name: Option<String>,
    /// Seconds parsed from `time_start` ("MM:SS.s"); malformed values become 0.0.
    #[serde(rename = "time_start", default, deserialize_with = "lenient_clock")]
    pub timestamp: f64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub frame_start: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub period: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub third_start: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub penalty_area_start: bool,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pass_outcome: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub dangerous: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub lead_to_shot: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub lead_to_goal: bool,
    #[serde(default, deserialize_with = "lenient_string")]
    pub game_interruption_after: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub start_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub end_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub associated_player_possession_end_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub x_start: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub y_start: Option<f64>,
}

/// One row of the phases-of-play table. Absent widths/lengths read as 0.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseOfPlay {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub team_in_possession_id: Option<TeamId>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub team_out_of_possession_id: Option<TeamId>,
    #[serde(default, deserialize_with = "lenient_clock")]
    pub time_start: f64,
    #[serde(default, deserialize_with = "lenient_clock")]
    pub time_end: f64,
    #[serde(default, deserialize_with = "zero_if_blank")]
    pub team_in_possession_width_start: f64,
    #[serde(default, deserialize_with = "zero_if_blank")]
    pub team_in_possession_length_start: f64,
    #[serde(default, deserialize_with = "zero_if_blank")]
    pub team_out_of_possession_width_start: f64,
    #[serde(default, deserialize_with = "zero_if_blank")]
    pub team_out_of_possession_length_start: f64,
}

impl PhaseOfPlay {
    /// Footprint (width × length) of the team in possession, if both are positive.
    pub fn in_possession_area(&self) -> Option<f64> {
        positive_area(
            self.team_in_possession_width_start,
            self.team_in_possession_length_start,
        )
    }

    /// Footprint (width × length) of the team out of possession, if both are positive.
    pub fn out_of_possession_area(&self) -> Option<f64> {
        positive_area(
            self.team_out_of_possession_width_start,
            self.team_out_of_possession_length_start,
        )
    }
}

fn positive_area(width: f64, length: f64) -> Option<f64> {
    (width > 0.0 && length > 0.0).then_some(width * length)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamInfo {
    pub id: Option<TeamId>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineupPlayer {
    pub player_id: PlayerId,
    pub player_name: Option<String>,
    pub team_id: Option<TeamId>,
}

/// Match-level metadata (`<id>_match.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawMatchMetadata")]
pub struct MatchMetadata {
    pub home_team: TeamInfo,
    pub away_team: TeamInfo,
    pub lineups: Vec<LineupPlayer>,
}

// Match files may carry several spellings of one field at once (`name` next
// to `short_name`, `id` next to `player_id`). Each key gets its own slot here
// and the conversion picks one.
#[derive(Deserialize)]
struct RawTeam {
    #[serde(default)]
    id: Option<TeamId>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
}

impl From<RawTeam> for TeamInfo {
    fn from(raw: RawTeam) -> Self {
        TeamInfo {
            id: raw.id,
            name: raw.name.or(raw.short_name),
        }
    }
}

#[derive(Deserialize)]
struct RawLineupPlayer {
    #[serde(default)]
    player_id: Option<PlayerId>,
    #[serde(default)]
    id: Option<PlayerId>,
    #[serde(default)]
    player_name: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    team_id: Option<TeamId>,
}

impl RawLineupPlayer {
    fn resolve(self) -> Option<LineupPlayer> {
        Some(LineupPlayer {
            player_id: self.player_id.or(self.id)?,
            player_name: self.player_name.or(self.short_name),
            team_id: self.team_id,
        })
    }
}

#[derive(Deserialize)]
struct RawMatchMetadata {
    #[serde(default)]
    home_team: Option<RawTeam>,
    #[serde(default)]
    away_team: Option<RawTeam>,
    #[serde(default)]
    lineups: Option<Vec<RawLineupPlayer>>,
    #[serde(default)]
    players: Option<Vec<RawLineupPlayer>>,
}

impl From<RawMatchMetadata> for MatchMetadata {
    fn from(raw: RawMatchMetadata) -> Self {
        let lineups = match (raw.lineups, raw.players) {
            (Some(lineups), _) if !lineups.is_empty() => lineups,
            (_, Some(players)) => players,
            _ => Vec::new(),
        };
        MatchMetadata {
            home_team: raw.home_team.map(TeamInfo::from).unwrap_or_default(),
            away_team: raw.away_team.map(TeamInfo::from).unwrap_or_default(),
            lineups: lineups
                .into_iter()
                .filter_map(RawLineupPlayer::resolve)
                .collect(),
        }
    }
}

impl MatchMetadata {
    pub fn is_home(&self, team_id: Option<TeamId>) -> bool {
        team_id.is_some() && team_id == self.home_team.id
    }

    pub fn team_name(&self, team_id: TeamId) -> Option<&str> {
        [&self.home_team, &self.away_team]
            .into_iter()
            .find(|t| t.id == Some(team_id))
            .and_then(|t| t.name.as_deref())
    }

    pub fn player_name(&self, player_id: PlayerId) -> Option<&str> {
        self.lineups
            .iter()
            .find(|p| p.player_id == player_id)
            .and_then(|p| p.player_name.as_deref())
    }

    /// "Home vs Away", falling back to "Team <id>" for unnamed sides.
    pub fn match_name(&self) -> String {
        fn label(team: &TeamInfo) -> String {
            match (&team.name, team.id) {
                (Some(name), _) => name.clone(),
                (None, Some(id)) => format!("Team {}", id),
                (None, None) => "Team Unknown".to_string(),
            }
        }
        format!("{} vs {}", label(&self.home_team), label(&self.away_team))
    }

    /// Players listed for `team_id`; empty when the lineup carries no team ids.
    pub fn roster(&self, team_id: TeamId) -> Vec<PlayerId> {
        self.lineups
            .iter()
            .filter(|p| p.team_id == Some(team_id))
            .map(|p| p.player_id)
            .collect()
    }
}

/// Everything the corpus provider supplies for a single match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchBundle {
    pub match_id: String,
    pub metadata: MatchMetadata,
    pub events: Vec<EventRow>,
    pub phases: Vec<PhaseOfPlay>,
}

// ── Serde helpers ─────────────────────────────────────────────────────────────

fn first_period() -> u8 {
    1
}

fn period_or_first<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
    Ok(Option::<u8>::deserialize(d)?.unwrap_or(1))
}

fn zero_if_null<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(d)?.unwrap_or(0.0))
}

fn zero_if_blank<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(lenient_f64(d)?.unwrap_or(0.0))
}

fn players_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<PlayerPosition>, D::Error> {
    Ok(Option::<Vec<PlayerPosition>>::deserialize(d)?.unwrap_or_default())
}

fn possession_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<Possession, D::Error> {
    Ok(Option::<Possession>::deserialize(d)?.unwrap_or_default())
}

fn lenient_string_required<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(lenient_string(d)?.unwrap_or_default())
}

/// Tracking timestamps arrive either as seconds or as a clock string.
fn tracking_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => super::parse::parse_clock(&s),
        _ => 0.0,
    })
}
