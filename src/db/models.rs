use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::ResultsSummary;

/// One pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// "local" | "remote"
    pub data_source: String,
    pub window_secs: f64,
    /// Matches evaluated
    pub matches: i64,
    /// Matches that failed to load and were skipped
    pub failed_matches: i64,
    pub events: i64,
    pub players_with_baseline: i64,
}

/// Per-player averages within one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerAggregate {
    pub player_id: i64,
    pub player_name: Option<String>,
    pub team_name: Option<String>,
    pub events: i64,
    /// Weighted by category weight
    pub total_weight: f64,
    pub mean_crt: Option<f64>,
    pub mean_tsi: Option<f64>,
    pub mean_giri: Option<f64>,
}

/// Latest run and its results summary, as served to the dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run: Option<RunRecord>,
    pub summary: ResultsSummary,
}
