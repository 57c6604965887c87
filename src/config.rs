use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::metrics::EventWeights;

/// Where match data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DataSourceKind {
    /// A directory laid out like the open-data repository
    Local,
    /// The same layout over HTTP
    Remote,
}

/// Post-event window length for CRT, TSI and GIRI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TimeWindow {
    /// 120 seconds
    Short,
    /// 300 seconds
    Medium,
    /// 600 seconds
    Long,
}

impl TimeWindow {
    pub fn secs(self) -> f64 {
        match self {
            TimeWindow::Short => 120.0,
            TimeWindow::Medium => 300.0,
            TimeWindow::Long => 600.0,
        }
    }
}

/// Behavioral metrics over SkillCorner open tracking data
#[derive(Parser, Debug, Clone)]
#[command(name = "r3act", version, about)]
pub struct Config {
    /// Match data source
    #[arg(long, env = "DATA_SOURCE", value_enum, default_value = "remote")]
    pub data_source: DataSourceKind,

    /// Root of the local data directory (contains matches.json and matches/)
    #[arg(long, env = "DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Base URL for the remote data source (defaults to the public repository)
    #[arg(long, env = "DATA_BASE_URL")]
    pub data_base_url: Option<String>,

    /// Post-event analysis window
    #[arg(long, env = "TIME_WINDOW", value_enum, default_value = "medium")]
    pub time_window: TimeWindow,

    /// JSON file mapping event category names to raw weights; replaces the default table
    #[arg(long, env = "EVENT_WEIGHTS_PATH")]
    pub event_weights_path: Option<PathBuf>,

    /// Comma-separated match ids to analyse (default: every listed match)
    #[arg(long, env = "MATCH_IDS", value_delimiter = ',')]
    pub match_ids: Vec<String>,

    /// Skip loading tracking data (CRT, TSI and GIRI will all be null)
    #[arg(long, env = "SKIP_TRACKING", default_value = "false")]
    pub skip_tracking: bool,

    /// Maximum tracking frames read per match (0 = no limit)
    #[arg(long, env = "MAX_FRAMES", default_value = "0")]
    pub max_frames: usize,

    /// Matches loaded concurrently
    #[arg(long, env = "FETCH_CONCURRENCY", default_value = "4")]
    pub fetch_concurrency: usize,

    /// HTTP request timeout in seconds for the remote source
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "120")]
    pub request_timeout_secs: u64,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "r3act.db")]
    pub database_path: String,

    /// Also write results to this CSV file
    #[arg(long, env = "CSV_OUTPUT")]
    pub csv_output: Option<PathBuf>,

    /// Keep serving the dashboard after the run completes
    #[arg(long, env = "SERVE", default_value = "false")]
    pub serve: bool,

    /// Dashboard listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "0.0.0.0:8080")]
    pub dashboard_addr: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.fetch_concurrency == 0 {
            anyhow::bail!("fetch_concurrency must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be positive");
        }
        if self.data_source == DataSourceKind::Local && !self.data_dir.is_dir() {
            anyhow::bail!(
                "DATA_DIR {} is not a directory (required with --data-source local)",
                self.data_dir.display()
            );
        }
        if let Some(path) = &self.event_weights_path {
            if !path.is_file() {
                anyhow::bail!("EVENT_WEIGHTS_PATH {} does not exist", path.display());
            }
        }
        if self.match_ids.iter().any(|id| id.trim().is_empty()) {
            anyhow::bail!("MATCH_IDS contains an empty id");
        }
        Ok(())
    }

    pub fn window_secs(&self) -> f64 {
        self.time_window.secs()
    }

    /// `None` means no cap.
    pub fn max_frames(&self) -> Option<usize> {
        (self.max_frames > 0).then_some(self.max_frames)
    }

    /// The configured weight table, or the default one.
    pub fn event_weights(&self) -> anyhow::Result<EventWeights> {
        match &self.event_weights_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading event weights from {}", path.display()))?;
                parse_event_weights(&raw)
                    .with_context(|| format!("invalid event weights in {}", path.display()))
            }
            None => Ok(EventWeights::default()),
        }
    }
}

/// Parse a `{"category_name": raw_weight}` JSON object.
pub fn parse_event_weights(raw: &str) -> anyhow::Result<EventWeights> {
    let table: BTreeMap<String, f64> = serde_json::from_str(raw)?;
    if table.is_empty() {
        anyhow::bail!("weight table is empty");
    }
    EventWeights::from_named(table.iter().map(|(name, w)| (name.as_str(), *w)))
        .map_err(anyhow::Error::msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::EventCategory;
    use approx::assert_relative_eq;

    fn parse(args: &[&str]) -> Config {
        Config::parse_from(std::iter::once("r3act").chain(args.iter().copied()))
    }

    #[test]
    fn defaults() {
        let config = parse(&[]);
        assert_eq!(config.data_source, DataSourceKind::Remote);
        assert_eq!(config.window_secs(), 300.0);
        assert_eq!(config.max_frames(), None);
        assert!(config.match_ids.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn window_and_match_list() {
        let config = parse(&["--time-window", "short", "--match-ids", "1886347,1899585", "--max-frames", "500"]);
        assert_eq!(config.window_secs(), 120.0);
        assert_eq!(config.match_ids, vec!["1886347", "1899585"]);
        assert_eq!(config.max_frames(), Some(500));
    }

    #[test]
    fn rejects_zero_concurrency() {
        assert!(parse(&["--fetch-concurrency", "0"]).validate().is_err());
    }

    #[test]
    fn weights_from_json() {
        let weights = parse_event_weights(r#"{"goal_scored": 2.0, "goal_conceded": 1.0}"#).unwrap();
        assert_relative_eq!(weights.weight(EventCategory::GoalScored), 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(weights.weight(EventCategory::GoalConceded), 1.0 / 3.0, epsilon = 1e-12);
        assert!(parse_event_weights(r#"{"own_goal": 1.0}"#).is_err());
        assert!(parse_event_weights("{}").is_err());
        assert!(parse_event_weights("[1, 2]").is_err());
    }
}
