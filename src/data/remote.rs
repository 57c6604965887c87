use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::DataError;
use super::models::{MatchBundle, MatchMetadata};
use super::parse::{parse_events_csv, parse_match_index, parse_phases_csv, parse_tracking_jsonl};
use super::provider::{MatchCorpusProvider, Tracking, TrackingProvider};

pub const DEFAULT_BASE_URL: &str = "https://raw.githubusercontent.com/SkillCorner/opendata/master/data";

/// Provider backed by a remote HTTP mirror of the open-data layout.
pub struct RemoteDataProvider {
    http: Client,
    /// Base URL for overriding in tests
    base_url: String,
    max_frames: Option<usize>,
}

impl RemoteDataProvider {
    pub fn new(
        base_url: Option<&str>,
        timeout: Duration,
        max_frames: Option<usize>,
    ) -> Result<Self, DataError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(RemoteDataProvider {
            http,
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            max_frames,
        })
    }

    fn match_url(&self, match_id: &str, suffix: &str) -> String {
        format!(
            "{}/matches/{}/{}_{}",
            self.base_url, match_id, match_id, suffix
        )
    }

    async fn fetch_text(&self, url: &str) -> Result<String, DataError> {
        debug!("Fetching {}", url);
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DataError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(DataError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl MatchCorpusProvider for RemoteDataProvider {
    fn name(&self) -> &str {
        "remote"
    }

    async fn list_match_ids(&self) -> Result<Vec<String>, DataError> {
        let raw = self
            .fetch_text(&format!("{}/matches.json", self.base_url))
            .await?;
        parse_match_index(&raw)
    }

    async fn load_match(&self, match_id: &str) -> Result<Arc<MatchBundle>, DataError> {
        let metadata: MatchMetadata =
            serde_json::from_str(&self.fetch_text(&self.match_url(match_id, "match.json")).await?)?;
        let events = parse_events_csv(
            &self
                .fetch_text(&self.match_url(match_id, "dynamic_events.csv"))
                .await?,
        )?;
        let phases = parse_phases_csv(
            &self
                .fetch_text(&self.match_url(match_id, "phases_of_play.csv"))
                .await?,
        )?;
        Ok(Arc::new(MatchBundle {
            match_id: match_id.to_string(),
            metadata,
            events,
            phases,
        }))
    }
}

#[async_trait]
impl TrackingProvider for RemoteDataProvider {
    async fn load_tracking(&self, match_id: &str) -> Result<Tracking, DataError> {
        let url = self.match_url(match_id, "tracking_extrapolated.jsonl");
        match self.fetch_text(&url).await {
            Ok(raw) => Ok(Arc::new(parse_tracking_jsonl(&raw, self.max_frames))),
            Err(DataError::NotFound(url)) => {
                warn!("Tracking not published at {}", url);
                Ok(Arc::new(Vec::new()))
            }
            Err(e) => Err(e),
        }
    }
}
