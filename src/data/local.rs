use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::DataError;
use super::models::{MatchBundle, MatchMetadata};
use super::parse::{parse_events_csv, parse_match_index, parse_phases_csv, parse_tracking_jsonl};
use super::provider::{MatchCorpusProvider, Tracking, TrackingProvider};

/// Provider backed by a local checkout of the open-data layout:
/// `<root>/matches.json` and `<root>/matches/<id>/<id>_*.{json,csv,jsonl}`.
pub struct LocalDataProvider {
    root: PathBuf,
    max_frames: Option<usize>,
}

impl LocalDataProvider {
    pub fn new(root: impl Into<PathBuf>, max_frames: Option<usize>) -> Self {
        LocalDataProvider {
            root: root.into(),
            max_frames,
        }
    }

    fn match_file(&self, match_id: &str, suffix: &str) -> PathBuf {
        self.root
            .join("matches")
            .join(match_id)
            .join(format!("{}_{}", match_id, suffix))
    }

    async fn read(path: &Path) -> Result<String, DataError> {
        debug!("Reading {}", path.display());
        tokio::fs::read_to_string(path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                DataError::NotFound(path.display().to_string())
            } else {
                DataError::Io {
                    path: path.display().to_string(),
                    source,
                }
            }
        })
    }
}

#[async_trait]
impl MatchCorpusProvider for LocalDataProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn list_match_ids(&self) -> Result<Vec<String>, DataError> {
        let raw = Self::read(&self.root.join("matches.json")).await?;
        parse_match_index(&raw)
    }

    async fn load_match(&self, match_id: &str) -> Result<Arc<MatchBundle>, DataError> {
        let metadata: MatchMetadata =
            serde_json::from_str(&Self::read(&self.match_file(match_id, "match.json")).await?)?;
        let events =
            parse_events_csv(&Self::read(&self.match_file(match_id, "dynamic_events.csv")).await?)?;
        let phases =
            parse_phases_csv(&Self::read(&self.match_file(match_id, "phases_of_play.csv")).await?)?;
        Ok(Arc::new(MatchBundle {
            match_id: match_id.to_string(),
            metadata,
            events,
            phases,
        }))
    }
}

#[async_trait]
impl TrackingProvider for LocalDataProvider {
    async fn load_tracking(&self, match_id: &str) -> Result<Tracking, DataError> {
        let path = self.match_file(match_id, "tracking_extrapolated.jsonl");
        let raw = match Self::read(&path).await {
            Ok(raw) => raw,
            Err(DataError::NotFound(p)) => {
                warn!("Tracking file not found: {}", p);
                return Ok(Arc::new(Vec::new()));
            }
            Err(e) => return Err(e),
        };
        Ok(Arc::new(parse_tracking_jsonl(&raw, self.max_frames)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_match(root: &Path, id: &str, with_tracking: bool) {
        let dir = root.join("matches").join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(format!("{}_match.json", id)),
            r#"{"home_team": {"id": 1, "name": "H", "short_name": "H", "acronym": "HHH"},
                "away_team": {"id": 2, "name": "A", "short_name": "A", "acronym": "AAA"}}"#,
        )
        .unwrap();
        fs::write(
            dir.join(format!("{}_dynamic_events.csv", id)),
            "event_id,team_id,player_id,time_start,end_type\ne1,1,10,00:05.0,possession_loss\n",
        )
        .unwrap();
        fs::write(
            dir.join(format!("{}_phases_of_play.csv", id)),
            "team_in_possession_id,team_out_of_possession_id,time_start,time_end\n1,2,00:00.0,00:10.0\n",
        )
        .unwrap();
        if with_tracking {
            fs::write(
                dir.join(format!("{}_tracking_extrapolated.jsonl", id)),
                "{\"frame\": 1, \"timestamp\": 0.0, \"period\": 1, \"player_data\": []}\n\
                 {\"frame\": 2, \"timestamp\": 0.1, \"period\": 1, \"player_data\": []}\n",
            )
            .unwrap();
        }
    }

    #[tokio::test]
    async fn loads_match_tables_and_tracking() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("matches.json"), r#"[{"id": 42}, {"id": 43}]"#).unwrap();
        write_match(dir.path(), "42", true);
        write_match(dir.path(), "43", false);

        let provider = LocalDataProvider::new(dir.path(), None);
        assert_eq!(provider.list_match_ids().await.unwrap(), vec!["42", "43"]);

        let bundle = provider.load_match("42").await.unwrap();
        assert_eq!(bundle.match_id, "42");
        assert_eq!(bundle.events.len(), 1);
        assert_eq!(bundle.phases.len(), 1);
        assert_eq!(bundle.metadata.home_team.id, Some(1));

        assert_eq!(provider.load_tracking("42").await.unwrap().len(), 2);
        assert!(provider.load_tracking("43").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_match_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalDataProvider::new(dir.path(), Some(1));
        let err = provider.load_match("404").await.unwrap_err();
        assert!(matches!(err, DataError::NotFound(_)));
    }
}
