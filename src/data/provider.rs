use async_trait::async_trait;
use std::sync::Arc;

use super::error::DataError;
use super::models::{MatchBundle, TrackingFrame};

/// Shared, immutable tracking sequence for one match.
pub type Tracking = Arc<Vec<TrackingFrame>>;

/// Source of per-match metadata, event tables and phase tables.
#[async_trait]
pub trait MatchCorpusProvider: Send + Sync {
    /// Ids of every match available from this source.
    async fn list_match_ids(&self) -> Result<Vec<String>, DataError>;

    async fn load_match(&self, match_id: &str) -> Result<Arc<MatchBundle>, DataError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Source of per-match tracking frames (ordered or not).
///
/// A match without tracking yields an empty sequence, not an error.
#[async_trait]
pub trait TrackingProvider: Send + Sync {
    async fn load_tracking(&self, match_id: &str) -> Result<Tracking, DataError>;
}

/// A provider that serves both the corpus tables and tracking.
pub trait DataSource: MatchCorpusProvider + TrackingProvider {}

impl<T: MatchCorpusProvider + TrackingProvider> DataSource for T {}
