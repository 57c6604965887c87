pub mod cache;
pub mod error;
pub mod local;
pub mod models;
pub mod parse;
pub mod provider;
pub mod remote;

pub use cache::CachedProvider;
pub use error::DataError;
pub use local::LocalDataProvider;
pub use provider::{DataSource, MatchCorpusProvider, Tracking, TrackingProvider};
pub use remote::RemoteDataProvider;

use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

use models::MatchBundle;

/// One match as handed to the metric pipeline.
#[derive(Debug, Clone)]
pub struct LoadedMatch {
    pub bundle: Arc<MatchBundle>,
    pub tracking: Tracking,
}

/// A match that could not be loaded; the rest of the corpus proceeds without it.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub match_id: String,
    pub reason: String,
}

/// Load the corpus with at most `concurrency` matches in flight.
///
/// `match_ids` restricts the run to the given ids; when empty every id the
/// provider lists is loaded. Results keep the order of the id list.
pub async fn load_corpus(
    source: Arc<dyn DataSource>,
    match_ids: &[String],
    load_tracking: bool,
    concurrency: usize,
) -> Result<(Vec<LoadedMatch>, Vec<LoadFailure>), DataError> {
    let ids = if match_ids.is_empty() {
        source.list_match_ids().await?
    } else {
        match_ids.to_vec()
    };
    info!(
        "Loading {} match(es) from {} provider (tracking: {}, concurrency: {})",
        ids.len(),
        source.name(),
        load_tracking,
        concurrency
    );

    let outcomes: Vec<(String, Result<LoadedMatch, DataError>)> = stream::iter(ids)
        .map(|id| {
            let source = Arc::clone(&source);
            async move {
                let result = load_one(source.as_ref(), &id, load_tracking).await;
                (id, result)
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut loaded = Vec::new();
    let mut failures = Vec::new();
    for (match_id, outcome) in outcomes {
        match outcome {
            Ok(m) => {
                if load_tracking && m.tracking.is_empty() {
                    warn!("Match {}: 0 tracking frames loaded", match_id);
                } else {
                    info!("Match {}: {} tracking frames", match_id, m.tracking.len());
                }
                loaded.push(m);
            }
            Err(e) => {
                warn!("Failed to load match {}: {}", match_id, e);
                failures.push(LoadFailure {
                    match_id,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok((loaded, failures))
}

async fn load_one(
    source: &dyn DataSource,
    match_id: &str,
    load_tracking: bool,
) -> Result<LoadedMatch, DataError> {
    let bundle = source.load_match(match_id).await?;
    let tracking = if load_tracking {
        source.load_tracking(match_id).await?
    } else {
        Arc::new(Vec::new())
    };
    Ok(LoadedMatch { bundle, tracking })
}
