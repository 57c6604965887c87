use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::error::DataError;
use super::models::MatchBundle;
use super::provider::{MatchCorpusProvider, Tracking, TrackingProvider};

/// Memoizes match bundles and tracking by match id for the lifetime of the
/// wrapper. Failed loads are not cached. Entries are never invalidated.
pub struct CachedProvider<P> {
    inner: P,
    matches: Mutex<HashMap<String, Arc<MatchBundle>>>,
    tracking: Mutex<HashMap<String, Tracking>>,
}

impl<P> CachedProvider<P> {
    pub fn new(inner: P) -> Self {
        CachedProvider {
            inner,
            matches: Mutex::new(HashMap::new()),
            tracking: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<P: MatchCorpusProvider> MatchCorpusProvider for CachedProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list_match_ids(&self) -> Result<Vec<String>, DataError> {
        self.inner.list_match_ids().await
    }

    async fn load_match(&self, match_id: &str) -> Result<Arc<MatchBundle>, DataError> {
        if let Some(hit) = self.matches.lock().await.get(match_id) {
            debug!("Match cache hit: {}", match_id);
            return Ok(Arc::clone(hit));
        }
        let bundle = self.inner.load_match(match_id).await?;
        self.matches
            .lock()
            .await
            .insert(match_id.to_string(), Arc::clone(&bundle));
        Ok(bundle)
    }
}

#[async_trait]
impl<P: TrackingProvider> TrackingProvider for CachedProvider<P> {
    async fn load_tracking(&self, match_id: &str) -> Result<Tracking, DataError> {
        if let Some(hit) = self.tracking.lock().await.get(match_id) {
            debug!("Tracking cache hit: {}", match_id);
            return Ok(Arc::clone(hit));
        }
        let frames = self.inner.load_tracking(match_id).await?;
        self.tracking
            .lock()
            .await
            .insert(match_id.to_string(), Arc::clone(&frames));
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        loads: AtomicUsize,
    }

    #[async_trait]
    impl MatchCorpusProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn list_match_ids(&self) -> Result<Vec<String>, DataError> {
            Ok(vec!["1".into()])
        }

        async fn load_match(&self, match_id: &str) -> Result<Arc<MatchBundle>, DataError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if match_id == "bad" {
                return Err(DataError::NotFound(match_id.to_string()));
            }
            Ok(Arc::new(MatchBundle {
                match_id: match_id.to_string(),
                ..Default::default()
            }))
        }
    }

    #[async_trait]
    impl TrackingProvider for CountingProvider {
        async fn load_tracking(&self, _match_id: &str) -> Result<Tracking, DataError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Vec::new()))
        }
    }

    #[tokio::test]
    async fn second_load_is_served_from_cache() {
        let cached = CachedProvider::new(CountingProvider {
            loads: AtomicUsize::new(0),
        });
        let a = cached.load_match("1").await.unwrap();
        let b = cached.load_match("1").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        cached.load_tracking("1").await.unwrap();
        cached.load_tracking("1").await.unwrap();
        assert_eq!(cached.inner.loads.load(Ordering::SeqCst), 2);
        assert_eq!(cached.name(), "counting");
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cached = CachedProvider::new(CountingProvider {
            loads: AtomicUsize::new(0),
        });
        assert!(cached.load_match("bad").await.is_err());
        assert!(cached.load_match("bad").await.is_err());
        assert_eq!(cached.inner.loads.load(Ordering::SeqCst), 2);
    }
}
