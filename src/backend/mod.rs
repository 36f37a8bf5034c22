//! Backend access for the scope.
//!
//! A [`Backend`] is whatever actually stores rows and tag pairs: a local
//! data directory or a sync service. [`BackendClient`] sits in front of it
//! and is the only thing the rest of the crate talks to.

pub mod local;

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::{
    error::{Error, Result},
    query::FetchMode,
    row::{Row, TagPair},
    tag_cache::TagCache,
};

pub use local::LocalBackend;

/// Storage collaborator the scope queries.
///
/// Implementations return [`Error::NotModified`] when they can tell the
/// caller already has the latest data.
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    fn all_tag_pairs(&self) -> Result<Vec<TagPair>>;

    /// Rows carrying every tag in `plain_tags`, with content.
    fn rows_from_plain_tags(&self, plain_tags: &[String]) -> Result<Vec<Row>>;

    /// Rows carrying every tag in `plain_tags`, tags only.
    fn list_rows(&self, plain_tags: &[String]) -> Result<Vec<Row>>;

    fn save_tag_pair(&self, pair: &TagPair) -> Result<()>;
}

/// How a tag cache refresh ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Pairs fetched; `failed` of them could not be written.
    Cached { fetched: usize, failed: usize },
    NotModified,
    /// The backend call itself failed.
    Unavailable,
}

#[derive(Clone)]
pub struct BackendClient {
    backend: Arc<dyn Backend>,
}

impl BackendClient {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Fetch the rows matching `tags` through the call `mode` selects.
    ///
    /// A not-modified answer is an empty success. Any other backend failure
    /// becomes [`Error::BackendUnavailable`].
    pub fn fetch_rows_for_tags(
        &self,
        tags: &[String],
        mode: FetchMode,
    ) -> Result<Vec<Row>> {
        let rows = match mode {
            FetchMode::Content => self.backend.rows_from_plain_tags(tags),
            FetchMode::Metadata => self.backend.list_rows(tags),
        };

        match rows {
            Ok(rows) => Ok(rows),
            Err(Error::NotModified) => {
                tracing::debug!(?tags, "backend reported no new rows");
                Ok(Vec::new())
            }
            Err(e @ Error::BackendUnavailable(_)) => Err(e),
            Err(e) => Err(Error::BackendUnavailable(e.to_string())),
        }
    }

    /// Re-fetch every tag pair into `cache` on a detached task.
    ///
    /// Runs on the current tokio runtime's blocking pool when there is
    /// one, otherwise on its own thread. The returned receiver reports the
    /// outcome; dropping it does not stop the refresh.
    pub fn refresh_tag_cache(
        &self,
        cache: Arc<TagCache>,
    ) -> oneshot::Receiver<RefreshOutcome> {
        let (tx, rx) = oneshot::channel();
        let client = self.clone();
        let task = move || {
            let outcome = client.refresh_tag_cache_now(&cache);
            let _ = tx.send(outcome);
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(task);
            }
            Err(_) => {
                std::thread::spawn(task);
            }
        }

        rx
    }

    /// Synchronous body of [`refresh_tag_cache`](Self::refresh_tag_cache).
    /// Failures are logged, never returned.
    pub fn refresh_tag_cache_now(&self, cache: &TagCache) -> RefreshOutcome {
        let pairs = match self.backend.all_tag_pairs() {
            Ok(pairs) => pairs,
            Err(Error::NotModified) => {
                tracing::debug!("no new tag pairs to cache");
                return RefreshOutcome::NotModified;
            }
            Err(e) => {
                tracing::warn!(
                    backend = self.backend.name(),
                    "error getting all tag pairs: {e}"
                );
                return RefreshOutcome::Unavailable;
            }
        };

        let mut failed = 0;
        for pair in &pairs {
            if let Err(e) = cache.save(pair) {
                let err = Error::CacheWriteFailed {
                    random: pair.random.clone(),
                    source: Box::new(e),
                };
                tracing::warn!("{err}");
                failed += 1;
            }
        }

        if failed == 0 {
            tracing::info!(count = pairs.len(), "cached all tag pairs");
        }

        RefreshOutcome::Cached {
            fetched: pairs.len(),
            failed,
        }
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("backend", &self.backend.name())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::{testing::StubBackend, *};

    fn note() -> Row {
        Row::new(b"hi".to_vec(), ["type:text", "type:note", "work"])
    }

    fn stub_client(stub: StubBackend) -> (Arc<StubBackend>, BackendClient) {
        let stub = Arc::new(stub);
        (Arc::clone(&stub), BackendClient::new(stub))
    }

    #[test]
    fn mode_selects_backend_call() {
        let (stub, client) = stub_client(StubBackend {
            rows: vec![note()],
            ..Default::default()
        });
        let tags = vec!["work".to_string()];

        let full = client.fetch_rows_for_tags(&tags, FetchMode::Content).unwrap();
        assert_eq!(full, vec![note()]);

        let meta = client
            .fetch_rows_for_tags(&tags, FetchMode::Metadata)
            .unwrap();
        assert!(meta[0].decrypted().is_empty());

        assert_eq!(stub.content_calls.load(Ordering::SeqCst), 1);
        assert_eq!(stub.list_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn not_modified_is_empty_success() {
        let (_stub, client) = stub_client(StubBackend {
            rows: vec![note()],
            not_modified: true,
            ..Default::default()
        });
        let rows = client.fetch_rows_for_tags(&[], FetchMode::Content).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn failures_become_backend_unavailable() {
        let (_stub, client) = stub_client(StubBackend {
            unavailable: true,
            ..Default::default()
        });
        let err = client
            .fetch_rows_for_tags(&[], FetchMode::Metadata)
            .unwrap_err();
        assert!(matches!(err, Error::BackendUnavailable(_)));
    }

    #[test]
    fn refresh_caches_pairs_off_thread() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Arc::new(TagCache::open(tmp.path()).unwrap());
        let (_stub, client) = stub_client(StubBackend {
            pairs: vec![TagPair::new("r1", "work"), TagPair::new("r2", "home")],
            ..Default::default()
        });

        let outcome = client
            .refresh_tag_cache(Arc::clone(&cache))
            .blocking_recv()
            .unwrap();

        assert_eq!(
            outcome,
            RefreshOutcome::Cached {
                fetched: 2,
                failed: 0
            }
        );
        assert_eq!(cache.load_all().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn refresh_on_runtime_swallows_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Arc::new(TagCache::open(tmp.path()).unwrap());

        let (_stub, failing) = stub_client(StubBackend {
            unavailable: true,
            ..Default::default()
        });
        let outcome = failing
            .refresh_tag_cache(Arc::clone(&cache))
            .await
            .unwrap();
        assert_eq!(outcome, RefreshOutcome::Unavailable);

        let (_stub, unchanged) = stub_client(StubBackend {
            not_modified: true,
            ..Default::default()
        });
        let outcome = unchanged.refresh_tag_cache(Arc::clone(&cache)).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::NotModified);

        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn refresh_while_loading_does_not_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Arc::new(TagCache::open(tmp.path()).unwrap());
        let pairs: Vec<TagPair> = (0..100)
            .map(|i| TagPair::new(format!("r{i:03}"), format!("t{i}")))
            .collect();
        let (_stub, client) = stub_client(StubBackend {
            pairs: pairs.clone(),
            ..Default::default()
        });

        let rx = client.refresh_tag_cache(Arc::clone(&cache));
        for _ in 0..10 {
            let loaded = cache.load_all().unwrap();
            assert!(loaded.len() <= pairs.len());
            assert!(loaded.iter().all(|p| pairs.contains(p)));
            assert!(loaded.windows(2).all(|w| w[0].random < w[1].random));
        }
        rx.blocking_recv().unwrap();

        assert_eq!(cache.load_all().unwrap(), pairs);
    }
}
