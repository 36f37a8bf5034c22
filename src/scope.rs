use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use crate::{
    backend::{Backend, BackendClient},
    config::ScopeConfig,
    department::{DepartmentNode, department_tree},
    error::{Error, Result},
    format,
    preview::{self, ActionMetadata},
    query::{FetchMode, build_filter_tags},
    reply::{Category, PreviewReply, ResultRecord, SearchReply},
    row::{ID_PREFIX, Row},
    tag_cache::TagCache,
};

struct ScopeState {
    config: ScopeConfig,
    client: BackendClient,
    tag_cache: Arc<TagCache>,
}

/// The scope as the host sees it: initialized once, then asked to search
/// and preview any number of times, possibly concurrently.
#[derive(Default)]
pub struct Scope {
    state: OnceLock<ScopeState>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the configured backend and the tag cache.
    ///
    /// Only the first successful call has any effect; later calls log and
    /// return `Ok`.
    pub fn init(&self, config: ScopeConfig) -> Result<()> {
        if self.is_initialized() {
            tracing::info!("scope already initialized");
            return Ok(());
        }
        let backend = config.backend.open()?;
        self.init_with_backend(config, backend)
    }

    /// Like [`init`](Self::init), with a backend the caller built.
    pub fn init_with_backend(
        &self,
        config: ScopeConfig,
        backend: Arc<dyn Backend>,
    ) -> Result<()> {
        if self.is_initialized() {
            tracing::info!("scope already initialized");
            return Ok(());
        }

        let tag_cache = Arc::new(TagCache::open(&config.cache_dir.tags_dir())?);
        tracing::info!(
            cache_dir = %config.cache_dir.root().display(),
            backend = backend.name(),
            cached_tag_pairs = tag_cache.len()?,
            "scope initialized"
        );

        let state = ScopeState {
            config,
            client: BackendClient::new(backend),
            tag_cache,
        };
        if self.state.set(state).is_err() {
            tracing::info!("scope initialized concurrently; keeping first");
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.get().is_some()
    }

    fn state(&self) -> Result<&ScopeState> {
        self.state
            .get()
            .ok_or_else(|| Error::Config("scope is not initialized".into()))
    }

    pub fn config(&self) -> Result<&ScopeConfig> {
        Ok(&self.state()?.config)
    }

    pub fn client(&self) -> Result<&BackendClient> {
        Ok(&self.state()?.client)
    }

    pub fn tag_cache(&self) -> Result<&Arc<TagCache>> {
        Ok(&self.state()?.tag_cache)
    }

    pub fn departments(&self, query_text: &str) -> DepartmentNode {
        department_tree(query_text)
    }

    /// Answer a search: register departments, start a background tag
    /// cache refresh, fetch matching rows and push one result per row.
    ///
    /// `cancel` is checked before the backend call and before every push.
    /// Once it fires nothing more is pushed and the call returns `Ok`.
    pub fn search<R: SearchReply>(
        &self,
        query_text: &str,
        department_id: &str,
        reply: &mut R,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let state = self.state()?;

        reply.register_departments(department_tree(query_text));

        let tags = build_filter_tags(query_text, department_id);
        tracing::info!(department_id, ?tags, "search");

        // Detached; the outcome is only logged.
        drop(state.client.refresh_tag_cache(Arc::clone(&state.tag_cache)));

        if cancel.is_cancelled() {
            tracing::info!("search cancelled before fetching rows");
            return Ok(());
        }

        let mode = FetchMode::for_department(department_id);
        let rows = state.client.fetch_rows_for_tags(&tags, mode)?;

        push_rows(&rows, department_id, reply, cancel)
    }

    /// Look up one row by its `id:` tag and format it as `department_id`
    /// would.
    pub fn find_result(
        &self,
        row_id: &str,
        department_id: &str,
    ) -> Result<ResultRecord> {
        let state = self.state()?;
        let mut tags = build_filter_tags("", department_id);
        tags.push(format!("{ID_PREFIX}{row_id}"));

        let mode = FetchMode::for_department(department_id);
        let rows = state.client.fetch_rows_for_tags(&tags, mode)?;
        let row = rows.first().ok_or_else(|| Error::NotFound {
            kind: "row",
            name: row_id.to_string(),
        })?;

        let category = Category::for_department(department_id);
        Ok(format::format_row(row, department_id, &category.id))
    }

    /// Describe how to show a selected result.
    pub fn preview<R: PreviewReply>(
        &self,
        result: &ResultRecord,
        metadata: &ActionMetadata,
        reply: &mut R,
    ) -> Result<()> {
        tracing::debug!(title = result.title(), hints = ?metadata.hints, "preview");

        reply.register_layout(preview::preview_layout());
        reply.push_widgets(preview::preview_widgets(metadata))
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

/// Push one freshly formatted record per row, stopping at cancellation.
pub fn push_rows<R: SearchReply>(
    rows: &[Row],
    department_id: &str,
    reply: &mut R,
    cancel: &CancellationToken,
) -> Result<()> {
    let category = Category::for_department(department_id);
    let category_id = category.id.clone();
    reply.register_category(category);

    for row in rows {
        if cancel.is_cancelled() {
            tracing::info!("search cancelled; returning");
            return Ok(());
        }

        let record = format::format_row(row, department_id, &category_id);
        tracing::debug!(title = record.title(), "pushing result");
        reply.push(record)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::{
        backend::{LocalBackend, testing::StubBackend},
        config::BackendConfig,
        data_dir::CacheDir,
        reply::CollectingReply,
        row::TagPair,
    };

    fn stub_config(cache: &std::path::Path) -> ScopeConfig {
        ScopeConfig {
            cache_dir: CacheDir::resolve(Some(cache)).unwrap(),
            backend: BackendConfig {
                name: "stub".into(),
                base_url: "stub://".into(),
                auth_token: String::new(),
            },
        }
    }

    fn stub_scope(stub: StubBackend) -> (tempfile::TempDir, Arc<StubBackend>, Scope) {
        let tmp = tempfile::tempdir().unwrap();
        let stub = Arc::new(stub);
        let backend: Arc<dyn Backend> = stub.clone();
        let scope = Scope::new();
        scope
            .init_with_backend(stub_config(tmp.path()), backend)
            .unwrap();
        (tmp, stub, scope)
    }

    fn sample_rows() -> Vec<Row> {
        vec![
            Row::new(b"hi".to_vec(), ["id:1", "type:text", "type:note", "work"]),
            Row::new(b"pw".to_vec(), ["id:2", "type:text", "type:password", "bank"]),
            Row::new(Vec::new(), ["id:3", "type:file", "filename:a.pdf"]),
        ]
    }

    /// Reply that cancels the search after a fixed number of pushes.
    struct CancelAfter {
        inner: CollectingReply,
        remaining: usize,
        token: CancellationToken,
    }

    impl SearchReply for CancelAfter {
        fn register_departments(&mut self, root: DepartmentNode) {
            self.inner.register_departments(root);
        }

        fn register_category(&mut self, category: Category) {
            self.inner.register_category(category);
        }

        fn push(&mut self, result: ResultRecord) -> Result<()> {
            self.inner.push(result)?;
            self.remaining = self.remaining.saturating_sub(1);
            if self.remaining == 0 {
                self.token.cancel();
            }
            Ok(())
        }
    }

    #[test]
    fn search_before_init_fails() {
        let scope = Scope::new();
        let mut reply = CollectingReply::default();
        let err = scope
            .search("x", "", &mut reply, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn init_is_idempotent() {
        let (tmp, _stub, scope) = stub_scope(StubBackend::default());
        let other: Arc<dyn Backend> = Arc::new(StubBackend::default());
        let mut second = stub_config(tmp.path());
        second.backend.name = "second".into();

        scope.init_with_backend(second, other).unwrap();
        assert_eq!(scope.config().unwrap().backend.name, "stub");
        assert_eq!(scope.client().unwrap().backend().name(), "stub");
    }

    #[test]
    fn search_pushes_notes_with_content() {
        let (_tmp, stub, scope) = stub_scope(StubBackend {
            rows: sample_rows(),
            ..Default::default()
        });
        let mut reply = CollectingReply::default();

        scope
            .search("work", "Notes", &mut reply, &CancellationToken::new())
            .unwrap();

        assert_eq!(reply.departments.as_ref().unwrap().subdepartments.len(), 3);
        assert_eq!(reply.categories[0].title, "Notes");
        assert_eq!(reply.results.len(), 1);
        assert_eq!(reply.results[0].get("text_content"), "<b>Note: </b>hi");
        assert_eq!(stub.content_calls.load(Ordering::SeqCst), 1);
        assert_eq!(stub.list_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn search_root_lists_metadata() {
        let (_tmp, stub, scope) = stub_scope(StubBackend {
            rows: sample_rows(),
            ..Default::default()
        });
        let mut reply = CollectingReply::default();

        scope
            .search("", "", &mut reply, &CancellationToken::new())
            .unwrap();

        assert_eq!(reply.results.len(), 3);
        assert_eq!(reply.results[2].title(), "a.pdf");
        assert!(reply.results.iter().all(|r| r.uri().is_empty()));
        assert_eq!(stub.list_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn password_results_hide_tags() {
        let (_tmp, _stub, scope) = stub_scope(StubBackend {
            rows: sample_rows(),
            ..Default::default()
        });
        let mut reply = CollectingReply::default();

        scope
            .search("", "Passwords", &mut reply, &CancellationToken::new())
            .unwrap();

        let result = &reply.results[0];
        assert_eq!(result.title(), "bank");
        assert_eq!(result.get("short_summary"), "");
        assert_eq!(result.get("text_content"), "pw");
        assert!(result.uri().ends_with("?q=pw"));
    }

    #[test]
    fn cancelled_before_first_push_pushes_nothing() {
        let (_tmp, stub, scope) = stub_scope(StubBackend {
            rows: sample_rows(),
            ..Default::default()
        });
        let token = CancellationToken::new();
        token.cancel();
        let mut reply = CollectingReply::default();

        scope.search("", "", &mut reply, &token).unwrap();

        assert!(reply.results.is_empty());
        assert_eq!(stub.list_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancellation_stops_between_pushes() {
        let token = CancellationToken::new();
        let mut reply = CancelAfter {
            inner: CollectingReply::default(),
            remaining: 2,
            token: token.clone(),
        };

        push_rows(&sample_rows(), "", &mut reply, &token).unwrap();

        assert_eq!(reply.inner.results.len(), 2);
    }

    #[test]
    fn push_rows_builds_distinct_records() {
        let mut reply = CollectingReply::default();
        push_rows(&sample_rows(), "", &mut reply, &CancellationToken::new())
            .unwrap();

        let titles: Vec<&str> = reply.results.iter().map(|r| r.title()).collect();
        assert_eq!(titles, ["(No Title)", "(No Title)", "a.pdf"]);
        assert_eq!(reply.results[0].get("row_id"), "1");
        assert_eq!(reply.results[1].get("row_id"), "2");
    }

    #[test]
    fn backend_failure_is_surfaced() {
        let (_tmp, _stub, scope) = stub_scope(StubBackend {
            unavailable: true,
            ..Default::default()
        });
        let mut reply = CollectingReply::default();

        let err = scope
            .search("x", "", &mut reply, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::BackendUnavailable(_)));
        assert!(reply.results.is_empty());
    }

    #[test]
    fn not_modified_search_is_empty_success() {
        let (_tmp, _stub, scope) = stub_scope(StubBackend {
            rows: sample_rows(),
            not_modified: true,
            ..Default::default()
        });
        let mut reply = CollectingReply::default();

        scope
            .search("", "", &mut reply, &CancellationToken::new())
            .unwrap();
        assert!(reply.results.is_empty());
    }

    #[test]
    fn search_refreshes_tag_cache_in_background() {
        let (_tmp, _stub, scope) = stub_scope(StubBackend {
            pairs: vec![TagPair::new("r1", "work")],
            ..Default::default()
        });
        let mut reply = CollectingReply::default();
        scope
            .search("", "", &mut reply, &CancellationToken::new())
            .unwrap();

        let cache = scope.tag_cache().unwrap();
        for _ in 0..200 {
            if !cache.is_empty().unwrap() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(cache.load_all().unwrap(), vec![TagPair::new("r1", "work")]);
    }

    #[test]
    fn find_result_and_preview() {
        let tmp = tempfile::tempdir().unwrap();
        let data = tmp.path().join("data");
        let backend = LocalBackend::open("local", &data).unwrap();
        backend
            .add_row(b"hi".to_vec(), ["id:n1", "type:text", "type:note"])
            .unwrap();

        let scope = Scope::new();
        let config = ScopeConfig {
            cache_dir: CacheDir::resolve(Some(&tmp.path().join("cache"))).unwrap(),
            backend: BackendConfig {
                name: "local".into(),
                base_url: format!("file://{}", data.display()),
                auth_token: String::new(),
            },
        };
        scope.init(config).unwrap();

        let record = scope.find_result("n1", "Notes").unwrap();
        assert_eq!(record.get("text_content"), "<b>Note: </b>hi");
        assert!(matches!(
            scope.find_result("missing", "Notes"),
            Err(Error::NotFound { .. })
        ));

        let mut reply = CollectingReply::default();
        scope
            .preview(&record, &ActionMetadata::default(), &mut reply)
            .unwrap();
        assert_eq!(reply.layouts.len(), 1);
        assert_eq!(reply.widgets.len(), 5);
    }
}
