//! The cache-invalidating asset server, independent of any HTTP framework.

use std::sync::Arc;
use std::time::SystemTime;

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use sluice::{
    Asset, AssetKind, DeploymentMode, FileStore, FileStoreError, UnnecessaryAssetsFilter,
    VariantSelector,
};

use crate::pipelines::PipelineSet;
use crate::server::cache::{CacheEntry, CacheStore, newest_write, snapshot};
use crate::server::http::{
    comment_body, entity_tag, etag_matches, format_http_date, not_modified_since,
};

const NO_STORE: &str = "no-cache, no-store";

/// A request for one logical asset plus the client's validators.
#[derive(Debug, Clone, Default)]
pub struct AssetRequest {
    pub logical_path: String,
    pub if_modified_since: Option<String>,
    pub if_none_match: Option<String>,
}

impl AssetRequest {
    pub fn new(logical_path: impl Into<String>) -> Self {
        Self {
            logical_path: logical_path.into(),
            ..Default::default()
        }
    }

    pub fn if_none_match(mut self, etag: impl Into<String>) -> Self {
        self.if_none_match = Some(etag.into());
        self
    }

    pub fn if_modified_since(mut self, date: impl Into<String>) -> Self {
        self.if_modified_since = Some(date.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct AssetResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl AssetResponse {
    fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }

    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    fn set(&mut self, name: header::HeaderName, value: &str) {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
    }
}

/// Why a compile produced no entry.
#[derive(Debug)]
enum CompileFailure {
    /// The root file disappeared after it was located.
    RootMissing,
    Failed(String),
}

/// The file a logical path is served from.
#[derive(Debug, Clone)]
struct Root {
    concrete_path: String,
    kind: AssetKind,
    minified: bool,
}

/// Compiles on demand and serves from cache until any file the output was
/// built from changes.
#[derive(Debug)]
pub struct AssetServer {
    store: Arc<dyn FileStore>,
    pipelines: Arc<PipelineSet>,
    selector: VariantSelector,
    ignore: Option<UnnecessaryAssetsFilter>,
    cache: CacheStore,
    max_age_secs: u64,
}

impl AssetServer {
    pub fn new(
        store: Arc<dyn FileStore>,
        pipelines: Arc<PipelineSet>,
        selector: VariantSelector,
    ) -> Self {
        Self {
            store,
            pipelines,
            selector,
            ignore: None,
            cache: CacheStore::new(),
            max_age_secs: crate::config::default_max_age_secs(),
        }
    }

    /// Answer 404 for assets matching the filter's globs.
    pub fn with_ignore(mut self, ignore: UnnecessaryAssetsFilter) -> Self {
        self.ignore = Some(ignore);
        self
    }

    pub fn with_max_age(mut self, max_age_secs: u64) -> Self {
        self.max_age_secs = max_age_secs;
        self
    }

    pub fn mode(&self) -> DeploymentMode {
        self.pipelines.mode()
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Serve `request`: 200 with the compiled body, 304 when the client's
    /// copy is current, 404 with an empty body when there is nothing to
    /// serve, 500 with a comment-wrapped message when compilation fails.
    pub async fn serve(&self, request: &AssetRequest) -> AssetResponse {
        let logical_path = request.logical_path.as_str();
        let Some(root) = self.locate(logical_path) else {
            tracing::debug!("No asset for {}", logical_path);
            return AssetResponse::empty(StatusCode::NOT_FOUND);
        };
        let Ok(root_last_write) = self.store.last_write_time(&root.concrete_path) else {
            return AssetResponse::empty(StatusCode::NOT_FOUND);
        };

        let slot = self.cache.slot(logical_path);
        let mut cached = slot.lock().await;
        let fresh = cached.as_ref().is_some_and(|entry| {
            entry.is_fresh(self.store.as_ref(), &root.concrete_path, root_last_write)
        });

        if !fresh {
            if let Some(stale) = cached.as_ref() {
                tracing::info!(
                    "{} is stale ({} changed), recompiling",
                    logical_path,
                    stale
                        .first_changed(self.store.as_ref())
                        .unwrap_or(root.concrete_path.as_str())
                );
            }
            match self.compile(logical_path, &root, root_last_write).await {
                Ok(entry) => *cached = Some(entry),
                Err(CompileFailure::RootMissing) => {
                    *cached = None;
                    tracing::debug!("{} vanished before it could be read", root.concrete_path);
                    return AssetResponse::empty(StatusCode::NOT_FOUND);
                }
                Err(CompileFailure::Failed(message)) => {
                    *cached = None;
                    tracing::error!("Failed to compile {}: {}", logical_path, message);
                    return self.error_response(root.kind, &message);
                }
            }
        }

        let Some(entry) = cached.as_ref() else {
            return AssetResponse::empty(StatusCode::NOT_FOUND);
        };
        self.respond(request, entry)
    }

    /// Map a logical path to the file it is built from.
    ///
    /// `.css`/`.js` go through variant selection; source dialects (`.less`,
    /// `.ts`, ...) are served from the file of that name.
    fn locate(&self, logical_path: &str) -> Option<Root> {
        if !logical_path.starts_with('/') || logical_path.contains('\0') {
            return None;
        }
        if logical_path.split('/').any(|segment| segment == "..") {
            return None;
        }
        if self
            .ignore
            .as_ref()
            .is_some_and(|ignore| ignore.is_ignored(logical_path))
        {
            return None;
        }
        let kind = AssetKind::from_path(logical_path)?;

        if VariantSelector::handles(logical_path) {
            let selected = self.selector.select(logical_path, self.mode()).ok()?;
            return Some(Root {
                concrete_path: selected.concrete_path,
                kind,
                minified: selected.is_minified,
            });
        }

        self.store.file_exists(logical_path).then(|| Root {
            concrete_path: logical_path.to_string(),
            kind,
            minified: false,
        })
    }

    async fn compile(
        &self,
        logical_path: &str,
        root: &Root,
        root_last_write: SystemTime,
    ) -> Result<CacheEntry, CompileFailure> {
        let content = self
            .store
            .read_text(&root.concrete_path)
            .map_err(|e| match e {
                FileStoreError::FileNotFound { .. } => CompileFailure::RootMissing,
                other => CompileFailure::Failed(other.to_string()),
            })?;
        let mut asset = Asset::new(logical_path, root.kind)
            .with_concrete_path(&root.concrete_path)
            .with_content(content);
        asset.minified = root.minified;

        let output = self
            .pipelines
            .for_kind(root.kind)
            .process(vec![asset])
            .await
            .map_err(|e| CompileFailure::Failed(e.to_string()))?;
        if let Some(failure) = output.failures.first() {
            return Err(CompileFailure::Failed(failure.error.to_string()));
        }
        let Some(asset) = output.assets.into_iter().next() else {
            return Err(CompileFailure::Failed(format!(
                "{} was dropped by the pipeline",
                logical_path
            )));
        };

        let dependency_snapshot = snapshot(self.store.as_ref(), &asset.dependency_paths);
        tracing::info!(
            "Compiled {} from {} ({} dependencies)",
            logical_path,
            root.concrete_path,
            dependency_snapshot.len()
        );
        let last_modified = newest_write(root_last_write, &dependency_snapshot);
        Ok(CacheEntry {
            etag: entity_tag(logical_path, last_modified, &asset.content),
            compiled: Arc::from(asset.content),
            content_type: root.kind.content_type(),
            concrete_path: root.concrete_path.clone(),
            root_last_write,
            last_modified,
            dependency_snapshot,
        })
    }

    fn respond(&self, request: &AssetRequest, entry: &CacheEntry) -> AssetResponse {
        let not_modified = request
            .if_none_match
            .as_deref()
            .is_some_and(|tags| etag_matches(tags, &entry.etag))
            || request
                .if_modified_since
                .as_deref()
                .is_some_and(|since| not_modified_since(since, entry.last_modified));

        let mut response = if not_modified {
            AssetResponse::empty(StatusCode::NOT_MODIFIED)
        } else {
            AssetResponse {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: entry.compiled.to_string(),
            }
        };
        response.set(header::CONTENT_TYPE, entry.content_type);

        if self.mode().is_release() {
            response.set(
                header::CACHE_CONTROL,
                &format!("public, max-age={}", self.max_age_secs),
            );
            response.set(header::ETAG, &entry.etag);
            response.set(
                header::LAST_MODIFIED,
                &format_http_date(entry.last_modified),
            );
        } else {
            response.set(header::CACHE_CONTROL, NO_STORE);
        }
        response
    }

    fn error_response(&self, kind: AssetKind, message: &str) -> AssetResponse {
        let mut response = AssetResponse {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            headers: HeaderMap::new(),
            body: comment_body(message),
        };
        response.set(header::CONTENT_TYPE, kind.content_type());
        response.set(header::CACHE_CONTROL, NO_STORE);
        response
    }
}
