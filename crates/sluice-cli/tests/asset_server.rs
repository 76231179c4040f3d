//! Cache invalidation and HTTP semantics of the asset server.

#![allow(clippy::disallowed_methods)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use axum::http::{StatusCode, header};
use sluice::vfs::FileStoreResult;
use sluice::{
    AssetKind, CompilationError, DeploymentMode, Engine, EngineInput, FileStore, FileStoreError,
    MemoryFileStore, NativeFileStore, Stage, Translator, VariantSelector,
};
use sluice_cli::pipelines::PipelineSet;
use sluice_cli::server::http::format_http_date;
use sluice_cli::server::{AssetRequest, AssetServer};
use tempfile::TempDir;

/// Echoes its input, counting calls. Fails on a `#fail` marker.
#[derive(Debug, Clone)]
struct Echo {
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl Echo {
    fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Engine for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn input_dialect(&self) -> &str {
        "LESS"
    }

    fn output_dialect(&self) -> &str {
        "CSS"
    }

    async fn transform(&mut self, input: &EngineInput<'_>) -> Result<String, CompilationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if input.content.contains("#fail") {
            return Err(CompilationError::Syntax {
                input_dialect: "LESS".to_string(),
                output_dialect: "CSS".to_string(),
                asset_path: input.asset_path.to_string(),
                message: "Unrecognised input */ alert(1)".to_string(),
                line: Some(1),
                column: Some(1),
            });
        }
        Ok(format!("/* compiled */\n{}", input.content))
    }
}

fn site() -> Arc<MemoryFileStore> {
    Arc::new(
        MemoryFileStore::new()
            .with_file("/styles/site.less", "@import \"a\";\n@import \"b\";\n.site {}")
            .with_file("/styles/a.less", "@import \"b\";")
            .with_file("/styles/b.less", "@c: red;")
            .with_file("/styles/unrelated.less", ""),
    )
}

fn server_with(store: Arc<dyn FileStore>, engine: Echo, mode: DeploymentMode) -> AssetServer {
    let less: Arc<dyn Stage> = Arc::new(Translator::new(
        "less",
        AssetKind::Stylesheet,
        [".less"],
        engine,
        store.clone(),
    ));
    let pipelines = Arc::new(PipelineSet::new(mode, vec![], vec![less], vec![]));
    AssetServer::new(store.clone(), pipelines, VariantSelector::new(store)).with_max_age(600)
}

#[tokio::test]
async fn test_end_to_end_cached_output_and_not_modified() {
    let store = site();
    let engine = Echo::new();
    let server = server_with(store.clone(), engine.clone(), DeploymentMode::Release);
    let request = AssetRequest::new("/styles/site.less");

    let first = server.serve(&request).await;
    assert_eq!(first.status, StatusCode::OK);
    assert!(first.body.starts_with("/* compiled */"));
    assert_eq!(first.header(header::CONTENT_TYPE), Some("text/css; charset=utf-8"));
    assert_eq!(first.header(header::CACHE_CONTROL), Some("public, max-age=600"));
    // b.less was written after site.less, so it sets Last-Modified.
    let newest = store.last_write_time("/styles/b.less").unwrap();
    assert!(newest > store.last_write_time("/styles/site.less").unwrap());
    assert_eq!(
        first.header(header::LAST_MODIFIED),
        Some(format_http_date(newest).as_str())
    );

    let entry = server.cache().get("/styles/site.less").await.unwrap();
    let mut snapshot: Vec<_> = entry.dependency_snapshot.keys().cloned().collect();
    snapshot.sort();
    assert_eq!(snapshot, vec!["/styles/a.less", "/styles/b.less"]);

    let second = server.serve(&request).await;
    assert_eq!(second.body, first.body);
    assert_eq!(engine.calls(), 1);

    let etag = first.header(header::ETAG).unwrap().to_string();
    let revalidated = server.serve(&request.clone().if_none_match(etag.clone())).await;
    assert_eq!(revalidated.status, StatusCode::NOT_MODIFIED);
    assert!(revalidated.body.is_empty());

    let since = server
        .serve(&request.clone().if_modified_since(format_http_date(newest)))
        .await;
    assert_eq!(since.status, StatusCode::NOT_MODIFIED);
    assert_eq!(engine.calls(), 1);

    store.insert("/styles/b.less", "@c: blue;");
    let changed = server.serve(&request.clone().if_none_match(etag.clone())).await;
    assert_eq!(changed.status, StatusCode::OK);
    assert_ne!(changed.header(header::ETAG), Some(etag.as_str()));
    assert_eq!(engine.calls(), 2);
}

#[tokio::test]
async fn test_dependency_touch_recompiles_and_unrelated_touch_does_not() {
    let store = site();
    let engine = Echo::new();
    let server = server_with(store.clone(), engine.clone(), DeploymentMode::Debug);
    let request = AssetRequest::new("/styles/site.less");

    server.serve(&request).await;
    assert_eq!(engine.calls(), 1);

    store.touch("/styles/unrelated.less").unwrap();
    server.serve(&request).await;
    assert_eq!(engine.calls(), 1);

    let touched = store.touch("/styles/b.less").unwrap();
    let response = server.serve(&request).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(engine.calls(), 2);
    let entry = server.cache().get("/styles/site.less").await.unwrap();
    assert_eq!(entry.dependency_snapshot["/styles/b.less"], Some(touched));

    store.touch("/styles/site.less").unwrap();
    server.serve(&request).await;
    assert_eq!(engine.calls(), 3);
}

#[tokio::test]
async fn test_debug_mode_headers() {
    let server = server_with(site(), Echo::new(), DeploymentMode::Debug);
    let response = server.serve(&AssetRequest::new("/styles/site.less")).await;
    assert_eq!(response.header(header::CACHE_CONTROL), Some("no-cache, no-store"));
    assert!(response.header(header::ETAG).is_none());
    assert!(response.header(header::LAST_MODIFIED).is_none());
}

#[tokio::test]
async fn test_missing_root_is_404_even_when_cached() {
    let store = site();
    let server = server_with(store.clone(), Echo::new(), DeploymentMode::Debug);
    let request = AssetRequest::new("/styles/site.less");
    assert_eq!(server.serve(&request).await.status, StatusCode::OK);

    store.remove("/styles/site.less");
    let response = server.serve(&request).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body.is_empty());

    let response = server.serve(&AssetRequest::new("/styles/../secret.less")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

/// Still reports a write time for every file, but every read misses, as if
/// the file were deleted right after it was stat-ed.
#[derive(Debug)]
struct VanishingStore(MemoryFileStore);

impl FileStore for VanishingStore {
    fn file_exists(&self, path: &str) -> bool {
        self.0.file_exists(path)
    }

    fn read_text(&self, path: &str) -> FileStoreResult<String> {
        Err(FileStoreError::not_found(path))
    }

    fn read_binary(&self, path: &str) -> FileStoreResult<Vec<u8>> {
        Err(FileStoreError::not_found(path))
    }

    fn last_write_time(&self, path: &str) -> FileStoreResult<SystemTime> {
        self.0.last_write_time(path)
    }

    fn to_absolute_path(&self, path: &str) -> PathBuf {
        self.0.to_absolute_path(path)
    }
}

#[tokio::test]
async fn test_root_deleted_before_read_is_404() {
    let store: Arc<dyn FileStore> = Arc::new(VanishingStore(
        MemoryFileStore::new().with_file("/styles/site.less", ".a {}"),
    ));
    let engine = Echo::new();
    let server = server_with(store, engine.clone(), DeploymentMode::Debug);

    let response = server.serve(&AssetRequest::new("/styles/site.less")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body.is_empty());
    assert_eq!(engine.calls(), 0);
    assert!(server.cache().get("/styles/site.less").await.is_none());
}

#[tokio::test]
async fn test_fragment_dependency_is_served_and_tracked() {
    let store = Arc::new(
        MemoryFileStore::new()
            .with_file(
                "/styles/site.less",
                "@import \"theme.less?v=2\";\n.f { filter: data-uri(\"img/f.svg#blur\"); }",
            )
            .with_file("/styles/theme.less", "@c: red;")
            .with_file("/styles/img/f.svg", "<svg/>"),
    );
    let engine = Echo::new();
    let server = server_with(store.clone(), engine.clone(), DeploymentMode::Debug);
    let request = AssetRequest::new("/styles/site.less");

    assert_eq!(server.serve(&request).await.status, StatusCode::OK);
    let entry = server.cache().get("/styles/site.less").await.unwrap();
    let mut snapshot: Vec<_> = entry.dependency_snapshot.keys().cloned().collect();
    snapshot.sort();
    assert_eq!(snapshot, vec!["/styles/img/f.svg", "/styles/theme.less"]);

    store.touch("/styles/img/f.svg").unwrap();
    assert_eq!(server.serve(&request).await.status, StatusCode::OK);
    assert_eq!(engine.calls(), 2);
}

#[tokio::test]
async fn test_compile_failure_is_500_and_not_cached() {
    let store = site();
    store.insert("/styles/a.less", "#fail");
    let engine = Echo::new();
    let server = server_with(store.clone(), engine.clone(), DeploymentMode::Release);
    let request = AssetRequest::new("/styles/a.less");

    let response = server.serve(&request).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body.starts_with("/* "));
    assert!(response.body.ends_with(" */"));
    assert_eq!(response.body.matches("*/").count(), 1);
    assert!(response.body.contains("Unrecognised input"));
    assert!(response.header(header::ETAG).is_none());
    assert!(server.cache().get("/styles/a.less").await.is_none());

    // Still failing, still compiled again: nothing was cached.
    server.serve(&request).await;
    assert_eq!(engine.calls(), 2);

    store.insert("/styles/a.less", ".fixed {}");
    let response = server.serve(&request).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_dependency_is_500() {
    let store = site();
    store.insert("/styles/site.less", "@import \"nope\";");
    let server = server_with(store, Echo::new(), DeploymentMode::Debug);
    let response = server.serve(&AssetRequest::new("/styles/site.less")).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body.contains("nope"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_compile_once() {
    let engine = Echo::slow(Duration::from_millis(50));
    let server = Arc::new(server_with(site(), engine.clone(), DeploymentMode::Debug));

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let server = server.clone();
        tasks.spawn(async move {
            server
                .serve(&AssetRequest::new("/styles/site.less"))
                .await
                .body
        });
    }
    let mut bodies = Vec::new();
    while let Some(body) = tasks.join_next().await {
        bodies.push(body.unwrap());
    }

    assert_eq!(engine.calls(), 1);
    assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn test_variant_requests_track_the_chosen_file() {
    let store = Arc::new(
        MemoryFileStore::new()
            .with_file("/scripts/app.js", "var app = 1;")
            .with_file("/scripts/app.min.js", "var a=1;"),
    );
    let pipelines = Arc::new(PipelineSet::new(
        DeploymentMode::Release,
        vec![],
        vec![],
        vec![],
    ));
    let dyn_store: Arc<dyn FileStore> = store.clone();
    let server = AssetServer::new(
        dyn_store.clone(),
        pipelines,
        VariantSelector::new(dyn_store),
    );
    let request = AssetRequest::new("/scripts/app.js");

    let response = server.serve(&request).await;
    assert_eq!(response.body, "var a=1;");
    assert_eq!(
        response.header(header::CONTENT_TYPE),
        Some("text/javascript; charset=utf-8")
    );

    store.remove("/scripts/app.min.js");
    let response = server.serve(&request).await;
    assert_eq!(response.body, "var app = 1;");

    store.remove("/scripts/app.js");
    assert_eq!(server.serve(&request).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_on_disk_modification_times() {
    let dir = TempDir::new().unwrap();
    let styles = dir.path().join("styles");
    std::fs::create_dir_all(&styles).unwrap();
    std::fs::write(styles.join("site.less"), "@import \"theme\";").unwrap();
    std::fs::write(styles.join("theme.less"), "@c: red;").unwrap();
    let past = filetime::FileTime::from_system_time(SystemTime::now() - Duration::from_secs(60));
    filetime::set_file_mtime(styles.join("site.less"), past).unwrap();
    filetime::set_file_mtime(styles.join("theme.less"), past).unwrap();

    let store: Arc<dyn FileStore> = Arc::new(NativeFileStore::new(dir.path()));
    let engine = Echo::new();
    let server = server_with(store, engine.clone(), DeploymentMode::Debug);
    let request = AssetRequest::new("/styles/site.less");

    server.serve(&request).await;
    server.serve(&request).await;
    assert_eq!(engine.calls(), 1);

    filetime::set_file_mtime(styles.join("theme.less"), filetime::FileTime::now()).unwrap();
    server.serve(&request).await;
    assert_eq!(engine.calls(), 2);
}
