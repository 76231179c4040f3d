use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{EngineSlot, Stage, StageOutput, StageRole};
use crate::asset::{Asset, AssetKind};
use crate::engine::{Engine, EngineInput};
use crate::error::{AssetFailure, PipelineError};
use crate::graph::DependencyGraphBuilder;
use crate::paths::{extension_of, PathResolver};
use crate::vfs::FileStore;

/// Compiles one source dialect (LESS, TypeScript, ...) into CSS or JS.
///
/// Before compiling, the asset's dependency graph is resolved once and the
/// resulting paths are attached to the asset, so callers can tell which
/// files the output was built from.
#[derive(Debug)]
pub struct Translator {
    name: String,
    kind: AssetKind,
    extensions: Vec<String>,
    store: Arc<dyn FileStore>,
    resolver: PathResolver,
    engine: Mutex<EngineSlot>,
}

impl Translator {
    /// `extensions` are the source extensions handled, e.g. `[".less"]`.
    pub fn new<I, S>(
        name: impl Into<String>,
        kind: AssetKind,
        extensions: I,
        engine: impl Engine + 'static,
        store: Arc<dyn FileStore>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| {
                let ext = ext.as_ref().trim().to_ascii_lowercase();
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                }
            })
            .collect();
        Self {
            name: name.into(),
            kind,
            extensions,
            store,
            resolver: PathResolver::new(),
            engine: Mutex::new(EngineSlot::new(Box::new(engine))),
        }
    }

    pub fn with_resolver(mut self, resolver: PathResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Whether this translator compiles files at `path`.
    pub fn handles(&self, path: &str) -> bool {
        extension_of(path).is_some_and(|ext| self.extensions.contains(&ext))
    }

    async fn translate(&self, slot: &mut EngineSlot, mut asset: Asset) -> Result<Asset, AssetFailure> {
        let builder = DependencyGraphBuilder::new(self.store.as_ref(), &self.resolver);
        let dependencies = builder
            .resolve(&asset.concrete_path, &asset.content, self.kind)
            .map_err(|e| AssetFailure::new(&asset.logical_path, &self.name, e))?;

        let physical = self.store.to_absolute_path(&asset.concrete_path);
        let input = EngineInput {
            content: &asset.content,
            asset_path: &asset.concrete_path,
            physical_path: &physical,
        };
        let compiled = slot
            .engine
            .transform(&input)
            .await
            .map_err(|e| AssetFailure::new(&asset.logical_path, &self.name, e))?;

        tracing::info!(
            "[{}] Compiled {} ({} dependencies)",
            self.name,
            asset.concrete_path,
            dependencies.len()
        );
        asset.content = compiled;
        let mut paths = std::mem::take(&mut asset.dependency_paths);
        paths.extend(dependencies.paths());
        asset.set_dependencies(paths);
        Ok(asset)
    }
}

#[async_trait]
impl Stage for Translator {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> StageRole {
        StageRole::Translator
    }

    fn accepts(&self, kind: AssetKind) -> bool {
        kind == self.kind
    }

    async fn transform(&self, assets: Vec<Asset>) -> Result<StageOutput, PipelineError> {
        if !assets.iter().any(|a| self.handles(&a.concrete_path)) {
            return Ok(StageOutput::new(assets));
        }

        let mut slot = self.engine.lock().await;
        slot.ensure_initialized()
            .await
            .map_err(|e| PipelineError::configuration(&self.name, e))?;

        let mut output = StageOutput::default();
        for asset in assets {
            if !self.handles(&asset.concrete_path) {
                output.assets.push(asset);
                continue;
            }
            match self.translate(&mut slot, asset).await {
                Ok(asset) => output.assets.push(asset),
                Err(failure) => output.failures.push(failure),
            }
        }
        Ok(output)
    }
}
