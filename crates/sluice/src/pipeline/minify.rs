use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{EngineSlot, Stage, StageOutput, StageRole};
use crate::asset::{Asset, AssetKind};
use crate::engine::{Engine, EngineInput, LightningCssEngine, ProcessEngine};
use crate::error::{AssetFailure, PipelineError};
use crate::vfs::FileStore;

/// Minifies assets of one kind and flags them as minified.
///
/// The pipeline never hands a minifier an asset that is already minified.
#[derive(Debug)]
pub struct Minifier {
    name: String,
    kind: AssetKind,
    engine: Mutex<EngineSlot>,
    store: Option<Arc<dyn FileStore>>,
}

impl Minifier {
    pub fn new(name: impl Into<String>, kind: AssetKind, engine: impl Engine + 'static) -> Self {
        Self {
            name: name.into(),
            kind,
            engine: Mutex::new(EngineSlot::new(Box::new(engine))),
            store: None,
        }
    }

    /// Give the engine physical paths (`{file}`, `{dir}`) from `store`.
    pub fn with_store(mut self, store: Arc<dyn FileStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn physical_path(&self, asset: &Asset) -> PathBuf {
        match &self.store {
            Some(store) => store.to_absolute_path(&asset.concrete_path),
            None => PathBuf::from(&asset.concrete_path),
        }
    }

    /// In-process stylesheet minifier.
    pub fn css() -> Self {
        Self::new("lightningcss", AssetKind::Stylesheet, LightningCssEngine::new())
    }

    /// Minifier that pipes assets through an external tool.
    pub fn external(kind: AssetKind, engine: ProcessEngine) -> Self {
        let name = engine.name().to_string();
        Self::new(name, kind, engine)
    }
}

#[async_trait]
impl Stage for Minifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> StageRole {
        StageRole::Minifier
    }

    fn accepts(&self, kind: AssetKind) -> bool {
        kind == self.kind
    }

    async fn transform(&self, assets: Vec<Asset>) -> Result<StageOutput, PipelineError> {
        let mut slot = self.engine.lock().await;
        slot.ensure_initialized()
            .await
            .map_err(|e| PipelineError::configuration(&self.name, e))?;

        let mut output = StageOutput::default();
        for mut asset in assets {
            let physical = self.physical_path(&asset);
            let input = EngineInput {
                content: &asset.content,
                asset_path: &asset.concrete_path,
                physical_path: &physical,
            };
            match slot.engine.transform(&input).await {
                Ok(minified) => {
                    tracing::debug!(
                        "[{}] Minified {} ({} -> {} bytes)",
                        self.name,
                        asset.logical_path,
                        asset.content.len(),
                        minified.len()
                    );
                    asset.content = minified;
                    asset.minified = true;
                    output.assets.push(asset);
                }
                Err(e) => output
                    .failures
                    .push(AssetFailure::new(&asset.logical_path, &self.name, e)),
            }
        }
        Ok(output)
    }
}
