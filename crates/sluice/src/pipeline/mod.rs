//! Transformation pipeline.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s. Each stage receives the
//! slice of the batch it accepts, returns replacement assets plus per-asset
//! failures, and the pipeline splices the result back in place.
//!
//! ```text
//! [a.less, b.js, c.less] --Translator(less)--> [a.css*, c.css*, b.js]
//!                                               ^ inserted where a.less was
//! ```

mod filters;
mod minify;
mod postprocess;
mod translate;

pub use filters::{DeduplicationFilter, UnnecessaryAssetsFilter, VariantFilter};
pub use minify::Minifier;
pub use postprocess::UrlRewritePostProcessor;
pub use translate::Translator;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::asset::{Asset, AssetKind};
use crate::engine::Engine;
use crate::error::{AssetFailure, ConfigurationError, PipelineError};

/// What a stage does. Used to order configuration and to skip minifiers for
/// assets that are already minified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageRole {
    Translator,
    Filter,
    Minifier,
    PostProcessor,
}

/// Result of running one stage over its share of the batch.
#[derive(Debug, Default)]
pub struct StageOutput {
    pub assets: Vec<Asset>,
    pub failures: Vec<AssetFailure>,
}

impl StageOutput {
    pub fn new(assets: Vec<Asset>) -> Self {
        Self {
            assets,
            failures: Vec::new(),
        }
    }

    pub fn with_failures(assets: Vec<Asset>, failures: Vec<AssetFailure>) -> Self {
        Self { assets, failures }
    }
}

/// A step of the pipeline.
///
/// Returning `Err` aborts the whole batch and is reserved for problems that
/// would affect every asset, such as a misconfigured engine. Problems with a
/// single asset belong in [`StageOutput::failures`].
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn role(&self) -> StageRole;

    fn accepts(&self, kind: AssetKind) -> bool;

    async fn transform(&self, assets: Vec<Asset>) -> Result<StageOutput, PipelineError>;
}

/// Final result of [`Pipeline::process`].
#[derive(Debug, Default)]
pub struct ProcessOutput {
    pub assets: Vec<Asset>,
    pub failures: Vec<AssetFailure>,
}

impl ProcessOutput {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Ordered list of stages applied to a batch of assets.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn push(&mut self, stage: Arc<dyn Stage>) {
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[Arc<dyn Stage>] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage over `assets`, in order.
    ///
    /// Assets that fail in a stage are removed from the batch and reported in
    /// [`ProcessOutput::failures`]; later stages never see them.
    pub async fn process(&self, assets: Vec<Asset>) -> Result<ProcessOutput, PipelineError> {
        let mut batch = assets;
        let mut failures = Vec::new();

        for stage in &self.stages {
            let skip_minified = stage.role() == StageRole::Minifier;
            let mut before = Vec::new();
            let mut selected = Vec::new();
            let mut after = Vec::new();
            for asset in batch {
                let wanted = stage.accepts(asset.kind) && !(skip_minified && asset.minified);
                if wanted {
                    selected.push(asset);
                } else if selected.is_empty() {
                    before.push(asset);
                } else {
                    after.push(asset);
                }
            }

            if selected.is_empty() {
                batch = before;
                batch.append(&mut after);
                continue;
            }

            tracing::debug!(
                stage = stage.name(),
                assets = selected.len(),
                "Running pipeline stage"
            );
            let output = stage.transform(selected).await?;
            for failure in &output.failures {
                tracing::warn!("{}", failure);
            }
            failures.extend(output.failures);

            batch = before;
            batch.extend(output.assets);
            batch.append(&mut after);
        }

        Ok(ProcessOutput {
            assets: batch,
            failures,
        })
    }
}

/// An engine plus its one-shot initialization flag.
///
/// Stages keep this behind a `tokio::sync::Mutex`, which serializes calls
/// through one stage instance.
#[derive(Debug)]
pub(crate) struct EngineSlot {
    pub(crate) engine: Box<dyn Engine>,
    initialized: bool,
}

impl EngineSlot {
    pub(crate) fn new(engine: Box<dyn Engine>) -> Self {
        Self {
            engine,
            initialized: false,
        }
    }

    pub(crate) async fn ensure_initialized(&mut self) -> Result<(), ConfigurationError> {
        if !self.initialized {
            tracing::debug!("Initializing engine {}", self.engine.name());
            self.engine.initialize().await?;
            self.initialized = true;
        }
        Ok(())
    }
}
