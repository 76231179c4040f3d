//! Engines that actually rewrite source text.
//!
//! An engine turns one input dialect into one output dialect: LESS into CSS,
//! TypeScript into JavaScript, CSS into minified CSS. Engines are owned by a
//! single pipeline stage and called through `&mut self`, so an engine never
//! has to synchronize with itself.

mod lightning;
mod process;

pub use lightning::LightningCssEngine;
pub use process::{parse_diagnostic, Diagnostic, ProcessEngine, DEFAULT_TIMEOUT_SECS};

use std::fmt::Debug;
use std::path::Path;

use async_trait::async_trait;

use crate::error::{CompilationError, ConfigurationError};

/// Input handed to an engine for one asset.
#[derive(Debug, Clone, Copy)]
pub struct EngineInput<'a> {
    pub content: &'a str,
    /// Virtual path, used in diagnostics.
    pub asset_path: &'a str,
    /// Location on disk, for tools that resolve imports themselves.
    pub physical_path: &'a Path,
}

#[async_trait]
pub trait Engine: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn input_dialect(&self) -> &str;

    fn output_dialect(&self) -> &str;

    /// One-time setup, such as probing that an external tool runs.
    ///
    /// Called at most once per engine, before the first `transform`.
    async fn initialize(&mut self) -> Result<(), ConfigurationError> {
        Ok(())
    }

    async fn transform(&mut self, input: &EngineInput<'_>) -> Result<String, CompilationError>;
}

/// Build a [`CompilationError::Failure`] attributed to `engine`.
pub(crate) fn failure(
    engine: &dyn Engine,
    asset_path: &str,
    message: impl Into<String>,
) -> CompilationError {
    CompilationError::Failure {
        input_dialect: engine.input_dialect().to_string(),
        output_dialect: engine.output_dialect().to_string(),
        asset_path: asset_path.to_string(),
        message: message.into(),
    }
}
