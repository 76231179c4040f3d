#![cfg_attr(docsrs, feature(doc_cfg))]

//! # sluice
//!
//! Sluice foundation crate - dependency graphs, variant selection and the
//! transformation pipeline for front-end assets.
//!
//! Stylesheets and scripts written in higher-level dialects (LESS,
//! TypeScript, ...) are compiled by external engines, minified, and handed
//! to a server that caches the output until any file it was built from
//! changes. This crate holds everything except the server itself.
//!
//! ## Features
//!
//! - **File Store Abstraction**: every read goes through [`FileStore`], with
//!   native and in-memory implementations
//! - **Dependency Graphs**: `@import`, `data-uri()` and script reference
//!   scanning with stable, de-duplicated ordering
//! - **Variant Selection**: `.css` / `.min.css`, `.js` / `.min.js` and
//!   vendor `.debug.js` naming per deployment mode
//! - **Pipeline**: filters, translators, minifiers and post-processors as
//!   composable [`Stage`]s
//!
//! ## Quick Start
//!
//! ```no_run
//! use sluice::{Asset, AssetKind, Minifier, Pipeline, UrlRewritePostProcessor};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::new()
//!     .with_stage(UrlRewritePostProcessor::new())
//!     .with_stage(Minifier::css());
//!
//! let asset = Asset::new("/styles/site.css", AssetKind::Stylesheet)
//!     .with_content(".logo { background: url(../img/logo.png); }");
//! let output = pipeline.process(vec![asset]).await?;
//! println!("{}", output.assets[0].content);
//! # Ok(()) }
//! ```

pub mod asset;
pub mod engine;
pub mod error;
pub mod graph;
pub mod paths;
pub mod pipeline;
pub mod variant;
pub mod vfs;

// Re-export primary APIs
pub use asset::{Asset, AssetKind, DeploymentMode};
pub use engine::{Engine, EngineInput, LightningCssEngine, ProcessEngine};
pub use error::{
    AssetFailure, CompilationError, ConfigurationError, Error, GraphError, PathResolutionError,
    PipelineError, Result, VariantError,
};
pub use graph::{Dependency, DependencyCollection, DependencyGraphBuilder, ReferenceKind};
pub use paths::{dependency_key, PathResolver};
pub use pipeline::{
    DeduplicationFilter, Minifier, Pipeline, ProcessOutput, Stage, StageOutput, StageRole,
    Translator, UnnecessaryAssetsFilter, UrlRewritePostProcessor, VariantFilter,
};
pub use variant::{AlternateNameRegistry, SelectedVariant, VariantSelector};
pub use vfs::{FileStore, FileStoreError, MemoryFileStore, NativeFileStore};
