//! Sluice CLI - serve and build front-end assets through the sluice pipeline.
//!
//! # Architecture
//!
//! - [`config`] - `sluice.toml` loading and validation (figment)
//! - [`pipelines`] - per-kind stage lists built from configuration
//! - [`server`] - the cache-invalidating asset server and its axum front end
//! - [`commands`] - `serve`, `deps` and `build`
//! - [`error`] - CLI error types with actionable messages
//! - [`logger`] - tracing setup
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sluice::{FileStore, NativeFileStore, VariantSelector};
//! use sluice_cli::config::SluiceConfig;
//! use sluice_cli::pipelines::PipelineSet;
//! use sluice_cli::server::{AssetRequest, AssetServer};
//!
//! # #[tokio::main]
//! # async fn main() -> sluice_cli::Result<()> {
//! let config = SluiceConfig::default();
//! let store: Arc<dyn FileStore> = Arc::new(NativeFileStore::new("public"));
//! let pipelines = Arc::new(PipelineSet::from_config(&config, store.clone())?);
//! let server = AssetServer::new(store.clone(), pipelines, VariantSelector::new(store));
//!
//! let response = server.serve(&AssetRequest::new("/styles/site.css")).await;
//! println!("{} {}", response.status, response.body);
//! # Ok(()) }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logger;
pub mod pipelines;
pub mod server;

pub use error::{CliError, ConfigError, Result, ResultExt};
