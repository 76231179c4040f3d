//! Error handling for the sluice CLI.
//!
//! [`CliError`] is what every command returns. Configuration problems get
//! their own [`ConfigError`] with a hint attached to the message, and
//! pipeline errors from the core crate convert automatically.
//!
//! ```rust,no_run
//! use sluice_cli::error::{Result, ResultExt};
//!
//! fn bind(port: u16) -> Result<std::net::TcpListener> {
//!     std::net::TcpListener::bind(("127.0.0.1", port)).context("Failed to bind")
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file or value problems.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Failures starting or running the HTTP server.
    #[error("Server error: {0}")]
    Server(String),

    /// Invalid command-line arguments.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors from the asset pipeline.
    #[error(transparent)]
    Core(#[from] sluice::Error),

    /// One or more assets failed during a batch build.
    #[error("{count} asset(s) failed to build")]
    AssetsFailed { count: usize },

    #[error("{0}")]
    Custom(String),
}

/// Errors found while loading or validating `sluice.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}\n\nHint: Create a sluice.toml or pass --config <path>", .0.display())]
    NotFound(PathBuf),

    /// figment could not merge or deserialize the sources.
    #[error("Failed to load configuration: {0}\n\nHint: Check sluice.toml syntax and field types")]
    Load(String),

    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        field: String,
        value: String,
        hint: String,
    },

    #[error("Missing required field: {field}\n\nHint: {hint}")]
    MissingField { field: String, hint: String },

    #[error(transparent)]
    Pipeline(#[from] sluice::ConfigurationError),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(err.to_string())
    }
}

impl From<sluice::ConfigurationError> for CliError {
    fn from(err: sluice::ConfigurationError) -> Self {
        CliError::Config(err.into())
    }
}

impl From<sluice::PipelineError> for CliError {
    fn from(err: sluice::PipelineError) -> Self {
        CliError::Core(err.into())
    }
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Adds context to fallible results on their way to a [`CliError`].
pub trait ResultExt<T> {
    /// Turn a missing-file I/O error into [`CliError::FileNotFound`] for `path`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    /// Append a hint line to the error message.
    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T>;

    /// Prefix the error message.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| match e.into() {
            CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                CliError::FileNotFound(path.as_ref().to_path_buf())
            }
            other => other,
        })
    }

    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}\n\nHint: {}", err, hint))
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}: {}", msg, err))
        })
    }
}

/// Convert a [`CliError`] into a miette report for the terminal.
pub fn cli_error_to_miette(err: CliError) -> miette::Report {
    match err {
        CliError::Core(sluice::Error::Graph(sluice::GraphError::DependencyNotFound {
            reference,
            referenced_from,
        })) => miette::miette!(
            help = "Check the path, or mark the import optional with @import (optional)",
            "Dependency '{}' referenced from {} was not found",
            reference,
            referenced_from
        ),
        CliError::Core(sluice::Error::Compilation(e)) => {
            miette::miette!(help = "Fix the source and request the asset again", "{}", e)
        }
        other => miette::miette!("{}", other),
    }
}
