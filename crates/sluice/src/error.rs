//! Error taxonomy for the asset pipeline.
//!
//! Each concern owns a small `thiserror` enum; [`Error`] aggregates them so
//! pipeline stages can report any failure through a single type.

use std::fmt;

use thiserror::Error;

use crate::vfs::FileStoreError;

/// A reference inside a source file that cannot be turned into a canonical path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathResolutionError {
    #[error("Malformed reference '{reference}': {reason}")]
    Malformed { reference: String, reason: String },

    #[error("Reference '{reference}' from '{base}' escapes the application root")]
    EscapesRoot { reference: String, base: String },
}

/// Errors raised while building a dependency graph for one root asset.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Dependency '{reference}' referenced from '{referenced_from}' was not found")]
    DependencyNotFound {
        reference: String,
        referenced_from: String,
    },

    #[error("Maximum import depth exceeded ({depth}) while resolving '{path}'")]
    MaxDepthExceeded { path: String, depth: usize },

    #[error(transparent)]
    FileStore(#[from] FileStoreError),
}

/// No physical variant of a logical asset exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariantError {
    #[error("No variant of '{logical_path}' exists (tried: {})", .tried.join(", "))]
    NotFound {
        logical_path: String,
        tried: Vec<String>,
    },

    #[error("'{logical_path}' is not a stylesheet or script")]
    UnsupportedKind { logical_path: String },
}

/// Invalid pipeline configuration. Raised before any asset is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Ignore pattern '{pattern}' would drop every asset")]
    UnsafeIgnorePattern { pattern: String },

    #[error("Invalid ignore pattern '{pattern}': {message}")]
    InvalidIgnorePattern { pattern: String, message: String },

    #[error("Engine '{engine}' has no external tool path configured")]
    MissingToolPath { engine: String },

    #[error("Engine '{engine}' could not start '{tool}': {message}")]
    ToolUnavailable {
        engine: String,
        tool: String,
        message: String,
    },

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Failure reported by a translation or minification engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompilationError {
    /// The engine reported a structured parse/compile diagnostic.
    #[error(
        "{input_dialect} to {output_dialect} failed in {asset_path}{}: {message}",
        format_position(.line, .column)
    )]
    Syntax {
        input_dialect: String,
        output_dialect: String,
        asset_path: String,
        message: String,
        line: Option<u32>,
        column: Option<u32>,
    },

    /// Any other engine failure (spawn error, crash, unparseable output).
    #[error("{input_dialect} to {output_dialect} failed for {asset_path}: {message}")]
    Failure {
        input_dialect: String,
        output_dialect: String,
        asset_path: String,
        message: String,
    },
}

fn format_position(line: &Option<u32>, column: &Option<u32>) -> String {
    match (*line, *column) {
        (Some(line), Some(column)) => format!(" (line {line}, column {column})"),
        (Some(line), None) => format!(" (line {line})"),
        _ => String::new(),
    }
}

/// Batch-level pipeline failure. Aborts the whole `process` call.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Stage '{stage}' is misconfigured: {source}")]
    Configuration {
        stage: String,
        #[source]
        source: ConfigurationError,
    },

    #[error("Stage '{stage}' failed: {message}")]
    Stage { stage: String, message: String },
}

impl PipelineError {
    pub fn configuration(stage: impl Into<String>, source: ConfigurationError) -> Self {
        Self::Configuration {
            stage: stage.into(),
            source,
        }
    }

    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Top-level error type for sluice operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    FileStore(#[from] FileStoreError),

    #[error(transparent)]
    PathResolution(#[from] PathResolutionError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Variant(#[from] VariantError),

    #[error(transparent)]
    Compilation(#[from] CompilationError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl Error {
    /// Whether the error means "the requested thing does not exist", as
    /// opposed to "it exists but could not be produced".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::FileStore(FileStoreError::FileNotFound { .. })
                | Error::Variant(VariantError::NotFound { .. })
        )
    }
}

/// Result type alias for sluice operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A failure attributed to a single asset of a batch.
///
/// Stages collect these instead of aborting, so the rest of the batch still
/// gets processed.
#[derive(Debug)]
pub struct AssetFailure {
    pub asset_path: String,
    pub stage: String,
    pub error: Error,
}

impl AssetFailure {
    pub fn new(
        asset_path: impl Into<String>,
        stage: impl Into<String>,
        error: impl Into<Error>,
    ) -> Self {
        Self {
            asset_path: asset_path.into(),
            stage: stage.into(),
            error: error.into(),
        }
    }
}

impl fmt::Display for AssetFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.asset_path, self.error)
    }
}

impl std::error::Error for AssetFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_mentions_position_and_dialects() {
        let err = CompilationError::Syntax {
            input_dialect: "LESS".to_string(),
            output_dialect: "CSS".to_string(),
            asset_path: "/styles/site.less".to_string(),
            message: "Unrecognised input".to_string(),
            line: Some(3),
            column: Some(7),
        };
        let msg = err.to_string();
        assert!(msg.contains("LESS to CSS"));
        assert!(msg.contains("/styles/site.less"));
        assert!(msg.contains("line 3, column 7"));
        assert!(msg.contains("Unrecognised input"));
    }

    #[test]
    fn test_dependency_not_found_names_both_files() {
        let err = GraphError::DependencyNotFound {
            reference: "missing.less".to_string(),
            referenced_from: "/styles/site.less".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("missing.less"));
        assert!(msg.contains("/styles/site.less"));
    }

    #[test]
    fn test_is_not_found_classification() {
        let missing: Error = FileStoreError::FileNotFound {
            path: "/a.css".to_string(),
        }
        .into();
        assert!(missing.is_not_found());

        let variant: Error = VariantError::NotFound {
            logical_path: "/a.js".to_string(),
            tried: vec!["/a.js".to_string()],
        }
        .into();
        assert!(variant.is_not_found());

        let config: Error = ConfigurationError::MissingToolPath {
            engine: "less".to_string(),
        }
        .into();
        assert!(!config.is_not_found());
    }

    #[test]
    fn test_asset_failure_display() {
        let failure = AssetFailure::new(
            "/scripts/app.ts",
            "typescript",
            CompilationError::Failure {
                input_dialect: "TypeScript".to_string(),
                output_dialect: "JavaScript".to_string(),
                asset_path: "/scripts/app.ts".to_string(),
                message: "tsc crashed".to_string(),
            },
        );
        let msg = failure.to_string();
        assert!(msg.starts_with("[typescript] /scripts/app.ts"));
        assert!(msg.contains("tsc crashed"));
    }
}
