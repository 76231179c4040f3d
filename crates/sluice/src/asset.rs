use serde::{Deserialize, Serialize};

use crate::paths::{dependency_key, extension_of};

/// Broad category of a front-end asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Stylesheet,
    Script,
}

impl AssetKind {
    /// Derive the kind from a file extension (with or without the leading dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "css" | "less" | "scss" | "sass" | "styl" => Some(Self::Stylesheet),
            "js" | "mjs" | "ts" | "tsx" | "jsx" | "coffee" => Some(Self::Script),
            _ => None,
        }
    }

    /// Attempt to infer the kind from a virtual path.
    pub fn from_path(path: &str) -> Option<Self> {
        extension_of(path).and_then(|ext| Self::from_extension(&ext))
    }

    /// Extension of the browser-consumable output dialect.
    pub fn base_extension(&self) -> &'static str {
        match self {
            Self::Stylesheet => ".css",
            Self::Script => ".js",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Stylesheet => "text/css; charset=utf-8",
            Self::Script => "text/javascript; charset=utf-8",
        }
    }

    /// Human-readable name of the output dialect, used in diagnostics.
    pub fn output_dialect(&self) -> &'static str {
        match self {
            Self::Stylesheet => "CSS",
            Self::Script => "JavaScript",
        }
    }
}

/// Which physical variants to prefer and whether output should be minified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    #[default]
    Debug,
    Release,
}

impl DeploymentMode {
    pub fn is_release(&self) -> bool {
        matches!(self, Self::Release)
    }
}

/// A stylesheet or script flowing through the pipeline.
///
/// `logical_path` is what the page asks for; `concrete_path` is the file the
/// content actually came from (`/scripts/app.min.js` for `/scripts/app.js`
/// in release mode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub logical_path: String,
    pub concrete_path: String,
    pub content: String,
    pub kind: AssetKind,
    pub minified: bool,
    /// Canonical paths of every file this asset was built from, excluding
    /// the asset itself. Ordered and free of duplicates.
    pub dependency_paths: Vec<String>,
}

impl Asset {
    pub fn new(logical_path: impl Into<String>, kind: AssetKind) -> Self {
        let logical_path = logical_path.into();
        Self {
            concrete_path: logical_path.clone(),
            logical_path,
            content: String::new(),
            kind,
            minified: false,
            dependency_paths: Vec::new(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_concrete_path(mut self, concrete_path: impl Into<String>) -> Self {
        self.concrete_path = concrete_path.into();
        self
    }

    /// Identity used for de-duplication.
    pub fn key(&self) -> String {
        dependency_key(&self.logical_path)
    }

    /// Extension of the file the content was read from.
    pub fn source_extension(&self) -> Option<String> {
        extension_of(&self.concrete_path)
    }

    /// Replace the dependency list, dropping duplicates and the asset itself.
    pub fn set_dependencies<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let own_key = dependency_key(&self.concrete_path);
        let mut seen = std::collections::HashSet::new();
        self.dependency_paths = paths
            .into_iter()
            .map(Into::into)
            .filter(|path| {
                let key = dependency_key(path);
                key != own_key && seen.insert(key)
            })
            .collect();
    }
}
