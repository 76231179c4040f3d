use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::defaults::*;

/// HTTP listener and response caching settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// `max-age` sent in release mode.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_age_secs: default_max_age_secs(),
        }
    }
}

/// Settings shared by every asset kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetsConfig {
    /// Globs for assets that are never served or built.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    /// Pick `.min.*` files in release mode when both variants exist.
    #[serde(default = "default_true")]
    pub prefer_minified: bool,

    /// Extra script names using the `.debug.js` / `.js` convention.
    #[serde(default)]
    pub alternate_names: Vec<String>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            ignore: default_ignore(),
            prefer_minified: true,
            alternate_names: Vec::new(),
        }
    }
}

/// An external compiler for one source dialect.
///
/// ```toml
/// [[styles.translators]]
/// name = "less"
/// extensions = [".less"]
/// command = "lessc"
/// args = ["-"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TranslatorConfig {
    pub name: String,

    pub extensions: Vec<String>,

    /// Dialect name used in error messages; defaults to the translator name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_dialect: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<PathBuf>,

    #[serde(default)]
    pub args: Vec<String>,

    /// Probe run once before the first compile, e.g. `["--version"]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_args: Option<Vec<String>>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl TranslatorConfig {
    pub fn input_dialect(&self) -> &str {
        self.input_dialect.as_deref().unwrap_or(&self.name)
    }
}

/// Which minifier runs in release mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "engine", rename_all = "lowercase")]
pub enum MinifierConfig {
    /// In-process stylesheet minification.
    Lightningcss,

    /// Pipe through an external tool such as `esbuild --minify`.
    Command {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        command: Option<PathBuf>,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },

    None,
}

/// Stages for one asset kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindConfig {
    /// Run in order; the first whose extensions match compiles the asset.
    #[serde(default)]
    pub translators: Vec<TranslatorConfig>,

    pub minifier: MinifierConfig,

    /// Rewrite relative `url(...)` references (stylesheets only).
    #[serde(default)]
    pub rewrite_urls: bool,
}

impl KindConfig {
    pub fn styles() -> Self {
        Self {
            translators: Vec::new(),
            minifier: MinifierConfig::Lightningcss,
            rewrite_urls: true,
        }
    }

    pub fn scripts() -> Self {
        Self {
            translators: Vec::new(),
            minifier: MinifierConfig::None,
            rewrite_urls: false,
        }
    }
}
