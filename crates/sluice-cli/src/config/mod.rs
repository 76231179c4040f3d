//! Configuration for the sluice CLI, loaded from several sources.
//!
//! Priority: command-line flags > `SLUICE_*` environment variables >
//! `sluice.toml` > defaults.

mod defaults;
mod loading;
mod types;
mod validation;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sluice::DeploymentMode;

pub use defaults::*;
pub use loading::{CONFIG_FILE_NAME, ConfigOverrides};
pub use types::*;

/// Everything `sluice serve` and friends need to build their pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SluiceConfig {
    #[serde(default)]
    pub mode: DeploymentMode,

    /// Directory that holds the assets. Relative paths are taken from the
    /// directory containing the config file.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Virtual directory `~/` references expand to.
    #[serde(default = "default_application_root")]
    pub application_root: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub assets: AssetsConfig,

    #[serde(default = "KindConfig::styles")]
    pub styles: KindConfig,

    #[serde(default = "KindConfig::scripts")]
    pub scripts: KindConfig,
}

impl Default for SluiceConfig {
    fn default() -> Self {
        Self {
            mode: DeploymentMode::Debug,
            root: default_root(),
            application_root: default_application_root(),
            server: ServerConfig::default(),
            assets: AssetsConfig::default(),
            styles: KindConfig::styles(),
            scripts: KindConfig::scripts(),
        }
    }
}

impl SluiceConfig {
    /// Stages configured for `kind`.
    pub fn kind(&self, kind: sluice::AssetKind) -> &KindConfig {
        match kind {
            sluice::AssetKind::Stylesheet => &self.styles,
            sluice::AssetKind::Script => &self.scripts,
        }
    }
}
