use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Toml},
};
use sluice::DeploymentMode;

use crate::config::SluiceConfig;
use crate::error::{ConfigError, Result};

/// Looked up in the working directory when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "sluice.toml";

/// Values from the command line that win over every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub port: Option<u16>,
    pub release: bool,
}

impl SluiceConfig {
    /// Load configuration, starting from `cwd`.
    /// Priority: CLI args > environment variables > config file > defaults
    pub fn load(overrides: &ConfigOverrides, cwd: &Path) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let config_file = match &overrides.config {
            Some(path) => {
                let path = cwd.join(path);
                if !path.is_file() {
                    return Err(ConfigError::NotFound(path).into());
                }
                Some(path)
            }
            None => {
                let default_path = cwd.join(CONFIG_FILE_NAME);
                default_path.is_file().then_some(default_path)
            }
        };

        if let Some(path) = &config_file {
            tracing::debug!("Loading configuration from {}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        // SLUICE_MODE, SLUICE_SERVER__PORT, ...
        figment = figment.merge(Env::prefixed("SLUICE_").split("__"));

        if let Some(port) = overrides.port {
            figment = figment.merge(Serialized::default("server.port", port));
        }
        if overrides.release {
            figment = figment.merge(Serialized::default("mode", DeploymentMode::Release));
        }

        let mut config: SluiceConfig = figment.extract().map_err(ConfigError::from)?;

        let base = config_file
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or(cwd)
            .to_path_buf();
        config.root = match &overrides.root {
            Some(root) => cwd.join(root),
            None => base.join(&config.root),
        };

        config.validate()?;
        Ok(config)
    }
}
