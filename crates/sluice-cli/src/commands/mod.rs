//! Command implementations.
//!
//! - [`serve`] - HTTP asset server
//! - [`deps`] - dependency listing
//! - [`build`] - batch pipeline run
//!
//! Each command exposes an `execute` function taking its parsed arguments.

pub mod build;
pub mod deps;
pub mod serve;

pub use build::execute as build_execute;
pub use deps::execute as deps_execute;
pub use serve::execute as serve_execute;

use sluice::AssetKind;

use crate::config::{ConfigOverrides, SluiceConfig};
use crate::error::{CliError, Result};

/// Load configuration relative to the working directory.
pub(crate) fn load_config(overrides: &ConfigOverrides) -> Result<SluiceConfig> {
    let cwd = std::env::current_dir()?;
    SluiceConfig::load(overrides, &cwd)
}

/// Normalize a user-supplied virtual path and work out its kind.
pub(crate) fn asset_path(path: &str) -> Result<(String, AssetKind)> {
    let normalized = format!("/{}", path.trim().replace('\\', "/").trim_start_matches('/'));
    let kind = AssetKind::from_path(&normalized).ok_or_else(|| {
        CliError::InvalidArgument(format!(
            "'{}' is not a stylesheet or script (expected .css, .less, .js, .ts, ...)",
            path
        ))
    })?;
    Ok((normalized, kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_path_normalizes() {
        let (path, kind) = asset_path("styles\\site.less").unwrap();
        assert_eq!(path, "/styles/site.less");
        assert_eq!(kind, AssetKind::Stylesheet);

        let (path, kind) = asset_path("/scripts/app.ts").unwrap();
        assert_eq!(path, "/scripts/app.ts");
        assert_eq!(kind, AssetKind::Script);

        assert!(matches!(
            asset_path("/img/logo.png"),
            Err(CliError::InvalidArgument(_))
        ));
    }
}
