use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use super::{Stage, StageOutput, StageRole};
use crate::asset::{Asset, AssetKind, DeploymentMode};
use crate::error::{AssetFailure, ConfigurationError, PipelineError};
use crate::paths::file_name_of;
use crate::variant::VariantSelector;
use crate::vfs::FileStore;

/// Keeps the first occurrence of every logical asset.
#[derive(Debug, Default)]
pub struct DeduplicationFilter;

impl DeduplicationFilter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Stage for DeduplicationFilter {
    fn name(&self) -> &str {
        "deduplicate"
    }

    fn role(&self) -> StageRole {
        StageRole::Filter
    }

    fn accepts(&self, _kind: AssetKind) -> bool {
        true
    }

    async fn transform(&self, assets: Vec<Asset>) -> Result<StageOutput, PipelineError> {
        let mut seen = HashSet::new();
        let kept = assets
            .into_iter()
            .filter(|asset| seen.insert(asset.key()))
            .collect();
        Ok(StageOutput::new(kept))
    }
}

/// Drops assets matching configured ignore globs, e.g. `*.intellisense.js`.
///
/// Globs are case-insensitive and tested against the full virtual path as
/// well as the bare file name.
#[derive(Debug)]
pub struct UnnecessaryAssetsFilter {
    patterns: Vec<String>,
    globs: GlobSet,
}

impl UnnecessaryAssetsFilter {
    pub fn new<I, S>(patterns: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern == "*" || pattern == "*.*" {
                return Err(ConfigurationError::UnsafeIgnorePattern {
                    pattern: pattern.to_string(),
                });
            }
            let glob = GlobBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|err| ConfigurationError::InvalidIgnorePattern {
                    pattern: pattern.to_string(),
                    message: err.to_string(),
                })?;
            builder.add(glob);
            kept.push(pattern.to_string());
        }
        let globs = builder
            .build()
            .map_err(|err| ConfigurationError::InvalidIgnorePattern {
                pattern: kept.join(", "),
                message: err.to_string(),
            })?;
        Ok(Self {
            patterns: kept,
            globs,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.globs.is_match(path)
            || self.globs.is_match(path.trim_start_matches('/'))
            || self.globs.is_match(file_name_of(path))
    }
}

#[async_trait]
impl Stage for UnnecessaryAssetsFilter {
    fn name(&self) -> &str {
        "ignore"
    }

    fn role(&self) -> StageRole {
        StageRole::Filter
    }

    fn accepts(&self, _kind: AssetKind) -> bool {
        true
    }

    async fn transform(&self, assets: Vec<Asset>) -> Result<StageOutput, PipelineError> {
        let kept = assets
            .into_iter()
            .filter(|asset| {
                let ignored = self.is_ignored(&asset.logical_path);
                if ignored {
                    tracing::debug!("Ignoring {}", asset.logical_path);
                }
                !ignored
            })
            .collect();
        Ok(StageOutput::new(kept))
    }
}

/// Swaps each `.css`/`.js` asset for the physical variant suited to the mode.
#[derive(Debug)]
pub struct VariantFilter {
    selector: VariantSelector,
    store: Arc<dyn FileStore>,
    mode: DeploymentMode,
}

impl VariantFilter {
    pub fn new(selector: VariantSelector, store: Arc<dyn FileStore>, mode: DeploymentMode) -> Self {
        Self {
            selector,
            store,
            mode,
        }
    }

    fn apply(&self, mut asset: Asset) -> Result<Asset, AssetFailure> {
        let selected = self
            .selector
            .select(&asset.logical_path, self.mode)
            .map_err(|e| AssetFailure::new(&asset.logical_path, self.name(), e))?;

        if selected.concrete_path != asset.concrete_path || asset.content.is_empty() {
            asset.content = self
                .store
                .read_text(&selected.concrete_path)
                .map_err(|e| AssetFailure::new(&asset.logical_path, self.name(), e))?;
        }
        asset.concrete_path = selected.concrete_path;
        asset.minified = selected.is_minified;
        Ok(asset)
    }
}

#[async_trait]
impl Stage for VariantFilter {
    fn name(&self) -> &str {
        "variant"
    }

    fn role(&self) -> StageRole {
        StageRole::Filter
    }

    fn accepts(&self, _kind: AssetKind) -> bool {
        true
    }

    async fn transform(&self, assets: Vec<Asset>) -> Result<StageOutput, PipelineError> {
        let mut output = StageOutput::default();
        for asset in assets {
            if asset.minified || !VariantSelector::handles(&asset.logical_path) {
                output.assets.push(asset);
                continue;
            }
            match self.apply(asset) {
                Ok(asset) => output.assets.push(asset),
                Err(failure) => output.failures.push(failure),
            }
        }
        Ok(output)
    }
}
