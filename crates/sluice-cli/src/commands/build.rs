use std::path::{Path, PathBuf};
use std::sync::Arc;

use sluice::paths::with_extension;
use sluice::{Asset, FileStore, NativeFileStore, VariantSelector};

use crate::cli::BuildArgs;
use crate::commands::{asset_path, load_config};
use crate::error::{CliError, Result, ResultExt};
use crate::pipelines::PipelineSet;

/// Execute `sluice build`.
pub async fn execute(args: BuildArgs) -> Result<()> {
    let config = load_config(&args.overrides())?;
    let store: Arc<dyn FileStore> = Arc::new(NativeFileStore::new(&config.root));
    let pipelines = PipelineSet::from_config(&config, store.clone())?;
    let out_dir = std::env::current_dir()?.join(&args.out_dir);

    let written = build(store.as_ref(), &pipelines, &args.paths, &out_dir).await?;
    for path in &written {
        println!("{}", path.display());
    }
    Ok(())
}

/// Run `paths` through the batch pipeline and write each output under
/// `out_dir`. Source dialects are written with the output extension
/// (`site.less` becomes `site.css`).
///
/// Every asset that succeeds is written even if others fail; failures are
/// logged and turned into [`CliError::AssetsFailed`] at the end.
pub async fn build(
    store: &dyn FileStore,
    pipelines: &PipelineSet,
    paths: &[String],
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut assets = Vec::with_capacity(paths.len());
    for path in paths {
        let (path, kind) = asset_path(path)?;
        let mut asset = Asset::new(&path, kind);
        // The variant filter loads .css/.js itself.
        if !VariantSelector::handles(&path) {
            asset.content = store.read_text(&path).map_err(sluice::Error::from)?;
        }
        assets.push(asset);
    }

    let output = pipelines.batch().process(assets).await?;
    for failure in &output.failures {
        tracing::error!("{}", failure);
    }

    let mut written = Vec::with_capacity(output.assets.len());
    for asset in &output.assets {
        let target = out_dir.join(output_path(asset).trim_start_matches('/'));
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.with_path(parent)?;
        }
        tokio::fs::write(&target, &asset.content)
            .await
            .with_path(&target)?;
        tracing::debug!("Wrote {} ({} bytes)", target.display(), asset.content.len());
        written.push(target);
    }

    if !output.failures.is_empty() {
        return Err(CliError::AssetsFailed {
            count: output.failures.len(),
        });
    }
    Ok(written)
}

/// Virtual output path: the logical path with the output extension.
fn output_path(asset: &Asset) -> String {
    let base = asset.kind.base_extension();
    if VariantSelector::handles(&asset.logical_path) {
        asset.logical_path.clone()
    } else {
        with_extension(&asset.logical_path, base)
    }
}
