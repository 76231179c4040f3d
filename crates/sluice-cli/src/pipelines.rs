//! Builds the per-kind stage lists once, from configuration.
//!
//! A served request runs only the stages for the requested asset's kind;
//! a batch build additionally runs the filters (dedup, ignore, variant)
//! in front of them.

use std::sync::Arc;

use sluice::{
    AlternateNameRegistry, AssetKind, DeduplicationFilter, DeploymentMode, FileStore, Minifier,
    PathResolver, Pipeline, ProcessEngine, Stage, Translator, UnnecessaryAssetsFilter,
    UrlRewritePostProcessor, VariantFilter, VariantSelector,
};

use crate::config::{KindConfig, MinifierConfig, SluiceConfig, TranslatorConfig};
use crate::error::Result;

/// Stages shared by request handling and batch builds.
#[derive(Debug)]
pub struct PipelineSet {
    mode: DeploymentMode,
    styles: Pipeline,
    scripts: Pipeline,
    batch: Pipeline,
}

impl PipelineSet {
    /// Assemble from prepared stages. `filters` only run in batch builds.
    pub fn new(
        mode: DeploymentMode,
        filters: Vec<Arc<dyn Stage>>,
        styles: Vec<Arc<dyn Stage>>,
        scripts: Vec<Arc<dyn Stage>>,
    ) -> Self {
        let mut batch = Pipeline::new();
        for stage in filters.iter().chain(&styles).chain(&scripts) {
            batch.push(stage.clone());
        }
        Self {
            mode,
            styles: pipeline_of(styles),
            scripts: pipeline_of(scripts),
            batch,
        }
    }

    pub fn from_config(config: &SluiceConfig, store: Arc<dyn FileStore>) -> Result<Self> {
        let resolver = PathResolver::with_application_root(&config.application_root);
        let selector = variant_selector(config, store.clone())?;

        let filters: Vec<Arc<dyn Stage>> = vec![
            Arc::new(DeduplicationFilter::new()),
            Arc::new(UnnecessaryAssetsFilter::new(&config.assets.ignore)?),
            Arc::new(VariantFilter::new(selector, store.clone(), config.mode)),
        ];
        let styles = kind_stages(AssetKind::Stylesheet, config, &resolver, &store);
        let scripts = kind_stages(AssetKind::Script, config, &resolver, &store);

        tracing::debug!(
            "Built pipelines: {} stylesheet stage(s), {} script stage(s) ({:?})",
            styles.len(),
            scripts.len(),
            config.mode
        );
        Ok(Self::new(config.mode, filters, styles, scripts))
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    /// Stages run for a single served asset of `kind`.
    pub fn for_kind(&self, kind: AssetKind) -> &Pipeline {
        match kind {
            AssetKind::Stylesheet => &self.styles,
            AssetKind::Script => &self.scripts,
        }
    }

    /// Filters followed by every kind's stages.
    pub fn batch(&self) -> &Pipeline {
        &self.batch
    }
}

fn pipeline_of(stages: Vec<Arc<dyn Stage>>) -> Pipeline {
    let mut pipeline = Pipeline::new();
    for stage in stages {
        pipeline.push(stage);
    }
    pipeline
}

pub fn variant_selector(config: &SluiceConfig, store: Arc<dyn FileStore>) -> Result<VariantSelector> {
    let alternates = AlternateNameRegistry::with_names(&config.assets.alternate_names)?;
    Ok(VariantSelector::new(store)
        .with_alternates(alternates)
        .with_prefer_minified(config.assets.prefer_minified))
}

fn kind_stages(
    kind: AssetKind,
    config: &SluiceConfig,
    resolver: &PathResolver,
    store: &Arc<dyn FileStore>,
) -> Vec<Arc<dyn Stage>> {
    let section: &KindConfig = config.kind(kind);
    let mut stages: Vec<Arc<dyn Stage>> = Vec::new();

    for translator in &section.translators {
        stages.push(Arc::new(
            Translator::new(
                &translator.name,
                kind,
                &translator.extensions,
                translator_engine(kind, translator),
                store.clone(),
            )
            .with_resolver(resolver.clone()),
        ));
    }

    if config.mode.is_release() {
        match &section.minifier {
            MinifierConfig::Lightningcss => stages.push(Arc::new(Minifier::css())),
            MinifierConfig::Command {
                command,
                args,
                timeout_secs,
            } => {
                let mut engine = ProcessEngine::new(
                    format!("{}-minifier", kind_label(kind)),
                    kind.output_dialect(),
                    format!("minified {}", kind.output_dialect()),
                )
                .with_args(args.iter().cloned())
                .with_timeout(*timeout_secs);
                if let Some(command) = command {
                    engine = engine.with_command(command);
                }
                stages.push(Arc::new(Minifier::external(kind, engine).with_store(store.clone())));
            }
            MinifierConfig::None => {}
        }
    }

    if section.rewrite_urls && kind == AssetKind::Stylesheet {
        stages.push(Arc::new(UrlRewritePostProcessor::with_resolver(
            resolver.clone(),
        )));
    }
    stages
}

fn translator_engine(kind: AssetKind, config: &TranslatorConfig) -> ProcessEngine {
    let mut engine = ProcessEngine::new(&config.name, config.input_dialect(), kind.output_dialect())
        .with_args(config.args.iter().cloned())
        .with_timeout(config.timeout_secs);
    if let Some(command) = &config.command {
        engine = engine.with_command(command);
    }
    if let Some(version_args) = &config.version_args {
        engine = engine.with_version_probe(version_args.iter().cloned());
    }
    engine
}

fn kind_label(kind: AssetKind) -> &'static str {
    match kind {
        AssetKind::Stylesheet => "css",
        AssetKind::Script => "js",
    }
}
