use sluice::{AlternateNameRegistry, AssetKind, ConfigurationError, UnnecessaryAssetsFilter};

use crate::config::{KindConfig, MinifierConfig, SluiceConfig, TranslatorConfig};
use crate::error::{ConfigError, Result};

impl SluiceConfig {
    /// Validate configuration for logical consistency.
    ///
    /// Everything that would otherwise fail on the first request (unsafe
    /// ignore globs, translators without a tool) is rejected up front.
    pub fn validate(&self) -> Result<()> {
        if !self.application_root.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "application_root".to_string(),
                value: self.application_root.clone(),
                hint: "Use a root-relative virtual path such as \"/\" or \"/app/\"".to_string(),
            }
            .into());
        }

        UnnecessaryAssetsFilter::new(&self.assets.ignore)?;
        AlternateNameRegistry::with_names(&self.assets.alternate_names)?;

        validate_kind(AssetKind::Stylesheet, &self.styles)?;
        validate_kind(AssetKind::Script, &self.scripts)?;
        Ok(())
    }
}

fn validate_kind(kind: AssetKind, config: &KindConfig) -> Result<()> {
    let section = section_name(kind);

    for translator in &config.translators {
        validate_translator(kind, translator)?;
    }

    match &config.minifier {
        MinifierConfig::Lightningcss if kind == AssetKind::Script => {
            return Err(ConfigError::InvalidValue {
                field: format!("{section}.minifier"),
                value: "lightningcss".to_string(),
                hint: "lightningcss only minifies stylesheets; use engine = \"command\" for scripts"
                    .to_string(),
            }
            .into());
        }
        MinifierConfig::Command { command: None, .. } => {
            return Err(ConfigurationError::MissingToolPath {
                engine: format!("{section}.minifier"),
            }
            .into());
        }
        _ => {}
    }

    if config.rewrite_urls && kind == AssetKind::Script {
        return Err(ConfigError::InvalidValue {
            field: format!("{section}.rewrite_urls"),
            value: "true".to_string(),
            hint: "url() rewriting applies to stylesheets only".to_string(),
        }
        .into());
    }
    Ok(())
}

fn validate_translator(kind: AssetKind, translator: &TranslatorConfig) -> Result<()> {
    let section = section_name(kind);

    if translator.name.trim().is_empty() {
        return Err(ConfigError::MissingField {
            field: format!("{section}.translators.name"),
            hint: "Give every translator a name, e.g. \"less\"".to_string(),
        }
        .into());
    }
    if translator.extensions.is_empty() {
        return Err(ConfigError::MissingField {
            field: format!("{section}.translators.extensions"),
            hint: format!("List the source extensions '{}' compiles", translator.name),
        }
        .into());
    }
    for extension in &translator.extensions {
        let normalized = extension.trim().trim_start_matches('.').to_ascii_lowercase();
        if normalized.is_empty() || format!(".{normalized}") == kind.base_extension() {
            return Err(ConfigError::InvalidValue {
                field: format!("{section}.translators.extensions"),
                value: extension.clone(),
                hint: format!(
                    "'{}' files are served as-is; translators handle source dialects only",
                    kind.base_extension()
                ),
            }
            .into());
        }
    }
    if translator.command.is_none() {
        return Err(ConfigurationError::MissingToolPath {
            engine: translator.name.clone(),
        }
        .into());
    }
    Ok(())
}

fn section_name(kind: AssetKind) -> &'static str {
    match kind {
        AssetKind::Stylesheet => "styles",
        AssetKind::Script => "scripts",
    }
}
