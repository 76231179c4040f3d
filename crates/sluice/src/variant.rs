//! Physical variant selection.
//!
//! A logical asset such as `/scripts/app.js` may exist on disk as
//! `app.js`, `app.min.js`, or both. Debug mode prefers the readable file,
//! release mode the minified one; whichever is missing is skipped.
//!
//! Some vendor libraries ship the other way around: `MicrosoftAjax.debug.js`
//! is the readable build and `MicrosoftAjax.js` the minified one. Those are
//! listed in an [`AlternateNameRegistry`].

use std::sync::Arc;

use regex::Regex;

use crate::asset::{AssetKind, DeploymentMode};
use crate::error::{ConfigurationError, VariantError};
use crate::paths::{extension_of, file_name_of, strip_extension_and_marker};
use crate::vfs::FileStore;

/// Names that use the `.debug.js` / `.js` convention out of the box.
pub const DEFAULT_ALTERNATE_NAMES: &[&str] = &[
    "MicrosoftAjax",
    "MicrosoftMvcAjax",
    "MicrosoftMvcValidation",
    "knockout-{version}",
];

const VERSION_PLACEHOLDER: &str = "{version}";

/// The pair of extensions tried for one logical asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateExtensions {
    pub plain: &'static str,
    pub minified: &'static str,
}

impl CandidateExtensions {
    pub const STYLESHEET: Self = Self {
        plain: ".css",
        minified: ".min.css",
    };
    pub const SCRIPT: Self = Self {
        plain: ".js",
        minified: ".min.js",
    };
    pub const ALTERNATE_SCRIPT: Self = Self {
        plain: ".debug.js",
        minified: ".js",
    };

    pub fn for_kind(kind: AssetKind) -> Self {
        match kind {
            AssetKind::Stylesheet => Self::STYLESHEET,
            AssetKind::Script => Self::SCRIPT,
        }
    }

    /// Candidates in try order, each tagged with whether it is the minified one.
    pub fn ordered(&self, minified_first: bool) -> [(&'static str, bool); 2] {
        if minified_first {
            [(self.minified, true), (self.plain, false)]
        } else {
            [(self.plain, false), (self.minified, true)]
        }
    }
}

/// File names whose readable build carries a `.debug` marker.
#[derive(Debug, Clone)]
pub struct AlternateNameRegistry {
    patterns: Vec<Regex>,
}

impl Default for AlternateNameRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for name in DEFAULT_ALTERNATE_NAMES {
            if let Ok(pattern) = Self::compile(name) {
                registry.patterns.push(pattern);
            }
        }
        registry
    }
}

impl AlternateNameRegistry {
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Default names plus `extra`.
    pub fn with_names<I, S>(extra: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::default();
        for name in extra {
            registry.add(name.as_ref())?;
        }
        Ok(registry)
    }

    /// Register a file name. `{version}` stands for a dotted numeric version.
    pub fn add(&mut self, name: &str) -> Result<(), ConfigurationError> {
        let pattern = Self::compile(name)?;
        self.patterns.push(pattern);
        Ok(())
    }

    /// Whether `file_stem` (no extension, no marker) uses the alternate scheme.
    pub fn matches(&self, file_stem: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(file_stem))
    }

    fn compile(name: &str) -> Result<Regex, ConfigurationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigurationError::InvalidValue {
                field: "assets.alternate_names".to_string(),
                message: "empty name".to_string(),
            });
        }
        let body = name
            .split(VERSION_PLACEHOLDER)
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(r"\d+(?:\.\d+)*");
        Regex::new(&format!("(?i)^{body}$")).map_err(|e| ConfigurationError::InvalidValue {
            field: "assets.alternate_names".to_string(),
            message: e.to_string(),
        })
    }
}

/// Result of a variant lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedVariant {
    pub concrete_path: String,
    pub is_minified: bool,
}

/// Picks the physical file behind a logical stylesheet or script path.
#[derive(Debug, Clone)]
pub struct VariantSelector {
    store: Arc<dyn FileStore>,
    alternates: AlternateNameRegistry,
    prefer_minified: bool,
}

impl VariantSelector {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self {
            store,
            alternates: AlternateNameRegistry::default(),
            prefer_minified: true,
        }
    }

    pub fn with_alternates(mut self, alternates: AlternateNameRegistry) -> Self {
        self.alternates = alternates;
        self
    }

    /// When false, the readable file is tried first even in release mode.
    pub fn with_prefer_minified(mut self, prefer_minified: bool) -> Self {
        self.prefer_minified = prefer_minified;
        self
    }

    /// Whether `path` names a browser-ready `.css` or `.js` file this
    /// selector can pick variants for.
    pub fn handles(path: &str) -> bool {
        matches!(extension_of(path).as_deref(), Some(".css") | Some(".js"))
    }

    /// Select the variant of `logical_path` for `mode`.
    pub fn select(
        &self,
        logical_path: &str,
        mode: DeploymentMode,
    ) -> Result<SelectedVariant, VariantError> {
        let kind = match extension_of(logical_path).as_deref() {
            Some(".css") => AssetKind::Stylesheet,
            Some(".js") => AssetKind::Script,
            _ => {
                return Err(VariantError::UnsupportedKind {
                    logical_path: logical_path.to_string(),
                });
            }
        };

        let base = strip_extension_and_marker(logical_path);
        let extensions = if kind == AssetKind::Script && self.alternates.matches(file_name_of(base))
        {
            CandidateExtensions::ALTERNATE_SCRIPT
        } else {
            CandidateExtensions::for_kind(kind)
        };

        let minified_first = self.prefer_minified && mode.is_release();
        let mut tried = Vec::with_capacity(2);
        for (extension, is_minified) in extensions.ordered(minified_first) {
            let candidate = format!("{base}{extension}");
            if self.store.file_exists(&candidate) {
                tracing::debug!("Selected {} for {} ({:?})", candidate, logical_path, mode);
                return Ok(SelectedVariant {
                    concrete_path: candidate,
                    is_minified,
                });
            }
            tried.push(candidate);
        }

        Err(VariantError::NotFound {
            logical_path: logical_path.to_string(),
            tried,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryFileStore;

    fn selector(files: &[&str]) -> VariantSelector {
        let mut store = MemoryFileStore::new();
        for file in files {
            store = store.with_file(file, "");
        }
        VariantSelector::new(Arc::new(store))
    }

    #[test]
    fn test_debug_prefers_plain_release_prefers_minified() {
        let selector = selector(&["/scripts/app.js", "/scripts/app.min.js"]);

        let debug = selector.select("/scripts/app.js", DeploymentMode::Debug).unwrap();
        assert_eq!(debug.concrete_path, "/scripts/app.js");
        assert!(!debug.is_minified);

        let release = selector
            .select("/scripts/app.js", DeploymentMode::Release)
            .unwrap();
        assert_eq!(release.concrete_path, "/scripts/app.min.js");
        assert!(release.is_minified);
    }

    #[test]
    fn test_falls_back_to_existing_variant() {
        let selector = selector(&["/styles/site.min.css"]);
        let debug = selector.select("/styles/site.css", DeploymentMode::Debug).unwrap();
        assert_eq!(debug.concrete_path, "/styles/site.min.css");
        assert!(debug.is_minified);
    }

    #[test]
    fn test_minified_logical_path_maps_to_same_asset() {
        let selector = selector(&["/styles/site.css"]);
        let selected = selector
            .select("/styles/site.min.css", DeploymentMode::Release)
            .unwrap();
        assert_eq!(selected.concrete_path, "/styles/site.css");
    }

    #[test]
    fn test_alternate_names_use_debug_marker() {
        let selector = selector(&[
            "/scripts/MicrosoftAjax.debug.js",
            "/scripts/MicrosoftAjax.js",
            "/scripts/knockout-3.5.1.debug.js",
            "/scripts/knockout-3.5.1.js",
        ]);

        let debug = selector
            .select("/scripts/MicrosoftAjax.js", DeploymentMode::Debug)
            .unwrap();
        assert_eq!(debug.concrete_path, "/scripts/MicrosoftAjax.debug.js");
        assert!(!debug.is_minified);

        let release = selector
            .select("/scripts/knockout-3.5.1.js", DeploymentMode::Release)
            .unwrap();
        assert_eq!(release.concrete_path, "/scripts/knockout-3.5.1.js");
        assert!(release.is_minified);
    }

    #[test]
    fn test_registry_matching() {
        let registry = AlternateNameRegistry::with_names(["vendor-{version}-bundle"]).unwrap();
        assert!(registry.matches("microsoftajax"));
        assert!(registry.matches("knockout-2.0"));
        assert!(!registry.matches("knockout-latest"));
        assert!(registry.matches("vendor-1.2.3-bundle"));
        assert!(!registry.matches("app"));
        assert!(AlternateNameRegistry::with_names([" "]).is_err());
    }

    #[test]
    fn test_prefer_minified_disabled() {
        let selector = selector(&["/scripts/app.js", "/scripts/app.min.js"])
            .with_prefer_minified(false);
        let release = selector
            .select("/scripts/app.js", DeploymentMode::Release)
            .unwrap();
        assert_eq!(release.concrete_path, "/scripts/app.js");
    }

    #[test]
    fn test_not_found_lists_candidates() {
        let selector = selector(&[]);
        let err = selector
            .select("/scripts/app.js", DeploymentMode::Release)
            .unwrap_err();
        assert_eq!(
            err,
            VariantError::NotFound {
                logical_path: "/scripts/app.js".to_string(),
                tried: vec![
                    "/scripts/app.min.js".to_string(),
                    "/scripts/app.js".to_string()
                ],
            }
        );
    }

    #[test]
    fn test_unsupported_kind() {
        let selector = selector(&["/styles/site.less"]);
        assert!(matches!(
            selector.select("/styles/site.less", DeploymentMode::Debug),
            Err(VariantError::UnsupportedKind { .. })
        ));
    }
}
