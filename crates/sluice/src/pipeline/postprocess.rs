use std::borrow::Cow;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{Stage, StageOutput, StageRole};
use crate::asset::{Asset, AssetKind};
use crate::error::PipelineError;
use crate::paths::{is_data_uri, is_remote, PathResolver};

static CSS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\burl\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]*))\s*\)"#)
        .expect("valid url() regex")
});

/// Rewrites relative `url(...)` references in stylesheets to root-relative
/// paths, based on where the stylesheet lives. `~/` references are expanded
/// against the application root.
///
/// Compiled output is served from a different URL than the source, so
/// `url(../img/a.png)` in `/styles/site.less` becomes `url(/img/a.png)`.
#[derive(Debug, Default)]
pub struct UrlRewritePostProcessor {
    resolver: PathResolver,
}

impl UrlRewritePostProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// Rewrite all relative references in `css` located at `base`.
    pub fn rewrite<'a>(&self, base: &str, css: &'a str) -> Cow<'a, str> {
        CSS_URL.replace_all(css, |caps: &Captures<'_>| {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let (reference, quote) = match (caps.get(1), caps.get(2), caps.get(3)) {
                (Some(m), _, _) => (m.as_str(), "\""),
                (_, Some(m), _) => (m.as_str(), "'"),
                (_, _, Some(m)) => (m.as_str(), ""),
                _ => return whole.to_string(),
            };
            if !needs_rewrite(reference) {
                return whole.to_string();
            }
            match self.resolver.resolve_relative_path(base, reference) {
                Ok(resolved) => format!("url({quote}{resolved}{quote})"),
                Err(err) => {
                    tracing::warn!("Leaving url({}) in {} untouched: {}", reference, base, err);
                    whole.to_string()
                }
            }
        })
    }
}

fn needs_rewrite(reference: &str) -> bool {
    let reference = reference.trim();
    !(reference.is_empty()
        || reference.starts_with('/')
        || reference.starts_with('#')
        || is_remote(reference)
        || is_data_uri(reference))
}

#[async_trait]
impl Stage for UrlRewritePostProcessor {
    fn name(&self) -> &str {
        "rewrite-urls"
    }

    fn role(&self) -> StageRole {
        StageRole::PostProcessor
    }

    fn accepts(&self, kind: AssetKind) -> bool {
        kind == AssetKind::Stylesheet
    }

    async fn transform(&self, assets: Vec<Asset>) -> Result<StageOutput, PipelineError> {
        let assets = assets
            .into_iter()
            .map(|mut asset| {
                let rewritten = self
                    .rewrite(&asset.concrete_path, &asset.content)
                    .into_owned();
                asset.content = rewritten;
                asset
            })
            .collect();
        Ok(StageOutput::new(assets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_urls_become_root_relative() {
        let processor = UrlRewritePostProcessor::new();
        let css = r#".a { background: url(../img/a.png); }
.b { background: url("icons/b.svg"); }
.c { background: url('./c.gif'); }"#;
        let rewritten = processor.rewrite("/styles/site.less", css);
        assert_eq!(
            rewritten,
            r#".a { background: url(/img/a.png); }
.b { background: url("/styles/icons/b.svg"); }
.c { background: url('/styles/c.gif'); }"#
        );
    }

    #[test]
    fn test_absolute_remote_and_data_urls_are_untouched() {
        let processor = UrlRewritePostProcessor::new();
        let css = r#".a { background: url(/img/a.png); }
.b { background: url(https://cdn.example.com/b.png); }
.c { background: url("data:image/png;base64,AAAA"); }
.d { filter: url(#shadow); }"#;
        assert_eq!(processor.rewrite("/styles/site.css", css), css);
    }

    #[test]
    fn test_application_root_urls_are_expanded() {
        let processor = UrlRewritePostProcessor::with_resolver(
            PathResolver::with_application_root("/shop"),
        );
        let css = r#".a { background: url(~/img/a.png); }
.b { background: url("~/fonts/b.woff"); }"#;
        assert_eq!(
            processor.rewrite("/styles/site.less", css),
            r#".a { background: url(/shop/img/a.png); }
.b { background: url("/shop/fonts/b.woff"); }"#
        );
        assert_eq!(
            UrlRewritePostProcessor::new().rewrite("/styles/site.less", "url(~/x.png)"),
            "url(/x.png)"
        );
    }

    #[tokio::test]
    async fn test_stage_rewrites_stylesheets() {
        let processor = UrlRewritePostProcessor::new();
        let output = processor
            .transform(vec![
                Asset::new("/styles/site.css", AssetKind::Stylesheet)
                    .with_concrete_path("/styles/site.less")
                    .with_content(".a{background:url(fonts/x.woff)}"),
            ])
            .await
            .unwrap();
        assert_eq!(
            output.assets[0].content,
            ".a{background:url(/styles/fonts/x.woff)}"
        );
    }
}
