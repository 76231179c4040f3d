use async_trait::async_trait;
use lightningcss::{
    printer::PrinterOptions,
    stylesheet::{MinifyOptions, ParserOptions, StyleSheet},
};

use super::{failure, Engine, EngineInput};
use crate::error::CompilationError;

/// In-process CSS minifier backed by lightningcss.
#[derive(Debug, Default)]
pub struct LightningCssEngine;

impl LightningCssEngine {
    pub fn new() -> Self {
        Self
    }

    fn minify(&self, input: &EngineInput<'_>) -> Result<String, CompilationError> {
        let mut stylesheet = StyleSheet::parse(
            input.content,
            ParserOptions {
                filename: input.asset_path.to_string(),
                ..Default::default()
            },
        )
        .map_err(|e| CompilationError::Syntax {
            input_dialect: self.input_dialect().to_string(),
            output_dialect: self.output_dialect().to_string(),
            asset_path: input.asset_path.to_string(),
            message: e.kind.to_string(),
            // lightningcss lines are 0-based
            line: e.loc.as_ref().map(|loc| loc.line + 1),
            column: e.loc.as_ref().map(|loc| loc.column),
        })?;

        stylesheet
            .minify(MinifyOptions::default())
            .map_err(|e| failure(self, input.asset_path, e.to_string()))?;

        let result = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..Default::default()
            })
            .map_err(|e| failure(self, input.asset_path, e.to_string()))?;

        Ok(result.code)
    }
}

#[async_trait]
impl Engine for LightningCssEngine {
    fn name(&self) -> &str {
        "lightningcss"
    }

    fn input_dialect(&self) -> &str {
        "CSS"
    }

    fn output_dialect(&self) -> &str {
        "minified CSS"
    }

    async fn transform(&mut self, input: &EngineInput<'_>) -> Result<String, CompilationError> {
        self.minify(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn input<'a>(content: &'a str) -> EngineInput<'a> {
        EngineInput {
            content,
            asset_path: "/styles/site.css",
            physical_path: Path::new("/tmp/site.css"),
        }
    }

    #[tokio::test]
    async fn test_minifies_css() {
        let mut engine = LightningCssEngine::new();
        let output = engine
            .transform(&input(".a {\n  color: #ff0000;\n}\n\n.b { margin: 0px; }\n"))
            .await
            .unwrap();
        assert!(!output.contains('\n'));
        assert!(output.contains(".a{color:red}"));
    }

    #[tokio::test]
    async fn test_parse_error_is_syntax_error() {
        let mut engine = LightningCssEngine::new();
        let err = engine
            .transform(&input(".a {}\n\n.b..c { color: red; }\n"))
            .await
            .unwrap_err();
        match err {
            CompilationError::Syntax {
                asset_path, line, ..
            } => {
                assert_eq!(asset_path, "/styles/site.css");
                assert!(line.is_some());
            }
            other => panic!("expected syntax error, got {other}"),
        }
    }
}
