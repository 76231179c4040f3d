//! External compiler/minifier invoked as a child process.
//!
//! Source goes in on stdin, output comes back on stdout. Stdout and stderr
//! are drained while stdin is still being written so a tool that streams
//! output early cannot fill its pipe and stall.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use super::{failure, Engine, EngineInput};
use crate::error::{CompilationError, ConfigurationError};

/// Default timeout for one tool invocation (30 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default cap on tool output (50 MB)
const MAX_OUTPUT_SIZE: usize = 50 * 1024 * 1024;

static FILE_LINE_COLUMN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:[^\s:]|[A-Za-z]:[\\/])[^:\n]*:(\d+):(\d+):?\s*(.+)$")
        .expect("valid diagnostic regex")
});

static FILE_PAREN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*[^\n(]+\((\d+),(\d+)\):\s*(.+)$").expect("valid diagnostic regex")
});

static LINE_COLUMN_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bline:?\s*(\d+),?\s*(?:col|column):?\s*(\d+)").expect("valid diagnostic regex")
});

static ERROR_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:error(?:\s+[A-Z]+\d+)?|syntaxerror|parseerror):\s*")
        .expect("valid diagnostic regex")
});

/// A structured diagnostic parsed from a tool's stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub line: u32,
    pub column: Option<u32>,
}

/// Extract the first positioned diagnostic from tool output.
///
/// Understands `file:line:col: message`, `file(line,col): message` and
/// free-form messages mentioning `line N, column M`.
pub fn parse_diagnostic(stderr: &str) -> Option<Diagnostic> {
    for pattern in [&*FILE_LINE_COLUMN, &*FILE_PAREN] {
        if let Some(caps) = pattern.captures(stderr) {
            let line = caps.get(1)?.as_str().parse().ok()?;
            let column = caps.get(2).and_then(|c| c.as_str().parse().ok());
            let message = caps.get(3)?.as_str().trim();
            return Some(Diagnostic {
                message: ERROR_PREFIX.replace(message, "").trim().to_string(),
                line,
                column,
            });
        }
    }

    let caps = LINE_COLUMN_WORDS.captures(stderr)?;
    let line = caps.get(1)?.as_str().parse().ok()?;
    let column = caps.get(2).and_then(|c| c.as_str().parse().ok());
    let message = stderr
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default();
    Some(Diagnostic {
        message: ERROR_PREFIX.replace(message, "").trim().to_string(),
        line,
        column,
    })
}

/// Engine that shells out to an external tool.
///
/// Arguments may contain placeholders that are expanded per invocation:
///
/// - `{file}` - physical path of the asset
/// - `{dir}` - directory containing the asset
/// - `{support_dir}` - temporary directory holding the support files
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    name: String,
    input_dialect: String,
    output_dialect: String,
    command: Option<PathBuf>,
    args: Vec<String>,
    version_args: Option<Vec<String>>,
    support_files: Vec<(String, String)>,
    timeout_secs: u64,
    max_output: usize,
}

impl ProcessEngine {
    pub fn new(
        name: impl Into<String>,
        input_dialect: impl Into<String>,
        output_dialect: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            input_dialect: input_dialect.into(),
            output_dialect: output_dialect.into(),
            command: None,
            args: Vec::new(),
            version_args: None,
            support_files: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_output: MAX_OUTPUT_SIZE,
        }
    }

    pub fn with_command(mut self, command: impl Into<PathBuf>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Arguments of a cheap probe (e.g. `--version`) run once on initialization.
    pub fn with_version_probe<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.version_args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// A file written to the support directory before each invocation.
    pub fn with_support_file(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.support_files.push((name.into(), content.into()));
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Largest stdout accepted from one invocation, in bytes.
    pub fn with_max_output(mut self, bytes: usize) -> Self {
        self.max_output = bytes;
        self
    }

    async fn write_support_files(&self, asset_path: &str) -> Result<Option<TempDir>, CompilationError> {
        if self.support_files.is_empty() {
            return Ok(None);
        }
        let dir = TempDir::new().map_err(|e| failure(self, asset_path, e.to_string()))?;
        for (name, content) in &self.support_files {
            tokio::fs::write(dir.path().join(name), content)
                .await
                .map_err(|e| failure(self, asset_path, format!("writing support file {name}: {e}")))?;
        }
        Ok(Some(dir))
    }

    fn expand_args(&self, input: &EngineInput<'_>, support_dir: Option<&TempDir>) -> Vec<String> {
        let file = input.physical_path.display().to_string();
        let dir = input
            .physical_path
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let support = support_dir
            .map(|d| d.path().display().to_string())
            .unwrap_or_default();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{file}", &file)
                    .replace("{dir}", &dir)
                    .replace("{support_dir}", &support)
            })
            .collect()
    }

    fn compilation_error(&self, asset_path: &str, stderr: &str, code: Option<i32>) -> CompilationError {
        if let Some(diagnostic) = parse_diagnostic(stderr) {
            return CompilationError::Syntax {
                input_dialect: self.input_dialect.clone(),
                output_dialect: self.output_dialect.clone(),
                asset_path: asset_path.to_string(),
                message: diagnostic.message,
                line: Some(diagnostic.line),
                column: diagnostic.column,
            };
        }
        let stderr = stderr.trim();
        let message = match (stderr.is_empty(), code) {
            (false, _) => stderr.to_string(),
            (true, Some(code)) => format!("{} exited with status {code}", self.name),
            (true, None) => format!("{} was terminated by a signal", self.name),
        };
        failure(self, asset_path, message)
    }
}

#[async_trait]
impl Engine for ProcessEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_dialect(&self) -> &str {
        &self.input_dialect
    }

    fn output_dialect(&self) -> &str {
        &self.output_dialect
    }

    async fn initialize(&mut self) -> Result<(), ConfigurationError> {
        let command = self.command.as_ref().ok_or_else(|| ConfigurationError::MissingToolPath {
            engine: self.name.clone(),
        })?;
        let Some(version_args) = &self.version_args else {
            return Ok(());
        };

        let unavailable = |message: String| ConfigurationError::ToolUnavailable {
            engine: self.name.clone(),
            tool: command.display().to_string(),
            message,
        };
        let status = timeout(
            Duration::from_secs(self.timeout_secs),
            Command::new(command)
                .args(version_args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .status(),
        )
        .await
        .map_err(|_| unavailable(format!("timed out after {}s", self.timeout_secs)))?
        .map_err(|e| unavailable(e.to_string()))?;

        if !status.success() {
            return Err(unavailable(format!("version probe exited with {status}")));
        }
        tracing::debug!("[{}] {} is available", self.name, command.display());
        Ok(())
    }

    async fn transform(&mut self, input: &EngineInput<'_>) -> Result<String, CompilationError> {
        let Some(command) = &self.command else {
            return Err(failure(self, input.asset_path, "no tool path configured"));
        };

        // Dropped on every return path below, which removes the files.
        let support_dir = self.write_support_files(input.asset_path).await?;
        let args = self.expand_args(input, support_dir.as_ref());

        let mut cmd = Command::new(command);
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = input.physical_path.parent() {
            let is_dir = tokio::fs::metadata(dir)
                .await
                .is_ok_and(|metadata| metadata.is_dir());
            if is_dir {
                cmd.current_dir(dir);
            }
        }

        tracing::debug!("[{}] Running {} for {}", self.name, command.display(), input.asset_path);
        let mut child = cmd
            .spawn()
            .map_err(|e| failure(self, input.asset_path, format!("failed to start {}: {e}", command.display())))?;

        let missing_pipe = || failure(self, input.asset_path, "failed to capture process pipes");
        let mut stdin = child.stdin.take().ok_or_else(missing_pipe)?;
        let mut stdout = child.stdout.take().ok_or_else(missing_pipe)?;
        let mut stderr = child.stderr.take().ok_or_else(missing_pipe)?;

        let source = input.content.as_bytes();
        let write_input = async move {
            // a tool may exit before reading all of its input
            match stdin.write_all(source).await {
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                other => other?,
            }
            drop(stdin);
            Ok::<_, std::io::Error>(())
        };
        // Reading stops one byte past the cap; dropping the pipe then ends
        // the tool with EPIPE instead of letting it fill memory.
        let limit = self.max_output as u64 + 1;
        let read_stdout = async move {
            let mut buffer = Vec::new();
            (&mut stdout).take(limit).read_to_end(&mut buffer).await?;
            drop(stdout);
            Ok::<_, std::io::Error>(buffer)
        };
        let read_stderr = async {
            let mut buffer = Vec::new();
            stderr.read_to_end(&mut buffer).await.map(|_| buffer)
        };
        let run = async {
            let ((), out, err) = tokio::try_join!(write_input, read_stdout, read_stderr)?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, out, err))
        };

        let (status, out, err) = timeout(Duration::from_secs(self.timeout_secs), run)
            .await
            .map_err(|_| {
                failure(
                    self,
                    input.asset_path,
                    format!("{} timed out after {}s", self.name, self.timeout_secs),
                )
            })?
            .map_err(|e| failure(self, input.asset_path, e.to_string()))?;

        if out.len() > self.max_output {
            return Err(failure(
                self,
                input.asset_path,
                format!("output exceeds {} bytes", self.max_output),
            ));
        }

        if !status.success() {
            let stderr = String::from_utf8_lossy(&err);
            return Err(self.compilation_error(input.asset_path, &stderr, status.code()));
        }

        String::from_utf8(out)
            .map_err(|e| failure(self, input.asset_path, format!("output is not UTF-8: {e}")))
    }
}
