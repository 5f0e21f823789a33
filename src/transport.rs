//! # Scan Transports
//!
//! Two ways to reach the scanner, behind one [`ScanTransport`] capability:
//! - [`HttpTransport`]: POST the document to the scan API with an API key
//! - [`BoxTransport`]: spawn the locally installed CommandBox CLI and parse
//!   its stdout
//!
//! A scan picks exactly one transport up front (`useCommandbox`) and never
//! mixes them mid-flight. Both produce the same [`ScanReport`] envelope.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde_json::{Value as JsonValue, json};
use tower_lsp::async_trait;

use crate::findings::ScanReport;
use crate::scan::ScanError;

#[async_trait]
pub trait ScanTransport: Send + Sync {
    /// Submits one document for scanning. `path` identifies the document to
    /// the scanner; `text` is the live editor content.
    async fn scan(&self, path: &Path, text: &str) -> Result<ScanReport, ScanError>;
}

pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    scanner_config: JsonValue,
}

impl HttpTransport {
    pub fn new(endpoint: String, api_key: String, scanner_config: JsonValue) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key,
            scanner_config,
        }
    }
}

#[async_trait]
impl ScanTransport for HttpTransport {
    async fn scan(&self, path: &Path, text: &str) -> Result<ScanReport, ScanError> {
        let payload = json!({
            "files": [{"path": path.to_string_lossy(), "data": text}],
            "config": self.scanner_config,
            "categories": false,
        });
        tracing::trace!(endpoint = %self.endpoint, %payload, "submitting scan request");

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| ScanError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(ScanError::AuthOrEndpoint(status.as_u16()));
        }
        if !status.is_success() {
            return Err(ScanError::Transport(format!("server returned {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|err| ScanError::Transport(err.to_string()))?;
        parse_report(&body)
    }
}

pub struct BoxTransport {
    binary: String,
    config_file: Option<PathBuf>,
    extra_args: Vec<String>,
    cwd: Option<PathBuf>,
}

impl BoxTransport {
    pub fn new(
        binary: String,
        config_file: Option<PathBuf>,
        extra_args: Vec<String>,
        cwd: Option<PathBuf>,
    ) -> Self {
        Self {
            binary,
            config_file,
            extra_args,
            cwd,
        }
    }

    /// `fixinator json=true failOnIssues=false [configFile=..] [..] path=<file>`.
    /// `failOnIssues=false` keeps the exit code at zero when issues are
    /// found, so a non-zero exit always means the scan itself broke.
    fn build_args(&self, path: &Path) -> Vec<String> {
        let mut args = vec![
            "fixinator".to_string(),
            "json=true".to_string(),
            "failOnIssues=false".to_string(),
        ];
        if let Some(config_file) = &self.config_file {
            args.push(format!("configFile={}", config_file.display()));
        }
        args.extend(self.extra_args.iter().cloned());
        args.push(format!("path={}", path.display()));
        args
    }
}

#[async_trait]
impl ScanTransport for BoxTransport {
    async fn scan(&self, path: &Path, _text: &str) -> Result<ScanReport, ScanError> {
        let args = self.build_args(path);
        tracing::debug!(binary = %self.binary, ?args, cwd = ?self.cwd, "spawning scanner");

        let mut command = tokio::process::Command::new(&self.binary);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let output = command
            .output()
            .await
            .map_err(|err| ScanError::Transport(format!("cannot spawn {}: {err}", self.binary)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            tracing::error!(scanner = %self.binary, "{}", stderr.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() || stdout.trim().is_empty() {
            return Err(ScanError::Transport(format!(
                "scanner exited with {} and {} bytes of output",
                output
                    .status
                    .code()
                    .map_or_else(|| "no status".to_string(), |c| format!("code {c}")),
                stdout.trim().len(),
            )));
        }

        parse_report(&stdout)
    }
}

fn parse_report(body: &str) -> Result<ScanReport, ScanError> {
    serde_json::from_str(body).map_err(|err| {
        tracing::trace!(payload = body, "unparseable scanner response");
        ScanError::Parse(err.to_string())
    })
}
