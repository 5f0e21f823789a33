//! # Scan Orchestration
//!
//! Drives one scan cycle: obtain the document text, submit it through exactly
//! one transport, map every finding to a diagnostic, and replace the
//! document's published diagnostics in a single call. Errors are local to the
//! invocation; nothing is retried and no shared state is left dirty.
//!
//! Scans of the same document can overlap (there is no cancellation), so each
//! invocation captures a per-document generation at start and drops its
//! results if a newer scan began in the meantime.

use std::path::Path;

use thiserror::Error;
use tower_lsp::lsp_types::{
    CodeDescription, Diagnostic, MessageType, NumberOrString, Url,
};

use crate::config::{Settings, resolve_scanner_config};
use crate::findings::{Finding, severity_to_lsp};
use crate::mapping::map_finding_to_range;
use crate::registry::{FindingRegistry, tag_diagnostic};
use crate::server::FixinatorServer;
use crate::transport::{BoxTransport, HttpTransport, ScanTransport};
use crate::utils::spawn_log;

pub const DIAGNOSTIC_SOURCE: &str = "fixinator";

/// Why a scan invocation ended without publishing. Every variant is terminal
/// for its invocation; the message is what the user sees.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot use scanner config file `{path}`: {reason}")]
    Config { path: String, reason: String },
    #[error("scan rejected by server (HTTP {0}); check your API key and endpoint")]
    AuthOrEndpoint(u16),
    #[error("scan failed: {0}")]
    Transport(String),
    #[error("scanner returned malformed output: {0}")]
    Parse(String),
}

/// Runs one scan of `uri` and publishes the outcome. Failures surface to the
/// user and leave the document's previous diagnostics untouched.
pub async fn run_scan(server: &FixinatorServer, uri: Url) {
    let start = std::time::Instant::now();
    let Ok(path) = uri.to_file_path() else {
        spawn_log(
            server.client.clone(),
            MessageType::WARNING,
            format!("[WARN] Only file documents can be scanned, not {uri}"),
        );
        return;
    };

    let generation = server.begin_scan(&uri);
    let settings = server
        .settings
        .read()
        .expect("Scan: lock poisoned")
        .clone();
    let workspace_root = server.workspace_root_for(&path);

    // Live editor content wins over what is on disk; workspace sweeps read
    // unopened files from disk the way the scanner itself would.
    let text = {
        let docs = server.documents.read().expect("Scan: lock poisoned");
        docs.get(&uri).cloned()
    };
    let text = match text {
        Some(text) => text,
        None => match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                report_scan_error(
                    server,
                    &ScanError::Transport(format!("cannot read {}: {err}", path.display())),
                )
                .await;
                return;
            }
        },
    };

    let report = match scan_once(&settings, &path, &text, workspace_root.as_deref()).await {
        Ok(report) => report,
        Err(err) => {
            report_scan_error(server, &err).await;
            return;
        }
    };

    if !server.is_current_scan(&uri, generation) {
        tracing::debug!(%uri, generation, "discarding superseded scan results");
        return;
    }

    spawn_log(
        server.client.clone(),
        MessageType::INFO,
        format!(
            "[INFO] Found {count} issues in {path} ({elapsed:?})",
            count = report.results.len(),
            path = path.display(),
            elapsed = start.elapsed(),
        ),
    );

    let diagnostics = build_diagnostics(
        &text,
        report.results,
        &server.registry,
        settings.plain_text_key_to_end_of_line,
    );
    server.replace_published(&uri, diagnostics.clone());
    server.client.publish_diagnostics(uri, diagnostics, None).await;
}

/// One transport round-trip, selected once from the settings.
async fn scan_once(
    settings: &Settings,
    path: &Path,
    text: &str,
    workspace_root: Option<&Path>,
) -> Result<crate::findings::ScanReport, ScanError> {
    let scanner_config = resolve_scanner_config(settings, workspace_root)?;

    let transport: Box<dyn ScanTransport> = if settings.use_commandbox {
        Box::new(BoxTransport::new(
            settings.box_binary.clone(),
            scanner_config.path,
            settings.custom_box_args.clone(),
            workspace_root.map(Path::to_path_buf),
        ))
    } else {
        Box::new(HttpTransport::new(
            settings.endpoint.clone(),
            settings.api_key.clone(),
            scanner_config.value,
        ))
    };

    transport.scan(path, text).await
}

/// Builds the diagnostics for one scan's findings, registering each raw
/// finding so quick fixes can recover it later. A finding the mapper rejects
/// is skipped on its own; the rest of the batch still publishes.
pub fn build_diagnostics(
    text: &str,
    findings: Vec<Finding>,
    registry: &FindingRegistry,
    plain_text_key_to_eol: bool,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::with_capacity(findings.len());

    for finding in findings {
        let range = match map_finding_to_range(text, &finding, plain_text_key_to_eol) {
            Ok(range) => range,
            Err(err) => {
                tracing::warn!(id = %finding.id, %err, "skipping unmappable finding");
                continue;
            }
        };

        let code = (!finding.id.is_empty()).then(|| NumberOrString::String(finding.id.clone()));
        let code_description = finding
            .link
            .as_deref()
            .and_then(|link| Url::parse(link).ok())
            .map(|href| CodeDescription { href });

        let mut diagnostic = Diagnostic {
            range,
            severity: Some(severity_to_lsp(finding.severity)),
            code,
            code_description,
            source: Some(DIAGNOSTIC_SOURCE.to_string()),
            message: finding.message.clone(),
            ..Default::default()
        };
        let id = registry.insert(finding);
        tag_diagnostic(&mut diagnostic, id);
        diagnostics.push(diagnostic);
    }

    diagnostics
}

async fn report_scan_error(server: &FixinatorServer, err: &ScanError) {
    tracing::error!(%err, "scan failed");
    server
        .client
        .show_message(MessageType::ERROR, format!("Fixinator scan failed! {err}"))
        .await;
}
