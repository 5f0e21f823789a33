use futures::future;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::{ExecuteCommandParams, MessageType, Url};

use crate::fix::{ApplyFixParams, apply_fix};
use crate::scan::run_scan;
use crate::server::FixinatorServer;
use crate::utils::{collect_cfml_files, is_cfml_url, spawn_log};

/// Scan the document named by the first argument (a file URI).
pub const SCAN: &str = "fixinator.scan";
/// Scan every CFML file in the workspace.
pub const SCAN_ALL: &str = "fixinator.scanAll";
/// Apply one suggested fix; argument is an `ApplyFixParams` object.
pub const APPLY_FIX: &str = "fixinator.applyFix";

pub fn all() -> Vec<String> {
    vec![SCAN.to_string(), SCAN_ALL.to_string(), APPLY_FIX.to_string()]
}

pub async fn handle_execute_command(
    server: &FixinatorServer,
    params: ExecuteCommandParams,
) -> Result<Option<serde_json::Value>> {
    match params.command.as_str() {
        SCAN => {
            let uri = params
                .arguments
                .first()
                .and_then(|arg| serde_json::from_value::<Url>(arg.clone()).ok())
                .ok_or_else(|| {
                    tower_lsp::jsonrpc::Error::invalid_params("expected a document URI argument")
                })?;

            if !is_cfml_url(&uri) {
                server
                    .client
                    .show_message(
                        MessageType::INFO,
                        format!("Fixinator is not available for this file type [{uri}]"),
                    )
                    .await;
                return Ok(None);
            }

            server
                .client
                .show_message(MessageType::INFO, format!("Fixinator is scanning {uri}"))
                .await;
            run_scan(server, uri).await;
        }
        SCAN_ALL => {
            let folders = server
                .workspace_folders
                .read()
                .expect("Commands: lock poisoned")
                .clone();
            let files = collect_cfml_files(&folders);
            spawn_log(
                server.client.clone(),
                MessageType::INFO,
                format!("[INFO] Scanning {} CFML files in the workspace", files.len()),
            );

            let scans = files
                .into_iter()
                .filter_map(|path| Url::from_file_path(path).ok())
                .map(|uri| run_scan(server, uri));
            future::join_all(scans).await;
        }
        APPLY_FIX => {
            let fix_params = params
                .arguments
                .first()
                .and_then(|arg| serde_json::from_value::<ApplyFixParams>(arg.clone()).ok())
                .ok_or_else(|| {
                    tower_lsp::jsonrpc::Error::invalid_params("expected applyFix arguments")
                })?;
            apply_fix(server, fix_params).await;
        }
        other => {
            tracing::debug!(command = other, "ignoring unknown command");
        }
    }
    Ok(None)
}
