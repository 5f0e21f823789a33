//! Implements the core Language Server Protocol (LSP) logic for the
//! Fixinator integration.
//!
//! This module handles document synchronization, exposes the scan commands
//! and quick-fix code actions, and owns the per-session state: document
//! texts, published diagnostics, the finding registry, and settings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tower_lsp::jsonrpc::Result;
#[allow(clippy::wildcard_imports)]
use tower_lsp::lsp_types::*;
use tower_lsp::Client;
use tower_lsp::LanguageServer;
use tower_lsp::async_trait;

use crate::commands;
use crate::config::{Settings, load_settings, settings_from_value};
use crate::fix::ApplyFixParams;
use crate::registry::{FindingRegistry, diagnostic_id};
use crate::scan::run_scan;
use crate::utils::{is_cfml_url, spawn_log};

/// The core Fixinator language server state.
#[derive(Debug)]
pub struct FixinatorServer {
    pub client: Client,
    pub documents: Arc<RwLock<HashMap<Url, String>>>,
    /// The diagnostics currently published per document; replaced wholesale
    /// on every successful scan.
    pub published: Arc<RwLock<HashMap<Url, Vec<Diagnostic>>>>,
    pub registry: Arc<FindingRegistry>,
    pub settings: Arc<RwLock<Settings>>,
    pub workspace_folders: Arc<RwLock<Vec<PathBuf>>>,
    /// Monotonic per-document scan counter; a finished scan publishes only
    /// if no newer scan of the same document has started.
    pub scan_generations: Arc<RwLock<HashMap<Url, u64>>>,
}

impl FixinatorServer {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            documents: Arc::new(RwLock::new(HashMap::new())),
            published: Arc::new(RwLock::new(HashMap::new())),
            registry: Arc::new(FindingRegistry::new()),
            settings: Arc::new(RwLock::new(Settings::default())),
            workspace_folders: Arc::new(RwLock::new(Vec::new())),
            scan_generations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Marks the start of a scan of `uri` and returns its generation.
    pub fn begin_scan(&self, uri: &Url) -> u64 {
        let mut generations = self
            .scan_generations
            .write()
            .expect("Server: lock poisoned");
        let entry = generations.entry(uri.clone()).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn is_current_scan(&self, uri: &Url, generation: u64) -> bool {
        self.scan_generations
            .read()
            .expect("Server: lock poisoned")
            .get(uri)
            .copied()
            .unwrap_or(0)
            == generation
    }

    /// Swaps a document's published diagnostics and sweeps registry entries
    /// whose diagnostics are no longer part of the new set.
    pub fn replace_published(&self, uri: &Url, diagnostics: Vec<Diagnostic>) {
        let keep: Vec<u64> = diagnostics.iter().filter_map(diagnostic_id).collect();
        let previous = self
            .published
            .write()
            .expect("Server: lock poisoned")
            .insert(uri.clone(), diagnostics);

        if let Some(previous) = previous {
            let stale: Vec<u64> = previous
                .iter()
                .filter_map(diagnostic_id)
                .filter(|id| !keep.contains(id))
                .collect();
            self.registry.remove_all(&stale);
        }
    }

    /// The published range of the diagnostic tagged with `id`, if it is
    /// still part of the document's current set.
    pub fn published_range(&self, uri: &Url, id: u64) -> Option<Range> {
        self.published
            .read()
            .expect("Server: lock poisoned")
            .get(uri)?
            .iter()
            .find(|d| diagnostic_id(d) == Some(id))
            .map(|d| d.range)
    }

    /// The workspace folder containing `path`, falling back to the first
    /// folder. Used as the working directory for the CLI transport and to
    /// resolve relative config paths.
    pub fn workspace_root_for(&self, path: &Path) -> Option<PathBuf> {
        let folders = self
            .workspace_folders
            .read()
            .expect("Server: lock poisoned");
        folders
            .iter()
            .find(|folder| path.starts_with(folder))
            .or_else(|| folders.first())
            .cloned()
    }

    fn update_settings(&self, settings: Settings) {
        tracing::debug!(?settings, "settings updated");
        *self.settings.write().expect("Server: lock poisoned") = settings;
    }

    fn scan_on_save_enabled(&self) -> bool {
        self.settings
            .read()
            .expect("Server: lock poisoned")
            .scan_on_save
    }

    fn build_quick_fixes(&self, context: &CodeActionContext, uri: &Url) -> Vec<CodeActionOrCommand> {
        let mut actions = Vec::new();
        for diagnostic in &context.diagnostics {
            let Some(id) = diagnostic_id(diagnostic) else {
                continue;
            };
            let Some(finding) = self.registry.get(id) else {
                continue;
            };

            for (index, fix) in finding.fixes.iter().enumerate() {
                let title = if fix.fix_code.is_empty() {
                    format!("Fix {}", finding.id)
                } else {
                    fix.fix_code.clone()
                };
                let arguments = serde_json::to_value(ApplyFixParams {
                    uri: uri.clone(),
                    id,
                    fix: index,
                })
                .expect("Server: serialization failure");

                actions.push(CodeActionOrCommand::CodeAction(CodeAction {
                    title,
                    kind: Some(CodeActionKind::QUICKFIX),
                    diagnostics: Some(vec![diagnostic.clone()]),
                    command: Some(Command {
                        title: "Apply Fix".to_string(),
                        command: commands::APPLY_FIX.to_string(),
                        arguments: Some(vec![arguments]),
                    }),
                    ..Default::default()
                }));
            }
        }
        actions
    }
}

fn build_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(
            TextDocumentSyncOptions {
                open_close: Some(true),
                change: Some(TextDocumentSyncKind::FULL),
                save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                ..Default::default()
            },
        )),
        code_action_provider: Some(CodeActionProviderCapability::Options(CodeActionOptions {
            code_action_kinds: Some(vec![CodeActionKind::QUICKFIX]),
            work_done_progress_options: WorkDoneProgressOptions::default(),
            resolve_provider: Some(false),
        })),
        execute_command_provider: Some(ExecuteCommandOptions {
            commands: commands::all(),
            ..Default::default()
        }),
        workspace: Some(WorkspaceServerCapabilities {
            workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                supported: Some(true),
                change_notifications: Some(OneOf::Left(true)),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[async_trait]
impl LanguageServer for FixinatorServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        if let Some(folders) = params.workspace_folders {
            let paths = folders
                .into_iter()
                .filter_map(|f| f.uri.to_file_path().ok())
                .collect::<Vec<_>>();
            self.workspace_folders
                .write()
                .expect("Server: lock poisoned")
                .clone_from(&paths);
        }

        let settings = match &params.initialization_options {
            Some(options) => settings_from_value(options),
            None => {
                let folders = self
                    .workspace_folders
                    .read()
                    .expect("Server: lock poisoned")
                    .clone();
                load_settings(&folders).unwrap_or_default()
            }
        };
        self.update_settings(settings);

        Ok(InitializeResult {
            capabilities: build_capabilities(),
            ..Default::default()
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "[INFO] Fixinator language server ready")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        spawn_log(
            self.client.clone(),
            MessageType::INFO,
            "[INFO] Fixinator language server shutting down".to_string(),
        );
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents
            .write()
            .expect("Server: lock poisoned")
            .insert(uri, params.text_document.text);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // Full sync: the last change carries the entire document.
        if let Some(change) = params.content_changes.into_iter().next() {
            self.documents
                .write()
                .expect("Server: lock poisoned")
                .insert(params.text_document.uri, change.text);
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        if self.scan_on_save_enabled() && is_cfml_url(&uri) {
            run_scan(self, uri).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents
            .write()
            .expect("Server: lock poisoned")
            .remove(&uri);
        self.scan_generations
            .write()
            .expect("Server: lock poisoned")
            .remove(&uri);
        self.replace_published(&uri, Vec::new());
        self.client.publish_diagnostics(uri, Vec::new(), None).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        self.update_settings(settings_from_value(&params.settings));
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        let mut folders = self
            .workspace_folders
            .write()
            .expect("Server: lock poisoned");
        for removed in params.event.removed {
            if let Ok(path) = removed.uri.to_file_path() {
                folders.retain(|f| f != &path);
            }
        }
        for added in params.event.added {
            if let Ok(path) = added.uri.to_file_path() {
                folders.push(path);
            }
        }
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let actions = self.build_quick_fixes(&params.context, &params.text_document.uri);
        Ok(Some(actions))
    }

    async fn execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> Result<Option<serde_json::Value>> {
        commands::handle_execute_command(self, params).await
    }
}
