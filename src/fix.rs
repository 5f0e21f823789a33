//! Applies a scanner-suggested fix: one atomic text edit replacing the
//! diagnostic's range, then removal of exactly that diagnostic (by registry
//! id, never by value) from the document's published list. A rejected edit
//! changes nothing and is not retried.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::{Diagnostic, Range, TextEdit, Url, WorkspaceEdit};

use crate::registry::diagnostic_id;
use crate::server::FixinatorServer;

/// Arguments the quick-fix code action hands back through
/// `workspace/executeCommand`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplyFixParams {
    pub uri: Url,
    /// Registry id of the diagnostic being fixed.
    pub id: u64,
    /// Index into the finding's fix list.
    pub fix: usize,
}

pub async fn apply_fix(server: &FixinatorServer, params: ApplyFixParams) {
    let Some(finding) = server.registry.get(params.id) else {
        tracing::debug!(id = params.id, "fix requested for unknown diagnostic");
        return;
    };
    let Some(fix) = finding.fixes.get(params.fix) else {
        tracing::debug!(id = params.id, index = params.fix, "fix index out of range");
        return;
    };

    // The published range is the one the client is showing; the edit must
    // target exactly that span.
    let Some(range) = server.published_range(&params.uri, params.id) else {
        tracing::debug!(id = params.id, uri = %params.uri, "diagnostic no longer published");
        return;
    };

    let edit = build_fix_edit(&params.uri, range, &fix.replace_string);
    match server.client.apply_edit(edit).await {
        Ok(response) if response.applied => {
            let remaining = {
                let published = server.published.read().expect("Fix: lock poisoned");
                published
                    .get(&params.uri)
                    .map(|diagnostics| retain_other_diagnostics(diagnostics, params.id))
                    .unwrap_or_default()
            };
            server.replace_published(&params.uri, remaining.clone());
            server
                .client
                .publish_diagnostics(params.uri.clone(), remaining, None)
                .await;
            tracing::info!(id = params.id, uri = %params.uri, "fix applied");
        }
        Ok(response) => {
            // The document changed under the edit; the next scan starts clean.
            tracing::debug!(
                id = params.id,
                reason = response.failure_reason.as_deref().unwrap_or("unknown"),
                "client did not apply fix edit"
            );
        }
        Err(err) => {
            tracing::error!(id = params.id, %err, "applyEdit request failed");
        }
    }
}

/// A single-edit workspace change replacing `range` with `replacement`.
pub fn build_fix_edit(uri: &Url, range: Range, replacement: &str) -> WorkspaceEdit {
    let mut changes = HashMap::new();
    changes.insert(
        uri.clone(),
        vec![TextEdit {
            range,
            new_text: replacement.to_string(),
        }],
    );
    WorkspaceEdit {
        changes: Some(changes),
        document_changes: None,
        change_annotations: None,
    }
}

/// Everything except the diagnostic tagged with `id`, order preserved.
pub fn retain_other_diagnostics(diagnostics: &[Diagnostic], id: u64) -> Vec<Diagnostic> {
    diagnostics
        .iter()
        .filter(|d| diagnostic_id(d) != Some(id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tag_diagnostic;
    use tower_lsp::lsp_types::Position;

    fn diagnostic(id: u64, message: &str) -> Diagnostic {
        let mut diagnostic = Diagnostic {
            message: message.to_string(),
            ..Default::default()
        };
        tag_diagnostic(&mut diagnostic, id);
        diagnostic
    }

    #[test]
    fn fix_edit_targets_exactly_the_published_range() {
        let uri = Url::parse("file:///ws/index.cfm").expect("valid uri");
        let range = Range::new(Position::new(2, 4), Position::new(2, 9));
        let edit = build_fix_edit(&uri, range, "safe()");

        let changes = edit.changes.expect("changes present");
        let edits = changes.get(&uri).expect("edits for the document");
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].range, range);
        assert_eq!(edits[0].new_text, "safe()");
        assert!(edit.document_changes.is_none());
    }

    #[test]
    fn removal_is_by_identity_and_leaves_the_rest_alone() {
        let diagnostics = vec![
            diagnostic(1, "first"),
            diagnostic(2, "second"),
            // Same message as the fixed one; value equality must not matter.
            diagnostic(3, "second"),
        ];

        let remaining = retain_other_diagnostics(&diagnostics, 2);
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0], diagnostics[0]);
        assert_eq!(remaining[1], diagnostics[2]);

        // Unknown id removes nothing.
        assert_eq!(retain_other_diagnostics(&diagnostics, 99).len(), 3);
    }
}
