use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tower_lsp::Client;
use tower_lsp::lsp_types::{MessageType, Url};
use walkdir::{DirEntry, WalkDir};

/// Regex for identifying CFML source files by extension.
static CFML_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(cfm|cfc|cfml)$").expect("Utils: regex failure"));

/// Directories never worth scanning in a workspace sweep.
const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "dist",
    "out",
    "build",
    ".git",
    ".svn",
    ".hg",
    ".idea",
    ".vscode",
    ".history",
];

/// Cap on a workspace-wide sweep; the hosted API is rate limited.
const MAX_WORKSPACE_FILES: usize = 1000;

pub fn spawn_log(client: Client, ty: MessageType, msg: String) {
    tokio::spawn(async move {
        let _ = client.log_message(ty, msg).await;
    });
}

pub fn is_cfml_path(path: &Path) -> bool {
    path.to_str().is_some_and(|p| CFML_FILE_RE.is_match(p))
}

pub fn is_cfml_url(uri: &Url) -> bool {
    uri.to_file_path().is_ok_and(|p| is_cfml_path(&p))
}

fn is_excluded_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
}

/// Collects CFML files across the workspace folders for a bulk scan,
/// skipping dependency/VCS/IDE directories and stopping at
/// [`MAX_WORKSPACE_FILES`].
pub fn collect_cfml_files(folders: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for folder in folders {
        let walker = WalkDir::new(folder)
            .into_iter()
            .filter_entry(|e| !is_excluded_dir(e));
        for entry in walker {
            let Ok(entry) = entry else { continue };
            if entry.file_type().is_file() && is_cfml_path(entry.path()) {
                files.push(entry.into_path());
                if files.len() >= MAX_WORKSPACE_FILES {
                    tracing::warn!(
                        limit = MAX_WORKSPACE_FILES,
                        "workspace has more CFML files than the scan limit, truncating"
                    );
                    return files;
                }
            }
        }
    }
    files
}
