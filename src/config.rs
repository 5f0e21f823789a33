//! Settings surface and scanner config-file validation.
//!
//! Settings arrive three ways, all funneled through [`settings_from_value`]:
//! `initialize`'s `initialization_options`, a `fixlsp.json` in a workspace
//! folder, and `workspace/didChangeConfiguration`. Clients that namespace
//! their settings send `{"fixinator": {...}}`; both shapes are accepted.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::scan::ScanError;

pub const DEFAULT_ENDPOINT: &str = "https://api.fixinator.app/v1/scan";
pub const DEFAULT_BOX_BINARY: &str = "box";

/// The settings section clients use to namespace their configuration.
pub const SETTINGS_SECTION: &str = "fixinator";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Scan API endpoint, used unless `useCommandbox` is set.
    pub endpoint: String,
    pub api_key: String,
    pub scan_on_save: bool,
    /// Selects the local CommandBox CLI transport instead of the HTTP API.
    pub use_commandbox: bool,
    pub box_binary: String,
    /// Extra arguments appended to the CommandBox invocation.
    pub custom_box_args: Vec<String>,
    /// Path to a scanner JSON config file, relative paths resolved against
    /// the workspace folder. Validated to exist and parse before any scan.
    pub config_file: String,
    /// Range policy for `plain-text-key` findings; see `mapping`.
    pub plain_text_key_to_end_of_line: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            scan_on_save: false,
            use_commandbox: false,
            box_binary: DEFAULT_BOX_BINARY.to_string(),
            custom_box_args: Vec::new(),
            config_file: String::new(),
            plain_text_key_to_end_of_line: false,
        }
    }
}

/// Parses settings from a client-supplied JSON value, unwrapping the
/// `fixinator` section when present. Unknown or malformed values fall back
/// to defaults rather than failing initialization.
pub fn settings_from_value(value: &JsonValue) -> Settings {
    let section = value.get(SETTINGS_SECTION).unwrap_or(value);
    match serde_json::from_value(section.clone()) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!(%err, "ignoring malformed settings, using defaults");
            Settings::default()
        }
    }
}

/// Looks in the workspace folders for fixlsp.json
pub fn load_settings(workspace_folders: &[PathBuf]) -> Option<Settings> {
    for folder in workspace_folders {
        let path = folder.join("fixlsp.json");
        if path.exists()
            && let Ok(data) = fs::read_to_string(&path)
        {
            match serde_json::from_str::<JsonValue>(&data) {
                Ok(value) => return Some(settings_from_value(&value)),
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "unparseable fixlsp.json");
                }
            }
        }
    }
    None
}

/// The validated scanner configuration for one scan: the resolved file path
/// (handed to the CLI transport) and its parsed contents (sent as the HTTP
/// `config` payload). Both are empty when no config file is set.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannerConfig {
    pub path: Option<PathBuf>,
    pub value: JsonValue,
}

impl ScannerConfig {
    pub fn empty() -> Self {
        Self {
            path: None,
            value: JsonValue::Object(serde_json::Map::new()),
        }
    }
}

/// Resolves and validates the scanner config file before any transport
/// activity. A missing or unparseable file fails the triggering scan with
/// [`ScanError::Config`]; it never takes the server down.
pub fn resolve_scanner_config(
    settings: &Settings,
    workspace_root: Option<&Path>,
) -> Result<ScannerConfig, ScanError> {
    if settings.config_file.is_empty() {
        return Ok(ScannerConfig::empty());
    }

    let mut path = PathBuf::from(&settings.config_file);
    if path.is_relative()
        && let Some(root) = workspace_root
    {
        path = root.join(path);
    }

    if !path.exists() {
        return Err(ScanError::Config {
            path: settings.config_file.clone(),
            reason: "file does not exist".to_string(),
        });
    }

    let data = fs::read_to_string(&path).map_err(|err| ScanError::Config {
        path: settings.config_file.clone(),
        reason: err.to_string(),
    })?;
    let value = serde_json::from_str(&data).map_err(|err| ScanError::Config {
        path: settings.config_file.clone(),
        reason: format!("cannot parse: {err}"),
    })?;

    Ok(ScannerConfig {
        path: Some(path),
        value,
    })
}
