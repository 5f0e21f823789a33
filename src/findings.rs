//! # Scanner Data Model
//!
//! Canonical records for everything the Fixinator scanner returns:
//! - **Finding**: one issue at a document location, with optional fixes
//! - **Fix**: a suggested literal text replacement
//! - **ScanReport**: the `{results: [...]}` envelope both transports produce
//!
//! Scanner responses are inconsistent about field casing depending on which
//! engine produced them (`fixCode` vs `FIXCODE`, `replaceString` vs
//! `REPLACESTRING`). Normalization happens here, once, through serde aliases.
//! Nothing past deserialization ever branches on casing.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use tower_lsp::lsp_types::DiagnosticSeverity;

/// Finding id that historically received special range handling for
/// plain-text credential findings. See `mapping`.
pub const PLAIN_TEXT_KEY: &str = "plain-text-key";

/// One issue reported by the scanner for a specific document location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    #[serde(default, alias = "ID")]
    pub id: String,
    #[serde(default, alias = "TITLE")]
    pub title: String,
    #[serde(default, alias = "MESSAGE")]
    pub message: String,
    /// 0..=3 mapping to Hint/Information/Warning/Error.
    #[serde(
        default = "default_severity",
        alias = "SEVERITY",
        deserialize_with = "de_severity"
    )]
    pub severity: i64,
    /// 1-based line number.
    #[serde(default, alias = "LINE")]
    pub line: Option<u32>,
    /// 1-based column within the line, after indentation.
    #[serde(default, alias = "COLUMN")]
    pub column: Option<u32>,
    /// 0-based absolute character offset, sent by some scanner revisions
    /// instead of (or in addition to) line/column.
    #[serde(default, alias = "POSITION")]
    pub position: Option<usize>,
    /// The literal substring the finding refers to.
    #[serde(default, alias = "CONTEXT")]
    pub context: String,
    /// Documentation URI for the issue class.
    #[serde(default, alias = "LINK")]
    pub link: Option<String>,
    #[serde(default, alias = "FIXES")]
    pub fixes: Vec<Fix>,
}

impl Finding {
    pub fn is_fixable(&self) -> bool {
        !self.fixes.is_empty()
    }
}

/// A scanner-suggested literal text replacement that resolves a finding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Fix {
    /// 1-based absolute character offset of the text to replace.
    #[serde(default, alias = "REPLACEPOSITION")]
    pub replace_position: usize,
    #[serde(default, alias = "REPLACESTRING")]
    pub replace_string: String,
    /// Human label shown in the quick-fix menu.
    #[serde(default, alias = "FIXCODE")]
    pub fix_code: String,
}

/// The JSON envelope returned by both the HTTP API and the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScanReport {
    #[serde(default, alias = "RESULTS")]
    pub results: Vec<Finding>,
}

fn default_severity() -> i64 {
    1
}

/// Some scanner engines emit severity as a bare integer, others as a quoted
/// string. Accept both; anything unreadable degrades to Information.
fn de_severity<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = JsonValue::deserialize(deserializer)?;
    Ok(match value {
        JsonValue::Number(n) => n.as_i64().unwrap_or_else(default_severity),
        JsonValue::String(s) => s.trim().parse().unwrap_or_else(|_| default_severity()),
        _ => default_severity(),
    })
}

/// Remaps scanner severities to LSP diagnostic severities.
/// Out-of-range values degrade to Information rather than Error.
pub fn severity_to_lsp(severity: i64) -> DiagnosticSeverity {
    match severity {
        3 => DiagnosticSeverity::ERROR,
        2 => DiagnosticSeverity::WARNING,
        0 => DiagnosticSeverity::HINT,
        _ => DiagnosticSeverity::INFORMATION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_finding() {
        let json = r##"{
            "id": "sql-injection",
            "title": "SQL Injection",
            "message": "Unsanitized variable in query",
            "severity": 3,
            "line": 12,
            "column": 4,
            "context": "#form.id#",
            "link": "https://fixinator.app/docs/sql-injection",
            "fixes": [
                {"replacePosition": 120, "replaceString": "cfSqlType=\"cf_sql_integer\"", "fixCode": "Use cfqueryparam"}
            ]
        }"##;
        let finding: Finding = serde_json::from_str(json).expect("valid finding");
        assert_eq!(finding.id, "sql-injection");
        assert_eq!(finding.severity, 3);
        assert_eq!(finding.line, Some(12));
        assert_eq!(finding.context, "#form.id#");
        assert!(finding.is_fixable());
        assert_eq!(finding.fixes[0].replace_position, 120);
        assert_eq!(finding.fixes[0].fix_code, "Use cfqueryparam");
    }

    #[test]
    fn normalizes_upper_case_variant() {
        let json = r#"{
            "ID": "plain-text-key",
            "TITLE": "Plain text key",
            "MESSAGE": "Key stored in plain text",
            "SEVERITY": "2",
            "LINE": 3,
            "CONTEXT": "apiKey",
            "FIXES": [
                {"REPLACEPOSITION": 10, "REPLACESTRING": "safe()", "FIXCODE": "Replace with safe()"}
            ]
        }"#;
        let finding: Finding = serde_json::from_str(json).expect("valid finding");
        assert_eq!(finding.id, PLAIN_TEXT_KEY);
        assert_eq!(finding.title, "Plain text key");
        assert_eq!(finding.severity, 2);
        assert_eq!(finding.fixes[0].replace_string, "safe()");
        assert_eq!(finding.fixes[0].fix_code, "Replace with safe()");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let finding: Finding = serde_json::from_str(r#"{"id": "x"}"#).expect("valid finding");
        assert_eq!(finding.severity, 1);
        assert_eq!(finding.line, None);
        assert_eq!(finding.column, None);
        assert_eq!(finding.context, "");
        assert!(!finding.is_fixable());
    }

    #[test]
    fn severity_maps_bijectively() {
        assert_eq!(severity_to_lsp(0), DiagnosticSeverity::HINT);
        assert_eq!(severity_to_lsp(1), DiagnosticSeverity::INFORMATION);
        assert_eq!(severity_to_lsp(2), DiagnosticSeverity::WARNING);
        assert_eq!(severity_to_lsp(3), DiagnosticSeverity::ERROR);
    }

    #[test]
    fn out_of_range_severity_degrades_to_information() {
        assert_eq!(severity_to_lsp(7), DiagnosticSeverity::INFORMATION);
        assert_eq!(severity_to_lsp(-1), DiagnosticSeverity::INFORMATION);

        let finding: Finding =
            serde_json::from_str(r#"{"id": "x", "severity": "high"}"#).expect("valid finding");
        assert_eq!(finding.severity, 1);
    }

    #[test]
    fn parses_report_envelope() {
        let report: ScanReport =
            serde_json::from_str(r#"{"results": [{"id": "a"}, {"id": "b"}]}"#).expect("valid report");
        assert_eq!(report.results.len(), 2);

        let empty: ScanReport = serde_json::from_str(r#"{"results": []}"#).expect("valid report");
        assert!(empty.results.is_empty());
    }
}
