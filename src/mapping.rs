//! # Coordinate Mapper
//!
//! Converts a scanner finding into an LSP text range. The scanner uses two
//! incompatible location encodings across its transports:
//! - 1-based `line`/`column` plus a `context` substring, where `column`
//!   counts from the first non-whitespace character of the line
//! - a 1-based absolute character offset carried on a fix (`replacePosition`)
//!
//! When a finding carries fixes, the fix-based range wins so that the quick
//! fix replaces exactly the suggested span. Fixes are single-line.
//!
//! Columns in the returned ranges are UTF-16 code units, as the protocol
//! requires; scanner offsets count characters.

use thiserror::Error;
use tower_lsp::lsp_types::{Position, Range};

use crate::findings::{Finding, PLAIN_TEXT_KEY};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("finding references line {line} but the document has {line_count} lines")]
    LineOutOfBounds { line: u32, line_count: usize },
    #[error("finding references offset {offset} but the document has {len} characters")]
    OffsetOutOfBounds { offset: usize, len: usize },
}

/// Maps one finding to a half-open single-line range in `text`.
///
/// `plain_text_key_to_eol` selects the end-of-line rule for
/// `plain-text-key` findings; when disabled they map like any other
/// line/column finding.
///
/// A finding past the end of the document is a scanner error; it fails with
/// [`MappingError`] so the caller can skip that finding alone.
pub fn map_finding_to_range(
    text: &str,
    finding: &Finding,
    plain_text_key_to_eol: bool,
) -> Result<Range, MappingError> {
    // Fix-based range: the first fix knows exactly what span it replaces.
    if let Some(fix) = finding.fixes.first() {
        let offset = fix.replace_position.saturating_sub(1);
        let start = char_offset_to_position(text, offset).ok_or(MappingError::OffsetOutOfBounds {
            offset,
            len: text.chars().count(),
        })?;
        let end = Position::new(start.line, start.character + utf16_len(&fix.replace_string));
        return Ok(Range::new(start, end));
    }

    // Plain-text-key findings report columns relative to the raw key value,
    // which lands mid-token with the standard rule. The policy selects to the
    // end of the line from the finding's absolute offset instead.
    if plain_text_key_to_eol
        && finding.id == PLAIN_TEXT_KEY
        && let Some(offset) = finding.position
    {
        let start = char_offset_to_position(text, offset).ok_or(MappingError::OffsetOutOfBounds {
            offset,
            len: text.chars().count(),
        })?;
        let line_text = text.lines().nth(start.line as usize).unwrap_or("");
        let end = Position::new(start.line, utf16_len(line_text).max(start.character));
        return Ok(Range::new(start, end));
    }

    // Line/column range: 1-based to 0-based, column counted from the line's
    // indentation, width taken from the context substring.
    let line = finding.line.unwrap_or(0).saturating_sub(1);
    let Some(line_text) = text.lines().nth(line as usize) else {
        return Err(MappingError::LineOutOfBounds {
            line,
            line_count: text.lines().count(),
        });
    };

    let indent = line_indent(line_text);
    let character = indent + finding.column.unwrap_or(1);
    let end_character = character + utf16_len(&finding.context);

    Ok(Range::new(
        Position::new(line, character),
        Position::new(line, end_character),
    ))
}

/// Convert a character offset to an LSP position (line, UTF-16 column).
/// Returns `None` when the offset lies past the end of the text.
pub fn char_offset_to_position(text: &str, offset: usize) -> Option<Position> {
    let mut line = 0u32;
    let mut col = 0u32;
    let mut seen = 0usize;

    for ch in text.chars() {
        if seen == offset {
            return Some(Position::new(line, col));
        }
        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += ch.len_utf16() as u32;
        }
        seen += 1;
    }

    (seen == offset).then_some(Position::new(line, col))
}

/// UTF-16 length of the leading whitespace of a line.
pub fn line_indent(line: &str) -> u32 {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| c.len_utf16() as u32)
        .sum()
}

fn utf16_len(s: &str) -> u32 {
    s.chars().map(|c| c.len_utf16() as u32).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::Fix;

    fn finding(line: u32, column: u32, context: &str) -> Finding {
        Finding {
            id: "sql-injection".to_string(),
            title: String::new(),
            message: String::new(),
            severity: 2,
            line: Some(line),
            column: Some(column),
            position: None,
            context: context.to_string(),
            link: None,
            fixes: Vec::new(),
        }
    }

    fn with_fix(mut base: Finding, replace_position: usize, replace_string: &str) -> Finding {
        base.fixes.push(Fix {
            replace_position,
            replace_string: replace_string.to_string(),
            fix_code: "fix".to_string(),
        });
        base
    }

    #[test]
    fn line_column_range_counts_from_indent() {
        // Line 3 is "  foo = bar" with a 2-space indent.
        let text = "a\nb\n  foo = bar\n";
        let range = map_finding_to_range(text, &finding(3, 2, "foo"), false).expect("mappable");
        assert_eq!(range.start, Position::new(2, 4));
        assert_eq!(range.end, Position::new(2, 7));
    }

    #[test]
    fn range_width_equals_context_length() {
        let text = "    <cfquery>\n";
        let range = map_finding_to_range(text, &finding(1, 3, "cfquery"), false).expect("mappable");
        assert_eq!(range.start.line, range.end.line);
        assert_eq!(range.end.character - range.start.character, 7);
    }

    #[test]
    fn missing_column_and_context_take_defaults() {
        let text = "  x\n";
        let mut f = finding(1, 1, "");
        f.column = None;
        f.context = String::new();
        let range = map_finding_to_range(text, &f, false).expect("mappable");
        assert_eq!(range.start, Position::new(0, 3));
        assert_eq!(range.end, Position::new(0, 3));
        assert!(range.start <= range.end);
    }

    #[test]
    fn fix_based_range_wins_over_line_column() {
        // Offset 9 is the 'j' on the second line; "safe()" spans 6 characters.
        let text = "12345678\njunk here\n";
        let f = with_fix(finding(1, 1, "ignored"), 10, "safe()");
        let range = map_finding_to_range(text, &f, false).expect("mappable");
        assert_eq!(range.start, Position::new(1, 0));
        assert_eq!(range.end, Position::new(1, 6));
    }

    #[test]
    fn fix_position_is_one_based() {
        let text = "abcdef\n";
        let f = with_fix(finding(1, 1, ""), 3, "XY");
        let range = map_finding_to_range(text, &f, false).expect("mappable");
        assert_eq!(range.start, Position::new(0, 2));
        assert_eq!(range.end, Position::new(0, 4));

        // replacePosition 0 clamps to the start of the document.
        let f = with_fix(finding(1, 1, ""), 0, "X");
        let range = map_finding_to_range(text, &f, false).expect("mappable");
        assert_eq!(range.start, Position::new(0, 0));
    }

    #[test]
    fn line_past_end_of_document_fails() {
        let text = "one line\n";
        let err = map_finding_to_range(text, &finding(5, 1, "x"), false).unwrap_err();
        assert_eq!(
            err,
            MappingError::LineOutOfBounds {
                line: 4,
                line_count: 1
            }
        );
    }

    #[test]
    fn fix_offset_past_end_of_document_fails() {
        let text = "short";
        let f = with_fix(finding(1, 1, ""), 100, "x");
        assert!(matches!(
            map_finding_to_range(text, &f, false).unwrap_err(),
            MappingError::OffsetOutOfBounds { offset: 99, .. }
        ));
    }

    #[test]
    fn plain_text_key_policy_disabled_uses_standard_rule() {
        let text = "  key = \"hunter2\"\n";
        let mut f = finding(1, 2, "key");
        f.id = PLAIN_TEXT_KEY.to_string();
        f.position = Some(2);
        let range = map_finding_to_range(text, &f, false).expect("mappable");
        assert_eq!(range.start, Position::new(0, 4));
        assert_eq!(range.end, Position::new(0, 7));
    }

    #[test]
    fn plain_text_key_policy_enabled_selects_to_end_of_line() {
        let text = "  key = \"hunter2\"\nnext\n";
        let mut f = finding(1, 2, "key");
        f.id = PLAIN_TEXT_KEY.to_string();
        f.position = Some(2);
        let range = map_finding_to_range(text, &f, true).expect("mappable");
        assert_eq!(range.start, Position::new(0, 2));
        assert_eq!(range.end, Position::new(0, 17));
    }

    #[test]
    fn char_offset_walks_lines_and_wide_chars() {
        let text = "ab\ncd";
        assert_eq!(char_offset_to_position(text, 0), Some(Position::new(0, 0)));
        assert_eq!(char_offset_to_position(text, 2), Some(Position::new(0, 2)));
        assert_eq!(char_offset_to_position(text, 3), Some(Position::new(1, 0)));
        assert_eq!(char_offset_to_position(text, 5), Some(Position::new(1, 2)));
        assert_eq!(char_offset_to_position(text, 6), None);

        // '😀' is one character but two UTF-16 units.
        let wide = "😀x";
        assert_eq!(char_offset_to_position(wide, 1), Some(Position::new(0, 2)));
    }
}
