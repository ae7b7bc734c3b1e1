//! Repair of JSON-RPC payloads containing unquoted UUID literals
//!
//! Some deployed MCP endpoints emit request ids and error fields as bare
//! UUIDs (`"id":550e8400-e29b-41d4-a716-446655440000`), which no strict JSON
//! parser accepts. [`fix_uuid_format`] rewrites such text into valid JSON by
//! running an ordered cascade of quoting passes:
//!
//! 1. a UUID directly after `"id":`
//! 2. a UUID directly before `}`
//! 3. a UUID inside an `"error...` segment before `}`
//! 4. a UUID bounded on both sides by non-structural characters
//! 5. a UUID at the end of the text
//! 6. a UUID at the start of the text
//! 7. quote insertion at a fixed offset for one known malformed error shape
//!
//! Order matters: earlier passes quote the unambiguous cases so later, more
//! general passes do not bracket an already-fixed literal twice. Text that
//! already parses is returned untouched, and the cascade never fails; if the
//! result still does not parse it is logged and returned as-is.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Canonical lowercase 8-4-4-4-12 UUID
pub const UUID_PATTERN: &str =
    "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}";

/// Parser column reported for the malformed error shape handled by pass 7
const KNOWN_ERROR_COLUMN: usize = 116;
/// Pass 7 only applies to payloads longer than this
const KNOWN_ERROR_MIN_LEN: usize = 120;

fn uuid_regex(template: &str) -> Option<Regex> {
    Regex::new(&template.replace("UUID", UUID_PATTERN))
        .map_err(|e| warn!("Invalid UUID rewrite pattern {}: {}", template, e))
        .ok()
}

static ID_FIELD: Lazy<Option<Regex>> = Lazy::new(|| uuid_regex(r#""id":(UUID)"#));
static BEFORE_BRACE: Lazy<Option<Regex>> = Lazy::new(|| uuid_regex(r"(UUID)\}"));
static IN_ERROR: Lazy<Option<Regex>> =
    Lazy::new(|| uuid_regex(r#""error([^"]*?)(UUID)\}"#));
static BOUNDED: Lazy<Option<Regex>> =
    Lazy::new(|| uuid_regex(r#"([^":\s,\{\[])(UUID)([^":\s,\}\]])"#));
static AT_END: Lazy<Option<Regex>> =
    Lazy::new(|| uuid_regex(r#"([^":\s,\{\[])(UUID)$"#));
static AT_START: Lazy<Option<Regex>> =
    Lazy::new(|| uuid_regex(r#"^(UUID)([^":\s,\}\]])"#));

/// Quote bare UUID literals so `text` parses as JSON
pub fn fix_uuid_format(text: &str) -> String {
    if is_valid_json(text) {
        return text.to_string();
    }

    let fixed = apply_rewrite_passes(text);

    match serde_json::from_str::<serde_json::Value>(&fixed) {
        Ok(_) => {
            if fixed != text {
                debug!("Quoted bare UUID literals in inbound payload");
            }
        }
        Err(e) => warn!("Payload still invalid after UUID repair: {}", e),
    }
    fixed
}

/// Byte-oriented variant of [`fix_uuid_format`]
///
/// Invalid UTF-8 is replaced lossily before repair.
pub fn fix_uuid_bytes(payload: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(payload);
    fix_uuid_format(&text).into_bytes()
}

pub(crate) fn apply_rewrite_passes(text: &str) -> String {
    let passes: [(&Option<Regex>, &str); 6] = [
        (&*ID_FIELD, r#""id":"${1}""#),
        (&*BEFORE_BRACE, r#""${1}"}"#),
        (&*IN_ERROR, r#""error${1}"${2}"}"#),
        (&*BOUNDED, r#"${1}"${2}"${3}"#),
        (&*AT_END, r#"${1}"${2}""#),
        (&*AT_START, r#""${1}"${2}"#),
    ];

    let mut fixed = text.to_string();
    for (pattern, replacement) in passes {
        if let Some(pattern) = pattern {
            fixed = pattern.replace_all(&fixed, replacement).into_owned();
        }
    }
    apply_known_offset_fix(fixed)
}

// Pass 7: one observed error payload breaks at a fixed column with the
// opening and closing quotes of a value missing.
fn apply_known_offset_fix(text: String) -> String {
    if !text.contains("error") || text.chars().count() <= KNOWN_ERROR_MIN_LEN {
        return text;
    }
    match serde_json::from_str::<serde_json::Value>(&text) {
        Err(e) if e.line() == 1 && e.column() == KNOWN_ERROR_COLUMN => {
            let mut chars: Vec<char> = text.chars().collect();
            if chars[KNOWN_ERROR_COLUMN - 1] != '"' {
                chars.insert(KNOWN_ERROR_COLUMN - 1, '"');
            }
            if chars[KNOWN_ERROR_COLUMN + 1] != '"' {
                chars.insert(KNOWN_ERROR_COLUMN + 1, '"');
            }
            debug!("Applied fixed-offset quote repair at column {}", KNOWN_ERROR_COLUMN);
            chars.into_iter().collect()
        }
        _ => text,
    }
}

/// Insert quotes around the position a parser reported an error at
///
/// `line` and `column` are 1-based, as reported by `serde_json`. A quote is
/// inserted before the offending character and another after it, unless
/// the neighbouring characters are quotes already. Positions outside the text leave it
/// unchanged.
pub fn emergency_fix(text: &str, line: usize, column: usize) -> String {
    let Some(pos) = char_offset(text, line, column) else {
        return text.to_string();
    };
    let mut chars: Vec<char> = text.chars().collect();
    if pos == 0 || pos >= chars.len() {
        return text.to_string();
    }
    // Opening quote before the offending character shifts it to `pos`.
    let mut closing = pos;
    if chars[pos - 1] != '"' {
        chars.insert(pos - 1, '"');
        closing += 1;
    }
    if closing < chars.len() && chars[closing] != '"' {
        chars.insert(closing, '"');
    }
    chars.into_iter().collect()
}

/// Up to 20 characters either side of a parse error, marked with `[HERE]`
pub fn error_context(text: &str, line: usize, column: usize) -> String {
    const RADIUS: usize = 20;
    let chars: Vec<char> = text.chars().collect();
    let pos = char_offset(text, line, column)
        .map(|p| p.saturating_sub(1))
        .unwrap_or(chars.len())
        .min(chars.len());
    let start = pos.saturating_sub(RADIUS);
    let end = (pos + RADIUS).min(chars.len());

    let before: String = chars[start..pos].iter().collect();
    let after: String = chars[pos..end].iter().collect();
    format!("...{}[HERE]{}...", before, after)
}

/// Character offset for a 1-based (line, byte column) position
fn char_offset(text: &str, line: usize, column: usize) -> Option<usize> {
    if line == 0 {
        return None;
    }
    let mut line_start = 0;
    for _ in 1..line {
        line_start += text[line_start..].find('\n')? + 1;
    }
    let byte_pos = (line_start + column).min(text.len());
    Some(
        text.char_indices()
            .take_while(|(i, _)| *i < byte_pos)
            .count(),
    )
}

fn is_valid_json(text: &str) -> bool {
    serde_json::from_str::<serde::de::IgnoredAny>(text).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const U: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn parses(text: &str) -> bool {
        serde_json::from_str::<serde_json::Value>(text).is_ok()
    }

    #[test]
    fn test_bare_id_is_quoted() {
        let raw = format!(r#"{{"jsonrpc":"2.0","id":{},"result":{{}}}}"#, U);
        let fixed = fix_uuid_format(&raw);

        assert!(parses(&fixed));
        let value: serde_json::Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(value["id"], U);
    }

    #[test]
    fn test_valid_payloads_are_untouched() {
        let samples = [
            format!(r#"{{"jsonrpc":"2.0","id":"{}","result":{{"tools":[]}}}}"#, U),
            format!(r#"{{"jsonrpc":"2.0","id":1,"result":{{"note":"ref-{}x"}}}}"#, U),
            r#"{"jsonrpc":"2.0","method":"notifications/progress","params":{}}"#.to_string(),
        ];
        for sample in samples {
            assert_eq!(fix_uuid_format(&sample), sample);
            assert_eq!(fix_uuid_format(&fix_uuid_format(&sample)), sample);
        }
    }

    #[test]
    fn test_uuid_before_closing_brace() {
        let raw = format!(r#"{{"session":{}}}"#, U);
        let fixed = fix_uuid_format(&raw);
        assert_eq!(fixed, format!(r#"{{"session":"{}"}}"#, U));
    }

    #[test]
    fn test_error_segment_pass() {
        // Pass 2 normally claims the brace first; exercise pass 3 directly.
        let text = format!(r#"{{"error: lookup failed for {}}}"#, U);
        let after_error = IN_ERROR.as_ref().unwrap().replace_all(&text, r#""error${1}"${2}"}"#);
        assert_eq!(
            after_error,
            format!(r#"{{"error: lookup failed for "{}"}}"#, U)
        );
    }

    #[test]
    fn test_bounded_and_edge_passes() {
        let fixed = apply_rewrite_passes(&format!("a{}b", U));
        assert_eq!(fixed, format!(r#"a"{}"b"#, U));

        let fixed = apply_rewrite_passes(&format!("a{}", U));
        assert_eq!(fixed, format!(r#"a"{}""#, U));

        let fixed = apply_rewrite_passes(&format!("{}b", U));
        assert_eq!(fixed, format!(r#""{}"b"#, U));
    }

    #[test]
    fn test_uppercase_uuid_is_not_matched() {
        let upper = U.to_uppercase();
        let raw = format!(r#"{{"id":{}}}"#, upper);
        assert_eq!(fix_uuid_format(&raw), raw);
    }

    #[test]
    fn test_bytes_entry_point() {
        let raw = format!(r#"{{"jsonrpc":"2.0","id":{},"result":{{}}}}"#, U);
        let fixed = fix_uuid_bytes(raw.as_bytes());
        assert!(serde_json::from_slice::<serde_json::Value>(&fixed).is_ok());
    }

    #[test]
    fn test_unrepairable_text_is_returned() {
        let raw = "{{{ definitely not json";
        assert_eq!(fix_uuid_format(raw), raw);
    }

    #[test]
    fn test_emergency_fix_quotes_reported_column() {
        let raw = r#"{"a":bc}"#;
        let err = serde_json::from_str::<serde_json::Value>(raw).unwrap_err();
        let fixed = emergency_fix(raw, err.line(), err.column());
        assert!(fixed.matches('"').count() > raw.matches('"').count());
        assert_eq!(emergency_fix(raw, 1, 0), raw);
        assert_eq!(emergency_fix(raw, 1, 500), raw);
        assert_eq!(emergency_fix(raw, 0, 3), raw);
    }

    #[test]
    fn test_emergency_fix_insertion_positions() {
        assert_eq!(emergency_fix("abcdef", 1, 3), r#"ab"c"def"#);
        assert_eq!(emergency_fix(r#"ab"cdef"#, 1, 3), r#"ab""cdef"#);
    }

    #[test]
    fn test_emergency_fix_wraps_bare_token() {
        let raw = r#"{"a":x}"#;
        let err = serde_json::from_str::<serde_json::Value>(raw).unwrap_err();
        assert_eq!((err.line(), err.column()), (1, 6));

        let fixed = emergency_fix(raw, err.line(), err.column());
        assert_eq!(fixed, r#"{"a":"x"}"#);
        assert!(parses(&fixed));
    }

    #[test]
    fn test_known_offset_fix_quotes_column_116() {
        let raw = format!(r#"{{"error":"{}","code":x,"data":"zzzz"}}"#, "a".repeat(96));
        assert!(raw.chars().count() > KNOWN_ERROR_MIN_LEN);
        let err = serde_json::from_str::<serde_json::Value>(&raw).unwrap_err();
        assert_eq!(err.column(), KNOWN_ERROR_COLUMN);

        let fixed = apply_known_offset_fix(raw.clone());
        let chars: Vec<char> = fixed.chars().collect();
        assert_eq!(chars[115], '"');
        assert_eq!(chars[116], 'x');
        assert_eq!(chars[117], '"');

        let value: serde_json::Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(value["code"], "x");
    }

    #[test]
    fn test_known_offset_fix_leaves_quoted_position() {
        let raw = format!(r#"{{"error":"{}","code":1"x","data":"zzzz"}}"#, "a".repeat(95));
        let err = serde_json::from_str::<serde_json::Value>(&raw).unwrap_err();
        assert_eq!(err.column(), KNOWN_ERROR_COLUMN);
        assert_eq!(raw.chars().nth(115), Some('"'));

        assert_eq!(apply_known_offset_fix(raw.clone()), raw);
    }

    #[test]
    fn test_known_offset_fix_skips_short_payloads() {
        let raw = r#"{"error":x}"#.to_string();
        assert_eq!(apply_known_offset_fix(raw.clone()), raw);
    }

    #[test]
    fn test_error_context_marks_position() {
        let text = "0123456789abcdefghijklmnopqrstuvwxyz0123456789";
        let context = error_context(text, 1, 26);
        assert_eq!(context, "...56789abcdefghijklmno[HERE]pqrstuvwxyz012345678...");
    }

    #[test]
    fn test_char_offset_on_later_lines() {
        assert_eq!(char_offset("ab\ncd", 2, 1), Some(4));
        assert_eq!(char_offset("ab", 3, 1), None);
    }
}
