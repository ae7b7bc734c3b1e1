//! Logging utilities with credential protection
//!
//! Bearer tokens must never reach a log line in full. These helpers mask
//! credentials in single values, free text and header maps.

use std::collections::{BTreeMap, HashMap};

const BEARER_PREFIX: &str = "Bearer ";

/// Obscures a credential string by showing only the first few characters
///
/// # Examples
///
/// ```rust
/// use agentcore_mcp::utils::logging::obscure_credential;
///
/// let token = "eyJhbGciOiJSUzI1NiJ9.payload.signature";
/// assert_eq!(obscure_credential(token), "eyJhb***");
/// assert_eq!(obscure_credential("short"), "*****");
/// ```
pub fn obscure_credential(credential: &str) -> String {
    let char_count = credential.chars().count();
    if char_count <= 5 {
        "*".repeat(char_count)
    } else {
        format!("{}***", truncate_string(credential, 5))
    }
}

/// Safely truncates a string to a maximum number of characters, respecting UTF-8 boundaries
///
/// ```rust
/// use agentcore_mcp::utils::logging::truncate_string;
///
/// assert_eq!(truncate_string("héllo wörld", 7), "héllo w");
/// assert_eq!(truncate_string("Short", 100), "Short");
/// ```
pub fn truncate_string(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Obscure every `Bearer <token>` occurrence in free text
pub fn sanitize_for_logging(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find(BEARER_PREFIX) {
        let token_start = start + BEARER_PREFIX.len();
        result.push_str(&rest[..token_start]);

        let token_len = rest[token_start..]
            .find(|c: char| c.is_whitespace() || c == '"' || c == ',')
            .unwrap_or(rest.len() - token_start);
        result.push_str(&obscure_credential(&rest[token_start..token_start + token_len]));
        rest = &rest[token_start + token_len..];
    }
    result.push_str(rest);
    result
}

/// Header map safe to log, sorted by name, with the `authorization` value obscured
pub fn masked_headers(headers: &HashMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if name.eq_ignore_ascii_case("authorization") {
                match value.strip_prefix(BEARER_PREFIX) {
                    Some(token) => format!("{}{}", BEARER_PREFIX, obscure_credential(token)),
                    None => obscure_credential(value),
                }
            } else {
                value.clone()
            };
            (name.clone(), shown)
        })
        .collect()
}
