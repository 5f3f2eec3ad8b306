// src/mcp/names.rs
// Tool name sanitization for cross-server routing

use sha2::{Digest, Sha256};

/// Longest tool name function-calling providers accept.
pub const MAX_TOOL_NAME_LEN: usize = 64;

/// Hex digits of the disambiguating hash suffix.
const HASH_HEX_LEN: usize = 6;

/// Room reserved at the tail when truncating: separator plus a full 16-hex
/// hash budget, so `<prefix>_<hash>` lands under the cap with margin.
const SUFFIX_RESERVE: usize = 17;

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ':')
}

fn hash_hex(server: &str, original: &str, len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(server.as_bytes());
    hasher.update(b"__");
    hasher.update(original.as_bytes());
    let digest = hasher.finalize();
    digest
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()[..len]
        .to_string()
}

/// Build the globally-routable name for a server's tool:
/// `<server>__<original>`, cleaned to `[A-Za-z0-9_.\-:]`, forced to start
/// with a letter or underscore, and capped at 64 chars with a hash suffix
/// keeping long names distinct.
pub fn sanitize_tool_name(server: &str, original: &str) -> String {
    let raw = format!("{}__{}", server, original);
    let mut cleaned: String = raw
        .chars()
        .map(|c| if is_allowed(c) { c } else { '_' })
        .collect();

    if !cleaned
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false)
    {
        cleaned.insert(0, '_');
    }

    if cleaned.len() > MAX_TOOL_NAME_LEN {
        let keep = MAX_TOOL_NAME_LEN - SUFFIX_RESERVE;
        let prefix: String = cleaned.chars().take(keep).collect();
        cleaned = format!("{}_{}", prefix, hash_hex(server, original, HASH_HEX_LEN));
    }

    cleaned
}

/// A longer-suffix variant used when two distinct tools collide after
/// sanitization (same truncated prefix, same 6-hex suffix).
pub fn sanitize_tool_name_extended(server: &str, original: &str) -> String {
    let base = sanitize_tool_name(server, original);
    let keep = MAX_TOOL_NAME_LEN - SUFFIX_RESERVE;
    let prefix: String = base.chars().take(keep).collect();
    format!("{}_{}", prefix, hash_hex(server, original, 12))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_shape(name: &str) -> bool {
        name.len() <= MAX_TOOL_NAME_LEN
            && name
                .chars()
                .next()
                .map(|c| c.is_ascii_alphabetic() || c == '_')
                .unwrap_or(false)
            && name.chars().all(is_allowed)
    }

    #[test]
    fn test_short_names_untouched() {
        assert_eq!(sanitize_tool_name("ga", "run_report"), "ga__run_report");
    }

    #[test]
    fn test_bad_chars_replaced() {
        let name = sanitize_tool_name("my server", "tool/call!");
        assert_eq!(name, "my_server__tool_call_");
        assert!(valid_shape(&name));
    }

    #[test]
    fn test_numeric_prefix_gets_underscore() {
        let name = sanitize_tool_name("42shop", "list");
        assert!(name.starts_with('_'));
        assert!(valid_shape(&name));
    }

    #[test]
    fn test_long_name_truncated_with_hash_suffix() {
        let name = sanitize_tool_name(
            "very-long-server-name",
            "extremely_long_and_detailed_tool_name_that_exceeds_budget",
        );
        assert!(name.len() <= MAX_TOOL_NAME_LEN);
        assert!(name.starts_with("very-long-server-name__extremely_long_and_detai_"));
        let suffix = name.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), HASH_HEX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_long_names_stay_distinct() {
        let a = sanitize_tool_name("server", &format!("{}_alpha", "x".repeat(80)));
        let b = sanitize_tool_name("server", &format!("{}_omega", "x".repeat(80)));
        assert_ne!(a, b);
    }

    #[test]
    fn test_sanitize_is_deterministic() {
        let a = sanitize_tool_name("srv", &"y".repeat(100));
        let b = sanitize_tool_name("srv", &"y".repeat(100));
        assert_eq!(a, b);
    }

    #[test]
    fn test_extended_suffix_longer() {
        let long = "z".repeat(100);
        let base = sanitize_tool_name("srv", &long);
        let ext = sanitize_tool_name_extended("srv", &long);
        assert_ne!(base, ext);
        assert!(ext.len() <= MAX_TOOL_NAME_LEN);
        assert_eq!(ext.rsplit('_').next().unwrap().len(), 12);
    }
}
