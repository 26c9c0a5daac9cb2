use regex::Regex;
use std::sync::OnceLock;

pub const MIN_PRIORITY: i64 = 1;
pub const MAX_PRIORITY: i64 = 999_999;

fn hex_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9a-f]+").expect("regex for hash hex"))
}

fn location_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z]{2}").expect("regex for location code"))
}

/// True when `s` is non-empty and contains a run of lowercase hex digits.
///
/// The match is unanchored: `"abc!"` passes. Use [`is_strict_hex`] for a
/// full-string check.
pub fn validate_hash_hex(s: &str) -> bool {
    !s.is_empty() && hex_pattern().is_match(s)
}

/// True when every character of a non-empty `s` is a lowercase hex digit.
pub fn is_strict_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// ISO 3166-1 style location: two lowercase letters found anywhere in `s`.
pub fn validate_location(s: &str) -> bool {
    location_pattern().is_match(s)
}

pub fn clamp_priority(n: i64) -> i64 {
    n.clamp(MIN_PRIORITY, MAX_PRIORITY)
}

/// Reject paths a client must not reproduce: absolute paths (including
/// `\`-rooted and drive-letter forms on every host) and any `.` or `..`
/// segment.
pub fn validate_relative_path(p: &str) -> bool {
    if p.is_empty() || std::path::Path::new(p).is_absolute() {
        return false;
    }
    if p.starts_with('/') || p.starts_with('\\') || has_drive_prefix(p) {
        return false;
    }
    // Path::components folds interior "." away, so split by hand
    !p.split(['/', '\\']).any(|seg| seg == "." || seg == "..")
}

fn has_drive_prefix(p: &str) -> bool {
    let b = p.as_bytes();
    b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':'
}
