//! Byte-capped output truncation, safe on UTF-8 boundaries.

pub(crate) const TRUNCATION_NOTICE: &str = "[output truncated]";

/// Longest prefix of `s` that fits in `max_bytes` without splitting a
/// character.
pub(crate) fn take_bytes_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Truncates `s` to `max_bytes`, appending a notice when anything was cut.
pub(crate) fn truncate_with_notice(s: &str, max_bytes: usize) -> String {
    let kept = take_bytes_at_char_boundary(s, max_bytes);
    if kept.len() == s.len() {
        return s.to_string();
    }
    let mut out = kept.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(TRUNCATION_NOTICE);
    out
}
