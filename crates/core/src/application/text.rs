// Text helpers for bounded log and error payloads

/// Longest prefix of `s` holding at most `max_chars` characters
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
