/// Finds the sequence of `pattern` lines within `lines`, beginning at or
/// after `start`. Returns the starting index of the match, or `None`.
///
/// Matches are attempted with decreasing strictness: exact first, then
/// ignoring trailing whitespace, then ignoring whitespace on both sides.
/// When `eof` is true the match is first attempted anchored at the end of the
/// file, falling back to a forward search from `start`.
///
/// An empty `pattern` matches at `start`; a pattern longer than the input
/// never matches.
pub(crate) fn seek_sequence(
    lines: &[String],
    pattern: &[String],
    start: usize,
    eof: bool,
) -> Option<usize> {
    if pattern.is_empty() {
        return Some(start);
    }
    if pattern.len() > lines.len() {
        return None;
    }
    let search_start = if eof {
        lines.len() - pattern.len()
    } else {
        start
    };

    let window_matches = |at: usize, eq: fn(&str, &str) -> bool| {
        pattern
            .iter()
            .enumerate()
            .all(|(offset, want)| eq(&lines[at + offset], want))
    };

    let passes: [fn(&str, &str) -> bool; 3] = [
        |line, want| line == want,
        |line, want| line.trim_end() == want.trim_end(),
        |line, want| line.trim() == want.trim(),
    ];
    for eq in passes {
        for i in search_start..=lines.len() - pattern.len() {
            if window_matches(i, eq) {
                return Some(i);
            }
        }
    }
    None
}
