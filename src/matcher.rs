//! Delimiter search used by `recv_until`.
//!
//! Implements the "earliest occurrence, first delimiter wins ties" rule
//! and the tail-window re-scan optimization: callers only need to search
//! the last `longest_delim - 1` previously-scanned bytes plus whatever is
//! newly appended, rather than the whole accumulated buffer every time.

/// The length of the longest delimiter, used to size the tail window.
pub(crate) fn longest_len(delims: &[Vec<u8>]) -> usize {
    delims.iter().map(|d| d.len()).max().unwrap_or(0)
}

/// Finds the earliest occurrence of any delimiter in `haystack`, only
/// considering matches that start at or after `search_from`. Ties (two
/// delimiters starting at the same position) are broken by the
/// delimiter's index in `delims` (first wins).
///
/// Returns `(start, delim_index)` of the winning match.
pub(crate) fn find_earliest(
    haystack: &[u8],
    delims: &[Vec<u8>],
    search_from: usize,
) -> Option<(usize, usize)> {
    let search_from = search_from.min(haystack.len());
    let mut best: Option<(usize, usize)> = None;
    for (idx, delim) in delims.iter().enumerate() {
        if delim.is_empty() || delim.len() > haystack.len() - search_from {
            continue;
        }
        if let Some(rel) = find_subslice(&haystack[search_from..], delim) {
            let abs = rel + search_from;
            best = Some(match best {
                Some((b_pos, b_idx)) if b_pos < abs || (b_pos == abs && b_idx <= idx) => {
                    (b_pos, b_idx)
                }
                _ => (abs, idx),
            });
        }
    }
    best
}

pub(crate) fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Whether `needle` occurs anywhere in `haystack` (used by
/// `recv_line_contains`).
pub(crate) fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    find_subslice(haystack, needle).is_some()
}
