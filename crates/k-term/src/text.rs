// SPDX-License-Identifier: MIT
//
// Text measurement for the grid.
//
// A grid cell holds one codepoint, so a grapheme cluster is drawn as its
// first codepoint and measured the same way: width 2 if that codepoint is
// wide, 1 otherwise. Combining marks and zero-width joiners ride along in
// the cluster and are dropped on output. Measuring here and placing in
// `Grid::put_str` with the same rule keeps truncation and drawing in step.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthChar;

/// Columns a grapheme cluster occupies once placed in the grid.
#[must_use]
pub fn grapheme_width(grapheme: &str) -> u16 {
    match grapheme.chars().next() {
        None => 0,
        Some(c) if c.width() == Some(2) => 2,
        Some(_) => 1,
    }
}

/// Columns a string occupies once placed in the grid.
#[must_use]
pub fn str_width(text: &str) -> usize {
    text.graphemes(true)
        .map(|g| usize::from(grapheme_width(g)))
        .sum()
}

/// Longest prefix of `text` that fits in `max` columns, cut at a grapheme
/// boundary. A wide cluster that would straddle the limit is left out.
#[must_use]
pub fn truncate(text: &str, max: usize) -> &str {
    let mut used = 0;
    for (idx, g) in text.grapheme_indices(true) {
        let w = usize::from(grapheme_width(g));
        if used + w > max {
            return &text[..idx];
        }
        used += w;
    }
    text
}

/// Like [`truncate`], but marks a cut with a trailing `…`.
///
/// ```
/// use k_term::text::truncate_with_ellipsis;
///
/// assert_eq!(truncate_with_ellipsis("hello world", 6), "hello…");
/// assert_eq!(truncate_with_ellipsis("short", 10), "short");
/// ```
#[must_use]
pub fn truncate_with_ellipsis(text: &str, max: usize) -> String {
    if str_width(text) <= max {
        return text.to_owned();
    }
    if max == 0 {
        return String::new();
    }
    let mut out = truncate(text, max - 1).to_owned();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_width() {
        assert_eq!(str_width("hello"), 5);
        assert_eq!(str_width(""), 0);
    }

    #[test]
    fn cjk_width() {
        assert_eq!(str_width("世界"), 4);
        assert_eq!(str_width("a世b"), 4);
    }

    #[test]
    fn combining_mark_rides_along() {
        // e + combining acute is one cluster, one column.
        assert_eq!(str_width("e\u{0301}"), 1);
        assert_eq!(grapheme_width("e\u{0301}"), 1);
    }

    #[test]
    fn truncate_fits_untouched() {
        assert_eq!(truncate("abc", 3), "abc");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn truncate_cuts_at_width() {
        assert_eq!(truncate("abcdef", 4), "abcd");
        assert_eq!(truncate("abc", 0), "");
    }

    #[test]
    fn truncate_never_splits_wide_char() {
        // "a世" is 3 columns; with 2 the wide char does not fit.
        assert_eq!(truncate("a世b", 2), "a");
        assert_eq!(truncate("a世b", 3), "a世");
    }

    #[test]
    fn truncate_keeps_clusters_whole() {
        let s = "e\u{0301}x";
        assert_eq!(truncate(s, 1), "e\u{0301}");
    }

    #[test]
    fn ellipsis() {
        assert_eq!(truncate_with_ellipsis("abcdef", 4), "abc…");
        assert_eq!(truncate_with_ellipsis("abcdef", 1), "…");
        assert_eq!(truncate_with_ellipsis("abcdef", 0), "");
        assert_eq!(truncate_with_ellipsis("abc", 3), "abc");
    }

    #[test]
    fn ellipsis_after_wide() {
        // 3 columns of budget: "世" (2) + "…" (1).
        assert_eq!(truncate_with_ellipsis("世界世界", 3), "世…");
        // 4 columns: "世" + "…" since "世界" would leave no room.
        assert_eq!(truncate_with_ellipsis("世界世界", 4), "世…");
    }
}
