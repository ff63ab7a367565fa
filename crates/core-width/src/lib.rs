//! Unicode decoding, grapheme classification, and display-width computation
//! for the text-buffer engine.
//!
//! Every width decision elsewhere in the workspace flows through
//! [`egc_width`] or [`clusters`] so that terminal column accounting stays
//! centralized and consistent across the rope, the view, and cursor motion.

mod classify;
pub mod segment;

pub use segment::{Cluster, clusters};

use classify::{classify, width_for_kind};

/// Selects how grapheme clusters are segmented and measured.
///
/// See spec §4.2: the three methods disagree on how emoji/ZWJ sequences are
/// grouped into a single cursor "step" and on backspace granularity; callers
/// (the edit buffer) branch on this when implementing `backspace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WidthMethod {
    /// Classic per-codepoint widths: every visible codepoint is its own
    /// motion step, true combining marks and ZWJ attach to the previous step.
    Wcwidth,
    /// Grapheme-cluster widths with ZWJ sequences collapsed into one
    /// cluster (the common case for rendering emoji correctly).
    #[default]
    Unicode,
    /// Grapheme clusters, but ZWJ does not join components into one
    /// cluster — each ZWJ-separated component is its own step.
    NoZwj,
}

/// Display width (terminal columns) for a single grapheme cluster slice.
///
/// Precondition: `egc` is exactly one grapheme cluster (callers segment
/// first); this function does not re-validate that invariant.
#[inline]
pub fn egc_width(egc: &str) -> u16 {
    if egc.is_empty() {
        return 0;
    }
    let kind = classify(egc);
    let mut width = width_for_kind(kind);
    if width == 1 {
        let has_signal = egc
            .chars()
            .any(|c| classify::is_extended_pictographic(c) || classify::is_regional_indicator(c));
        if has_signal {
            width = 2;
        }
    }
    width
}

/// Display width of a single codepoint under the classic `wcwidth` model:
/// combining marks and ZWJ are zero-width, everything else falls back to
/// [`unicode_width`]'s East-Asian-width-aware table.
#[inline]
pub fn codepoint_width(c: char) -> u16 {
    if classify::is_combining_mark(c) || c == '\u{200D}' {
        return 0;
    }
    unicode_width::UnicodeWidthChar::width(c).unwrap_or(1) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_narrow() {
        assert_eq!(egc_width("a"), 1);
    }

    #[test]
    fn wide_cjk() {
        assert_eq!(egc_width("界"), 2);
    }

    #[test]
    fn emoji_is_wide() {
        assert_eq!(egc_width("😀"), 2);
    }

    #[test]
    fn combining_acute_stays_narrow() {
        assert_eq!(egc_width("e\u{0301}"), 1);
    }

    #[test]
    fn flag_and_keycap_and_family_are_wide() {
        assert_eq!(egc_width("🇺🇸"), 2);
        assert_eq!(egc_width("1️⃣"), 2);
        assert_eq!(egc_width("👨‍👩‍👧‍👦"), 2);
    }

    #[test]
    fn codepoint_width_zero_for_zwj_and_combining() {
        assert_eq!(codepoint_width('\u{200D}'), 0);
        assert_eq!(codepoint_width('\u{0301}'), 0);
        assert_eq!(codepoint_width('a'), 1);
        assert_eq!(codepoint_width('界'), 2);
    }
}
