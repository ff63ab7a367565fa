//! Grapheme-cluster segmentation under a selectable [`WidthMethod`].
//!
//! This is the single place callers go to turn a `&str` into the sequence of
//! cursor "steps" (clusters) and their display widths; the rope, the view's
//! wrap algorithm, and the edit buffer's motion code all go through
//! [`clusters`] rather than calling `unicode-segmentation` directly.

use crate::{WidthMethod, codepoint_width, egc_width};
use unicode_segmentation::UnicodeSegmentation;

/// One motion-step cluster: a byte range into the source string and its
/// display width under the method that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cluster {
    pub start: usize,
    pub end: usize,
    pub width: u16,
}

impl Cluster {
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Segment `text` into clusters under `method`. Byte ranges are relative to
/// `text` and are contiguous and non-overlapping, but may skip a zero-width
/// ZWJ byte that was dropped rather than attached to either neighbor (in
/// `NoZwj` mode the two split clusters on either side of a lone ZWJ do not
/// re-cover that ZWJ's bytes — a reader consuming the original string must
/// still slice from `text`, not concatenate cluster slices, to get back the
/// exact bytes).
pub fn clusters(text: &str, method: WidthMethod) -> Vec<Cluster> {
    match method {
        WidthMethod::Unicode => unicode_clusters(text),
        WidthMethod::NoZwj => no_zwj_clusters(text),
        WidthMethod::Wcwidth => wcwidth_clusters(text),
    }
}

fn unicode_clusters(text: &str) -> Vec<Cluster> {
    text.grapheme_indices(true)
        .map(|(start, g)| Cluster {
            start,
            end: start + g.len(),
            width: egc_width(g),
        })
        .collect()
}

fn no_zwj_clusters(text: &str) -> Vec<Cluster> {
    let mut out = Vec::new();
    for (cluster_start, g) in text.grapheme_indices(true) {
        if !g.contains('\u{200D}') {
            out.push(Cluster {
                start: cluster_start,
                end: cluster_start + g.len(),
                width: egc_width(g),
            });
            continue;
        }
        // Split on each ZWJ; the ZWJ byte itself is dropped (zero width,
        // joins nothing in this mode).
        let mut piece_start = 0usize;
        for (rel, ch) in g.char_indices() {
            if ch == '\u{200D}' {
                if rel > piece_start {
                    let piece = &g[piece_start..rel];
                    out.push(Cluster {
                        start: cluster_start + piece_start,
                        end: cluster_start + rel,
                        width: egc_width(piece),
                    });
                }
                piece_start = rel + ch.len_utf8();
            }
        }
        if piece_start < g.len() {
            let piece = &g[piece_start..];
            out.push(Cluster {
                start: cluster_start + piece_start,
                end: cluster_start + g.len(),
                width: egc_width(piece),
            });
        }
    }
    out
}

fn wcwidth_clusters(text: &str) -> Vec<Cluster> {
    let mut out: Vec<Cluster> = Vec::new();
    for (start, c) in text.char_indices() {
        let end = start + c.len_utf8();
        if crate::classify::is_step_attaching(c) {
            if let Some(last) = out.last_mut() {
                last.end = end;
                continue;
            }
            // A leading combining mark/ZWJ with nothing to attach to still
            // needs somewhere to live; make it its own zero-width step.
        }
        out.push(Cluster {
            start,
            end,
            width: codepoint_width(c),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unicode_mode_joins_family_emoji_into_one_cluster() {
        let s = "👨‍👩‍👧‍👦";
        let cs = clusters(s, WidthMethod::Unicode);
        assert_eq!(cs.len(), 1);
        assert_eq!(cs[0].width, 2);
    }

    #[test]
    fn no_zwj_mode_splits_family_emoji() {
        let s = "👨‍👩‍👧‍👦";
        let cs = clusters(s, WidthMethod::NoZwj);
        assert_eq!(cs.len(), 4);
        for c in &cs {
            assert_eq!(c.width, 2);
        }
    }

    #[test]
    fn wcwidth_mode_splits_skin_tone_modifier_from_base() {
        let s = "👋🏿";
        let cs = clusters(s, WidthMethod::Wcwidth);
        assert_eq!(cs.len(), 2);
        assert_eq!(cs[0].width, 2);
        assert_eq!(cs[1].width, 2);
        assert_eq!(cs[0].end, cs[1].start);
    }

    #[test]
    fn wcwidth_mode_attaches_combining_mark_to_base() {
        let s = "e\u{0301}";
        let cs = clusters(s, WidthMethod::Wcwidth);
        assert_eq!(cs.len(), 1);
        assert_eq!(cs[0].width, 1);
        assert_eq!(cs[0].end, s.len());
    }

    #[test]
    fn unicode_mode_keeps_combining_mark_joined() {
        let s = "e\u{0301}";
        let cs = clusters(s, WidthMethod::Unicode);
        assert_eq!(cs.len(), 1);
    }

    #[test]
    fn clusters_cover_ascii_one_per_char() {
        let s = "abc";
        for method in [WidthMethod::Wcwidth, WidthMethod::Unicode, WidthMethod::NoZwj] {
            let cs = clusters(s, method);
            assert_eq!(cs.len(), 3);
            assert_eq!(cs[2].end, 3);
        }
    }
}
