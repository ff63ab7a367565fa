//! Virtual-line construction: wrapping, truncation, and tab expansion over a
//! logical line's grapheme clusters (spec §4.5).
//!
//! Two coordinate spaces are in play here and must not be confused:
//! `source_col_offset` and chunk boundaries address clusters by *step*
//! (the same grapheme-cluster-index convention `core-buffer`/`core-edit`
//! use for cursors and highlights), while `wrap_width`/`width` budgets are
//! *display cells* — the two only coincide when every cluster is one cell
//! wide. A tab's cell width additionally depends on the running display
//! column, not just the cluster itself, so it can't be read off
//! `core_width::Cluster::width` the way every other cluster's can.

use core_width::{Cluster, WidthMethod, clusters};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    None,
    Char,
    Word,
}

/// One rendered slice of a logical line's text, already tab-expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkView {
    pub text: String,
    pub width: u16,
}

/// A projection of one logical line (or a piece of one, under wrapping)
/// onto a single screen row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualLine {
    pub source_line: usize,
    /// First logical column (cluster step) this virtual line covers.
    pub source_col_offset: usize,
    /// Total display width of this virtual line's chunks.
    pub width: u16,
    pub chunks: Vec<ChunkView>,
}

fn is_word_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Word,
    Other,
}

fn kind_of(cluster_text: &str) -> Kind {
    match cluster_text.chars().next() {
        Some(c) if is_word_char(c) => Kind::Word,
        _ => Kind::Other,
    }
}

/// Renders cluster `idx` (0-based step within the line) at running display
/// column `display_col`, returning its on-screen text and width. Tabs are
/// the only cluster whose width depends on where they land.
fn render_cluster(text: &str, cl: Cluster, display_col: u16, tab_width: u16, tab_indicator: bool) -> ChunkView {
    let raw = &text[cl.start..cl.end];
    if raw == "\t" && tab_width > 0 {
        let width = tab_width - (display_col % tab_width);
        let rendered = if tab_indicator {
            let mut s = String::from("\u{2192}");
            s.push_str(&" ".repeat((width as usize).saturating_sub(1)));
            s
        } else {
            " ".repeat(width as usize)
        };
        ChunkView { text: rendered, width }
    } else {
        ChunkView { text: raw.to_string(), width: cl.width }
    }
}

struct LineClusters {
    text: String,
    clusters: Vec<Cluster>,
}

fn segment_line(text: &str, method: WidthMethod) -> LineClusters {
    let clusters = clusters(text, method);
    LineClusters { text: text.to_string(), clusters }
}

/// Splits `line.clusters` into `(start, end)` step-index ranges, one per
/// virtual line, honoring `wrap_width` display cells and, in `Word` mode,
/// preferring the last word boundary that still fits.
fn wrap_ranges(line: &LineClusters, mode: WrapMode, wrap_width: u16, tab_width: u16) -> Vec<(usize, usize)> {
    let n = line.clusters.len();
    if n == 0 {
        return vec![(0, 0)];
    }
    let mut ranges = Vec::new();
    let mut start = 0usize;
    while start < n {
        // Greedy: find the largest `end` such that clusters[start..end] fit
        // in `wrap_width` display cells (always taking at least one cluster
        // so an overwide single grapheme still makes progress on its own
        // line).
        let mut col: u16 = 0;
        let mut end = start;
        loop {
            if end >= n {
                break;
            }
            let w = cluster_width_at(line, end, col, tab_width);
            if end > start && col.saturating_add(w) > wrap_width {
                break;
            }
            col = col.saturating_add(w);
            end += 1;
        }

        let mut break_at = end;
        if mode == WrapMode::Word && end < n {
            if let Some(boundary) = last_boundary_in(line, start, end) {
                if boundary > start {
                    break_at = boundary;
                }
            }
        }
        // Trailing spaces at the break belong to the line that's ending,
        // not the one that's starting.
        while break_at < n && kind_of(cluster_text(line, break_at)) == Kind::Other
            && cluster_text(line, break_at).chars().all(char::is_whitespace)
        {
            break_at += 1;
        }
        if break_at <= start {
            break_at = end.max(start + 1);
        }
        ranges.push((start, break_at));
        start = break_at;
    }
    ranges
}

fn cluster_text<'a>(line: &'a LineClusters, idx: usize) -> &'a str {
    let cl = line.clusters[idx];
    &line.text[cl.start..cl.end]
}

fn cluster_width_at(line: &LineClusters, idx: usize, display_col: u16, tab_width: u16) -> u16 {
    let cl = line.clusters[idx];
    if tab_width > 0 && &line.text[cl.start..cl.end] == "\t" {
        tab_width - (display_col % tab_width)
    } else {
        cl.width
    }
}

/// The last word/non-word transition inside `(start, end)`, used as a wrap
/// point in `Word` mode; `None` when the span is a single run.
fn last_boundary_in(line: &LineClusters, start: usize, end: usize) -> Option<usize> {
    let mut best = None;
    for i in (start + 1)..end {
        if kind_of(cluster_text(line, i - 1)) != kind_of(cluster_text(line, i)) {
            best = Some(i);
        }
    }
    best
}

fn render_range(
    line: &LineClusters,
    start: usize,
    end: usize,
    tab_width: u16,
    tab_indicator: bool,
) -> (Vec<ChunkView>, u16) {
    let mut chunks = Vec::new();
    let mut col: u16 = 0;
    for i in start..end {
        let cl = line.clusters[i];
        let chunk = render_cluster(&line.text, cl, col, tab_width, tab_indicator);
        col = col.saturating_add(chunk.width);
        chunks.push(chunk);
    }
    (chunks, col)
}

/// Builds the virtual lines for one logical line under `mode`.
pub fn wrap_line(
    text: &str,
    method: WidthMethod,
    mode: WrapMode,
    wrap_width: u16,
    tab_width: u16,
    tab_indicator: bool,
    source_line: usize,
) -> Vec<VirtualLine> {
    let line = segment_line(text, method);
    if mode == WrapMode::None || wrap_width == 0 {
        let (chunks, width) = render_range(&line, 0, line.clusters.len(), tab_width, tab_indicator);
        return vec![VirtualLine { source_line, source_col_offset: 0, width, chunks }];
    }
    wrap_ranges(&line, mode, wrap_width, tab_width)
        .into_iter()
        .map(|(start, end)| {
            let (chunks, width) = render_range(&line, start, end, tab_width, tab_indicator);
            VirtualLine { source_line, source_col_offset: start, width, chunks }
        })
        .collect()
}

/// Clips or ellipsizes one logical line to `viewport_width` under the
/// `wrap_mode == none, truncate == true` policy (spec §4.5). Prefix/suffix
/// cluster boundaries are snapped outward (a partially-covered cluster at
/// either edge is kept whole) rather than split.
pub fn truncate_line(
    text: &str,
    method: WidthMethod,
    tab_width: u16,
    tab_indicator: bool,
    viewport_width: u16,
    source_line: usize,
) -> VirtualLine {
    let line = segment_line(text, method);
    let (full_chunks, full_width) = render_range(&line, 0, line.clusters.len(), tab_width, tab_indicator);
    if full_width <= viewport_width {
        return VirtualLine { source_line, source_col_offset: 0, width: full_width, chunks: full_chunks };
    }
    if viewport_width < 4 {
        return VirtualLine { source_line, source_col_offset: 0, width: 0, chunks: Vec::new() };
    }

    let available = viewport_width - 3;
    let prefix_target = available / 2;
    let suffix_target = available - prefix_target;

    let mut prefix_end = 0usize;
    let mut col: u16 = 0;
    while prefix_end < line.clusters.len() && col < prefix_target {
        col = col.saturating_add(cluster_width_at(&line, prefix_end, col, tab_width));
        prefix_end += 1;
    }
    let (mut prefix_chunks, prefix_width) = render_range(&line, 0, prefix_end, tab_width, tab_indicator);

    let n = line.clusters.len();
    let mut suffix_start = n;
    let mut scol: u16 = 0;
    while suffix_start > prefix_end && scol < suffix_target {
        suffix_start -= 1;
        scol = scol.saturating_add(line.clusters[suffix_start].width);
    }
    let (suffix_chunks, suffix_width) = render_range(&line, suffix_start, n, tab_width, tab_indicator);

    prefix_chunks.push(ChunkView { text: "...".to_string(), width: 3 });
    prefix_chunks.extend(suffix_chunks);
    let width = prefix_width.saturating_add(3).saturating_add(suffix_width);
    VirtualLine { source_line, source_col_offset: 0, width, chunks: prefix_chunks }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_mode_produces_one_virtual_line() {
        let lines = wrap_line("hello world", WidthMethod::Unicode, WrapMode::None, 0, 4, false, 0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].width, 11);
    }

    #[test]
    fn char_mode_wraps_at_exact_width() {
        let lines = wrap_line("abcdefgh", WidthMethod::Unicode, WrapMode::Char, 3, 4, false, 0);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].source_col_offset, 0);
        assert_eq!(lines[1].source_col_offset, 3);
        assert_eq!(lines[2].source_col_offset, 6);
    }

    #[test]
    fn word_mode_breaks_before_a_word_not_mid_word() {
        let lines = wrap_line("foo barbaz", WidthMethod::Unicode, WrapMode::Word, 7, 4, false, 0);
        // The boundary at column 4 ("foo |bar...") keeps the trailing space
        // on this line rather than starting the next one with it.
        assert_eq!(lines[0].chunks.iter().map(|c| c.text.as_str()).collect::<String>(), "foo ");
        assert_eq!(lines[1].source_col_offset, 4);
    }

    #[test]
    fn single_grapheme_wider_than_wrap_width_gets_its_own_line() {
        let lines = wrap_line("ab", WidthMethod::Unicode, WrapMode::Char, 1, 4, false, 0);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn tab_expands_relative_to_running_column() {
        let lines = wrap_line("a\tbc", WidthMethod::Unicode, WrapMode::None, 0, 4, false, 0);
        // "a" at col 0 (width 1), tab at col 1 expands to 3 (4 - 1%4).
        assert_eq!(lines[0].chunks[1].width, 3);
        assert_eq!(lines[0].width, 1 + 3 + 2);
    }

    #[test]
    fn truncate_short_line_is_unchanged() {
        let vl = truncate_line("short", WidthMethod::Unicode, 4, false, 20, 0);
        assert_eq!(vl.width, 5);
    }

    #[test]
    fn truncate_long_line_inserts_ellipsis() {
        let vl = truncate_line("abcdefghijklmnopqrstuvwxyz", WidthMethod::Unicode, 4, false, 10, 0);
        assert!(vl.chunks.iter().any(|c| c.text == "..."));
        assert!(vl.width >= 10);
    }

    #[test]
    fn truncate_below_minimum_width_clears_the_line() {
        let vl = truncate_line("abcdefgh", WidthMethod::Unicode, 4, false, 3, 0);
        assert_eq!(vl.width, 0);
        assert!(vl.chunks.is_empty());
    }
}
