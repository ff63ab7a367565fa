//! Segmented rope: the text-storage core of the engine (spec §3.2).
//!
//! Text lives as a flat `Vec` of [`Segment`]s rather than a balanced tree —
//! every operation here is O(segments), which is the right tradeoff for a
//! buffer sized for an editor viewport rather than a multi-gigabyte log; a
//! future revision that needs sub-linear edits can swap the segment list
//! for a rope-of-segments without touching the public API (`DESIGN.md`
//! tracks this as a deliberate scope cut, not an oversight).

pub mod chunk;
pub mod mem;
pub mod segment;

pub use chunk::Chunk;
pub use mem::{MemId, MemRegistry};
pub use segment::{HighlightRef, Segment};

use core_width::{WidthMethod, clusters};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RopeError {
    #[error("offset {offset} is out of bounds (buffer has {len} steps)")]
    OutOfBounds { offset: usize, len: usize },
    #[error("row {row} is out of bounds ({line_count} lines)")]
    RowOutOfBounds { row: usize, line_count: usize },
}

/// A flat step offset into the rope, counting grapheme-cluster steps across
/// every line. Line boundaries cost nothing — the position right after the
/// last grapheme of line `n` and the position right before the first
/// grapheme of line `n + 1` are the same offset, just reachable through two
/// different `Coords` (`(n, line_len(n))` and `(n + 1, 0)`).
///
/// This is the coordinate space every splicing operation in this crate
/// (`replace_range`, `join_line`, `insert_newline_at`, highlight marks) and
/// every virtual-line index in `core-view` address text in. It is distinct
/// from the display-width column a cursor reports to its caller — a wide
/// grapheme is one step but several display cells — see
/// [`col_to_display`](Rope::col_to_display)/[`display_to_col`](Rope::display_to_col)
/// for the boundary between the two.
pub type Offset = usize;

/// `col` counts grapheme-cluster steps from the start of `row`, the same
/// convention as [`Offset`] — not display cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coords {
    pub row: usize,
    pub col: usize,
}

pub struct Rope {
    registry: MemRegistry,
    segments: Vec<Segment>,
    width_method: WidthMethod,
}

impl Rope {
    pub fn new(width_method: WidthMethod) -> Self {
        Self {
            registry: MemRegistry::new(),
            segments: vec![Segment::LineStart],
            width_method,
        }
    }

    pub fn from_text(text: &str, width_method: WidthMethod) -> Self {
        let mut rope = Self::new(width_method);
        rope.set_text(text);
        rope
    }

    pub fn width_method(&self) -> WidthMethod {
        self.width_method
    }

    /// Replaces the entire contents (spec §4.3 `setText`).
    pub fn set_text(&mut self, text: &str) {
        let mem_id = self.registry.intern_owned(text.as_bytes());
        self.segments = Self::segments_for_text(&self.registry, mem_id, text, self.width_method);
    }

    fn segments_for_text(
        registry: &MemRegistry,
        mem_id: MemId,
        text: &str,
        method: WidthMethod,
    ) -> Vec<Segment> {
        let mut segments = vec![Segment::LineStart];
        let mut byte_offset = 0usize;
        for line in text.split_inclusive('\n') {
            let (content, has_newline) = match line.strip_suffix('\n') {
                Some(c) => (c, true),
                None => (line, false),
            };
            if !content.is_empty() {
                segments.push(Segment::Text(Chunk::new(
                    registry,
                    mem_id,
                    byte_offset,
                    content.len(),
                    method,
                )));
            }
            byte_offset += content.len();
            if has_newline {
                byte_offset += 1;
                segments.push(Segment::LineStart);
            }
        }
        segments
    }

    /// Replaces the whole segment list wholesale (spec §4.3 `setSegments`);
    /// used when a caller has already built a segment list externally (e.g.
    /// restoring a snapshot).
    pub fn set_segments(&mut self, segments: Vec<Segment>) {
        self.segments = segments;
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn insert_segment(&mut self, index: usize, segment: Segment) {
        self.segments.insert(index.min(self.segments.len()), segment);
    }

    /// Total step count across the whole buffer (spec `totalWeight`, the
    /// step/cell-weight dimension).
    pub fn total_weight(&self) -> usize {
        self.segments.iter().map(Segment::step_count).sum()
    }

    pub fn line_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::LineStart))
            .count()
            .max(1)
    }

    /// Total display width of line `row` (spec `lineWidthAt`, the
    /// width-weight dimension).
    pub fn line_width_at(&self, row: usize) -> Result<u16, RopeError> {
        let (start, end) = self.line_segment_bounds(row)?;
        Ok(self.segments[start..end].iter().map(Segment::width).sum())
    }

    pub fn line_len(&self, row: usize) -> Result<usize, RopeError> {
        let (start, end) = self.line_segment_bounds(row)?;
        Ok(self.segments[start..end].iter().map(Segment::step_count).sum())
    }

    /// Step-addressed `[start, end)` ranges on `row` whose underlying chunk
    /// carries its own `style_id` (set via `replace_range`'s `style_id`
    /// parameter, used by `core-buffer::set_styled_text` for placeholder
    /// text) — the style a line has before any highlight is layered on top.
    pub fn line_chunk_styles(&self, row: usize) -> Result<Vec<(usize, usize, u32)>, RopeError> {
        let (start, end) = self.line_segment_bounds(row)?;
        let mut col = 0usize;
        let mut out = Vec::new();
        for seg in &self.segments[start..end] {
            if let Segment::Text(chunk) = seg {
                let steps = chunk.step_count();
                if let Some(style_id) = chunk.style_id {
                    out.push((col, col + steps, style_id));
                }
                col += steps;
            }
        }
        Ok(out)
    }

    fn line_segment_bounds(&self, row: usize) -> Result<(usize, usize), RopeError> {
        let mut seen = 0usize;
        let mut start = None;
        for (i, seg) in self.segments.iter().enumerate() {
            if matches!(seg, Segment::LineStart) {
                if seen == row {
                    start = Some(i + 1);
                } else if start.is_some() {
                    return Ok((start.unwrap(), i));
                }
                seen += 1;
            }
        }
        match start {
            Some(s) => Ok((s, self.segments.len())),
            None => Err(RopeError::RowOutOfBounds {
                row,
                line_count: self.line_count(),
            }),
        }
    }

    /// Flat step offset where each line begins (index `row` is line
    /// `row`'s first step's offset). Newlines themselves are not steps —
    /// they are segment boundaries — so this is a plain prefix sum over
    /// each line's step count.
    fn row_starts(&self) -> Vec<usize> {
        let mut starts = Vec::with_capacity(self.line_count());
        let mut walked = 0usize;
        for seg in &self.segments {
            if matches!(seg, Segment::LineStart) {
                starts.push(walked);
            } else {
                walked += seg.step_count();
            }
        }
        starts
    }

    /// Converts a flat step offset into `(row, col)`, where `col` counts
    /// steps from the start of the line (spec `offsetToCoords`).
    pub fn offset_to_coords(&self, offset: Offset) -> Result<Coords, RopeError> {
        let total = self.total_weight();
        if offset > total {
            return Err(RopeError::OutOfBounds { offset, len: total });
        }
        let starts = self.row_starts();
        let row = match starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert_at) => insert_at - 1,
        };
        Ok(Coords {
            row,
            col: offset - starts[row],
        })
    }

    /// Converts `(row, col)` back into a flat step offset (spec
    /// `coordsToOffset`); `col` is clamped to the line's length.
    pub fn coords_to_offset(&self, coords: Coords) -> Result<Offset, RopeError> {
        let line_len = self.line_len(coords.row)?;
        let starts = self.row_starts();
        let row_start = starts[coords.row];
        Ok(row_start + coords.col.min(line_len))
    }

    /// Per-line cluster widths, used by [`col_to_display`](Self::col_to_display)
    /// and [`display_to_col`](Self::display_to_col) to translate between this
    /// crate's step-addressed `col` and a cursor's display-width column.
    fn line_cluster_widths(&self, row: usize) -> Result<Vec<u16>, RopeError> {
        let text = self.line_text(row)?;
        Ok(clusters(&text, self.width_method).into_iter().map(|c| c.width).collect())
    }

    /// Display width of the first `col` steps of `row` — the cursor's
    /// display column for a step column this crate uses internally. `col`
    /// beyond the line's length clamps to the line's full width.
    pub fn col_to_display(&self, row: usize, col: usize) -> Result<u16, RopeError> {
        let widths = self.line_cluster_widths(row)?;
        let n = col.min(widths.len());
        Ok(widths[..n].iter().sum())
    }

    /// Inverse of [`col_to_display`](Self::col_to_display): the step column
    /// whose preceding steps sum to at most `display_col`. A `display_col`
    /// that lands inside a wide cluster snaps back to that cluster's own
    /// step (a cursor can never sit mid-glyph).
    pub fn display_to_col(&self, row: usize, display_col: u16) -> Result<usize, RopeError> {
        let widths = self.line_cluster_widths(row)?;
        let mut cum = 0u16;
        for (i, w) in widths.iter().enumerate() {
            if display_col < cum + w {
                return Ok(i);
            }
            cum = cum.saturating_add(*w);
        }
        Ok(widths.len())
    }

    /// Inserts a zero-width highlight marker at step offset `offset`,
    /// returning its segment index so callers can look it back up quickly.
    pub fn insert_highlight_mark(&mut self, offset: Offset, marker: HighlightRef) -> Result<usize, RopeError> {
        let idx = self.split_boundary_at(offset)?;
        self.segments.insert(idx, Segment::HighlightMark(marker));
        Ok(idx)
    }

    /// Returns the current step offset of a marker, if it is still present
    /// (spec `getMarker`) — it may have been dropped by a `replaceRange`
    /// that overwrote its segment.
    pub fn get_marker(&self, marker: HighlightRef) -> Option<Offset> {
        let mut walked = 0usize;
        for seg in &self.segments {
            if let Segment::HighlightMark(m) = seg {
                if *m == marker {
                    return Some(walked);
                }
            }
            walked += seg.step_count();
        }
        None
    }

    pub fn remove_highlight_marks(&mut self, marker: HighlightRef) {
        self.segments.retain(|s| !matches!(s, Segment::HighlightMark(m) if *m == marker));
    }

    pub fn clear_highlight_marks(&mut self) {
        self.segments.retain(|s| !matches!(s, Segment::HighlightMark(_)));
    }

    /// Replaces the step range `[start, end)` with `text` on a single line,
    /// splitting any chunk the range partially overlaps (spec §4.3
    /// `replaceRange`). Neither `[start, end)` nor `text` may cross a line
    /// boundary — line joins and splits go through [`join_line`] and
    /// [`insert_newline_at`], mirroring how newline handling gets its own
    /// dedicated operations rather than being folded into generic range
    /// replacement.
    ///
    /// [`join_line`]: Self::join_line
    /// [`insert_newline_at`]: Self::insert_newline_at
    pub fn replace_range(&mut self, start: Offset, end: Offset, text: &str, style_id: Option<u32>) -> Result<(), RopeError> {
        debug_assert!(!text.contains('\n'), "replace_range text must not span lines");
        let total = self.total_weight();
        if start > end || end > total {
            return Err(RopeError::OutOfBounds { offset: end, len: total });
        }
        let start_idx = self.split_boundary_at(start)?;
        let end_idx = self.split_boundary_at(end)?.max(start_idx);
        let inserted = if text.is_empty() {
            Vec::new()
        } else {
            let mem_id = self.registry.intern_owned(text.as_bytes());
            vec![Segment::Text(
                Chunk::new(&self.registry, mem_id, 0, text.len(), self.width_method).with_style(style_id),
            )]
        };
        self.segments.splice(start_idx..end_idx, inserted);
        Ok(())
    }

    /// Splits the line containing step offset `offset` into two lines,
    /// inserting a fresh `LineStart` there (spec §4.3's newline handling).
    pub fn insert_newline_at(&mut self, offset: Offset) -> Result<(), RopeError> {
        let idx = self.split_boundary_at(offset)?;
        self.segments.insert(idx, Segment::LineStart);
        Ok(())
    }

    /// Merges line `row + 1` into line `row` by removing the `LineStart`
    /// between them (spec §4.3's backspace-at-start-of-line / delete-at-
    /// end-of-line join).
    pub fn join_line(&mut self, row: usize) -> Result<(), RopeError> {
        let (_, end) = self.line_segment_bounds(row)?;
        if end >= self.segments.len() {
            return Err(RopeError::RowOutOfBounds {
                row: row + 1,
                line_count: self.line_count(),
            });
        }
        debug_assert!(matches!(self.segments[end], Segment::LineStart));
        self.segments.remove(end);
        Ok(())
    }

    /// Concatenates the visible text of line `row` (no trailing newline).
    pub fn line_text(&self, row: usize) -> Result<String, RopeError> {
        let (start, end) = self.line_segment_bounds(row)?;
        let mut s = String::new();
        for seg in &self.segments[start..end] {
            if let Segment::Text(chunk) = seg {
                s.push_str(chunk.text(&self.registry));
            }
        }
        Ok(s)
    }

    /// Concatenates the whole document's visible text, lines joined by `\n`.
    pub fn full_text(&self) -> String {
        let mut s = String::new();
        let mut first = true;
        for seg in &self.segments {
            match seg {
                Segment::LineStart => {
                    if !first {
                        s.push('\n');
                    }
                    first = false;
                }
                Segment::Text(chunk) => s.push_str(chunk.text(&self.registry)),
                Segment::HighlightMark(_) => {}
            }
        }
        s
    }

    /// Ensures a segment boundary exists exactly at step offset `offset`,
    /// splitting a chunk if needed, and returns the first segment index at
    /// or after that offset that is not a zero-width `LineStart`/
    /// `HighlightMark` — callers that specifically want a line boundary
    /// (`insert_newline_at`, `join_line`) index the segment list directly
    /// instead of going through this helper.
    fn split_boundary_at(&mut self, offset: Offset) -> Result<usize, RopeError> {
        let mut walked = 0usize;
        for i in 0..self.segments.len() {
            let steps = self.segments[i].step_count();
            if walked == offset && steps > 0 {
                return Ok(i);
            }
            if walked < offset && offset < walked + steps {
                if let Segment::Text(chunk) = &self.segments[i] {
                    let at_byte = chunk.step_to_byte(offset - walked);
                    let (left, right) = chunk.split_at_byte(&self.registry, at_byte, self.width_method);
                    self.segments.splice(i..=i, [Segment::Text(left), Segment::Text(right)]);
                    return Ok(i + 1);
                }
            }
            walked += steps;
        }
        Ok(self.segments.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_text_counts_lines_and_steps() {
        let rope = Rope::from_text("ab\ncd\n", WidthMethod::Unicode);
        assert_eq!(rope.line_count(), 3); // trailing newline starts an empty 3rd line
        assert_eq!(rope.line_len(0).unwrap(), 2);
        assert_eq!(rope.line_len(1).unwrap(), 2);
        assert_eq!(rope.line_len(2).unwrap(), 0);
    }

    #[test]
    fn line_width_counts_wide_glyphs() {
        let rope = Rope::from_text("a界\n", WidthMethod::Unicode);
        assert_eq!(rope.line_width_at(0).unwrap(), 3);
        assert_eq!(rope.line_len(0).unwrap(), 2);
    }

    #[test]
    fn coords_round_trip_within_a_line() {
        let rope = Rope::from_text("hello\nworld", WidthMethod::Unicode);
        let offset = rope.coords_to_offset(Coords { row: 1, col: 3 }).unwrap();
        let coords = rope.offset_to_coords(offset).unwrap();
        assert_eq!(coords, Coords { row: 1, col: 3 });
    }

    #[test]
    fn replace_range_splits_and_restitches_chunks() {
        let mut rope = Rope::from_text("hello world", WidthMethod::Unicode);
        rope.replace_range(6, 11, "there", None).unwrap();
        let text: String = rope
            .segments()
            .iter()
            .filter_map(Segment::as_text)
            .map(|c| c.text(&rope.registry).to_string())
            .collect();
        assert_eq!(text, "hello there");
    }

    #[test]
    fn highlight_mark_tracks_position_across_unrelated_edit() {
        let mut rope = Rope::from_text("hello world", WidthMethod::Unicode);
        rope.insert_highlight_mark(6, 42).unwrap();
        assert_eq!(rope.get_marker(42), Some(6));
        rope.replace_range(0, 5, "hi", None).unwrap();
        // "hi" (2 steps) replaces "hello" (5 steps); the mark rides along
        // inline, so its new offset reflects the shrink automatically.
        assert_eq!(rope.get_marker(42), Some(3));
    }

    #[test]
    fn full_text_joins_lines_with_newlines() {
        let rope = Rope::from_text("ab\ncd\n", WidthMethod::Unicode);
        assert_eq!(rope.full_text(), "ab\ncd\n");
        assert_eq!(rope.line_text(0).unwrap(), "ab");
        assert_eq!(rope.line_text(2).unwrap(), "");
    }

    #[test]
    fn col_to_display_sums_widths_of_wide_clusters() {
        let rope = Rope::from_text("👋🏿", WidthMethod::Wcwidth);
        assert_eq!(rope.line_len(0).unwrap(), 2); // base + skin-tone modifier, split under wcwidth
        assert_eq!(rope.col_to_display(0, 0).unwrap(), 0);
        assert_eq!(rope.col_to_display(0, 1).unwrap(), 2);
        assert_eq!(rope.col_to_display(0, 2).unwrap(), 4);
    }

    #[test]
    fn display_to_col_snaps_a_mid_cluster_column_back_to_its_start() {
        let rope = Rope::from_text("a界b", WidthMethod::Unicode);
        assert_eq!(rope.display_to_col(0, 0).unwrap(), 0); // before 'a'
        assert_eq!(rope.display_to_col(0, 1).unwrap(), 1); // before '界'
        assert_eq!(rope.display_to_col(0, 2).unwrap(), 1); // inside '界', snaps back
        assert_eq!(rope.display_to_col(0, 3).unwrap(), 2); // before 'b'
    }

    #[test]
    fn remove_highlight_marks_drops_only_matching_marker() {
        let mut rope = Rope::from_text("hello world", WidthMethod::Unicode);
        rope.insert_highlight_mark(0, 1).unwrap();
        rope.insert_highlight_mark(5, 2).unwrap();
        rope.remove_highlight_marks(1);
        assert_eq!(rope.get_marker(1), None);
        assert_eq!(rope.get_marker(2), Some(5));
    }
}
