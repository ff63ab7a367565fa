//! Text buffer: composes the segmented rope, the grapheme pool, and a
//! per-line highlight table into the engine's primary content-editing
//! surface (spec §4.4).
//!
//! Nothing here understands cursors, selections, or undo — those are
//! [`core-edit`](../core_edit/index.html)'s job. A `TextBuffer` only knows
//! how to hold styled, highlighted text and bump its [`content_epoch`] when
//! that text changes.

mod highlight;

pub use highlight::{HighlightRecord, LineSpan};

use core_pool::GraphemePool;
use core_rope::{Coords, Offset, Rope, RopeError};
use core_style::StyleDefinition;
use core_width::{WidthMethod, clusters};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BufferError {
    #[error(transparent)]
    Rope(#[from] RopeError),
}

/// One chunk of a caller-supplied styled run (spec §4.4 `setStyledText`,
/// used for placeholder text).
pub struct StyledChunk<'a> {
    pub text: &'a str,
    pub style: StyleDefinition,
}

pub struct TextBuffer {
    rope: Rope,
    pool: GraphemePool,
    /// Ids currently held on behalf of the buffer's own content; rebuilt by
    /// [`sync_pool`](Self::sync_pool) after every content mutation rather
    /// than diffed incrementally — same O(content) tradeoff as the rope's
    /// flat segment list (`DESIGN.md`'s core-rope entry), acceptable at
    /// editor-viewport scale.
    tracked_ids: Vec<core_pool::GraphemeId>,
    highlights: Vec<Vec<HighlightRecord>>,
    /// Locally-registered style definitions from `set_styled_text`, indexed
    /// by `style_id - INLINE_STYLE_BASE`.
    inline_styles: Vec<StyleDefinition>,
    tab_width: u16,
    content_epoch: u64,
    next_range_id: u64,
    width_method: WidthMethod,
}

/// `style_id`s below this value are caller-owned (e.g. syntax groups);
/// `set_styled_text` allocates ids at and above it for its own chunks so the
/// two id spaces never collide.
const INLINE_STYLE_BASE: u32 = 1 << 24;

impl TextBuffer {
    pub fn new(width_method: WidthMethod) -> Self {
        Self {
            rope: Rope::new(width_method),
            pool: GraphemePool::new(),
            tracked_ids: Vec::new(),
            highlights: vec![Vec::new()],
            inline_styles: Vec::new(),
            tab_width: 4,
            content_epoch: 0,
            next_range_id: 0,
            width_method,
        }
    }

    pub fn content_epoch(&self) -> u64 {
        self.content_epoch
    }

    /// The grapheme-clustering policy this buffer addresses text under.
    /// Callers that re-segment a line themselves (the view's wrap engine)
    /// need this to land on the same cluster boundaries as the buffer's
    /// own `col`/`Offset` addressing.
    pub fn width_method(&self) -> WidthMethod {
        self.width_method
    }

    pub fn line_count(&self) -> usize {
        self.rope.line_count()
    }

    pub fn length(&self) -> usize {
        self.rope.total_weight()
    }

    pub fn line_len(&self, row: usize) -> Result<usize, BufferError> {
        Ok(self.rope.line_len(row)?)
    }

    pub fn line_width_at(&self, row: usize) -> Result<u16, BufferError> {
        Ok(self.rope.line_width_at(row)?)
    }

    /// Display column for a step column on `row` — see `core-rope`'s
    /// `col_to_display` for how a wide grapheme's step and display widths
    /// diverge.
    pub fn col_to_display(&self, row: usize, col: usize) -> Result<u16, BufferError> {
        Ok(self.rope.col_to_display(row, col)?)
    }

    /// Inverse of [`col_to_display`](Self::col_to_display): the step column
    /// a display column resolves to.
    pub fn display_to_col(&self, row: usize, display_col: u16) -> Result<usize, BufferError> {
        Ok(self.rope.display_to_col(row, display_col)?)
    }

    pub fn line_text(&self, row: usize) -> Result<String, BufferError> {
        Ok(self.rope.line_text(row)?)
    }

    pub fn text(&self) -> String {
        self.rope.full_text()
    }

    pub fn offset_to_coords(&self, offset: Offset) -> Result<Coords, BufferError> {
        Ok(self.rope.offset_to_coords(offset)?)
    }

    pub fn coords_to_offset(&self, coords: Coords) -> Result<Offset, BufferError> {
        Ok(self.rope.coords_to_offset(coords)?)
    }

    pub fn tab_width(&self) -> u16 {
        self.tab_width
    }

    /// Spec §4.4 `setTabWidth`: stored for the view to consume; this crate
    /// does not itself compute tab display widths.
    pub fn set_tab_width(&mut self, n: u16) {
        self.tab_width = n.max(1);
    }

    fn bump_epoch(&mut self) {
        self.content_epoch += 1;
        tracing::trace!(target: "text.buffer", epoch = self.content_epoch, "content epoch bumped");
    }

    /// Resets the rope to a single-line structure derived from `text`,
    /// clears highlights, and bumps the epoch (spec `setText`). Clearing
    /// undo history and the cursor is `core-edit`'s responsibility when it
    /// wraps this call — a `TextBuffer` owns neither.
    pub fn set_text(&mut self, text: &str) {
        self.rope.set_text(text);
        self.highlights = vec![Vec::new(); self.rope.line_count()];
        self.bump_epoch();
        self.sync_pool();
    }

    /// Same storage effect as `set_text`; kept as a separate entry point
    /// because spec §4.4 treats it as a distinct undoable edit one layer up.
    pub fn replace_text(&mut self, text: &str) {
        self.set_text(text);
    }

    pub fn append(&mut self, text: &str) -> Result<(), BufferError> {
        let at = self.rope.total_weight();
        self.insert(at, text)
    }

    /// Inserts arbitrary (possibly multi-line) text at step offset
    /// `offset`. Runs between `\n`s go through `replace_range`; a `\n`
    /// itself becomes `insert_newline_at`, since newlines are segment
    /// boundaries rather than steps and `replace_range` refuses to cross
    /// one (see `core-rope`).
    pub fn insert(&mut self, offset: Offset, text: &str) -> Result<(), BufferError> {
        let mut cursor = offset;
        let mut first = true;
        for line in text.split('\n') {
            if !first {
                let row = self.rope.offset_to_coords(cursor)?.row;
                self.rope.insert_newline_at(cursor)?;
                self.shift_highlights_after_split(row);
            }
            first = false;
            if !line.is_empty() {
                self.rope.replace_range(cursor, cursor, line, None)?;
                cursor += clusters(line, self.width_method).len();
            }
        }
        self.bump_epoch();
        self.sync_pool();
        Ok(())
    }

    /// Deletes the step range `[start, end)`, transparently joining lines
    /// when the range runs past a line's end (spec `deleteRange`).
    pub fn delete_range(&mut self, start: Offset, end: Offset) -> Result<(), BufferError> {
        if start >= end {
            return Ok(());
        }
        let mut remaining = end - start;
        while remaining > 0 {
            let coords = self.rope.offset_to_coords(start)?;
            let line_len = self.rope.line_len(coords.row)?;
            let avail = line_len - coords.col;
            let take = remaining.min(avail);
            if take > 0 {
                self.rope.replace_range(start, start + take, "", None)?;
                remaining -= take;
            }
            if remaining > 0 {
                let row_width = self.rope.line_len(coords.row)?;
                self.rope.join_line(coords.row)?;
                self.shift_highlights_after_join(coords.row, row_width);
            }
        }
        self.bump_epoch();
        self.sync_pool();
        Ok(())
    }

    /// Merges line `row + 1` into line `row`, removing the line break
    /// between them without touching either line's text. `delete_range`
    /// cannot express this on its own: a line break costs zero steps, so
    /// there is no non-empty step range that denotes "just the newline"
    /// for a caller like `EditBuffer::backspace` at column zero to delete.
    pub fn join_line(&mut self, row: usize) -> Result<(), BufferError> {
        let row_width = self.rope.line_len(row)?;
        self.rope.join_line(row)?;
        self.shift_highlights_after_join(row, row_width);
        self.bump_epoch();
        self.sync_pool();
        Ok(())
    }

    /// Deletes an entire logical line including the line break that follows
    /// it (or, for the last line, the one that precedes it), used by
    /// `EditBuffer::deleteLine`.
    pub fn delete_full_line(&mut self, row: usize) -> Result<(), BufferError> {
        let line_len = self.rope.line_len(row)?;
        let row_start = self.rope.coords_to_offset(Coords { row, col: 0 })?;
        if line_len > 0 {
            self.rope.replace_range(row_start, row_start + line_len, "", None)?;
        }
        if row + 1 < self.rope.line_count() {
            self.rope.join_line(row)?;
            self.shift_highlights_after_join(row, 0);
        } else if row > 0 {
            self.rope.join_line(row - 1)?;
            self.shift_highlights_after_join(row - 1, self.rope.line_len(row - 1)?);
        }
        self.bump_epoch();
        self.sync_pool();
        Ok(())
    }

    /// Clears and installs styled chunks as the buffer's sole content
    /// (spec `setStyledText`; used for placeholder text — see `core-edit`).
    /// Chunk text must not contain `\n`; placeholder text is always single
    /// line in this engine's usage.
    pub fn set_styled_text(&mut self, chunks: &[StyledChunk]) -> Result<(), BufferError> {
        self.inline_styles.clear();
        let mut text = String::new();
        for chunk in chunks {
            text.push_str(chunk.text);
        }
        self.rope.set_text(&text);
        let mut cursor = 0usize;
        for chunk in chunks {
            let len = clusters(chunk.text, self.width_method).len();
            if len > 0 {
                let style_id = INLINE_STYLE_BASE + self.inline_styles.len() as u32;
                self.inline_styles.push(chunk.style);
                self.rope.replace_range(cursor, cursor + len, chunk.text, Some(style_id))?;
                cursor += len;
            }
        }
        self.highlights = vec![Vec::new(); self.rope.line_count()];
        self.bump_epoch();
        self.sync_pool();
        Ok(())
    }

    /// Resolves an inline style id from `set_styled_text`, if `style_id`
    /// falls in that reserved range.
    pub fn inline_style(&self, style_id: u32) -> Option<&StyleDefinition> {
        style_id
            .checked_sub(INLINE_STYLE_BASE)
            .and_then(|idx| self.inline_styles.get(idx as usize))
    }

    fn next_range_id(&mut self) -> u64 {
        let id = self.next_range_id;
        self.next_range_id += 1;
        id
    }

    /// Adds a highlight local to `row`; columns are in the same
    /// step-address coordinate system as [`Coords::col`] — see
    /// `DESIGN.md`'s core-buffer entry on why this crate keeps a single
    /// addressing convention rather than separate "display-width" and
    /// "char range" coordinate spaces.
    pub fn add_highlight(
        &mut self,
        row: usize,
        col_start: usize,
        col_end: usize,
        style_id: u32,
        priority: u16,
        ref_id: u64,
    ) -> Result<(), BufferError> {
        if row >= self.highlights.len() {
            return Err(BufferError::Rope(RopeError::RowOutOfBounds {
                row,
                line_count: self.rope.line_count(),
            }));
        }
        let range_id = self.next_range_id();
        self.highlights[row].push(HighlightRecord {
            range_id,
            col_start,
            col_end,
            style_id,
            priority,
            ref_id,
        });
        Ok(())
    }

    /// Splits a document-wide highlight across the lines it spans (spec
    /// `addHighlightByCharRange`).
    pub fn add_highlight_by_char_range(
        &mut self,
        start_off: Offset,
        end_off: Offset,
        style_id: u32,
        priority: u16,
        ref_id: u64,
    ) -> Result<(), BufferError> {
        if start_off >= end_off {
            return Ok(());
        }
        let start = self.rope.offset_to_coords(start_off)?;
        let end = self.rope.offset_to_coords(end_off)?;
        if start.row == end.row {
            return self.add_highlight(start.row, start.col, end.col, style_id, priority, ref_id);
        }
        self.add_highlight(start.row, start.col, self.rope.line_len(start.row)?, style_id, priority, ref_id)?;
        for row in (start.row + 1)..end.row {
            self.add_highlight(row, 0, self.rope.line_len(row)?, style_id, priority, ref_id)?;
        }
        self.add_highlight(end.row, 0, end.col, style_id, priority, ref_id)
    }

    pub fn remove_highlights_by_ref(&mut self, ref_id: u64) {
        for row in &mut self.highlights {
            row.retain(|h| h.ref_id != ref_id);
        }
    }

    pub fn clear_line_highlights(&mut self, row: usize) {
        if let Some(row) = self.highlights.get_mut(row) {
            row.clear();
        }
    }

    pub fn clear_all_highlights(&mut self) {
        for row in &mut self.highlights {
            row.clear();
        }
    }

    pub fn get_line_highlights(&self, row: usize) -> &[HighlightRecord] {
        self.highlights.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Flattens `row`'s overlapping highlights into priority-resolved spans
    /// (spec `getLineSpans`); columns beyond the line's current width are
    /// truncated here, on read, per spec §4.4's invariant. A chunk's own
    /// `style_id` (set by `set_styled_text`, used for placeholder text)
    /// underlies the highlight table as a base layer — explicit highlights
    /// still win any overlap, since a freshly `set_styled_text`-installed
    /// buffer starts with no highlight records of its own to conflict with.
    pub fn get_line_spans(&self, row: usize) -> Result<Vec<LineSpan>, BufferError> {
        let len = self.rope.line_len(row)?;
        let mut records: Vec<HighlightRecord> = self
            .rope
            .line_chunk_styles(row)?
            .into_iter()
            .map(|(col_start, col_end, style_id)| HighlightRecord {
                range_id: u64::MAX,
                col_start,
                col_end,
                style_id,
                priority: 0,
                ref_id: u64::MAX,
            })
            .collect();
        records.extend_from_slice(self.get_line_highlights(row));
        Ok(highlight::flatten(&records, len))
    }

    /// Convenience accessor: the `style_id` in effect at a single step
    /// offset, if any (supplemented feature, not a spec-mandated op).
    pub fn style_at(&self, offset: Offset) -> Result<Option<u32>, BufferError> {
        let coords = self.rope.offset_to_coords(offset)?;
        let spans = self.get_line_spans(coords.row)?;
        Ok(spans
            .iter()
            .find(|s| coords.col >= s.col && coords.col < s.col + s.len)
            .map(|s| s.style_id))
    }

    fn shift_highlights_after_split(&mut self, row: usize) {
        self.highlights.insert(row + 1, Vec::new());
    }

    fn shift_highlights_after_join(&mut self, row: usize, row_width: usize) {
        if row + 1 >= self.highlights.len() {
            return;
        }
        let moved = self.highlights.remove(row + 1);
        for mut h in moved {
            h.col_start += row_width;
            h.col_end += row_width;
            self.highlights[row].push(h);
        }
    }

    /// Rebuilds the pool's refcounts from the rope's current content.
    /// Dropping and re-alloc'ing every multi-byte cluster on each mutation
    /// is O(content) rather than O(edit), matching the rope's own flat-list
    /// tradeoff — acceptable at editor-viewport scale, see `DESIGN.md`.
    fn sync_pool(&mut self) {
        for id in self.tracked_ids.drain(..) {
            let result = self.pool.decref(id);
            debug_assert!(result.is_ok(), "tracked grapheme id outlived its own refcount");
        }
        let text = self.rope.full_text();
        for cluster in clusters(&text, self.width_method) {
            if cluster.len() <= 1 {
                continue;
            }
            let bytes = &text.as_bytes()[cluster.start..cluster.end];
            let id = self.pool.alloc(bytes);
            let _ = self.pool.incref(id);
            self.tracked_ids.push(id);
        }
    }

    pub fn pool(&self) -> &GraphemePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_text_bumps_epoch_and_resets_highlights() {
        let mut buf = TextBuffer::new(WidthMethod::Unicode);
        buf.add_highlight(0, 0, 1, 1, 0, 99).unwrap();
        buf.set_text("hello\nworld");
        assert_eq!(buf.content_epoch(), 1);
        assert!(buf.get_line_highlights(0).is_empty());
        assert_eq!(buf.line_count(), 2);
    }

    #[test]
    fn insert_multiline_text_splits_into_new_lines() {
        let mut buf = TextBuffer::new(WidthMethod::Unicode);
        buf.set_text("ab");
        buf.insert(1, "X\nY").unwrap();
        assert_eq!(buf.line_count(), 2);
        assert_eq!(buf.line_text(0).unwrap(), "aX");
        assert_eq!(buf.line_text(1).unwrap(), "Yb");
    }

    #[test]
    fn delete_range_crossing_line_joins_lines() {
        let mut buf = TextBuffer::new(WidthMethod::Unicode);
        buf.set_text("foo\nbar");
        let start = buf.coords_to_offset(Coords { row: 0, col: 1 }).unwrap();
        let end = buf.coords_to_offset(Coords { row: 1, col: 1 }).unwrap();
        buf.delete_range(start, end).unwrap();
        assert_eq!(buf.line_count(), 1);
        assert_eq!(buf.text(), "far");
    }

    #[test]
    fn highlight_by_char_range_splits_across_lines() {
        let mut buf = TextBuffer::new(WidthMethod::Unicode);
        buf.set_text("foo\nbar");
        buf.add_highlight_by_char_range(1, 4, 7, 0, 1).unwrap();
        assert_eq!(buf.get_line_highlights(0).len(), 1);
        assert_eq!(buf.get_line_highlights(1).len(), 1);
        assert_eq!(buf.get_line_highlights(0)[0].col_start, 1);
        assert_eq!(buf.get_line_highlights(1)[0].col_end, 1);
    }

    #[test]
    fn get_line_spans_resolves_priority_overlap() {
        let mut buf = TextBuffer::new(WidthMethod::Unicode);
        buf.set_text("hello");
        buf.add_highlight(0, 0, 5, 1, 0, 1).unwrap();
        buf.add_highlight(0, 2, 4, 7, 5, 2).unwrap();
        let spans = buf.get_line_spans(0).unwrap();
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[1].style_id, 7);
        assert_eq!(spans[1].col, 2);
        assert_eq!(spans[1].len, 2);
    }

    #[test]
    fn style_at_finds_containing_span() {
        let mut buf = TextBuffer::new(WidthMethod::Unicode);
        buf.set_text("hello");
        buf.add_highlight(0, 1, 3, 9, 0, 1).unwrap();
        assert_eq!(buf.style_at(2).unwrap(), Some(9));
        assert_eq!(buf.style_at(4).unwrap(), None);
    }

    #[test]
    fn set_styled_text_makes_chunk_style_resolvable_via_get_line_spans() {
        let mut buf = TextBuffer::new(WidthMethod::Unicode);
        buf.set_styled_text(&[StyledChunk { text: "hi", style: StyleDefinition::default() }]).unwrap();
        let spans = buf.get_line_spans(0).unwrap();
        assert_eq!(spans, vec![LineSpan { col: 0, len: 2, style_id: spans[0].style_id }]);
        assert!(buf.inline_style(spans[0].style_id).is_some());
        assert_eq!(buf.style_at(1).unwrap(), Some(spans[0].style_id));
    }

    #[test]
    fn pool_tracks_multi_byte_clusters_only() {
        let mut buf = TextBuffer::new(WidthMethod::Unicode);
        buf.set_text("a界b");
        assert_eq!(buf.tracked_ids.len(), 1);
        assert_eq!(buf.pool().get(buf.tracked_ids[0]).unwrap(), "界".as_bytes());
    }
}
