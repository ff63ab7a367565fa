//! Cursor model, grapheme-correct motion, word boundaries, undo/redo, and
//! change notification over a [`core_buffer::TextBuffer`] (spec §4.6).

mod undo;
mod word;

use core_buffer::{BufferError, TextBuffer};
use core_events::Emitter;
use core_rope::Coords;
use core_width::WidthMethod;
use thiserror::Error;
use undo::UndoEngine;
use word::{ClusterKind, classify_cluster};

#[derive(Debug, Error)]
pub enum EditError {
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Cursor position. `row`/`col` are document-absolute and display-width —
/// a wide grapheme advances `col` by its cell width, not by one — matching
/// what a caller rendering a caret or reading a column back from a mouse
/// click actually means by "column". `offset` is the flat grapheme-cluster
/// *step* offset `core-buffer`/`core-rope` address text by internally
/// (every splicing primitive below — `insert`, `delete_range`, undo
/// snapshots — already works in that unit); it is not display-width, an
/// intentional scope cut over converting every edit primitive along with
/// it. `buffer().offset_to_coords`/`col_to_display` recover a position's
/// step coordinates or display column from the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub row: usize,
    pub col: usize,
    pub offset: usize,
    /// Column (display-width) a vertical motion is trying to return to on
    /// narrower lines in between. Cleared by any horizontal motion or
    /// direct cursor set.
    pub desired_col: Option<usize>,
}

impl Cursor {
    fn origin() -> Self {
        Self {
            row: 0,
            col: 0,
            offset: 0,
            desired_col: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorChangedEvent {
    pub cursor: Cursor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentChangedEvent {
    pub content_epoch: u64,
}

pub struct EditBuffer {
    buffer: TextBuffer,
    cursor: Cursor,
    undo: UndoEngine,
    width_method: WidthMethod,
    cursor_changed: Emitter<CursorChangedEvent>,
    content_changed: Emitter<ContentChangedEvent>,
}

impl EditBuffer {
    pub fn new(width_method: WidthMethod) -> Self {
        Self {
            buffer: TextBuffer::new(width_method),
            cursor: Cursor::origin(),
            undo: UndoEngine::new(),
            width_method,
            cursor_changed: Emitter::new(),
            content_changed: Emitter::new(),
        }
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn on_cursor_changed(
        &mut self,
        listener: impl FnMut(&CursorChangedEvent, &core_events::Unsubscriber) + 'static,
    ) -> core_events::ListenerId {
        self.cursor_changed.on(listener)
    }

    pub fn on_content_changed(
        &mut self,
        listener: impl FnMut(&ContentChangedEvent, &core_events::Unsubscriber) + 'static,
    ) -> core_events::ListenerId {
        self.content_changed.on(listener)
    }

    fn emit_cursor_changed(&mut self) {
        let event = CursorChangedEvent { cursor: self.cursor };
        self.cursor_changed.emit(&event);
    }

    fn emit_content_changed(&mut self) {
        let event = ContentChangedEvent {
            content_epoch: self.buffer.content_epoch(),
        };
        self.content_changed.emit(&event);
    }

    // ---------------------------------------------------------------
    // Whole-document replacement
    // ---------------------------------------------------------------

    /// Replaces the whole document and clears undo/redo history.
    pub fn set_text(&mut self, text: &str) {
        self.buffer.set_text(text);
        self.undo.clear();
        self.cursor = Cursor::origin();
        self.emit_content_changed();
        self.emit_cursor_changed();
    }

    /// Replaces the whole document but, unlike [`set_text`](Self::set_text),
    /// records the previous content as an undo step.
    pub fn replace_text(&mut self, text: &str) {
        self.snapshot_before_discrete_edit();
        self.buffer.replace_text(text);
        self.cursor = Cursor::origin();
        self.emit_content_changed();
        self.emit_cursor_changed();
    }

    // ---------------------------------------------------------------
    // Cursor placement
    // ---------------------------------------------------------------

    /// Places the cursor at `(row, col)`, clamped into the document, and
    /// resets any pending sticky column.
    pub fn set_cursor(&mut self, row: usize, col: usize) -> Result<(), EditError> {
        self.place_cursor(row, col)?;
        self.emit_cursor_changed();
        Ok(())
    }

    pub fn set_cursor_by_offset(&mut self, offset: usize) -> Result<(), EditError> {
        let coords = self.buffer.offset_to_coords(offset)?;
        self.place_cursor_step(coords.row, coords.col)?;
        self.emit_cursor_changed();
        Ok(())
    }

    pub fn goto_line(&mut self, row: usize) -> Result<(), EditError> {
        self.place_cursor_step(row, 0)?;
        self.emit_cursor_changed();
        Ok(())
    }

    /// Places the cursor at `(row, col)`, `col` a grapheme-cluster *step*
    /// column — the unit `core-buffer`/`core-rope` splice text in, used by
    /// callers that already hold a step coordinate (word boundaries,
    /// offset lookups). Callers with a display-width column go through
    /// [`place_cursor`](Self::place_cursor) instead.
    fn place_cursor_step(&mut self, row: usize, col: usize) -> Result<(), EditError> {
        let row = row.min(self.buffer.line_count().saturating_sub(1));
        let col = col.min(self.buffer.line_len(row)?);
        let offset = self.buffer.coords_to_offset(Coords { row, col })?;
        let col = self.buffer.col_to_display(row, col)? as usize;
        self.cursor = Cursor {
            row,
            col,
            offset,
            desired_col: None,
        };
        Ok(())
    }

    /// Places the cursor at `(row, col)`, `col` a display-width column —
    /// [`Cursor::col`]'s own unit, clamped into the document.
    fn place_cursor(&mut self, row: usize, col: usize) -> Result<(), EditError> {
        let row = row.min(self.buffer.line_count().saturating_sub(1));
        let display_col = col.min(u16::MAX as usize) as u16;
        let step_col = self.buffer.display_to_col(row, display_col)?;
        self.place_cursor_step(row, step_col)
    }

    // ---------------------------------------------------------------
    // Logical motion
    // ---------------------------------------------------------------

    /// Moves left by one grapheme cluster. `Cursor::col` advances by
    /// whatever that cluster's display width is (one cell for most text,
    /// more for a wide glyph) since it is recomputed from the resulting
    /// step position, not decremented directly.
    pub fn move_left(&mut self) -> Result<(), EditError> {
        let coords = self.buffer.offset_to_coords(self.cursor.offset)?;
        let (row, col) = if coords.col > 0 {
            (coords.row, coords.col - 1)
        } else if coords.row > 0 {
            let row = coords.row - 1;
            (row, self.buffer.line_len(row)?)
        } else {
            (coords.row, coords.col)
        };
        self.place_cursor_step(row, col)?;
        self.emit_cursor_changed();
        Ok(())
    }

    pub fn move_right(&mut self) -> Result<(), EditError> {
        let coords = self.buffer.offset_to_coords(self.cursor.offset)?;
        let line_len = self.buffer.line_len(coords.row)?;
        let (row, col) = if coords.col < line_len {
            (coords.row, coords.col + 1)
        } else if coords.row + 1 < self.buffer.line_count() {
            (coords.row + 1, 0)
        } else {
            (coords.row, coords.col)
        };
        self.place_cursor_step(row, col)?;
        self.emit_cursor_changed();
        Ok(())
    }

    /// Moves up one line, restoring `desired_col` when the line above is
    /// wide enough, and re-clamping it (without forgetting it) on narrower
    /// lines, so a later `move_up`/`move_down` can still aim for the
    /// original column. `desired`/`col` are display-width; `place_cursor`
    /// does the clamp-to-line-width itself, snapping a column that would
    /// land mid-glyph back to that glyph's own start.
    pub fn move_up(&mut self) -> Result<(), EditError> {
        if self.cursor.row == 0 {
            return Ok(());
        }
        let desired = self.cursor.desired_col.unwrap_or(self.cursor.col);
        let row = self.cursor.row - 1;
        self.place_cursor(row, desired)?;
        self.cursor.desired_col = Some(desired);
        self.emit_cursor_changed();
        Ok(())
    }

    pub fn move_down(&mut self) -> Result<(), EditError> {
        if self.cursor.row + 1 >= self.buffer.line_count() {
            return Ok(());
        }
        let desired = self.cursor.desired_col.unwrap_or(self.cursor.col);
        let row = self.cursor.row + 1;
        self.place_cursor(row, desired)?;
        self.cursor.desired_col = Some(desired);
        self.emit_cursor_changed();
        Ok(())
    }

    // ---------------------------------------------------------------
    // Word boundaries
    // ---------------------------------------------------------------

    fn line_clusters(&self, row: usize) -> Result<Vec<String>, EditError> {
        let text = self.buffer.line_text(row)?;
        Ok(core_width::clusters(&text, self.width_method)
            .into_iter()
            .map(|c| text[c.start..c.end].to_string())
            .collect())
    }

    pub fn next_word_boundary(&mut self) -> Result<(), EditError> {
        let mut row = self.cursor.row;
        let mut clusters = self.line_clusters(row)?;
        let mut col = self.buffer.offset_to_coords(self.cursor.offset)?.col.min(clusters.len());

        if col >= clusters.len() {
            word::skip_blanks_forward(self, &mut row, &mut col, &mut clusters)?;
        } else {
            let kind = classify_cluster(&clusters[col]);
            col = match kind {
                ClusterKind::Blank => col + 1,
                kind => word::skip_kind_forward(&clusters, col, kind),
            };
            word::skip_blanks_forward(self, &mut row, &mut col, &mut clusters)?;
        }
        self.place_cursor_step(row, col)?;
        self.emit_cursor_changed();
        Ok(())
    }

    pub fn prev_word_boundary(&mut self) -> Result<(), EditError> {
        let mut row = self.cursor.row;
        let mut clusters = self.line_clusters(row)?;
        let mut col = self.buffer.offset_to_coords(self.cursor.offset)?.col.min(clusters.len());

        loop {
            if col == 0 {
                if !word::retreat_line(self, &mut row, &mut col, &mut clusters)? {
                    self.place_cursor_step(0, 0)?;
                    self.emit_cursor_changed();
                    return Ok(());
                }
                continue;
            }
            let kind = classify_cluster(&clusters[col - 1]);
            if kind == ClusterKind::Blank {
                col -= 1;
                continue;
            }
            col = word::skip_kind_backward(&clusters, col - 1, kind);
            self.place_cursor_step(row, col)?;
            self.emit_cursor_changed();
            return Ok(());
        }
    }

    pub(crate) fn advance_line_forward(&self, row: &mut usize, col: &mut usize, clusters: &mut Vec<String>) -> Result<bool, EditError> {
        if *row + 1 >= self.buffer.line_count() {
            *col = clusters.len();
            return Ok(false);
        }
        *row += 1;
        *clusters = self.line_clusters(*row)?;
        *col = 0;
        Ok(true)
    }

    pub(crate) fn retreat_line_impl(&self, row: &mut usize, col: &mut usize, clusters: &mut Vec<String>) -> Result<bool, EditError> {
        if *row == 0 {
            return Ok(false);
        }
        *row -= 1;
        *clusters = self.line_clusters(*row)?;
        *col = clusters.len();
        Ok(true)
    }

    // ---------------------------------------------------------------
    // Edits
    // ---------------------------------------------------------------

    fn snapshot_before_discrete_edit(&mut self) {
        let text = self.buffer.text();
        self.undo.push_discrete(&text, self.cursor);
    }

    fn snapshot_before_coalesced_edit(&mut self) {
        let text = self.buffer.text();
        self.undo.begin_insert_coalescing(&text, self.cursor);
    }

    /// Step coordinates right after inserting `s` at the cursor's prior
    /// position. `s` has already landed in the buffer when this runs, but
    /// nothing before the old offset shifted, so `offset_to_coords` on it
    /// still reports the insertion point's own (unchanged) row/col.
    fn advance_coords_past(&self, s: &str) -> Result<(usize, usize), EditError> {
        let count = |t: &str| core_width::clusters(t, self.width_method).len();
        Ok(match s.rfind('\n') {
            Some(last_nl) => {
                let newlines = s.matches('\n').count();
                (self.cursor.row + newlines, count(&s[last_nl + 1..]))
            }
            None => {
                let col = self.buffer.offset_to_coords(self.cursor.offset)?.col;
                (self.cursor.row, col + count(s))
            }
        })
    }

    /// Inserts `s` at the cursor. Consecutive calls coalesce into one undo
    /// step until [`end_insert_run`](Self::end_insert_run) is called or a
    /// non-insert edit breaks the run.
    pub fn insert_text(&mut self, s: &str) -> Result<(), EditError> {
        self.snapshot_before_coalesced_edit();
        self.buffer.insert(self.cursor.offset, s)?;
        let (row, col) = self.advance_coords_past(s)?;
        self.place_cursor_step(row, col)?;
        self.undo.note_insert_edit();
        self.emit_content_changed();
        self.emit_cursor_changed();
        Ok(())
    }

    /// Ends the current coalesced insert run, so the next `insert_text`
    /// starts a fresh undo step instead of folding into this one.
    pub fn end_insert_run(&mut self) {
        self.undo.end_insert_coalescing();
    }

    pub fn backspace(&mut self) -> Result<(), EditError> {
        if self.cursor.offset == 0 {
            return Ok(());
        }
        self.snapshot_before_discrete_edit();
        let coords = self.buffer.offset_to_coords(self.cursor.offset)?;
        let (row, col) = if coords.col > 0 {
            let col = coords.col - 1;
            let from = self.buffer.coords_to_offset(Coords { row: coords.row, col })?;
            self.buffer.delete_range(from, self.cursor.offset)?;
            (coords.row, col)
        } else {
            // Column zero: there's no character to delete, just the line
            // break joining this line to the previous one. A line break
            // costs zero steps, so `delete_range` has no non-empty range
            // to act on here; `join_line` is the dedicated primitive.
            let row = coords.row - 1;
            let col = self.buffer.line_len(row)?;
            self.buffer.join_line(row)?;
            (row, col)
        };
        self.place_cursor_step(row, col)?;
        self.emit_content_changed();
        self.emit_cursor_changed();
        Ok(())
    }

    pub fn delete_forward(&mut self) -> Result<(), EditError> {
        let coords = self.buffer.offset_to_coords(self.cursor.offset)?;
        let line_len = self.buffer.line_len(coords.row)?;
        if coords.col < line_len {
            let to = self.buffer.coords_to_offset(Coords {
                row: coords.row,
                col: coords.col + 1,
            })?;
            self.snapshot_before_discrete_edit();
            self.buffer.delete_range(self.cursor.offset, to)?;
        } else if coords.row + 1 < self.buffer.line_count() {
            self.snapshot_before_discrete_edit();
            self.buffer.join_line(coords.row)?;
        } else {
            return Ok(());
        }
        // Nothing before the cursor moved; row/col (display-width) stay
        // put, only the offset is recomputed in case an earlier line got
        // shorter.
        let offset = self.buffer.coords_to_offset(Coords { row: coords.row, col: coords.col })?;
        self.cursor.offset = offset;
        self.emit_content_changed();
        self.emit_cursor_changed();
        Ok(())
    }

    pub fn delete_range(&mut self, from: usize, to: usize) -> Result<(), EditError> {
        let (low, high) = if from <= to { (from, to) } else { (to, from) };
        self.snapshot_before_discrete_edit();
        self.buffer.delete_range(low, high)?;
        let coords = self.buffer.offset_to_coords(low)?;
        self.place_cursor_step(coords.row, coords.col)?;
        self.emit_content_changed();
        self.emit_cursor_changed();
        Ok(())
    }

    pub fn delete_line(&mut self) -> Result<(), EditError> {
        self.snapshot_before_discrete_edit();
        self.buffer.delete_full_line(self.cursor.row)?;
        let row = self.cursor.row.min(self.buffer.line_count().saturating_sub(1));
        self.place_cursor_step(row, 0)?;
        self.emit_content_changed();
        self.emit_cursor_changed();
        Ok(())
    }

    // ---------------------------------------------------------------
    // History
    // ---------------------------------------------------------------

    pub fn undo(&mut self) -> bool {
        let current_text = self.buffer.text();
        let Some((text, cursor)) = self.undo.undo(&current_text, self.cursor) else {
            return false;
        };
        self.buffer.replace_text(&text);
        self.cursor = self.clamp_cursor_best_effort(cursor);
        self.emit_content_changed();
        self.emit_cursor_changed();
        true
    }

    pub fn redo(&mut self) -> bool {
        let current_text = self.buffer.text();
        let Some((text, cursor)) = self.undo.redo(&current_text, self.cursor) else {
            return false;
        };
        self.buffer.replace_text(&text);
        self.cursor = self.clamp_cursor_best_effort(cursor);
        self.emit_content_changed();
        self.emit_cursor_changed();
        true
    }

    fn clamp_cursor_best_effort(&mut self, cursor: Cursor) -> Cursor {
        self.place_cursor(cursor.row, cursor.col)
            .map(|_| self.cursor)
            .unwrap_or_else(|_| {
                tracing::warn!(
                    target: "core.edit",
                    row = cursor.row,
                    col = cursor.col,
                    "undo/redo snapshot cursor out of range, resetting to origin"
                );
                Cursor::origin()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_width::WidthMethod;

    #[test]
    fn insert_and_cursor_advance_across_newline() {
        let mut edit = EditBuffer::new(WidthMethod::Unicode);
        edit.set_text("ab");
        edit.set_cursor(0, 1).unwrap();
        edit.insert_text("X\nY").unwrap();
        assert_eq!(edit.buffer().line_text(0).unwrap(), "aX");
        assert_eq!(edit.buffer().line_text(1).unwrap(), "Yb");
        assert_eq!(edit.cursor(), Cursor { row: 1, col: 1, offset: 3, desired_col: None });
    }

    #[test]
    fn move_up_down_restores_sticky_column() {
        let mut edit = EditBuffer::new(WidthMethod::Unicode);
        edit.set_text("longer line\nhi\nlonger line");
        edit.set_cursor(0, 8).unwrap();
        edit.move_down().unwrap();
        assert_eq!(edit.cursor().col, 2); // clamped to "hi"'s length
        edit.move_down().unwrap();
        assert_eq!(edit.cursor().col, 8); // restored on a long enough line
    }

    #[test]
    fn backspace_joins_lines_at_line_start() {
        let mut edit = EditBuffer::new(WidthMethod::Unicode);
        edit.set_text("foo\nbar");
        edit.set_cursor(1, 0).unwrap();
        edit.backspace().unwrap();
        assert_eq!(edit.buffer().text(), "foobar");
        assert_eq!(edit.cursor(), Cursor { row: 0, col: 3, offset: 3, desired_col: None });
    }

    #[test]
    fn word_forward_skips_punctuation_and_whitespace() {
        let mut edit = EditBuffer::new(WidthMethod::Unicode);
        edit.set_text("foo, bar");
        edit.set_cursor(0, 0).unwrap();
        edit.next_word_boundary().unwrap();
        assert_eq!(edit.cursor().col, 3); // stop at the comma
        edit.next_word_boundary().unwrap();
        assert_eq!(edit.cursor().col, 5); // comma + blank skipped, landed on "bar"
    }

    #[test]
    fn word_backward_crosses_blank_line() {
        let mut edit = EditBuffer::new(WidthMethod::Unicode);
        edit.set_text("alpha\n\nbeta");
        edit.set_cursor(2, 0).unwrap();
        edit.prev_word_boundary().unwrap();
        assert_eq!(edit.cursor(), Cursor { row: 0, col: 0, offset: 0, desired_col: None });
    }

    #[test]
    fn undo_redo_round_trip_restores_text_and_cursor() {
        let mut edit = EditBuffer::new(WidthMethod::Unicode);
        edit.set_text("ab");
        edit.set_cursor(0, 2).unwrap();
        edit.insert_text("c").unwrap();
        assert_eq!(edit.buffer().text(), "abc");
        assert!(edit.undo());
        assert_eq!(edit.buffer().text(), "ab");
        assert_eq!(edit.cursor().col, 2);
        assert!(edit.redo());
        assert_eq!(edit.buffer().text(), "abc");
    }

    #[test]
    fn consecutive_inserts_coalesce_into_one_undo_step() {
        let mut edit = EditBuffer::new(WidthMethod::Unicode);
        edit.set_text("");
        edit.insert_text("a").unwrap();
        edit.insert_text("b").unwrap();
        edit.insert_text("c").unwrap();
        assert_eq!(edit.buffer().text(), "abc");
        assert!(edit.undo());
        assert_eq!(edit.buffer().text(), "");
        assert!(!edit.undo());
    }

    #[test]
    fn cursor_changed_listener_fires_on_motion() {
        let mut edit = EditBuffer::new(WidthMethod::Unicode);
        edit.set_text("ab");
        let count = std::rc::Rc::new(std::cell::Cell::new(0));
        let count_inner = count.clone();
        edit.on_cursor_changed(move |_, _| count_inner.set(count_inner.get() + 1));
        edit.move_right().unwrap();
        edit.move_right().unwrap();
        assert_eq!(count.get(), 2);
    }
}
