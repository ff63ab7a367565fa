//! Couples an [`core_edit::EditBuffer`] to a [`core_view::TextBufferView`]:
//! scroll margins, logical/visual cursor translation, visual vertical
//! motion, and the placeholder-overlay shadow buffer (spec §4.7).
//!
//! Nothing here duplicates `core-edit`'s motion logic or `core-view`'s wrap
//! math; this crate only adds the glue a terminal UI needs to keep a
//! viewport and a cursor in agreement after either one moves.

use core_buffer::{BufferError, StyledChunk, TextBuffer};
use core_edit::{Cursor, EditBuffer, EditError};
use core_style::StyleDefinition;
use core_view::{TextBufferView, ViewError, Viewport};
use core_width::WidthMethod;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditorViewError {
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    View(#[from] ViewError),
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Picks the buffer this view currently renders: the real edit buffer, or
/// the placeholder shadow while it's empty and a placeholder is set. A free
/// function (rather than a `&self` method) so call sites borrow only
/// `edit`/`shadow`, leaving `view` free for a disjoint `&mut` borrow.
fn select_buffer<'a>(edit: &'a EditBuffer, shadow: &'a Option<TextBuffer>) -> &'a TextBuffer {
    match shadow {
        Some(s) if edit.buffer().length() == 0 => s,
        _ => edit.buffer(),
    }
}

/// `max(1, round(margin * dim))`, clamped to `(dim-1)/2` (spec §4.7 scroll
/// margin). A `dim` of 0 has no margin to keep.
fn margin_cells(dim: u16, margin: f32) -> u16 {
    if dim == 0 {
        return 0;
    }
    let raw = (margin.clamp(0.0, 0.5) * dim as f32).round();
    let m = (raw as u16).max(1);
    let max_margin = dim.saturating_sub(1) / 2;
    m.min(max_margin)
}

/// Whether `cursor` sitting at `first..first+dim` with `margin` cells of
/// slack needs `first` to move, and to what.
fn scroll_target(first: usize, cursor: usize, dim: usize, margin: usize) -> Option<usize> {
    if dim == 0 {
        return None;
    }
    let m = margin.min(dim / 2);
    let top = first;
    let bottom = first + dim;
    if cursor < top + m {
        let new_first = cursor.saturating_sub(m);
        (new_first != first).then_some(new_first)
    } else if cursor + m >= bottom {
        let new_first = cursor + m + 1 - dim;
        (new_first != first).then_some(new_first)
    } else {
        None
    }
}

pub struct EditorView {
    edit: EditBuffer,
    view: TextBufferView,
    shadow: Option<TextBuffer>,
    width_method: WidthMethod,
    scroll_margin: f32,
    /// Visual column a vertical motion is trying to return to across
    /// empty/narrow virtual lines. Cleared by any horizontal motion.
    desired_visual_col: Option<usize>,
}

impl EditorView {
    pub fn new(width_method: WidthMethod) -> Self {
        Self {
            edit: EditBuffer::new(width_method),
            view: TextBufferView::new(),
            shadow: None,
            width_method,
            scroll_margin: 0.0,
            desired_visual_col: None,
        }
    }

    pub fn edit(&self) -> &EditBuffer {
        &self.edit
    }

    pub fn view(&self) -> &TextBufferView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut TextBufferView {
        &mut self.view
    }

    /// The buffer currently being presented: the real content, or the
    /// placeholder shadow while it's empty and a placeholder is set.
    pub fn active_buffer(&self) -> &TextBuffer {
        select_buffer(&self.edit, &self.shadow)
    }

    // ---------------------------------------------------------------
    // Placeholder overlay
    // ---------------------------------------------------------------

    /// Installs or clears the placeholder shown when the buffer is empty.
    /// `None` (or empty text) hides the overlay; otherwise the view reads
    /// from a shadow buffer holding `text` styled with `style` until real
    /// content is typed.
    pub fn set_placeholder(&mut self, text: Option<&str>, style: StyleDefinition) -> Result<(), EditorViewError> {
        match text {
            Some(t) if !t.is_empty() => {
                tracing::trace!(target: "core.editview", len = t.len(), "placeholder installed");
                let mut shadow = TextBuffer::new(self.width_method);
                shadow.set_styled_text(&[StyledChunk { text: t, style }])?;
                self.shadow = Some(shadow);
            }
            _ => {
                if self.shadow.take().is_some() {
                    tracing::trace!(target: "core.editview", "placeholder cleared");
                }
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Scroll margin
    // ---------------------------------------------------------------

    pub fn set_scroll_margin(&mut self, margin: f32) {
        self.scroll_margin = margin.clamp(0.0, 0.5);
    }

    pub fn scroll_margin(&self) -> f32 {
        self.scroll_margin
    }

    // ---------------------------------------------------------------
    // Logical <-> visual cursor translation
    // ---------------------------------------------------------------

    /// Clamps `(row, col)` into the buffer, locates the virtual line that
    /// covers `col`, and returns its absolute index plus the column within
    /// it (spec §4.7 `logicalToVisualCursor`).
    pub fn logical_to_visual_cursor(&mut self, row: usize, col: usize) -> Result<(usize, usize), EditorViewError> {
        let buffer = select_buffer(&self.edit, &self.shadow);
        let line_count = buffer.line_count();
        let row = row.min(line_count.saturating_sub(1));
        // `col` arrives display-width (it's `Cursor::col`); `vline.chunks`
        // below is step-indexed, one entry per grapheme cluster.
        let display_col = col.min(u16::MAX as usize) as u16;
        let col = buffer.display_to_col(row, display_col)?;

        let info = self.view.get_cached_line_info(buffer)?;
        let start = info.starts[row];
        let end = if row + 1 < line_count { info.starts[row + 1] } else { usize::MAX };

        let lines = self.view.virtual_lines(buffer)?;
        let end = end.min(lines.len());
        let last = end.saturating_sub(1).max(start);
        for i in start..end {
            let vline = &lines[i];
            let len = vline.chunks.len();
            if col < vline.source_col_offset + len || i == last {
                let vcol = col.saturating_sub(vline.source_col_offset).min(len);
                return Ok((i, vcol));
            }
        }
        Ok((start, 0))
    }

    /// Maps an absolute virtual-line index and column back to `(row, col)`,
    /// or `None` when `vrow` is out of range (spec §4.7
    /// `visualToLogicalCursor`).
    pub fn visual_to_logical_cursor(&mut self, vrow: usize, vcol: usize) -> Result<Option<(usize, usize)>, EditorViewError> {
        let buffer = select_buffer(&self.edit, &self.shadow);
        let lines = self.view.virtual_lines(buffer)?;
        let Some(vline) = lines.get(vrow) else {
            return Ok(None);
        };
        let vcol = vcol.min(vline.chunks.len());
        let row = vline.source_line;
        let step_col = vline.source_col_offset + vcol;
        // Step column back to display-width before handing it to a caller
        // that feeds it to `EditBuffer::set_cursor`.
        let col = buffer.col_to_display(row, step_col)? as usize;
        Ok(Some((row, col)))
    }

    // ---------------------------------------------------------------
    // Visual vertical motion
    // ---------------------------------------------------------------

    pub fn move_up_visual(&mut self) -> Result<(), EditorViewError> {
        let cursor = self.edit.cursor();
        let (vrow, vcol) = self.logical_to_visual_cursor(cursor.row, cursor.col)?;
        if vrow == 0 {
            return Ok(());
        }
        let desired = self.desired_visual_col.unwrap_or(vcol);
        if let Some((row, col)) = self.visual_to_logical_cursor(vrow - 1, desired)? {
            self.edit.set_cursor(row, col)?;
        }
        self.desired_visual_col = Some(desired);
        self.ensure_cursor_visible()?;
        Ok(())
    }

    pub fn move_down_visual(&mut self) -> Result<(), EditorViewError> {
        let cursor = self.edit.cursor();
        let (vrow, vcol) = self.logical_to_visual_cursor(cursor.row, cursor.col)?;
        let buffer = select_buffer(&self.edit, &self.shadow);
        let total = self.view.virtual_lines(buffer)?.len();
        if vrow + 1 >= total {
            return Ok(());
        }
        let desired = self.desired_visual_col.unwrap_or(vcol);
        if let Some((row, col)) = self.visual_to_logical_cursor(vrow + 1, desired)? {
            self.edit.set_cursor(row, col)?;
        }
        self.desired_visual_col = Some(desired);
        self.ensure_cursor_visible()?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Horizontal motion / edits (reset the sticky visual column and
    // re-scroll, mirroring how the vertical movers keep it)
    // ---------------------------------------------------------------

    fn after_horizontal_change(&mut self) -> Result<(), EditorViewError> {
        self.desired_visual_col = None;
        self.ensure_cursor_visible()
    }

    pub fn move_left(&mut self) -> Result<(), EditorViewError> {
        self.edit.move_left()?;
        self.after_horizontal_change()
    }

    pub fn move_right(&mut self) -> Result<(), EditorViewError> {
        self.edit.move_right()?;
        self.after_horizontal_change()
    }

    pub fn set_cursor(&mut self, row: usize, col: usize) -> Result<(), EditorViewError> {
        self.edit.set_cursor(row, col)?;
        self.after_horizontal_change()
    }

    pub fn insert_text(&mut self, s: &str) -> Result<(), EditorViewError> {
        self.edit.insert_text(s)?;
        self.after_horizontal_change()
    }

    pub fn backspace(&mut self) -> Result<(), EditorViewError> {
        self.edit.backspace()?;
        self.after_horizontal_change()
    }

    pub fn delete_forward(&mut self) -> Result<(), EditorViewError> {
        self.edit.delete_forward()?;
        self.after_horizontal_change()
    }

    pub fn next_word_boundary(&mut self) -> Result<(), EditorViewError> {
        self.edit.next_word_boundary()?;
        self.after_horizontal_change()
    }

    pub fn prev_word_boundary(&mut self) -> Result<(), EditorViewError> {
        self.edit.prev_word_boundary()?;
        self.after_horizontal_change()
    }

    pub fn undo(&mut self) -> Result<bool, EditorViewError> {
        let changed = self.edit.undo();
        self.after_horizontal_change()?;
        Ok(changed)
    }

    pub fn redo(&mut self) -> Result<bool, EditorViewError> {
        let changed = self.edit.redo();
        self.after_horizontal_change()?;
        Ok(changed)
    }

    // ---------------------------------------------------------------
    // Ensure-cursor-visible scrolling
    // ---------------------------------------------------------------

    /// Scrolls the viewport so the cursor sits at least `scroll_margin`
    /// cells from every edge, clamped to the viewport's extent (spec §4.7
    /// "Ensure-cursor-visible").
    pub fn ensure_cursor_visible(&mut self) -> Result<(), EditorViewError> {
        let cursor: Cursor = self.edit.cursor();
        let (vrow, vcol) = self.logical_to_visual_cursor(cursor.row, cursor.col)?;
        let mut viewport: Viewport = self.view.viewport();

        let vmargin = margin_cells(viewport.height, self.scroll_margin) as usize;
        if let Some(new_y) = scroll_target(viewport.y, vrow, viewport.height as usize, vmargin) {
            viewport.y = new_y;
        }
        let hmargin = margin_cells(viewport.width, self.scroll_margin) as usize;
        if let Some(new_x) = scroll_target(viewport.x, vcol, viewport.width as usize, hmargin) {
            viewport.x = new_x;
        }
        self.view.set_viewport(viewport);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_style::Color;

    fn mk(text: &str, width: u16, height: u16) -> EditorView {
        let mut ev = EditorView::new(WidthMethod::Unicode);
        ev.edit.set_text(text);
        ev.view.set_viewport_size(ev.edit.buffer(), width, height).unwrap();
        ev
    }

    #[test]
    fn logical_to_visual_round_trips_through_visual_to_logical() {
        let mut ev = mk("alpha\nbeta\ngamma", 80, 10);
        let (vrow, vcol) = ev.logical_to_visual_cursor(1, 2).unwrap();
        assert_eq!((vrow, vcol), (1, 2));
        let back = ev.visual_to_logical_cursor(vrow, vcol).unwrap();
        assert_eq!(back, Some((1, 2)));
    }

    #[test]
    fn visual_to_logical_out_of_range_row_is_none() {
        let mut ev = mk("one line", 80, 10);
        assert_eq!(ev.visual_to_logical_cursor(50, 0).unwrap(), None);
    }

    #[test]
    fn move_down_visual_then_up_visual_restores_sticky_column() {
        let mut ev = mk("longer line\nhi\nlonger line", 80, 10);
        ev.set_cursor(0, 8).unwrap();
        ev.move_down_visual().unwrap();
        assert_eq!(ev.edit().cursor().col, 2); // clamped onto "hi"
        ev.move_down_visual().unwrap();
        assert_eq!(ev.edit().cursor().col, 8); // restored on a long enough line
    }

    #[test]
    fn horizontal_motion_clears_the_sticky_visual_column() {
        let mut ev = mk("longer line\nhi\nlonger line", 80, 10);
        ev.set_cursor(0, 8).unwrap();
        ev.move_down_visual().unwrap();
        ev.move_left().unwrap();
        assert_eq!(ev.desired_visual_col, None);
    }

    #[test]
    fn ensure_cursor_visible_scrolls_down_past_the_bottom_margin() {
        let mut ev = mk("0\n1\n2\n3\n4\n5\n6\n7\n8\n9", 80, 5);
        // Even a 0.0 margin still keeps at least 1 cell of slack per the
        // `max(1, round(margin * dim))` rule, so this scrolls by 2, not 1.
        ev.set_scroll_margin(0.0);
        ev.set_cursor(5, 0).unwrap();
        assert_eq!(ev.view().viewport().y, 2);
    }

    #[test]
    fn placeholder_is_shown_only_while_the_buffer_is_empty() {
        let mut ev = mk("", 80, 10);
        ev.set_placeholder(Some("type here"), StyleDefinition { fg: Some(Color::Indexed(8)), ..Default::default() }).unwrap();
        assert_eq!(ev.active_buffer().text(), "type here");
        ev.insert_text("x").unwrap();
        assert_eq!(ev.active_buffer().text(), "x");
    }

    #[test]
    fn no_placeholder_means_active_buffer_is_always_the_real_one() {
        let mut ev = mk("", 80, 10);
        assert_eq!(ev.active_buffer().text(), "");
    }

    #[test]
    fn margin_cells_clamps_to_half_the_dimension() {
        assert_eq!(margin_cells(10, 0.5), 4); // (10-1)/2 = 4
        assert_eq!(margin_cells(0, 0.2), 0);
        assert_eq!(margin_cells(20, 0.05), 1); // round(1.0) = 1, max(1,_) = 1
    }
}
