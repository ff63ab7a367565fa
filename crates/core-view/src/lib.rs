//! Presents a [`core_buffer::TextBuffer`] as a sequence of virtual lines
//! under a wrap policy, plus viewport scrolling and selection (spec §4.5).
//!
//! Nothing here mutates the buffer; a view only reads it and caches a
//! projection keyed by `(content_epoch, wrap_width, wrap_mode)` so repeated
//! reads between edits are free.

mod wrap;

pub use wrap::{ChunkView, VirtualLine, WrapMode};

use core_buffer::TextBuffer;
use core_style::Color;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error(transparent)]
    Buffer(#[from] core_buffer::BufferError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: usize,
    pub y: usize,
    pub width: u16,
    pub height: u16,
}

/// A document-wide, step-addressed selection. Empty (`start == end`) is
/// reported as absent rather than as a zero-width range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
    pub bg: Option<Color>,
    pub fg: Option<Color>,
}

pub struct LineInfo {
    /// Index of the first virtual line belonging to each logical line.
    pub starts: Vec<usize>,
    /// Each logical line's full unwrapped display width.
    pub widths: Vec<u16>,
}

pub struct Dimensions {
    pub line_count: usize,
    pub max_width: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CacheKey {
    content_epoch: u64,
    width: u16,
    wrap_mode: WrapMode,
    tab_width: u16,
    tab_indicator: bool,
    truncate: bool,
}

struct Cache {
    key: CacheKey,
    lines: Vec<VirtualLine>,
    /// `line_starts[i]` is the index into `lines` of logical line `i`'s
    /// first virtual line; `line_starts[line_count]` is `lines.len()`.
    line_starts: Vec<usize>,
}

pub struct TextBufferView {
    viewport: Viewport,
    wrap_mode: WrapMode,
    wrap_width: Option<u16>,
    truncate: bool,
    tab_indicator: bool,
    selection: Option<Selection>,
    cache: Option<Cache>,
    measure_cache: Option<(CacheKey, Dimensions)>,
}

impl Default for TextBufferView {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBufferView {
    pub fn new() -> Self {
        Self {
            viewport: Viewport::default(),
            wrap_mode: WrapMode::None,
            wrap_width: None,
            truncate: false,
            tab_indicator: false,
            selection: None,
            cache: None,
            measure_cache: None,
        }
    }

    // ---------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Resizes in place, preserving scroll offset and clamping it so the
    /// view never scrolls past the end of the content (spec §4.5
    /// `setViewportSize`): `y` to `max(0, total_vlines - h)`, and `x` to
    /// `max(0, max_line_width - w)` when wrapping is off (a wrapped view has
    /// no horizontal overflow to clamp against).
    pub fn set_viewport_size(&mut self, buffer: &TextBuffer, width: u16, height: u16) -> Result<(), ViewError> {
        self.viewport.width = width;
        self.viewport.height = height;
        self.clamp_scroll(buffer)
    }

    pub fn set_wrap_mode(&mut self, mode: WrapMode) {
        self.wrap_mode = mode;
    }

    pub fn set_wrap_width(&mut self, width: Option<u16>) {
        self.wrap_width = width;
    }

    pub fn set_truncate(&mut self, truncate: bool) {
        self.truncate = truncate;
    }

    pub fn set_tab_indicator(&mut self, enabled: bool) {
        self.tab_indicator = enabled;
    }

    // ---------------------------------------------------------------
    // Selection
    // ---------------------------------------------------------------

    pub fn set_selection(&mut self, start: usize, end: usize, bg: Option<Color>, fg: Option<Color>) {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        self.selection = if start == end { None } else { Some(Selection { start, end, bg, fg }) };
    }

    pub fn reset_selection(&mut self) {
        self.selection = None;
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// Converts viewport-local anchor/focus coordinates to a document
    /// selection via the current virtual-line layout. Returns `true` iff
    /// the selection actually changed.
    pub fn set_local_selection(
        &mut self,
        buffer: &TextBuffer,
        anchor_x: usize,
        anchor_y: usize,
        focus_x: usize,
        focus_y: usize,
        bg: Option<Color>,
        fg: Option<Color>,
    ) -> Result<bool, ViewError> {
        let a = self.local_to_offset(buffer, anchor_x, anchor_y)?;
        let f = self.local_to_offset(buffer, focus_x, focus_y)?;
        let before = self.selection;
        self.set_selection(a, f, bg, fg);
        Ok(before != self.selection)
    }

    pub fn reset_local_selection(&mut self) {
        self.reset_selection();
    }

    fn local_to_offset(&mut self, buffer: &TextBuffer, x: usize, y: usize) -> Result<usize, ViewError> {
        let viewport_y = self.viewport.y;
        let (source_line, col) = {
            let lines = self.virtual_lines(buffer)?;
            let vy = (viewport_y + y).min(lines.len().saturating_sub(1));
            let vline = &lines[vy];
            (vline.source_line, vline.source_col_offset + x.min(vline.chunks.len()))
        };
        Ok(buffer.coords_to_offset(core_rope::Coords { row: source_line, col })?)
    }

    /// `(start << 32) | end`, or `u64::MAX` when there is no selection.
    pub fn pack_selection_info(&self) -> u64 {
        match self.selection {
            Some(sel) => ((sel.start as u64) << 32) | (sel.end as u64 & 0xFFFF_FFFF),
            None => u64::MAX,
        }
    }

    pub fn get_selected_text_into_buffer(&self, buffer: &TextBuffer, out: &mut String) -> Result<usize, ViewError> {
        let Some(sel) = self.selection else {
            return Ok(0);
        };
        let before = out.len();
        append_offset_range(buffer, sel.start, sel.end, out)?;
        Ok(out.len() - before)
    }

    pub fn get_plain_text_into_buffer(&self, buffer: &TextBuffer, out: &mut String) -> usize {
        let before = out.len();
        out.push_str(&buffer.text());
        out.len() - before
    }

    // ---------------------------------------------------------------
    // Virtual lines
    // ---------------------------------------------------------------

    fn cache_key(&self, buffer: &TextBuffer, width: u16) -> CacheKey {
        CacheKey {
            content_epoch: buffer.content_epoch(),
            width,
            wrap_mode: self.wrap_mode,
            tab_width: buffer.tab_width(),
            tab_indicator: self.tab_indicator,
            truncate: self.truncate,
        }
    }

    fn build(&self, buffer: &TextBuffer, key: CacheKey) -> Result<(Vec<VirtualLine>, Vec<usize>), ViewError> {
        tracing::trace!(
            target: "core.view",
            rows = buffer.line_count(),
            width = key.width,
            wrap_mode = ?key.wrap_mode,
            "rebuilding virtual lines"
        );
        let method = buffer.width_method();
        let mut lines = Vec::new();
        let mut line_starts = Vec::with_capacity(buffer.line_count() + 1);
        for row in 0..buffer.line_count() {
            line_starts.push(lines.len());
            let text = buffer.line_text(row)?;
            if key.wrap_mode == WrapMode::None && key.truncate {
                lines.push(wrap::truncate_line(&text, method, key.tab_width, key.tab_indicator, key.width, row));
            } else {
                lines.extend(wrap::wrap_line(
                    &text,
                    method,
                    key.wrap_mode,
                    key.width,
                    key.tab_width,
                    key.tab_indicator,
                    row,
                ));
            }
        }
        line_starts.push(lines.len());
        Ok((lines, line_starts))
    }

    fn effective_width(&self) -> u16 {
        self.wrap_width.unwrap_or(self.viewport.width)
    }

    /// Returns the current virtual lines, recomputing when the document,
    /// wrap settings, or tab configuration have changed since the last
    /// read (spec §4.5 invalidation).
    pub fn virtual_lines(&mut self, buffer: &TextBuffer) -> Result<&[VirtualLine], ViewError> {
        let key = self.cache_key(buffer, self.effective_width());
        if self.cache.as_ref().is_none_or(|c| c.key != key) {
            let (lines, line_starts) = self.build(buffer, key)?;
            self.cache = Some(Cache { key, lines, line_starts });
        }
        Ok(&self.cache.as_ref().unwrap().lines)
    }

    pub fn virtual_line_count(&mut self, buffer: &TextBuffer) -> Result<usize, ViewError> {
        Ok(self.virtual_lines(buffer)?.len())
    }

    pub fn get_virtual_line_spans(
        &mut self,
        buffer: &TextBuffer,
        index: usize,
    ) -> Result<(usize, usize, Vec<core_buffer::LineSpan>), ViewError> {
        let key = self.cache_key(buffer, self.effective_width());
        if self.cache.as_ref().is_none_or(|c| c.key != key) {
            let (lines, line_starts) = self.build(buffer, key)?;
            self.cache = Some(Cache { key, lines, line_starts });
        }
        let cache = self.cache.as_ref().unwrap();
        let vline = &cache.lines[index];
        let spans = buffer.get_line_spans(vline.source_line)?;
        Ok((vline.source_line, vline.source_col_offset, spans))
    }

    pub fn get_cached_line_info(&mut self, buffer: &TextBuffer) -> Result<LineInfo, ViewError> {
        let key = self.cache_key(buffer, self.effective_width());
        if self.cache.as_ref().is_none_or(|c| c.key != key) {
            let (lines, line_starts) = self.build(buffer, key)?;
            self.cache = Some(Cache { key, lines, line_starts });
        }
        let cache = self.cache.as_ref().unwrap();
        let mut widths = Vec::with_capacity(buffer.line_count());
        for row in 0..buffer.line_count() {
            let from = cache.line_starts[row];
            let to = cache.line_starts[row + 1];
            widths.push(cache.lines[from..to].iter().map(|l| l.width).max().unwrap_or(0));
        }
        Ok(LineInfo { starts: cache.line_starts[..buffer.line_count()].to_vec(), widths })
    }

    /// Computes wrap for `(width, height)` without disturbing the cache
    /// used by [`virtual_lines`](Self::virtual_lines).
    pub fn measure_for_dimensions(&mut self, buffer: &TextBuffer, width: u16, _height: u16) -> Result<Dimensions, ViewError> {
        let key = self.cache_key(buffer, width);
        if let Some((cached_key, dims)) = &self.measure_cache {
            if *cached_key == key {
                return Ok(Dimensions { line_count: dims.line_count, max_width: dims.max_width });
            }
        }
        let (lines, _) = self.build(buffer, key)?;
        let max_width = lines.iter().map(|l| l.width).max().unwrap_or(0);
        let dims = Dimensions { line_count: lines.len(), max_width };
        let result = Dimensions { line_count: dims.line_count, max_width: dims.max_width };
        self.measure_cache = Some((key, dims));
        Ok(result)
    }

    /// Keeps the viewport's scroll offset within the document's virtual
    /// extent after a resize or edit that may have shrunk it (spec §4.5
    /// `setViewportSize`'s clamping rule, also usable standalone after an
    /// edit shrinks the content without a matching resize).
    pub fn clamp_scroll(&mut self, buffer: &TextBuffer) -> Result<(), ViewError> {
        let total = self.virtual_line_count(buffer)?;
        let max_y = total.saturating_sub(self.viewport.height as usize);
        self.viewport.y = self.viewport.y.min(max_y);
        if self.wrap_mode == WrapMode::None {
            let max_line_width = self.virtual_lines(buffer)?.iter().map(|l| l.width).max().unwrap_or(0);
            let max_x = max_line_width.saturating_sub(self.viewport.width) as usize;
            self.viewport.x = self.viewport.x.min(max_x);
        }
        Ok(())
    }
}

fn append_offset_range(buffer: &TextBuffer, start: usize, end: usize, out: &mut String) -> Result<(), ViewError> {
    let start_coords = buffer.offset_to_coords(start)?;
    let end_coords = buffer.offset_to_coords(end)?;
    if start_coords.row == end_coords.row {
        let text = buffer.line_text(start_coords.row)?;
        let clusters = core_width::clusters(&text, buffer.width_method());
        let from = clusters.get(start_coords.col).map(|c| c.start).unwrap_or(text.len());
        let to = clusters.get(end_coords.col).map(|c| c.start).unwrap_or(text.len());
        out.push_str(&text[from..to]);
        return Ok(());
    }
    for row in start_coords.row..=end_coords.row {
        let text = buffer.line_text(row)?;
        let clusters = core_width::clusters(&text, buffer.width_method());
        let from = if row == start_coords.row {
            clusters.get(start_coords.col).map(|c| c.start).unwrap_or(text.len())
        } else {
            0
        };
        let to = if row == end_coords.row {
            clusters.get(end_coords.col).map(|c| c.start).unwrap_or(text.len())
        } else {
            text.len()
        };
        out.push_str(&text[from..to]);
        if row != end_coords.row {
            out.push('\n');
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_width::WidthMethod;

    fn buffer_with(text: &str) -> TextBuffer {
        let mut buf = TextBuffer::new(WidthMethod::Unicode);
        buf.set_text(text);
        buf
    }

    #[test]
    fn none_mode_has_one_virtual_line_per_logical_line() {
        let buf = buffer_with("alpha\nbeta\ngamma");
        let mut view = TextBufferView::new();
        let lines = view.virtual_lines(&buf).unwrap();
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn wrapping_recomputes_when_epoch_changes() {
        let mut buf = buffer_with("hello world");
        let mut view = TextBufferView::new();
        view.set_wrap_mode(WrapMode::Char);
        view.set_wrap_width(Some(5));
        let first = view.virtual_lines(&buf).unwrap().len();
        assert!(first > 1);
        buf.set_text("hi");
        let second = view.virtual_lines(&buf).unwrap().len();
        assert_eq!(second, 1);
    }

    #[test]
    fn selection_round_trips_through_pack_and_text_extraction() {
        let buf = buffer_with("abcdef");
        let mut view = TextBufferView::new();
        view.set_selection(1, 4, None, None);
        assert_ne!(view.pack_selection_info(), u64::MAX);
        let mut out = String::new();
        view.get_selected_text_into_buffer(&buf, &mut out).unwrap();
        assert_eq!(out, "bcd");
    }

    #[test]
    fn empty_selection_is_reported_as_absent() {
        let mut view = TextBufferView::new();
        view.set_selection(3, 3, None, None);
        assert!(view.selection().is_none());
        assert_eq!(view.pack_selection_info(), u64::MAX);
    }

    #[test]
    fn measure_for_dimensions_does_not_disturb_the_render_cache() {
        let buf = buffer_with("hello world");
        let mut view = TextBufferView::new();
        view.set_wrap_mode(WrapMode::Char);
        view.set_wrap_width(Some(20));
        let rendered_before = view.virtual_lines(&buf).unwrap().len();
        let measured = view.measure_for_dimensions(&buf, 5, 10).unwrap();
        assert!(measured.line_count > 1);
        let rendered_after = view.virtual_lines(&buf).unwrap().len();
        assert_eq!(rendered_before, rendered_after);
    }

    #[test]
    fn selected_text_spans_multiple_lines_with_newlines_preserved() {
        let buf = buffer_with("ab\ncd");
        let mut view = TextBufferView::new();
        view.set_selection(1, 4, None, None);
        let mut out = String::new();
        view.get_selected_text_into_buffer(&buf, &mut out).unwrap();
        assert_eq!(out, "b\ncd");
    }
}
