//! Cursor/selection overlay spans — transient, line-local decorations that
//! sit above whatever the syntax-style table resolved for a line, playing
//! the same role a `StyleLayer` plays for a software cursor.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OverlayAttr {
    Cursor,
    Selection,
    Diagnostic,
}

/// A half-open `[start_col, end_col)` span in visual columns on one line.
/// Never splits a grapheme cluster — callers resolve cluster boundaries
/// with `core-width` before constructing a span.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverlaySpan {
    pub row: usize,
    pub start_col: u16,
    pub end_col: u16,
    pub attr: OverlayAttr,
}

impl OverlaySpan {
    pub fn width(&self) -> u16 {
        self.end_col.saturating_sub(self.start_col)
    }
}

/// Reusable, per-frame collection of overlay spans. Cleared and repopulated
/// rather than reallocated each time the view is measured.
#[derive(Default, Debug)]
pub struct OverlayLayer {
    spans: Vec<OverlaySpan>,
}

impl OverlayLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.spans.clear();
    }

    pub fn push(&mut self, span: OverlaySpan) {
        self.spans.push(span);
    }

    pub fn spans(&self) -> &[OverlaySpan] {
        &self.spans
    }

    pub fn cursor_span(&self) -> Option<&OverlaySpan> {
        self.spans.iter().find(|s| s.attr == OverlayAttr::Cursor)
    }

    pub fn spans_on_row(&self, row: usize) -> impl Iterator<Item = &OverlaySpan> {
        self.spans.iter().filter(move |s| s.row == row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_span_found_among_others() {
        let mut layer = OverlayLayer::new();
        layer.push(OverlaySpan {
            row: 0,
            start_col: 2,
            end_col: 5,
            attr: OverlayAttr::Selection,
        });
        layer.push(OverlaySpan {
            row: 0,
            start_col: 1,
            end_col: 2,
            attr: OverlayAttr::Cursor,
        });
        let cursor = layer.cursor_span().expect("cursor span");
        assert_eq!(cursor.width(), 1);
    }

    #[test]
    fn spans_on_row_filters_correctly() {
        let mut layer = OverlayLayer::new();
        layer.push(OverlaySpan {
            row: 0,
            start_col: 0,
            end_col: 1,
            attr: OverlayAttr::Cursor,
        });
        layer.push(OverlaySpan {
            row: 1,
            start_col: 0,
            end_col: 3,
            attr: OverlayAttr::Selection,
        });
        assert_eq!(layer.spans_on_row(1).count(), 1);
        assert_eq!(layer.spans_on_row(2).count(), 0);
    }
}
