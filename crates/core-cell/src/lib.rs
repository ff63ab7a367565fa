//! Encoded character cells and the `Frame` grid they assemble into — the
//! engine's only output boundary: nothing downstream reaches back into the
//! rope, buffer, or pool, it only reads frames.
//!
//! A [`Cell`] stores an [`EncodedChar`] — a tagged 32-bit payload
//! distinguishing a plain codepoint from a leader/continuation half of a
//! pooled grapheme cluster — rather than an owned `String`, so a frame of
//! cells is a flat, copyable buffer with no per-cell allocation. This is a
//! packed alternative to a `Cell { cluster: String, .. }` representation;
//! the leader/continuation width contract and the row-iteration helpers
//! follow the same shape.

mod encoded;

pub use encoded::EncodedChar;

use bitflags::bitflags;
use core_pool::GraphemeId;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CellFlags: u8 {
        const REVERSE = 0b0000_0001;
        const CURSOR  = 0b0000_0010;
        const SELECTED = 0b0000_0100;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub encoded: EncodedChar,
    /// Visual width in terminal columns. `0` designates a continuation
    /// cell.
    pub width: u8,
    pub flags: CellFlags,
    pub style_id: Option<u32>,
}

impl Cell {
    #[inline]
    pub fn plain(c: char, flags: CellFlags) -> Self {
        Self {
            encoded: EncodedChar::plain(c),
            width: unicode_width_of(c),
            flags,
            style_id: None,
        }
    }

    #[inline]
    pub fn grapheme_start(id: GraphemeId, width: u16, flags: CellFlags) -> Self {
        Self {
            encoded: EncodedChar::grapheme_start(id),
            width: width.max(1) as u8,
            flags,
            style_id: None,
        }
    }

    #[inline]
    pub fn continuation(id: GraphemeId, flags: CellFlags) -> Self {
        Self {
            encoded: EncodedChar::continuation(id),
            width: 0,
            flags,
            style_id: None,
        }
    }

    #[inline]
    pub fn is_leader(&self) -> bool {
        self.width > 0
    }

    pub fn with_style(mut self, style_id: Option<u32>) -> Self {
        self.style_id = style_id;
        self
    }
}

fn unicode_width_of(c: char) -> u8 {
    unicode_width::UnicodeWidthChar::width(c).unwrap_or(1).max(1) as u8
}

impl Default for Cell {
    fn default() -> Self {
        Cell::plain(' ', CellFlags::empty())
    }
}

/// A fixed-size grid of cells, the engine's boundary output contract.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u16,
    pub height: u16,
    cells: Vec<Cell>,
}

impl Frame {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width as usize * height as usize],
        }
    }

    #[inline]
    fn index(&self, x: u16, y: u16) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        self.index(x, y).map(|i| &self.cells[i])
    }

    pub fn set(&mut self, x: u16, y: u16, cell: Cell) {
        if let Some(i) = self.index(x, y) {
            self.cells[i] = cell;
        }
    }

    /// Writes a leader cell at `(x, y)` plus continuation cells for the
    /// rest of its width, clamped to the row's remaining columns.
    pub fn set_leader(&mut self, x: u16, y: u16, leader: Cell) {
        if x >= self.width || y >= self.height {
            return;
        }
        let width = (leader.width as u16).max(1).min(self.width - x);
        let flags = leader.flags;
        let encoded = leader.encoded;
        if let Some(i) = self.index(x, y) {
            self.cells[i] = Cell {
                width: width as u8,
                ..leader
            };
        }
        // Continuation cells never get read back for their content (row
        // iteration derives all printable output from the leader), so they
        // just carry the leader's encoded value at width 0 — for a
        // grapheme-backed leader that's a `Continuation(gid)` pointing at
        // the same cluster, for a plain wide codepoint it's harmless to
        // just echo the leader's own `Plain` value.
        let continuation_encoded = match encoded {
            EncodedChar::GraphemeStart(id) => EncodedChar::Continuation(id),
            other => other,
        };
        for dx in 1..width {
            if let Some(i) = self.index(x + dx, y) {
                self.cells[i] = Cell {
                    encoded: continuation_encoded,
                    width: 0,
                    flags,
                    style_id: None,
                };
            }
        }
    }

    pub fn apply_flags_span(&mut self, x: u16, y: u16, span_width: u16, flags: CellFlags) {
        let span = span_width.min(self.width.saturating_sub(x));
        for dx in 0..span {
            if let Some(i) = self.index(x + dx, y) {
                self.cells[i].flags |= flags;
            }
        }
    }

    /// Iterates leader cells of row `y` as `(cell, start_x)`, skipping
    /// continuation cells.
    pub fn row_leaders(&self, y: u16) -> impl Iterator<Item = (&Cell, u16)> {
        let width = self.width;
        let start = y as usize * width as usize;
        let cells = &self.cells;
        let mut x = 0u16;
        std::iter::from_fn(move || {
            while x < width {
                let idx = start + x as usize;
                let cell = &cells[idx];
                if cell.is_leader() {
                    let out = (cell, x);
                    x = x.saturating_add(cell.width as u16);
                    return Some(out);
                }
                x += 1;
            }
            None
        })
    }
}
