//! Chunk: a value-type cursor into a [`MemBuffer`](crate::mem::MemBuffer).
//!
//! Chunks are cheap to copy (a handful of integers plus, for non-ASCII
//! text, a cached cluster table) and are what [`Segment::Text`](crate::Segment::Text)
//! actually stores — the rope never owns bytes directly.

use crate::mem::{MemId, MemRegistry};
use core_width::{Cluster, WidthMethod, clusters};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub mem_id: MemId,
    pub offset: usize,
    pub len: usize,
    /// Total display width in terminal columns of this chunk's text.
    pub width: u16,
    pub style_id: Option<u32>,
    pub link: Option<u32>,
    /// Cached cluster boundaries, present only when the chunk's text isn't
    /// a 1-byte-per-step ASCII run (the common case doesn't need one: byte
    /// offset and step index already coincide).
    grapheme_tracker: Option<Vec<Cluster>>,
}

impl Chunk {
    pub fn new(
        registry: &MemRegistry,
        mem_id: MemId,
        offset: usize,
        len: usize,
        method: WidthMethod,
    ) -> Self {
        let text = std::str::from_utf8(&registry.bytes(mem_id)[offset..offset + len])
            .expect("chunk byte range must fall on valid UTF-8 boundaries");
        let cs = clusters(text, method);
        let width: u16 = cs.iter().map(|c| c.width).sum();
        let is_plain_ascii = cs.len() == len && cs.iter().all(|c| c.len() == 1 && c.width == 1);
        Self {
            mem_id,
            offset,
            len,
            width,
            style_id: None,
            link: None,
            grapheme_tracker: if is_plain_ascii { None } else { Some(cs) },
        }
    }

    pub fn with_style(mut self, style_id: Option<u32>) -> Self {
        self.style_id = style_id;
        self
    }

    pub fn with_link(mut self, link: Option<u32>) -> Self {
        self.link = link;
        self
    }

    pub fn text<'a>(&self, registry: &'a MemRegistry) -> &'a str {
        let bytes = &registry.bytes(self.mem_id)[self.offset..self.offset + self.len];
        std::str::from_utf8(bytes).expect("chunk bytes are valid UTF-8 by construction")
    }

    /// Number of motion steps (grapheme clusters under this chunk's width
    /// method) in the chunk.
    pub fn step_count(&self) -> usize {
        match &self.grapheme_tracker {
            Some(cs) => cs.len(),
            None => self.len,
        }
    }

    /// Byte offset (relative to the chunk) where step `step` begins.
    pub fn step_to_byte(&self, step: usize) -> usize {
        match &self.grapheme_tracker {
            Some(cs) => cs.get(step).map(|c| c.start).unwrap_or(self.len),
            None => step.min(self.len),
        }
    }

    /// Display width contributed by steps `[0, step)`.
    pub fn width_before_step(&self, step: usize) -> u16 {
        match &self.grapheme_tracker {
            Some(cs) => cs.iter().take(step).map(|c| c.width).sum(),
            None => step.min(self.len) as u16,
        }
    }

    /// Splits this chunk at byte offset `at` (relative to the chunk),
    /// re-deriving widths/tracker for each half. `at` must land on a step
    /// boundary; callers resolve boundaries via [`step_to_byte`](Self::step_to_byte)
    /// first.
    pub fn split_at_byte(&self, registry: &MemRegistry, at: usize, method: WidthMethod) -> (Chunk, Chunk) {
        debug_assert!(at <= self.len);
        let left = Chunk::new(registry, self.mem_id, self.offset, at, method)
            .with_style(self.style_id)
            .with_link(self.link);
        let right = Chunk::new(registry, self.mem_id, self.offset + at, self.len - at, method)
            .with_style(self.style_id)
            .with_link(self.link);
        (left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ascii_chunk_has_no_tracker_and_unit_widths() {
        let mut reg = MemRegistry::new();
        let id = reg.intern_owned(b"hello");
        let chunk = Chunk::new(&reg, id, 0, 5, WidthMethod::Unicode);
        assert_eq!(chunk.width, 5);
        assert_eq!(chunk.step_count(), 5);
        assert_eq!(chunk.step_to_byte(3), 3);
        assert!(chunk.grapheme_tracker.is_none());
    }

    #[test]
    fn wide_chunk_tracks_clusters() {
        let mut reg = MemRegistry::new();
        let id = reg.intern_owned("a界b".as_bytes());
        let chunk = Chunk::new(&reg, id, 0, "a界b".len(), WidthMethod::Unicode);
        assert_eq!(chunk.step_count(), 3);
        assert_eq!(chunk.width, 1 + 2 + 1);
        assert_eq!(chunk.width_before_step(2), 3);
    }

    #[test]
    fn split_preserves_style_and_recomputes_width() {
        let mut reg = MemRegistry::new();
        let id = reg.intern_owned("a界b".as_bytes());
        let chunk = Chunk::new(&reg, id, 0, "a界b".len(), WidthMethod::Unicode).with_style(Some(7));
        let at = chunk.step_to_byte(2);
        let (l, r) = chunk.split_at_byte(&reg, at, WidthMethod::Unicode);
        assert_eq!(l.text(&reg), "a界");
        assert_eq!(r.text(&reg), "b");
        assert_eq!(l.style_id, Some(7));
        assert_eq!(r.style_id, Some(7));
    }
}
