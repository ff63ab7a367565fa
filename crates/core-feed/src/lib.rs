//! Native span feed: a chunked byte stream a producer fills and a consumer
//! drains in committed spans, with no copy between write and read (spec
//! §4.8/§6.4). Used to hand a PTY or subprocess's raw output to the engine
//! without allocating per write.
//!
//! The wire-level contract describes `reserve` as returning `{chunk_index,
//! ptr, len}`; this crate returns a borrowed `&mut [u8]` instead, since a
//! raw pointer has no reason to leave a safe Rust API when a slice already
//! carries the same chunk_index+len pairing plus bounds-checking for free.

use std::collections::VecDeque;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FeedError {
    #[error("a reservation is active or pending data blocks this call")]
    Busy,
    #[error("no chunk has room for this write")]
    NoSpace,
    #[error("growing the stream would exceed max_bytes")]
    MaxBytes,
    #[error("invalid argument")]
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrowthPolicy {
    /// Refuse to advance past the last chunk once none are recyclable.
    #[default]
    Block,
    /// Allocate a new chunk, bounded by `max_bytes`.
    Grow,
}

#[derive(Debug, Clone, Copy)]
pub struct StreamOptions {
    pub chunk_size: usize,
    pub initial_chunks: usize,
    pub max_bytes: Option<usize>,
    pub growth_policy: GrowthPolicy,
    pub auto_commit_on_full: bool,
    /// Ring capacity; `0` means the default of 4096.
    pub span_queue_capacity: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            chunk_size: 4096,
            initial_chunks: 1,
            max_bytes: None,
            growth_policy: GrowthPolicy::Block,
            auto_commit_on_full: false,
            span_queue_capacity: 0,
        }
    }
}

const DEFAULT_RING_CAPACITY: usize = 4096;

/// A committed, contiguous byte range inside one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanInfo {
    pub chunk_index: usize,
    pub offset: usize,
    pub len: usize,
}

/// A writable slice of the current chunk returned by [`Stream::reserve`].
/// Borrows `Stream` mutably, so the single-active-reservation rule is the
/// borrow checker's job: nothing else can touch the stream while this is
/// alive, and [`Stream::commit_reserved`] can only run after it's dropped.
pub struct Reservation<'a> {
    pub chunk_index: usize,
    pub slice: &'a mut [u8],
}

struct Chunk {
    buf: Vec<u8>,
}

impl Chunk {
    fn new(size: usize) -> Self {
        Self { buf: vec![0u8; size] }
    }
}

struct ReservedState {
    chunk_index: usize,
    start: usize,
    len: usize,
}

/// Producer/consumer byte stream backed by fixed-size chunks (spec
/// `NativeSpanFeed`/`Stream`).
pub struct Stream {
    chunk_size: usize,
    chunks: Vec<Chunk>,
    /// One refcount byte per chunk: 0 means the writer may reuse it, >0
    /// means at least one drained span still references it.
    state_buffer: Vec<u8>,
    ring: VecDeque<SpanInfo>,
    ring_capacity: usize,
    write_chunk: usize,
    write_pos: usize,
    /// Boundary within `write_chunk` up to which bytes are already spanned;
    /// `[commit_pos, write_pos)` is the pending, uncommitted run.
    commit_pos: usize,
    reservation: Option<ReservedState>,
    bytes_written: u64,
    spans_committed: u64,
    growth_policy: GrowthPolicy,
    auto_commit_on_full: bool,
    max_bytes: Option<usize>,
}

pub struct FeedStats {
    pub chunks: usize,
    pub bytes_written: u64,
    pub spans_committed: u64,
    /// Committed spans sitting in the ring, not yet drained.
    pub pending_spans: usize,
    /// Bytes written into the current chunk past the last commit boundary
    /// (not yet promoted to a span).
    pub pending_bytes: usize,
}

impl Stream {
    pub fn create(opts: StreamOptions) -> Result<Self, FeedError> {
        if opts.chunk_size == 0 || opts.initial_chunks == 0 {
            return Err(FeedError::Invalid);
        }
        let ring_capacity = if opts.span_queue_capacity == 0 { DEFAULT_RING_CAPACITY } else { opts.span_queue_capacity };
        let chunks = (0..opts.initial_chunks).map(|_| Chunk::new(opts.chunk_size)).collect::<Vec<_>>();
        let state_buffer = vec![0u8; opts.initial_chunks];
        Ok(Self {
            chunk_size: opts.chunk_size,
            chunks,
            state_buffer,
            ring: VecDeque::with_capacity(ring_capacity.min(DEFAULT_RING_CAPACITY)),
            ring_capacity,
            write_chunk: 0,
            write_pos: 0,
            commit_pos: 0,
            reservation: None,
            bytes_written: 0,
            spans_committed: 0,
            growth_policy: opts.growth_policy,
            auto_commit_on_full: opts.auto_commit_on_full,
            max_bytes: opts.max_bytes,
        })
    }

    pub fn get_stats(&self) -> FeedStats {
        FeedStats {
            chunks: self.chunks.len(),
            bytes_written: self.bytes_written,
            spans_committed: self.spans_committed,
            pending_spans: self.ring.len(),
            pending_bytes: self.write_pos - self.commit_pos,
        }
    }

    // ---------------------------------------------------------------
    // Writing
    // ---------------------------------------------------------------

    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, FeedError> {
        if self.reservation.is_some() {
            return Err(FeedError::Busy);
        }
        let mut consumed = 0;
        while consumed < bytes.len() {
            let remaining = self.chunk_size - self.write_pos;
            if remaining == 0 {
                if self.auto_commit_on_full {
                    self.commit()?;
                    self.rotate_chunk()?;
                } else {
                    return Err(FeedError::NoSpace);
                }
                continue;
            }
            let n = remaining.min(bytes.len() - consumed);
            let chunk = &mut self.chunks[self.write_chunk];
            chunk.buf[self.write_pos..self.write_pos + n].copy_from_slice(&bytes[consumed..consumed + n]);
            self.write_pos += n;
            consumed += n;
        }
        Ok(consumed)
    }

    pub fn reserve(&mut self, min_len: usize) -> Result<Reservation<'_>, FeedError> {
        if min_len == 0 {
            return Err(FeedError::Invalid);
        }
        if self.reservation.is_some() || self.write_pos != self.commit_pos {
            return Err(FeedError::Busy);
        }
        if min_len > self.chunk_size {
            return Err(FeedError::NoSpace);
        }
        let remaining = self.chunk_size - self.write_pos;
        if remaining < min_len {
            return Err(FeedError::NoSpace);
        }
        let chunk_index = self.write_chunk;
        let start = self.write_pos;
        self.reservation = Some(ReservedState { chunk_index, start, len: remaining });
        let slice = &mut self.chunks[chunk_index].buf[start..start + remaining];
        Ok(Reservation { chunk_index, slice })
    }

    pub fn commit_reserved(&mut self, len: usize) -> Result<(), FeedError> {
        let Some(res) = self.reservation.take() else {
            return Err(FeedError::Invalid);
        };
        if len == 0 {
            return Ok(());
        }
        if len > res.len {
            return Err(FeedError::NoSpace);
        }
        self.write_pos = res.start + len;
        self.commit()
    }

    /// Promotes `[commit_pos, write_pos)` to a span; empty pending is a
    /// no-op. Does not itself advance chunks — [`write`](Self::write) does
    /// that explicitly (and propagates failure) once the chunk is full.
    pub fn commit(&mut self) -> Result<(), FeedError> {
        if self.write_pos == self.commit_pos {
            return Ok(());
        }
        let span = SpanInfo { chunk_index: self.write_chunk, offset: self.commit_pos, len: self.write_pos - self.commit_pos };
        self.push_span(span)?;
        self.commit_pos = self.write_pos;
        Ok(())
    }

    fn push_span(&mut self, span: SpanInfo) -> Result<(), FeedError> {
        if self.ring.len() >= self.ring_capacity {
            return Err(FeedError::NoSpace);
        }
        self.bytes_written += span.len as u64;
        self.spans_committed += 1;
        self.ring.push_back(span);
        Ok(())
    }

    /// Moves the write cursor to the next recyclable chunk, or allocates one
    /// under [`GrowthPolicy::Grow`]. With a single chunk, "next" would be
    /// the chunk the writer is already on — wrapping onto it would let a
    /// just-committed, not-yet-drained span get overwritten in place, so
    /// that case always falls through to growth/block instead.
    fn rotate_chunk(&mut self) -> Result<(), FeedError> {
        if self.chunks.len() > 1 {
            let next = (self.write_chunk + 1) % self.chunks.len();
            if self.state_buffer[next] == 0 {
                self.write_chunk = next;
                self.write_pos = 0;
                self.commit_pos = 0;
                return Ok(());
            }
        }
        match self.growth_policy {
            GrowthPolicy::Block => Err(FeedError::NoSpace),
            GrowthPolicy::Grow => {
                let allocated = self.chunks.len() * self.chunk_size;
                if self.max_bytes.is_some_and(|mb| allocated + self.chunk_size > mb) {
                    return Err(FeedError::MaxBytes);
                }
                self.chunks.push(Chunk::new(self.chunk_size));
                self.state_buffer.push(0);
                self.write_chunk = self.chunks.len() - 1;
                self.write_pos = 0;
                self.commit_pos = 0;
                tracing::trace!(target: "core.feed", chunks = self.chunks.len(), "stream grew a chunk");
                Ok(())
            }
        }
    }

    // ---------------------------------------------------------------
    // Reading
    // ---------------------------------------------------------------

    /// Copies up to `out.len()` spans from the ring, oldest (earliest
    /// committed) first, increffing each span's chunk. Never errors.
    pub fn drain_spans(&mut self, out: &mut [SpanInfo]) -> usize {
        let mut n = 0;
        while n < out.len() {
            let Some(span) = self.ring.pop_front() else { break };
            let before = self.state_buffer[span.chunk_index];
            let after = before.saturating_add(1);
            self.state_buffer[span.chunk_index] = after;
            if after == 255 && before != 255 && span.chunk_index == self.write_chunk {
                tracing::trace!(target: "core.feed", chunk = span.chunk_index, "refcount saturated, forcing chunk advance");
                let _ = self.rotate_chunk();
            }
            out[n] = span;
            n += 1;
        }
        n
    }

    /// Decrefs `span`'s chunk; saturating, so a double-consume can't
    /// underflow into falsely "free".
    pub fn mark_span_consumed(&mut self, span: SpanInfo) {
        if let Some(byte) = self.state_buffer.get_mut(span.chunk_index) {
            *byte = byte.saturating_sub(1);
        }
    }

    pub fn close(&mut self) -> Result<(), FeedError> {
        if self.reservation.is_some() {
            return Err(FeedError::Busy);
        }
        self.commit()
    }

    /// Commits any pending data, then frees all chunks by consuming `self`.
    pub fn destroy(mut self) -> Result<(), FeedError> {
        self.close()
    }
}
