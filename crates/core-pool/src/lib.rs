//! Grapheme pool: refcounted interning of multi-byte grapheme clusters so
//! that cell payloads (spec: encoded character cells) can carry a 32-bit
//! [`GraphemeId`] instead of an inline byte slice.
//!
//! Only clusters wider than a single codepoint slot go through here — plain
//! ASCII cells never touch the pool. Slots live in one shared arena of
//! fixed-size pages; size classes are just a set of free-lists that route a
//! new allocation toward a slot previously used by a similarly-sized
//! cluster, so churn in one size range doesn't fragment another. A slot
//! itself holds a precisely-sized `Box<[u8]>` rather than a fixed-capacity
//! inline array — the clusters being interned are at most a few dozen bytes,
//! so the extra indirection is cheap next to the bookkeeping it saves.

mod id;
mod slot;

pub use id::GraphemeId;

use ahash::AHashMap;
use slot::{Page, Slot};
use thiserror::Error;

/// Size-class boundaries in bytes. A cluster is routed to the first class
/// whose capacity is `>= cluster.len()`; anything larger falls into the
/// overflow class (capacity `usize::MAX`).
const SIZE_CLASSES: [usize; 5] = [8, 16, 32, 64, 128];
const PAGE_SLOTS: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("grapheme id {0:?} does not refer to a live slot")]
    InvalidId(GraphemeId),
    #[error("grapheme id {0:?} refers to a slot that has been recycled")]
    WrongGeneration(GraphemeId),
}

fn class_for_len(len: usize) -> usize {
    SIZE_CLASSES
        .iter()
        .position(|&cap| len <= cap)
        .unwrap_or(SIZE_CLASSES.len())
}

/// Refcounted, generation-tagged store of grapheme cluster bytes.
///
/// A pool is typically owned by a single buffer and threaded through its
/// chunks by a higher layer; it has no interior locking (single-threaded
/// use, matching the rest of the engine — see spec §5).
pub struct GraphemePool {
    /// Shared slot arena; a `GraphemeId`'s slot index is a flat index into
    /// this Vec's logical page/local addressing, independent of which size
    /// class originally requested the page.
    pages: Vec<Page>,
    /// Per-size-class free lists of flat slot indices into `pages`.
    free_by_class: Vec<Vec<u32>>,
    /// Maps interned bytes to their currently-live id, so that two `alloc`
    /// calls for identical bytes return the same id without growing storage.
    /// Entries are removed the moment a slot's refcount drops to zero.
    dedup: AHashMap<Box<[u8]>, GraphemeId>,
}

impl Default for GraphemePool {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphemePool {
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            free_by_class: vec![Vec::new(); SIZE_CLASSES.len() + 1],
            dedup: AHashMap::new(),
        }
    }

    /// Interns `bytes`, deduplicating against any other currently-live
    /// allocation of identical bytes. Returns a fresh, refcount-zero id when
    /// no live duplicate exists; the caller is responsible for
    /// [`incref`](Self::incref)ing before dropping whatever handed them
    /// these bytes.
    pub fn alloc(&mut self, bytes: &[u8]) -> GraphemeId {
        if let Some(&id) = self.dedup.get(bytes) {
            return id;
        }
        let id = self.insert_new(bytes);
        self.dedup.insert(bytes.into(), id);
        id
    }

    /// Interns `bytes` without participating in dedup. Use for clusters the
    /// caller does not expect to be shared (spec §3.1's `allocUnowned`);
    /// storage is otherwise identical to [`alloc`](Self::alloc).
    pub fn alloc_unowned(&mut self, bytes: &[u8]) -> GraphemeId {
        self.insert_new(bytes)
    }

    fn insert_new(&mut self, bytes: &[u8]) -> GraphemeId {
        let class_idx = class_for_len(bytes.len());
        if self.free_by_class[class_idx].is_empty() {
            self.grow(class_idx);
        }
        let flat = self.free_by_class[class_idx]
            .pop()
            .expect("just grew this class's free list");
        let slot = self.slot_mut(flat);
        slot.bytes = Some(bytes.into());
        GraphemeId::pack(slot.generation, flat)
    }

    fn grow(&mut self, class_idx: usize) {
        let page_index = self.pages.len() as u32;
        self.pages.push(Page::new(PAGE_SLOTS));
        let base = page_index * PAGE_SLOTS as u32;
        self.free_by_class[class_idx].extend((0..PAGE_SLOTS as u32).map(|i| base + i));
    }

    fn slot(&self, flat: u32) -> Option<&Slot> {
        let page = flat as usize / PAGE_SLOTS;
        let local = flat as usize % PAGE_SLOTS;
        self.pages.get(page).map(|p| &p.slots[local])
    }

    fn slot_mut(&mut self, flat: u32) -> &mut Slot {
        let page = flat as usize / PAGE_SLOTS;
        let local = flat as usize % PAGE_SLOTS;
        &mut self.pages[page].slots[local]
    }

    /// Saturating increment (spec: refcount saturates at 255 rather than
    /// wrapping; callers that hit saturation must treat the id as
    /// permanently pinned until the relevant text is actually removed from
    /// every holder).
    pub fn incref(&mut self, id: GraphemeId) -> Result<(), PoolError> {
        let slot = self.live_slot_mut(id)?;
        slot.refcount = slot.refcount.saturating_add(1);
        Ok(())
    }

    pub fn decref(&mut self, id: GraphemeId) -> Result<(), PoolError> {
        let freed_bytes = {
            let slot = self.live_slot_mut(id)?;
            if slot.refcount == 0 {
                return Err(PoolError::InvalidId(id));
            }
            slot.refcount -= 1;
            if slot.refcount == 0 {
                slot.bytes.take()
            } else {
                None
            }
        };
        if let Some(bytes) = freed_bytes {
            if self.dedup.get(bytes.as_ref()) == Some(&id) {
                self.dedup.remove(bytes.as_ref());
            }
            let class_idx = class_for_len(bytes.len());
            let slot = self.slot_mut(id.slot());
            slot.generation = slot.generation.wrapping_add(1) & id::GENERATION_MASK;
            self.free_by_class[class_idx].push(id.slot());
        }
        Ok(())
    }

    pub fn get(&self, id: GraphemeId) -> Result<&[u8], PoolError> {
        match self.slot(id.slot()) {
            Some(slot) if slot.bytes.is_some() && slot.generation == id.generation() => {
                Ok(slot.bytes.as_deref().unwrap())
            }
            Some(slot) if slot.bytes.is_some() => Err(PoolError::WrongGeneration(id)),
            _ => Err(PoolError::InvalidId(id)),
        }
    }

    pub fn refcount(&self, id: GraphemeId) -> Result<u8, PoolError> {
        match self.slot(id.slot()) {
            Some(slot) if slot.bytes.is_some() && slot.generation == id.generation() => {
                Ok(slot.refcount)
            }
            Some(slot) if slot.bytes.is_some() => Err(PoolError::WrongGeneration(id)),
            _ => Err(PoolError::InvalidId(id)),
        }
    }

    fn live_slot_mut(&mut self, id: GraphemeId) -> Result<&mut Slot, PoolError> {
        let page = id.slot() as usize / PAGE_SLOTS;
        if page >= self.pages.len() {
            return Err(PoolError::InvalidId(id));
        }
        let slot = self.slot_mut(id.slot());
        if slot.bytes.is_none() {
            return Err(PoolError::InvalidId(id));
        }
        if slot.generation != id.generation() {
            return Err(PoolError::WrongGeneration(id));
        }
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_dedups_identical_live_bytes() {
        let mut pool = GraphemePool::new();
        let a = pool.alloc("界".as_bytes());
        let b = pool.alloc("界".as_bytes());
        assert_eq!(a, b);
    }

    #[test]
    fn alloc_after_full_decref_gets_new_generation() {
        let mut pool = GraphemePool::new();
        let a = pool.alloc("界".as_bytes());
        pool.incref(a).unwrap();
        pool.decref(a).unwrap();
        assert!(pool.get(a).is_err());

        let b = pool.alloc("界".as_bytes());
        assert_ne!(a, b, "recycled slot must carry a new generation");
        assert_eq!(pool.get(b).unwrap(), "界".as_bytes());
    }

    #[test]
    fn get_on_stale_generation_is_wrong_generation_not_invalid() {
        let mut pool = GraphemePool::new();
        let a = pool.alloc("界".as_bytes());
        pool.incref(a).unwrap();
        pool.decref(a).unwrap();
        let _b = pool.alloc("界".as_bytes());
        match pool.get(a) {
            Err(PoolError::WrongGeneration(_)) => {}
            other => panic!("expected WrongGeneration, got {other:?}"),
        }
    }

    #[test]
    fn decref_below_zero_is_invalid_id() {
        let mut pool = GraphemePool::new();
        let a = pool.alloc("x".as_bytes());
        assert_eq!(pool.decref(a), Err(PoolError::InvalidId(a)));
    }

    #[test]
    fn refcount_saturates_at_255() {
        let mut pool = GraphemePool::new();
        let a = pool.alloc("x".as_bytes());
        for _ in 0..300 {
            pool.incref(a).unwrap();
        }
        assert_eq!(pool.refcount(a).unwrap(), 255);
    }

    #[test]
    fn overflow_class_handles_large_clusters() {
        let mut pool = GraphemePool::new();
        let big = vec![b'x'; 200];
        let id = pool.alloc(&big);
        pool.incref(id).unwrap();
        assert_eq!(pool.get(id).unwrap(), big.as_slice());
    }

    #[test]
    fn alloc_unowned_does_not_dedup_with_alloc() {
        let mut pool = GraphemePool::new();
        let a = pool.alloc("x".as_bytes());
        let b = pool.alloc_unowned("x".as_bytes());
        assert_ne!(a, b);
    }

    #[test]
    fn many_allocations_span_multiple_pages() {
        let mut pool = GraphemePool::new();
        let mut ids = Vec::new();
        for i in 0..(PAGE_SLOTS * 2 + 3) {
            let bytes = format!("z{i}");
            ids.push(pool.alloc(bytes.as_bytes()));
        }
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(pool.get(*id).unwrap(), format!("z{i}").as_bytes());
        }
    }
}
