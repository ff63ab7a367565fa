/// A single pool slot. `bytes` is `None` exactly when the slot is free
/// (refcount zero and not yet reused); `generation` only advances when a
/// free slot is handed back out by [`GraphemePool::insert_new`].
///
/// [`GraphemePool::insert_new`]: crate::GraphemePool
pub(crate) struct Slot {
    pub(crate) generation: u16,
    pub(crate) refcount: u8,
    pub(crate) bytes: Option<Box<[u8]>>,
}

impl Slot {
    fn free() -> Self {
        Self {
            generation: 0,
            refcount: 0,
            bytes: None,
        }
    }
}

pub(crate) struct Page {
    pub(crate) slots: Vec<Slot>,
}

impl Page {
    pub(crate) fn new(count: usize) -> Self {
        Self {
            slots: (0..count).map(|_| Slot::free()).collect(),
        }
    }
}
