//! Synchronous, insertion-ordered listener dispatch for buffer/view change
//! notifications (`cursorChanged`, `contentChanged`, `selectionChanged`).
//!
//! The engine has no terminal input, async runtime, or job control of its
//! own, so unlike a UI event loop this is just a typed pub/sub primitive
//! that `core-edit`, `core-view`, and `core-editview` each instantiate once
//! per event kind they emit.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

pub type ListenerId = u64;

/// Handle a listener can use to unsubscribe itself or another listener
/// while a dispatch is in progress. Removal is deferred until the current
/// `emit` call finishes iterating, so a listener further along in
/// registration order than the caller is skipped rather than double-removed
/// out from under the loop.
#[derive(Clone)]
pub struct Unsubscriber(Rc<RefCell<Vec<ListenerId>>>);

impl Unsubscriber {
    pub fn unsubscribe(&self, id: ListenerId) {
        self.0.borrow_mut().push(id);
    }
}

struct Slot<E> {
    id: ListenerId,
    callback: Box<dyn FnMut(&E, &Unsubscriber)>,
}

/// A single event kind's listener list.
pub struct Emitter<E> {
    listeners: Vec<Slot<E>>,
    next_id: ListenerId,
    pending_off: Rc<RefCell<Vec<ListenerId>>>,
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Emitter<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
            pending_off: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Registers `listener`, returning an id usable with [`Emitter::off`].
    /// Visible starting with the *next* `emit` call, even if registration
    /// happens from inside a listener currently being dispatched.
    pub fn on(&mut self, listener: impl FnMut(&E, &Unsubscriber) + 'static) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.push(Slot {
            id,
            callback: Box::new(listener),
        });
        id
    }

    /// Removes a listener by id immediately. Call [`Unsubscriber::unsubscribe`]
    /// instead from inside a listener being dispatched — `off` is for use
    /// between `emit` calls, where there is no iteration to protect.
    pub fn off(&mut self, id: ListenerId) {
        self.pending_off.borrow_mut().push(id);
        self.flush_removals();
    }

    fn flush_removals(&mut self) {
        let mut pending = self.pending_off.borrow_mut();
        if pending.is_empty() {
            return;
        }
        let removed: Vec<ListenerId> = pending.drain(..).collect();
        drop(pending);
        self.listeners.retain(|s| !removed.contains(&s.id));
    }

    /// Dispatches `event` to every listener registered before this call
    /// began. A listener that panics is caught and logged; the remaining
    /// listeners still run.
    pub fn emit(&mut self, event: &E) {
        let visible = self.listeners.len();
        let handle = Unsubscriber(self.pending_off.clone());
        for i in 0..visible {
            let id = self.listeners[i].id;
            if self.pending_off.borrow().contains(&id) {
                continue;
            }
            let mut callback = std::mem::replace(&mut self.listeners[i].callback, Box::new(|_, _| {}));
            let result = panic::catch_unwind(AssertUnwindSafe(|| callback(event, &handle)));
            self.listeners[i].callback = callback;
            if let Err(payload) = result {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "listener panicked".to_string());
                tracing::error!(target: "core.events", listener_id = id, %message, "event listener panicked");
            }
        }
        self.flush_removals();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn listeners_fire_in_registration_order() {
        let mut emitter: Emitter<u32> = Emitter::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let a = order.clone();
        emitter.on(move |_, _| a.borrow_mut().push("a"));
        let b = order.clone();
        emitter.on(move |_, _| b.borrow_mut().push("b"));
        emitter.emit(&1);
        assert_eq!(*order.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn listener_registered_between_calls_only_sees_later_emits() {
        let mut emitter: Emitter<u32> = Emitter::new();
        let seen: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));

        emitter.emit(&10); // no listeners yet

        let seen_inner = seen.clone();
        emitter.on(move |ev, _| seen_inner.borrow_mut().push(*ev));
        emitter.emit(&20);
        emitter.emit(&30);

        assert_eq!(*seen.borrow(), vec![20, 30]);
    }

    #[test]
    fn listener_unsubscribing_a_later_listener_skips_it_this_round() {
        let mut emitter: Emitter<u32> = Emitter::new();
        let fired = Rc::new(RefCell::new(Vec::new()));
        let later_id = Rc::new(Cell::new(0u64));
        let later_id_setter = later_id.clone();

        let fired_first = fired.clone();
        emitter.on(move |_, handle| {
            fired_first.borrow_mut().push("first");
            handle.unsubscribe(later_id_setter.get());
        });
        let fired_later = fired.clone();
        let id = emitter.on(move |_, _| fired_later.borrow_mut().push("later"));
        later_id.set(id);

        emitter.emit(&1);
        assert_eq!(*fired.borrow(), vec!["first"]);
        assert_eq!(emitter.listener_count(), 1);
    }

    #[test]
    fn listener_unsubscribing_itself_still_runs_this_round_then_is_gone() {
        let mut emitter: Emitter<u32> = Emitter::new();
        let calls = Rc::new(Cell::new(0));
        let calls_inner = calls.clone();
        let self_id = Rc::new(Cell::new(0u64));
        let self_id_inner = self_id.clone();
        let id = emitter.on(move |_, handle| {
            calls_inner.set(calls_inner.get() + 1);
            handle.unsubscribe(self_id_inner.get());
        });
        self_id.set(id);

        emitter.emit(&1);
        emitter.emit(&2);
        assert_eq!(calls.get(), 1);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn panicking_listener_does_not_block_later_listeners() {
        let mut emitter: Emitter<u32> = Emitter::new();
        let ran = Rc::new(Cell::new(false));
        emitter.on(|_, _| panic!("boom"));
        let ran_inner = ran.clone();
        emitter.on(move |_, _| ran_inner.set(true));
        emitter.emit(&1);
        assert!(ran.get());
    }

    #[test]
    fn off_outside_dispatch_removes_immediately() {
        let mut emitter: Emitter<u32> = Emitter::new();
        let calls = Rc::new(Cell::new(0));
        let calls_inner = calls.clone();
        let id = emitter.on(move |_, _| calls_inner.set(calls_inner.get() + 1));
        emitter.off(id);
        emitter.emit(&1);
        assert_eq!(calls.get(), 0);
        assert_eq!(emitter.listener_count(), 0);
    }
}
