//! Capped undo/redo history over whole-buffer text snapshots.
//!
//! Snapshots are plain `(String, Cursor)` pairs rather than clones of the
//! whole buffer: `TextBuffer` owns a `GraphemePool` that isn't `Clone`, and a
//! text buffer is cheap enough to round-trip through `String` on every undo
//! step at the document sizes this engine targets.

use crate::Cursor;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const UNDO_HISTORY_MAX: usize = 200;

#[derive(Debug, Clone)]
struct EditSnapshot {
    text: String,
    cursor: Cursor,
    hash: u64,
}

impl EditSnapshot {
    fn new(text: &str, cursor: Cursor) -> Self {
        Self {
            text: text.to_string(),
            cursor,
            hash: content_hash(text, cursor),
        }
    }
}

fn content_hash(text: &str, cursor: Cursor) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    cursor.row.hash(&mut hasher);
    cursor.col.hash(&mut hasher);
    hasher.finish()
}

/// Whether a run of `insert_text` calls is currently being folded into a
/// single undo step.
#[derive(Debug, Clone, Copy)]
enum InsertRun {
    Inactive,
    Active { edits: u32 },
}

pub(crate) struct UndoEngine {
    undo_stack: Vec<EditSnapshot>,
    redo_stack: Vec<EditSnapshot>,
    insert_run: InsertRun,
}

impl UndoEngine {
    pub(crate) fn new() -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            insert_run: InsertRun::Inactive,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.insert_run = InsertRun::Inactive;
    }

    fn push(&mut self, snapshot: EditSnapshot) {
        if self.undo_stack.last().is_some_and(|top| top.hash == snapshot.hash) {
            return;
        }
        self.undo_stack.push(snapshot);
        if self.undo_stack.len() > UNDO_HISTORY_MAX {
            self.undo_stack.remove(0);
        }
    }

    /// Records the state just before a single discrete edit (delete,
    /// paste, whole-document replace). Always starts a fresh undo step and
    /// breaks any open insert-coalescing run.
    pub(crate) fn push_discrete(&mut self, text: &str, cursor: Cursor) {
        self.insert_run = InsertRun::Inactive;
        self.push(EditSnapshot::new(text, cursor));
        self.redo_stack.clear();
    }

    /// Records the state before the first edit of a coalesced insert run;
    /// a no-op for edits after the first, since the run already has its
    /// pre-run snapshot on the stack.
    pub(crate) fn begin_insert_coalescing(&mut self, text: &str, cursor: Cursor) {
        if let InsertRun::Active { .. } = self.insert_run {
            return;
        }
        self.push(EditSnapshot::new(text, cursor));
        self.redo_stack.clear();
        self.insert_run = InsertRun::Active { edits: 0 };
    }

    pub(crate) fn note_insert_edit(&mut self) {
        if let InsertRun::Active { edits } = &mut self.insert_run {
            *edits += 1;
        }
    }

    pub(crate) fn end_insert_coalescing(&mut self) {
        self.insert_run = InsertRun::Inactive;
    }

    pub(crate) fn undo(&mut self, current_text: &str, current_cursor: Cursor) -> Option<(String, Cursor)> {
        self.insert_run = InsertRun::Inactive;
        let snapshot = self.undo_stack.pop()?;
        self.redo_stack.push(EditSnapshot::new(current_text, current_cursor));
        Some((snapshot.text, snapshot.cursor))
    }

    pub(crate) fn redo(&mut self, current_text: &str, current_cursor: Cursor) -> Option<(String, Cursor)> {
        self.insert_run = InsertRun::Inactive;
        let snapshot = self.redo_stack.pop()?;
        self.undo_stack.push(EditSnapshot::new(current_text, current_cursor));
        Some((snapshot.text, snapshot.cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor_at(row: usize, col: usize) -> Cursor {
        Cursor { row, col, offset: col, desired_col: None }
    }

    #[test]
    fn undo_then_redo_restores_both_states() {
        let mut undo = UndoEngine::new();
        undo.push_discrete("ab", cursor_at(0, 2));
        let popped = undo.undo("abc", cursor_at(0, 3)).unwrap();
        assert_eq!(popped.0, "ab");
        assert_eq!(popped.1, cursor_at(0, 2));
        let redone = undo.redo("ab", cursor_at(0, 2)).unwrap();
        assert_eq!(redone.0, "abc");
        assert_eq!(redone.1, cursor_at(0, 3));
    }

    #[test]
    fn discrete_edit_clears_redo_stack() {
        let mut undo = UndoEngine::new();
        undo.push_discrete("a", cursor_at(0, 1));
        undo.undo("ab", cursor_at(0, 2)).unwrap();
        undo.push_discrete("ax", cursor_at(0, 2));
        assert!(undo.redo("axy", cursor_at(0, 3)).is_none());
    }

    #[test]
    fn coalescing_run_only_records_one_pre_run_snapshot() {
        let mut undo = UndoEngine::new();
        undo.begin_insert_coalescing("", cursor_at(0, 0));
        undo.note_insert_edit();
        undo.begin_insert_coalescing("a", cursor_at(0, 1));
        undo.note_insert_edit();
        undo.begin_insert_coalescing("ab", cursor_at(0, 2));
        undo.note_insert_edit();
        let popped = undo.undo("abc", cursor_at(0, 3)).unwrap();
        assert_eq!(popped.0, "");
        assert!(undo.undo("", cursor_at(0, 0)).is_none());
    }

    #[test]
    fn ending_run_starts_a_fresh_step_for_the_next_insert() {
        let mut undo = UndoEngine::new();
        undo.begin_insert_coalescing("", cursor_at(0, 0));
        undo.note_insert_edit();
        undo.end_insert_coalescing();
        undo.begin_insert_coalescing("a", cursor_at(0, 1));
        undo.note_insert_edit();
        let popped = undo.undo("ab", cursor_at(0, 2)).unwrap();
        assert_eq!(popped.0, "a");
        let popped = undo.undo("a", cursor_at(0, 1)).unwrap();
        assert_eq!(popped.0, "");
    }
}
