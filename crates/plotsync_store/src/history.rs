//! Per-document linear undo/redo history.

use plotsync_core::EditorState;
use std::collections::VecDeque;
use std::sync::Arc;

/// Default number of undo entries kept.
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Snapshot-based undo/redo stacks.
///
/// Each entry is a whole committed [`EditorState`]. Snapshots are shared
/// with readers through `Arc` and never mutated, so recording one is a
/// pointer copy.
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Arc<EditorState>>,
    redo: Vec<Arc<EditorState>>,
    max_entries: usize,
}

impl History {
    /// Creates an empty history keeping at most `max_entries` undo steps.
    pub fn new(max_entries: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            max_entries,
        }
    }

    /// Records the state a new change replaced. Clears the redo stack.
    pub fn record(&mut self, previous: Arc<EditorState>) {
        self.redo.clear();
        self.push_undo(previous);
    }

    /// Steps back from `current`. Returns the state to restore.
    pub fn undo(&mut self, current: Arc<EditorState>) -> Option<Arc<EditorState>> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current);
        Some(previous)
    }

    /// Steps forward from `current`. Returns the state to restore.
    pub fn redo(&mut self, current: Arc<EditorState>) -> Option<Arc<EditorState>> {
        let next = self.redo.pop()?;
        self.push_undo(current);
        Some(next)
    }

    /// Returns true if there is something to undo.
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Returns true if there is something to redo.
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Number of undo entries.
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Number of redo entries.
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    fn push_undo(&mut self, state: Arc<EditorState>) {
        if self.max_entries == 0 {
            return;
        }
        if self.undo.len() == self.max_entries {
            self.undo.pop_front();
        }
        self.undo.push_back(state);
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotsync_core::ViewportState;

    fn state(west: f64) -> Arc<EditorState> {
        Arc::new(EditorState {
            viewport_state: Some(ViewportState::new(west, 0.0, 10.0, 10.0)),
            ..EditorState::default()
        })
    }

    #[test]
    fn undo_then_redo() {
        let mut history = History::default();
        history.record(state(1.0));

        let restored = history.undo(state(2.0)).unwrap();
        assert_eq!(restored, state(1.0));
        assert!(!history.can_undo());

        let again = history.redo(restored).unwrap();
        assert_eq!(again, state(2.0));
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn record_clears_redo() {
        let mut history = History::default();
        history.record(state(1.0));
        history.undo(state(2.0));
        assert!(history.can_redo());

        history.record(state(1.0));
        assert!(!history.can_redo());
    }

    #[test]
    fn capped_drops_oldest() {
        let mut history = History::new(2);
        history.record(state(1.0));
        history.record(state(2.0));
        history.record(state(3.0));
        assert_eq!(history.undo_len(), 2);

        assert_eq!(history.undo(state(4.0)), Some(state(3.0)));
        assert_eq!(history.undo(state(3.0)), Some(state(2.0)));
        assert_eq!(history.undo(state(2.0)), None);
    }

    #[test]
    fn empty_history() {
        let mut history = History::new(0);
        history.record(state(1.0));
        assert!(history.undo(state(2.0)).is_none());
    }
}
