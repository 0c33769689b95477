//! One open document: its committed state and its write log.

use crate::apply::{self, Transition};
use crate::history::History;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};
use plotsync_core::{EditorState, SelectionState};
use plotsync_protocol::Command;
use std::cell::RefCell;
use std::sync::Arc;

/// Write-side bookkeeping, only touched under the document's write lock.
#[derive(Debug)]
struct DocumentLog {
    history: History,
    /// Selection as of the last history-bearing commit.
    checkpoint: Option<SelectionState>,
}

/// State and history of one document.
///
/// Readers take the committed snapshot without waiting on writers.
/// Writers serialize on a re-entrant lock, so a subscriber running on the
/// writing thread may issue further commands against the same document.
#[derive(Debug)]
pub(crate) struct DocumentSlot {
    log: ReentrantMutex<RefCell<DocumentLog>>,
    committed: RwLock<Arc<EditorState>>,
}

impl DocumentSlot {
    pub fn new(state: EditorState, max_history: usize) -> Self {
        let checkpoint = state.selection_state.clone();
        Self {
            log: ReentrantMutex::new(RefCell::new(DocumentLog {
                history: History::new(max_history),
                checkpoint,
            })),
            committed: RwLock::new(Arc::new(state)),
        }
    }

    /// The last committed state.
    pub fn snapshot(&self) -> Arc<EditorState> {
        self.committed.read().clone()
    }

    /// Takes the write lock. Held across commit and dispatch.
    pub fn write(&self) -> DocumentWriter<'_> {
        DocumentWriter {
            slot: self,
            log: self.log.lock(),
        }
    }

    fn commit(&self, state: Arc<EditorState>) {
        *self.committed.write() = state;
    }
}

/// Exclusive writer for one document.
pub(crate) struct DocumentWriter<'a> {
    slot: &'a DocumentSlot,
    log: ReentrantMutexGuard<'a, RefCell<DocumentLog>>,
}

impl DocumentWriter<'_> {
    /// Applies a validated command and commits the result.
    ///
    /// Returns the transition and whether a history entry was recorded.
    pub fn apply(&self, command: Command) -> (Transition, bool) {
        let base = self.slot.snapshot();
        let transition = apply::apply(&base, command);
        if transition.changed.is_empty() {
            return (transition, false);
        }

        let historic = transition.is_historic();
        {
            let mut log = self.log.borrow_mut();
            if historic {
                log.history.record(base);
                log.checkpoint = transition.state.selection_state.clone();
            }
        }
        self.slot.commit(Arc::new(transition.state.clone()));
        (transition, historic)
    }

    /// Steps back. A pending selection change is discarded first; only
    /// then is a history entry popped.
    pub fn undo(&self) -> Option<Arc<EditorState>> {
        let current = self.slot.snapshot();
        let restored = {
            let mut log = self.log.borrow_mut();
            if current.selection_state != log.checkpoint {
                Arc::new(EditorState {
                    selection_state: log.checkpoint.clone(),
                    ..(*current).clone()
                })
            } else {
                let previous = log.history.undo(current)?;
                log.checkpoint = previous.selection_state.clone();
                previous
            }
        };
        self.slot.commit(restored.clone());
        Some(restored)
    }

    /// Steps forward over an undone entry.
    pub fn redo(&self) -> Option<Arc<EditorState>> {
        let current = self.slot.snapshot();
        let restored = {
            let mut log = self.log.borrow_mut();
            let next = log.history.redo(current)?;
            log.checkpoint = next.selection_state.clone();
            next
        };
        self.slot.commit(restored.clone());
        Some(restored)
    }

    /// Replaces the whole state and forgets history.
    pub fn load(&self, state: EditorState) -> Arc<EditorState> {
        {
            let mut log = self.log.borrow_mut();
            log.history.clear();
            log.checkpoint = state.selection_state.clone();
        }
        let state = Arc::new(state);
        self.slot.commit(state.clone());
        state
    }

    /// Undo entries available.
    pub fn undo_len(&self) -> usize {
        self.log.borrow().history.undo_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotsync_core::{FeatureId, ViewportState};

    fn select(ids: &[&str]) -> Command {
        Command::SetSelection(SelectionState::new(
            ids.iter().map(|id| FeatureId::from(*id)).collect(),
        ))
    }

    #[test]
    fn readers_see_committed_snapshot() {
        let slot = DocumentSlot::new(EditorState::default(), 10);
        let before = slot.snapshot();
        slot.write()
            .apply(Command::SetViewport(ViewportState::new(0.0, 0.0, 1.0, 1.0)));
        assert!(before.viewport_state.is_none());
        assert!(slot.snapshot().viewport_state.is_some());
    }

    #[test]
    fn undo_discards_pending_selection_first() {
        let slot = DocumentSlot::new(EditorState::default(), 10);
        let writer = slot.write();
        writer.apply(Command::SetViewport(ViewportState::new(0.0, 0.0, 1.0, 1.0)));
        writer.apply(select(&["a"]));

        let restored = writer.undo().unwrap();
        assert!(restored.selection_state.is_none());
        assert!(restored.viewport_state.is_some());
        assert_eq!(writer.undo_len(), 1);

        let restored = writer.undo().unwrap();
        assert!(restored.viewport_state.is_none());
        assert!(writer.undo().is_none());
    }

    #[test]
    fn no_change_records_nothing() {
        let slot = DocumentSlot::new(EditorState::default(), 10);
        let writer = slot.write();
        let (transition, recorded) = writer.apply(Command::DeleteFeatures(vec!["x".into()]));
        assert!(transition.changed.is_empty());
        assert!(!recorded);
        assert_eq!(writer.undo_len(), 0);
    }

    #[test]
    fn write_lock_is_reentrant() {
        let slot = DocumentSlot::new(EditorState::default(), 10);
        let outer = slot.write();
        let inner = slot.write();
        inner.apply(select(&["a"]));
        drop(inner);
        outer.apply(select(&["b"]));
        assert_eq!(
            slot.snapshot().selection_state,
            Some(SelectionState::new(vec!["b".into()]))
        );
    }
}
