//! Snapshot-based undo/redo history
//!
//! The history is a linear list of full-state snapshots with a cursor pointing at
//! the snapshot matching the live state. Recording after an undo discards the
//! redo branch.

use crate::error::{EngineError, EngineResult};

/// Linear undo/redo history over snapshots of type `S`
#[derive(Debug, Clone)]
pub struct HistoryManager<S: Clone> {
    /// Snapshots, oldest first
    snapshots: Vec<S>,
    /// Index of the snapshot matching the live state
    cursor: usize,
    /// Maximum number of snapshots kept
    limit: Option<usize>,
}

impl<S: Clone> Default for HistoryManager<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone> HistoryManager<S> {
    /// Create an empty, unbounded history
    pub fn new() -> Self {
        Self {
            snapshots: Vec::new(),
            cursor: 0,
            limit: None,
        }
    }

    /// Keep at most `limit` snapshots (at least one)
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit.map(|l| l.max(1));
        self.trim();
        self
    }

    /// Record a new state, discarding any redo branch
    pub fn record(&mut self, state: &S) {
        if !self.snapshots.is_empty() {
            self.snapshots.truncate(self.cursor + 1);
        }
        self.snapshots.push(state.clone());
        self.cursor = self.snapshots.len() - 1;
        self.trim();
    }

    fn trim(&mut self) {
        if let Some(limit) = self.limit {
            let excess = self.snapshots.len().saturating_sub(limit);
            if excess > 0 {
                self.snapshots.drain(..excess);
                self.cursor = self.cursor.saturating_sub(excess);
            }
        }
    }

    /// Step back one snapshot
    pub fn undo(&mut self) -> EngineResult<&S> {
        if !self.can_undo() {
            return Err(EngineError::NothingToUndo);
        }
        self.cursor -= 1;
        Ok(&self.snapshots[self.cursor])
    }

    /// Step forward one snapshot
    pub fn redo(&mut self) -> EngineResult<&S> {
        if !self.can_redo() {
            return Err(EngineError::NothingToRedo);
        }
        self.cursor += 1;
        Ok(&self.snapshots[self.cursor])
    }

    /// Replace the whole history with a single baseline snapshot
    pub fn reset(&mut self, state: &S) {
        self.snapshots.clear();
        self.snapshots.push(state.clone());
        self.cursor = 0;
    }

    pub fn can_undo(&self) -> bool {
        !self.snapshots.is_empty() && self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Snapshot matching the live state
    pub fn current(&self) -> Option<&S> {
        self.snapshots.get(self.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undo_redo_walks_snapshots() {
        let mut history = HistoryManager::new();
        history.record(&0);
        history.record(&1);
        history.record(&2);

        assert_eq!(*history.undo().unwrap(), 1);
        assert_eq!(*history.undo().unwrap(), 0);
        assert!(matches!(history.undo(), Err(EngineError::NothingToUndo)));
        assert_eq!(*history.redo().unwrap(), 1);
        assert_eq!(*history.redo().unwrap(), 2);
        assert!(matches!(history.redo(), Err(EngineError::NothingToRedo)));
    }

    #[test]
    fn test_record_truncates_redo_branch() {
        let mut history = HistoryManager::new();
        history.record(&"a");
        history.record(&"b");
        history.record(&"c");
        history.undo().unwrap();
        history.undo().unwrap();
        history.record(&"d");

        assert_eq!(history.len(), 2);
        assert!(!history.can_redo());
        assert_eq!(history.current(), Some(&"d"));
        assert_eq!(*history.undo().unwrap(), "a");
    }

    #[test]
    fn test_empty_history() {
        let mut history: HistoryManager<u8> = HistoryManager::new();
        assert!(history.is_empty());
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(history.undo().is_err());
        assert!(history.redo().is_err());
        assert_eq!(history.current(), None);
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = HistoryManager::new().with_limit(Some(3));
        for i in 0..10 {
            history.record(&i);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), 2);
        assert_eq!(*history.undo().unwrap(), 8);
        assert_eq!(*history.undo().unwrap(), 7);
        assert!(history.undo().is_err());
    }

    #[test]
    fn test_reset() {
        let mut history = HistoryManager::new();
        history.record(&1);
        history.record(&2);
        history.reset(&5);
        assert_eq!(history.len(), 1);
        assert_eq!(history.current(), Some(&5));
        assert!(!history.can_undo());
    }
}
