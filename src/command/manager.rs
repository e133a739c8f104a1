// PatternStore - Canonical AppState with undo/redo history

use crate::command::edit::{Edit, ValidationError};
use crate::pattern::AppState;
use std::collections::VecDeque;
use std::sync::Arc;

/// Default maximum number of states to keep in history
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// A past (or undone) snapshot and the label of the transition that left it
struct HistoryEntry {
    state: Arc<AppState>,
    description: String,
}

/// Holds the current AppState and the undo/redo history.
///
/// The history stores whole snapshots. Because snapshots share unchanged
/// lanes and slots, each entry only costs what its transition reallocated.
///
/// When a new state is applied:
/// 1. The current state is pushed onto the undo stack
/// 2. The redo stack is cleared (we're on a new timeline)
/// 3. The oldest entry is dropped if the history limit is exceeded
pub struct PatternStore {
    current: Arc<AppState>,
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: VecDeque<HistoryEntry>,
    max_history: usize,
}

impl PatternStore {
    /// Create a store with default history limit
    pub fn new(initial: AppState) -> Self {
        Self::with_capacity(initial, DEFAULT_MAX_HISTORY)
    }

    /// Create a store with a custom history limit
    pub fn with_capacity(initial: AppState, max_history: usize) -> Self {
        Self {
            current: Arc::new(initial),
            undo_stack: VecDeque::with_capacity(max_history.min(DEFAULT_MAX_HISTORY)),
            redo_stack: VecDeque::new(),
            max_history: max_history.max(1),
        }
    }

    /// Current state
    pub fn current(&self) -> &AppState {
        &self.current
    }

    /// Shared handle to the current state. Stays valid after later transitions.
    pub fn snapshot(&self) -> Arc<AppState> {
        Arc::clone(&self.current)
    }

    /// Apply a total transform to the current state
    pub fn apply(&mut self, transform: impl FnOnce(&AppState) -> AppState) {
        self.apply_described(transform, "Edit");
    }

    /// Apply a total transform and label it for the history
    pub fn apply_described(
        &mut self,
        transform: impl FnOnce(&AppState) -> AppState,
        description: impl Into<String>,
    ) {
        let next = Arc::new(transform(&self.current));
        let previous = std::mem::replace(&mut self.current, next);

        self.undo_stack.push_back(HistoryEntry {
            state: previous,
            description: description.into(),
        });
        self.redo_stack.clear();

        if self.undo_stack.len() > self.max_history {
            self.undo_stack.pop_front();
        }
    }

    /// Validate an edit against the current state and apply it
    ///
    /// # Errors
    /// Returns the validation failure; the store is unchanged in that case.
    pub fn commit(&mut self, edit: &Edit) -> Result<(), ValidationError> {
        edit.validate(&self.current)?;
        self.apply_described(|state| edit.apply_to(state), edit.description());
        Ok(())
    }

    /// Restore the previous state. Returns the label of the undone transition,
    /// or `None` (and does nothing) when there is no history.
    pub fn undo(&mut self) -> Option<String> {
        let entry = self.undo_stack.pop_back()?;
        let undone = std::mem::replace(&mut self.current, entry.state);
        self.redo_stack.push_back(HistoryEntry {
            state: undone,
            description: entry.description.clone(),
        });
        Some(entry.description)
    }

    /// Re-apply the last undone transition. No-op when nothing was undone.
    pub fn redo(&mut self) -> Option<String> {
        let entry = self.redo_stack.pop_back()?;
        let previous = std::mem::replace(&mut self.current, entry.state);
        self.undo_stack.push_back(HistoryEntry {
            state: previous,
            description: entry.description.clone(),
        });
        Some(entry.description)
    }

    /// Replace the current state without recording history (session load)
    pub fn reset(&mut self, state: AppState) {
        self.current = Arc::new(state);
        self.clear_history();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Label of the transition `undo` would revert
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|e| e.description.as_str())
    }

    /// Label of the transition `redo` would re-apply
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|e| e.description.as_str())
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn clear_history(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::new(AppState::new())
    }
}
