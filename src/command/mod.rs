// Command module - Pattern edits and undo/redo history
//
// Every change to the pattern goes through here. An `Edit` is validated,
// turned into a whole-state transition and recorded by the `PatternStore`,
// which can step back and forth through the recorded snapshots.

pub mod edit;
pub mod manager;

pub use edit::{Edit, ValidationError};
pub use manager::{DEFAULT_MAX_HISTORY, PatternStore};
