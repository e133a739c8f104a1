// Editor - Timeline pointer interaction
//
// Turns pointer input into seeks and quantized edits. The editor never
// mutates patterns itself: it hands `Edit`s to the store.

pub mod layout;
pub mod timeline;

pub use layout::{NoteHit, NoteZone, TimelineLayout};
pub use timeline::{
    DragKind, EditorAction, EditorState, NoteDrag, PointerEvent, PointerTarget, TimelineEditor,
};
