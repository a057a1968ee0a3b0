//! Note collection module
//!
//! The wire model, edit-draft diffing, and the controller that owns the
//! in-memory collection and reconciles it with the remote store.

mod controller;
mod model;

pub use controller::{NoteController, StoreError};
pub use model::{Note, NoteDraft, NotePatch};
