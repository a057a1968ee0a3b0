//! Remote note store collaborator
//!
//! The note controller talks to the store through `NoteBackend`, so the
//! transport can be swapped for a mock in tests. The shipped
//! implementation is `HttpNoteStore`.

mod http;

pub use http::HttpNoteStore;

use async_trait::async_trait;

use crate::capture::Recording;
use crate::notes::{Note, NotePatch};

/// Transport-level failure; the core interprets nothing beyond the fact
/// that the call did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Response(String),
}

/// Backend trait for the five remote note store operations.
#[async_trait]
pub trait NoteBackend: Send + Sync {
    /// Fetch the full collection in the server's ordering.
    async fn list(&self) -> Result<Vec<Note>, BackendError>;

    /// Submit a finalized recording; returns the canonical created note.
    async fn create(&self, recording: &Recording) -> Result<Note, BackendError>;

    /// Submit a partial update; returns the canonical updated note.
    async fn update(&self, id: &str, patch: &NotePatch) -> Result<Note, BackendError>;

    /// Delete a note by id.
    async fn delete(&self, id: &str) -> Result<(), BackendError>;

    /// Request summary generation; returns the canonical note with the
    /// summary populated.
    async fn summarize(&self, id: &str) -> Result<Note, BackendError>;
}
