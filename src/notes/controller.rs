//! Note store controller
//!
//! Holds the authoritative in-memory note collection and reconciles it
//! against the remote store. Every mutation is confirm-then-apply: the
//! server's response is the only thing ever written into the collection,
//! so there is no rollback path for fields the client cannot synthesize.
//!
//! Per-id serialization is enforced with a busy-id set: a second
//! update/delete/summarize against an id with an in-flight operation is
//! rejected. Independent ids mutate independently.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::capture::Recording;
use crate::events::ClientEvent;
use crate::remote::{BackendError, NoteBackend};

use super::model::{Note, NoteDraft};

/// Errors surfaced by note store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to load notes")]
    LoadFailed(#[source] BackendError),

    #[error("failed to create note")]
    CreateFailed(#[source] BackendError),

    #[error("failed to update note {id}")]
    UpdateFailed {
        id: String,
        #[source]
        source: BackendError,
    },

    #[error("failed to delete note {id}")]
    DeleteFailed {
        id: String,
        #[source]
        source: BackendError,
    },

    #[error("failed to summarize note {id}")]
    SummarizeFailed {
        id: String,
        #[source]
        source: BackendError,
    },

    #[error("no note with id {0}")]
    UnknownId(String),

    #[error("note {0} already has a summary")]
    AlreadySummarized(String),

    #[error("another operation is in flight for note {0}")]
    Busy(String),
}

impl StoreError {
    /// Stable machine-readable code for the IPC error response.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::LoadFailed(_) => "load_failed",
            StoreError::CreateFailed(_) => "create_failed",
            StoreError::UpdateFailed { .. } => "update_failed",
            StoreError::DeleteFailed { .. } => "delete_failed",
            StoreError::SummarizeFailed { .. } => "summarize_failed",
            StoreError::UnknownId(_) => "unknown_id",
            StoreError::AlreadySummarized(_) => "already_summarized",
            StoreError::Busy(_) => "busy",
        }
    }
}

/// Collection state guarded by one lock; the lock is never held across
/// a remote round-trip.
#[derive(Default)]
struct Collection {
    notes: Vec<Note>,
    busy: HashSet<String>,
    load_failed: bool,
}

impl Collection {
    fn get(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    fn claim(&mut self, id: &str) -> Result<(), StoreError> {
        if !self.busy.insert(id.to_string()) {
            return Err(StoreError::Busy(id.to_string()));
        }
        Ok(())
    }

    fn replace(&mut self, note: &Note) {
        if let Some(slot) = self.notes.iter_mut().find(|n| n.id == note.id) {
            *slot = note.clone();
        }
    }
}

/// The controller that owns the note collection
pub struct NoteController {
    backend: Arc<dyn NoteBackend>,
    collection: RwLock<Collection>,
    event_tx: broadcast::Sender<ClientEvent>,
}

impl NoteController {
    pub fn new(backend: Arc<dyn NoteBackend>, event_tx: broadcast::Sender<ClientEvent>) -> Self {
        Self {
            backend,
            collection: RwLock::new(Collection::default()),
            event_tx,
        }
    }

    /// Snapshot of the collection in client ordering, newest first.
    pub async fn snapshot(&self) -> Vec<Note> {
        self.collection.read().await.notes.clone()
    }

    pub async fn note_count(&self) -> usize {
        self.collection.read().await.notes.len()
    }

    /// Whether the last load attempt failed; cleared by the next
    /// successful load.
    pub async fn load_failed(&self) -> bool {
        self.collection.read().await.load_failed
    }

    /// Replace the local collection with the server's. On failure the
    /// collection is emptied so no stale data is shown.
    pub async fn load(&self) -> Result<Vec<Note>, StoreError> {
        match self.backend.list().await {
            Ok(notes) => {
                let count = notes.len();
                {
                    let mut collection = self.collection.write().await;
                    collection.notes = notes.clone();
                    collection.load_failed = false;
                }
                info!(count, "note collection loaded");
                let _ = self.event_tx.send(ClientEvent::NotesLoaded { count });
                Ok(notes)
            }
            Err(e) => {
                {
                    let mut collection = self.collection.write().await;
                    collection.notes.clear();
                    collection.load_failed = true;
                }
                warn!(error = %e, "load failed, collection cleared");
                Err(StoreError::LoadFailed(e))
            }
        }
    }

    /// Submit a finalized recording. The canonical created note is
    /// prepended; nothing is inserted speculatively.
    pub async fn create(&self, recording: Recording) -> Result<Note, StoreError> {
        match self.backend.create(&recording).await {
            Ok(note) => {
                self.collection.write().await.notes.insert(0, note.clone());
                info!(id = %note.id, "note created");
                let _ = self.event_tx.send(ClientEvent::NoteCreated {
                    id: note.id.clone(),
                });
                Ok(note)
            }
            Err(e) => {
                warn!(error = %e, "create failed");
                Err(StoreError::CreateFailed(e))
            }
        }
    }

    /// Save an edit draft. The draft is diffed against the committed
    /// note and only the changed fields are submitted; an empty diff
    /// makes no remote call. On failure the committed note is untouched.
    pub async fn update(&self, id: &str, draft: &NoteDraft) -> Result<Note, StoreError> {
        let patch = {
            let mut collection = self.collection.write().await;
            let committed = match collection.get(id) {
                Some(note) => note.clone(),
                None => return Err(StoreError::UnknownId(id.to_string())),
            };
            let patch = draft.diff(&committed);
            if patch.is_empty() {
                debug!(id, "update skipped, no changed fields");
                return Ok(committed);
            }
            collection.claim(id)?;
            patch
        };

        let result = self.backend.update(id, &patch).await;

        let mut collection = self.collection.write().await;
        collection.busy.remove(id);
        match result {
            Ok(note) => {
                collection.replace(&note);
                drop(collection);
                info!(id = %note.id, "note updated");
                let _ = self.event_tx.send(ClientEvent::NoteUpdated {
                    id: note.id.clone(),
                });
                Ok(note)
            }
            Err(e) => {
                warn!(id, error = %e, "update failed");
                Err(StoreError::UpdateFailed {
                    id: id.to_string(),
                    source: e,
                })
            }
        }
    }

    /// Delete a note. Removed locally only after the server confirms.
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        {
            let mut collection = self.collection.write().await;
            if collection.get(id).is_none() {
                return Err(StoreError::UnknownId(id.to_string()));
            }
            collection.claim(id)?;
        }

        let result = self.backend.delete(id).await;

        let mut collection = self.collection.write().await;
        collection.busy.remove(id);
        match result {
            Ok(()) => {
                collection.notes.retain(|n| n.id != id);
                drop(collection);
                info!(id, "note deleted");
                let _ = self.event_tx.send(ClientEvent::NoteDeleted { id: id.to_string() });
                Ok(())
            }
            Err(e) => {
                warn!(id, error = %e, "delete failed");
                Err(StoreError::DeleteFailed {
                    id: id.to_string(),
                    source: e,
                })
            }
        }
    }

    /// Request summary generation. Rejected without a remote call when a
    /// summary already exists; on failure the summary stays absent and
    /// the intent can be retried.
    pub async fn summarize(&self, id: &str) -> Result<Note, StoreError> {
        {
            let mut collection = self.collection.write().await;
            let note = match collection.get(id) {
                Some(note) => note,
                None => return Err(StoreError::UnknownId(id.to_string())),
            };
            if note.is_summarized() {
                return Err(StoreError::AlreadySummarized(id.to_string()));
            }
            collection.claim(id)?;
        }

        let result = self.backend.summarize(id).await;

        let mut collection = self.collection.write().await;
        collection.busy.remove(id);
        match result {
            Ok(note) => {
                collection.replace(&note);
                drop(collection);
                info!(id = %note.id, "note summarized");
                let _ = self.event_tx.send(ClientEvent::NoteSummarized {
                    id: note.id.clone(),
                });
                Ok(note)
            }
            Err(e) => {
                warn!(id, error = %e, "summarize failed");
                Err(StoreError::SummarizeFailed {
                    id: id.to_string(),
                    source: e,
                })
            }
        }
    }
}
