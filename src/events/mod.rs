//! Events module for capture and note collection changes
//!
//! Provides structured event types broadcast to subscribed front-ends
//! whenever the capture machine transitions or the note collection is
//! reconciled against the remote store.

use serde::{Deserialize, Serialize};

/// Events emitted by the capture machine and the note controller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// A capture session started (device acquired)
    CaptureStarted,

    /// Device acquisition failed, no session was opened
    CaptureFailed {
        /// Human-readable failure description
        reason: String,
    },

    /// A capture session was finalized into one artifact
    CaptureFinalized {
        /// Size of the finalized artifact in bytes
        bytes: usize,
    },

    /// The note collection was replaced from the remote store
    NotesLoaded {
        /// Number of notes in the loaded collection
        count: usize,
    },

    /// A created note was confirmed and prepended to the collection
    NoteCreated { id: String },

    /// An upload produced no note; the recording was discarded
    NoteCreateFailed {
        /// Human-readable failure description
        reason: String,
    },

    /// A note's edited fields were confirmed and applied
    NoteUpdated { id: String },

    /// A note was confirmed deleted and removed from the collection
    NoteDeleted { id: String },

    /// A note's summary was generated and applied
    NoteSummarized { id: String },
}

impl std::fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientEvent::CaptureStarted => write!(f, "CAPTURE_STARTED"),
            ClientEvent::CaptureFailed { reason } => {
                write!(f, "CAPTURE_FAILED ({})", reason)
            }
            ClientEvent::CaptureFinalized { bytes } => {
                write!(f, "CAPTURE_FINALIZED ({} bytes)", bytes)
            }
            ClientEvent::NotesLoaded { count } => write!(f, "NOTES_LOADED ({})", count),
            ClientEvent::NoteCreated { id } => write!(f, "NOTE_CREATED ({})", id),
            ClientEvent::NoteCreateFailed { reason } => {
                write!(f, "NOTE_CREATE_FAILED ({})", reason)
            }
            ClientEvent::NoteUpdated { id } => write!(f, "NOTE_UPDATED ({})", id),
            ClientEvent::NoteDeleted { id } => write!(f, "NOTE_DELETED ({})", id),
            ClientEvent::NoteSummarized { id } => write!(f, "NOTE_SUMMARIZED ({})", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = ClientEvent::CaptureFinalized { bytes: 2048 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("capture_finalized"));
        assert!(json.contains("2048"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"note_deleted","id":"abc123"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ClientEvent::NoteDeleted { id } if id == "abc123"));
    }

    #[test]
    fn test_event_display() {
        let event = ClientEvent::NoteCreated {
            id: "abc123".to_string(),
        };
        assert_eq!(event.to_string(), "NOTE_CREATED (abc123)");
    }
}
