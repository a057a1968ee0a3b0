//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian
//! length. A connection is request-response until `Subscribe`, which
//! switches it to push-only notification delivery.

use serde::{Deserialize, Serialize};

use crate::capture::CaptureState;
use crate::events::ClientEvent;
use crate::notes::Note;

/// Requests from a front-end to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Start a capture session
    StartRecording,

    /// Set the caption for the current or next session
    SetCaption { text: String },

    /// Stop the session and finalize the artifact; an optional caption
    /// submitted with the stop gesture overrides the stored one
    StopRecording { caption: Option<String> },

    /// Read the current collection snapshot
    ListNotes,

    /// Re-fetch the collection from the remote store
    ReloadNotes,

    /// Save an edit draft for a note
    UpdateNote {
        id: String,
        title: String,
        transcript: String,
    },

    /// Delete a note
    DeleteNote { id: String },

    /// Generate a summary for an unsummarized note
    SummarizeNote { id: String },

    /// Switch this connection to push notifications
    Subscribe,
}

/// Responses from the daemon to a front-end
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current daemon status
    Status(DaemonStatus),

    /// Collection snapshot, newest first
    Notes { notes: Vec<Note> },

    /// Canonical note after a confirmed mutation
    Note(Note),

    /// Confirmed deletion
    Deleted { id: String },

    /// Capture state after a capture intent
    Capture { state: CaptureState },

    /// Subscription confirmed; notifications follow
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification to a subscribed front-end
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A capture or collection change occurred
    Event { event: ClientEvent },

    /// The daemon is stopping; the connection will close
    ShuttingDown,
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Current capture state
    pub capture: CaptureState,

    /// Number of notes in the local collection
    pub note_count: usize,

    /// Whether the last load attempt failed
    pub load_failed: bool,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            capture: CaptureState::default(),
            note_count: 0,
            load_failed: false,
            uptime_secs: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::UpdateNote {
            id: "1".to_string(),
            title: "B".to_string(),
            transcript: "hi".to_string(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("update_note"));
        assert!(json.contains("\"id\":\"1\""));
    }

    #[test]
    fn test_request_deserialization() {
        let json = r#"{"type":"stop_recording","caption":"My memo"}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert!(matches!(
            req,
            Request::StopRecording { caption: Some(c) } if c == "My memo"
        ));
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(DaemonStatus::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("status"));
        assert!(json.contains("idle"));
    }

    #[test]
    fn test_notification_serialization() {
        let n = Notification::Event {
            event: ClientEvent::NoteDeleted {
                id: "1".to_string(),
            },
        };
        let json = serde_json::to_string(&n).unwrap();
        assert!(json.contains("note_deleted"));
    }
}
