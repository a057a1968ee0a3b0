//! Note wire model and edit draft diffing
//!
//! Field names follow the remote store's JSON representation; the server
//! is the source of truth for every field here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical note as returned by the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Server-assigned identifier, immutable once assigned
    #[serde(rename = "_id")]
    pub id: String,

    /// User-visible title, empty until the user sets one
    #[serde(default)]
    pub title: String,

    /// Transcribed text of the recording
    #[serde(default)]
    pub transcript: String,

    /// Opaque reference to the uploaded audio, set once at creation
    #[serde(rename = "audioPath", default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<String>,

    /// Generated summary, absent until a summarize intent succeeds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Server-assigned creation timestamp
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Note {
    /// A summary is set at most once; a summarized note never goes back.
    pub fn is_summarized(&self) -> bool {
        self.summary.is_some()
    }
}

/// Uncommitted title/transcript pair held by a front-end while editing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub title: String,
    pub transcript: String,
}

impl NoteDraft {
    /// Diff this draft against the last-committed note, keeping only the
    /// fields that actually changed. An empty patch means saving is a
    /// local no-op.
    pub fn diff(&self, committed: &Note) -> NotePatch {
        NotePatch {
            title: (self.title != committed.title).then(|| self.title.clone()),
            transcript: (self.transcript != committed.transcript)
                .then(|| self.transcript.clone()),
        }
    }
}

/// Partial update payload; only the changed fields are serialized
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

impl NotePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.transcript.is_none()
    }
}
