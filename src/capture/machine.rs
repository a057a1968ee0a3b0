//! Capture state machine
//!
//! Owns the device reservation and the in-progress fragment sequence,
//! and finalizes a session into one uploadable artifact. Designed to be
//! wrapped in a Mutex and shared with the IPC layer; redundant
//! `start`/`stop` calls are no-ops so a double-triggered gesture can
//! never corrupt device ownership.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::events::ClientEvent;

use super::device::{AudioDevice, CaptureError, DeviceHandle, FragmentReceiver};

/// The four states of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    /// No session, ready to start
    Idle,
    /// Waiting for the device grant
    Requesting,
    /// Device held, fragments accumulating
    Recording,
    /// Device released, artifact being assembled
    Finalizing,
}

impl Default for CaptureState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureState::Idle => write!(f, "Idle"),
            CaptureState::Requesting => write!(f, "Requesting"),
            CaptureState::Recording => write!(f, "Recording"),
            CaptureState::Finalizing => write!(f, "Finalizing"),
        }
    }
}

/// Finalized artifact handed to the upload path
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    /// Ordered concatenation of every non-empty fragment of the session
    pub data: Vec<u8>,
    /// Media type the device produced
    pub media_type: String,
    /// User-entered caption, if any
    pub caption: Option<String>,
    /// When the session was finalized
    pub finalized_at: DateTime<Utc>,
}

impl Recording {
    /// Upload filename, derived from the finalization time.
    pub fn file_name(&self) -> String {
        let ext = match self.media_type.as_str() {
            "audio/webm" => "webm",
            "audio/wav" => "wav",
            "audio/ogg" => "ogg",
            "audio/mpeg" => "mp3",
            _ => "bin",
        };
        format!("recording_{}.{}", self.finalized_at.timestamp_millis(), ext)
    }
}

/// The state machine that manages capture sessions
pub struct CaptureMachine {
    state: CaptureState,
    device: Arc<dyn AudioDevice>,
    handle: Option<Box<dyn DeviceHandle>>,
    fragments: Option<FragmentReceiver>,
    caption: Option<String>,
    upload_tx: mpsc::UnboundedSender<Recording>,
    event_tx: broadcast::Sender<ClientEvent>,
}

impl CaptureMachine {
    pub fn new(
        device: Arc<dyn AudioDevice>,
        upload_tx: mpsc::UnboundedSender<Recording>,
        event_tx: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            state: CaptureState::Idle,
            device,
            handle: None,
            fragments: None,
            caption: None,
            upload_tx,
            event_tx,
        }
    }

    /// Get the current capture state
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Set the caption for the current or next session. An empty string
    /// clears it.
    pub fn set_caption(&mut self, caption: impl Into<String>) {
        let caption = caption.into();
        self.caption = if caption.is_empty() {
            None
        } else {
            Some(caption)
        };
    }

    /// Start a capture session. Valid only from Idle; anywhere else this
    /// is a logged no-op.
    ///
    /// On device denial the machine stays in Idle and no partial session
    /// is retained.
    pub async fn start(&mut self) -> Result<(), CaptureError> {
        if self.state != CaptureState::Idle {
            debug!(state = %self.state, "start ignored");
            return Ok(());
        }

        self.state = CaptureState::Requesting;
        let (fragment_tx, fragment_rx) = mpsc::unbounded_channel();

        match self.device.acquire(fragment_tx).await {
            Ok(handle) => {
                self.handle = Some(handle);
                self.fragments = Some(fragment_rx);
                self.state = CaptureState::Recording;
                info!("recording started");
                let _ = self.event_tx.send(ClientEvent::CaptureStarted);
                Ok(())
            }
            Err(e) => {
                self.state = CaptureState::Idle;
                warn!(error = %e, "device acquisition failed");
                let _ = self.event_tx.send(ClientEvent::CaptureFailed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Stop the session and finalize the artifact. Valid only from
    /// Recording; anywhere else this is a logged no-op.
    ///
    /// The device is released before anything else, the accumulated
    /// fragments are concatenated into one artifact, and the artifact is
    /// handed to the upload channel. The machine returns to Idle with the
    /// caption cleared no matter what the upload consumer does.
    pub fn stop(&mut self) {
        if self.state != CaptureState::Recording {
            debug!(state = %self.state, "stop ignored");
            return;
        }

        self.state = CaptureState::Finalizing;
        self.release_device();

        let mut data = Vec::new();
        let mut fragments = 0usize;
        if let Some(mut rx) = self.fragments.take() {
            rx.close();
            while let Ok(fragment) = rx.try_recv() {
                if fragment.is_empty() {
                    continue;
                }
                fragments += 1;
                data.extend_from_slice(&fragment);
            }
        }

        let recording = Recording {
            data,
            media_type: self.device.media_type().to_string(),
            caption: self.caption.take(),
            finalized_at: Utc::now(),
        };

        info!(fragments, bytes = recording.data.len(), "recording finalized");
        let _ = self.event_tx.send(ClientEvent::CaptureFinalized {
            bytes: recording.data.len(),
        });

        if self.upload_tx.send(recording).is_err() {
            warn!("upload channel closed, recording dropped");
        }

        self.state = CaptureState::Idle;
    }

    fn release_device(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.release();
        }
    }
}

impl Drop for CaptureMachine {
    fn drop(&mut self) {
        self.release_device();
    }
}
