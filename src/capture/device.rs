//! Audio input device collaborator
//!
//! A device grants exclusive access to one fragment stream at a time and
//! pushes binary fragments into the sink the machine hands it at
//! acquisition. `FileSource` is the bundled implementation: it streams a
//! file from disk in fixed-size fragments on a background task, standing
//! in for a physical microphone.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

/// Sink the device pushes fragments into, in capture order
pub type FragmentSender = mpsc::UnboundedSender<Vec<u8>>;
/// Receiving side held by the capture machine
pub type FragmentReceiver = mpsc::UnboundedReceiver<Vec<u8>>;

const DEFAULT_FRAGMENT_BYTES: usize = 16 * 1024;
const FRAGMENT_PACING: Duration = Duration::from_millis(5);

/// Errors surfaced by the capture layer
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Exclusive-access audio input source
#[async_trait]
pub trait AudioDevice: Send + Sync {
    /// Acquire the device. Fragments flow into `sink` until the returned
    /// handle is released.
    async fn acquire(&self, sink: FragmentSender) -> Result<Box<dyn DeviceHandle>, CaptureError>;

    /// Media type of the stream this device produces.
    fn media_type(&self) -> &str;
}

/// Live reservation of an acquired device
pub trait DeviceHandle: Send {
    /// Stop the underlying stream and give up the reservation. Safe to
    /// call more than once.
    fn release(&mut self);
}

/// File-backed audio source
pub struct FileSource {
    path: PathBuf,
    fragment_bytes: usize,
    media_type: String,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let media_type = media_type_for(&path);
        Self {
            path,
            fragment_bytes: DEFAULT_FRAGMENT_BYTES,
            media_type,
        }
    }
}

fn media_type_for(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("webm") => "audio/webm",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("mp3") => "audio/mpeg",
        _ => "application/octet-stream",
    }
    .to_string()
}

struct FileHandle {
    running: Arc<AtomicBool>,
}

impl DeviceHandle for FileHandle {
    fn release(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl AudioDevice for FileSource {
    async fn acquire(&self, sink: FragmentSender) -> Result<Box<dyn DeviceHandle>, CaptureError> {
        let data = tokio::fs::read(&self.path).await.map_err(|e| {
            CaptureError::DeviceUnavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let running = Arc::new(AtomicBool::new(true));
        let stream_running = Arc::clone(&running);
        let fragment_bytes = self.fragment_bytes;

        tokio::spawn(async move {
            for fragment in data.chunks(fragment_bytes) {
                if !stream_running.load(Ordering::SeqCst) {
                    break;
                }
                if sink.send(fragment.to_vec()).is_err() {
                    debug!("fragment sink closed, stopping file stream");
                    break;
                }
                tokio::time::sleep(FRAGMENT_PACING).await;
            }
            stream_running.store(false, Ordering::SeqCst);
        });

        Ok(Box::new(FileHandle { running }))
    }

    fn media_type(&self) -> &str {
        &self.media_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_audio_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("voicenotes-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_media_type_from_extension() {
        assert_eq!(media_type_for(Path::new("a.webm")), "audio/webm");
        assert_eq!(media_type_for(Path::new("a.wav")), "audio/wav");
        assert_eq!(media_type_for(Path::new("a.raw")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_missing_file_is_device_unavailable() {
        let source = FileSource::new("/nonexistent/capture.webm");
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = source.acquire(tx).await.err().unwrap();
        assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_streams_file_contents_in_order() {
        let path = temp_audio_file("stream.webm", b"abcdefgh");
        let source = FileSource {
            path: path.clone(),
            fragment_bytes: 3,
            media_type: "audio/webm".to_string(),
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = source.acquire(tx).await.unwrap();

        let mut collected = Vec::new();
        while let Some(fragment) = rx.recv().await {
            collected.extend_from_slice(&fragment);
        }
        assert_eq!(collected, b"abcdefgh");

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_release_stops_the_stream() {
        let path = temp_audio_file("release.webm", &[7u8; 64 * 1024]);
        let source = FileSource {
            path: path.clone(),
            fragment_bytes: 8,
            media_type: "audio/webm".to_string(),
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = source.acquire(tx).await.unwrap();
        handle.release();

        let mut received = 0usize;
        while let Some(fragment) = rx.recv().await {
            received += fragment.len();
        }
        assert!(received < 64 * 1024);

        std::fs::remove_file(path).ok();
    }
}
