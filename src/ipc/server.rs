//! Unix domain socket server for IPC
//!
//! Accepts front-end connections, routes intents to the capture machine
//! and the note controller, and pushes change notifications to
//! subscribed connections.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::capture::CaptureMachine;
use crate::events::ClientEvent;
use crate::notes::{NoteController, NoteDraft, StoreError};

use super::protocol::{DaemonStatus, Notification, Request, Response};

const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// IPC server handling front-end connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    capture: Arc<Mutex<CaptureMachine>>,
    notes: Arc<NoteController>,
    event_tx: broadcast::Sender<ClientEvent>,
    shutdown_tx: broadcast::Sender<()>,
    start_time: Instant,
}

impl Server {
    /// Bind the socket and prepare the server. Stale sockets from a
    /// previous run are removed; the socket is owner-only.
    pub fn new(
        socket_path: &Path,
        capture: Arc<Mutex<CaptureMachine>>,
        notes: Arc<NoteController>,
        event_tx: broadcast::Sender<ClientEvent>,
    ) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            capture,
            notes,
            event_tx,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let capture = Arc::clone(&self.capture);
                    let notes = Arc::clone(&self.notes);
                    let event_rx = self.event_tx.subscribe();
                    let shutdown_rx = self.shutdown_tx.subscribe();
                    let start_time = self.start_time;

                    tokio::spawn(async move {
                        let result = Self::handle_client(
                            stream,
                            capture,
                            notes,
                            event_rx,
                            shutdown_rx,
                            start_time,
                        )
                        .await;
                        if let Err(e) = result {
                            warn!(?e, "client handler error");
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(
        mut stream: UnixStream,
        capture: Arc<Mutex<CaptureMachine>>,
        notes: Arc<NoteController>,
        mut event_rx: broadcast::Receiver<ClientEvent>,
        mut shutdown_rx: broadcast::Receiver<()>,
        start_time: Instant,
    ) -> Result<()> {
        loop {
            let msg = match Self::read_frame(&mut stream).await? {
                Some(msg) => msg,
                None => {
                    debug!("client disconnected");
                    return Ok(());
                }
            };

            let request: Request =
                serde_json::from_slice(&msg).context("failed to parse request")?;
            debug!(?request, "received request");

            let (response, subscribe) =
                Self::process_request(request, &capture, &notes, start_time).await;
            Self::send_message(&mut stream, &response).await?;

            if subscribe {
                debug!("client subscribed to notifications");
                return Self::push_notifications(stream, &mut event_rx, &mut shutdown_rx).await;
            }
        }
    }

    /// Forward events to a subscribed connection until it drops or the
    /// daemon shuts down
    async fn push_notifications(
        mut stream: UnixStream,
        event_rx: &mut broadcast::Receiver<ClientEvent>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                event = event_rx.recv() => match event {
                    Ok(event) => {
                        let notification = Notification::Event { event };
                        if Self::send_message(&mut stream, &notification).await.is_err() {
                            debug!("subscriber disconnected");
                            return Ok(());
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "notification receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                },
                _ = shutdown_rx.recv() => {
                    let _ = Self::send_message(&mut stream, &Notification::ShuttingDown).await;
                    return Ok(());
                }
            }
        }
    }

    /// Read one length-prefixed frame; None means the peer closed
    async fn read_frame(stream: &mut UnixStream) -> Result<Option<Vec<u8>>> {
        let mut len_buf = [0u8; 4];
        match stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_FRAME_BYTES {
            warn!(len, "message too large, disconnecting");
            return Ok(None);
        }

        let mut msg = vec![0u8; len];
        stream.read_exact(&mut msg).await?;
        Ok(Some(msg))
    }

    /// Send a length-prefixed JSON message
    async fn send_message<T: serde::Serialize>(stream: &mut UnixStream, msg: &T) -> Result<()> {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        stream.write_all(&msg_len).await?;
        stream.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Process a request. Returns (response, should_subscribe).
    async fn process_request(
        request: Request,
        capture: &Arc<Mutex<CaptureMachine>>,
        notes: &Arc<NoteController>,
        start_time: Instant,
    ) -> (Response, bool) {
        let response = match request {
            Request::Ping => Response::Pong,

            Request::GetStatus => {
                let capture_state = capture.lock().await.state();
                Response::Status(DaemonStatus {
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    capture: capture_state,
                    note_count: notes.note_count().await,
                    load_failed: notes.load_failed().await,
                    uptime_secs: start_time.elapsed().as_secs(),
                })
            }

            Request::StartRecording => {
                let mut machine = capture.lock().await;
                match machine.start().await {
                    Ok(()) => Response::Capture {
                        state: machine.state(),
                    },
                    Err(e) => Response::Error {
                        code: "device_unavailable".to_string(),
                        message: e.to_string(),
                    },
                }
            }

            Request::SetCaption { text } => {
                let mut machine = capture.lock().await;
                machine.set_caption(text);
                Response::Capture {
                    state: machine.state(),
                }
            }

            Request::StopRecording { caption } => {
                let mut machine = capture.lock().await;
                if let Some(caption) = caption {
                    machine.set_caption(caption);
                }
                machine.stop();
                Response::Capture {
                    state: machine.state(),
                }
            }

            Request::ListNotes => Response::Notes {
                notes: notes.snapshot().await,
            },

            Request::ReloadNotes => match notes.load().await {
                Ok(loaded) => Response::Notes { notes: loaded },
                Err(e) => Self::store_error(e),
            },

            Request::UpdateNote {
                id,
                title,
                transcript,
            } => {
                let draft = NoteDraft { title, transcript };
                match notes.update(&id, &draft).await {
                    Ok(note) => Response::Note(note),
                    Err(e) => Self::store_error(e),
                }
            }

            Request::DeleteNote { id } => match notes.delete(&id).await {
                Ok(()) => Response::Deleted { id },
                Err(e) => Self::store_error(e),
            },

            Request::SummarizeNote { id } => match notes.summarize(&id).await {
                Ok(note) => Response::Note(note),
                Err(e) => Self::store_error(e),
            },

            Request::Subscribe => return (Response::Subscribed, true),
        };

        (response, false)
    }

    fn store_error(e: StoreError) -> Response {
        Response::Error {
            code: e.code().to_string(),
            message: e.to_string(),
        }
    }

    /// Gracefully shut down the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use crate::capture::{FileSource, Recording};
    use crate::notes::{Note, NotePatch};
    use crate::remote::{BackendError, NoteBackend};

    use super::*;

    struct EmptyBackend;

    #[async_trait]
    impl NoteBackend for EmptyBackend {
        async fn list(&self) -> Result<Vec<Note>, BackendError> {
            Ok(Vec::new())
        }

        async fn create(&self, _recording: &Recording) -> Result<Note, BackendError> {
            Err(BackendError::Response("unavailable".to_string()))
        }

        async fn update(&self, _id: &str, _patch: &NotePatch) -> Result<Note, BackendError> {
            Err(BackendError::Response("unavailable".to_string()))
        }

        async fn delete(&self, _id: &str) -> Result<(), BackendError> {
            Err(BackendError::Response("unavailable".to_string()))
        }

        async fn summarize(&self, _id: &str) -> Result<Note, BackendError> {
            Err(BackendError::Response("unavailable".to_string()))
        }
    }

    async fn roundtrip(stream: &mut UnixStream, request: &Request) -> Response {
        let bytes = serde_json::to_vec(request).unwrap();
        stream
            .write_all(&(bytes.len() as u32).to_le_bytes())
            .await
            .unwrap();
        stream.write_all(&bytes).await.unwrap();

        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await.unwrap();
        let mut msg = vec![0u8; u32::from_le_bytes(len_buf) as usize];
        stream.read_exact(&mut msg).await.unwrap();
        serde_json::from_slice(&msg).unwrap()
    }

    #[tokio::test]
    async fn test_request_response_over_socket() {
        let socket_path = std::env::temp_dir().join(format!(
            "voicenotes-ipc-test-{}.sock",
            std::process::id()
        ));

        let (event_tx, _) = broadcast::channel(16);
        let (upload_tx, _upload_rx) = mpsc::unbounded_channel();
        let notes = Arc::new(NoteController::new(Arc::new(EmptyBackend), event_tx.clone()));
        let capture = Arc::new(Mutex::new(CaptureMachine::new(
            Arc::new(FileSource::new("/nonexistent/capture.webm")),
            upload_tx,
            event_tx.clone(),
        )));

        let server = Arc::new(
            Server::new(&socket_path, capture, Arc::clone(&notes), event_tx).unwrap(),
        );
        let running = Arc::clone(&server);
        tokio::spawn(async move {
            let _ = running.run().await;
        });

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();

        let resp = roundtrip(&mut stream, &Request::Ping).await;
        assert!(matches!(resp, Response::Pong));

        let resp = roundtrip(&mut stream, &Request::GetStatus).await;
        match resp {
            Response::Status(status) => {
                assert_eq!(status.note_count, 0);
                assert_eq!(status.capture, crate::capture::CaptureState::Idle);
            }
            other => panic!("unexpected response: {:?}", other),
        }

        let resp = roundtrip(&mut stream, &Request::ListNotes).await;
        assert!(matches!(resp, Response::Notes { notes } if notes.is_empty()));

        let resp = roundtrip(&mut stream, &Request::StartRecording).await;
        assert!(matches!(
            resp,
            Response::Error { code, .. } if code == "device_unavailable"
        ));

        server.shutdown().await;
        std::fs::remove_file(&socket_path).ok();
    }
}
