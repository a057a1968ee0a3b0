//! voicenotes-daemon: Background client for voice memo capture and note sync
//!
//! This daemon provides:
//! - An explicit state machine over the audio capture session
//! - An in-memory note collection reconciled against the remote store
//! - IPC server for front-end intents and change notifications
//!
//! Finalized recordings flow from the capture machine into the note
//! controller, which submits them to the remote store and prepends the
//! canonical created note. All other intents (edit, delete, summarize)
//! arrive over IPC and are confirmed by the server before the local
//! collection changes.

mod capture;
mod config;
mod events;
mod ipc;
mod lifecycle;
mod notes;
mod remote;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::capture::{CaptureMachine, FileSource};
use crate::config::Config;
use crate::events::ClientEvent;
use crate::ipc::Server;
use crate::notes::NoteController;
use crate::remote::HttpNoteStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "voicenotes-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        api_url = %config.api_url,
        socket_path = ?config.socket_path,
        "configuration loaded"
    );

    // Channels for inter-component communication
    // Capture machine -> upload loop
    let (upload_tx, mut upload_rx) = mpsc::unbounded_channel();
    // Capture machine + note controller -> subscribed IPC clients
    let (event_tx, _event_rx) = broadcast::channel::<ClientEvent>(64);

    // Remote store and the note controller that reconciles against it
    let backend = Arc::new(HttpNoteStore::new(
        config.api_url.clone(),
        config.http_timeout,
    )?);
    let notes = Arc::new(NoteController::new(backend, event_tx.clone()));

    // Capture machine over the configured audio source
    let device = Arc::new(FileSource::new(&config.audio_source));
    let capture = Arc::new(Mutex::new(CaptureMachine::new(
        device,
        upload_tx,
        event_tx.clone(),
    )));

    // Initial load; a failed load leaves an empty collection and the
    // front-end can re-issue ReloadNotes
    if let Err(e) = notes.load().await {
        warn!(error = %e, "initial note load failed, starting empty");
    }

    // IPC server over the capture machine and note controller
    let server = Server::new(
        &config.socket_path,
        Arc::clone(&capture),
        Arc::clone(&notes),
        event_tx.clone(),
    )?;

    info!("daemon initialized, entering main loop");

    let upload_notes = Arc::clone(&notes);
    let upload_events = event_tx.clone();

    // Main event loop
    tokio::select! {
        // Forward finalized recordings into the note controller
        _ = async {
            while let Some(recording) = upload_rx.recv().await {
                match upload_notes.create(recording).await {
                    Ok(note) => {
                        info!(id = %note.id, "recording uploaded");
                    }
                    Err(e) => {
                        warn!(error = %e, "upload failed, recording discarded");
                        let _ = upload_events.send(ClientEvent::NoteCreateFailed {
                            reason: e.to_string(),
                        });
                    }
                }
            }
        } => {
            info!("upload channel closed");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Wait for shutdown signal
        _ = lifecycle::shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");
    server.shutdown().await;
    info!("voicenotes-daemon stopped");

    Ok(())
}
