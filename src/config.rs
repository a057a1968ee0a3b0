//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_API_URL: &str = "http://localhost:4000";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote note store
    pub api_url: String,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Audio file the capture source streams from
    pub audio_source: PathBuf,

    /// Request timeout for the note store transport
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let api_url = std::env::var("VOICENOTES_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let data_dir = match std::env::var_os("VOICENOTES_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = std::env::var("HOME").context("HOME is not set")?;
                PathBuf::from(home)
                    .join(".local")
                    .join("share")
                    .join("voicenotes")
            }
        };

        let socket_path = data_dir.join("daemon.sock");

        let audio_source = std::env::var_os("VOICENOTES_AUDIO_SOURCE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("capture.webm"));

        let http_timeout = std::env::var("VOICENOTES_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));

        Ok(Self {
            api_url,
            data_dir,
            socket_path,
            audio_source,
            http_timeout,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}
