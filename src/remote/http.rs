//! HTTP implementation of the remote note store
//!
//! REST calls against `<base>/api/notes`; creation uploads the audio
//! artifact as a multipart form with an optional `title` field.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use tracing::debug;

use crate::capture::Recording;
use crate::notes::{Note, NotePatch};

use super::{BackendError, NoteBackend};

/// Remote note store over HTTP
#[derive(Debug, Clone)]
pub struct HttpNoteStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpNoteStore {
    /// Build a store client for the given base URL. The request timeout
    /// belongs to this transport layer, not to the core.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn notes_url(&self) -> String {
        format!("{}/api/notes", self.base_url)
    }

    fn note_url(&self, id: &str) -> String {
        format!("{}/api/notes/{}", self.base_url, id)
    }

    async fn expect_success(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Response(format!("{}: {}", status, body)));
        }
        Ok(resp)
    }
}

#[async_trait]
impl NoteBackend for HttpNoteStore {
    async fn list(&self) -> Result<Vec<Note>, BackendError> {
        let resp = self.client.get(self.notes_url()).send().await?;
        Ok(Self::expect_success(resp).await?.json().await?)
    }

    async fn create(&self, recording: &Recording) -> Result<Note, BackendError> {
        let file_name = recording.file_name();
        debug!(
            file_name = %file_name,
            bytes = recording.data.len(),
            "uploading recording"
        );

        let part = multipart::Part::bytes(recording.data.clone())
            .file_name(file_name)
            .mime_str(&recording.media_type)?;
        let mut form = multipart::Form::new().part("audio", part);
        if let Some(caption) = &recording.caption {
            form = form.text("title", caption.clone());
        }

        let resp = self
            .client
            .post(self.notes_url())
            .multipart(form)
            .send()
            .await?;
        Ok(Self::expect_success(resp).await?.json().await?)
    }

    async fn update(&self, id: &str, patch: &NotePatch) -> Result<Note, BackendError> {
        let resp = self
            .client
            .patch(self.note_url(id))
            .json(patch)
            .send()
            .await?;
        Ok(Self::expect_success(resp).await?.json().await?)
    }

    async fn delete(&self, id: &str) -> Result<(), BackendError> {
        let resp = self.client.delete(self.note_url(id)).send().await?;
        Self::expect_success(resp).await?;
        Ok(())
    }

    async fn summarize(&self, id: &str) -> Result<Note, BackendError> {
        let url = format!("{}/summarize", self.note_url(id));
        let resp = self.client.post(url).send().await?;
        Ok(Self::expect_success(resp).await?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_are_joined_against_base() {
        let store = HttpNoteStore::new("http://localhost:4000", Duration::from_secs(5)).unwrap();
        assert_eq!(store.notes_url(), "http://localhost:4000/api/notes");
        assert_eq!(store.note_url("abc"), "http://localhost:4000/api/notes/abc");
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let store = HttpNoteStore::new("http://localhost:4000/", Duration::from_secs(5)).unwrap();
        assert_eq!(store.notes_url(), "http://localhost:4000/api/notes");
    }
}
