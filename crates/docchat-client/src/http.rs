//! reqwest-backed implementation of the backend API

use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest_eventsource::{Event, EventSource};

use crate::{
    backend::{DocumentStore, QueryTransport},
    error::{Error, Result},
    stream::{ChannelEvent, ChannelStream, TerminateReason},
    types::{AskRequest, AskResponse, FileList, HealthStatus, RemoteFileEntry, UploadPart},
};

/// Backend address used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Client for the document assistant backend
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Create a client for `base_url` with default HTTP settings
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client that gives up connecting after `timeout`.
    ///
    /// Only the connect phase is bounded; query streams stay open as long
    /// as the server keeps them open.
    pub fn with_connect_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().connect_timeout(timeout).build()?;
        Self::with_client(client, base_url)
    }

    /// Create a client from an existing reqwest client
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Result<Self> {
        let base_url = normalize_base_url(&base_url.into())?;
        Ok(Self { client, base_url })
    }

    /// The base URL requests are sent to, without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL of the query stream for `query`
    pub fn stream_url(&self, query: &str) -> String {
        format!(
            "{}/stream?query={}",
            self.base_url,
            urlencoding::encode(query)
        )
    }

    /// URL addressing one document
    pub fn document_url(&self, id: &str) -> String {
        format!("{}/documents/{}", self.base_url, urlencoding::encode(id))
    }

    /// Check that the backend is up
    pub async fn health(&self) -> Result<HealthStatus> {
        let response = self.client.get(self.url("/health")).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Ask a question without streaming; returns the whole answer at once
    pub async fn ask(&self, query: &str) -> Result<AskResponse> {
        let response = self
            .client
            .post(self.url("/ask"))
            .json(&AskRequest { query })
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Open the server-sent event stream for a query
    pub fn open_stream(&self, query: &str) -> Result<ChannelStream> {
        let url = self.stream_url(query);
        tracing::debug!("Opening query stream: {}", url);

        let request_builder = self
            .client
            .get(&url)
            .header("accept", "text/event-stream");

        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        Ok(Box::pin(create_stream(event_source)))
    }

    /// Upload files as one multipart request with a `file` part per file
    pub async fn upload_documents(&self, parts: Vec<UploadPart>) -> Result<()> {
        let count = parts.len();
        let mut form = Form::new();
        for part in parts {
            let file = Part::bytes(part.content)
                .file_name(part.filename)
                .mime_str(part.mime)?;
            form = form.part("file", file);
        }

        let response = self
            .client
            .post(self.url("/documents/upload"))
            .multipart(form)
            .send()
            .await?;
        check_status(response).await?;

        tracing::debug!("Uploaded {} file(s)", count);
        Ok(())
    }

    /// Fetch the list of stored documents
    pub async fn list_documents(&self) -> Result<Vec<RemoteFileEntry>> {
        let response = self.client.get(self.url("/documents")).send().await?;
        let response = check_status(response).await?;
        let list: FileList = response.json().await?;
        Ok(list.files)
    }

    /// Delete one stored document
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        let response = self.client.delete(self.document_url(id)).send().await?;
        check_status(response).await?;
        tracing::debug!("Deleted document {}", id);
        Ok(())
    }
}

#[async_trait]
impl QueryTransport for BackendClient {
    async fn open(&self, query: &str) -> Result<ChannelStream> {
        self.open_stream(query)
    }
}

#[async_trait]
impl DocumentStore for BackendClient {
    async fn upload(&self, parts: Vec<UploadPart>) -> Result<()> {
        self.upload_documents(parts).await
    }

    async fn list(&self) -> Result<Vec<RemoteFileEntry>> {
        self.list_documents().await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.delete_document(id).await
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::InvalidConfig("base URL is empty".to_string()));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(Error::InvalidConfig(format!(
            "base URL must start with http:// or https://, got '{}'",
            trimmed
        )));
    }
    Ok(trimmed.to_string())
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::status(status.as_u16(), body))
}

/// Adapt an event source into a channel stream.
///
/// The source is closed on the first error so it never reconnects on its
/// own; exactly one `Terminated` event ends the stream.
fn create_stream(mut event_source: EventSource) -> impl futures::Stream<Item = ChannelEvent> {
    stream! {
        while let Some(event) = event_source.next().await {
            match event {
                Ok(Event::Open) => {
                    tracing::trace!("Query stream open");
                }
                Ok(Event::Message(msg)) => {
                    yield ChannelEvent::Chunk(msg.data);
                }
                Err(reqwest_eventsource::Error::StreamEnded) => {
                    event_source.close();
                    yield ChannelEvent::Terminated(TerminateReason::Completed);
                    return;
                }
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, _)) => {
                    event_source.close();
                    yield ChannelEvent::Terminated(TerminateReason::Failed(format!(
                        "HTTP {}",
                        status
                    )));
                    return;
                }
                Err(e) => {
                    event_source.close();
                    yield ChannelEvent::Terminated(TerminateReason::Failed(e.to_string()));
                    return;
                }
            }
        }

        yield ChannelEvent::Terminated(TerminateReason::Completed);
    }
}
