//! Traits the client side programs against

use async_trait::async_trait;

use crate::{ChannelStream, RemoteFileEntry, Result, UploadPart};

/// Opens server-push channels for queries
#[async_trait]
pub trait QueryTransport: Send + Sync {
    /// Open one streaming channel for `query`.
    ///
    /// Connection problems may surface either as an `Err` here or as a
    /// `Terminated(Failed)` event on the returned stream.
    async fn open(&self, query: &str) -> Result<ChannelStream>;
}

/// Document storage operations
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Upload every part in a single multipart request
    async fn upload(&self, parts: Vec<UploadPart>) -> Result<()>;

    /// Fetch the current document list
    async fn list(&self) -> Result<Vec<RemoteFileEntry>>;

    /// Delete one document by id
    async fn delete(&self, id: &str) -> Result<()>;
}
