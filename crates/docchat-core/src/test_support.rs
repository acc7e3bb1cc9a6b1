//! In-memory backend fakes shared by the unit tests

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use docchat_client::{
    ChannelEvent, ChannelStream, DocumentStore, Error as ClientError, QueryTransport,
    RemoteFileEntry, Result as ClientResult, UploadPart,
};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

/// Scripted query transport: each `open` pops the next script.
#[derive(Default)]
pub struct MockTransport {
    scripts: Mutex<VecDeque<Result<Vec<ChannelEvent>, String>>>,
    pub queries: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Next channel delivers `events` and then ends
    pub fn push_events(&self, events: Vec<ChannelEvent>) {
        self.scripts.lock().push_back(Ok(events));
    }

    /// Next `open` fails outright
    pub fn push_open_failure(&self, message: &str) {
        self.scripts.lock().push_back(Err(message.to_string()));
    }

    pub fn open_count(&self) -> usize {
        self.queries.lock().len()
    }
}

#[async_trait]
impl QueryTransport for MockTransport {
    async fn open(&self, query: &str) -> ClientResult<ChannelStream> {
        self.queries.lock().push(query.to_string());
        let script = self.scripts.lock().pop_front();
        match script {
            Some(Ok(events)) => Ok(Box::pin(futures::stream::iter(events))),
            Some(Err(message)) => Err(ClientError::Sse(message)),
            None => Ok(Box::pin(futures::stream::pending())),
        }
    }
}

/// Document store holding files in memory.
pub struct MockStore {
    pub files: Mutex<Vec<RemoteFileEntry>>,
    pub uploads: Mutex<Vec<Vec<UploadPart>>>,
    pub deletes: Mutex<Vec<String>>,
    pub list_calls: AtomicUsize,
    pub fail_uploads: AtomicBool,
    pub fail_deletes: AtomicBool,
    pub fail_lists: AtomicBool,
    gate: Semaphore,
    gated: AtomicBool,
    next_id: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            files: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
            fail_uploads: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            fail_lists: AtomicBool::new(false),
            gate: Semaphore::new(0),
            gated: AtomicBool::new(false),
            next_id: AtomicUsize::new(0),
        })
    }

    pub fn with_files(names: &[&str]) -> Arc<Self> {
        let store = Self::new();
        for name in names {
            store.add_file(name);
        }
        store
    }

    pub fn add_file(&self, name: &str) -> String {
        let id = format!("id-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.files
            .lock()
            .push(RemoteFileEntry::new(name.to_string(), id.clone()));
        id
    }

    /// Hold every upload and delete until `release` is called
    pub fn hold(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.gated.store(false, Ordering::SeqCst);
        self.gate.add_permits(16);
    }

    pub fn list_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().len()
    }

    async fn wait_gate(&self) {
        if self.gated.load(Ordering::SeqCst) {
            let _ = self.gate.acquire().await;
        }
    }
}

#[async_trait]
impl DocumentStore for MockStore {
    async fn upload(&self, parts: Vec<UploadPart>) -> ClientResult<()> {
        self.wait_gate().await;
        if self.fail_uploads.load(Ordering::SeqCst) {
            self.uploads.lock().push(parts);
            return Err(ClientError::status(500, "upload failed"));
        }
        for part in &parts {
            self.add_file(&part.filename);
        }
        self.uploads.lock().push(parts);
        Ok(())
    }

    async fn list(&self) -> ClientResult<Vec<RemoteFileEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(ClientError::status(503, "index unavailable"));
        }
        Ok(self.files.lock().clone())
    }

    async fn delete(&self, id: &str) -> ClientResult<()> {
        self.wait_gate().await;
        self.deletes.lock().push(id.to_string());
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ClientError::status(500, "delete failed"));
        }
        // Unknown ids are accepted, like the real vector store does.
        self.files.lock().retain(|f| f.id != id);
        Ok(())
    }
}
