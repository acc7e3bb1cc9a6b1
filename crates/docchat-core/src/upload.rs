//! Pending upload batch and its submission

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use docchat_client::{DocumentStore, UploadPart};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::{
    error::{Error, Result},
    refresh::RefreshToken,
};

/// Most files a single batch may hold
pub const MAX_BATCH_FILES: usize = 20;

/// How long an upload status message stays visible
pub const STATUS_TTL: Duration = Duration::from_secs(2);

/// Document types the backend accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    PlainText,
    Markdown,
}

impl MediaType {
    /// Classify a file by its extension, ignoring case
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        if ext.eq_ignore_ascii_case("txt") {
            Some(MediaType::PlainText)
        } else if ext.eq_ignore_ascii_case("md") {
            Some(MediaType::Markdown)
        } else {
            None
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::PlainText => "text/plain",
            MediaType::Markdown => "text/markdown",
        }
    }
}

/// A file offered for selection, not yet validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub name: String,
    pub content: Vec<u8>,
}

impl FileCandidate {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Read a candidate from disk; the name is the path's file name
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, content })
    }
}

/// A validated member of the pending batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    name: String,
    content: Vec<u8>,
    media_type: MediaType,
}

impl SelectedFile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }

    fn to_part(&self) -> UploadPart {
        UploadPart {
            filename: self.name.clone(),
            content: self.content.clone(),
            mime: self.media_type.mime(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    /// Not a `.txt` or `.md` file
    UnsupportedType,
    /// Accepted type, but the batch was already full
    OverLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub name: String,
    pub reason: ExclusionReason,
}

/// What `select` did with the offered candidates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionReport {
    /// Number of files now pending from this selection
    pub accepted: usize,
    /// Candidates left out, in offer order
    pub excluded: Vec<Exclusion>,
    /// The selection was dropped because a submission is in flight
    pub ignored: bool,
}

impl SelectionReport {
    /// Whether the pending batch was replaced
    pub fn replaced_batch(&self) -> bool {
        !self.ignored && self.accepted > 0
    }
}

/// Result of the last finished submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Succeeded { files: usize },
    Failed { message: String },
}

impl UploadStatus {
    /// Short text for the status line
    pub fn message(&self) -> &'static str {
        match self {
            UploadStatus::Succeeded { .. } => "Upload successful",
            UploadStatus::Failed { .. } => "Upload failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UploadStatus::Succeeded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing was pending; no request was sent
    Empty,
    /// The batch was stored; `token` is the refresh counter after the bump
    Uploaded { files: usize, token: u64 },
}

struct Inner {
    store: Arc<dyn DocumentStore>,
    batch: Mutex<Vec<SelectedFile>>,
    status: Mutex<Option<(UploadStatus, Instant)>>,
    submitting: AtomicBool,
    refresh: RefreshToken,
}

/// Holds the pending batch and submits it as one upload.
///
/// Cloning yields another handle to the same batch, so a submission can run
/// on a spawned task while other handles keep reading state.
#[derive(Clone)]
pub struct UploadBatchManager {
    inner: Arc<Inner>,
}

/// Clears the in-flight flag however the submission ends
struct SubmitGuard<'a>(&'a AtomicBool);

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl UploadBatchManager {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_refresh_token(store, RefreshToken::new())
    }

    /// Create a manager that bumps an existing token
    pub fn with_refresh_token(store: Arc<dyn DocumentStore>, refresh: RefreshToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                batch: Mutex::new(Vec::new()),
                status: Mutex::new(None),
                submitting: AtomicBool::new(false),
                refresh,
            }),
        }
    }

    /// Replace the pending batch with the acceptable candidates.
    ///
    /// Only `.txt` and `.md` files are kept, at most [`MAX_BATCH_FILES`] of
    /// them in offer order. When nothing is acceptable the batch is left
    /// as it was. Any status message is cleared.
    pub fn select(&self, candidates: impl IntoIterator<Item = FileCandidate>) -> SelectionReport {
        if self.is_submitting() {
            tracing::debug!("Ignoring selection while an upload is in flight");
            return SelectionReport {
                ignored: true,
                ..Default::default()
            };
        }

        let mut accepted = Vec::new();
        let mut excluded = Vec::new();
        for candidate in candidates {
            let Some(media_type) = MediaType::from_file_name(&candidate.name) else {
                excluded.push(Exclusion {
                    name: candidate.name,
                    reason: ExclusionReason::UnsupportedType,
                });
                continue;
            };
            if accepted.len() >= MAX_BATCH_FILES {
                excluded.push(Exclusion {
                    name: candidate.name,
                    reason: ExclusionReason::OverLimit,
                });
                continue;
            }
            accepted.push(SelectedFile {
                name: candidate.name,
                content: candidate.content,
                media_type,
            });
        }

        *self.inner.status.lock() = None;

        let count = accepted.len();
        if count > 0 {
            *self.inner.batch.lock() = accepted;
        }
        if !excluded.is_empty() {
            tracing::debug!("Excluded {} file(s) from selection", excluded.len());
        }
        tracing::debug!("Selected {} file(s)", count);

        SelectionReport {
            accepted: count,
            excluded,
            ignored: false,
        }
    }

    /// Remove the pending file at `index`
    pub fn remove(&self, index: usize) -> Option<SelectedFile> {
        let mut batch = self.inner.batch.lock();
        (index < batch.len()).then(|| batch.remove(index))
    }

    pub fn clear(&self) {
        self.inner.batch.lock().clear();
    }

    /// Upload every pending file in one request.
    ///
    /// On success the batch is emptied and the refresh token bumped once. On
    /// failure the batch stays as it was and the error is returned. Either
    /// way a status message is set for [`STATUS_TTL`].
    pub async fn submit(&self) -> Result<SubmitOutcome> {
        if self
            .inner
            .submitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::SubmissionInFlight);
        }
        let _guard = SubmitGuard(&self.inner.submitting);

        let parts: Vec<UploadPart> = self.inner.batch.lock().iter().map(|f| f.to_part()).collect();
        if parts.is_empty() {
            return Ok(SubmitOutcome::Empty);
        }
        // The previous attempt's outcome no longer applies
        *self.inner.status.lock() = None;
        let files = parts.len();
        tracing::info!("Uploading {} file(s)", files);

        match self.inner.store.upload(parts).await {
            Ok(()) => {
                self.inner.batch.lock().clear();
                let token = self.inner.refresh.bump();
                self.set_status(UploadStatus::Succeeded { files });
                tracing::info!("Upload of {} file(s) succeeded (refresh {})", files, token);
                Ok(SubmitOutcome::Uploaded { files, token })
            }
            Err(e) => {
                tracing::warn!("Upload failed: {}", e);
                self.set_status(UploadStatus::Failed {
                    message: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    fn set_status(&self, status: UploadStatus) {
        *self.inner.status.lock() = Some((status, Instant::now()));
    }

    /// The last submission's status, until it expires
    pub fn status(&self) -> Option<UploadStatus> {
        let mut slot = self.inner.status.lock();
        if matches!(slot.as_ref(), Some((_, set_at)) if set_at.elapsed() >= STATUS_TTL) {
            *slot = None;
        }
        slot.as_ref().map(|(status, _)| status.clone())
    }

    /// Snapshot of the pending batch
    pub fn pending(&self) -> Vec<SelectedFile> {
        self.inner.batch.lock().clone()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.batch.lock().len()
    }

    pub fn is_submitting(&self) -> bool {
        self.inner.submitting.load(Ordering::Acquire)
    }

    pub fn refresh_token(&self) -> &RefreshToken {
        &self.inner.refresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FileRegistryView;
    use crate::test_support::MockStore;

    fn candidate(name: &str) -> FileCandidate {
        FileCandidate::new(name, format!("content of {name}"))
    }

    #[test]
    fn test_media_type_from_extension() {
        assert_eq!(MediaType::from_file_name("a.txt"), Some(MediaType::PlainText));
        assert_eq!(MediaType::from_file_name("B.MD"), Some(MediaType::Markdown));
        assert_eq!(MediaType::from_file_name("notes.Txt"), Some(MediaType::PlainText));
        assert_eq!(MediaType::from_file_name("c.pdf"), None);
        assert_eq!(MediaType::from_file_name("txt"), None);
        assert_eq!(MediaType::from_file_name("archive.md.gz"), None);
    }

    #[test]
    fn test_select_filters_unsupported_types() {
        let manager = UploadBatchManager::new(MockStore::new());
        let report = manager.select(vec![candidate("a.txt"), candidate("c.pdf"), candidate("b.md")]);

        assert_eq!(report.accepted, 2);
        assert_eq!(
            report.excluded,
            vec![Exclusion {
                name: "c.pdf".into(),
                reason: ExclusionReason::UnsupportedType,
            }]
        );
        let names: Vec<_> = manager.pending().iter().map(|f| f.name().to_string()).collect();
        assert_eq!(names, vec!["a.txt", "b.md"]);
        assert_eq!(manager.pending()[1].media_type(), MediaType::Markdown);
    }

    #[test]
    fn test_select_caps_batch_size() {
        let manager = UploadBatchManager::new(MockStore::new());
        let mut candidates: Vec<_> = (0..25).map(|i| candidate(&format!("f{i}.txt"))).collect();
        candidates.insert(3, candidate("skip.png"));

        let report = manager.select(candidates);

        assert_eq!(report.accepted, MAX_BATCH_FILES);
        assert_eq!(manager.pending_len(), MAX_BATCH_FILES);
        assert_eq!(manager.pending()[19].name(), "f19.txt");
        let over: Vec<_> = report
            .excluded
            .iter()
            .filter(|e| e.reason == ExclusionReason::OverLimit)
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(over, vec!["f20.txt", "f21.txt", "f22.txt", "f23.txt", "f24.txt"]);
    }

    #[test]
    fn test_select_replaces_batch_and_keeps_duplicates() {
        let manager = UploadBatchManager::new(MockStore::new());
        manager.select(vec![candidate("old.txt")]);
        manager.select(vec![candidate("a.txt"), candidate("a.txt")]);

        let names: Vec<_> = manager.pending().iter().map(|f| f.name().to_string()).collect();
        assert_eq!(names, vec!["a.txt", "a.txt"]);
    }

    #[test]
    fn test_select_with_nothing_acceptable_keeps_batch() {
        let manager = UploadBatchManager::new(MockStore::new());
        manager.select(vec![candidate("keep.md")]);

        let report = manager.select(vec![candidate("x.docx")]);

        assert!(!report.replaced_batch());
        assert_eq!(manager.pending().len(), 1);
        assert_eq!(manager.pending()[0].name(), "keep.md");
    }

    #[test]
    fn test_remove_takes_exactly_one_entry() {
        let manager = UploadBatchManager::new(MockStore::new());
        manager.select(vec![candidate("a.txt"), candidate("b.txt"), candidate("c.txt")]);

        let removed = manager.remove(1).expect("entry at index 1");
        assert_eq!(removed.name(), "b.txt");
        assert!(manager.remove(5).is_none());

        let names: Vec<_> = manager.pending().iter().map(|f| f.name().to_string()).collect();
        assert_eq!(names, vec!["a.txt", "c.txt"]);
    }

    #[tokio::test]
    async fn test_select_clear_then_submit_makes_no_request() {
        let store = MockStore::new();
        let manager = UploadBatchManager::new(store.clone());
        manager.select(vec![candidate("a.txt")]);
        manager.clear();
        manager.clear();

        assert!(manager.pending().is_empty());
        assert_eq!(manager.submit().await.unwrap(), SubmitOutcome::Empty);
        assert_eq!(store.upload_count(), 0);
        assert_eq!(manager.refresh_token().current(), 0);
        assert!(manager.status().is_none());
    }

    #[tokio::test]
    async fn test_successful_submit_empties_batch_and_bumps_token() {
        let store = MockStore::new();
        let manager = UploadBatchManager::new(store.clone());
        manager.select(vec![candidate("a.txt"), candidate("b.md")]);

        let outcome = manager.submit().await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Uploaded { files: 2, token: 1 });
        assert!(manager.pending().is_empty());
        assert_eq!(manager.refresh_token().current(), 1);
        assert_eq!(manager.status(), Some(UploadStatus::Succeeded { files: 2 }));

        let uploads = store.uploads.lock().clone();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0][0].mime, "text/plain");
        assert_eq!(uploads[0][1].mime, "text/markdown");
        assert_eq!(uploads[0][1].content, b"content of b.md");
    }

    #[tokio::test]
    async fn test_failed_submit_preserves_batch_and_token() {
        let store = MockStore::new();
        store.fail_uploads.store(true, Ordering::SeqCst);
        let manager = UploadBatchManager::new(store.clone());
        manager.select(vec![candidate("a.txt"), candidate("b.md")]);
        let before = manager.pending();

        let err = manager.submit().await.unwrap_err();

        assert!(matches!(err, Error::Client(_)));
        assert_eq!(manager.pending(), before);
        assert_eq!(manager.refresh_token().current(), 0);
        let status = manager.status().expect("failure status");
        assert!(!status.is_success());
        assert_eq!(status.message(), "Upload failed");
        assert!(!manager.is_submitting());
    }

    #[tokio::test]
    async fn test_concurrent_submit_is_rejected() {
        let store = MockStore::new();
        store.hold();
        let manager = UploadBatchManager::new(store.clone());
        manager.select(vec![candidate("a.txt")]);

        let background = manager.clone();
        let first = tokio::spawn(async move { background.submit().await });
        while !manager.is_submitting() {
            tokio::task::yield_now().await;
        }

        assert!(matches!(manager.submit().await, Err(Error::SubmissionInFlight)));
        let report = manager.select(vec![candidate("other.txt")]);
        assert!(report.ignored);

        store.release();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome, SubmitOutcome::Uploaded { files: 1, token: 1 });
        assert_eq!(store.upload_count(), 1);
        assert!(!manager.is_submitting());
    }

    #[tokio::test]
    async fn test_retry_clears_previous_failure_status() {
        let store = MockStore::new();
        store.fail_uploads.store(true, Ordering::SeqCst);
        let manager = UploadBatchManager::new(store.clone());
        manager.select(vec![candidate("a.txt")]);
        manager.submit().await.unwrap_err();
        assert!(manager.status().is_some());

        store.fail_uploads.store(false, Ordering::SeqCst);
        store.hold();
        let background = manager.clone();
        let retry = tokio::spawn(async move { background.submit().await });
        while !manager.is_submitting() {
            tokio::task::yield_now().await;
        }
        assert_eq!(manager.status(), None);

        store.release();
        retry.await.unwrap().unwrap();
        assert_eq!(manager.status(), Some(UploadStatus::Succeeded { files: 1 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_expires_after_ttl() {
        let manager = UploadBatchManager::new(MockStore::new());
        manager.select(vec![candidate("a.txt")]);
        manager.submit().await.unwrap();

        assert_eq!(
            manager.status().map(|s| s.message()),
            Some("Upload successful")
        );

        tokio::time::advance(Duration::from_millis(1900)).await;
        assert!(manager.status().is_some());

        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(manager.status().is_none());
    }

    #[tokio::test]
    async fn test_selection_clears_status() {
        let manager = UploadBatchManager::new(MockStore::new());
        manager.select(vec![candidate("a.txt")]);
        manager.submit().await.unwrap();
        assert!(manager.status().is_some());

        manager.select(vec![candidate("b.txt")]);
        assert!(manager.status().is_none());
    }

    #[tokio::test]
    async fn test_subscribers_see_each_successful_submit() {
        let manager = UploadBatchManager::new(MockStore::new());
        let mut rx = manager.refresh_token().subscribe();

        manager.select(vec![candidate("a.txt")]);
        manager.submit().await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);

        manager.select(vec![candidate("b.txt")]);
        manager.submit().await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 2);
    }

    #[tokio::test]
    async fn test_upload_then_registry_lists_files() {
        let store = MockStore::new();
        let manager = UploadBatchManager::new(store.clone());
        let registry = FileRegistryView::new(store.clone(), manager.refresh_token().clone());
        registry.show().await.unwrap();
        assert!(registry.files().is_empty());

        manager.select(vec![candidate("a.txt"), candidate("b.md")]);
        manager.submit().await.unwrap();

        assert!(manager.pending().is_empty());
        assert_eq!(manager.refresh_token().current(), 1);
        assert!(registry.sync().await.unwrap());
        let names: Vec<_> = registry.files().into_iter().map(|f| f.filename).collect();
        assert_eq!(names, vec!["a.txt", "b.md"]);
    }

    #[tokio::test]
    async fn test_candidate_from_path_uses_file_name() {
        let dir = std::env::temp_dir().join(format!("docchat-upload-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("notes.md");
        tokio::fs::write(&path, b"# notes").await.unwrap();

        let candidate = FileCandidate::from_path(&path).await.unwrap();
        assert_eq!(candidate.name, "notes.md");
        assert_eq!(candidate.content, b"# notes");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
