//! Client-side view of the documents stored on the backend

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use docchat_client::{DocumentStore, RemoteFileEntry};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    refresh::RefreshToken,
};

#[derive(Default)]
struct Listing {
    files: Vec<RemoteFileEntry>,
    /// Sequence number of the refresh that produced `files`
    applied: u64,
}

/// The remote file list as last fetched, plus the single in-flight delete.
///
/// All operations take `&self`; wrap the view in an `Arc` to drive it from
/// spawned tasks.
pub struct FileRegistryView {
    store: Arc<dyn DocumentStore>,
    refresh: RefreshToken,
    listing: Mutex<Listing>,
    started: AtomicU64,
    visible: AtomicBool,
    seen_token: AtomicU64,
    pending_delete: Mutex<Option<String>>,
}

struct DeleteGuard<'a>(&'a Mutex<Option<String>>);

impl Drop for DeleteGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

impl FileRegistryView {
    pub fn new(store: Arc<dyn DocumentStore>, refresh: RefreshToken) -> Self {
        let seen = refresh.current();
        Self {
            store,
            refresh,
            listing: Mutex::new(Listing::default()),
            started: AtomicU64::new(0),
            visible: AtomicBool::new(false),
            seen_token: AtomicU64::new(seen),
            pending_delete: Mutex::new(None),
        }
    }

    /// Fetch the list from the backend and replace the displayed one.
    ///
    /// When refreshes overlap, the one started last wins regardless of
    /// which response arrives first. Returns the displayed list.
    pub async fn refresh(&self) -> Result<Vec<RemoteFileEntry>> {
        let seq = self.started.fetch_add(1, Ordering::AcqRel) + 1;
        let files = self.store.list().await.inspect_err(|e| {
            tracing::warn!("Failed to list documents: {}", e);
        })?;

        let mut listing = self.listing.lock();
        if seq > listing.applied {
            tracing::debug!("Document list refreshed ({} files)", files.len());
            listing.files = files;
            listing.applied = seq;
        } else {
            tracing::debug!(
                "Dropping stale document list (refresh {} < {})",
                seq,
                listing.applied
            );
        }
        Ok(listing.files.clone())
    }

    /// Make the view visible and fetch the list
    pub async fn show(&self) -> Result<Vec<RemoteFileEntry>> {
        self.visible.store(true, Ordering::Release);
        self.seen_token
            .store(self.refresh.current(), Ordering::Release);
        self.refresh().await
    }

    pub fn hide(&self) {
        self.visible.store(false, Ordering::Release);
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    /// React to a refresh token value.
    ///
    /// Refetches when the view is visible and `token` differs from the last
    /// value seen. Returns whether a refresh happened.
    pub async fn on_refresh_token(&self, token: u64) -> Result<bool> {
        if !self.is_visible() {
            return Ok(false);
        }
        if self.seen_token.load(Ordering::Acquire) == token {
            return Ok(false);
        }
        // Only a successful refetch counts the token as seen
        self.refresh().await?;
        self.seen_token.store(token, Ordering::Release);
        Ok(true)
    }

    /// [`on_refresh_token`](Self::on_refresh_token) with the token's current value
    pub async fn sync(&self) -> Result<bool> {
        self.on_refresh_token(self.refresh.current()).await
    }

    /// Delete one document, then refetch the list.
    ///
    /// Only one delete may be in flight; a second call fails with
    /// [`Error::DeleteInFlight`] without touching the backend. A failed
    /// delete leaves the list as it was and skips the refetch. Once the
    /// backend accepted the delete the call succeeds, even if the refetch
    /// fails; the list then stays as last fetched.
    pub async fn delete_one(&self, id: &str) -> Result<()> {
        {
            let mut slot = self.pending_delete.lock();
            if let Some(current) = slot.as_ref() {
                return Err(Error::DeleteInFlight(current.clone()));
            }
            *slot = Some(id.to_string());
        }
        let _guard = DeleteGuard(&self.pending_delete);

        self.store.delete(id).await.inspect_err(|e| {
            tracing::warn!("Failed to delete document {}: {}", id, e);
        })?;
        tracing::info!("Deleted document {}", id);

        if let Err(e) = self.refresh().await {
            tracing::warn!("Document {} deleted but the list was not refetched: {}", id, e);
        }
        Ok(())
    }

    /// Id of the document currently being deleted
    pub fn pending_delete(&self) -> Option<String> {
        self.pending_delete.lock().clone()
    }

    /// Snapshot of the displayed list
    pub fn files(&self) -> Vec<RemoteFileEntry> {
        self.listing.lock().files.clone()
    }

    /// Refresh on every token bump until `cancel` fires.
    ///
    /// Only bumps observed while the view is visible cause a refetch.
    pub fn follow(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.refresh.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let token = *rx.borrow_and_update();
                        if let Err(e) = self.on_refresh_token(token).await {
                            tracing::warn!("Refresh after upload failed: {}", e);
                        }
                    }
                }
            }
            tracing::debug!("Registry follower stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockStore;
    use async_trait::async_trait;
    use docchat_client::{Result as ClientResult, UploadPart};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::oneshot;

    fn names(files: &[RemoteFileEntry]) -> Vec<&str> {
        files.iter().map(|f| f.filename.as_str()).collect()
    }

    #[tokio::test]
    async fn test_refresh_reflects_server_after_bump() {
        let store = MockStore::with_files(&["a.txt"]);
        let token = RefreshToken::new();
        let view = FileRegistryView::new(store.clone(), token.clone());
        view.show().await.unwrap();
        assert_eq!(names(&view.files()), vec!["a.txt"]);

        store.add_file("b.md");
        token.bump();
        let files = view.refresh().await.unwrap();

        assert_eq!(names(&files), vec!["a.txt", "b.md"]);
        assert_eq!(view.files(), files);
    }

    #[tokio::test]
    async fn test_refresh_never_uses_cache() {
        let store = MockStore::with_files(&["a.txt"]);
        let view = FileRegistryView::new(store.clone(), RefreshToken::new());

        view.refresh().await.unwrap();
        view.refresh().await.unwrap();
        assert_eq!(store.list_count(), 2);
    }

    #[tokio::test]
    async fn test_delete_unknown_id_refreshes_once() {
        let store = MockStore::with_files(&["a.txt"]);
        let view = FileRegistryView::new(store.clone(), RefreshToken::new());

        view.delete_one("no-such-id").await.unwrap();

        assert_eq!(store.list_count(), 1);
        assert_eq!(store.deletes.lock().as_slice(), &["no-such-id".to_string()]);
        assert_eq!(names(&view.files()), vec!["a.txt"]);
        assert!(view.pending_delete().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_row_after_refetch() {
        let store = MockStore::with_files(&["a.txt", "b.md"]);
        let view = FileRegistryView::new(store.clone(), RefreshToken::new());
        view.show().await.unwrap();
        let id = view.files()[0].id.clone();

        view.delete_one(&id).await.unwrap();

        assert_eq!(names(&view.files()), vec!["b.md"]);
        assert_eq!(store.list_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_delete_leaves_list_untouched() {
        let store = MockStore::with_files(&["a.txt", "b.md"]);
        store.fail_deletes.store(true, Ordering::SeqCst);
        let view = FileRegistryView::new(store.clone(), RefreshToken::new());
        view.show().await.unwrap();
        let before = view.files();

        let err = view.delete_one(&before[0].id).await.unwrap_err();

        assert!(matches!(err, Error::Client(_)));
        assert_eq!(view.files(), before);
        assert_eq!(store.list_count(), 1);
        assert!(view.pending_delete().is_none());
    }

    #[tokio::test]
    async fn test_delete_succeeds_when_refetch_fails() {
        let store = MockStore::with_files(&["a.txt"]);
        let view = FileRegistryView::new(store.clone(), RefreshToken::new());
        view.show().await.unwrap();
        let id = view.files()[0].id.clone();

        store.fail_lists.store(true, Ordering::SeqCst);
        view.delete_one(&id).await.unwrap();

        assert!(store.files.lock().is_empty());
        assert_eq!(store.list_count(), 2);
        assert!(view.pending_delete().is_none());

        // The next successful refresh drops the deleted row.
        store.fail_lists.store(false, Ordering::SeqCst);
        assert!(view.refresh().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_delete_while_in_flight_is_rejected() {
        let store = MockStore::with_files(&["a.txt", "b.md"]);
        store.hold();
        let view = Arc::new(FileRegistryView::new(store.clone(), RefreshToken::new()));

        let first = tokio::spawn({
            let view = view.clone();
            async move { view.delete_one("id-1").await }
        });
        while view.pending_delete().is_none() {
            tokio::task::yield_now().await;
        }
        assert_eq!(view.pending_delete().as_deref(), Some("id-1"));

        let err = view.delete_one("id-2").await.unwrap_err();
        assert!(err.is_busy());
        assert!(matches!(err, Error::DeleteInFlight(ref id) if id == "id-1"));

        store.release();
        first.await.unwrap().unwrap();
        assert_eq!(store.deletes.lock().as_slice(), &["id-1".to_string()]);
        assert_eq!(names(&view.files()), vec!["b.md"]);
        assert!(view.pending_delete().is_none());
    }

    #[tokio::test]
    async fn test_token_only_refreshes_while_visible() {
        let store = MockStore::with_files(&["a.txt"]);
        let token = RefreshToken::new();
        let view = FileRegistryView::new(store.clone(), token.clone());

        token.bump();
        assert!(!view.sync().await.unwrap());
        assert_eq!(store.list_count(), 0);

        view.show().await.unwrap();
        assert_eq!(store.list_count(), 1);
        // Already seen when shown.
        assert!(!view.sync().await.unwrap());

        token.bump();
        assert!(view.sync().await.unwrap());
        assert!(!view.sync().await.unwrap());
        assert_eq!(store.list_count(), 2);

        view.hide();
        token.bump();
        assert!(!view.on_refresh_token(token.current()).await.unwrap());
        assert_eq!(store.list_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_token_refresh_is_retried() {
        let store = MockStore::with_files(&["a.txt"]);
        let token = RefreshToken::new();
        let view = FileRegistryView::new(store.clone(), token.clone());
        view.show().await.unwrap();

        store.add_file("b.md");
        token.bump();
        store.fail_lists.store(true, Ordering::SeqCst);
        assert!(view.sync().await.is_err());
        assert_eq!(names(&view.files()), vec!["a.txt"]);

        store.fail_lists.store(false, Ordering::SeqCst);
        assert!(view.sync().await.unwrap());
        assert_eq!(names(&view.files()), vec!["a.txt", "b.md"]);
        assert!(!view.sync().await.unwrap());
    }

    #[tokio::test]
    async fn test_follow_refetches_on_bump() {
        let store = MockStore::with_files(&["a.txt"]);
        let token = RefreshToken::new();
        let view = Arc::new(FileRegistryView::new(store.clone(), token.clone()));
        view.show().await.unwrap();

        let cancel = CancellationToken::new();
        let follower = view.clone().follow(cancel.clone());

        store.add_file("b.md");
        token.bump();
        while view.files().len() < 2 {
            tokio::task::yield_now().await;
        }
        assert_eq!(names(&view.files()), vec!["a.txt", "b.md"]);

        cancel.cancel();
        follower.await.unwrap();
    }

    /// Store whose list responses are released by the test in any order
    #[derive(Default)]
    struct ManualListStore {
        responses: Mutex<VecDeque<oneshot::Receiver<Vec<RemoteFileEntry>>>>,
        started: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for ManualListStore {
        async fn upload(&self, _parts: Vec<UploadPart>) -> ClientResult<()> {
            Ok(())
        }

        async fn list(&self) -> ClientResult<Vec<RemoteFileEntry>> {
            let rx = self.responses.lock().pop_front();
            self.started.fetch_add(1, Ordering::SeqCst);
            match rx {
                Some(rx) => Ok(rx.await.unwrap_or_default()),
                None => Ok(Vec::new()),
            }
        }

        async fn delete(&self, _id: &str) -> ClientResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stale_refresh_does_not_overwrite_newer() {
        let store = Arc::new(ManualListStore::default());
        let (older_tx, older_rx) = oneshot::channel();
        let (newer_tx, newer_rx) = oneshot::channel();
        store.responses.lock().extend([older_rx, newer_rx]);
        let view = Arc::new(FileRegistryView::new(store.clone(), RefreshToken::new()));

        let older = tokio::spawn({
            let view = view.clone();
            async move { view.refresh().await }
        });
        while store.started.load(Ordering::SeqCst) < 1 {
            tokio::task::yield_now().await;
        }
        let newer = tokio::spawn({
            let view = view.clone();
            async move { view.refresh().await }
        });
        while store.started.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        newer_tx
            .send(vec![RemoteFileEntry::new("new.md", "2")])
            .unwrap();
        newer.await.unwrap().unwrap();
        older_tx
            .send(vec![RemoteFileEntry::new("old.txt", "1")])
            .unwrap();
        let shown = older.await.unwrap().unwrap();

        assert_eq!(names(&shown), vec!["new.md"]);
        assert_eq!(names(&view.files()), vec!["new.md"]);
    }
}
