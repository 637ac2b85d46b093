use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use chrono::{DateTime, Local, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use accrue_store::{normalize_key, ObjectStore, StoreError};
use accrue_types::{Acl, Format};

use crate::error::{AppendError, AppendResult};
use crate::options::AppendOptions;
use crate::queue::{settle_all, OpId, OperationQueue};
use crate::state::{AppendContents, Body, Snapshot, SnapshotState};

/// Timestamp prefix written by [`Appender::append_with_date`].
const DATE_PREFIX_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f: ";

struct Inner {
    store: Arc<dyn ObjectStore>,
    key: String,
    format: Format,
    acl: Acl,
    state: Mutex<SnapshotState>,
    queue: OperationQueue,
}

/// Append-style access to one object in a whole-object store.
///
/// Appends are applied to an in-memory snapshot in the order they were
/// issued and persisted with one write per flush. Cloning an `Appender`
/// yields another handle to the same snapshot and queue.
///
/// Appends are executed on the tokio runtime, so [`Appender::append`] must
/// be called from within one.
#[derive(Clone)]
pub struct Appender {
    inner: Arc<Inner>,
}

impl Appender {
    /// Create an appender for `key` that writes with a private ACL. The key is
    /// normalized with [`normalize_key`] once, here.
    pub fn new(store: Arc<dyn ObjectStore>, key: &str, format: Format) -> Self {
        Self::with_acl(store, key, format, Acl::default())
    }

    /// Create an appender for `key` whose writes carry `acl`.
    pub fn with_acl(store: Arc<dyn ObjectStore>, key: &str, format: Format, acl: Acl) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                key: normalize_key(key),
                format,
                acl,
                state: Mutex::new(SnapshotState::default()),
                queue: OperationQueue::new(),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn format(&self) -> Format {
        self.inner.format
    }

    pub fn acl(&self) -> &Acl {
        &self.inner.acl
    }

    /// Whether the in-memory snapshot has unflushed changes.
    pub async fn is_dirty(&self) -> bool {
        self.inner.state.lock().await.is_dirty()
    }

    /// When the current snapshot was read, if one is loaded.
    pub async fn snapshot_time(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().await.snapshot().map(|s| s.read_at)
    }

    /// Number of appends submitted but not yet settled.
    pub fn pending(&self) -> usize {
        self.inner.queue.len()
    }

    /// Queue an append of `value`.
    ///
    /// The operation is registered before this method returns, so appends
    /// issued back-to-back without awaiting are applied in call order. The
    /// returned future resolves once the mutation is applied (and written,
    /// with `auto_flush`). Dropping it does not cancel the append.
    pub fn append(&self, value: impl Into<Value>, options: AppendOptions) -> PendingAppend {
        let value = value.into();
        let (completion, predecessors) = self.inner.queue.enqueue();
        let id = completion.id();
        let inner = Arc::clone(&self.inner);
        debug!(key = %inner.key, %id, waiting_on = predecessors.len(), "append queued");

        let handle = tokio::spawn(async move {
            settle_all(predecessors).await;
            let result = inner.apply(id, value, options).await;
            if let Err(ref e) = result {
                debug!(key = %inner.key, %id, error = %e, "append failed");
            }
            drop(completion);
            result
        });
        PendingAppend { id, handle }
    }

    /// Queue an append of `text` prefixed with the current local time as
    /// `YYYY-MM-DD hh:mm:ss.mmm: `.
    pub fn append_with_date(&self, text: &str, options: AppendOptions) -> PendingAppend {
        let stamp = Local::now().format(DATE_PREFIX_FORMAT);
        self.append(format!("{stamp}{text}"), options)
    }

    /// Wait for every append pending at call time, then write the snapshot
    /// if it has unflushed changes.
    pub async fn flush(&self) -> AppendResult<()> {
        self.inner.flush(None).await
    }

    /// Current contents, including appends not yet flushed. Loads the
    /// object first if no snapshot is held.
    pub async fn get_contents(&self) -> AppendResult<AppendContents> {
        let mut state = self.inner.state.lock().await;
        self.inner.ensure_loaded(&mut state).await?;
        match state.snapshot() {
            Some(snapshot) => Ok(snapshot.body.contents()),
            None => Err(AppendError::NotLoaded {
                key: self.inner.key.clone(),
            }),
        }
    }

    /// Delete the backing object and drop the in-memory snapshot, whether or
    /// not it had unflushed changes.
    pub async fn delete(&self) -> AppendResult<()> {
        let mut state = self.inner.state.lock().await;
        self.inner.store.delete(&self.inner.key).await?;
        state.reset();
        debug!(key = %self.inner.key, "object deleted, snapshot dropped");
        Ok(())
    }
}

impl std::fmt::Debug for Appender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Appender")
            .field("key", &self.inner.key)
            .field("format", &self.inner.format)
            .field("acl", &self.inner.acl)
            .finish()
    }
}

impl Inner {
    /// Body of one queued append, run after all its predecessors settled.
    async fn apply(&self, id: OpId, value: Value, options: AppendOptions) -> AppendResult<()> {
        {
            let mut state = self.state.lock().await;
            self.ensure_loaded(&mut state).await?;
            state.append(&self.key, value, &options.format_args)?;
            debug!(key = %self.key, %id, "append applied");
        }
        if options.auto_flush {
            // Only wait on operations issued before this one; anything issued
            // later is itself waiting on us.
            self.flush(Some(id)).await?;
        }
        Ok(())
    }

    async fn flush(&self, before: Option<OpId>) -> AppendResult<()> {
        settle_all(self.queue.waiters(before)).await;
        self.queue.prune();

        let mut state = self.state.lock().await;
        let Some(body) = state.dirty_body() else {
            debug!(key = %self.key, "flush: nothing to write");
            return Ok(());
        };
        let payload = Bytes::from(body.raw().to_owned());
        let len = payload.len();
        self.store
            .put(&self.key, payload, self.format.content_type(), &self.acl)
            .await?;
        state.mark_clean();
        debug!(key = %self.key, len, "flush: written");
        Ok(())
    }

    /// Fetch the object unless a snapshot is already loaded.
    ///
    /// A missing or access-denied object starts an empty snapshot.
    async fn ensure_loaded(&self, state: &mut SnapshotState) -> AppendResult<()> {
        if state.is_loaded() {
            return Ok(());
        }
        let body = match self.store.get(&self.key).await {
            Ok(object) => Body::parse(self.format, &self.key, object.text())?,
            Err(StoreError::AccessDenied(_)) => {
                warn!(key = %self.key, "access denied reading object; starting empty");
                Body::empty(self.format)
            }
            Err(e) if e.is_absent() => Body::empty(self.format),
            Err(e) => return Err(e.into()),
        };
        debug!(key = %self.key, len = body.raw().len(), "snapshot loaded");
        state.load(Snapshot::new(body));
        Ok(())
    }
}

/// A queued append. Resolves with the append's outcome.
#[derive(Debug)]
pub struct PendingAppend {
    id: OpId,
    handle: JoinHandle<AppendResult<()>>,
}

impl PendingAppend {
    /// Submission-order identifier of this append.
    pub fn id(&self) -> OpId {
        self.id
    }
}

impl Future for PendingAppend {
    type Output = AppendResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(e) => Err(AppendError::Aborted(e.to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accrue_store::InMemoryObjectStore;
    use serde_json::json;

    const KEY: &str = "logs/test.txt";

    fn text_appender() -> (Arc<InMemoryObjectStore>, Appender) {
        let store = Arc::new(InMemoryObjectStore::new());
        let appender = Appender::new(store.clone(), KEY, Format::Text);
        (store, appender)
    }

    async fn text_of(appender: &Appender) -> String {
        let contents = appender.get_contents().await.unwrap();
        contents.as_text().expect("text contents").to_string()
    }

    // -----------------------------------------------------------------------
    // Text format
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn appends_text() {
        let (store, subject) = text_appender();
        subject.append("Test 1", AppendOptions::new()).await.unwrap();
        subject.append("Test 2", AppendOptions::flush()).await.unwrap();

        assert_eq!(text_of(&subject).await, "Test 1\nTest 2\n");
        assert_eq!(store.text(KEY).as_deref(), Some("Test 1\nTest 2\n"));
        assert_eq!(store.content_type(KEY).as_deref(), Some("text/plain"));
        assert_eq!(store.acl(KEY), Some(Acl::Private));
    }

    #[tokio::test]
    async fn appends_with_format_arguments() {
        let (store, subject) = text_appender();
        let options = AppendOptions::flush().with_args([json!("Colin"), json!(5)]);
        subject
            .append("Hi %s, this is a test: %s", options)
            .await
            .unwrap();
        assert_eq!(store.text(KEY).as_deref(), Some("Hi Colin, this is a test: 5\n"));
    }

    #[tokio::test]
    async fn percent_signs_are_kept_without_arguments() {
        let (store, subject) = text_appender();
        subject.append("disk 100%% full", AppendOptions::flush()).await.unwrap();
        subject
            .append("%s at 100%%", AppendOptions::flush().with_args([json!("cpu")]))
            .await
            .unwrap();
        assert_eq!(store.text(KEY).as_deref(), Some("disk 100%% full\ncpu at 100%\n"));
    }

    #[tokio::test]
    async fn appends_with_date_prefix() {
        let (_store, subject) = text_appender();
        subject.append_with_date("Test 1", AppendOptions::new()).await.unwrap();
        subject.append_with_date("Test 2", AppendOptions::flush()).await.unwrap();

        let contents = text_of(&subject).await;
        let lines: Vec<&str> = contents.split('\n').collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "");
        for (line, text) in lines.iter().zip(["Test 1", "Test 2"]) {
            let (stamp, rest) = line.split_at(25);
            assert_eq!(rest, text);
            assert!(
                chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S%.3f: ").is_ok(),
                "bad timestamp prefix {stamp:?}"
            );
            assert_eq!(&stamp[19..20], ".");
        }
    }

    #[tokio::test]
    async fn allows_back_to_back_appends() {
        let (_store, subject) = text_appender();
        let _first = subject.append("Test 1", AppendOptions::new());
        subject.append("Test 2", AppendOptions::flush()).await.unwrap();
        assert_eq!(text_of(&subject).await, "Test 1\nTest 2\n");
    }

    #[tokio::test]
    async fn many_unawaited_appends_keep_submission_order() {
        let (store, subject) = text_appender();
        let handles: Vec<PendingAppend> = (0..50)
            .map(|i| subject.append(format!("line {i}"), AppendOptions::new()))
            .collect();
        subject.flush().await.unwrap();

        let expected: String = (0..50).map(|i| format!("line {i}\n")).collect();
        assert_eq!(store.text(KEY), Some(expected));
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(subject.pending(), 0);
    }

    #[tokio::test]
    async fn auto_flush_followed_by_more_appends_does_not_deadlock() {
        let (store, subject) = text_appender();
        let a = subject.append("a", AppendOptions::flush());
        let b = subject.append("b", AppendOptions::flush());
        let c = subject.append("c", AppendOptions::new());
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            a.await.unwrap();
            b.await.unwrap();
            c.await.unwrap();
        })
        .await
        .expect("appends should not deadlock");
        assert_eq!(store.text(KEY).as_deref(), Some("a\nb\n"));
        assert!(subject.is_dirty().await);
    }

    #[tokio::test]
    async fn batches_into_one_read_and_one_write() {
        let (store, subject) = text_appender();
        for i in 0..5 {
            let _ = subject.append(format!("{i}"), AppendOptions::new());
        }
        subject.flush().await.unwrap();
        assert_eq!(store.get_count(), 1);
        assert_eq!(store.put_count(), 1);
    }

    #[tokio::test]
    async fn flush_without_changes_writes_nothing() {
        let (store, subject) = text_appender();
        subject.flush().await.unwrap();
        assert_eq!(store.put_count(), 0);
        assert!(!store.contains(KEY));
    }

    #[tokio::test]
    async fn appends_to_existing_object() {
        let (store, subject) = text_appender();
        store
            .put(KEY, Bytes::from_static(b"existing\n"), "text/plain", &Acl::Private)
            .await
            .unwrap();
        subject.append("new", AppendOptions::flush()).await.unwrap();
        assert_eq!(store.text(KEY).as_deref(), Some("existing\nnew\n"));
    }

    #[tokio::test]
    async fn non_string_values_are_serialized_in_text_mode() {
        let (store, subject) = text_appender();
        subject
            .append(json!({ "event": "login" }), AppendOptions::flush())
            .await
            .unwrap();
        assert_eq!(store.text(KEY).as_deref(), Some("{\"event\":\"login\"}\n"));
    }

    // -----------------------------------------------------------------------
    // JSON format
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn appends_json_values() {
        let store = Arc::new(InMemoryObjectStore::new());
        let subject = Appender::new(store.clone(), "events.json", Format::Json);
        subject.append(json!({ "a": "one" }), AppendOptions::new()).await.unwrap();
        subject.append(json!({ "b": "two" }), AppendOptions::flush()).await.unwrap();

        let contents = subject.get_contents().await.unwrap();
        assert_eq!(
            contents.as_json(),
            Some(&[json!({ "a": "one" }), json!({ "b": "two" })][..])
        );
        assert!(contents.as_text().is_none());
        assert_eq!(store.text("events.json").as_deref(), Some(r#"[{"a":"one"},{"b":"two"}]"#));
        assert_eq!(store.content_type("events.json").as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn malformed_stored_json_fails_append() {
        let store = Arc::new(InMemoryObjectStore::new());
        store
            .put("bad.json", Bytes::from_static(b"{oops"), "application/json", &Acl::Private)
            .await
            .unwrap();
        let subject = Appender::new(store.clone(), "bad.json", Format::Json);
        let err = subject.append(json!(1), AppendOptions::flush()).await.unwrap_err();
        assert!(matches!(err, AppendError::Json(_)));
        assert_eq!(store.text("bad.json").as_deref(), Some("{oops"));
    }

    // -----------------------------------------------------------------------
    // Failure handling
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn access_denied_reads_start_empty() {
        let (store, subject) = text_appender();
        store.deny(KEY);
        subject.append("first", AppendOptions::flush()).await.unwrap();
        assert_eq!(text_of(&subject).await, "first\n");
    }

    #[tokio::test]
    async fn read_failures_propagate() {
        let (store, subject) = text_appender();
        store.break_key(KEY);
        let err = subject.append("x", AppendOptions::new()).await.unwrap_err();
        assert!(matches!(err, AppendError::Store(StoreError::Backend(_))));
        assert!(subject.snapshot_time().await.is_none());
    }

    #[tokio::test]
    async fn failed_write_stays_dirty_and_retries() {
        let (store, subject) = text_appender();
        store.fail_next_puts(1);
        let err = subject.append("kept", AppendOptions::flush()).await.unwrap_err();
        assert!(matches!(err, AppendError::Store(_)));
        assert!(subject.is_dirty().await);
        assert!(!store.contains(KEY));

        subject.flush().await.unwrap();
        assert!(!subject.is_dirty().await);
        assert_eq!(store.text(KEY).as_deref(), Some("kept\n"));
    }

    #[tokio::test]
    async fn failed_append_does_not_block_successors() {
        let (store, subject) = text_appender();
        store.fail_next_puts(1);
        let first = subject.append("one", AppendOptions::flush());
        let second = subject.append("two", AppendOptions::flush());
        assert!(first.await.is_err());
        second.await.unwrap();
        assert_eq!(store.text(KEY).as_deref(), Some("one\ntwo\n"));
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn delete_removes_object_and_snapshot() {
        let (store, subject) = text_appender();
        subject.append("gone", AppendOptions::new()).await.unwrap();
        assert!(subject.is_dirty().await);
        subject.delete().await.unwrap();

        assert!(!store.contains(KEY));
        assert!(subject.snapshot_time().await.is_none());
        assert!(!subject.is_dirty().await);
        assert_eq!(text_of(&subject).await, "");
    }

    #[tokio::test]
    async fn failed_delete_keeps_snapshot() {
        let (store, subject) = text_appender();
        subject.append("stays", AppendOptions::flush()).await.unwrap();
        store.fail_deletes(KEY);

        let err = subject.delete().await.unwrap_err();
        assert!(matches!(err, AppendError::Store(StoreError::Backend(_))));
        assert!(store.contains(KEY));
        assert!(subject.snapshot_time().await.is_some());
        assert_eq!(text_of(&subject).await, "stays\n");
    }

    #[tokio::test]
    async fn get_contents_reflects_unflushed_appends() {
        let (store, subject) = text_appender();
        subject.append("pending", AppendOptions::new()).await.unwrap();
        assert_eq!(text_of(&subject).await, "pending\n");
        assert!(!store.contains(KEY));
        assert!(subject.snapshot_time().await.is_some());
    }

    #[tokio::test]
    async fn key_is_normalized() {
        let store = Arc::new(InMemoryObjectStore::new());
        let subject = Appender::new(store.clone(), "my+log%2Etxt", Format::Text);
        assert_eq!(subject.key(), "my log.txt");
        subject.append("x", AppendOptions::flush()).await.unwrap();
        assert!(store.contains("my log.txt"));
    }

    #[tokio::test]
    async fn custom_acl_is_applied() {
        let store = Arc::new(InMemoryObjectStore::new());
        let subject =
            Appender::with_acl(store.clone(), "public.txt", Format::Text, Acl::PublicRead);
        assert_eq!(subject.acl(), &Acl::PublicRead);
        subject.append("x", AppendOptions::flush()).await.unwrap();
        assert_eq!(store.acl("public.txt"), Some(Acl::PublicRead));
    }
}
