use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use futures::future::join_all;
use tokio::sync::watch;

/// Submission-ordered identifier of one queued operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpId(u64);

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// Handle to an operation's completion signal.
#[derive(Clone, Debug)]
pub(crate) struct Waiter {
    id: OpId,
    done: watch::Receiver<bool>,
}

impl Waiter {
    fn is_settled(&self) -> bool {
        *self.done.borrow() || self.done.has_changed().is_err()
    }

    /// Resolves once the operation has completed, failed or been dropped.
    async fn settled(mut self) {
        // A closed channel means the operation is gone; treat it as settled.
        let _ = self.done.wait_for(|done| *done).await;
    }
}

/// Held by a running operation; dropping it marks the operation settled.
#[derive(Debug)]
pub(crate) struct Completion {
    id: OpId,
    done: watch::Sender<bool>,
}

impl Completion {
    pub(crate) fn id(&self) -> OpId {
        self.id
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.done.send_replace(true);
    }
}

/// The set of operations that have been submitted but not yet settled.
///
/// New operations capture the pending set at submission time and wait on
/// exactly those, which makes submission order the application order.
#[derive(Debug, Default)]
pub(crate) struct OperationQueue {
    next_id: AtomicU64,
    pending: Mutex<Vec<Waiter>>,
}

impl OperationQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a new operation.
    ///
    /// Returns its completion guard and the operations it must wait for.
    /// Registration and the predecessor snapshot happen under one lock, so
    /// two concurrent submissions can never both miss each other.
    pub(crate) fn enqueue(&self) -> (Completion, Vec<Waiter>) {
        let mut pending = self.pending.lock().expect("queue lock poisoned");
        pending.retain(|w| !w.is_settled());

        let id = OpId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = watch::channel(false);
        let predecessors = pending.clone();
        pending.push(Waiter { id, done: rx });
        (Completion { id, done: tx }, predecessors)
    }

    /// Operations currently pending, optionally only those submitted before
    /// `before`.
    pub(crate) fn waiters(&self, before: Option<OpId>) -> Vec<Waiter> {
        let pending = self.pending.lock().expect("queue lock poisoned");
        pending
            .iter()
            .filter(|w| before.map_or(true, |id| w.id < id))
            .cloned()
            .collect()
    }

    /// Drop settled operations from the pending set.
    pub(crate) fn prune(&self) {
        let mut pending = self.pending.lock().expect("queue lock poisoned");
        pending.retain(|w| !w.is_settled());
    }

    /// Number of operations not yet settled.
    pub(crate) fn len(&self) -> usize {
        let pending = self.pending.lock().expect("queue lock poisoned");
        pending.iter().filter(|w| !w.is_settled()).count()
    }
}

/// Wait until every given operation has settled.
pub(crate) async fn settle_all(waiters: Vec<Waiter>) {
    join_all(waiters.into_iter().map(Waiter::settled)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn ids_follow_submission_order() {
        let queue = OperationQueue::new();
        let (a, _) = queue.enqueue();
        let (b, preds) = queue.enqueue();
        assert!(a.id() < b.id());
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].id, a.id());
    }

    #[test]
    fn settled_operations_are_pruned() {
        let queue = OperationQueue::new();
        let (a, _) = queue.enqueue();
        let (_b, _) = queue.enqueue();
        assert_eq!(queue.len(), 2);
        drop(a);
        queue.prune();
        assert_eq!(queue.len(), 1);
        let (_c, preds) = queue.enqueue();
        assert_eq!(preds.len(), 1);
    }

    #[test]
    fn waiters_before_excludes_later_operations() {
        let queue = OperationQueue::new();
        let (a, _) = queue.enqueue();
        let (b, _) = queue.enqueue();
        let (_c, _) = queue.enqueue();
        let before_b = queue.waiters(Some(b.id()));
        assert_eq!(before_b.len(), 1);
        assert_eq!(before_b[0].id, a.id());
        assert_eq!(queue.waiters(None).len(), 3);
    }

    #[tokio::test]
    async fn settle_waits_for_completion() {
        let queue = OperationQueue::new();
        let (a, _) = queue.enqueue();
        let (_b, preds) = queue.enqueue();

        let waiting = tokio::spawn(settle_all(preds));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(a);
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .expect("settled after completion")
            .unwrap();
    }

    #[tokio::test]
    async fn settle_of_nothing_is_immediate() {
        settle_all(Vec::new()).await;
    }
}
