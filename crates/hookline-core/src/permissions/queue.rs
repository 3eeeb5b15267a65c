//! Serial confirmation queue
//!
//! Requests are presented strictly FIFO and at most one is active at a time.
//! The consumer (a terminal prompt, a UI) drains it with `next_request` and
//! resolves each `PendingConfirmation` exactly once.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{oneshot, Notify};

use super::PermissionDecision;

/// Denial message for cancelled or dropped confirmations
pub const ABORTED_BY_USER: &str = "aborted by user";

/// What a consumer shows the human
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationRequest {
    /// Monotonically increasing per queue
    pub id: u64,
    pub tool_name: String,
    pub tool_use_id: String,
    pub arguments: Value,
    /// Diff or summary of what the tool is about to do
    pub preview: Option<String>,
}

struct QueueItem {
    request: ConfirmationRequest,
    responder: oneshot::Sender<PermissionDecision>,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueueItem>,
    active: Option<u64>,
    next_id: u64,
}

#[derive(Default)]
pub struct ConfirmationQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl ConfirmationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn enqueue(
        &self,
        tool_name: &str,
        tool_use_id: &str,
        arguments: Value,
        preview: Option<String>,
    ) -> (u64, oneshot::Receiver<PermissionDecision>) {
        let (tx, rx) = oneshot::channel();
        let id = {
            let mut state = self.state.lock();
            state.next_id += 1;
            let id = state.next_id;
            state.pending.push_back(QueueItem {
                request: ConfirmationRequest {
                    id,
                    tool_name: tool_name.to_string(),
                    tool_use_id: tool_use_id.to_string(),
                    arguments,
                    preview,
                },
                responder: tx,
            });
            id
        };
        self.notify.notify_waiters();
        (id, rx)
    }

    /// Remove a request that has not been presented yet
    pub(crate) fn withdraw(&self, id: u64) -> bool {
        let removed = {
            let mut state = self.state.lock();
            let before = state.pending.len();
            state.pending.retain(|item| item.request.id != id);
            before != state.pending.len()
        };
        if removed {
            self.notify.notify_waiters();
        }
        removed
    }

    /// Present the head of the queue if nothing is active
    pub fn try_next_request(self: &Arc<Self>) -> Option<PendingConfirmation> {
        let mut state = self.state.lock();
        if state.active.is_some() {
            return None;
        }
        while let Some(item) = state.pending.pop_front() {
            // Requester already gone (aborted between enqueue and now)
            if item.responder.is_closed() {
                continue;
            }
            state.active = Some(item.request.id);
            return Some(PendingConfirmation {
                queue: Arc::clone(self),
                request: item.request,
                responder: Some(item.responder),
            });
        }
        None
    }

    /// Wait until nothing is active and a request is queued, then present it
    pub async fn next_request(self: &Arc<Self>) -> PendingConfirmation {
        loop {
            // Registered before checking so a concurrent enqueue is not missed
            let notified = self.notify.notified();
            if let Some(pending) = self.try_next_request() {
                return pending;
            }
            notified.await;
        }
    }

    /// Requests waiting to be presented
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn has_active(&self) -> bool {
        self.state.lock().active.is_some()
    }

    /// Clear `id` if it is the active request; later drops of it are no-ops
    pub(crate) fn finish(&self, id: u64) {
        {
            let mut state = self.state.lock();
            if state.active == Some(id) {
                state.active = None;
            }
        }
        self.notify.notify_waiters();
    }
}

/// The active confirmation; resolve it once with `allow`, `deny` or `cancel`
///
/// Dropping it unresolved counts as `cancel`.
pub struct PendingConfirmation {
    queue: Arc<ConfirmationQueue>,
    request: ConfirmationRequest,
    responder: Option<oneshot::Sender<PermissionDecision>>,
}

impl PendingConfirmation {
    pub fn request(&self) -> &ConfirmationRequest {
        &self.request
    }

    pub fn tool_name(&self) -> &str {
        &self.request.tool_name
    }

    pub fn allow(self) {
        self.resolve(PermissionDecision::allow());
    }

    pub fn deny(self, message: impl Into<String>) {
        self.resolve(PermissionDecision::deny(message));
    }

    pub fn cancel(self) {
        self.resolve(PermissionDecision::deny(ABORTED_BY_USER));
    }

    /// Whether the requester stopped waiting (tool call aborted)
    pub fn is_withdrawn(&self) -> bool {
        self.responder.as_ref().map_or(true, |tx| tx.is_closed())
    }

    /// Resolves once the requester stops waiting
    pub async fn withdrawn(&mut self) {
        match self.responder.as_mut() {
            Some(tx) => tx.closed().await,
            None => std::future::pending::<()>().await,
        }
    }

    fn resolve(mut self, decision: PermissionDecision) {
        if let Some(tx) = self.responder.take() {
            let _ = tx.send(decision);
        }
    }
}

impl Drop for PendingConfirmation {
    fn drop(&mut self) {
        if let Some(tx) = self.responder.take() {
            let _ = tx.send(PermissionDecision::deny(ABORTED_BY_USER));
        }
        self.queue.finish(self.request.id);
    }
}

impl std::fmt::Debug for PendingConfirmation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingConfirmation")
            .field("request", &self.request)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn queue() -> Arc<ConfirmationQueue> {
        Arc::new(ConfirmationQueue::new())
    }

    #[tokio::test]
    async fn presents_in_fifo_order_one_at_a_time() {
        let q = queue();
        let (_, rx1) = q.enqueue("Write", "t1", json!({}), None);
        let (_, rx2) = q.enqueue("Bash", "t2", json!({}), None);

        let first = q.next_request().await;
        assert_eq!(first.tool_name(), "Write");
        assert!(q.try_next_request().is_none());
        assert!(q.has_active());

        first.allow();
        assert!(rx1.await.unwrap().is_allowed());

        let second = q.next_request().await;
        assert_eq!(second.tool_name(), "Bash");
        second.deny("not now");
        assert_eq!(rx2.await.unwrap().message.as_deref(), Some("not now"));
        assert!(!q.has_active());
    }

    #[tokio::test]
    async fn cancel_only_affects_its_item() {
        let q = queue();
        let (_, rx1) = q.enqueue("Write", "t1", json!({}), None);
        let (_, rx2) = q.enqueue("Edit", "t2", json!({}), None);

        q.next_request().await.cancel();
        let decision = rx1.await.unwrap();
        assert!(!decision.is_allowed());
        assert_eq!(decision.message.as_deref(), Some(ABORTED_BY_USER));

        q.next_request().await.allow();
        assert!(rx2.await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn dropping_presented_item_is_cancel() {
        let q = queue();
        let (_, rx) = q.enqueue("Delete", "t1", json!({}), None);
        drop(q.next_request().await);
        assert_eq!(rx.await.unwrap().message.as_deref(), Some(ABORTED_BY_USER));
        assert!(!q.has_active());
    }

    #[tokio::test]
    async fn withdrawn_items_are_never_presented() {
        let q = queue();
        let (id, _rx1) = q.enqueue("Write", "t1", json!({}), None);
        let (_, _rx2) = q.enqueue("Bash", "t2", json!({}), None);
        assert!(q.withdraw(id));
        assert_eq!(q.pending_len(), 1);
        assert_eq!(q.next_request().await.tool_name(), "Bash");
    }

    #[tokio::test]
    async fn closed_requesters_are_skipped() {
        let q = queue();
        let (_, rx1) = q.enqueue("Write", "t1", json!({}), None);
        let (_, _rx2) = q.enqueue("Bash", "t2", json!({}), None);
        drop(rx1);
        assert_eq!(q.next_request().await.tool_name(), "Bash");
    }

    #[tokio::test]
    async fn consumer_waits_for_enqueue() {
        let q = queue();
        let consumer = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.next_request().await.request().tool_use_id.clone() })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let (_, _rx) = q.enqueue("Write", "late", json!({}), None);
        assert_eq!(consumer.await.unwrap(), "late");
    }

    #[tokio::test]
    async fn presented_item_notices_withdrawal() {
        let q = queue();
        let (_, rx) = q.enqueue("Write", "t1", json!({}), None);
        let mut pending = q.next_request().await;
        assert!(!pending.is_withdrawn());
        drop(rx);
        tokio::time::timeout(Duration::from_secs(1), pending.withdrawn())
            .await
            .unwrap();
        assert!(pending.is_withdrawn());
    }
}
