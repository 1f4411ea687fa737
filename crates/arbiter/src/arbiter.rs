use crate::postman::Postman;
use scenesync_common::SceneChange;
use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

thread_local! {
    static DELIVERING: Cell<bool> = const { Cell::new(false) };
}

/// Per-scene delivery target for frontend change records.
pub trait Arbiter: Send + Sync {
    /// Deliver one record. The delivery is locked: nothing else is observed
    /// by the backend between its enqueue and its application.
    fn notify(&self, change: SceneChange);

    /// Deliver the records of one logical operation, in order.
    fn notify_batch(&self, changes: Vec<SceneChange>);

    /// The postman this arbiter forwards to.
    fn postman(&self) -> Arc<dyn Postman>;
}

/// A queued record and whether it was delivered under the single-record lock.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub change: SceneChange,
    pub locked: bool,
}

/// Counters of a [`ChangeArbiter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArbiterStats {
    pub received: u64,
    pub delivered: u64,
    pub mirrored: u64,
    pub suppressed: u64,
}

/// Queue-backed arbiter.
///
/// The frontend thread enqueues under the pending lock; a drain pass
/// ([`ChangeArbiter::sync_changes`]) takes the whole queue under the same
/// lock and hands the records to the postman. Only one drain pass runs at a
/// time.
///
/// # Invariants
/// - Records reach the postman in enqueue order, batches kept contiguous.
/// - Records are never altered between enqueue and delivery.
/// - Enqueueing from inside a delivery on the same thread panics: a backend
///   node must not mutate the frontend while it is being synchronized.
pub struct ChangeArbiter {
    postman: Arc<dyn Postman>,
    pending: Mutex<VecDeque<Delivery>>,
    drain: Mutex<()>,
    frontend: Mutex<Vec<SceneChange>>,
    received: AtomicU64,
    delivered: AtomicU64,
    mirrored: AtomicU64,
    suppressed: AtomicU64,
}

impl ChangeArbiter {
    pub fn new(postman: Arc<dyn Postman>) -> Self {
        Self {
            postman,
            pending: Mutex::new(VecDeque::new()),
            drain: Mutex::new(()),
            frontend: Mutex::new(Vec::new()),
            received: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            mirrored: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
        }
    }

    /// Number of records waiting for the next drain pass.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Deliver all pending records to the postman. Returns how many were
    /// delivered.
    pub fn sync_changes(&self) -> usize {
        assert_not_delivering();
        let _drainer = self.drain.lock().unwrap_or_else(PoisonError::into_inner);
        let batch: Vec<Delivery> = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            pending.drain(..).collect()
        };
        if batch.is_empty() {
            return 0;
        }

        let _span = tracing::info_span!("sync_changes", records = batch.len()).entered();
        let _delivering = DeliveryGuard::enter();
        for delivery in &batch {
            tracing::trace!(
                subject = %delivery.change.subject,
                kind = ?delivery.change.kind(),
                locked = delivery.locked,
                "delivering"
            );
            self.postman.notify_backend(&delivery.change);
        }
        self.delivered
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
        batch.len()
    }

    /// Queue backend-originated changes for the frontend. Changes the postman
    /// refuses are dropped. Returns how many were queued.
    pub fn post_to_frontend(&self, changes: Vec<SceneChange>) -> usize {
        let mut queued = 0;
        let mut frontend = self.frontend.lock().unwrap_or_else(PoisonError::into_inner);
        for change in changes {
            if self.postman.should_notify_frontend(&change) {
                frontend.push(change);
                queued += 1;
            } else {
                self.suppressed.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(subject = %change.subject, "change not mirrored to frontend");
            }
        }
        self.mirrored.fetch_add(queued as u64, Ordering::Relaxed);
        queued
    }

    /// Take the changes waiting to be applied to the frontend tree.
    pub fn take_frontend_changes(&self) -> Vec<SceneChange> {
        std::mem::take(&mut *self.frontend.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn stats(&self) -> ArbiterStats {
        ArbiterStats {
            received: self.received.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            mirrored: self.mirrored.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
        }
    }

    fn enqueue(&self, deliveries: impl IntoIterator<Item = Delivery>) {
        assert_not_delivering();
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let before = pending.len();
        pending.extend(deliveries);
        self.received
            .fetch_add((pending.len() - before) as u64, Ordering::Relaxed);
    }
}

impl Arbiter for ChangeArbiter {
    fn notify(&self, change: SceneChange) {
        self.enqueue([Delivery {
            change,
            locked: true,
        }]);
    }

    fn notify_batch(&self, changes: Vec<SceneChange>) {
        self.enqueue(changes.into_iter().map(|change| Delivery {
            change,
            locked: false,
        }));
    }

    fn postman(&self) -> Arc<dyn Postman> {
        Arc::clone(&self.postman)
    }
}

fn assert_not_delivering() {
    assert!(
        !DELIVERING.with(Cell::get),
        "frontend change issued from inside a backend delivery pass"
    );
}

struct DeliveryGuard;

impl DeliveryGuard {
    fn enter() -> Self {
        DELIVERING.with(|d| d.set(true));
        Self
    }
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        DELIVERING.with(|d| d.set(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postman::NullPostman;
    use scenesync_common::{AspectId, ChangeOrigin, NodeId, NodeType};
    use std::sync::OnceLock;

    const NODE: NodeType = NodeType::from_static("Node");

    #[derive(Default)]
    struct RecordingPostman {
        seen: Mutex<Vec<SceneChange>>,
    }

    impl Postman for RecordingPostman {
        fn notify_backend(&self, change: &SceneChange) {
            self.seen.lock().unwrap().push(change.clone());
        }

        fn should_notify_frontend(&self, change: &SceneChange) -> bool {
            change.is_backend_originated()
        }
    }

    fn update(value: i64) -> SceneChange {
        SceneChange::property_updated(NodeId::new(), NODE, "value", value.into())
    }

    #[test]
    fn drain_preserves_issue_order_across_batches() {
        let postman = Arc::new(RecordingPostman::default());
        let arbiter = ChangeArbiter::new(postman.clone());
        arbiter.notify(update(0));
        arbiter.notify_batch((1..4).map(update).collect());
        arbiter.notify(update(4));
        assert_eq!(arbiter.pending_len(), 5);

        assert_eq!(arbiter.sync_changes(), 5);
        assert_eq!(arbiter.pending_len(), 0);
        let values: Vec<i64> = postman
            .seen
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match &c.record {
                scenesync_common::ChangeRecord::PropertyUpdated { value, .. } => value.as_int(),
                _ => None,
            })
            .collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
        assert_eq!(arbiter.stats().received, 5);
        assert_eq!(arbiter.stats().delivered, 5);
        assert_eq!(arbiter.sync_changes(), 0);
    }

    #[test]
    fn frontend_channel_filters_through_postman() {
        let arbiter = ChangeArbiter::new(Arc::new(RecordingPostman::default()));
        let frontend = update(1);
        let backend = update(2).with_origin(ChangeOrigin::Backend(AspectId(0)));
        assert_eq!(arbiter.post_to_frontend(vec![frontend, backend.clone()]), 1);
        assert_eq!(arbiter.take_frontend_changes(), vec![backend]);
        assert!(arbiter.take_frontend_changes().is_empty());
        assert_eq!(arbiter.stats().suppressed, 1);
    }

    struct ReentrantPostman {
        arbiter: OnceLock<Arc<ChangeArbiter>>,
    }

    impl Postman for ReentrantPostman {
        fn notify_backend(&self, change: &SceneChange) {
            if let Some(arbiter) = self.arbiter.get() {
                arbiter.notify(change.clone());
            }
        }

        fn should_notify_frontend(&self, _change: &SceneChange) -> bool {
            false
        }
    }

    #[test]
    #[should_panic(expected = "inside a backend delivery pass")]
    fn reentrant_notify_during_delivery_panics() {
        let postman = Arc::new(ReentrantPostman {
            arbiter: OnceLock::new(),
        });
        let arbiter = Arc::new(ChangeArbiter::new(postman.clone()));
        let _ = postman.arbiter.set(Arc::clone(&arbiter));
        arbiter.notify(update(1));
        arbiter.sync_changes();
    }

    #[test]
    fn delivery_flag_resets_after_drain() {
        let arbiter = ChangeArbiter::new(Arc::new(NullPostman));
        arbiter.notify(update(1));
        arbiter.sync_changes();
        // Not delivering any more, so enqueueing is allowed again.
        arbiter.notify(update(2));
        assert_eq!(arbiter.pending_len(), 1);
    }
}
