use scenesync_backend::{ApplyOutcome, Aspect};
use scenesync_common::{AspectId, ChangeOrigin, SceneChange};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Routes change records between the frontend tree and backend aspects.
pub trait Postman: Send + Sync {
    /// Hand a frontend-visible change to the backend managers that care.
    fn notify_backend(&self, change: &SceneChange);

    /// Whether a change should be mirrored onto the frontend tree.
    ///
    /// Only backend-originated changes travel that way; a frontend change
    /// already lives on the frontend.
    fn should_notify_frontend(&self, change: &SceneChange) -> bool;
}

/// Postman that routes nowhere. Used for headless scenes and test spies.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPostman;

impl Postman for NullPostman {
    fn notify_backend(&self, _change: &SceneChange) {}

    fn should_notify_frontend(&self, _change: &SceneChange) -> bool {
        false
    }
}

/// An aspect shared between the engine (jobs) and the postman (drain pass).
pub type SharedAspect = Arc<Mutex<dyn Aspect>>;

/// Postman delivering records to the registries of registered aspects.
///
/// # Invariants
/// - A backend-originated change is never routed back to the aspect that
///   produced it.
/// - Aspects receive records in registration order.
#[derive(Default)]
pub struct AspectPostman {
    aspects: RwLock<Vec<(AspectId, SharedAspect)>>,
    unrouted: AtomicU64,
    log_unrouted: bool,
}

impl AspectPostman {
    pub fn new(log_unrouted: bool) -> Self {
        Self {
            log_unrouted,
            ..Self::default()
        }
    }

    pub fn add_aspect(&self, id: AspectId, aspect: SharedAspect) {
        self.aspects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, aspect));
    }

    /// Records that no registered aspect had a functor for.
    pub fn unrouted_count(&self) -> u64 {
        self.unrouted.load(Ordering::Relaxed)
    }
}

impl Postman for AspectPostman {
    fn notify_backend(&self, change: &SceneChange) {
        let aspects = self.aspects.read().unwrap_or_else(PoisonError::into_inner);
        let mut routed = false;
        for (id, aspect) in aspects.iter() {
            if change.origin == ChangeOrigin::Backend(*id) {
                tracing::trace!(aspect = %id, subject = %change.subject, "suppressing echo");
                routed = true;
                continue;
            }
            let mut aspect = aspect.lock().unwrap_or_else(PoisonError::into_inner);
            let outcome = aspect.registry_mut().apply(change);
            tracing::trace!(aspect = %id, subject = %change.subject, ?outcome, "routed change");
            routed |= outcome != ApplyOutcome::UnknownType;
        }
        if !routed {
            self.unrouted.fetch_add(1, Ordering::Relaxed);
            if self.log_unrouted {
                tracing::debug!(
                    subject = %change.subject,
                    node_type = %change.subject_type,
                    kind = ?change.kind(),
                    "no aspect handles change"
                );
            }
        }
    }

    fn should_notify_frontend(&self, change: &SceneChange) -> bool {
        change.is_backend_originated()
    }
}
