//! Recording arbiter for tests.

use crate::arbiter::{Arbiter, Delivery};
use crate::postman::{NullPostman, Postman};
use scenesync_common::{ChangeKind, SceneChange};
use std::sync::{Arc, Mutex, PoisonError};

/// Arbiter that records every delivery instead of forwarding it.
///
/// Single records are recorded as locked, batch entries as unlocked.
#[derive(Default)]
pub struct ObserverSpy {
    events: Mutex<Vec<Delivery>>,
}

impl ObserverSpy {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Delivery> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn changes(&self) -> Vec<SceneChange> {
        self.events().into_iter().map(|d| d.change).collect()
    }

    pub fn kinds(&self) -> Vec<ChangeKind> {
        self.events().iter().map(|d| d.change.kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Return the recorded deliveries and start over.
    pub fn take(&self) -> Vec<Delivery> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Arbiter for ObserverSpy {
    fn notify(&self, change: SceneChange) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Delivery {
                change,
                locked: true,
            });
    }

    fn notify_batch(&self, changes: Vec<SceneChange>) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(changes.into_iter().map(|change| Delivery {
                change,
                locked: false,
            }));
    }

    fn postman(&self) -> Arc<dyn Postman> {
        Arc::new(NullPostman)
    }
}
