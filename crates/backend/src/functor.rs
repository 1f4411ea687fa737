use crate::manager::{BackendHandle, SharedManager};
use crate::node::BackendNode;
use scenesync_common::{NodeCreatedData, NodeId, SceneChange};
use std::fmt;

/// Construction, lookup and teardown strategy for one backend node type.
///
/// A functor owns no instances. It only drives the manager it was built
/// with, so several functors (or jobs) can observe the same arena.
pub trait BackendNodeFunctor: Send + Sync {
    /// Create the instance for `id`, or return the existing one, and load the
    /// creation snapshot into it.
    fn create(&self, id: NodeId, data: &NodeCreatedData) -> BackendHandle;

    fn get(&self, id: NodeId) -> Option<BackendHandle>;

    /// Returns false when there was nothing to destroy.
    fn destroy(&self, id: NodeId) -> bool;

    /// Forward a change to the subject's instance. Returns false when the
    /// subject has no instance.
    fn notify(&self, change: &SceneChange) -> bool;

    /// Number of live instances.
    fn instance_count(&self) -> usize;
}

/// Functor over a [`SharedManager`] of `T`.
pub struct NodeFunctor<T> {
    manager: SharedManager<T>,
}

impl<T: BackendNode> NodeFunctor<T> {
    pub fn new(manager: SharedManager<T>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &SharedManager<T> {
        &self.manager
    }
}

impl<T> fmt::Debug for NodeFunctor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeFunctor")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: BackendNode> BackendNodeFunctor for NodeFunctor<T> {
    fn create(&self, id: NodeId, data: &NodeCreatedData) -> BackendHandle {
        let mut manager = self.manager.write();
        let (handle, node) = manager.get_or_create(id);
        node.initialize_from_peer(id, data);
        handle
    }

    fn get(&self, id: NodeId) -> Option<BackendHandle> {
        self.manager.read().handle(id)
    }

    fn destroy(&self, id: NodeId) -> bool {
        let mut manager = self.manager.write();
        match manager.lookup_mut(id) {
            Some(node) => {
                node.cleanup();
                manager.release(id);
                true
            }
            None => false,
        }
    }

    fn notify(&self, change: &SceneChange) -> bool {
        match self.manager.write().lookup_mut(change.subject) {
            Some(node) => {
                node.scene_change_event(change);
                true
            }
            None => false,
        }
    }

    fn instance_count(&self) -> usize {
        self.manager.read().len()
    }
}
