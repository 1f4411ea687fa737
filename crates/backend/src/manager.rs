use scenesync_common::NodeId;
use slotmap::{SlotMap, new_key_type};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

new_key_type! {
    /// Generational handle of a pooled backend instance.
    pub struct BackendHandle;
}

/// Dense arena of backend instances keyed by the id of their frontend peer.
///
/// Storage is pooled in a slot map; the id lookup table makes `NodeId`
/// resolution O(1). Released slots are recycled with a bumped generation, so
/// an old handle never resolves to a newer instance.
#[derive(Debug)]
pub struct NodeManager<T> {
    nodes: SlotMap<BackendHandle, T>,
    lookup: HashMap<NodeId, BackendHandle>,
}

impl<T> Default for NodeManager<T> {
    fn default() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            lookup: HashMap::new(),
        }
    }
}

impl<T: Default> NodeManager<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the instance for `id`, creating a default one if absent.
    pub fn get_or_create(&mut self, id: NodeId) -> (BackendHandle, &mut T) {
        let handle = match self.lookup.get(&id) {
            Some(handle) => *handle,
            None => {
                let handle = self.nodes.insert(T::default());
                self.lookup.insert(id, handle);
                handle
            }
        };
        (handle, &mut self.nodes[handle])
    }
}

impl<T> NodeManager<T> {
    pub fn handle(&self, id: NodeId) -> Option<BackendHandle> {
        self.lookup.get(&id).copied()
    }

    pub fn lookup(&self, id: NodeId) -> Option<&T> {
        self.handle(id).and_then(|h| self.nodes.get(h))
    }

    pub fn lookup_mut(&mut self, id: NodeId) -> Option<&mut T> {
        let handle = self.handle(id)?;
        self.nodes.get_mut(handle)
    }

    /// Resolve a handle. Stale handles resolve to `None`.
    pub fn data(&self, handle: BackendHandle) -> Option<&T> {
        self.nodes.get(handle)
    }

    /// Remove the instance of `id` and hand it back.
    pub fn release(&mut self, id: NodeId) -> Option<T> {
        let handle = self.lookup.remove(&id)?;
        self.nodes.remove(handle)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.lookup.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids of all live instances, sorted for deterministic iteration.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.lookup.keys().copied().collect();
        ids.sort();
        ids
    }

    /// All `(id, instance)` pairs sorted by id.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &T)> {
        self.ids()
            .into_iter()
            .filter_map(move |id| self.lookup(id).map(|node| (id, node)))
    }
}

/// A manager shared between the functor that fills it during a drain pass and
/// the jobs that read it afterwards.
#[derive(Debug)]
pub struct SharedManager<T>(Arc<RwLock<NodeManager<T>>>);

impl<T> Clone for SharedManager<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Default for SharedManager<T> {
    fn default() -> Self {
        Self(Arc::new(RwLock::new(NodeManager::default())))
    }
}

impl<T> SharedManager<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, NodeManager<T>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, NodeManager<T>> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Counter(u32);

    #[test]
    fn get_or_create_is_idempotent() {
        let mut manager = NodeManager::<Counter>::new();
        let id = NodeId::new();
        let (h1, c) = manager.get_or_create(id);
        c.0 = 5;
        let (h2, c) = manager.get_or_create(id);
        assert_eq!(h1, h2);
        assert_eq!(c.0, 5);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn release_invalidates_handle() {
        let mut manager = NodeManager::<Counter>::new();
        let id = NodeId::new();
        let (handle, _) = manager.get_or_create(id);
        assert!(manager.release(id).is_some());
        assert!(manager.data(handle).is_none());
        assert!(manager.lookup(id).is_none());
        assert!(manager.release(id).is_none());

        // The recycled slot gets a fresh generation.
        let other = NodeId::new();
        let (fresh, _) = manager.get_or_create(other);
        assert_ne!(fresh, handle);
        assert!(manager.data(handle).is_none());
    }

    #[test]
    fn iteration_is_sorted_by_id() {
        let mut manager = NodeManager::<Counter>::new();
        let ids: Vec<NodeId> = (0..10).map(|_| NodeId::new()).collect();
        for id in ids.iter().rev() {
            manager.get_or_create(*id);
        }
        let seen: Vec<NodeId> = manager.iter().map(|(id, _)| id).collect();
        assert_eq!(seen, ids);
    }

    #[test]
    fn shared_manager_clones_share_storage() {
        let shared = SharedManager::<Counter>::new();
        let other = shared.clone();
        let id = NodeId::new();
        shared.write().get_or_create(id).1 .0 = 9;
        assert_eq!(other.read().lookup(id), Some(&Counter(9)));
    }
}
