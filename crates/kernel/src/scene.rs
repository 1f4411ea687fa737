use scenesync_arbiter::Arbiter;
use scenesync_common::{NodeId, SceneId};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Id space and delivery target of the subtrees attached to it.
pub struct Scene {
    pub(crate) id: SceneId,
    pub(crate) arbiter: Option<Arc<dyn Arbiter>>,
    pub(crate) nodes: BTreeSet<NodeId>,
}

impl Scene {
    pub(crate) fn new() -> Self {
        Self {
            id: SceneId::new(),
            arbiter: None,
            nodes: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> SceneId {
        self.id
    }

    pub fn arbiter(&self) -> Option<&Arc<dyn Arbiter>> {
        self.arbiter.as_ref()
    }

    /// Every node attached to the scene, sorted by id.
    pub fn nodes(&self) -> &BTreeSet<NodeId> {
        &self.nodes
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("id", &self.id)
            .field("has_arbiter", &self.arbiter.is_some())
            .field("nodes", &self.nodes.len())
            .finish()
    }
}
