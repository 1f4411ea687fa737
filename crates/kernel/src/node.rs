use scenesync_common::{NodeId, NodeType, PropertyValue, SceneId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How writes to a property are propagated to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PropertyTrackingMode {
    /// Never sent: not in update records, not in creation snapshots.
    DontTrackValues,
    /// Sent on change; backend write-backs keep only the last value of a batch.
    #[default]
    TrackFinalValues,
    /// Sent on change; backend write-backs apply every intermediate value.
    TrackAllValues,
}

/// Role of a node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NodeKind {
    #[default]
    Node,
    /// Aggregates components.
    Entity,
    /// Attachable to entities.
    Component,
}

/// A frontend node as stored in the tree arena.
///
/// Nodes are only mutated through [`NodeTree`](crate::NodeTree) operations,
/// which keep parent links, child lists and scene membership consistent.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) node_type: NodeType,
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) scene: Option<SceneId>,
    pub(crate) enabled: bool,
    pub(crate) default_tracking: PropertyTrackingMode,
    pub(crate) tracking_overrides: BTreeMap<String, PropertyTrackingMode>,
    pub(crate) properties: BTreeMap<String, PropertyValue>,
    pub(crate) components: Vec<NodeId>,
    pub(crate) backend_created: bool,
}

impl Node {
    pub(crate) fn new(node_type: NodeType, kind: NodeKind) -> Self {
        Self {
            id: NodeId::new(),
            node_type,
            kind,
            parent: None,
            children: Vec::new(),
            scene: None,
            enabled: true,
            default_tracking: PropertyTrackingMode::default(),
            tracking_overrides: BTreeMap::new(),
            properties: BTreeMap::new(),
            components: Vec::new(),
            backend_created: false,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node_type(&self) -> &NodeType {
        &self.node_type
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn scene(&self) -> Option<SceneId> {
        self.scene
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn default_tracking(&self) -> PropertyTrackingMode {
        self.default_tracking
    }

    pub fn tracking_overrides(&self) -> &BTreeMap<String, PropertyTrackingMode> {
        &self.tracking_overrides
    }

    /// Tracking mode in force for `property`: its override, else the default.
    pub fn effective_tracking(&self, property: &str) -> PropertyTrackingMode {
        self.tracking_overrides
            .get(property)
            .copied()
            .unwrap_or(self.default_tracking)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    /// Components of an entity, in the order they were added.
    pub fn components(&self) -> &[NodeId] {
        &self.components
    }

    /// Whether creation records for this node have reached its arbiter.
    pub fn has_backend_node(&self) -> bool {
        self.backend_created
    }

    /// Nodes referenced by node-valued and node-list-valued properties, in
    /// property name order.
    pub fn referenced_nodes(&self) -> Vec<NodeId> {
        self.properties
            .values()
            .flat_map(PropertyValue::referenced_nodes)
            .collect()
    }
}
