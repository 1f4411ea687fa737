use crate::types::{AspectId, IdAndType, NodeId, NodeType};
use crate::value::PropertyValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property name under which parent/child relations travel.
pub const CHILDREN_PROPERTY: &str = "children";
/// Snapshot key listing an entity's components.
pub const COMPONENTS_PROPERTY: &str = "components";
/// Property name of the enabled flag in update records.
pub const ENABLED_PROPERTY: &str = "enabled";

/// Property values captured in a creation record, ordered by name.
pub type PropertySnapshot = BTreeMap<String, PropertyValue>;

/// Which side of the boundary produced a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChangeOrigin {
    /// Written by application code on the frontend tree.
    #[default]
    Frontend,
    /// Computed by a backend aspect and mirrored onto the frontend.
    Backend(AspectId),
}

/// Payload of a creation record: everything a backend needs to build its peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCreatedData {
    pub parent: Option<NodeId>,
    pub enabled: bool,
    pub snapshot: PropertySnapshot,
}

/// One frontend mutation. The set of variants is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChangeRecord {
    NodeCreated(NodeCreatedData),
    PropertyUpdated {
        property: String,
        value: PropertyValue,
    },
    PropertyNodeAdded {
        property: String,
        node: IdAndType,
    },
    PropertyNodeRemoved {
        property: String,
        node: IdAndType,
    },
    ComponentAdded {
        entity: NodeId,
        component: IdAndType,
    },
    ComponentRemoved {
        entity: NodeId,
        component: IdAndType,
    },
    /// Every `{id, type}` of the destroyed subtree, subject included.
    NodeDestroyed { subtree: Vec<IdAndType> },
}

/// Discriminant of [`ChangeRecord`], handy for assertions and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    NodeCreated,
    PropertyUpdated,
    PropertyNodeAdded,
    PropertyNodeRemoved,
    ComponentAdded,
    ComponentRemoved,
    NodeDestroyed,
}

/// A change record addressed to a subject node.
///
/// The header (`subject`, `subject_type`, `origin`) is what routing needs;
/// `record` is what the backend applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneChange {
    pub subject: NodeId,
    pub subject_type: NodeType,
    pub origin: ChangeOrigin,
    pub record: ChangeRecord,
}

impl SceneChange {
    pub fn new(subject: NodeId, subject_type: NodeType, record: ChangeRecord) -> Self {
        Self {
            subject,
            subject_type,
            origin: ChangeOrigin::Frontend,
            record,
        }
    }

    pub fn node_created(
        subject: NodeId,
        subject_type: NodeType,
        data: NodeCreatedData,
    ) -> Self {
        Self::new(subject, subject_type, ChangeRecord::NodeCreated(data))
    }

    pub fn property_updated(
        subject: NodeId,
        subject_type: NodeType,
        property: impl Into<String>,
        value: PropertyValue,
    ) -> Self {
        Self::new(
            subject,
            subject_type,
            ChangeRecord::PropertyUpdated {
                property: property.into(),
                value,
            },
        )
    }

    pub fn node_added(
        subject: NodeId,
        subject_type: NodeType,
        property: impl Into<String>,
        node: IdAndType,
    ) -> Self {
        Self::new(
            subject,
            subject_type,
            ChangeRecord::PropertyNodeAdded {
                property: property.into(),
                node,
            },
        )
    }

    pub fn node_removed(
        subject: NodeId,
        subject_type: NodeType,
        property: impl Into<String>,
        node: IdAndType,
    ) -> Self {
        Self::new(
            subject,
            subject_type,
            ChangeRecord::PropertyNodeRemoved {
                property: property.into(),
                node,
            },
        )
    }

    pub fn component_added(entity: NodeId, entity_type: NodeType, component: IdAndType) -> Self {
        Self::new(
            entity,
            entity_type,
            ChangeRecord::ComponentAdded { entity, component },
        )
    }

    pub fn component_removed(entity: NodeId, entity_type: NodeType, component: IdAndType) -> Self {
        Self::new(
            entity,
            entity_type,
            ChangeRecord::ComponentRemoved { entity, component },
        )
    }

    pub fn node_destroyed(subject: NodeId, subject_type: NodeType, subtree: Vec<IdAndType>) -> Self {
        Self::new(
            subject,
            subject_type,
            ChangeRecord::NodeDestroyed { subtree },
        )
    }

    pub fn with_origin(mut self, origin: ChangeOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn kind(&self) -> ChangeKind {
        match &self.record {
            ChangeRecord::NodeCreated(_) => ChangeKind::NodeCreated,
            ChangeRecord::PropertyUpdated { .. } => ChangeKind::PropertyUpdated,
            ChangeRecord::PropertyNodeAdded { .. } => ChangeKind::PropertyNodeAdded,
            ChangeRecord::PropertyNodeRemoved { .. } => ChangeKind::PropertyNodeRemoved,
            ChangeRecord::ComponentAdded { .. } => ChangeKind::ComponentAdded,
            ChangeRecord::ComponentRemoved { .. } => ChangeKind::ComponentRemoved,
            ChangeRecord::NodeDestroyed { .. } => ChangeKind::NodeDestroyed,
        }
    }

    pub fn is_backend_originated(&self) -> bool {
        matches!(self.origin, ChangeOrigin::Backend(_))
    }

    /// Name of the property the record touches, if any.
    pub fn property_name(&self) -> Option<&str> {
        match &self.record {
            ChangeRecord::PropertyUpdated { property, .. }
            | ChangeRecord::PropertyNodeAdded { property, .. }
            | ChangeRecord::PropertyNodeRemoved { property, .. } => Some(property),
            _ => None,
        }
    }
}
