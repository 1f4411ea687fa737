use scenesync_common::{NodeId, SceneId};

/// Errors returned by [`NodeTree`](crate::NodeTree) operations.
///
/// These are caller mistakes detected before any state changes. Delivery
/// problems on the backend side are never reported here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("node {0} not found")]
    UnknownNode(NodeId),
    #[error("scene {0} not found")]
    UnknownScene(SceneId),
    #[error("parenting {node} under {parent} would create a cycle")]
    WouldCreateCycle { node: NodeId, parent: NodeId },
    #[error("node {0} has a parent; only roots can be attached to a scene")]
    NotARoot(NodeId),
    #[error("node {0} is not an entity")]
    NotAnEntity(NodeId),
    #[error("node {0} is not a component")]
    NotAComponent(NodeId),
}
