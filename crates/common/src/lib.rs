//! Shared vocabulary of the frontend/backend synchronization core.
//!
//! # Invariants
//! - A `NodeId` is never reused within a process.
//! - Change records are immutable once built; consumers only read them.

pub mod change;
pub mod types;
pub mod value;

pub use change::{
    CHILDREN_PROPERTY, COMPONENTS_PROPERTY, ChangeKind, ChangeOrigin, ChangeRecord,
    ENABLED_PROPERTY, NodeCreatedData, PropertySnapshot, SceneChange,
};
pub use types::{AspectId, IdAndType, NodeId, NodeType, SceneId, Transform};
pub use value::PropertyValue;
