//! Frontend node tree of the synchronization core.
//!
//! [`NodeTree`] owns every frontend node in an id-keyed arena and turns
//! structural and value mutations into change records for the arbiter of the
//! node's scene. [`CreationChangeGenerator`] rebuilds a subtree's creation
//! records from scratch.
//!
//! # Invariants
//! - All mutations flow through explicit `NodeTree` operations.
//! - Iteration order is deterministic (BTreeMap arenas, insertion-ordered
//!   child lists).
//! - Inside a construction scope no record leaves the tree until the
//!   outermost `commit_construction`.

pub mod errors;
pub mod generator;
pub mod node;
pub mod scene;
pub mod tree;
mod writeback;

pub use errors::TreeError;
pub use generator::CreationChangeGenerator;
pub use node::{Node, NodeKind, PropertyTrackingMode};
pub use scene::Scene;
pub use tree::NodeTree;
