//! Backend side of the synchronization core.
//!
//! Each aspect (render, input, ...) owns a [`BackendNodeRegistry`] mapping
//! frontend node types to functors. A functor creates, looks up and destroys
//! backend peers inside a [`NodeManager`] arena keyed by [`NodeId`].
//!
//! # Invariants
//! - Backend instances are owned by exactly one manager.
//! - A record addressing a missing peer is dropped and counted, never fatal.
//!
//! [`NodeId`]: scenesync_common::NodeId

pub mod aspect;
pub mod functor;
pub mod job;
pub mod manager;
pub mod node;
pub mod registry;

pub use aspect::Aspect;
pub use functor::{BackendNodeFunctor, NodeFunctor};
pub use job::{BackendWrites, Job, PropertyWrite};
pub use manager::{BackendHandle, NodeManager, SharedManager};
pub use node::{BackendNode, BackendNodeState};
pub use registry::{ApplyOutcome, BackendNodeRegistry, RegistryStats};
