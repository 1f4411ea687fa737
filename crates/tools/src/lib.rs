//! Developer tooling: read-only inspection of the frontend tree and of the
//! backend registries.
//!
//! # Invariants
//! - Inspection never mutates the tree or emits change records.

mod inspector;

pub use inspector::{NodeInfo, RegistryReport, SceneInspector, TreeSummary};
