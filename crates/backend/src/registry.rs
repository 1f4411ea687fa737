use crate::functor::BackendNodeFunctor;
use scenesync_common::{ChangeRecord, NodeType, SceneChange};
use std::collections::HashMap;
use std::fmt;

/// What the registry did with one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Updated,
    /// Destruction record; carries how many subtree entries had an instance.
    Destroyed(usize),
    /// The subject has no instance (destroyed in the interim, or never created).
    StaleReference,
    /// No functor is registered for the subject type.
    UnknownType,
}

impl ApplyOutcome {
    /// Whether the record reached a backend instance.
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Destroyed(_))
    }
}

/// Diagnostic counters of a registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub created: u64,
    pub updated: u64,
    pub destroyed: u64,
    pub stale_dropped: u64,
    pub unknown_type_dropped: u64,
}

/// Maps frontend node types to the functors that maintain their backend peers.
///
/// # Invariants
/// - At most one functor per node type; registering again replaces it.
/// - Stale and unroutable records are dropped and counted, never escalated.
/// - A destruction record tears down every subtree entry through the functor
///   of that entry's own type.
#[derive(Default)]
pub struct BackendNodeRegistry {
    functors: HashMap<NodeType, Box<dyn BackendNodeFunctor>>,
    stats: RegistryStats,
}

impl fmt::Debug for BackendNodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.functors.keys().map(NodeType::as_str).collect();
        types.sort_unstable();
        f.debug_struct("BackendNodeRegistry")
            .field("types", &types)
            .field("stats", &self.stats)
            .finish()
    }
}

impl BackendNodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, node_type: NodeType, functor: impl BackendNodeFunctor + 'static) {
        tracing::debug!(%node_type, "registering backend functor");
        self.functors.insert(node_type, Box::new(functor));
    }

    pub fn unregister(&mut self, node_type: &NodeType) -> bool {
        self.functors.remove(node_type).is_some()
    }

    pub fn handles(&self, node_type: &NodeType) -> bool {
        self.functors.contains_key(node_type)
    }

    /// Registered node types, sorted.
    pub fn node_types(&self) -> Vec<NodeType> {
        let mut types: Vec<NodeType> = self.functors.keys().cloned().collect();
        types.sort();
        types
    }

    /// Live instances per registered type, sorted by type.
    pub fn instance_counts(&self) -> Vec<(NodeType, usize)> {
        self.node_types()
            .into_iter()
            .filter_map(|ty| {
                let count = self.functors.get(&ty)?.instance_count();
                Some((ty, count))
            })
            .collect()
    }

    pub fn stats(&self) -> RegistryStats {
        self.stats
    }

    /// Apply one record to the backend instances it addresses.
    pub fn apply(&mut self, change: &SceneChange) -> ApplyOutcome {
        if let ChangeRecord::NodeDestroyed { subtree } = &change.record {
            let mut destroyed = 0;
            let mut unknown = 0;
            for entry in subtree {
                let Some(functor) = self.functors.get(&entry.node_type) else {
                    unknown += 1;
                    tracing::debug!(id = %entry.id, node_type = %entry.node_type, "no functor for destroyed node type");
                    continue;
                };
                if functor.destroy(entry.id) {
                    destroyed += 1;
                } else {
                    self.stats.stale_dropped += 1;
                    tracing::debug!(id = %entry.id, node_type = %entry.node_type, "destroy of missing backend node");
                }
            }
            self.stats.destroyed += destroyed as u64;
            self.stats.unknown_type_dropped += unknown as u64;
            if unknown == subtree.len() {
                return ApplyOutcome::UnknownType;
            }
            return ApplyOutcome::Destroyed(destroyed);
        }

        let Some(functor) = self.functors.get(&change.subject_type) else {
            self.stats.unknown_type_dropped += 1;
            tracing::debug!(subject = %change.subject, node_type = %change.subject_type, "no functor for node type");
            return ApplyOutcome::UnknownType;
        };

        match &change.record {
            ChangeRecord::NodeCreated(data) => {
                functor.create(change.subject, data);
                self.stats.created += 1;
                ApplyOutcome::Created
            }
            _ => {
                if functor.notify(change) {
                    self.stats.updated += 1;
                    ApplyOutcome::Updated
                } else {
                    self.stats.stale_dropped += 1;
                    tracing::debug!(
                        subject = %change.subject,
                        kind = ?change.kind(),
                        "dropping change for missing backend node"
                    );
                    ApplyOutcome::StaleReference
                }
            }
        }
    }
}
