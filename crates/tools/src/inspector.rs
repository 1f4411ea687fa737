use scenesync_backend::{Aspect, RegistryStats};
use scenesync_common::{NodeId, NodeType, PropertyValue, SceneId};
use scenesync_kernel::{NodeKind, NodeTree};
use std::fmt;

/// Scene inspector for developer tooling.
///
/// Provides read-only queries against the frontend tree and the backend
/// registries for debugging and the CLI.
pub struct SceneInspector;

impl SceneInspector {
    /// Produce a summary of the frontend tree.
    pub fn summary(tree: &NodeTree) -> TreeSummary {
        let mut summary = TreeSummary {
            scenes: tree.scenes().count(),
            ..TreeSummary::default()
        };
        for node in tree.nodes() {
            summary.nodes += 1;
            match node.kind() {
                NodeKind::Entity => summary.entities += 1,
                NodeKind::Component => summary.components += 1,
                NodeKind::Node => {}
            }
            if node.has_backend_node() {
                summary.attached += 1;
            }
        }
        summary
    }

    pub fn inspect_node(tree: &NodeTree, id: NodeId) -> Option<NodeInfo> {
        tree.node(id).map(|node| NodeInfo {
            id,
            node_type: node.node_type().clone(),
            kind: node.kind(),
            parent: node.parent(),
            children: node.children().len(),
            scene: node.scene(),
            enabled: node.is_enabled(),
            properties: node
                .properties()
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        })
    }

    /// List all node ids, sorted.
    pub fn list_nodes(tree: &NodeTree) -> Vec<NodeId> {
        tree.nodes().map(|n| n.id()).collect()
    }

    /// Indented outline of the subtree under `root`, one node per line.
    pub fn outline(tree: &NodeTree, root: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![(root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = tree.node(id) else {
                continue;
            };
            let marker = if node.has_backend_node() { "" } else { " (detached)" };
            out.push_str(&format!(
                "{:indent$}{} {}{}\n",
                "",
                node.node_type(),
                id,
                marker,
                indent = depth * 2
            ));
            for child in node.children().iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        out
    }

    /// Node types and instance counts of an aspect's registry.
    pub fn registry_report(aspect: &dyn Aspect) -> RegistryReport {
        let registry = aspect.registry();
        RegistryReport {
            aspect: aspect.name().to_owned(),
            instances: registry.instance_counts(),
            stats: registry.stats(),
        }
    }
}

/// Summary of the frontend tree for the inspector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeSummary {
    pub nodes: usize,
    pub scenes: usize,
    pub entities: usize,
    pub components: usize,
    /// Nodes whose backend peers exist.
    pub attached: usize,
}

impl fmt::Display for TreeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tree: nodes={} scenes={} entities={} components={} attached={}",
            self.nodes, self.scenes, self.entities, self.components, self.attached
        )
    }
}

/// Detailed info about a single frontend node.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub id: NodeId,
    pub node_type: NodeType,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: usize,
    pub scene: Option<SceneId>,
    pub enabled: bool,
    pub properties: Vec<(String, PropertyValue)>,
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({:?}) children={} enabled={}",
            self.node_type, self.id, self.kind, self.children, self.enabled
        )?;
        if let Some(parent) = self.parent {
            write!(f, " parent={parent}")?;
        }
        for (name, value) in &self.properties {
            write!(f, "\n  {name} = {value:?}")?;
        }
        Ok(())
    }
}

/// Backend side of one aspect.
#[derive(Debug, Clone)]
pub struct RegistryReport {
    pub aspect: String,
    pub instances: Vec<(NodeType, usize)>,
    pub stats: RegistryStats,
}

impl RegistryReport {
    pub fn total_instances(&self) -> usize {
        self.instances.iter().map(|(_, n)| n).sum()
    }
}

impl fmt::Display for RegistryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Aspect {}: created={} updated={} destroyed={} stale={} unknown={}",
            self.aspect,
            self.stats.created,
            self.stats.updated,
            self.stats.destroyed,
            self.stats.stale_dropped,
            self.stats.unknown_type_dropped
        )?;
        for (node_type, count) in &self.instances {
            write!(f, "\n  {node_type}: {count}")?;
        }
        Ok(())
    }
}
