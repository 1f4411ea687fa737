use crate::errors::TreeError;
use crate::node::{Node, NodeKind, PropertyTrackingMode};
use crate::tree::NodeTree;
use scenesync_common::{
    COMPONENTS_PROPERTY, NodeCreatedData, NodeId, PropertySnapshot, PropertyValue, SceneChange,
};
use std::collections::BTreeSet;

/// Produces the creation records that rebuild a subtree on a backend with no
/// prior knowledge of it.
///
/// Traversal is pre-order: a node, then the children it references through
/// node-valued properties (in property name order), then its remaining
/// children in insertion order. Output depends only on tree state, so running
/// the generator twice over an unchanged subtree yields identical records.
pub struct CreationChangeGenerator<'a> {
    tree: &'a NodeTree,
    skip_created: bool,
}

impl<'a> CreationChangeGenerator<'a> {
    pub fn new(tree: &'a NodeTree) -> Self {
        Self {
            tree,
            skip_created: false,
        }
    }

    /// Leave out nodes whose backend peers already exist.
    pub fn skip_created(mut self) -> Self {
        self.skip_created = true;
        self
    }

    /// Creation records for the subtree rooted at `root`.
    pub fn generate(&self, root: NodeId) -> Result<Vec<SceneChange>, TreeError> {
        let order = self.traversal(root)?;
        Ok(order
            .into_iter()
            .filter_map(|id| self.tree.node(id))
            .filter(|node| !(self.skip_created && node.backend_created))
            .map(creation_change)
            .collect())
    }

    /// Subtree ids in generation order.
    pub fn traversal(&self, root: NodeId) -> Result<Vec<NodeId>, TreeError> {
        if !self.tree.contains(root) {
            return Err(TreeError::UnknownNode(root));
        }
        let mut order = Vec::new();
        let mut visited = BTreeSet::new();
        self.visit(root, &mut order, &mut visited);
        Ok(order)
    }

    fn visit(&self, id: NodeId, order: &mut Vec<NodeId>, visited: &mut BTreeSet<NodeId>) {
        let Some(node) = self.tree.node(id) else {
            return;
        };
        if !visited.insert(id) {
            return;
        }
        order.push(id);
        for referenced in node.referenced_nodes() {
            if node.children.contains(&referenced) {
                self.visit(referenced, order, visited);
            }
        }
        for child in &node.children {
            self.visit(*child, order, visited);
        }
    }
}

/// Creation record of a single node.
pub fn creation_change(node: &Node) -> SceneChange {
    SceneChange::node_created(
        node.id,
        node.node_type.clone(),
        NodeCreatedData {
            parent: node.parent,
            enabled: node.enabled,
            snapshot: snapshot(node),
        },
    )
}

/// Property values a backend needs to build the node's peer.
///
/// Tracked properties plus the structural ones (node references and an
/// entity's component list), whatever their tracking mode.
pub fn snapshot(node: &Node) -> PropertySnapshot {
    let mut snapshot: PropertySnapshot = node
        .properties
        .iter()
        .filter(|(name, value)| {
            value.is_node_reference()
                || node.effective_tracking(name) != PropertyTrackingMode::DontTrackValues
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    if node.kind == NodeKind::Entity {
        snapshot.insert(
            COMPONENTS_PROPERTY.to_owned(),
            PropertyValue::NodeList(node.components.clone()),
        );
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenesync_common::{ChangeRecord, NodeType};

    const NODE: NodeType = NodeType::from_static("Node");

    fn snapshot_of(change: &SceneChange) -> &PropertySnapshot {
        match &change.record {
            ChangeRecord::NodeCreated(data) => &data.snapshot,
            other => panic!("expected a creation record, got {other:?}"),
        }
    }

    #[test]
    fn pre_order_with_referenced_children_first() {
        let mut tree = NodeTree::new();
        let root = tree.create_node(NODE, None).unwrap();
        let a = tree.create_node(NODE, Some(root)).unwrap();
        let a1 = tree.create_node(NODE, Some(a)).unwrap();
        let b = tree.create_node(NODE, Some(root)).unwrap();
        tree.set_node_property(root, "material", Some(b)).unwrap();

        let order = CreationChangeGenerator::new(&tree).traversal(root).unwrap();
        assert_eq!(order, vec![root, b, a, a1]);
    }

    #[test]
    fn snapshot_honors_tracking_modes() {
        let mut tree = NodeTree::new();
        let root = tree.create_node(NODE, None).unwrap();
        let child = tree.create_node(NODE, Some(root)).unwrap();
        tree.set_property(root, "visible", 1).unwrap();
        tree.set_property(root, "hidden", 2).unwrap();
        tree.set_property_tracking(root, "hidden", PropertyTrackingMode::DontTrackValues)
            .unwrap();
        tree.set_default_tracking(root, PropertyTrackingMode::DontTrackValues)
            .unwrap();
        tree.set_property_tracking(root, "visible", PropertyTrackingMode::TrackAllValues)
            .unwrap();
        tree.set_node_property(root, "target", Some(child)).unwrap();

        let changes = CreationChangeGenerator::new(&tree).generate(root).unwrap();
        assert_eq!(changes.len(), 2);
        let snap = snapshot_of(&changes[0]);
        assert_eq!(snap.get("visible"), Some(&PropertyValue::Int(1)));
        assert!(!snap.contains_key("hidden"));
        assert_eq!(snap.get("target"), Some(&PropertyValue::Node(child)));
    }

    #[test]
    fn entity_snapshot_lists_components() {
        let mut tree = NodeTree::new();
        let entity = tree.create_entity(NodeType::new("Entity"), None).unwrap();
        let comp = tree.create_component(NodeType::new("Transform"), None).unwrap();
        tree.add_component(entity, comp).unwrap();

        let changes = CreationChangeGenerator::new(&tree).generate(entity).unwrap();
        assert_eq!(
            snapshot_of(&changes[0]).get(COMPONENTS_PROPERTY),
            Some(&PropertyValue::NodeList(vec![comp]))
        );
        // The adopted component is created after its entity.
        assert_eq!(changes[1].subject, comp);
    }

    #[test]
    fn generation_is_deterministic() {
        let mut tree = NodeTree::new();
        let root = tree.create_node(NODE, None).unwrap();
        for i in 0..20 {
            let child = tree.create_node(NODE, Some(root)).unwrap();
            tree.set_property(child, "index", i).unwrap();
        }
        let generator = CreationChangeGenerator::new(&tree);
        let first = generator.generate(root).unwrap();
        let second = generator.generate(root).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 21);
    }

    #[test]
    fn unknown_root_is_an_error() {
        let tree = NodeTree::new();
        let missing = NodeId::new();
        assert_eq!(
            CreationChangeGenerator::new(&tree).generate(missing),
            Err(TreeError::UnknownNode(missing))
        );
    }
}
