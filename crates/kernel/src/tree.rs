use crate::errors::TreeError;
use crate::generator::CreationChangeGenerator;
use crate::node::{Node, NodeKind, PropertyTrackingMode};
use crate::scene::Scene;
use scenesync_arbiter::Arbiter;
use scenesync_common::{
    CHILDREN_PROPERTY, ENABLED_PROPERTY, IdAndType, NodeId, NodeType, PropertyValue, SceneChange,
    SceneId,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Work postponed until the outermost construction scope commits.
enum Pending {
    /// A record produced while the scope was open.
    Record {
        arbiter: Arc<dyn Arbiter>,
        change: SceneChange,
    },
    /// Notify the backend that `node` now hangs under `parent` (or is the
    /// root of its scene when `parent` is `None`).
    Attach {
        node: NodeId,
        parent: Option<NodeId>,
    },
}

/// The frontend node tree.
///
/// Nodes live in an arena keyed by [`NodeId`]; parent links are plain ids and
/// child lists are kept in insertion order. Every operation that a backend
/// must learn about produces change records for the arbiter of the node's
/// scene: immediately, or at the end of the outermost construction scope
/// opened with [`NodeTree::begin_construction`].
///
/// # Invariants
/// - `parent(n) == Some(p)` iff `n` is in `children(p)`.
/// - A node shares its parent's scene; a scene's node set matches.
/// - A creation record for a node reaches its arbiter before any record
///   that attaches or references it.
/// - Writing a value equal to the current one produces no record.
#[derive(Default)]
pub struct NodeTree {
    nodes: BTreeMap<NodeId, Node>,
    scenes: BTreeMap<SceneId, Scene>,
    construction_depth: usize,
    pending: Vec<Pending>,
}

impl fmt::Debug for NodeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeTree")
            .field("nodes", &self.nodes.len())
            .field("scenes", &self.scenes)
            .field("construction_depth", &self.construction_depth)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl NodeTree {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- queries ----

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes, sorted by id.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn scene(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.get(&id)
    }

    pub fn scenes(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.values()
    }

    pub fn property(&self, id: NodeId, name: &str) -> Option<&PropertyValue> {
        self.nodes.get(&id).and_then(|n| n.property(name))
    }

    /// Parentless nodes attached to `scene`, sorted by id.
    pub fn roots(&self, scene: SceneId) -> Vec<NodeId> {
        self.scenes
            .get(&scene)
            .map(|s| {
                s.nodes
                    .iter()
                    .copied()
                    .filter(|id| self.nodes.get(id).is_some_and(|n| n.parent.is_none()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ids of the subtree rooted at `root`, pre-order over child lists.
    pub fn subtree(&self, root: NodeId) -> Result<Vec<NodeId>, TreeError> {
        self.get(root)?;
        Ok(self.collect_subtree(root))
    }

    /// Entities that list `component` among their components.
    pub fn entities_with_component(&self, component: NodeId) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.components.contains(&component))
            .map(|n| n.id)
            .collect()
    }

    /// Whether `ancestor` is a strict ancestor of `node`.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.nodes.get(&node).and_then(|n| n.parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// Creation records describing the current state of a subtree.
    pub fn creation_changes(&self, root: NodeId) -> Result<Vec<SceneChange>, TreeError> {
        CreationChangeGenerator::new(self).generate(root)
    }

    // ---- scenes ----

    pub fn create_scene(&mut self) -> SceneId {
        let scene = Scene::new();
        let id = scene.id;
        self.scenes.insert(id, scene);
        tracing::debug!(%id, "scene created");
        id
    }

    /// Install (or remove) the arbiter of a scene.
    ///
    /// Subtrees already created on a previous arbiter are destroyed there.
    /// Every root of the scene is then announced to the new arbiter.
    pub fn set_arbiter(
        &mut self,
        scene: SceneId,
        arbiter: Option<Arc<dyn Arbiter>>,
    ) -> Result<(), TreeError> {
        if !self.scenes.contains_key(&scene) {
            return Err(TreeError::UnknownScene(scene));
        }
        let roots = self.roots(scene);
        for root in &roots {
            self.detach_backend(*root);
        }
        if let Some(s) = self.scenes.get_mut(&scene) {
            s.arbiter = arbiter;
        }
        for root in roots {
            self.schedule_attach(root, None);
        }
        Ok(())
    }

    /// Attach a parentless node (and its subtree) to a scene, or detach it
    /// with `None`.
    pub fn set_scene(&mut self, root: NodeId, scene: Option<SceneId>) -> Result<(), TreeError> {
        let node = self.get(root)?;
        if node.parent.is_some() {
            return Err(TreeError::NotARoot(root));
        }
        if let Some(s) = scene {
            if !self.scenes.contains_key(&s) {
                return Err(TreeError::UnknownScene(s));
            }
        }
        if node.scene == scene {
            return Ok(());
        }
        self.detach_backend(root);
        self.assign_scene(root, scene);
        if scene.is_some() {
            self.schedule_attach(root, None);
        }
        Ok(())
    }

    // ---- construction scopes ----

    /// Open a construction scope. Scopes nest; records are held back until
    /// the outermost scope commits.
    pub fn begin_construction(&mut self) {
        self.construction_depth += 1;
    }

    /// Close a construction scope. The outermost commit replays everything
    /// that happened inside, as one batch per arbiter. Returns the number of
    /// records delivered.
    pub fn commit_construction(&mut self) -> usize {
        match self.construction_depth {
            0 => {
                tracing::warn!("commit_construction without matching begin_construction");
                0
            }
            1 => {
                self.construction_depth = 0;
                self.flush_pending()
            }
            _ => {
                self.construction_depth -= 1;
                0
            }
        }
    }

    pub fn is_constructing(&self) -> bool {
        self.construction_depth > 0
    }

    /// Run `build` inside a construction scope.
    pub fn construct<R>(&mut self, build: impl FnOnce(&mut Self) -> R) -> R {
        self.begin_construction();
        let result = build(self);
        self.commit_construction();
        result
    }

    // ---- structure ----

    pub fn create_node(
        &mut self,
        node_type: NodeType,
        parent: Option<NodeId>,
    ) -> Result<NodeId, TreeError> {
        self.insert(node_type, NodeKind::Node, parent)
    }

    pub fn create_entity(
        &mut self,
        node_type: NodeType,
        parent: Option<NodeId>,
    ) -> Result<NodeId, TreeError> {
        self.insert(node_type, NodeKind::Entity, parent)
    }

    pub fn create_component(
        &mut self,
        node_type: NodeType,
        parent: Option<NodeId>,
    ) -> Result<NodeId, TreeError> {
        self.insert(node_type, NodeKind::Component, parent)
    }

    /// Move `node` under `new_parent`, or detach it with `None`.
    ///
    /// Within one scene the backend sees a removal and an addition. Leaving
    /// a scene destroys the subtree's backend peers; entering one creates them.
    pub fn set_parent(
        &mut self,
        node: NodeId,
        new_parent: Option<NodeId>,
    ) -> Result<(), TreeError> {
        let current = self.get(node)?.parent;
        if current == new_parent {
            return Ok(());
        }
        let new_scene = match new_parent {
            Some(parent) => {
                let p = self.get(parent)?;
                if parent == node || self.is_ancestor(node, parent) {
                    return Err(TreeError::WouldCreateCycle { node, parent });
                }
                p.scene
            }
            None => None,
        };
        let old_scene = self.get(node)?.scene;
        let stays_in_scene = new_parent.is_some() && new_scene.is_some() && new_scene == old_scene;

        if stays_in_scene {
            if let Some(old_parent) = current {
                if let Some(removed) = self.child_removed(old_parent, node) {
                    self.notify_for(node, vec![removed]);
                }
            }
        } else {
            self.detach_backend(node);
        }

        self.unlink(node);
        match new_parent {
            Some(parent) => {
                self.link(node, parent);
                self.schedule_attach(node, Some(parent));
            }
            None => self.assign_scene(node, None),
        }
        tracing::debug!(%node, parent = ?new_parent, "reparented");
        Ok(())
    }

    /// Destroy a node and its subtree.
    ///
    /// The backend receives the removal from the parent and one destruction
    /// record listing the whole subtree before anything leaves the arena.
    /// References to destroyed nodes held elsewhere are cleared afterwards.
    pub fn destroy(&mut self, node: NodeId) -> Result<(), TreeError> {
        self.get(node)?;
        let subtree = self.collect_subtree(node);
        let doomed: BTreeMap<NodeId, NodeType> = subtree
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|n| (n.id, n.node_type.clone()))
            .collect();

        for id in &subtree {
            if self.nodes.get(id).is_some_and(|n| n.kind == NodeKind::Component) {
                for entity in self.entities_with_component(*id) {
                    if !doomed.contains_key(&entity) {
                        self.detach_component(entity, *id);
                    }
                }
            }
        }

        self.detach_backend(node);
        self.unlink(node);
        for id in &subtree {
            if let Some(removed) = self.nodes.remove(id) {
                if let Some(scene) = removed.scene.and_then(|s| self.scenes.get_mut(&s)) {
                    scene.nodes.remove(id);
                }
            }
        }
        self.clear_references(&doomed);
        tracing::debug!(%node, count = subtree.len(), "destroyed subtree");
        Ok(())
    }

    // ---- values ----

    /// Toggle the enabled flag. Sent whenever it changes, whatever the
    /// tracking mode.
    pub fn set_enabled(&mut self, node: NodeId, enabled: bool) -> Result<(), TreeError> {
        let n = self.get_mut(node)?;
        if n.enabled == enabled {
            return Ok(());
        }
        n.enabled = enabled;
        let change = SceneChange::property_updated(
            node,
            n.node_type.clone(),
            ENABLED_PROPERTY,
            enabled.into(),
        );
        self.notify_for(node, vec![change]);
        Ok(())
    }

    /// Write a property value. Node references are routed through
    /// [`NodeTree::set_node_property`] and [`NodeTree::set_node_list`] so
    /// that referenced nodes are adopted and announced first.
    pub fn set_property(
        &mut self,
        node: NodeId,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<(), TreeError> {
        let value = match value.into() {
            PropertyValue::Node(target) => {
                return self.set_node_property(node, name, Some(target));
            }
            PropertyValue::NodeList(list) => return self.set_node_list(node, name, &list),
            value => value,
        };
        let n = self.get_mut(node)?;
        if n.properties.get(name).unwrap_or(&PropertyValue::Null) == &value {
            return Ok(());
        }
        n.properties.insert(name.to_owned(), value.clone());
        if n.effective_tracking(name) == PropertyTrackingMode::DontTrackValues {
            return Ok(());
        }
        let change = SceneChange::property_updated(node, n.node_type.clone(), name, value);
        self.notify_for(node, vec![change]);
        Ok(())
    }

    /// Point a node-valued property at `target`, or clear it.
    ///
    /// A parentless, sceneless target is adopted as a child of `owner` first,
    /// so its creation reaches the backend before the reference does.
    pub fn set_node_property(
        &mut self,
        owner: NodeId,
        name: &str,
        target: Option<NodeId>,
    ) -> Result<(), TreeError> {
        self.get(owner)?;
        if let Some(t) = target {
            self.get(t)?;
        }
        let value = target.map_or(PropertyValue::Null, PropertyValue::Node);
        if self.property(owner, name).unwrap_or(&PropertyValue::Null) == &value {
            return Ok(());
        }
        if let Some(t) = target {
            self.adopt(owner, t)?;
        }
        let n = self.get_mut(owner)?;
        n.properties.insert(name.to_owned(), value.clone());
        let change = SceneChange::property_updated(owner, n.node_type.clone(), name, value);
        self.notify_for(owner, vec![change]);
        Ok(())
    }

    /// Append `node` to the node-list property `name` of `owner`.
    pub fn add_to_node_list(
        &mut self,
        owner: NodeId,
        name: &str,
        node: NodeId,
    ) -> Result<(), TreeError> {
        self.get(owner)?;
        let node_type = self.get(node)?.node_type.clone();
        let mut list = self.node_list(owner, name);
        if list.contains(&node) {
            return Ok(());
        }
        self.adopt(owner, node)?;
        list.push(node);
        let n = self.get_mut(owner)?;
        n.properties
            .insert(name.to_owned(), PropertyValue::NodeList(list));
        let change = SceneChange::node_added(
            owner,
            n.node_type.clone(),
            name,
            IdAndType::new(node, node_type),
        );
        self.notify_for(owner, vec![change]);
        Ok(())
    }

    /// Replace the node-list property `name` of `owner` with `list`.
    ///
    /// Sent as removals of the dropped entries followed by additions of the
    /// new ones, so the stored order keeps surviving entries first.
    pub fn set_node_list(
        &mut self,
        owner: NodeId,
        name: &str,
        list: &[NodeId],
    ) -> Result<(), TreeError> {
        self.get(owner)?;
        for id in list {
            self.get(*id)?;
        }
        for id in self.node_list(owner, name) {
            if !list.contains(&id) {
                self.remove_from_node_list(owner, name, id)?;
            }
        }
        for id in list {
            self.add_to_node_list(owner, name, *id)?;
        }
        Ok(())
    }

    /// Remove `node` from the node-list property `name` of `owner`. The node
    /// keeps its parent.
    pub fn remove_from_node_list(
        &mut self,
        owner: NodeId,
        name: &str,
        node: NodeId,
    ) -> Result<(), TreeError> {
        self.get(owner)?;
        let node_type = self.get(node)?.node_type.clone();
        let mut list = self.node_list(owner, name);
        let Some(index) = list.iter().position(|id| *id == node) else {
            return Ok(());
        };
        list.remove(index);
        let n = self.get_mut(owner)?;
        n.properties
            .insert(name.to_owned(), PropertyValue::NodeList(list));
        let change = SceneChange::node_removed(
            owner,
            n.node_type.clone(),
            name,
            IdAndType::new(node, node_type),
        );
        self.notify_for(owner, vec![change]);
        Ok(())
    }

    // ---- components ----

    /// Add `component` to `entity`. A parentless, sceneless component is
    /// adopted by the entity first.
    pub fn add_component(&mut self, entity: NodeId, component: NodeId) -> Result<(), TreeError> {
        self.check_component_pair(entity, component)?;
        if self.get(entity)?.components.contains(&component) {
            return Ok(());
        }
        self.adopt(entity, component)?;
        self.get_mut(entity)?.components.push(component);
        self.notify_component(entity, component, true);
        Ok(())
    }

    /// Remove `component` from `entity`. The component keeps its parent.
    pub fn remove_component(
        &mut self,
        entity: NodeId,
        component: NodeId,
    ) -> Result<(), TreeError> {
        self.check_component_pair(entity, component)?;
        if !self.get(entity)?.components.contains(&component) {
            return Ok(());
        }
        self.detach_component(entity, component);
        Ok(())
    }

    // ---- tracking ----

    pub fn set_default_tracking(
        &mut self,
        node: NodeId,
        mode: PropertyTrackingMode,
    ) -> Result<(), TreeError> {
        self.get_mut(node)?.default_tracking = mode;
        Ok(())
    }

    pub fn set_property_tracking(
        &mut self,
        node: NodeId,
        name: &str,
        mode: PropertyTrackingMode,
    ) -> Result<(), TreeError> {
        self.get_mut(node)?
            .tracking_overrides
            .insert(name.to_owned(), mode);
        Ok(())
    }

    pub fn clear_property_tracking(&mut self, node: NodeId, name: &str) -> Result<(), TreeError> {
        self.get_mut(node)?.tracking_overrides.remove(name);
        Ok(())
    }

    pub fn property_tracking(
        &self,
        node: NodeId,
        name: &str,
    ) -> Result<PropertyTrackingMode, TreeError> {
        Ok(self.get(node)?.effective_tracking(name))
    }

    // ---- internals ----

    pub(crate) fn get(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.nodes.get(&id).ok_or(TreeError::UnknownNode(id))
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        self.nodes.get_mut(&id).ok_or(TreeError::UnknownNode(id))
    }

    fn insert(
        &mut self,
        node_type: NodeType,
        kind: NodeKind,
        parent: Option<NodeId>,
    ) -> Result<NodeId, TreeError> {
        if let Some(p) = parent {
            self.get(p)?;
        }
        let node = Node::new(node_type, kind);
        let id = node.id;
        tracing::trace!(%id, node_type = %node.node_type, ?kind, ?parent, "node created");
        self.nodes.insert(id, node);
        if let Some(p) = parent {
            self.link(id, p);
            self.schedule_attach(id, Some(p));
        }
        Ok(id)
    }

    fn link(&mut self, node: NodeId, parent: NodeId) {
        let scene = match self.nodes.get_mut(&parent) {
            Some(p) => {
                p.children.push(node);
                p.scene
            }
            None => return,
        };
        if let Some(n) = self.nodes.get_mut(&node) {
            n.parent = Some(parent);
        }
        self.assign_scene(node, scene);
    }

    fn unlink(&mut self, node: NodeId) {
        let Some(parent) = self.nodes.get_mut(&node).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|c| *c != node);
        }
    }

    fn assign_scene(&mut self, root: NodeId, scene: Option<SceneId>) {
        for id in self.collect_subtree(root) {
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            let old = std::mem::replace(&mut node.scene, scene);
            if old == scene {
                continue;
            }
            if let Some(s) = old.and_then(|s| self.scenes.get_mut(&s)) {
                s.nodes.remove(&id);
            }
            if let Some(s) = scene.and_then(|s| self.scenes.get_mut(&s)) {
                s.nodes.insert(id);
            }
        }
    }

    fn collect_subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            out.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Adopt a parentless, sceneless `node` as a child of `owner`.
    fn adopt(&mut self, owner: NodeId, node: NodeId) -> Result<(), TreeError> {
        let n = self.get(node)?;
        if n.parent.is_none() && n.scene.is_none() && node != owner && !self.is_ancestor(node, owner)
        {
            self.set_parent(node, Some(owner))?;
        }
        Ok(())
    }

    fn node_list(&self, owner: NodeId, name: &str) -> Vec<NodeId> {
        match self.property(owner, name) {
            Some(PropertyValue::NodeList(list)) => list.clone(),
            _ => Vec::new(),
        }
    }

    fn check_component_pair(&self, entity: NodeId, component: NodeId) -> Result<(), TreeError> {
        if self.get(entity)?.kind != NodeKind::Entity {
            return Err(TreeError::NotAnEntity(entity));
        }
        if self.get(component)?.kind != NodeKind::Component {
            return Err(TreeError::NotAComponent(component));
        }
        Ok(())
    }

    fn detach_component(&mut self, entity: NodeId, component: NodeId) {
        if let Some(e) = self.nodes.get_mut(&entity) {
            e.components.retain(|c| *c != component);
        }
        self.notify_component(entity, component, false);
    }

    /// Tell the entity's arbiter, and the component's when it differs.
    fn notify_component(&mut self, entity: NodeId, component: NodeId, added: bool) {
        let (Some(e), Some(c)) = (self.nodes.get(&entity), self.nodes.get(&component)) else {
            return;
        };
        let entity_type = e.node_type.clone();
        let target = IdAndType::new(component, c.node_type.clone());
        let change = if added {
            SceneChange::component_added(entity, entity_type, target)
        } else {
            SceneChange::component_removed(entity, entity_type, target)
        };
        let entity_arbiter = e.backend_created.then(|| self.arbiter_of(entity)).flatten();
        let component_arbiter = c.backend_created.then(|| self.arbiter_of(component)).flatten();
        if let Some(arbiter) = &entity_arbiter {
            self.emit(Arc::clone(arbiter), vec![change.clone()]);
        }
        if let Some(arbiter) = component_arbiter {
            let same = entity_arbiter
                .as_ref()
                .is_some_and(|e| same_arbiter(e, &arbiter));
            if !same {
                self.emit(arbiter, vec![change]);
            }
        }
    }

    fn child_removed(&self, parent: NodeId, child: NodeId) -> Option<SceneChange> {
        let p = self.nodes.get(&parent)?;
        let c = self.nodes.get(&child)?;
        Some(SceneChange::node_removed(
            parent,
            p.node_type.clone(),
            CHILDREN_PROPERTY,
            IdAndType::new(child, c.node_type.clone()),
        ))
    }

    /// Tear down the backend peers of a subtree: removal from the parent,
    /// then one destruction record for the whole subtree.
    fn detach_backend(&mut self, node: NodeId) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        if !n.backend_created {
            return;
        }
        let subtree = self.collect_subtree(node);
        if let Some(arbiter) = self.arbiter_of(node) {
            let mut changes = Vec::with_capacity(2);
            if let Some(removed) = n.parent.and_then(|p| self.child_removed(p, node)) {
                changes.push(removed);
            }
            let entries = subtree
                .iter()
                .filter_map(|id| self.nodes.get(id))
                .map(|n| IdAndType::new(n.id, n.node_type.clone()))
                .collect();
            changes.push(SceneChange::node_destroyed(
                node,
                n.node_type.clone(),
                entries,
            ));
            self.emit(arbiter, changes);
        }
        for id in subtree {
            if let Some(n) = self.nodes.get_mut(&id) {
                n.backend_created = false;
            }
        }
    }

    /// Drop references to destroyed nodes from the survivors.
    fn clear_references(&mut self, doomed: &BTreeMap<NodeId, NodeType>) {
        let mut updates: Vec<(NodeId, SceneChange)> = Vec::new();
        for node in self.nodes.values_mut() {
            node.components.retain(|c| !doomed.contains_key(c));
            for (name, value) in node.properties.iter_mut() {
                match value {
                    PropertyValue::Node(id) if doomed.contains_key(id) => {
                        *value = PropertyValue::Null;
                        updates.push((
                            node.id,
                            SceneChange::property_updated(
                                node.id,
                                node.node_type.clone(),
                                name.clone(),
                                PropertyValue::Null,
                            ),
                        ));
                    }
                    PropertyValue::NodeList(list) => {
                        for id in list.iter() {
                            if let Some(node_type) = doomed.get(id) {
                                updates.push((
                                    node.id,
                                    SceneChange::node_removed(
                                        node.id,
                                        node.node_type.clone(),
                                        name.clone(),
                                        IdAndType::new(*id, node_type.clone()),
                                    ),
                                ));
                            }
                        }
                        list.retain(|id| !doomed.contains_key(id));
                    }
                    _ => {}
                }
            }
        }
        for (owner, change) in updates {
            self.notify_for(owner, vec![change]);
        }
    }

    pub(crate) fn arbiter_of(&self, node: NodeId) -> Option<Arc<dyn Arbiter>> {
        let scene = self.nodes.get(&node)?.scene?;
        self.scenes.get(&scene)?.arbiter.clone()
    }

    /// Emit records about `subject` if its backend peer exists.
    pub(crate) fn notify_for(&mut self, subject: NodeId, changes: Vec<SceneChange>) {
        if !self.nodes.get(&subject).is_some_and(|n| n.backend_created) {
            return;
        }
        if let Some(arbiter) = self.arbiter_of(subject) {
            self.emit(arbiter, changes);
        }
    }

    fn emit(&mut self, arbiter: Arc<dyn Arbiter>, changes: Vec<SceneChange>) {
        if self.construction_depth > 0 {
            self.pending.extend(changes.into_iter().map(|change| Pending::Record {
                arbiter: Arc::clone(&arbiter),
                change,
            }));
        } else {
            for change in changes {
                tracing::trace!(subject = %change.subject, kind = ?change.kind(), "notify");
                arbiter.notify(change);
            }
        }
    }

    fn schedule_attach(&mut self, node: NodeId, parent: Option<NodeId>) {
        if self.construction_depth > 0 {
            self.pending.push(Pending::Attach { node, parent });
            return;
        }
        if let Some((arbiter, changes)) = self.attach(node, parent, &mut BTreeSet::new()) {
            self.emit(arbiter, changes);
        }
    }

    /// Records announcing `node` under `parent`. Nodes whose creation was
    /// already produced in this pass (`created`) yield nothing.
    fn attach(
        &mut self,
        node: NodeId,
        parent: Option<NodeId>,
        created: &mut BTreeSet<NodeId>,
    ) -> Option<(Arc<dyn Arbiter>, Vec<SceneChange>)> {
        let n = self.nodes.get(&node)?;
        if n.parent != parent || created.contains(&node) {
            return None;
        }
        let parent_info = match parent {
            Some(p) => {
                let p = self.nodes.get(&p)?;
                if !p.backend_created {
                    return None;
                }
                Some((p.id, p.node_type.clone()))
            }
            None => None,
        };
        let arbiter = self.arbiter_of(node)?;
        let node_type = n.node_type.clone();

        let mut changes = CreationChangeGenerator::new(self)
            .skip_created()
            .generate(node)
            .ok()?;
        for change in &changes {
            created.insert(change.subject);
            if let Some(c) = self.nodes.get_mut(&change.subject) {
                c.backend_created = true;
            }
        }
        if let Some((parent_id, parent_type)) = parent_info {
            changes.push(SceneChange::node_added(
                parent_id,
                parent_type,
                CHILDREN_PROPERTY,
                IdAndType::new(node, node_type),
            ));
        }
        (!changes.is_empty()).then_some((arbiter, changes))
    }

    fn flush_pending(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return 0;
        }
        let _span = tracing::info_span!("commit_construction", pending = pending.len()).entered();
        let mut created = BTreeSet::new();
        let mut batches: Vec<(Arc<dyn Arbiter>, Vec<SceneChange>)> = Vec::new();
        let mut push = |arbiter: Arc<dyn Arbiter>, changes: Vec<SceneChange>| {
            match batches.iter_mut().find(|(a, _)| same_arbiter(a, &arbiter)) {
                Some((_, batch)) => batch.extend(changes),
                None => batches.push((arbiter, changes)),
            }
        };
        for item in pending {
            match item {
                Pending::Record { arbiter, change } => push(arbiter, vec![change]),
                Pending::Attach { node, parent } => {
                    if let Some((arbiter, changes)) = self.attach(node, parent, &mut created) {
                        push(arbiter, changes);
                    }
                }
            }
        }
        let mut delivered = 0;
        for (arbiter, batch) in batches {
            delivered += batch.len();
            arbiter.notify_batch(batch);
        }
        tracing::debug!(delivered, "construction committed");
        delivered
    }
}

fn same_arbiter(a: &Arc<dyn Arbiter>, b: &Arc<dyn Arbiter>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
