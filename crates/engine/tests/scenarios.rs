//! End-to-end scenarios: frontend tree, arbiter, engine and the render and
//! input aspects together.

use glam::Vec3;
use scenesync_arbiter::Arbiter;
use scenesync_backend::{
    Aspect, BackendNode, BackendNodeRegistry, BackendNodeState, Job, NodeFunctor, SharedManager,
};
use scenesync_common::{
    ChangeRecord, NodeCreatedData, NodeId, NodeType, PropertyValue, SceneChange, SceneId,
};
use scenesync_engine::{AspectEngine, EngineConfig};
use scenesync_input::{AXIS, DeviceState, InputAspect};
use scenesync_kernel::NodeTree;
use scenesync_render::{ENTITY, GEOMETRY_RENDERER, RenderAspect, TRANSFORM};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const FRAME: Duration = Duration::from_millis(16);

fn engine_with_render() -> (AspectEngine, Arc<Mutex<RenderAspect>>) {
    let mut engine = AspectEngine::new(EngineConfig::default().with_workers(2));
    let (_, render) = engine.register_aspect(RenderAspect::new());
    (engine, render)
}

fn attached_tree(engine: &AspectEngine) -> (NodeTree, SceneId) {
    let mut tree = NodeTree::new();
    let scene = tree.create_scene();
    tree.set_arbiter(scene, Some(engine.scene_arbiter())).unwrap();
    (tree, scene)
}

/// Entity with a transform at `position`.
fn placed_entity(tree: &mut NodeTree, parent: Option<NodeId>, position: Vec3) -> NodeId {
    let entity = tree.create_entity(ENTITY, parent).unwrap();
    let transform = tree.create_component(TRANSFORM, None).unwrap();
    tree.set_property(transform, "translation", position).unwrap();
    tree.add_component(entity, transform).unwrap();
    entity
}

fn world_translation(render: &Arc<Mutex<RenderAspect>>, entity: NodeId) -> Option<Vec3> {
    let render = render.lock().unwrap();
    render.world_matrix(entity).map(|m| m.w_axis.truncate())
}

#[test]
fn child_built_in_construction_scope_reaches_backend_on_commit() {
    let (engine, render) = engine_with_render();
    let (mut tree, scene) = attached_tree(&engine);
    let root = tree.create_entity(ENTITY, None).unwrap();
    tree.set_scene(root, Some(scene)).unwrap();
    engine.sync();

    tree.begin_construction();
    let child = tree.create_entity(ENTITY, Some(root)).unwrap();
    assert_eq!(engine.arbiter().pending_len(), 0);
    assert_eq!(tree.commit_construction(), 2);
    assert_eq!(engine.arbiter().pending_len(), 2);

    assert_eq!(engine.sync(), 2);
    let render = render.lock().unwrap();
    let entities = render.entities().read();
    assert_eq!(entities.lookup(root).unwrap().children(), &[child]);
    assert_eq!(entities.lookup(child).unwrap().initial_parent(), Some(root));
}

#[test]
fn unattached_property_writes_never_reach_the_arbiter() {
    let (engine, _render) = engine_with_render();
    let (mut tree, _scene) = attached_tree(&engine);
    let node = tree.create_entity(ENTITY, None).unwrap();
    tree.set_property(node, "customProperty", 15).unwrap();
    assert_eq!(engine.arbiter().pending_len(), 0);
    assert_eq!(engine.arbiter().stats().received, 0);
}

#[test]
fn reparenting_within_a_scene_moves_without_recreating() {
    let (mut engine, render) = engine_with_render();
    let (mut tree, scene) = attached_tree(&engine);
    let (_, p2, child) = tree.construct(|tree| {
        let root = tree.create_entity(ENTITY, None).unwrap();
        let p1 = placed_entity(tree, Some(root), Vec3::new(1.0, 0.0, 0.0));
        let p2 = placed_entity(tree, Some(root), Vec3::new(5.0, 0.0, 0.0));
        let child = tree.create_entity(ENTITY, Some(p1)).unwrap();
        tree.set_scene(root, Some(scene)).unwrap();
        (p1, p2, child)
    });
    engine.step(FRAME).unwrap();
    assert_eq!(world_translation(&render, child), Some(Vec3::new(1.0, 0.0, 0.0)));
    let before = render.lock().unwrap().registry().stats();

    tree.set_parent(child, Some(p2)).unwrap();
    assert_eq!(engine.arbiter().pending_len(), 2);
    tree.set_parent(child, Some(p2)).unwrap();
    assert_eq!(engine.arbiter().pending_len(), 2);

    let report = engine.step(FRAME).unwrap();
    assert_eq!(report.changes_synced, 2);
    assert_eq!(world_translation(&render, child), Some(Vec3::new(5.0, 0.0, 0.0)));

    let after = render.lock().unwrap().registry().stats();
    assert_eq!(after.created, before.created);
    assert_eq!(after.destroyed, before.destroyed);
    assert_eq!(after.updated, before.updated + 2);
}

#[test]
fn detaching_a_child_tears_down_its_backend_subtree() {
    let (engine, render) = engine_with_render();
    let (mut tree, scene) = attached_tree(&engine);
    let root = tree.create_entity(ENTITY, None).unwrap();
    tree.set_scene(root, Some(scene)).unwrap();
    let child = placed_entity(&mut tree, Some(root), Vec3::ONE);
    let grandchild = tree.create_entity(ENTITY, Some(child)).unwrap();
    engine.sync();
    assert_eq!(render.lock().unwrap().entities().read().len(), 3);

    tree.set_parent(child, None).unwrap();
    engine.sync();

    let render = render.lock().unwrap();
    let entities = render.entities().read();
    assert_eq!(entities.ids(), vec![root]);
    assert!(!entities.contains(grandchild));
    assert!(render.transforms().read().is_empty());
    // The frontend keeps the detached subtree.
    assert!(tree.contains(child));
    assert!(tree.contains(grandchild));
}

#[test]
fn destroying_any_shape_releases_every_backend_peer() {
    let (engine, render) = engine_with_render();
    let (mut tree, scene) = attached_tree(&engine);
    let root = tree.construct(|tree| {
        let root = placed_entity(tree, None, Vec3::ZERO);
        let mut deep = root;
        for _ in 0..4 {
            deep = placed_entity(tree, Some(deep), Vec3::X);
        }
        for _ in 0..5 {
            placed_entity(tree, Some(root), Vec3::Y);
        }
        tree.set_scene(root, Some(scene)).unwrap();
        root
    });
    engine.sync();
    let doomed = tree.subtree(root).unwrap().len();
    assert_eq!(doomed, 20);
    {
        let render = render.lock().unwrap();
        assert_eq!(render.entities().read().len(), 10);
        assert_eq!(render.transforms().read().len(), 10);
    }

    tree.destroy(root).unwrap();
    engine.sync();

    let render = render.lock().unwrap();
    assert!(render.entities().read().is_empty());
    assert!(render.transforms().read().is_empty());
    let stats = render.registry().stats();
    assert_eq!(stats.destroyed, doomed as u64);
    assert_eq!(stats.stale_dropped, 0);
}

#[test]
fn render_list_and_world_translation_write_back() {
    let (mut engine, render) = engine_with_render();
    let (mut tree, scene) = attached_tree(&engine);
    let (entity, transform) = tree.construct(|tree| {
        let root = placed_entity(tree, None, Vec3::new(0.0, 1.0, 0.0));
        let entity = tree.create_entity(ENTITY, Some(root)).unwrap();
        let transform = tree.create_component(TRANSFORM, None).unwrap();
        tree.set_property(transform, "translation", Vec3::new(2.0, 0.0, 0.0))
            .unwrap();
        let geometry = tree.create_component(GEOMETRY_RENDERER, None).unwrap();
        tree.set_property(geometry, "vertexCount", 36).unwrap();
        tree.add_component(entity, transform).unwrap();
        tree.add_component(entity, geometry).unwrap();
        tree.set_scene(root, Some(scene)).unwrap();
        (entity, transform)
    });

    let report = engine.step(FRAME).unwrap();
    assert_eq!(report.jobs_run, 2);
    let list = render.lock().unwrap().render_list();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].entity, entity);
    assert_eq!(list[0].world.w_axis.truncate(), Vec3::new(2.0, 1.0, 0.0));

    engine.apply_backend_changes(&mut tree);
    assert_eq!(
        tree.property(transform, "worldTranslation"),
        Some(&PropertyValue::Vec3(Vec3::new(2.0, 1.0, 0.0)))
    );

    tree.set_enabled(entity, false).unwrap();
    engine.step(FRAME).unwrap();
    assert!(render.lock().unwrap().render_list().is_empty());
}

/// Records the `value` updates an Axis receives.
#[derive(Default)]
struct AxisWatch {
    state: BackendNodeState,
    values: Vec<PropertyValue>,
}

impl BackendNode for AxisWatch {
    fn initialize_from_peer(&mut self, peer: NodeId, data: &NodeCreatedData) {
        self.state.initialize(peer, data);
    }

    fn scene_change_event(&mut self, change: &SceneChange) {
        if let ChangeRecord::PropertyUpdated { property, value } = &change.record {
            if property == "value" {
                self.values.push(value.clone());
            }
        }
    }
}

struct WatchAspect {
    registry: BackendNodeRegistry,
}

impl Aspect for WatchAspect {
    fn name(&self) -> &str {
        "watch"
    }

    fn registry(&self) -> &BackendNodeRegistry {
        &self.registry
    }

    fn registry_mut(&mut self) -> &mut BackendNodeRegistry {
        &mut self.registry
    }

    fn jobs_to_execute(&mut self, _time: Duration) -> Vec<Box<dyn Job>> {
        Vec::new()
    }
}

#[test]
fn backend_values_reach_other_aspects_but_never_echo() {
    let mut engine = AspectEngine::new(EngineConfig::default());
    let device = DeviceState::new();
    let (_, input) = engine.register_aspect(InputAspect::new(device.clone()));
    let axes = SharedManager::<AxisWatch>::new();
    let mut registry = BackendNodeRegistry::new();
    registry.register(AXIS, NodeFunctor::new(axes.clone()));
    engine.register_aspect(WatchAspect { registry });

    let (mut tree, scene) = attached_tree(&engine);
    let axis = tree.create_node(AXIS, None).unwrap();
    tree.set_property(axis, "channel", "mouse.x").unwrap();
    tree.set_scene(axis, Some(scene)).unwrap();

    device.set("mouse.x", 0.5);
    let report = engine.step(FRAME).unwrap();
    assert_eq!(report.backend_changes, 1);
    assert_eq!(engine.apply_backend_changes(&mut tree), 1);
    assert_eq!(tree.property(axis, "value"), Some(&PropertyValue::Float(0.5)));

    let input_before = input.lock().unwrap().registry().stats();
    let report = engine.step(FRAME).unwrap();
    assert_eq!(report.changes_synced, 1);
    assert_eq!(report.backend_changes, 0);
    assert_eq!(input.lock().unwrap().registry().stats(), input_before);
    assert_eq!(
        axes.read().lookup(axis).unwrap().values,
        vec![PropertyValue::Float(0.5)]
    );
}

#[test]
fn unknown_types_and_stale_records_are_absorbed() {
    let (engine, render) = engine_with_render();
    let (mut tree, scene) = attached_tree(&engine);
    let light = tree.create_node(NodeType::new("Light"), None).unwrap();
    tree.set_scene(light, Some(scene)).unwrap();

    engine.scene_arbiter().notify(SceneChange::property_updated(
        NodeId::new(),
        ENTITY,
        "translation",
        Vec3::ONE.into(),
    ));
    assert_eq!(engine.sync(), 2);

    assert_eq!(engine.postman().unrouted_count(), 1);
    let stats = render.lock().unwrap().registry().stats();
    assert_eq!(stats.stale_dropped, 1);
    assert_eq!(stats.unknown_type_dropped, 1);

    tree.destroy(light).unwrap();
    assert_eq!(engine.sync(), 1);
    assert_eq!(engine.postman().unrouted_count(), 2);
    let stats = render.lock().unwrap().registry().stats();
    assert_eq!(stats.unknown_type_dropped, 2);
    assert_eq!(stats.destroyed, 0);
}
