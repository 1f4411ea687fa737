//! Replaying generated creation records rebuilds the same backend as a live
//! sync.

use glam::Vec3;
use scenesync_arbiter::Arbiter;
use scenesync_backend::{
    Aspect, BackendNode, BackendNodeRegistry, BackendNodeState, Job, NodeFunctor, SharedManager,
};
use scenesync_common::{
    ChangeRecord, NodeCreatedData, NodeId, NodeType, PropertyValue, SceneChange,
};
use scenesync_engine::{AspectEngine, EngineConfig};
use scenesync_kernel::{NodeTree, PropertyTrackingMode};
use std::collections::BTreeMap;
use std::time::Duration;

const MESH: NodeType = NodeType::from_static("Mesh");
const MATERIAL: NodeType = NodeType::from_static("Material");

/// Keeps every property value it is told about.
#[derive(Debug, Default, Clone, PartialEq)]
struct Mirror {
    state: BackendNodeState,
    properties: BTreeMap<String, PropertyValue>,
}

impl BackendNode for Mirror {
    fn initialize_from_peer(&mut self, peer: NodeId, data: &NodeCreatedData) {
        self.state.initialize(peer, data);
        self.properties = data.snapshot.clone();
    }

    fn scene_change_event(&mut self, change: &SceneChange) {
        if self.state.handle_change(change) {
            return;
        }
        if let ChangeRecord::PropertyUpdated { property, value } = &change.record {
            self.properties.insert(property.clone(), value.clone());
        }
    }
}

struct MirrorAspect {
    registry: BackendNodeRegistry,
    mirrors: SharedManager<Mirror>,
}

impl MirrorAspect {
    fn new() -> Self {
        let mirrors = SharedManager::new();
        let mut registry = BackendNodeRegistry::new();
        registry.register(MESH, NodeFunctor::new(mirrors.clone()));
        registry.register(MATERIAL, NodeFunctor::new(mirrors.clone()));
        Self { registry, mirrors }
    }

    /// `(id, enabled, properties)` of every mirror, sorted by id.
    fn dump(&self) -> Vec<(NodeId, bool, BTreeMap<String, PropertyValue>)> {
        let mirrors = self.mirrors.read();
        mirrors
            .ids()
            .into_iter()
            .filter_map(|id| {
                let m = mirrors.lookup(id)?;
                Some((id, m.state.is_enabled(), m.properties.clone()))
            })
            .collect()
    }
}

impl Aspect for MirrorAspect {
    fn name(&self) -> &str {
        "mirror"
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

fn engine() -> AspectEngine {
    AspectEngine::new(EngineConfig::default().with_workers(1))
}

#[test]
fn replayed_creation_records_match_live_sync() {
    let mut live = engine();
    let (_, live_mirror) = live.register_aspect(MirrorAspect::new());

    let mut tree = NodeTree::new();
    let scene = tree.create_scene();
    tree.set_arbiter(scene, Some(live.scene_arbiter())).unwrap();
    let root = tree.create_node(MESH, None).unwrap();
    tree.set_scene(root, Some(scene)).unwrap();

    // Mutations after the subtree is live arrive as updates and additions.
    let (a, b, material) = tree.construct(|tree| {
        let a = tree.create_node(MESH, Some(root)).unwrap();
        let b = tree.create_node(MESH, Some(a)).unwrap();
        let material = tree.create_node(MATERIAL, None).unwrap();
        (a, b, material)
    });
    tree.set_property(root, "translation", Vec3::new(1.0, 2.0, 3.0)).unwrap();
    tree.set_property(a, "vertexCount", 36).unwrap();
    tree.set_property(a, "vertexCount", 48).unwrap();
    tree.set_property(b, "label", "leaf").unwrap();
    tree.set_enabled(b, false).unwrap();
    tree.set_node_property(a, "material", Some(material)).unwrap();
    live.sync();

    // Replay into a fresh backend.
    let mut replay = engine();
    let (_, replay_mirror) = replay.register_aspect(MirrorAspect::new());
    let records = tree.creation_changes(root).unwrap();
    replay.scene_arbiter().notify_batch(records);
    replay.sync();

    let live_dump = live_mirror.lock().unwrap().dump();
    let replay_dump = replay_mirror.lock().unwrap().dump();
    let ids: Vec<NodeId> = live_dump.iter().map(|(id, ..)| *id).collect();
    assert_eq!(ids, vec![root, a, b, material]);
    assert_eq!(live_dump, replay_dump);
    assert_eq!(
        replay_dump[1].2.get("vertexCount"),
        Some(&PropertyValue::Int(48))
    );
    assert!(!replay_dump[2].1);
}

#[test]
fn replay_leaves_out_untracked_values_like_live_sync() {
    let mut live = engine();
    let (_, live_mirror) = live.register_aspect(MirrorAspect::new());

    let mut tree = NodeTree::new();
    let scene = tree.create_scene();
    tree.set_arbiter(scene, Some(live.scene_arbiter())).unwrap();
    let root = tree.create_node(MESH, None).unwrap();
    tree.set_property_tracking(root, "scratch", PropertyTrackingMode::DontTrackValues)
        .unwrap();
    tree.set_property(root, "scratch", 1).unwrap();
    tree.set_property(root, "kept", 2).unwrap();
    tree.set_scene(root, Some(scene)).unwrap();
    live.sync();

    let mut replay = engine();
    let (_, replay_mirror) = replay.register_aspect(MirrorAspect::new());
    replay
        .scene_arbiter()
        .notify_batch(tree.creation_changes(root).unwrap());
    replay.sync();

    let live_dump = live_mirror.lock().unwrap().dump();
    assert_eq!(live_dump, replay_mirror.lock().unwrap().dump());
    assert!(!live_dump[0].2.contains_key("scratch"));
    assert_eq!(live_dump[0].2.get("kept"), Some(&PropertyValue::Int(2)));
}
