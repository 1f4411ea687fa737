use glam::Vec3;
use scenesync_backend::{BackendNode, BackendNodeState};
use scenesync_common::{
    CHILDREN_PROPERTY, COMPONENTS_PROPERTY, ChangeRecord, NodeCreatedData, NodeId, NodeType,
    PropertyValue, SceneChange, Transform,
};
use std::collections::BTreeSet;
use std::fmt;

pub const ENTITY: NodeType = NodeType::from_static("Entity");
pub const TRANSFORM: NodeType = NodeType::from_static("Transform");
pub const GEOMETRY_RENDERER: NodeType = NodeType::from_static("GeometryRenderer");

/// Backend peer of a frontend entity: hierarchy links and component ids.
#[derive(Debug, Default)]
pub struct RenderEntity {
    state: BackendNodeState,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    // Children announced at creation and removed since, without ever being
    // listed in `children`.
    released: BTreeSet<NodeId>,
    components: Vec<NodeId>,
}

impl RenderEntity {
    pub fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    /// Parent named in the creation record.
    pub fn initial_parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn has_released(&self, child: NodeId) -> bool {
        self.released.contains(&child)
    }

    pub fn components(&self) -> &[NodeId] {
        &self.components
    }
}

impl BackendNode for RenderEntity {
    fn initialize_from_peer(&mut self, peer: NodeId, data: &NodeCreatedData) {
        self.state.initialize(peer, data);
        self.parent = data.parent;
        self.children.clear();
        self.released.clear();
        self.components = data
            .snapshot
            .get(COMPONENTS_PROPERTY)
            .map(PropertyValue::referenced_nodes)
            .unwrap_or_default();
    }

    fn scene_change_event(&mut self, change: &SceneChange) {
        if self.state.handle_change(change) {
            return;
        }
        match &change.record {
            ChangeRecord::PropertyNodeAdded { property, node } if property == CHILDREN_PROPERTY => {
                self.released.remove(&node.id);
                if !self.children.contains(&node.id) {
                    self.children.push(node.id);
                }
            }
            ChangeRecord::PropertyNodeRemoved { property, node } if property == CHILDREN_PROPERTY => {
                let before = self.children.len();
                self.children.retain(|c| *c != node.id);
                if self.children.len() == before {
                    self.released.insert(node.id);
                }
            }
            ChangeRecord::ComponentAdded { component, .. } => {
                if !self.components.contains(&component.id) {
                    self.components.push(component.id);
                }
            }
            ChangeRecord::ComponentRemoved { component, .. } => {
                self.components.retain(|c| *c != component.id);
            }
            _ => {}
        }
    }
}

/// Backend peer of a Transform component.
#[derive(Debug, Default)]
pub struct RenderTransform {
    state: BackendNodeState,
    transform: Transform,
}

impl RenderTransform {
    pub fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    fn apply(&mut self, property: &str, value: &PropertyValue) {
        match property {
            "translation" => {
                if let Some(v) = value.as_vec3() {
                    self.transform.position = v;
                }
            }
            "rotation" => {
                if let Some(q) = value.as_quat() {
                    self.transform.rotation = q;
                }
            }
            "scale" => {
                if let Some(s) = value.as_vec3() {
                    self.transform.scale = s;
                } else if let Some(s) = value.as_float() {
                    self.transform.scale = Vec3::splat(s as f32);
                }
            }
            _ => {}
        }
    }
}

impl BackendNode for RenderTransform {
    fn initialize_from_peer(&mut self, peer: NodeId, data: &NodeCreatedData) {
        self.state.initialize(peer, data);
        self.transform = Transform::default();
        for (property, value) in &data.snapshot {
            self.apply(property, value);
        }
    }

    fn scene_change_event(&mut self, change: &SceneChange) {
        if self.state.handle_change(change) {
            return;
        }
        if let ChangeRecord::PropertyUpdated { property, value } = &change.record {
            self.apply(property, value);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrimitiveType {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
    Patches,
}

impl PrimitiveType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Points" => Self::Points,
            "Lines" => Self::Lines,
            "LineLoop" => Self::LineLoop,
            "LineStrip" => Self::LineStrip,
            "Triangles" => Self::Triangles,
            "TriangleStrip" => Self::TriangleStrip,
            "TriangleFan" => Self::TriangleFan,
            "Patches" => Self::Patches,
            _ => return None,
        })
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Draw parameters of a GeometryRenderer component.
#[derive(Debug)]
pub struct GeometryRenderer {
    state: BackendNodeState,
    pub instance_count: i64,
    pub vertex_count: i64,
    pub index_offset: i64,
    pub first_instance: i64,
    pub restart_index_value: i64,
    pub primitive_restart_enabled: bool,
    pub primitive_type: PrimitiveType,
    pub vertices_per_patch: i64,
    pub geometry: Option<NodeId>,
}

impl Default for GeometryRenderer {
    fn default() -> Self {
        Self {
            state: BackendNodeState::default(),
            instance_count: 1,
            vertex_count: 0,
            index_offset: 0,
            first_instance: 0,
            restart_index_value: -1,
            primitive_restart_enabled: false,
            primitive_type: PrimitiveType::default(),
            vertices_per_patch: 0,
            geometry: None,
        }
    }
}

impl GeometryRenderer {
    pub fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    /// Whether a draw call would produce anything.
    pub fn is_drawable(&self) -> bool {
        self.is_enabled() && self.instance_count > 0 && self.vertex_count > 0
    }

    fn apply(&mut self, property: &str, value: &PropertyValue) {
        let int = value.as_int();
        match property {
            "instanceCount" => self.instance_count = int.unwrap_or(self.instance_count),
            "vertexCount" => self.vertex_count = int.unwrap_or(self.vertex_count),
            "indexOffset" => self.index_offset = int.unwrap_or(self.index_offset),
            "firstInstance" => self.first_instance = int.unwrap_or(self.first_instance),
            "restartIndexValue" => {
                self.restart_index_value = int.unwrap_or(self.restart_index_value)
            }
            "verticesPerPatch" => self.vertices_per_patch = int.unwrap_or(self.vertices_per_patch),
            "primitiveRestartEnabled" => {
                if let Some(b) = value.as_bool() {
                    self.primitive_restart_enabled = b;
                }
            }
            "primitiveType" => match value.as_str().map(PrimitiveType::from_name) {
                Some(Some(primitive)) => self.primitive_type = primitive,
                _ => tracing::debug!(?value, "unrecognized primitive type"),
            },
            "geometry" => self.geometry = value.as_node(),
            _ => {}
        }
    }
}

impl BackendNode for GeometryRenderer {
    fn initialize_from_peer(&mut self, peer: NodeId, data: &NodeCreatedData) {
        *self = Self::default();
        self.state.initialize(peer, data);
        for (property, value) in &data.snapshot {
            self.apply(property, value);
        }
    }

    fn scene_change_event(&mut self, change: &SceneChange) {
        if self.state.handle_change(change) {
            return;
        }
        if let ChangeRecord::PropertyUpdated { property, value } = &change.record {
            self.apply(property, value);
        }
    }
}
