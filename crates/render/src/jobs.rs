use crate::nodes::{GeometryRenderer, PrimitiveType, RenderEntity, RenderTransform, TRANSFORM};
use glam::{Mat4, Vec3};
use scenesync_backend::{BackendWrites, Job, NodeManager, SharedManager};
use scenesync_common::NodeId;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

/// World matrices by entity id, as of the last transform pass.
pub type SharedWorldMatrices = Arc<RwLock<BTreeMap<NodeId, Mat4>>>;
/// Drawables collected by the last render-list pass.
pub type SharedRenderList = Arc<RwLock<Vec<Renderable>>>;

pub const UPDATE_WORLD_TRANSFORMS: &str = "update_world_transforms";
pub const COLLECT_RENDERABLES: &str = "collect_renderables";

/// One draw call's worth of state.
#[derive(Debug, Clone, PartialEq)]
pub struct Renderable {
    pub entity: NodeId,
    pub geometry_renderer: NodeId,
    pub world: Mat4,
    pub primitive_type: PrimitiveType,
    pub vertex_count: i64,
    pub instance_count: i64,
}

/// Resolve each entity's parent entity.
///
/// Live child lists win over the parent captured at creation; the latter
/// only counts while the parent has not released the child since.
fn parent_map(entities: &NodeManager<RenderEntity>) -> HashMap<NodeId, NodeId> {
    let mut parents = HashMap::new();
    for (id, entity) in entities.iter() {
        if let Some(parent) = entity.initial_parent() {
            if entities
                .lookup(parent)
                .is_some_and(|p| !p.has_released(id))
            {
                parents.insert(id, parent);
            }
        }
    }
    for (id, entity) in entities.iter() {
        for child in entity.children() {
            if entities.contains(*child) {
                parents.insert(*child, id);
            }
        }
    }
    parents
}

/// First enabled transform component of an entity.
fn local_transform<'a>(
    entity: &RenderEntity,
    transforms: &'a NodeManager<RenderTransform>,
) -> Option<(NodeId, &'a RenderTransform)> {
    entity.components().iter().find_map(|c| {
        transforms
            .lookup(*c)
            .filter(|t| t.is_enabled())
            .map(|t| (*c, t))
    })
}

/// Computes every entity's world matrix from the entity hierarchy.
///
/// Writes the world translation back to the frontend transform whenever it
/// moved since the previous pass.
pub struct UpdateWorldTransformJob {
    pub entities: SharedManager<RenderEntity>,
    pub transforms: SharedManager<RenderTransform>,
    pub world: SharedWorldMatrices,
}

impl Job for UpdateWorldTransformJob {
    fn name(&self) -> &'static str {
        UPDATE_WORLD_TRANSFORMS
    }

    fn run(&mut self, writes: &mut BackendWrites) {
        let entities = self.entities.read();
        let transforms = self.transforms.read();
        let parents = parent_map(&entities);

        let local = |id: NodeId| {
            entities
                .lookup(id)
                .and_then(|e| local_transform(e, &transforms))
                .map_or(Mat4::IDENTITY, |(_, t)| t.transform().to_matrix())
        };

        let mut computed = BTreeMap::new();
        for id in entities.ids() {
            let mut chain = vec![id];
            let mut current = id;
            while let Some(parent) = parents.get(&current) {
                if chain.contains(parent) {
                    tracing::debug!(entity = %id, "cyclic entity hierarchy");
                    break;
                }
                chain.push(*parent);
                current = *parent;
            }
            let world = chain
                .iter()
                .rev()
                .fold(Mat4::IDENTITY, |acc, e| acc * local(*e));
            computed.insert(id, world);
        }

        let mut world = self.world.write().unwrap_or_else(PoisonError::into_inner);
        for (id, matrix) in &computed {
            let translation = translation_of(matrix);
            let moved = world
                .get(id)
                .is_none_or(|previous| translation_of(previous) != translation);
            if !moved {
                continue;
            }
            let transform = entities
                .lookup(*id)
                .and_then(|e| local_transform(e, &transforms));
            if let Some((transform_id, _)) = transform {
                writes.write(transform_id, TRANSFORM, "worldTranslation", translation);
            }
        }
        tracing::trace!(entities = computed.len(), "world transforms updated");
        *world = computed;
    }
}

/// Builds the render list: every enabled entity with a drawable geometry
/// renderer, ordered by entity id.
pub struct CollectRenderablesJob {
    pub entities: SharedManager<RenderEntity>,
    pub geometry_renderers: SharedManager<GeometryRenderer>,
    pub world: SharedWorldMatrices,
    pub render_list: SharedRenderList,
}

impl Job for CollectRenderablesJob {
    fn name(&self) -> &'static str {
        COLLECT_RENDERABLES
    }

    fn dependencies(&self) -> &[&'static str] {
        &[UPDATE_WORLD_TRANSFORMS]
    }

    fn run(&mut self, _writes: &mut BackendWrites) {
        let entities = self.entities.read();
        let renderers = self.geometry_renderers.read();
        let world = self.world.read().unwrap_or_else(PoisonError::into_inner);

        let mut list = Vec::new();
        for id in entities.ids() {
            let Some(entity) = entities.lookup(id).filter(|e| e.is_enabled()) else {
                continue;
            };
            let drawable = entity.components().iter().find_map(|c| {
                renderers
                    .lookup(*c)
                    .filter(|r| r.is_drawable())
                    .map(|r| (*c, r))
            });
            if let Some((renderer_id, renderer)) = drawable {
                list.push(Renderable {
                    entity: id,
                    geometry_renderer: renderer_id,
                    world: world.get(&id).copied().unwrap_or(Mat4::IDENTITY),
                    primitive_type: renderer.primitive_type,
                    vertex_count: renderer.vertex_count,
                    instance_count: renderer.instance_count,
                });
            }
        }
        tracing::trace!(renderables = list.len(), "render list collected");
        *self
            .render_list
            .write()
            .unwrap_or_else(PoisonError::into_inner) = list;
    }
}

/// World translation of a matrix.
pub fn translation_of(matrix: &Mat4) -> Vec3 {
    matrix.w_axis.truncate()
}
