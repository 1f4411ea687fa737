use crate::jobs::{
    CollectRenderablesJob, Renderable, SharedRenderList, SharedWorldMatrices,
    UpdateWorldTransformJob,
};
use crate::nodes::{
    ENTITY, GEOMETRY_RENDERER, GeometryRenderer, RenderEntity, RenderTransform, TRANSFORM,
};
use glam::Mat4;
use scenesync_backend::{Aspect, BackendNodeRegistry, Job, NodeFunctor, SharedManager};
use scenesync_common::NodeId;
use std::sync::PoisonError;
use std::time::Duration;

/// Headless rendering aspect.
///
/// Mirrors entities, transforms and geometry renderers, and each frame
/// recomputes world matrices and the render list.
pub struct RenderAspect {
    registry: BackendNodeRegistry,
    entities: SharedManager<RenderEntity>,
    transforms: SharedManager<RenderTransform>,
    geometry_renderers: SharedManager<GeometryRenderer>,
    world: SharedWorldMatrices,
    render_list: SharedRenderList,
}

impl Default for RenderAspect {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderAspect {
    pub fn new() -> Self {
        let entities = SharedManager::new();
        let transforms = SharedManager::new();
        let geometry_renderers = SharedManager::new();
        let mut registry = BackendNodeRegistry::new();
        registry.register(ENTITY, NodeFunctor::new(entities.clone()));
        registry.register(TRANSFORM, NodeFunctor::new(transforms.clone()));
        registry.register(GEOMETRY_RENDERER, NodeFunctor::new(geometry_renderers.clone()));
        Self {
            registry,
            entities,
            transforms,
            geometry_renderers,
            world: SharedWorldMatrices::default(),
            render_list: SharedRenderList::default(),
        }
    }

    pub fn entities(&self) -> &SharedManager<RenderEntity> {
        &self.entities
    }

    pub fn transforms(&self) -> &SharedManager<RenderTransform> {
        &self.transforms
    }

    pub fn geometry_renderers(&self) -> &SharedManager<GeometryRenderer> {
        &self.geometry_renderers
    }

    /// World matrix of an entity as of the last frame.
    pub fn world_matrix(&self, entity: NodeId) -> Option<Mat4> {
        self.world
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&entity)
            .copied()
    }

    /// Render list of the last frame.
    pub fn render_list(&self) -> Vec<Renderable> {
        self.render_list
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Aspect for RenderAspect {
    fn name(&self) -> &str {
        "render"
    }

    fn registry(&self) -> &BackendNodeRegistry {
        &self.registry
    }

    fn registry_mut(&mut self) -> &mut BackendNodeRegistry {
        &mut self.registry
    }

    fn jobs_to_execute(&mut self, _time: Duration) -> Vec<Box<dyn Job>> {
        vec![
            Box::new(UpdateWorldTransformJob {
                entities: self.entities.clone(),
                transforms: self.transforms.clone(),
                world: self.world.clone(),
            }),
            Box::new(CollectRenderablesJob {
                entities: self.entities.clone(),
                geometry_renderers: self.geometry_renderers.clone(),
                world: self.world.clone(),
                render_list: self.render_list.clone(),
            }),
        ]
    }
}
