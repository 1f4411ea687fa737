//! Headless render aspect.
//!
//! Backend peers of `Entity`, `Transform` and `GeometryRenderer` nodes feed
//! two jobs per frame: world-transform composition down the entity
//! hierarchy, then render-list collection. A [`Renderer`] turns the list
//! into output; [`DebugTextRenderer`] prints it.
//!
//! # Invariants
//! - Renderers never touch the frontend tree.
//! - The render list is collected after world transforms, every frame.

pub mod aspect;
pub mod jobs;
pub mod nodes;
mod renderer;

pub use aspect::RenderAspect;
pub use jobs::{CollectRenderablesJob, Renderable, UpdateWorldTransformJob};
pub use nodes::{
    ENTITY, GEOMETRY_RENDERER, GeometryRenderer, PrimitiveType, RenderEntity, RenderTransform,
    TRANSFORM,
};
pub use renderer::{DebugTextRenderer, RenderView, Renderer};
