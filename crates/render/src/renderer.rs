use crate::jobs::{Renderable, translation_of};
use glam::{Mat4, Vec3};
use std::fmt::Write;

/// Where a frame is seen from. Renderables farther than `far` from the eye
/// are culled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderView {
    pub eye: Vec3,
    pub target: Vec3,
    pub far: f32,
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 20.0),
            target: Vec3::ZERO,
            far: 100.0,
        }
    }
}

impl RenderView {
    /// Right-handed world-to-view transform, +Y up.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, Vec3::Y)
    }

    pub fn is_visible(&self, renderable: &Renderable) -> bool {
        translation_of(&renderable.world).distance(self.eye) <= self.far
    }

    /// Distance along the view direction; negative is behind the eye.
    pub fn depth_of(&self, renderable: &Renderable) -> f32 {
        -self
            .view_matrix()
            .transform_point3(translation_of(&renderable.world))
            .z
    }
}

/// Consumer of a render list. Renderers read backend state only.
pub trait Renderer {
    type Output;

    fn render(&self, renderables: &[Renderable], view: &RenderView) -> Self::Output;
}

/// Produces a human-readable listing of the render list.
#[derive(Debug, Default)]
pub struct DebugTextRenderer;

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, renderables: &[Renderable], view: &RenderView) -> String {
        let visible: Vec<&Renderable> =
            renderables.iter().filter(|r| view.is_visible(r)).collect();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "=== Render list ({} of {} visible) ===",
            visible.len(),
            renderables.len()
        );
        for r in visible {
            let p = translation_of(&r.world);
            let _ = writeln!(
                out,
                "  [{}] {} vertices={} instances={} pos=({:.2}, {:.2}, {:.2}) depth={:.2}",
                r.entity,
                r.primitive_type,
                r.vertex_count,
                r.instance_count,
                p.x,
                p.y,
                p.z,
                view.depth_of(r)
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::PrimitiveType;
    use scenesync_common::NodeId;

    fn renderable_at(position: Vec3) -> Renderable {
        Renderable {
            entity: NodeId::new(),
            geometry_renderer: NodeId::new(),
            world: Mat4::from_translation(position),
            primitive_type: PrimitiveType::Lines,
            vertex_count: 24,
            instance_count: 2,
        }
    }

    #[test]
    fn empty_list() {
        let output = DebugTextRenderer::new().render(&[], &RenderView::default());
        assert!(output.contains("0 of 0 visible"));
    }

    #[test]
    fn lists_each_visible_renderable() {
        let near = renderable_at(Vec3::new(1.0, 2.0, 3.0));
        let output = DebugTextRenderer::new().render(&[near.clone()], &RenderView::default());
        assert!(output.contains("1 of 1 visible"));
        assert!(output.contains(&format!("[{}] Lines vertices=24 instances=2", near.entity)));
        assert!(output.contains("pos=(1.00, 2.00, 3.00) depth=17.00"));
    }

    #[test]
    fn far_renderables_are_culled() {
        let view = RenderView {
            far: 30.0,
            ..RenderView::default()
        };
        let near = renderable_at(Vec3::ZERO);
        let far = renderable_at(Vec3::new(0.0, 0.0, -50.0));
        assert!(view.is_visible(&near));
        assert!(!view.is_visible(&far));

        let output = DebugTextRenderer::new().render(&[near, far.clone()], &view);
        assert!(output.contains("1 of 2 visible"));
        assert!(!output.contains(&far.entity.to_string()));
    }

    #[test]
    fn depth_grows_away_from_the_eye() {
        let view = RenderView::default();
        assert!((view.depth_of(&renderable_at(Vec3::ZERO)) - 20.0).abs() < 1e-4);
        assert!(view.depth_of(&renderable_at(Vec3::new(0.0, 0.0, 30.0))) < 0.0);
    }
}
