use foundation::math::{Mat4, Vec2, Vec3, mat4_model};
use scene::SceneGraph;
use scene::components::{LightRig, Material, Shape3D, Side};
use scene::entity::NodeId;
use scene::labels::LabelStyle;

use crate::camera::PerspectiveCamera;
use crate::viewport::RenderTarget;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RenderCommand {
    Sphere {
        node: NodeId,
        model: Mat4,
        radius: f64,
        segments: u32,
        material: Material,
        side: Side,
    },
}

/// Everything the backend needs for one 3D pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    pub view_proj: Mat4,
    pub camera_position: Vec3,
    pub lights: LightRig,
    pub commands: Vec<RenderCommand>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScreenLabel<'a> {
    pub text: &'a str,
    /// CSS pixels from the top-left of the viewport.
    pub position: Vec2,
}

/// The 2D pass drawn on top of the 3D scene.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OverlayFrame<'a> {
    pub label: Option<ScreenLabel<'a>>,
    pub style: &'a LabelStyle,
    pub viewport: (f64, f64),
}

/// Host-specific drawing. Resizing comes through [`RenderTarget`].
pub trait RenderBackend: RenderTarget {
    fn render_scene(&mut self, frame: &RenderFrame);
    fn render_overlay(&mut self, overlay: &OverlayFrame<'_>);
}

pub struct Renderer;

impl Renderer {
    pub fn collect(graph: &SceneGraph, camera: &PerspectiveCamera) -> RenderFrame {
        let mut commands = Vec::new();
        for (node, transform, drawable) in graph.drawables() {
            match drawable.shape {
                Shape3D::Sphere { radius, segments } => commands.push(RenderCommand::Sphere {
                    node,
                    model: mat4_model(transform.position, transform.rotation_y, transform.scale),
                    radius,
                    segments,
                    material: drawable.material,
                    side: drawable.side,
                }),
            }
        }

        let mut lights = *graph.lights();
        if lights.key.follows_camera {
            // Offset is in the camera frame; it turns with the camera.
            lights.key.position = camera.camera_to_world(lights.key.position);
        }

        RenderFrame {
            view_proj: camera.view_proj(),
            camera_position: camera.position(),
            lights,
            commands,
        }
    }

    pub fn collect_overlay<'a>(
        graph: &'a SceneGraph,
        camera: &PerspectiveCamera,
        viewport: (f64, f64),
        style: &'a LabelStyle,
    ) -> OverlayFrame<'a> {
        let label = graph.label().visible_text().and_then(|text| {
            let anchor = graph.label_world_position()?;
            let position = project_to_screen(camera, anchor, viewport)?;
            Some(ScreenLabel { text, position })
        });
        OverlayFrame {
            label,
            style,
            viewport,
        }
    }
}

/// World position to CSS pixels, `None` when behind the camera.
pub fn project_to_screen(camera: &PerspectiveCamera, p: Vec3, viewport: (f64, f64)) -> Option<Vec2> {
    let ndc = camera.world_to_ndc(p)?;
    let (w, h) = viewport;
    Some(Vec2::new((ndc.x + 1.0) * 0.5 * w, (1.0 - ndc.y) * 0.5 * h))
}
