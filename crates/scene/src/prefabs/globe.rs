use crate::SceneGraph;
use crate::components::{Drawable3D, Material, TextureSlot, Transform};
use crate::entity::NodeId;

/// Construction parameters for the globe, its glow shell and the backdrop.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobeParams {
    pub radius: f64,
    pub segments: u32,
    /// Untextured placeholder color until the surface texture arrives.
    pub fallback_color: [f32; 4],
    pub glow_scale: f64,
    pub glow_color: [f32; 3],
    pub glow_intensity: f32,
    pub glow_power: f32,
}

impl Default for GlobeParams {
    fn default() -> Self {
        Self {
            radius: 3.0,
            segments: 64,
            fallback_color: [0.10, 0.55, 0.85, 1.0],
            glow_scale: 1.1,
            glow_color: [0.64, 0.85, 0.85],
            glow_intensity: 0.8,
            glow_power: 12.0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GlobeHandle {
    pub globe: NodeId,
    pub glow: NodeId,
    pub radius: f64,
}

pub fn spawn_globe(graph: &mut SceneGraph, params: &GlobeParams, texture: TextureSlot) -> GlobeHandle {
    let globe = graph.spawn("globe", None, Transform::identity());
    graph.set_drawable(
        globe,
        Drawable3D::sphere(
            params.radius,
            params.segments,
            Material::Textured {
                slot: texture,
                fallback_color: params.fallback_color,
            },
        ),
    );

    let s = params.glow_scale;
    let glow = graph.spawn("glow-shell", None, Transform::scaled([s, s, s]));
    graph.set_drawable(
        glow,
        Drawable3D::sphere(
            params.radius,
            params.segments,
            Material::Glow {
                color: params.glow_color,
                intensity: params.glow_intensity,
                power: params.glow_power,
            },
        )
        .back_faced(),
    );

    GlobeHandle {
        globe,
        glow,
        radius: params.radius,
    }
}

pub fn spawn_background(graph: &mut SceneGraph, radius: f64, segments: u32, texture: TextureSlot) -> NodeId {
    let node = graph.spawn("background", None, Transform::identity());
    graph.set_drawable(
        node,
        Drawable3D::sphere(
            radius,
            segments,
            Material::Textured {
                slot: texture,
                fallback_color: [0.004, 0.008, 0.016, 1.0],
            },
        )
        .back_faced(),
    );
    node
}

#[cfg(test)]
mod tests {
    use super::{GlobeParams, spawn_background, spawn_globe};
    use crate::SceneGraph;
    use crate::components::{Material, Side, TextureSlot};

    #[test]
    fn spawns_globe_and_glow_shell() {
        let mut graph = SceneGraph::new();
        let handle = spawn_globe(&mut graph, &GlobeParams::default(), TextureSlot::GlobeSurface);

        let drawables = graph.drawables();
        assert_eq!(drawables.len(), 2);
        assert_eq!(drawables[0].0, handle.globe);
        assert_eq!(drawables[0].2.texture_slot(), Some(TextureSlot::GlobeSurface));

        let glow = drawables[1];
        assert_eq!(glow.0, handle.glow);
        assert_eq!(glow.2.side, Side::Back);
        assert!(matches!(glow.2.material, Material::Glow { .. }));
        assert!((glow.1.scale[0] - 1.1).abs() < 1e-12);
    }

    #[test]
    fn background_faces_inward() {
        let mut graph = SceneGraph::new();
        let node = spawn_background(&mut graph, 90.0, 32, TextureSlot::Starfield);
        let drawables = graph.drawables();
        assert_eq!(drawables[0].0, node);
        assert_eq!(drawables[0].2.side, Side::Back);
    }
}
