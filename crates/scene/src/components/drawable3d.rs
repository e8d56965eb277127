/// Texture binding points the backend resolves to loaded images.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    GlobeSurface,
    Starfield,
}

/// Which faces of a closed mesh are rasterized.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Side {
    Front,
    Back,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Material {
    /// Lit surface sampling `slot`; renders as `fallback_color` until the texture exists.
    Textured {
        slot: TextureSlot,
        fallback_color: [f32; 4],
    },
    /// Additive rim glow: `color * pow(intensity - dot(n, view), power)`.
    Glow {
        color: [f32; 3],
        intensity: f32,
        power: f32,
    },
    Unlit {
        color: [f32; 4],
    },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Shape3D {
    Sphere { radius: f64, segments: u32 },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Drawable3D {
    pub shape: Shape3D,
    pub material: Material,
    pub side: Side,
}

impl Drawable3D {
    pub fn sphere(radius: f64, segments: u32, material: Material) -> Self {
        Self {
            shape: Shape3D::Sphere { radius, segments },
            material,
            side: Side::Front,
        }
    }

    pub fn back_faced(mut self) -> Self {
        self.side = Side::Back;
        self
    }

    pub fn texture_slot(&self) -> Option<TextureSlot> {
        match self.material {
            Material::Textured { slot, .. } => Some(slot),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Drawable3D, Material, Shape3D, Side, TextureSlot};

    #[test]
    fn create_sphere_drawable() {
        let drawable = Drawable3D::sphere(
            1.5,
            32,
            Material::Unlit {
                color: [1.0, 0.0, 0.0, 1.0],
            },
        );
        assert!(matches!(drawable.shape, Shape3D::Sphere { .. }));
        assert_eq!(drawable.side, Side::Front);
        assert_eq!(drawable.texture_slot(), None);
    }

    #[test]
    fn back_faced_keeps_material() {
        let drawable = Drawable3D::sphere(
            90.0,
            32,
            Material::Textured {
                slot: TextureSlot::Starfield,
                fallback_color: [0.0, 0.0, 0.0, 1.0],
            },
        )
        .back_faced();
        assert_eq!(drawable.side, Side::Back);
        assert_eq!(drawable.texture_slot(), Some(TextureSlot::Starfield));
    }
}
