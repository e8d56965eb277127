use foundation::math::Vec3;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointLight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub range: f64,
    /// Camera-relative when `follows_camera`, otherwise world space.
    pub position: Vec3,
    pub follows_camera: bool,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AmbientLight {
    pub color: [f32; 3],
    pub intensity: f32,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LightRig {
    pub key: PointLight,
    pub ambient: AmbientLight,
}

/// `0xRRGGBB` to linear-ish float RGB.
pub fn rgb_from_hex(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

impl Default for LightRig {
    fn default() -> Self {
        Self {
            key: PointLight {
                color: rgb_from_hex(0xf3edba),
                intensity: 1.8,
                range: 100.0,
                position: Vec3::new(-10.0, 6.0, 16.0),
                follows_camera: true,
            },
            ambient: AmbientLight {
                color: [1.0, 1.0, 1.0],
                intensity: 0.1,
            },
        }
    }
}
