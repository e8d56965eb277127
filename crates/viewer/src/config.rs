//! Per-instance viewer configuration.
//!
//! Hosts pass a (possibly partial) JSON object; missing fields keep their
//! defaults. The config is owned by one viewer and never shared.

use foundation::math::Vec3;
use gpu::{PerspectiveCamera, ZoomLimits};
use gpu::orbit::OrbitParams;
use scene::MarkerStyle;
use scene::components::{AmbientLight, LightRig, PointLight, rgb_from_hex};
use scene::labels::LabelStyle;
use scene::prefabs::GlobeParams;
use serde::{Deserialize, Serialize};

use crate::error::ViewerError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_deg: f64,
    pub near: f64,
    pub far: f64,
    pub position: [f64; 3],
    pub fov_step_deg: f64,
    pub min_fov_deg: f64,
    pub max_fov_deg: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Exponential orbit damping rate per second.
    pub orbit_damping: f64,
    pub rotate_speed: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_deg: 47.5,
            near: 0.1,
            far: 110.0,
            position: [0.0, 1.0, 10.0],
            fov_step_deg: 5.0,
            min_fov_deg: 20.0,
            max_fov_deg: 75.0,
            min_zoom: 0.5,
            max_zoom: 4.0,
            orbit_damping: 3.0,
            rotate_speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    /// `0xRRGGBB`.
    pub key_color: u32,
    pub key_intensity: f32,
    pub key_range: f64,
    /// Offset from the camera.
    pub key_position: [f64; 3],
    pub ambient_intensity: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            key_color: 0xf3edba,
            key_intensity: 1.8,
            key_range: 100.0,
            key_position: [-10.0, 6.0, 16.0],
            ambient_intensity: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobeConfig {
    pub globe_radius: f64,
    pub sphere_segments: u32,
    pub glow_scale: f64,
    pub glow_color: [f32; 3],
    pub glow_intensity: f32,
    pub glow_power: f32,
    pub background_radius: f64,
    pub marker_radius: f64,
    pub marker_color: [f32; 4],
    /// Hover labels sit at `globe_radius * label_lift`.
    pub label_lift: f64,
    pub label_font: String,
    /// Radians per second while idle.
    pub auto_rotate_speed: f64,
    pub max_pixel_ratio: f64,
    pub globe_texture: String,
    pub background_texture: String,
    pub camera: CameraConfig,
    pub lights: LightConfig,
}

impl Default for GlobeConfig {
    fn default() -> Self {
        Self {
            globe_radius: 3.0,
            sphere_segments: 64,
            glow_scale: 1.1,
            glow_color: [0.64, 0.85, 0.85],
            glow_intensity: 0.8,
            glow_power: 12.0,
            background_radius: 90.0,
            marker_radius: 0.04,
            marker_color: [1.0, 0.25, 0.25, 0.95],
            label_lift: 1.07,
            label_font: "14px sans-serif".to_string(),
            auto_rotate_speed: 0.1,
            max_pixel_ratio: 2.0,
            globe_texture: "/Albedo-diffuse.jpg".to_string(),
            background_texture: "/starfield.jpg".to_string(),
            camera: CameraConfig::default(),
            lights: LightConfig::default(),
        }
    }
}

impl GlobeConfig {
    /// Parse host JSON; an empty string yields the defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ViewerError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self =
            serde_json::from_str(json).map_err(|e| ViewerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ViewerError> {
        fn positive(name: &str, v: f64) -> Result<(), ViewerError> {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(ViewerError::Config(format!("{name} must be positive, got {v}")))
            }
        }

        positive("globe_radius", self.globe_radius)?;
        positive("glow_scale", self.glow_scale)?;
        positive("background_radius", self.background_radius)?;
        positive("marker_radius", self.marker_radius)?;
        positive("label_lift", self.label_lift)?;
        positive("max_pixel_ratio", self.max_pixel_ratio)?;
        positive("camera.near", self.camera.near)?;
        positive("camera.fov_step_deg", self.camera.fov_step_deg)?;
        positive("camera.min_zoom", self.camera.min_zoom)?;
        if !self.auto_rotate_speed.is_finite() {
            return Err(ViewerError::Config("auto_rotate_speed must be finite".to_string()));
        }
        if self.sphere_segments < 3 {
            return Err(ViewerError::Config(format!(
                "sphere_segments must be at least 3, got {}",
                self.sphere_segments
            )));
        }

        let cam = &self.camera;
        if cam.far <= cam.near {
            return Err(ViewerError::Config(format!(
                "camera.far ({}) must exceed camera.near ({})",
                cam.far, cam.near
            )));
        }
        if !(cam.min_fov_deg > 0.0 && cam.min_fov_deg < cam.max_fov_deg && cam.max_fov_deg < 180.0) {
            return Err(ViewerError::Config(format!(
                "fov clamp [{}, {}] must satisfy 0 < min < max < 180",
                cam.min_fov_deg, cam.max_fov_deg
            )));
        }
        if !(cam.min_fov_deg..=cam.max_fov_deg).contains(&cam.fov_deg) {
            return Err(ViewerError::Config(format!(
                "camera.fov_deg {} outside [{}, {}]",
                cam.fov_deg, cam.min_fov_deg, cam.max_fov_deg
            )));
        }
        if cam.min_zoom > cam.max_zoom {
            return Err(ViewerError::Config(format!(
                "zoom clamp [{}, {}] is empty",
                cam.min_zoom, cam.max_zoom
            )));
        }
        if self.background_radius >= cam.far {
            return Err(ViewerError::Config(format!(
                "background_radius {} lies beyond camera.far {}",
                self.background_radius, cam.far
            )));
        }
        Ok(())
    }

    pub fn globe_params(&self) -> GlobeParams {
        GlobeParams {
            radius: self.globe_radius,
            segments: self.sphere_segments,
            glow_scale: self.glow_scale,
            glow_color: self.glow_color,
            glow_intensity: self.glow_intensity,
            glow_power: self.glow_power,
            ..GlobeParams::default()
        }
    }

    pub fn marker_style(&self) -> MarkerStyle {
        MarkerStyle {
            radius: self.marker_radius,
            color: self.marker_color,
            ..MarkerStyle::default()
        }
    }

    pub fn label_style(&self) -> LabelStyle {
        LabelStyle {
            font: self.label_font.clone(),
            ..LabelStyle::default()
        }
    }

    pub fn light_rig(&self) -> LightRig {
        let [x, y, z] = self.lights.key_position;
        LightRig {
            key: PointLight {
                color: rgb_from_hex(self.lights.key_color),
                intensity: self.lights.key_intensity,
                range: self.lights.key_range,
                position: Vec3::new(x, y, z),
                follows_camera: true,
            },
            ambient: AmbientLight {
                color: [1.0, 1.0, 1.0],
                intensity: self.lights.ambient_intensity,
            },
        }
    }

    pub fn zoom_limits(&self) -> ZoomLimits {
        ZoomLimits {
            fov_step_deg: self.camera.fov_step_deg,
            min_fov_deg: self.camera.min_fov_deg,
            max_fov_deg: self.camera.max_fov_deg,
            min_zoom: self.camera.min_zoom,
            max_zoom: self.camera.max_zoom,
        }
    }

    pub fn orbit_params(&self) -> OrbitParams {
        OrbitParams {
            rotate_speed: self.camera.rotate_speed,
            damping: self.camera.orbit_damping,
            ..OrbitParams::default()
        }
    }

    pub fn camera(&self, aspect: f64) -> PerspectiveCamera {
        let mut camera =
            PerspectiveCamera::new(self.camera.fov_deg, aspect, self.camera.near, self.camera.far);
        let [x, y, z] = self.camera.position;
        camera.set_position(Vec3::new(x, y, z));
        camera
    }
}
