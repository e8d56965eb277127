use tracing::debug;

use crate::camera::CameraRig;

/// Anything that must track the drawing-buffer size: the 3D surface, the label canvas.
pub trait RenderTarget {
    fn set_size(&mut self, width_px: u32, height_px: u32, pixel_ratio: f64);
}

/// Window size as reported by the host, in CSS pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
    pub device_pixel_ratio: f64,
}

impl ViewportSize {
    pub fn new(width: f64, height: f64, device_pixel_ratio: f64) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio,
        }
    }
}

/// The sizes actually applied after sanitizing and capping.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AppliedViewport {
    pub css_width: f64,
    pub css_height: f64,
    pub pixel_ratio: f64,
    pub width_px: u32,
    pub height_px: u32,
    pub aspect: f64,
}

impl AppliedViewport {
    fn from_size(size: ViewportSize, max_pixel_ratio: f64) -> Self {
        let css_width = positive_or(size.width, 1.0).max(1.0);
        let css_height = positive_or(size.height, 1.0).max(1.0);
        let pixel_ratio = positive_or(size.device_pixel_ratio, 1.0).min(max_pixel_ratio);
        Self {
            css_width,
            css_height,
            pixel_ratio,
            width_px: (css_width * pixel_ratio).round().max(1.0) as u32,
            height_px: (css_height * pixel_ratio).round().max(1.0) as u32,
            aspect: css_width / css_height,
        }
    }
}

fn positive_or(v: f64, fallback: f64) -> f64 {
    if v.is_finite() && v > 0.0 { v } else { fallback }
}

/// Keeps camera aspect and every render target in step with the window.
///
/// `on_resize` is a pure function of the reported size: repeating it with
/// the same size changes nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportManager {
    max_pixel_ratio: f64,
    current: Option<AppliedViewport>,
}

impl ViewportManager {
    pub fn new(max_pixel_ratio: f64) -> Self {
        Self {
            max_pixel_ratio: positive_or(max_pixel_ratio, 2.0),
            current: None,
        }
    }

    pub fn current(&self) -> Option<AppliedViewport> {
        self.current
    }

    pub fn css_size(&self) -> (f64, f64) {
        self.current
            .map(|v| (v.css_width, v.css_height))
            .unwrap_or((1.0, 1.0))
    }

    /// Returns the newly applied viewport, or `None` when nothing changed.
    pub fn on_resize(
        &mut self,
        size: ViewportSize,
        rig: &mut CameraRig,
        targets: &mut [&mut dyn RenderTarget],
    ) -> Option<AppliedViewport> {
        let next = AppliedViewport::from_size(size, self.max_pixel_ratio);
        if self.current == Some(next) {
            return None;
        }

        rig.set_aspect(next.aspect);
        for target in targets.iter_mut() {
            target.set_size(next.width_px, next.height_px, next.pixel_ratio);
        }
        debug!(
            width_px = next.width_px,
            height_px = next.height_px,
            pixel_ratio = next.pixel_ratio,
            "viewport resized"
        );
        self.current = Some(next);
        Some(next)
    }
}

impl Default for ViewportManager {
    fn default() -> Self {
        Self::new(2.0)
    }
}
