use foundation::math::Vec3;

use crate::entity::MarkerId;

#[derive(Debug, Clone, PartialEq)]
pub struct LabelStyle {
    /// CSS font shorthand for the 2D overlay.
    pub font: String,
    pub color: [f32; 4],
    pub halo_color: [f32; 4],
    pub halo_width_px: f32,
    /// Screen-space offset from the projected anchor.
    pub offset_px: [f32; 2],
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            font: "14px sans-serif".to_string(),
            color: [1.0, 1.0, 1.0, 0.92],
            halo_color: [0.0, 0.0, 0.0, 0.85],
            halo_width_px: 3.5,
            offset_px: [6.0, -10.0],
        }
    }
}

/// The single floating hover label. At most one is ever visible.
///
/// `anchor` lives in the globe's local frame so the label turns with the globe.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabelOverlay {
    text: String,
    anchor: Vec3,
    marker: Option<MarkerId>,
    visible: bool,
}

impl LabelOverlay {
    pub fn show(&mut self, text: &str, anchor: Vec3, marker: Option<MarkerId>) {
        if self.text != text {
            self.text.clear();
            self.text.push_str(text);
        }
        self.anchor = anchor;
        self.marker = marker;
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
        self.marker = None;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Text of the visible label, if any.
    pub fn visible_text(&self) -> Option<&str> {
        self.visible.then_some(self.text.as_str())
    }

    pub fn anchor(&self) -> Vec3 {
        self.anchor
    }

    pub fn marker(&self) -> Option<MarkerId> {
        self.marker
    }
}
