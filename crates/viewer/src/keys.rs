/// What a bound key does. Both zoom keys step the fov through `CameraRig`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KeyAction {
    ZoomIn,
    ZoomOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindings {
    pub zoom_in: String,
    pub zoom_out: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            zoom_in: "z".to_string(),
            zoom_out: "e".to_string(),
        }
    }
}

impl KeyBindings {
    /// Match a DOM `KeyboardEvent.key` value, ignoring ASCII case.
    pub fn action_for(&self, key: &str) -> Option<KeyAction> {
        if key.eq_ignore_ascii_case(&self.zoom_in) {
            Some(KeyAction::ZoomIn)
        } else if key.eq_ignore_ascii_case(&self.zoom_out) {
            Some(KeyAction::ZoomOut)
        } else {
            None
        }
    }
}
