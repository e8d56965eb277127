/// Per-node draw flag. A node is drawn only if it and every ancestor are visible.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Visibility {
    pub visible: bool,
}

impl Visibility {
    pub fn visible() -> Self {
        Self { visible: true }
    }

    pub fn hidden() -> Self {
        Self { visible: false }
    }

    /// Effective visibility under a parent whose effective visibility is `parent`.
    pub fn under(self, parent: Visibility) -> Visibility {
        Visibility {
            visible: self.visible && parent.visible,
        }
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Self::visible()
    }
}
