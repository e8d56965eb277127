/// Slot index of a node inside a [`crate::SceneGraph`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(&self) -> u32 {
        self.0
    }
}

/// Position of a marker in insertion order. Stable for the session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(pub u32);

impl MarkerId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}
