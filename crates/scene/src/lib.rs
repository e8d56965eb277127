pub mod components;
pub mod entity;
pub mod graph;
pub mod interaction;
pub mod labels;
pub mod picking;
pub mod prefabs;

pub use graph::*;
