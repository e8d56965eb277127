pub mod camera;
pub mod mesh;
pub mod orbit;
pub mod renderer;
pub mod viewport;

pub use camera::*;
pub use renderer::*;
pub use viewport::*;
