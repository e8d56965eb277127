pub mod clock;
pub mod frame;
pub mod load_gate;
pub mod render_loop;

pub use clock::*;
pub use frame::*;
pub use load_gate::*;
pub use render_loop::*;
