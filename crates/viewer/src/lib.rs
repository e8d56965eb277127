pub mod config;
pub mod error;
pub mod keys;
pub mod poi;
pub mod viewer;

pub use config::GlobeConfig;
pub use error::ViewerError;
pub use viewer::*;
