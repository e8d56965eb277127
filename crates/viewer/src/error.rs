use std::fmt;

use foundation::math::GeoRangeError;
use runtime::{AssetError, LoopError};

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerError {
    /// A POI could not be placed on the globe.
    InvalidPoint {
        label: String,
        source: GeoRangeError,
    },
    Loop(LoopError),
    Asset(AssetError),
    Config(String),
}

impl fmt::Display for ViewerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerError::InvalidPoint { label, source } => {
                write!(f, "invalid point {label:?}: {source}")
            }
            ViewerError::Loop(e) => write!(f, "render loop: {e}"),
            ViewerError::Asset(e) => write!(f, "asset: {e}"),
            ViewerError::Config(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ViewerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ViewerError::InvalidPoint { source, .. } => Some(source),
            ViewerError::Loop(e) => Some(e),
            ViewerError::Asset(e) => Some(e),
            ViewerError::Config(_) => None,
        }
    }
}

impl From<LoopError> for ViewerError {
    fn from(e: LoopError) -> Self {
        ViewerError::Loop(e)
    }
}

impl From<AssetError> for ViewerError {
    fn from(e: AssetError) -> Self {
        ViewerError::Asset(e)
    }
}
