//! Geographic coordinates on a render sphere.
//!
//! The mapping matches an equirectangular texture wrapped on a UV sphere whose
//! seam sits at longitude 180°: latitude 90° is +Y, and longitude 0° faces +X
//! after the 180° offset is applied.

use std::fmt;

use super::Vec3;

/// Derived Cartesian position of a geographic point. Never persisted.
pub type CartesianPosition = Vec3;

/// Rejected projector input.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum GeoRangeError {
    Latitude(f64),
    Longitude(f64),
    Radius(f64),
    NonFinite,
}

impl fmt::Display for GeoRangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeoRangeError::Latitude(v) => write!(f, "latitude {v} outside [-90, 90]"),
            GeoRangeError::Longitude(v) => write!(f, "longitude {v} outside [-180, 180]"),
            GeoRangeError::Radius(v) => write!(f, "radius {v} must be positive"),
            GeoRangeError::NonFinite => write!(f, "non-finite coordinate"),
        }
    }
}

impl std::error::Error for GeoRangeError {}

/// A labeled geographic location in degrees.
///
/// Construction validates the range, so a `GeoPoint` always projects.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
    label: String,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64, label: impl Into<String>) -> Result<Self, GeoRangeError> {
        validate_lat_lon(latitude, longitude)?;
        Ok(Self {
            latitude,
            longitude,
            label: label.into(),
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Position on a sphere of `radius`.
    pub fn project(&self, radius: f64) -> Result<CartesianPosition, GeoRangeError> {
        project(self.latitude, self.longitude, radius)
    }
}

fn validate_lat_lon(lat_deg: f64, lon_deg: f64) -> Result<(), GeoRangeError> {
    if !lat_deg.is_finite() || !lon_deg.is_finite() {
        return Err(GeoRangeError::NonFinite);
    }
    if !(-90.0..=90.0).contains(&lat_deg) {
        return Err(GeoRangeError::Latitude(lat_deg));
    }
    if !(-180.0..=180.0).contains(&lon_deg) {
        return Err(GeoRangeError::Longitude(lon_deg));
    }
    Ok(())
}

/// Project latitude/longitude (degrees) onto a sphere of `radius`.
///
/// Out-of-range input is rejected, never clamped.
pub fn project(lat_deg: f64, lon_deg: f64, radius: f64) -> Result<CartesianPosition, GeoRangeError> {
    validate_lat_lon(lat_deg, lon_deg)?;
    if !radius.is_finite() {
        return Err(GeoRangeError::NonFinite);
    }
    if radius <= 0.0 {
        return Err(GeoRangeError::Radius(radius));
    }

    let phi = (90.0 - lat_deg).to_radians();
    let theta = (lon_deg + 180.0).to_radians();
    let (sin_phi, cos_phi) = phi.sin_cos();
    let (sin_theta, cos_theta) = theta.sin_cos();

    Ok(Vec3::new(
        -radius * sin_phi * cos_theta,
        radius * cos_phi,
        radius * sin_phi * sin_theta,
    ))
}
