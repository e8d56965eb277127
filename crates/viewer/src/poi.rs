//! POI ingestion from the host's event feed.
//!
//! Feed records look like
//! `{ id, title, description, categories: [{ id, title }], geometries: [{ date, type, coordinates }] }`.
//! Point coordinates are `[longitude, latitude]`; polygon coordinates are
//! nested rings and never become markers.

use foundation::math::GeoPoint;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ViewerError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Category {
    pub id: Value,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Geometry {
    #[serde(default)]
    pub date: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Value,
}

impl Geometry {
    /// `(lat, lon)` for a well-formed `Point`.
    fn point(&self) -> Option<(f64, f64)> {
        if self.kind != "Point" {
            return None;
        }
        let coords = self.coordinates.as_array()?;
        match coords.as_slice() {
            [lon, lat, ..] => Some((lat.as_f64()?, lon.as_f64()?)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PoiRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub geometries: Vec<Geometry>,
}

/// A bare point, for hosts that do not go through the event feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlainPoint {
    pub label: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PoiPayload {
    Wrapped { events: Vec<PoiRecord> },
    Records(Vec<PoiRecord>),
    Plain(Vec<PlainPoint>),
}

/// One point per record that has a `Point` geometry, in record order.
pub fn points_from_records(records: &[PoiRecord]) -> Result<Vec<GeoPoint>, ViewerError> {
    let mut points = Vec::with_capacity(records.len());
    for record in records {
        let Some((lat, lon)) = record.geometries.iter().find_map(Geometry::point) else {
            debug!(id = %record.id, title = %record.title, "record has no point geometry; skipped");
            continue;
        };
        let point = GeoPoint::new(lat, lon, record.title.clone()).map_err(|source| {
            ViewerError::InvalidPoint {
                label: record.title.clone(),
                source,
            }
        })?;
        points.push(point);
    }
    Ok(points)
}

/// Accepts a record array, `{ "events": [...] }`, or `[{ label, lat, lon }]`.
pub fn points_from_json(json: &str) -> Result<Vec<GeoPoint>, ViewerError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let payload: PoiPayload = serde_json::from_str(json)
        .map_err(|e| ViewerError::Config(format!("unrecognized POI payload: {e}")))?;
    match payload {
        PoiPayload::Wrapped { events } => points_from_records(&events),
        PoiPayload::Records(records) => points_from_records(&records),
        PoiPayload::Plain(plain) => plain
            .into_iter()
            .map(|p| {
                GeoPoint::new(p.lat, p.lon, p.label.clone()).map_err(|source| {
                    ViewerError::InvalidPoint {
                        label: p.label,
                        source,
                    }
                })
            })
            .collect(),
    }
}

/// Reference cities used for demos and the end-to-end check.
pub fn sample_points() -> Vec<GeoPoint> {
    const CITIES: [(&str, f64, f64); 10] = [
        ("Brussels", 50.85045, 4.34878),
        ("New York", 40.71427, -74.00597),
        ("London", 51.50853, -0.12574),
        ("Paris", 48.85341, 2.3488),
        ("Tokyo", 35.6895, 139.69171),
        ("Sydney", -33.86785, 151.20732),
        ("Rio de Janeiro", -22.90642, -43.18223),
        ("Cairo", 30.06263, 31.24967),
        ("Moscow", 55.75222, 37.61556),
        ("Cape Town", -33.92584, 18.42322),
    ];
    CITIES
        .iter()
        .filter_map(|&(label, lat, lon)| GeoPoint::new(lat, lon, label).ok())
        .collect()
}
