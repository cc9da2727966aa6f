use std::time::Duration;

use geojson::Geometry;
use serde::{Deserialize, Serialize};

use super::roi::RoiSource;
use crate::error::ErrorType;

/// Immutable input to the whole pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Query {
    pub text: String,
    pub session_id: Option<String>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            session_id: None,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationEntityType {
    City,
    State,
    District,
    Country,
    Point,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationEntity {
    pub matched_name: String,
    #[serde(rename = "type")]
    pub kind: LocationEntityType,
    pub confidence: f64,
}

/// A geocoded location. Created by the `Geocoder`, consumed by the dispatcher,
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedLocation {
    pub display_name: String,
    pub center: (f64, f64), // (lng, lat)
    pub geometry: Geometry,
    pub area_km2: f64,
    pub importance: f64,
    pub place_id: String,
}

impl ResolvedLocation {
    /// `area_km2 >= 0` and `center` lies inside `geometry`'s bounding box.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.area_km2 < 0.0 {
            return Err(format!("area_km2 must be >= 0, got {}", self.area_km2));
        }
        let (min, max) = crate::geoutil::bbox_of_geometry(&self.geometry)
            .ok_or_else(|| "geometry has no usable bounding box".to_string())?;
        let (lng, lat) = self.center;
        if lng < min.0 || lng > max.0 || lat < min.1 || lat > max.1 {
            return Err("center lies outside geometry bounding box".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationParseResult {
    pub entities: Vec<LocationEntity>,
    pub resolved_locations: Vec<ResolvedLocation>,
    pub primary_location: Option<ResolvedLocation>,
    pub roi_geometry: Option<Geometry>,
    pub roi_source: RoiSource,
    pub success: bool,
    pub processing_time: Duration,
    pub error: Option<String>,
    pub error_type: Option<ErrorType>,
}

impl LocationParseResult {
    pub fn empty_failure(error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            entities: Vec::new(),
            resolved_locations: Vec::new(),
            primary_location: None,
            roi_geometry: None,
            roi_source: RoiSource::Default,
            success: false,
            processing_time: elapsed,
            error: Some(error.into()),
            error_type: Some(ErrorType::NerUnavailable),
        }
    }
}
