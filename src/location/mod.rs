//! LocationParser: NER over the query, geocoding of each entity, and
//! literal-coordinate recognition, merged into a single primary ROI.

mod gazetteer;

use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::backends::{EntityExtractor, Geocoder};
use crate::domain::{
    LocationEntity, LocationEntityType, LocationParseResult, Query, ResolvedLocation, RoiSource,
};
use crate::geoutil;

/// Default fallback when nothing else resolves: Mumbai, 10 km buffer.
const DEFAULT_LOCATION_NAME: &str = "Mumbai, India";
const DEFAULT_LOCATION_LNG: f64 = 72.8777;
const DEFAULT_LOCATION_LAT: f64 = 19.0760;
const DEFAULT_BUFFER_KM: f64 = 10.0;

/// Literal coordinate buffer: 10 km radius box.
const COORDINATE_BUFFER_KM: f64 = 10.0;

static COORDINATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(-?\d+\.?\d*)\s*,\s*(-?\d+\.?\d*)").unwrap());

pub struct LocationParser {
    extractor: Arc<dyn EntityExtractor>,
    geocoder: Arc<dyn Geocoder>,
    geocode_timeout: Duration,
}

impl LocationParser {
    pub fn new(
        extractor: Arc<dyn EntityExtractor>,
        geocoder: Arc<dyn Geocoder>,
        geocode_timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            geocoder,
            geocode_timeout,
        }
    }

    pub async fn parse(&self, query: &Query) -> LocationParseResult {
        let start = Instant::now();
        debug!(query = %query.text, "location_parser:start");

        let coordinate_location = parse_coordinates(&query.text);

        let (mut entities, ner_failed) = match self.extractor.extract(&query.text).await {
            Ok(entities) => (entities, false),
            Err(e) => {
                warn!(error = %e, "entity extractor transport error, falling back to gazetteer");
                (gazetteer::scan(&query.text), true)
            }
        };

        if let Some((lat, lng)) = coordinate_location {
            entities.push(LocationEntity {
                matched_name: format!("Coordinates ({lat:.4}, {lng:.4})"),
                kind: LocationEntityType::Point,
                confidence: 1.0,
            });
        }

        if ner_failed && entities.is_empty() {
            let elapsed = start.elapsed();
            warn!("location_parser:failed no NER fallback and no coordinates");
            return LocationParseResult::empty_failure(
                "entity extraction unavailable and no fallback location found",
                elapsed,
            );
        }

        // Geocode every non-coordinate entity concurrently, each under its own deadline.
        let geocode_futures = entities.iter().map(|entity| {
            let geocoder = Arc::clone(&self.geocoder);
            let timeout = self.geocode_timeout;
            let matched_name = entity.matched_name.clone();
            async move {
                if matched_name.starts_with("Coordinates (") {
                    return None;
                }
                match tokio::time::timeout(timeout, geocoder.search(&matched_name, None, 1)).await
                {
                    Ok(Ok(mut locations)) if !locations.is_empty() => Some(locations.remove(0)),
                    Ok(Ok(_)) => None,
                    Ok(Err(e)) => {
                        warn!(location = %matched_name, error = %e, "geocoding failed");
                        None
                    }
                    Err(_) => {
                        warn!(location = %matched_name, "geocoding timed out");
                        None
                    }
                }
            }
        });
        let geocoded: Vec<Option<ResolvedLocation>> =
            futures::future::join_all(geocode_futures).await;

        let mut resolved_locations = Vec::new();
        let mut best: Option<(f64, ResolvedLocation, RoiSource)> = None;

        for (entity, resolved) in entities.iter().zip(geocoded.into_iter()) {
            let Some(resolved) = resolved else { continue };
            let score = entity.confidence * resolved.importance;
            if best.as_ref().map(|(s, ..)| score > *s).unwrap_or(true) {
                best = Some((score, resolved.clone(), RoiSource::Geocoded));
            }
            resolved_locations.push(resolved);
        }

        // Literal coordinates stand on their own, independent of geocoding,
        // and win ties per the hybrid precedence rule.
        if let Some((lat, lng)) = coordinate_location {
            let geometry = geoutil::from_geo(&geo::Geometry::Polygon(geoutil::buffer_box(
                lng,
                lat,
                COORDINATE_BUFFER_KM,
            )));
            let area_km2 = geoutil::area_km2(&geometry);
            let coordinate_resolved = ResolvedLocation {
                display_name: format!("Coordinates ({lat:.4}, {lng:.4})"),
                center: (lng, lat),
                geometry,
                area_km2,
                importance: 1.0,
                place_id: "coordinates".to_string(),
            };
            let score = 1.0;
            if best.as_ref().map(|(s, ..)| score >= *s).unwrap_or(true) {
                best = Some((score, coordinate_resolved.clone(), RoiSource::QueryCoordinates));
            }
            resolved_locations.push(coordinate_resolved);
        }

        let elapsed = start.elapsed();

        let (primary_location, roi_geometry, roi_source) = match best {
            Some((_, resolved, source)) => {
                let geometry = resolved.geometry.clone();
                (Some(resolved), Some(geometry), source)
            }
            None => {
                let geometry = geoutil::from_geo(&geo::Geometry::Polygon(geoutil::buffer_box(
                    DEFAULT_LOCATION_LNG,
                    DEFAULT_LOCATION_LAT,
                    DEFAULT_BUFFER_KM,
                )));
                let area_km2 = geoutil::area_km2(&geometry);
                let default_location = ResolvedLocation {
                    display_name: DEFAULT_LOCATION_NAME.to_string(),
                    center: (DEFAULT_LOCATION_LNG, DEFAULT_LOCATION_LAT),
                    geometry: geometry.clone(),
                    area_km2,
                    importance: 0.0,
                    place_id: "default".to_string(),
                };
                (Some(default_location), Some(geometry), RoiSource::Default)
            }
        };

        info!(
            resolved = resolved_locations.len(),
            source = ?roi_source,
            elapsed_ms = elapsed.as_millis() as u64,
            "location_parser:done"
        );

        LocationParseResult {
            entities,
            resolved_locations,
            primary_location,
            roi_geometry,
            roi_source,
            success: true,
            processing_time: elapsed,
            error: None,
            error_type: None,
        }
    }
}

/// Parses a literal `"lat, lng"` pair out of free text, bounds-checked to
/// `[-90,90] x [-180,180]`. Returns `(lat, lng)`.
fn parse_coordinates(text: &str) -> Option<(f64, f64)> {
    for capture in COORDINATE_PATTERN.captures_iter(text) {
        let lat: f64 = capture.get(1)?.as_str().parse().ok()?;
        let lng: f64 = capture.get(2)?.as_str().parse().ok()?;
        if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) {
            return Some((lat, lng));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_coordinates() {
        assert_eq!(parse_coordinates("near 19.076, 72.8777 please"), Some((19.076, 72.8777)));
    }

    #[test]
    fn rejects_out_of_bounds_coordinates() {
        assert_eq!(parse_coordinates("200.5, 72.8777"), None);
    }

    #[test]
    fn ignores_text_with_no_coordinate_pair() {
        assert_eq!(parse_coordinates("NDVI for Mumbai"), None);
    }
}
