use async_trait::async_trait;
use geojson::{Geometry, Value as GeoValue};
use serde::Deserialize;
use tracing::warn;

use crate::domain::ResolvedLocation;
use crate::error::{ApiError, ErrorType};
use crate::geoutil;

use super::Geocoder;

/// Canonical `Geocoder` adapter: Nominatim-style GET, honoring the
/// highest-importance / smaller-area tie-break and the oversized-geometry
/// rejection rule.
pub struct NominatimClient {
    http: reqwest::Client,
    base_url: String,
    max_area_km2: f64,
}

impl NominatimClient {
    pub fn new(http: reqwest::Client, base_url: String, max_area_km2: f64) -> Self {
        Self {
            http,
            base_url,
            max_area_km2,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NominatimResult {
    display_name: String,
    lat: String,
    lon: String,
    #[serde(default)]
    importance: f64,
    #[serde(default)]
    geojson: Option<GeoValue>,
    place_id: Option<i64>,
    osm_id: Option<i64>,
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn search(
        &self,
        query: &str,
        country_code: Option<&str>,
        limit: u32,
    ) -> Result<Vec<ResolvedLocation>, ApiError> {
        let mut url = format!(
            "{}/search?q={}&format=jsonv2&polygon_geojson=1&limit={}",
            self.base_url,
            urlencoding::encode(query),
            limit.max(1)
        );
        if let Some(cc) = country_code {
            url.push_str(&format!("&countrycodes={}", urlencoding::encode(cc)));
        }

        let response = self
            .http
            .get(&url)
            .header("User-Agent", "geoqa/0.1 (contact: ops@example.com)")
            .send()
            .await
            .map_err(|e| ApiError::new(ErrorType::BackendUnavailable, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ApiError::new(
                ErrorType::BackendUnavailable,
                format!("Nominatim returned status {}", response.status()),
            ));
        }

        let results: Vec<NominatimResult> = response
            .json()
            .await
            .map_err(|e| ApiError::new(ErrorType::BackendUnavailable, e.to_string()))?;

        let mut resolved: Vec<ResolvedLocation> = Vec::new();
        for result in results {
            let Ok(lat) = result.lat.parse::<f64>() else {
                continue;
            };
            let Ok(lng) = result.lon.parse::<f64>() else {
                continue;
            };

            let geometry = match &result.geojson {
                Some(value) => Geometry::new(value.clone()),
                None => geoutil::from_geo(&geo::Geometry::Polygon(geoutil::buffer_box(
                    lng, lat, 5.0,
                ))),
            };

            let area_km2 = geoutil::area_km2(&geometry);
            if area_km2 > self.max_area_km2 {
                warn!(
                    area_km2,
                    max = self.max_area_km2,
                    "rejecting oversized geocoded geometry"
                );
                continue;
            }

            let place_id = result
                .place_id
                .or(result.osm_id)
                .map(|id| id.to_string())
                .unwrap_or_default();

            resolved.push(ResolvedLocation {
                display_name: result.display_name,
                center: (lng, lat),
                geometry,
                area_km2,
                importance: result.importance,
                place_id,
            });
        }

        // Highest importance wins; ties broken by smaller area.
        resolved.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    a.area_km2
                        .partial_cmp(&b.area_km2)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });

        Ok(resolved.into_iter().take(1).collect())
    }
}
