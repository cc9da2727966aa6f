use geojson::{Feature, Geometry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoiSource {
    Geocoded,
    QueryCoordinates,
    Default,
}

/// Region of interest: a GeoJSON Feature whose geometry is a Polygon,
/// MultiPolygon or Point, carrying `area_km2` and `name` as properties.
#[derive(Debug, Clone, Serialize)]
pub struct Roi {
    pub geometry: Geometry,
    pub area_km2: f64,
    pub name: String,
}

impl Roi {
    pub fn new(geometry: Geometry, area_km2: f64, name: impl Into<String>) -> Self {
        Self {
            geometry,
            area_km2,
            name: name.into(),
        }
    }

    /// Renders the ROI as a GeoJSON Feature per the `ROI` shape.
    pub fn to_feature(&self) -> Feature {
        let mut properties = geojson::JsonObject::new();
        properties.insert("area_km2".to_string(), self.area_km2.into());
        properties.insert("name".to_string(), self.name.clone().into());
        Feature {
            bbox: None,
            geometry: Some(self.geometry.clone()),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// A polygonal subset of an ROI produced to keep per-call pixel counts within
/// the imagery backend's limits. Purely transient: lifetime is one request.
#[derive(Debug, Clone, Serialize)]
pub struct Tile {
    pub tile_id: usize,
    pub geometry: Geometry,
    pub area_km2: f64,
}

/// Ordered sequence of tiles; ordering by `tile_id` is relied on by the merge
/// step to keep output deterministic regardless of completion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TileSet {
    pub tiles: Vec<Tile>,
}

impl TileSet {
    pub fn single(roi: &Roi) -> Self {
        Self {
            tiles: vec![Tile {
                tile_id: 0,
                geometry: roi.geometry.clone(),
                area_km2: roi.area_km2,
            }],
        }
    }

    pub fn total_area_km2(&self) -> f64 {
        self.tiles.iter().map(|t| t.area_km2).sum()
    }

    pub fn is_tiled(&self) -> bool {
        self.tiles.len() > 1
    }
}
