//! Small geometry helpers shared across the location parser, dispatcher and
//! analysis engine. Built on `geo`/`geojson` rather than hand-rolled
//! trigonometry, following the geospatial crates the wider example pack
//! (`geoengine`, `buhera-west`) reaches for.

use geo::{BoundingRect, Coord, GeodesicArea, Geometry as GeoGeometry, Point, Polygon, Rect};
use geojson::Geometry;

/// Converts a GeoJSON geometry into its `geo-types` equivalent. Returns
/// `None` for geometry kinds geojson's conversion doesn't support (e.g. a
/// bare `GeometryCollection` with incompatible members).
pub fn to_geo(geometry: &Geometry) -> Option<GeoGeometry<f64>> {
    GeoGeometry::<f64>::try_from(geometry).ok()
}

pub fn from_geo(geometry: &GeoGeometry<f64>) -> Geometry {
    Geometry::from(geometry)
}

/// Bounding box `(min_lng, min_lat), (max_lng, max_lat)` of a geometry.
pub fn bbox_of_geometry(geometry: &Geometry) -> Option<((f64, f64), (f64, f64))> {
    let geo = to_geo(geometry)?;
    bbox_of_geo(&geo)
}

pub fn bbox_of_geo(geo: &GeoGeometry<f64>) -> Option<((f64, f64), (f64, f64))> {
    let rect: Rect<f64> = geo.bounding_rect()?;
    Some((
        (rect.min().x, rect.min().y),
        (rect.max().x, rect.max().y),
    ))
}

/// Geodesic area in square kilometers. MultiPolygons are summed; a Point has
/// zero area.
pub fn area_km2(geometry: &Geometry) -> f64 {
    let Some(geo) = to_geo(geometry) else {
        return 0.0;
    };
    area_km2_of_geo(&geo)
}

pub fn area_km2_of_geo(geo: &GeoGeometry<f64>) -> f64 {
    match geo {
        GeoGeometry::Polygon(p) => p.geodesic_area_unsigned() / 1_000_000.0,
        GeoGeometry::MultiPolygon(mp) => mp.geodesic_area_unsigned() / 1_000_000.0,
        _ => 0.0,
    }
}

/// Flattens a MultiPolygon into a single dissolved Polygon by taking the
/// polygon with the largest area and discarding the rest — a conservative
/// stand-in for a true union that keeps per-pixel reduction meaningful
/// without pulling in a full boolean-ops dependency.
pub fn dissolve_to_polygon(geo: &GeoGeometry<f64>) -> Option<Polygon<f64>> {
    match geo {
        GeoGeometry::Polygon(p) => Some(p.clone()),
        GeoGeometry::MultiPolygon(mp) => mp
            .0
            .iter()
            .max_by(|a, b| {
                a.geodesic_area_unsigned()
                    .partial_cmp(&b.geodesic_area_unsigned())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned(),
        _ => None,
    }
}

/// Builds a small square polygon of the given radius (km) centered on
/// `(lng, lat)`, used for literal-coordinate ROIs and the default fallback
/// location.
pub fn buffer_box(lng: f64, lat: f64, radius_km: f64) -> Polygon<f64> {
    let lat_rad = lat.to_radians();
    let dlat = radius_km / 111.0;
    let dlng = radius_km / (111.0 * lat_rad.cos().max(0.01));

    Polygon::new(
        vec![
            Coord {
                x: lng - dlng,
                y: lat - dlat,
            },
            Coord {
                x: lng + dlng,
                y: lat - dlat,
            },
            Coord {
                x: lng + dlng,
                y: lat + dlat,
            },
            Coord {
                x: lng - dlng,
                y: lat + dlat,
            },
            Coord {
                x: lng - dlng,
                y: lat - dlat,
            },
        ]
        .into(),
        vec![],
    )
}

pub fn point(lng: f64, lat: f64) -> Point<f64> {
    Point::new(lng, lat)
}
