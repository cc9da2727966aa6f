//! Equal-area ROI tiling: when the ROI exceeds an indicator's area
//! budget, split its bounding box into a grid and keep the cells that touch
//! the ROI, each clipped to the overlap of the cell's and the ROI's own
//! bounding boxes — a conservative, boolean-ops-free clip:
//! no cell can extend past the ROI's extent, but a cell is not trimmed to
//! the ROI's exact polygon boundary.

use geo::{Contains, Coord, Intersects, Polygon, Rect};

use crate::domain::{Roi, Tile, TileSet};
use crate::geoutil;

/// Splits `roi` into tiles whose individual area does not exceed
/// `budget_km2`. Returns a single tile covering the whole ROI when it
/// already fits.
pub fn build_tiles(roi: &Roi, polygon: &Polygon<f64>, budget_km2: f64) -> TileSet {
    if roi.area_km2 <= budget_km2 || budget_km2 <= 0.0 {
        return TileSet::single(roi);
    }

    let Some((min, max)) = geoutil::bbox_of_geometry(&roi.geometry) else {
        return TileSet::single(roi);
    };

    let bbox_width = max.0 - min.0;
    let bbox_height = max.1 - min.1;
    if bbox_width <= 0.0 || bbox_height <= 0.0 {
        return TileSet::single(roi);
    }

    // bbox_area / (rows*cols) <= budget, rows == cols for a roughly square
    // grid over the bounding box.
    let grid_count = (roi.area_km2 / budget_km2).ceil().max(1.0);
    let side = grid_count.sqrt().ceil().max(1.0) as usize;

    let cell_width = bbox_width / side as f64;
    let cell_height = bbox_height / side as f64;
    let roi_bbox = Rect::new(
        Coord { x: min.0, y: min.1 },
        Coord { x: max.0, y: max.1 },
    );

    let mut tiles = Vec::new();
    let mut tile_id = 0usize;

    // Scan order: west -> east, south -> north.
    for row in 0..side {
        for col in 0..side {
            let cell_min_x = min.0 + col as f64 * cell_width;
            let cell_min_y = min.1 + row as f64 * cell_height;
            let cell_max_x = cell_min_x + cell_width;
            let cell_max_y = cell_min_y + cell_height;

            let cell_rect = Rect::new(
                Coord {
                    x: cell_min_x,
                    y: cell_min_y,
                },
                Coord {
                    x: cell_max_x,
                    y: cell_max_y,
                },
            );
            let cell_polygon = cell_rect.to_polygon();

            // A cell whose bbox doesn't touch the ROI at all, or whose
            // center falls clearly outside the ROI polygon, is dropped.
            let center = Coord {
                x: (cell_min_x + cell_max_x) / 2.0,
                y: (cell_min_y + cell_max_y) / 2.0,
            };
            if !cell_rect.intersects(&roi_bbox) || !(polygon.contains(&center) || cell_polygon.intersects(polygon)) {
                continue;
            }

            // Conservative clip: overlap of the two bounding boxes, not a
            // true polygon clip.
            let clip_min_x = cell_min_x.max(min.0);
            let clip_min_y = cell_min_y.max(min.1);
            let clip_max_x = cell_max_x.min(max.0);
            let clip_max_y = cell_max_y.min(max.1);
            if clip_max_x <= clip_min_x || clip_max_y <= clip_min_y {
                continue;
            }

            let clipped = Rect::new(
                Coord {
                    x: clip_min_x,
                    y: clip_min_y,
                },
                Coord {
                    x: clip_max_x,
                    y: clip_max_y,
                },
            )
            .to_polygon();

            let area_km2 = geoutil::area_km2_of_geo(&geo::Geometry::Polygon(clipped.clone()));
            if area_km2 <= 0.0 {
                continue;
            }

            tiles.push(Tile {
                tile_id,
                geometry: geoutil::from_geo(&geo::Geometry::Polygon(clipped)),
                area_km2,
            });
            tile_id += 1;
        }
    }

    if tiles.is_empty() {
        return TileSet::single(roi);
    }

    TileSet { tiles }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::LineString;

    fn square_roi(side_deg: f64) -> (Roi, Polygon<f64>) {
        let polygon = Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (side_deg, 0.0),
                (side_deg, side_deg),
                (0.0, side_deg),
                (0.0, 0.0),
            ]),
            vec![],
        );
        let geometry = geoutil::from_geo(&geo::Geometry::Polygon(polygon.clone()));
        let area_km2 = geoutil::area_km2_of_geo(&geo::Geometry::Polygon(polygon.clone()));
        (Roi::new(geometry, area_km2, "test"), polygon)
    }

    #[test]
    fn small_roi_is_not_tiled() {
        let (roi, polygon) = square_roi(0.1);
        let tiles = build_tiles(&roi, &polygon, 5_000.0);
        assert!(!tiles.is_tiled());
    }

    #[test]
    fn large_roi_is_tiled_and_covers_total_area() {
        let (roi, polygon) = square_roi(5.0);
        let tiles = build_tiles(&roi, &polygon, roi.area_km2 / 9.0 - 1.0);
        assert!(tiles.is_tiled());
        let total: f64 = tiles.total_area_km2();
        assert!((total - roi.area_km2).abs() / roi.area_km2 < 0.05);
    }

    #[test]
    fn tile_ids_are_sequential_from_zero() {
        let (roi, polygon) = square_roi(5.0);
        let tiles = build_tiles(&roi, &polygon, roi.area_km2 / 9.0 - 1.0);
        for (expected, tile) in tiles.tiles.iter().enumerate() {
            assert_eq!(tile.tile_id, expected);
        }
    }
}
