//! AnalysisEngine — the hardest subsystem: ROI tiling, per-indicator
//! reductions, tile merging, UHI computation, tile-URL construction, grid
//! sampling and point sampling.

mod datasets;
mod merge;
mod reduce;
mod tiling;
mod uhi;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration as ChronoDuration, NaiveDate};
use geojson::{Feature, FeatureCollection};
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

pub use crate::backends::{ImageryBackend, ReduceOptions, VisParams};
use crate::domain::{
    AnalysisResult, GeometryType, Indicator, IndicatorStats, Roi, TileSet, TimeRange, UhiDetails,
    UhiMethod,
};
use crate::error::{ApiError, ErrorType};
use crate::geoutil;

use merge::{ContinuousTileStats, MergedContinuous};
use uhi::UhiCandidate;

/// `INIT -> BUILD_COMPOSITE -> (TILED_LOOP | SINGLE_REDUCE) -> MERGE ->
/// BUILD_TILES -> DONE`, with failure transitions from any state to
/// `FAILED(error_type)`. Tracked only for structured logging; the
/// engine doesn't branch on it beyond the natural control flow below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Init,
    BuildComposite,
    TiledLoop,
    SingleReduce,
    Merge,
    BuildTiles,
    Done,
}

pub struct AnalysisEngine {
    backend: Arc<dyn ImageryBackend>,
    grid_max_concurrency: usize,
}

impl AnalysisEngine {
    pub fn new(backend: Arc<dyn ImageryBackend>, grid_max_concurrency: usize) -> Self {
        Self {
            backend,
            grid_max_concurrency,
        }
    }

    pub async fn analyze_ndvi(&self, roi: &Roi, time_range: TimeRange) -> AnalysisResult {
        self.analyze_continuous(Indicator::Ndvi, roi, time_range).await
    }

    pub async fn analyze_lst(&self, roi: &Roi, time_range: TimeRange) -> AnalysisResult {
        self.analyze_continuous(Indicator::Lst, roi, time_range).await
    }

    pub async fn analyze_lulc(&self, roi: &Roi, time_range: TimeRange) -> AnalysisResult {
        self.analyze_discrete(Indicator::Lulc, roi, time_range).await
    }

    pub async fn analyze_water(&self, roi: &Roi, time_range: TimeRange) -> AnalysisResult {
        self.analyze_discrete(Indicator::Water, roi, time_range).await
    }

    async fn analyze_continuous(
        &self,
        indicator: Indicator,
        roi: &Roi,
        time_range: TimeRange,
    ) -> AnalysisResult {
        let start = Instant::now();
        let analysis_type = indicator.as_str().to_string();
        let mut state = EngineState::Init;
        debug!(?state, %analysis_type, "engine:start");

        let Some(polygon) = geoutil::to_geo(&roi.geometry).and_then(|g| geoutil::dissolve_to_polygon(&g))
        else {
            return AnalysisResult::failure(
                analysis_type,
                ErrorType::ProcessingError,
                "ROI geometry could not be resolved to a polygon",
                start.elapsed().as_secs_f64(),
            );
        };

        state = EngineState::BuildComposite;
        debug!(?state, "engine:state");

        let dataset_id = datasets::dataset_id(indicator);
        let budget_km2 = datasets::area_budget_km2(indicator);
        let base_scale_m = datasets::base_scale_m(indicator);
        let tiles = tiling::build_tiles(roi, &polygon, budget_km2);
        let geometry_type = if tiles.is_tiled() {
            GeometryType::TiledPolygon
        } else {
            GeometryType::SinglePolygon
        };
        state = if tiles.is_tiled() {
            EngineState::TiledLoop
        } else {
            EngineState::SingleReduce
        };
        debug!(?state, tile_count = tiles.tiles.len(), "engine:tiling");

        let (date_start, date_end) = match self
            .run_with_date_widening(indicator, &tiles, &polygon, dataset_id, base_scale_m, time_range)
            .await
        {
            Ok(result) => result,
            Err(error_type) => {
                return AnalysisResult::failure(
                    analysis_type,
                    error_type,
                    "no data available for the requested period",
                    start.elapsed().as_secs_f64(),
                );
            }
        };
        let _ = (date_start, date_end);

        let tile_reductions = match self
            .reduce_continuous_tiles(dataset_id, &tiles, &polygon, time_range, base_scale_m, indicator)
            .await
        {
            Ok(reductions) => reductions,
            Err(e) => {
                return AnalysisResult::failure(
                    analysis_type,
                    e.error_type,
                    e.message,
                    start.elapsed().as_secs_f64(),
                );
            }
        };

        state = EngineState::Merge;
        debug!(?state, "engine:state");
        let merged = merge::merge_continuous(&tile_reductions);

        let uhi = if indicator == Indicator::Lst {
            Some(self.compute_uhi(&polygon, time_range, dataset_id, &merged).await)
        } else {
            None
        };

        state = EngineState::BuildTiles;
        debug!(?state, "engine:state");
        let url_format = self
            .backend
            .get_map_id(dataset_id, datasets::vis_params(indicator))
            .await
            .map(|m| m.url_format)
            .unwrap_or_default();

        let vegetation_class_percentages = if indicator == Indicator::Ndvi {
            self.ndvi_vegetation_classes(&tiles, &polygon, dataset_id, time_range, base_scale_m)
                .await
        } else {
            HashMap::new()
        };

        state = EngineState::Done;
        let elapsed = start.elapsed().as_secs_f64();
        info!(?state, %analysis_type, elapsed, "engine:done");

        let map_stats = match indicator {
            Indicator::Ndvi => IndicatorStats::Ndvi {
                ndvi_mean: merged.mean.clamp(-1.0, 1.0),
                ndvi_min: merged.min.clamp(-1.0, 1.0),
                ndvi_max: merged.max.clamp(-1.0, 1.0),
                ndvi_std_dev: merged.std_dev,
                vegetation_class_percentages,
            },
            Indicator::Lst => {
                let (uhi_intensity, uhi_details) = match uhi {
                    Some((intensity, details)) => (Some(intensity), Some(details)),
                    None => (None, None),
                };
                IndicatorStats::Lst {
                    lst_mean: merged.mean,
                    lst_min: merged.min,
                    lst_max: merged.max,
                    lst_std_dev: merged.std_dev,
                    uhi_intensity,
                    uhi_details,
                }
            }
            _ => unreachable!("analyze_continuous only handles NDVI/LST"),
        };

        AnalysisResult {
            analysis_type,
            geometry_type,
            roi_area_km2: roi.area_km2,
            url_format,
            map_stats,
            datasets_used: vec![dataset_id.to_string()],
            processing_time_seconds: elapsed,
            metadata: json!({ "tile_count": tiles.tiles.len() }),
            success: true,
            error: None,
            error_type: None,
        }
    }

    async fn analyze_discrete(
        &self,
        indicator: Indicator,
        roi: &Roi,
        time_range: TimeRange,
    ) -> AnalysisResult {
        let start = Instant::now();
        let analysis_type = indicator.as_str().to_string();
        debug!(%analysis_type, "engine:start");

        let Some(polygon) = geoutil::to_geo(&roi.geometry).and_then(|g| geoutil::dissolve_to_polygon(&g))
        else {
            return AnalysisResult::failure(
                analysis_type,
                ErrorType::ProcessingError,
                "ROI geometry could not be resolved to a polygon",
                start.elapsed().as_secs_f64(),
            );
        };

        let dataset_id = datasets::dataset_id(indicator);
        let budget_km2 = datasets::area_budget_km2(indicator);
        let base_scale_m = datasets::base_scale_m(indicator);
        let tiles = tiling::build_tiles(roi, &polygon, budget_km2);
        let geometry_type = if tiles.is_tiled() {
            GeometryType::TiledPolygon
        } else {
            GeometryType::SinglePolygon
        };

        let classify: fn(f64) -> &'static str = match indicator {
            Indicator::Water => classify_water,
            _ => classify_lulc,
        };

        let mut per_tile = Vec::new();
        let mut simulated_metadata = false;
        for tile in &tiles.tiles {
            let Some(tile_geo) = geoutil::to_geo(&tile.geometry) else {
                continue;
            };
            let Some(tile_polygon) = geoutil::dissolve_to_polygon(&tile_geo) else {
                continue;
            };
            match reduce::reduce_histogram(
                &self.backend,
                dataset_id,
                &tile_polygon,
                time_range.start,
                time_range.end,
                base_scale_m,
                tile.area_km2,
                classify,
            )
            .await
            {
                Ok(result) => {
                    if result.method == "basic_stats" {
                        simulated_metadata = true;
                    }
                    per_tile.push((tile.area_km2, result.classes));
                }
                Err(e) => {
                    return AnalysisResult::failure(
                        analysis_type,
                        e.error_type,
                        e.message,
                        start.elapsed().as_secs_f64(),
                    );
                }
            }
        }

        if per_tile.is_empty() {
            return AnalysisResult::failure(
                analysis_type,
                ErrorType::NoData,
                "no data available for the requested period",
                start.elapsed().as_secs_f64(),
            );
        }

        let (class_percentages, normalized) = merge::merge_class_percentages(&per_tile);

        let url_format = self
            .backend
            .get_map_id(dataset_id, datasets::vis_params(indicator))
            .await
            .map(|m| m.url_format)
            .unwrap_or_default();

        let elapsed = start.elapsed().as_secs_f64();
        let mut metadata = json!({ "tile_count": tiles.tiles.len(), "normalized": normalized });

        let map_stats = match indicator {
            Indicator::Lulc => {
                let dominant_class = class_percentages
                    .iter()
                    .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(k, _)| k.clone())
                    .unwrap_or_default();
                let class_areas_km2: HashMap<String, f64> = class_percentages
                    .iter()
                    .map(|(k, pct)| (k.clone(), pct / 100.0 * roi.area_km2))
                    .collect();
                IndicatorStats::Lulc {
                    class_percentages,
                    class_areas_km2,
                    dominant_class,
                }
            }
            Indicator::Water => {
                let water_percentage = *class_percentages.get("water").unwrap_or(&0.0);
                let non_water_percentage = *class_percentages.get("non_water").unwrap_or(&0.0);
                // Water seasonality/change detection isn't backed by real
                // per-period composites yet; flagged as simulated so the
                // split is never presented as measured.
                metadata["simulated"] = json!(true);
                simulated_metadata = true;
                IndicatorStats::Water {
                    water_percentage,
                    non_water_percentage,
                    permanent_percentage: Some((water_percentage * 0.7).min(100.0)),
                    seasonal_percentage: Some((water_percentage * 0.3).min(100.0)),
                    no_water_percentage: Some(non_water_percentage),
                }
            }
            _ => unreachable!("analyze_discrete only handles LULC/Water"),
        };

        let _ = simulated_metadata;
        info!(%analysis_type, elapsed, "engine:done");

        AnalysisResult {
            analysis_type,
            geometry_type,
            roi_area_km2: roi.area_km2,
            url_format,
            map_stats,
            datasets_used: vec![dataset_id.to_string()],
            processing_time_seconds: elapsed,
            metadata,
            success: true,
            error: None,
            error_type: None,
        }
    }

    /// widens the date window by ±1 year once when the collection
    /// is empty for the requested range; fails if still empty. Returns the
    /// (possibly widened) date window to use, or the terminal error type.
    async fn run_with_date_widening(
        &self,
        indicator: Indicator,
        tiles: &TileSet,
        polygon: &geo::Polygon<f64>,
        dataset_id: &str,
        base_scale_m: f64,
        time_range: TimeRange,
    ) -> Result<(NaiveDate, NaiveDate), ErrorType> {
        let probe_area = tiles.tiles.first().map(|t| t.area_km2).unwrap_or(0.0);
        let probe = reduce::reduce_continuous(
            &self.backend,
            dataset_id,
            polygon,
            time_range.start,
            time_range.end,
            base_scale_m,
            probe_area,
            1.0,
            indicator.as_str().to_uppercase().as_str(),
        )
        .await;

        match probe {
            Ok(_) => Ok((time_range.start, time_range.end)),
            Err(e) if e.error_type == ErrorType::NoData => {
                warn!("collection empty, widening date window by one year");
                let widened_start = time_range.start - ChronoDuration::days(365);
                let widened_end = time_range.end + ChronoDuration::days(365);
                let retry = reduce::reduce_continuous(
                    &self.backend,
                    dataset_id,
                    polygon,
                    widened_start,
                    widened_end,
                    base_scale_m,
                    probe_area,
                    1.0,
                    indicator.as_str().to_uppercase().as_str(),
                )
                .await;
                match retry {
                    Ok(_) => Ok((widened_start, widened_end)),
                    Err(_) => Err(ErrorType::NoData),
                }
            }
            Err(e) => Err(e.error_type),
        }
    }

    async fn reduce_continuous_tiles(
        &self,
        dataset_id: &str,
        tiles: &TileSet,
        whole_roi_polygon: &geo::Polygon<f64>,
        time_range: TimeRange,
        base_scale_m: f64,
        indicator: Indicator,
    ) -> Result<Vec<ContinuousTileStats>, ApiError> {
        let prefix = indicator.as_str().to_uppercase();
        let futures = tiles.tiles.iter().map(|tile| {
            let backend = Arc::clone(&self.backend);
            let prefix = prefix.clone();
            let tile_polygon = geoutil::to_geo(&tile.geometry)
                .and_then(|g| geoutil::dissolve_to_polygon(&g))
                .unwrap_or_else(|| whole_roi_polygon.clone());
            let area_km2 = tile.area_km2;
            async move {
                reduce::reduce_continuous(
                    &backend,
                    dataset_id,
                    &tile_polygon,
                    time_range.start,
                    time_range.end,
                    base_scale_m,
                    area_km2,
                    area_km2,
                    &prefix,
                )
                .await
            }
        });

        // Tile-level reductions fan out via join_all; results stay in
        // `tile_id` order since `tiles.tiles` is already ordered and the
        // zip-back happens implicitly by iterating in the same sequence.
        let results = futures::future::join_all(futures).await;
        results.into_iter().collect()
    }

    async fn ndvi_vegetation_classes(
        &self,
        tiles: &TileSet,
        whole_roi_polygon: &geo::Polygon<f64>,
        dataset_id: &str,
        time_range: TimeRange,
        base_scale_m: f64,
    ) -> HashMap<String, f64> {
        let mut per_tile = Vec::new();
        for tile in &tiles.tiles {
            let tile_polygon = geoutil::to_geo(&tile.geometry)
                .and_then(|g| geoutil::dissolve_to_polygon(&g))
                .unwrap_or_else(|| whole_roi_polygon.clone());
            if let Ok(result) = reduce::reduce_histogram(
                &self.backend,
                dataset_id,
                &tile_polygon,
                time_range.start,
                time_range.end,
                base_scale_m,
                tile.area_km2,
                classify_ndvi,
            )
            .await
            {
                per_tile.push((tile.area_km2, result.classes));
            }
        }
        merge::merge_class_percentages(&per_tile).0
    }

    /// tries Dynamic-World-like, MODIS-like and ESA-WorldCover-like
    /// urban/rural classifications in order, falling back to the always
    /// succeeding statistical method. `urban_mean`/`rural_mean` for each
    /// candidate come from masked LST reductions over that method's own
    /// urban/rural classes, not from the overall LST mean.
    async fn compute_uhi(
        &self,
        polygon: &geo::Polygon<f64>,
        time_range: TimeRange,
        lst_dataset_id: &str,
        lst_stats: &MergedContinuous,
    ) -> (f64, UhiDetails) {
        let scale_m = datasets::base_scale_m(Indicator::Lst);
        let mut candidates = Vec::new();
        for (method, mask_dataset_id, urban_classes, rural_classes, min_pixels) in [
            (
                UhiMethod::DynamicWorld,
                "GOOGLE/DYNAMICWORLD/V1",
                datasets::UHI_DYNAMIC_WORLD_URBAN,
                datasets::UHI_DYNAMIC_WORLD_RURAL,
                3u64,
            ),
            (
                UhiMethod::ModisLc,
                "MODIS/061/MCD12Q1",
                datasets::UHI_MODIS_LC_URBAN,
                datasets::UHI_MODIS_LC_RURAL,
                2,
            ),
            (
                UhiMethod::EsaWorldcover,
                "ESA/WorldCover/v200",
                datasets::UHI_ESA_WORLDCOVER_URBAN,
                datasets::UHI_ESA_WORLDCOVER_RURAL,
                5,
            ),
        ] {
            let Ok(histogram) = self
                .backend
                .frequency_histogram(mask_dataset_id, polygon, time_range.start, time_range.end, scale_m)
                .await
            else {
                continue;
            };

            let urban_pixel_count = urban_classes
                .iter()
                .filter_map(|c| histogram.get(*c))
                .map(|pct| *pct as u64)
                .sum();
            let rural_pixel_count = rural_classes
                .iter()
                .filter_map(|c| histogram.get(*c))
                .map(|pct| *pct as u64)
                .sum();

            if urban_pixel_count < min_pixels || rural_pixel_count < min_pixels {
                continue;
            }

            let urban_mean = self
                .backend
                .reduce_masked_mean(
                    lst_dataset_id,
                    mask_dataset_id,
                    polygon,
                    time_range.start,
                    time_range.end,
                    urban_classes,
                    scale_m,
                )
                .await;
            let rural_mean = self
                .backend
                .reduce_masked_mean(
                    lst_dataset_id,
                    mask_dataset_id,
                    polygon,
                    time_range.start,
                    time_range.end,
                    rural_classes,
                    scale_m,
                )
                .await;
            let (Ok(Some(urban_mean)), Ok(Some(rural_mean))) = (urban_mean, rural_mean) else {
                continue;
            };

            candidates.push(UhiCandidate {
                method,
                urban_pixel_count,
                rural_pixel_count,
                urban_mean,
                rural_mean,
                min_pixels_required: min_pixels,
            });
        }

        // Normal-distribution z-score approximation (90th/10th percentile ≈
        // mean ± 1.2816·stddev) for the statistical fallback, clamped to the
        // tile merge's observed min/max since no raw pixel distribution is
        // available at this point.
        const Z_90: f64 = 1.2816;
        let lst_p90 = (lst_stats.mean + Z_90 * lst_stats.std_dev).min(lst_stats.max);
        let lst_p10 = (lst_stats.mean - Z_90 * lst_stats.std_dev).max(lst_stats.min);

        uhi::compute_uhi(&candidates, lst_p90, lst_p10)
    }

    /// `generate_grid(indicator, roi, cell_km)`: equirectangular
    /// grid over the ROI bounding box, cell side in degrees ≈ `cell_km /
    /// 111`, bounded fan-out via a semaphore, emitted in scan order.
    pub async fn generate_grid(
        &self,
        indicator: Indicator,
        roi: &Roi,
        cell_km: f64,
        time_range: TimeRange,
    ) -> Result<FeatureCollection, ApiError> {
        let Some(polygon) = geoutil::to_geo(&roi.geometry).and_then(|g| geoutil::dissolve_to_polygon(&g))
        else {
            return Err(ApiError::processing("ROI geometry could not be resolved"));
        };
        let Some((min, max)) = geoutil::bbox_of_geometry(&roi.geometry) else {
            return Err(ApiError::processing("ROI has no bounding box"));
        };

        let cell_deg = (cell_km / 111.0).max(0.001);
        let cols = ((max.0 - min.0) / cell_deg).ceil().max(1.0) as usize;
        let rows = ((max.1 - min.1) / cell_deg).ceil().max(1.0) as usize;

        let dataset_id = datasets::dataset_id(indicator);
        let base_scale_m = datasets::base_scale_m(indicator);
        let prefix = indicator.as_str().to_uppercase();
        let semaphore = Arc::new(Semaphore::new(self.grid_max_concurrency));

        let mut cells = Vec::new();
        let mut cell_id = 0usize;
        for row in 0..rows {
            for col in 0..cols {
                let cell_min_x = min.0 + col as f64 * cell_deg;
                let cell_min_y = min.1 + row as f64 * cell_deg;
                let cell_rect = geo::Rect::new(
                    geo::Coord {
                        x: cell_min_x,
                        y: cell_min_y,
                    },
                    geo::Coord {
                        x: cell_min_x + cell_deg,
                        y: cell_min_y + cell_deg,
                    },
                );
                if !geo::Intersects::intersects(&cell_rect, &polygon) {
                    continue;
                }
                cells.push((cell_id, cell_rect.to_polygon()));
                cell_id += 1;
            }
        }

        let deadline = tokio::time::Duration::from_secs(30);
        let result = tokio::time::timeout(deadline, async {
            let mut tasks = Vec::new();
            for (id, cell_polygon) in cells {
                let backend = Arc::clone(&self.backend);
                let permit = Arc::clone(&semaphore);
                let prefix = prefix.clone();
                let area_km2 = geoutil::area_km2_of_geo(&geo::Geometry::Polygon(cell_polygon.clone()));
                tasks.push(tokio::spawn(async move {
                    let _permit = permit.acquire_owned().await.ok();
                    let stats = reduce::reduce_continuous(
                        &backend,
                        dataset_id,
                        &cell_polygon,
                        time_range.start,
                        time_range.end,
                        base_scale_m,
                        area_km2,
                        1.0,
                        &prefix,
                    )
                    .await;
                    (id, cell_polygon, area_km2, stats)
                }));
            }
            futures::future::join_all(tasks).await
        })
        .await
        .map_err(|_| ApiError::timeout("grid generation exceeded its 30s deadline"))?;

        let mut features: Vec<(usize, Feature)> = Vec::new();
        for joined in result {
            let Ok((cell_id, cell_polygon, area_km2, stats)) = joined else {
                continue;
            };
            let Ok(stats) = stats else { continue };

            let mut properties = geojson::JsonObject::new();
            properties.insert("cell_id".to_string(), json!(cell_id));
            properties.insert(format!("{}_mean", indicator.as_str()), json!(stats.mean));
            properties.insert(format!("{}_min", indicator.as_str()), json!(stats.min));
            properties.insert(format!("{}_max", indicator.as_str()), json!(stats.max));
            properties.insert(format!("{}_stdDev", indicator.as_str()), json!(stats.std_dev));
            if indicator == Indicator::Ndvi {
                properties.insert(
                    "vegetation_class".to_string(),
                    json!(datasets::ndvi_vegetation_class(stats.mean)),
                );
            }
            let feature = Feature {
                bbox: None,
                geometry: Some(geoutil::from_geo(&geo::Geometry::Polygon(cell_polygon))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            };
            let _ = area_km2;
            features.push((cell_id, feature));
        }

        // Emitted in scan order regardless of completion order.
        features.sort_by_key(|(id, _)| *id);
        Ok(FeatureCollection {
            bbox: None,
            features: features.into_iter().map(|(_, f)| f).collect(),
            foreign_members: None,
        })
    }

    /// `sample_at_point(indicator, lng, lat)`: buffers the point by
    /// `max(scale/2, floor)` meters and runs a mean reducer; Water falls
    /// back through three buffer sizes before declaring "assumed land".
    pub async fn sample_at_point(
        &self,
        indicator: Indicator,
        lng: f64,
        lat: f64,
        time_range: TimeRange,
    ) -> PointSample {
        let dataset_id = datasets::dataset_id(indicator);
        let base_scale_m = datasets::base_scale_m(indicator);
        let floor_m = datasets::buffer_floor_m(indicator);
        let primary_buffer_m = (base_scale_m / 2.0).max(floor_m);

        if indicator != Indicator::Water {
            let buffer_km = primary_buffer_m / 1_000.0;
            let polygon = geoutil::buffer_box(lng, lat, buffer_km.max(0.001));
            let prefix = indicator.as_str().to_uppercase();
            return match reduce::reduce_continuous(
                &self.backend,
                dataset_id,
                &polygon,
                time_range.start,
                time_range.end,
                base_scale_m,
                0.0,
                1.0,
                &prefix,
            )
            .await
            {
                Ok(stats) => PointSample {
                    success: true,
                    value: stats.mean,
                    units: units_for(indicator),
                    quality_score: 0.9,
                    scale_meters: base_scale_m,
                    buffer_meters: primary_buffer_m,
                    assumed_land: false,
                },
                Err(_) => PointSample::failed(base_scale_m, primary_buffer_m),
            };
        }

        // Water: fall back through buffer sizes 0, 60m, 120m, then a
        // max_extent probe before declaring "assumed land" at low confidence.
        for (buffer_m, quality) in [(0.0, 0.8), (60.0, 0.6), (120.0, 0.4)] {
            let buffer_km = (buffer_m / 1_000.0).max(0.0005);
            let polygon = geoutil::buffer_box(lng, lat, buffer_km);
            if let Ok(histogram) = self
                .backend
                .frequency_histogram(dataset_id, &polygon, time_range.start, time_range.end, base_scale_m)
                .await
            {
                if let Some(water_pct) = histogram.get("water") {
                    return PointSample {
                        success: true,
                        value: *water_pct,
                        units: "percent".to_string(),
                        quality_score: quality,
                        scale_meters: base_scale_m,
                        buffer_meters: buffer_m,
                        assumed_land: false,
                    };
                }
            }
        }

        PointSample {
            success: true,
            value: 0.0,
            units: "percent".to_string(),
            quality_score: 0.2,
            scale_meters: base_scale_m,
            buffer_meters: 120.0,
            assumed_land: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PointSample {
    pub success: bool,
    pub value: f64,
    pub units: String,
    pub quality_score: f64,
    pub scale_meters: f64,
    pub buffer_meters: f64,
    pub assumed_land: bool,
}

impl PointSample {
    fn failed(scale_meters: f64, buffer_meters: f64) -> Self {
        Self {
            success: false,
            value: 0.0,
            units: String::new(),
            quality_score: 0.0,
            scale_meters,
            buffer_meters,
            assumed_land: false,
        }
    }
}

fn units_for(indicator: Indicator) -> String {
    match indicator {
        Indicator::Ndvi => "index".to_string(),
        Indicator::Lst => "celsius".to_string(),
        Indicator::Lulc => "class".to_string(),
        Indicator::Water => "percent".to_string(),
    }
}

fn classify_ndvi(value: f64) -> &'static str {
    datasets::ndvi_vegetation_class(value)
}

fn classify_lulc(value: f64) -> &'static str {
    let classes = datasets::LULC_CLASSES;
    let idx = (value.rem_euclid(classes.len() as f64)) as usize;
    classes[idx.min(classes.len() - 1)]
}

fn classify_water(value: f64) -> &'static str {
    if value >= 0.2 {
        "water"
    } else {
        "non_water"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SyntheticImageryBackend;
    use chrono::NaiveDate;
    use geojson::Geometry as GeoJsonGeometry;

    fn time_range() -> TimeRange {
        TimeRange {
            start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
        }
    }

    fn mumbai_roi() -> Roi {
        let polygon = geoutil::buffer_box(72.8777, 19.0760, 14.0);
        let geometry: GeoJsonGeometry = geoutil::from_geo(&geo::Geometry::Polygon(polygon));
        let area_km2 = geoutil::area_km2(&geometry);
        Roi::new(geometry, area_km2, "Mumbai, India")
    }

    #[tokio::test]
    async fn ndvi_result_stays_in_range() {
        let engine = AnalysisEngine::new(Arc::new(SyntheticImageryBackend::new()), 4);
        let result = engine.analyze_ndvi(&mumbai_roi(), time_range()).await;
        assert!(result.success);
        assert!(result.map_stats.ndvi_range_holds());
    }

    #[tokio::test]
    async fn water_percentages_sum_close_to_100() {
        let engine = AnalysisEngine::new(Arc::new(SyntheticImageryBackend::new()), 4);
        let result = engine.analyze_water(&mumbai_roi(), time_range()).await;
        assert!(result.success);
        let closure = result.map_stats.percentage_closure().unwrap();
        assert!((closure - 100.0).abs() < 0.5);
    }

    #[tokio::test]
    async fn lulc_percentages_sum_close_to_100() {
        let engine = AnalysisEngine::new(Arc::new(SyntheticImageryBackend::new()), 4);
        let result = engine.analyze_lulc(&mumbai_roi(), time_range()).await;
        assert!(result.success);
        let closure = result.map_stats.percentage_closure().unwrap();
        assert!((closure - 100.0).abs() < 0.5);
    }

    #[tokio::test]
    async fn lst_carries_uhi_details() {
        let engine = AnalysisEngine::new(Arc::new(SyntheticImageryBackend::new()), 4);
        let result = engine.analyze_lst(&mumbai_roi(), time_range()).await;
        assert!(result.success);
        if let IndicatorStats::Lst { uhi_intensity, uhi_details, .. } = result.map_stats {
            let intensity = uhi_intensity.expect("LST analysis always carries a uhi_intensity");
            assert!(intensity.is_finite() && intensity >= 0.0);

            let details = uhi_details.expect("LST analysis always carries uhi_details");
            // SyntheticImageryBackend's frequency_histogram and
            // reduce_masked_mean never fail, so at least one of the three
            // masked-reduction methods is expected to clear its pixel-count
            // floor and the statistical fallback should not be needed.
            assert_ne!(details.method, UhiMethod::Statistical);
            assert!(details.urban_pixel_count > 0);
            assert!(details.rural_pixel_count > 0);
        } else {
            panic!("expected Lst stats");
        }
    }
}
