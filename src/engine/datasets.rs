//! Per-indicator dataset identifiers, area/pixel budgets and classification
//! tables. The engine never talks to a real collection — these are
//! just the identifiers and constants an `ImageryBackend` implementation is
//! expected to resolve.

use crate::domain::Indicator;

use super::VisParams;

/// Area (km²) above which an ROI is tiled rather than reduced as a single
/// polygon.
pub fn area_budget_km2(indicator: Indicator) -> f64 {
    match indicator {
        Indicator::Ndvi => 5_000.0,
        Indicator::Water => 5_000.0,
        Indicator::Lulc => 8_000.0,
        Indicator::Lst => 20_000.0,
    }
}

/// Base reduction scale in meters, before "force coarser for large
/// ROI" adaptation.
pub fn base_scale_m(indicator: Indicator) -> f64 {
    match indicator {
        Indicator::Ndvi => 30.0,
        Indicator::Lulc => 30.0,
        Indicator::Water => 30.0,
        Indicator::Lst => 1_000.0,
    }
}

/// Point-sample buffer floor in meters.
pub fn buffer_floor_m(indicator: Indicator) -> f64 {
    match indicator {
        Indicator::Lst => 250.0,
        Indicator::Ndvi => 15.0,
        Indicator::Water => 30.0,
        Indicator::Lulc => 30.0,
    }
}

pub fn dataset_id(indicator: Indicator) -> &'static str {
    match indicator {
        Indicator::Ndvi => "COPERNICUS/S2_SR_HARMONIZED",
        Indicator::Lst => "MODIS/061/MOD11A2",
        Indicator::Lulc => "GOOGLE/DYNAMICWORLD/V1",
        Indicator::Water => "JRC/GSW1_4/GlobalSurfaceWater",
    }
}

pub fn vis_params(indicator: Indicator) -> VisParams {
    match indicator {
        Indicator::Ndvi => VisParams { min: -0.2, max: 0.9 },
        Indicator::Lst => VisParams { min: 10.0, max: 45.0 },
        Indicator::Lulc => VisParams { min: 0.0, max: 8.0 },
        Indicator::Water => VisParams { min: 0.0, max: 100.0 },
    }
}

/// Dynamic-World-like 9 class palette.
pub const LULC_CLASSES: [&str; 9] = [
    "water",
    "trees",
    "grass",
    "flooded_vegetation",
    "crops",
    "shrub_and_scrub",
    "built",
    "bare",
    "snow_and_ice",
];

/// NDVI-value bins used for vegetation-class percentages.
pub fn ndvi_vegetation_class(value: f64) -> &'static str {
    if value < 0.0 {
        "water_or_built"
    } else if value < 0.2 {
        "bare_soil"
    } else if value < 0.4 {
        "sparse_vegetation"
    } else if value < 0.6 {
        "moderate_vegetation"
    } else {
        "dense_vegetation"
    }
}

/// UHI urban/rural class groupings, tried in order.
pub const UHI_DYNAMIC_WORLD_URBAN: &[&str] = &["built"];
pub const UHI_DYNAMIC_WORLD_RURAL: &[&str] =
    &["trees", "grass", "crops", "shrub_and_scrub"];

pub const UHI_MODIS_LC_URBAN: &[&str] = &["13"];
pub const UHI_MODIS_LC_RURAL: &[&str] = &["10", "12", "1", "4", "5"];

pub const UHI_ESA_WORLDCOVER_URBAN: &[&str] = &["50"];
pub const UHI_ESA_WORLDCOVER_RURAL: &[&str] = &["10", "20", "30", "40"];
