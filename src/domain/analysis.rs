use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::ErrorType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryType {
    SinglePolygon,
    TiledPolygon,
}

/// Maps directly onto the subset of `ErrorType` the engine itself can raise
/// (area_too_large never originates here — the dispatcher gates it first).
pub type AnalysisErrorType = ErrorType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UhiMethod {
    DynamicWorld,
    ModisLc,
    EsaWorldcover,
    Statistical,
    ErrorFallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct UhiDetails {
    pub method: UhiMethod,
    pub urban_pixel_count: u64,
    pub rural_pixel_count: u64,
}

/// Semantic statistics carried inside `AnalysisResult.map_stats`, keyed per
/// indicator family.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum IndicatorStats {
    Ndvi {
        ndvi_mean: f64,
        ndvi_min: f64,
        ndvi_max: f64,
        ndvi_std_dev: f64,
        vegetation_class_percentages: HashMap<String, f64>,
    },
    Lst {
        lst_mean: f64,
        lst_min: f64,
        lst_max: f64,
        lst_std_dev: f64,
        uhi_intensity: Option<f64>,
        uhi_details: Option<UhiDetails>,
    },
    Lulc {
        class_percentages: HashMap<String, f64>,
        class_areas_km2: HashMap<String, f64>,
        dominant_class: String,
    },
    Water {
        water_percentage: f64,
        non_water_percentage: f64,
        permanent_percentage: Option<f64>,
        seasonal_percentage: Option<f64>,
        no_water_percentage: Option<f64>,
    },
}

impl IndicatorStats {
    /// LULC/Water class percentages sum to 100 within ±0.5 (±0.01 once the
    /// merge step has renormalized).
    pub fn percentage_closure(&self) -> Option<f64> {
        match self {
            Self::Lulc {
                class_percentages, ..
            } => Some(class_percentages.values().sum()),
            Self::Water {
                water_percentage,
                non_water_percentage,
                ..
            } => Some(water_percentage + non_water_percentage),
            _ => None,
        }
    }

    /// -1 <= min <= mean <= max <= 1 for every NDVI statistic.
    pub fn ndvi_range_holds(&self) -> bool {
        match self {
            Self::Ndvi {
                ndvi_min,
                ndvi_mean,
                ndvi_max,
                ..
            } => {
                (-1.0..=1.0).contains(ndvi_min)
                    && (-1.0..=1.0).contains(ndvi_mean)
                    && (-1.0..=1.0).contains(ndvi_max)
                    && ndvi_min <= ndvi_mean
                    && ndvi_mean <= ndvi_max
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub analysis_type: String,
    pub geometry_type: GeometryType,
    pub roi_area_km2: f64,
    pub url_format: String,
    pub map_stats: IndicatorStats,
    pub datasets_used: Vec<String>,
    pub processing_time_seconds: f64,
    pub metadata: Value,
    pub success: bool,
    pub error: Option<String>,
    pub error_type: Option<AnalysisErrorType>,
}

impl AnalysisResult {
    pub fn failure(
        analysis_type: impl Into<String>,
        error_type: AnalysisErrorType,
        message: impl Into<String>,
        processing_time_seconds: f64,
    ) -> Self {
        Self {
            analysis_type: analysis_type.into(),
            geometry_type: GeometryType::SinglePolygon,
            roi_area_km2: 0.0,
            url_format: String::new(),
            map_stats: IndicatorStats::Lulc {
                class_percentages: HashMap::new(),
                class_areas_km2: HashMap::new(),
                dominant_class: String::new(),
            },
            datasets_used: Vec::new(),
            processing_time_seconds,
            metadata: Value::Null,
            success: false,
            error: Some(message.into()),
            error_type: Some(error_type),
        }
    }
}
