//! Reduction strategy: scale adaptation for large ROIs, and the
//! three-step histogram fallback chain for discrete indicators.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use geo::Polygon;
use serde_json::Value;
use tracing::warn;

use crate::backends::{ImageryBackend, ReduceOptions};
use crate::error::ApiError;

use super::merge::ContinuousTileStats;

/// If the ROI tile exceeds 1,000 km² force `scale := max(base_scale, 100m)`.
/// Retried once at a coarser scale if the first reduction comes back all
/// zero/null.
pub async fn reduce_continuous(
    backend: &Arc<dyn ImageryBackend>,
    dataset_id: &str,
    polygon: &Polygon<f64>,
    date_start: NaiveDate,
    date_end: NaiveDate,
    base_scale_m: f64,
    area_km2: f64,
    weight: f64,
    prefix: &str,
) -> Result<ContinuousTileStats, ApiError> {
    let scale = if area_km2 > 1_000.0 {
        base_scale_m.max(100.0)
    } else {
        base_scale_m
    };

    let stats = [
        format!("{prefix}_mean"),
        format!("{prefix}_min"),
        format!("{prefix}_max"),
        format!("{prefix}_stdDev"),
    ];
    let stat_refs: Vec<&str> = stats.iter().map(String::as_str).collect();

    let first = run_reduce_region(backend, dataset_id, polygon, date_start, date_end, &stat_refs, scale, 1_000_000).await?;
    let values = extract_continuous(&first, prefix);

    let values = if is_all_null_or_zero(&values) {
        warn!(dataset_id, scale, "reduction returned all null/zero, retrying at coarser scale");
        let retry = run_reduce_region(
            backend,
            dataset_id,
            polygon,
            date_start,
            date_end,
            &stat_refs,
            scale * 2.0,
            4_000_000,
        )
        .await?;
        extract_continuous(&retry, prefix)
    } else {
        values
    };

    Ok(ContinuousTileStats {
        weight,
        mean: values.0,
        min: values.1,
        max: values.2,
        std_dev: values.3,
    })
}

async fn run_reduce_region(
    backend: &Arc<dyn ImageryBackend>,
    dataset_id: &str,
    polygon: &Polygon<f64>,
    date_start: NaiveDate,
    date_end: NaiveDate,
    stats: &[&str],
    scale_m: f64,
    max_pixels: u64,
) -> Result<Value, ApiError> {
    backend
        .reduce_region(
            dataset_id,
            polygon,
            date_start,
            date_end,
            stats,
            ReduceOptions {
                scale_m,
                max_pixels,
                best_effort: true,
            },
        )
        .await
}

fn extract_continuous(value: &Value, prefix: &str) -> (f64, f64, f64, f64) {
    let get = |suffix: &str| {
        value
            .get(format!("{prefix}_{suffix}"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    };
    (get("mean"), get("min"), get("max"), get("stdDev"))
}

fn is_all_null_or_zero(values: &(f64, f64, f64, f64)) -> bool {
    values.0 == 0.0 && values.1 == 0.0 && values.2 == 0.0 && values.3 == 0.0
}

/// The three-step histogram fallback chain: frequency histogram,
/// then client-side binning of sampled points, then a synthesized 3-bin
/// histogram as a last resort (flagged `method=basic_stats`).
pub struct HistogramResult {
    pub classes: HashMap<String, f64>,
    pub method: &'static str,
}

pub async fn reduce_histogram(
    backend: &Arc<dyn ImageryBackend>,
    dataset_id: &str,
    polygon: &Polygon<f64>,
    date_start: NaiveDate,
    date_end: NaiveDate,
    scale_m: f64,
    area_km2: f64,
    classify: impl Fn(f64) -> &'static str,
) -> Result<HistogramResult, ApiError> {
    let histogram = backend
        .frequency_histogram(dataset_id, polygon, date_start, date_end, scale_m)
        .await?;

    if !histogram.is_empty() {
        return Ok(HistogramResult {
            classes: histogram,
            method: "frequency_histogram",
        });
    }

    warn!(dataset_id, "frequency histogram empty, falling back to point sampling");
    let num_pixels = ((8.0 * area_km2) as u32).clamp(500, 4000);
    let samples = backend
        .sample(dataset_id, polygon, scale_m * 2.0, num_pixels)
        .await?;

    if !samples.is_empty() {
        let mut counts: HashMap<String, f64> = HashMap::new();
        for sample in &samples {
            if let Some(v) = sample.get("value").and_then(Value::as_f64) {
                *counts.entry(classify(v).to_string()).or_insert(0.0) += 1.0;
            }
        }
        let total: f64 = counts.values().sum();
        if total > 0.0 {
            for v in counts.values_mut() {
                *v = *v / total * 100.0;
            }
            return Ok(HistogramResult {
                classes: counts,
                method: "point_sampling",
            });
        }
    }

    warn!(dataset_id, "point sampling also empty, synthesizing basic-stats histogram");
    let mean = run_reduce_region(backend, dataset_id, polygon, date_start, date_end, &["mean"], scale_m, 1_000_000)
        .await
        .ok()
        .and_then(|v| v.get("mean").and_then(Value::as_f64))
        .unwrap_or(0.0);

    let mut classes = HashMap::new();
    classes.insert(classify(mean - 1.0).to_string(), 25.0);
    classes.insert(classify(mean).to_string(), 50.0);
    classes.insert(classify(mean + 1.0).to_string(), 25.0);

    Ok(HistogramResult {
        classes,
        method: "basic_stats",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_all_zero_values() {
        assert!(is_all_null_or_zero(&(0.0, 0.0, 0.0, 0.0)));
        assert!(!is_all_null_or_zero(&(0.3, 0.1, 0.5, 0.05)));
    }
}
