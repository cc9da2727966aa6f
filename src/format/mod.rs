//! ResultFormatter: combines every stage's output into the uniform
//! `FinalResponse`. Deterministic, no I/O.

use serde_json::{json, Value};

use crate::domain::{AnalysisResult, EvidenceTrail, FinalResponse, GeometryType, IndicatorStats, Roi};

pub struct ResultFormatter;

impl ResultFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Assembles the `FinalResponse` for a successful GEE analysis.
    pub fn format_gee(
        &self,
        query_text: &str,
        roi: &Roi,
        result: &AnalysisResult,
        intent_confidence: f64,
        evidence: &EvidenceTrail,
        intent_elapsed: f64,
        location_elapsed: f64,
    ) -> FinalResponse {
        let mut evidence = evidence.clone_with_timings(intent_elapsed, location_elapsed, result.processing_time_seconds);

        let header = build_header(query_text, &roi.name, "GEE analysis", result.processing_time_seconds);
        let summary = summary_for(result);
        let analysis = format!("{header}\n\n{summary}");

        evidence.push(format!("{}_service:success", result.analysis_type));

        let data_quality = data_quality_for(result);
        let confidence = blended_confidence(intent_confidence, data_quality);

        FinalResponse {
            analysis,
            roi: Some(roi.to_feature()),
            summary,
            evidence: evidence.into_vec(),
            metadata: result.metadata.clone(),
            sources: None,
            confidence: Some(confidence),
            analysis_data: Some(analysis_result_to_value(result)),
            service_result: None,
        }
    }

    /// Assembles the `FinalResponse` for the web-search synthesis path.
    pub fn format_search(
        &self,
        query_text: &str,
        roi: Option<&Roi>,
        location_name: &str,
        narrative: &str,
        sources: Vec<Value>,
        quality_score: f64,
        intent_confidence: f64,
        evidence: &EvidenceTrail,
        processing_time: f64,
        intent_elapsed: f64,
        location_elapsed: f64,
    ) -> FinalResponse {
        let mut evidence = evidence.clone_with_timings(intent_elapsed, location_elapsed, processing_time);
        evidence.push("search_service:success");

        let header = build_header(query_text, location_name, "web search synthesis", processing_time);
        let analysis = if narrative.starts_with("📝") {
            narrative.to_string()
        } else {
            format!("{header}\n\n{narrative}")
        };

        let confidence = blended_confidence(intent_confidence, quality_score);

        FinalResponse {
            analysis,
            roi: roi.map(Roi::to_feature),
            summary: format!("Found {} sources with data quality score {:.2}", sources.len(), quality_score),
            evidence: evidence.into_vec(),
            metadata: json!({ "quality_score": quality_score }),
            sources: Some(sources),
            confidence: Some(confidence),
            analysis_data: None,
            service_result: None,
        }
    }

    /// Assembles the `FinalResponse` for the RAG path.
    pub fn format_rag(
        &self,
        query_text: &str,
        analysis: &str,
        sources: Vec<Value>,
        confidence: f64,
        evidence: &EvidenceTrail,
        processing_time: f64,
        intent_elapsed: f64,
        location_elapsed: f64,
    ) -> FinalResponse {
        let mut evidence = evidence.clone_with_timings(intent_elapsed, location_elapsed, processing_time);
        evidence.push("rag_service:success");

        let header = build_header(query_text, "uploaded documents", "retrieval-augmented answer", processing_time);

        FinalResponse {
            analysis: format!("{header}\n\n{analysis}"),
            roi: None,
            summary: analysis.chars().take(200).collect(),
            evidence: evidence.into_vec(),
            metadata: Value::Null,
            sources: Some(sources),
            confidence: Some(confidence),
            analysis_data: None,
            service_result: None,
        }
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn build_header(query_text: &str, location_name: &str, service: &str, processing_time: f64) -> String {
    format!(
        "📝 Query: {query_text}\n📍 Locations: {location_name}\n🔧 Service: {service}\n⏱️ Processing time: {processing_time:.2}s"
    )
}

/// Per-indicator summary templates keyed on value ranges.
fn summary_for(result: &AnalysisResult) -> String {
    match &result.map_stats {
        IndicatorStats::Ndvi { ndvi_mean, .. } => {
            let health = if *ndvi_mean > 0.6 {
                "excellent vegetation health"
            } else if *ndvi_mean > 0.4 {
                "moderate vegetation health"
            } else if *ndvi_mean > 0.2 {
                "sparse vegetation"
            } else {
                "little to no vegetation"
            };
            format!("NDVI mean {:.3} over {:.0} km² indicates {health}.", ndvi_mean, result.roi_area_km2)
        }
        IndicatorStats::Lst { lst_mean, uhi_intensity, .. } => {
            let uhi_note = match uhi_intensity {
                Some(intensity) if *intensity > 4.0 => format!(" Urban heat island intensity is pronounced at {:.1}°C.", intensity),
                Some(intensity) => format!(" Urban heat island intensity is moderate at {:.1}°C.", intensity),
                None => String::new(),
            };
            format!("Mean land surface temperature {:.1}°C over {:.0} km².{uhi_note}", lst_mean, result.roi_area_km2)
        }
        IndicatorStats::Lulc { dominant_class, .. } => {
            format!("Dominant land-use class is '{dominant_class}' over {:.0} km².", result.roi_area_km2)
        }
        IndicatorStats::Water { water_percentage, .. } => {
            let category = if *water_percentage > 50.0 {
                "predominantly water"
            } else if *water_percentage > 10.0 {
                "significant water coverage"
            } else {
                "limited water coverage"
            };
            format!("{:.1}% water coverage over {:.0} km² ({category}).", water_percentage, result.roi_area_km2)
        }
    }
}

fn data_quality_for(result: &AnalysisResult) -> f64 {
    if !result.success {
        return 0.0;
    }
    // A tiled result draws on more samples, so it is treated as slightly
    // more reliable than a coarse single-polygon reduction.
    match result.geometry_type {
        GeometryType::TiledPolygon => 0.9,
        GeometryType::SinglePolygon => 0.8,
    }
}

/// `min(1, 0.5*intent_confidence + 0.5*data_quality_overall)`, used
/// whenever the downstream service doesn't already supply a confidence.
fn blended_confidence(intent_confidence: f64, data_quality_overall: f64) -> f64 {
    (0.5 * intent_confidence + 0.5 * data_quality_overall).min(1.0)
}

fn analysis_result_to_value(result: &AnalysisResult) -> Value {
    serde_json::to_value(result).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GeometryType, IndicatorStats};
    use std::collections::HashMap;

    fn sample_result() -> AnalysisResult {
        AnalysisResult {
            analysis_type: "ndvi".to_string(),
            geometry_type: GeometryType::SinglePolygon,
            roi_area_km2: 1234.0,
            url_format: "https://example.invalid/{z}/{x}/{y}".to_string(),
            map_stats: IndicatorStats::Ndvi {
                ndvi_mean: 0.72,
                ndvi_min: 0.1,
                ndvi_max: 0.95,
                ndvi_std_dev: 0.05,
                vegetation_class_percentages: HashMap::new(),
            },
            datasets_used: vec!["COPERNICUS/S2_SR_HARMONIZED".to_string()],
            processing_time_seconds: 1.5,
            metadata: Value::Null,
            success: true,
            error: None,
            error_type: None,
        }
    }

    #[test]
    fn high_ndvi_reads_as_excellent_health() {
        let summary = summary_for(&sample_result());
        assert!(summary.contains("excellent vegetation health"));
    }

    #[test]
    fn blended_confidence_never_exceeds_one() {
        assert_eq!(blended_confidence(1.0, 1.0), 1.0);
        assert!((blended_confidence(0.6, 0.8) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn format_gee_includes_header_markers() {
        let formatter = ResultFormatter::new();
        let roi = Roi::new(
            geojson::Geometry::new(geojson::Value::Point(vec![72.8777, 19.0760])),
            1234.0,
            "Mumbai, India",
        );
        let evidence = EvidenceTrail::new();
        let response = formatter.format_gee("ndvi in mumbai", &roi, &sample_result(), 0.9, &evidence, 0.3, 0.2);
        assert!(response.analysis.contains("📝 Query"));
        assert!(response.analysis.contains("📍 Locations"));
        assert!(response.confidence.unwrap() > 0.0);
    }
}
