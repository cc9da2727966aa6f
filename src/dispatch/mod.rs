//! ServiceDispatcher: routes a classified query to the right backend,
//! enforces the area gate and the per-indicator/per-area-bucket timeout
//! table, and falls back deterministically on failure.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::backends::RagService;
use crate::domain::{AnalysisResult, EvidenceTrail, GeeSubIntent, Indicator, IntentResult, Roi, ServiceType, TimeRange};
use crate::engine::AnalysisEngine;
use crate::error::{ApiError, ErrorType};
use crate::synth::{ResponseSynthesizer, SynthesisResult};

/// `(Indicator, AreaBucket)` timeout lookup, built once at startup and never
/// recomputed per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AreaBucket {
    Small,
    Medium,
    Large,
}

impl AreaBucket {
    fn for_area(area_km2: f64) -> Self {
        if area_km2 < 1_000.0 {
            Self::Small
        } else if area_km2 < 10_000.0 {
            Self::Medium
        } else {
            Self::Large
        }
    }

    fn multiplier(self) -> f64 {
        match self {
            Self::Small => 1.0,
            Self::Medium => 1.5,
            Self::Large => 2.0,
        }
    }
}

fn base_seconds(indicator: Indicator) -> f64 {
    match indicator {
        Indicator::Water | Indicator::Ndvi => 120.0,
        Indicator::Lulc | Indicator::Lst => 150.0,
    }
}

pub struct DispatchConfig {
    pub max_roi_km2: f64,
    pub read_timeout_cap_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_roi_km2: 35_000.0,
            read_timeout_cap_secs: 120,
        }
    }
}

/// `read_timeout` for an `(indicator, area)` pair, derived once per request
/// but from a fixed table: `connect_timeout` is capped at 10s
/// independently of this.
fn read_timeout_for(indicator: Indicator, area_km2: f64, cap_secs: u64) -> Duration {
    let bucket = AreaBucket::for_area(area_km2);
    let seconds = base_seconds(indicator) * bucket.multiplier();
    Duration::from_secs_f64(seconds.min(cap_secs as f64))
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub enum DispatchOutcome {
    Gee(AnalysisResult),
    Rag {
        analysis: String,
        sources: Vec<serde_json::Value>,
        confidence: f64,
    },
    Search(SynthesisResult),
}

pub struct ServiceDispatcher {
    engine: Arc<AnalysisEngine>,
    synthesizer: Arc<ResponseSynthesizer>,
    rag: Option<Arc<dyn RagService>>,
    config: DispatchConfig,
}

impl ServiceDispatcher {
    pub fn new(
        engine: Arc<AnalysisEngine>,
        synthesizer: Arc<ResponseSynthesizer>,
        rag: Option<Arc<dyn RagService>>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            engine,
            synthesizer,
            rag,
            config,
        }
    }

    /// Routing rules evaluated top to bottom: RAG (if the session has
    /// documents) → GEE → SEARCH → error.
    pub async fn dispatch(
        &self,
        query_text: &str,
        session_id: Option<&str>,
        intent: &IntentResult,
        roi: Option<&Roi>,
        location_name: &str,
        today: chrono::NaiveDate,
        evidence: &mut EvidenceTrail,
    ) -> Result<DispatchOutcome, ApiError> {
        if let (Some(session_id), Some(rag)) = (session_id, &self.rag) {
            if rag.has_documents(session_id).await {
                evidence.push("dispatcher:route_rag");
                return Ok(self
                    .dispatch_rag(query_text, session_id, rag, location_name, intent.gee_sub_intent, today, evidence)
                    .await);
            }
        }

        match intent.service_type {
            ServiceType::Gee => {
                evidence.push("dispatcher:route_gee");
                self.dispatch_gee(intent, roi, today, evidence).await
            }
            ServiceType::Search => {
                evidence.push("dispatcher:route_search");
                Ok(self.dispatch_search(query_text, location_name, intent.gee_sub_intent, today).await)
            }
            ServiceType::Rag => {
                evidence.push("dispatcher:route_rag_unavailable");
                Err(ApiError::new(
                    ErrorType::ProcessingError,
                    "RAG was requested but no session documents or RAG backend are available",
                ))
            }
        }
    }

    /// RAG failure degrades to search synthesis, mirroring `dispatch_gee`'s
    /// own fallback on engine failure/timeout — RAG is never allowed to
    /// surface its error straight to the HTTP boundary.
    async fn dispatch_rag(
        &self,
        query_text: &str,
        session_id: &str,
        rag: &Arc<dyn RagService>,
        location_name: &str,
        gee_sub_intent: Option<GeeSubIntent>,
        today: chrono::NaiveDate,
        evidence: &mut EvidenceTrail,
    ) -> DispatchOutcome {
        match rag.ask(query_text, session_id, 5, 0.0).await {
            Ok(answer) => DispatchOutcome::Rag {
                analysis: answer.analysis,
                sources: answer.sources,
                confidence: answer.confidence,
            },
            Err(e) => {
                warn!(error = %e, "dispatcher:rag_failed_degrading_to_search");
                evidence.push("rag:fallback");
                self.dispatch_search(query_text, location_name, gee_sub_intent, today).await
            }
        }
    }

    async fn dispatch_gee(
        &self,
        intent: &IntentResult,
        roi: Option<&Roi>,
        today: chrono::NaiveDate,
        evidence: &mut EvidenceTrail,
    ) -> Result<DispatchOutcome, ApiError> {
        let Some(roi) = roi else {
            return Err(ApiError::new(ErrorType::ProcessingError, "no ROI available for GEE analysis"));
        };
        let Some(sub_intent) = intent.gee_sub_intent else {
            return Err(ApiError::new(ErrorType::ProcessingError, "GEE routing requires a sub-intent"));
        };
        let Some(indicator) = sub_intent.indicator() else {
            // Sub-intents without a backing analyzer (climate/soil/population/
            // transportation) degrade to search synthesis.
            evidence.push("dispatcher:gee_sub_intent_unsupported_degrading_to_search");
            let result = self
                .dispatch_search(&intent.analysis_type, &roi.name, Some(sub_intent), today)
                .await;
            return Ok(result);
        };

        // Area gate: applied before the engine ever runs.
        if roi.area_km2 > self.config.max_roi_km2 {
            evidence.push("dispatcher:area_too_large");
            return Err(ApiError::area_too_large(format!(
                "requested ROI '{}' covers {:.0} km², exceeding the {:.0} km² limit; try a smaller or more specific area",
                roi.name, roi.area_km2, self.config.max_roi_km2
            )));
        }

        let read_timeout = read_timeout_for(indicator, roi.area_km2, self.config.read_timeout_cap_secs);
        let total_timeout = CONNECT_TIMEOUT + read_timeout;
        let time_range = intent.time_range.unwrap_or_else(default_time_range);

        let result = tokio::time::timeout(total_timeout, self.run_indicator(indicator, roi, time_range)).await;

        match result {
            Ok(analysis_result) if analysis_result.success => {
                info!(indicator = indicator.as_str(), "dispatcher:gee_success");
                Ok(DispatchOutcome::Gee(analysis_result))
            }
            Ok(analysis_result) => {
                warn!(
                    indicator = indicator.as_str(),
                    error_type = ?analysis_result.error_type,
                    "dispatcher:gee_failed_degrading_to_search"
                );
                evidence.push(format!("{}_service:fallback", indicator.as_str()));
                Ok(self.dispatch_search(&intent.analysis_type, &roi.name, Some(sub_intent), today).await)
            }
            Err(_) => {
                warn!(indicator = indicator.as_str(), "dispatcher:gee_timeout_degrading_to_search");
                evidence.push(format!("{}_service:fallback", indicator.as_str()));
                Ok(self.dispatch_search(&intent.analysis_type, &roi.name, Some(sub_intent), today).await)
            }
        }
    }

    async fn run_indicator(&self, indicator: Indicator, roi: &Roi, time_range: TimeRange) -> AnalysisResult {
        match indicator {
            Indicator::Ndvi => self.engine.analyze_ndvi(roi, time_range).await,
            Indicator::Lst => self.engine.analyze_lst(roi, time_range).await,
            Indicator::Lulc => self.engine.analyze_lulc(roi, time_range).await,
            Indicator::Water => self.engine.analyze_water(roi, time_range).await,
        }
    }

    async fn dispatch_search(
        &self,
        query_text: &str,
        location_name: &str,
        sub_intent: Option<GeeSubIntent>,
        today: chrono::NaiveDate,
    ) -> DispatchOutcome {
        let result = self.synthesizer.synthesize(query_text, location_name, sub_intent, today).await;
        DispatchOutcome::Search(result)
    }
}

fn default_time_range() -> TimeRange {
    // Falls back to the trailing year when the classifier didn't extract an
    // explicit window.
    let end = chrono::Local::now().date_naive();
    TimeRange {
        start: end - chrono::Duration::days(365),
        end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::backends::{RagAnswer, RagService, SyntheticImageryBackend, WebSearch, WebSearchResult};
    use crate::synth::ResponseSynthesizer;

    #[test]
    fn small_area_uses_base_timeout() {
        let timeout = read_timeout_for(Indicator::Ndvi, 500.0, 120);
        assert_eq!(timeout, Duration::from_secs(120));
    }

    #[test]
    fn large_area_doubles_base_timeout_but_stays_capped() {
        let timeout = read_timeout_for(Indicator::Lst, 20_000.0, 120);
        assert_eq!(timeout, Duration::from_secs(120));
    }

    #[test]
    fn medium_area_applies_the_1_5x_multiplier() {
        let timeout = read_timeout_for(Indicator::Water, 5_000.0, 600);
        assert_eq!(timeout, Duration::from_secs(180));
    }

    struct FailingRag;

    #[async_trait]
    impl RagService for FailingRag {
        async fn ask(&self, _query: &str, _session_id: &str, _k: u32, _temperature: f64) -> Result<RagAnswer, ApiError> {
            Err(ApiError::new(ErrorType::BackendUnavailable, "rag backend is down"))
        }

        async fn has_documents(&self, _session_id: &str) -> bool {
            true
        }
    }

    struct StubSearch;

    #[async_trait]
    impl WebSearch for StubSearch {
        async fn search(
            &self,
            _query: &str,
            _max_results: u32,
            _include_domains: Option<&[String]>,
            _exclude_domains: Option<&[String]>,
            _depth: crate::backends::SearchDepth,
        ) -> Result<Vec<WebSearchResult>, ApiError> {
            Ok(vec![WebSearchResult {
                title: "fallback result".to_string(),
                url: "https://example.invalid/fallback".to_string(),
                content: "some content".to_string(),
                score: 0.5,
                published_date: None,
            }])
        }
    }

    fn intent_requesting_rag() -> IntentResult {
        IntentResult {
            service_type: ServiceType::Rag,
            confidence: 0.9,
            gee_sub_intent: None,
            gee_confidence: None,
            analysis_type: "general".to_string(),
            time_range: None,
            metrics: Vec::new(),
            reasoning: "session has uploaded documents".to_string(),
            processing_time: Duration::from_millis(1),
            model_used: "stub-model".to_string(),
            success: true,
            error: None,
        }
    }

    #[tokio::test]
    async fn rag_failure_degrades_to_search_instead_of_erroring() {
        let engine = Arc::new(AnalysisEngine::new(Arc::new(SyntheticImageryBackend::new()), 4));
        let synthesizer = Arc::new(ResponseSynthesizer::new(Arc::new(StubSearch)));
        let dispatcher = ServiceDispatcher::new(engine, synthesizer, Some(Arc::new(FailingRag)), DispatchConfig::default());

        let intent = intent_requesting_rag();
        let mut evidence = EvidenceTrail::new();
        let today = chrono::Utc::now().date_naive();

        let outcome = dispatcher
            .dispatch("what does the document say?", Some("session-1"), &intent, None, "Mumbai, India", today, &mut evidence)
            .await
            .expect("rag failure must degrade to search, not error");

        assert!(matches!(outcome, DispatchOutcome::Search(_)));
        assert!(evidence.as_slice().iter().any(|e| e == "rag:fallback"));
    }
}
