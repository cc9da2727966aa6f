//! Top-level orchestrator: wires `LocationParser -> IntentClassifier ->
//! ServiceDispatcher -> ResultFormatter` into the one real operation this
//! crate exposes.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::dispatch::{DispatchOutcome, ServiceDispatcher};
use crate::domain::{EvidenceTrail, FinalResponse, Query, Roi, RoiSource};
use crate::error::{ApiError, ErrorType};
use crate::format::ResultFormatter;
use crate::intent::IntentClassifier;
use crate::location::LocationParser;

pub struct Agent {
    location_parser: LocationParser,
    intent_classifier: IntentClassifier,
    dispatcher: ServiceDispatcher,
    formatter: ResultFormatter,
}

impl Agent {
    pub fn new(
        location_parser: LocationParser,
        intent_classifier: IntentClassifier,
        dispatcher: ServiceDispatcher,
    ) -> Self {
        Self {
            location_parser,
            intent_classifier,
            dispatcher,
            formatter: ResultFormatter::new(),
        }
    }

    pub async fn answer(&self, query: Query) -> Result<FinalResponse, ApiError> {
        if query.is_blank() {
            return Err(ApiError::validation("query must not be blank"));
        }

        let mut evidence = EvidenceTrail::new();
        let today = chrono::Utc::now().date_naive();

        // NER and top-level intent classification depend only on the raw
        // query, so they run concurrently.
        let (location_result, intent_result) = tokio::join!(
            self.location_parser.parse(&query),
            self.intent_classifier.classify(&query)
        );

        evidence.push(format!(
            "location_parser:resolved_{}_locations",
            location_result.resolved_locations.len()
        ));
        evidence.push(format!("intent_classifier:{}", intent_result.analysis_type));

        let location_name = location_result
            .primary_location
            .as_ref()
            .map(|l| l.display_name.clone())
            .unwrap_or_else(|| "unresolved location".to_string());

        let roi = location_result.primary_location.as_ref().map(|primary| {
            Roi::new(primary.geometry.clone(), primary.area_km2, primary.display_name.clone())
        });

        if location_result.roi_source == RoiSource::Default {
            evidence.push("location_parser:used_default_fallback");
        }

        let start = Instant::now();
        let outcome = self
            .dispatcher
            .dispatch(
                &query.text,
                query.session_id.as_deref(),
                &intent_result,
                roi.as_ref(),
                &location_name,
                today,
                &mut evidence,
            )
            .await?;
        let service_elapsed = start.elapsed().as_secs_f64();

        let intent_secs = intent_result.processing_time.as_secs_f64();
        let location_secs = location_result.processing_time.as_secs_f64();

        let response = match outcome {
            DispatchOutcome::Gee(result) => {
                let Some(roi) = roi else {
                    return Err(ApiError::new(ErrorType::ProcessingError, "GEE result with no ROI to attach"));
                };
                self.formatter.format_gee(
                    &query.text,
                    &roi,
                    &result,
                    intent_result.confidence,
                    &evidence,
                    intent_secs,
                    location_secs,
                )
            }
            DispatchOutcome::Search(result) => {
                let sources: Vec<serde_json::Value> = result
                    .sources
                    .iter()
                    .map(|s| {
                        serde_json::json!({
                            "title": s.title,
                            "url": s.url,
                            "score": s.score,
                            "published_date": s.published_date,
                        })
                    })
                    .collect();
                self.formatter.format_search(
                    &query.text,
                    roi.as_ref(),
                    &location_name,
                    &result.analysis,
                    sources,
                    result.quality_score,
                    intent_result.confidence,
                    &evidence,
                    service_elapsed,
                    intent_secs,
                    location_secs,
                )
            }
            DispatchOutcome::Rag { analysis, sources, confidence } => self.formatter.format_rag(
                &query.text,
                &analysis,
                sources,
                confidence,
                &evidence,
                service_elapsed,
                intent_secs,
                location_secs,
            ),
        };

        info!(analysis_type = %intent_result.analysis_type, "agent:answered");
        Ok(response)
    }
}
