//! IntentClassifier: two-stage LLM classification with a deterministic
//! keyword fallback, plus unconditional parameter extraction.

mod keywords;
mod params;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use crate::backends::IntentLlm;
use crate::domain::{GeeSubIntent, IntentResult, Query, ServiceType};

const TOP_LEVEL_SYSTEM_PROMPT: &str = r#"Classify the user's geospatial query.
Respond with a JSON object {"intent": "GEE"|"RAG"|"SEARCH", "confidence": number, "reasoning": string}.
GEE is for satellite/remote-sensing analysis requests (vegetation, land use, temperature, water, etc).
RAG is for questions about documents the user has uploaded.
SEARCH is for anything else, including current events and general knowledge."#;

const SUB_INTENT_SYSTEM_PROMPT: &str = r#"Classify the remote-sensing sub-intent of the query.
Respond with a JSON object {"sub_intent": "NDVI"|"LULC"|"LST"|"WATER"|"CLIMATE"|"SOIL"|"POPULATION"|"TRANSPORTATION", "confidence": number, "reasoning": string}."#;

pub struct IntentClassifier {
    llm: Arc<dyn IntentLlm>,
    deadline: Duration,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn IntentLlm>, deadline: Duration) -> Self {
        Self { llm, deadline }
    }

    pub async fn classify(&self, query: &Query) -> IntentResult {
        let start = Instant::now();
        debug!(query = %query.text, "intent_classifier:start");

        let (service_type, confidence, reasoning, model_used) =
            self.classify_top_level(&query.text).await;

        let (gee_sub_intent, gee_confidence, sub_reasoning) = if service_type == ServiceType::Gee
        {
            let (sub, sub_confidence, sub_reason) = self.classify_sub_intent(&query.text).await;
            (Some(sub), Some(sub_confidence), Some(sub_reason))
        } else {
            (None, None, None)
        };

        let today = chrono::Utc::now().date_naive();
        let time_range = params::extract_time_range(&query.text, today);
        let metrics = params::extract_metrics(&query.text);

        let analysis_type = IntentResult::analysis_type_for(service_type, gee_sub_intent);
        let combined_reasoning = match sub_reasoning {
            Some(sub) => format!("{reasoning}; {sub}"),
            None => reasoning,
        };

        let elapsed = start.elapsed();
        let result = IntentResult {
            service_type,
            confidence,
            gee_sub_intent,
            gee_confidence,
            analysis_type,
            time_range,
            metrics,
            reasoning: combined_reasoning,
            processing_time: elapsed,
            model_used,
            success: true,
            error: None,
        };

        debug_assert!(result.check_invariants().is_ok());
        result
    }

    async fn classify_top_level(&self, text: &str) -> (ServiceType, f64, String, String) {
        let call = tokio::time::timeout(
            self.deadline,
            self.llm.classify(TOP_LEVEL_SYSTEM_PROMPT, text),
        )
        .await;

        match call {
            Ok(Ok(value)) => match parse_top_level(&value) {
                Some((service_type, confidence, reasoning)) => {
                    (service_type, confidence, reasoning, self.llm.model_name().to_string())
                }
                None => {
                    warn!("intent LLM returned an unrecognized intent, falling back");
                    let (service_type, confidence, reasoning) =
                        keywords::classify_service_type(text);
                    (service_type, confidence, reasoning, "keyword_fallback".to_string())
                }
            },
            Ok(Err(e)) => {
                warn!(error = %e, "intent LLM transport error, falling back");
                let (service_type, confidence, reasoning) = keywords::classify_service_type(text);
                (service_type, confidence, reasoning, "keyword_fallback".to_string())
            }
            Err(_) => {
                warn!("intent LLM timed out, falling back");
                let (service_type, confidence, reasoning) = keywords::classify_service_type(text);
                (service_type, confidence, reasoning, "keyword_fallback".to_string())
            }
        }
    }

    async fn classify_sub_intent(&self, text: &str) -> (GeeSubIntent, f64, String) {
        let call = tokio::time::timeout(
            self.deadline,
            self.llm.classify(SUB_INTENT_SYSTEM_PROMPT, text),
        )
        .await;

        match call {
            Ok(Ok(value)) => parse_sub_intent(&value).unwrap_or_else(|| {
                warn!("intent LLM returned an unrecognized sub_intent, falling back");
                keywords::classify_sub_intent(text)
            }),
            Ok(Err(e)) => {
                warn!(error = %e, "sub-intent LLM transport error, falling back");
                keywords::classify_sub_intent(text)
            }
            Err(_) => {
                warn!("sub-intent LLM timed out, falling back");
                keywords::classify_sub_intent(text)
            }
        }
    }
}

fn parse_top_level(value: &Value) -> Option<(ServiceType, f64, String)> {
    let intent = value.get("intent")?.as_str()?;
    let service_type = match intent.to_uppercase().as_str() {
        "GEE" => ServiceType::Gee,
        "RAG" => ServiceType::Rag,
        "SEARCH" => ServiceType::Search,
        _ => return None,
    };
    let confidence = value.get("confidence").and_then(Value::as_f64).unwrap_or(0.5);
    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or("model_classification")
        .to_string();
    Some((service_type, confidence.clamp(0.0, 1.0), reasoning))
}

fn parse_sub_intent(value: &Value) -> Option<(GeeSubIntent, f64, String)> {
    let sub = value.get("sub_intent")?.as_str()?;
    let sub_intent = GeeSubIntent::ALL
        .into_iter()
        .find(|s| s.as_lowercase().eq_ignore_ascii_case(sub))?;
    let confidence = value.get("confidence").and_then(Value::as_f64).unwrap_or(0.5);
    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or("model_classification")
        .to_string();
    Some((sub_intent, confidence.clamp(0.0, 1.0), reasoning))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use async_trait::async_trait;

    struct StubLlm {
        response: Value,
        fail: bool,
    }

    #[async_trait]
    impl IntentLlm for StubLlm {
        async fn classify(&self, _system_prompt: &str, _user_query: &str) -> Result<Value, ApiError> {
            if self.fail {
                Err(ApiError::new(crate::error::ErrorType::IntentUnavailable, "down"))
            } else {
                Ok(self.response.clone())
            }
        }

        fn model_name(&self) -> &str {
            "stub-model"
        }
    }

    #[tokio::test]
    async fn falls_back_to_keywords_on_transport_error() {
        let llm = Arc::new(StubLlm {
            response: Value::Null,
            fail: true,
        });
        let classifier = IntentClassifier::new(llm, Duration::from_secs(1));
        let result = classifier.classify(&Query::new("NDVI vegetation in Mumbai")).await;
        assert!(result.success);
        assert_eq!(result.service_type, ServiceType::Gee);
        assert_eq!(result.model_used, "keyword_fallback");
    }

    #[tokio::test]
    async fn empty_query_never_fails() {
        let llm = Arc::new(StubLlm {
            response: Value::Null,
            fail: true,
        });
        let classifier = IntentClassifier::new(llm, Duration::from_secs(1));
        let result = classifier.classify(&Query::new("")).await;
        assert!(result.success);
        assert_eq!(result.service_type, ServiceType::Search);
    }

    #[tokio::test]
    async fn gee_response_invariant_holds() {
        let llm = Arc::new(StubLlm {
            response: serde_json::json!({"intent": "GEE", "confidence": 0.9, "reasoning": "ndvi keywords"}),
            fail: false,
        });
        let classifier = IntentClassifier::new(llm, Duration::from_secs(1));
        let result = classifier.classify(&Query::new("ndvi for mumbai")).await;
        assert!(result.check_invariants().is_ok());
        assert!(result.gee_sub_intent.is_some());
    }
}
