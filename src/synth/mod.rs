//! ResponseSynthesizer: multi-query fan-out over an
//! abstract `WebSearch` backend, regex metric extraction, quality scoring and
//! narrative assembly.

mod patterns;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Datelike;
use tracing::{debug, warn};

use crate::backends::{SearchDepth, WebSearch, WebSearchResult};
use crate::domain::GeeSubIntent;
use patterns::{extract_metrics, mentions_recent_year, ExtractedMetric, MetricKind};

const CREDIBLE_DOMAIN_HINTS: &[&str] = &[".gov", ".edu", "nasa.gov", "usgs.gov", "copernicus.eu", "esa.int"];
const PER_QUERY_DEADLINE: Duration = Duration::from_secs(10);
const MAX_QUERIES: usize = 5;

pub struct ResponseSynthesizer {
    search: Arc<dyn WebSearch>,
}

#[derive(Debug, Clone)]
pub struct SynthesisResult {
    pub analysis: String,
    pub sources: Vec<WebSearchResult>,
    pub quality_score: f64,
    pub metrics: HashMap<String, Vec<ExtractedMetric>>,
}

impl ResponseSynthesizer {
    pub fn new(search: Arc<dyn WebSearch>) -> Self {
        Self { search }
    }

    pub async fn synthesize(
        &self,
        query_text: &str,
        location_name: &str,
        sub_intent: Option<GeeSubIntent>,
        today: chrono::NaiveDate,
    ) -> SynthesisResult {
        let start = Instant::now();
        let queries = self.generate_queries(query_text, location_name, sub_intent);
        debug!(count = queries.len(), "synth:queries_generated");

        let futures = queries.iter().map(|q| {
            let search = Arc::clone(&self.search);
            let query = q.clone();
            async move {
                tokio::time::timeout(
                    PER_QUERY_DEADLINE,
                    search.search(&query, 5, None, None, SearchDepth::Basic),
                )
                .await
                .ok()
                .and_then(Result::ok)
                .unwrap_or_default()
            }
        });

        let results: Vec<WebSearchResult> = futures::future::join_all(futures)
            .await
            .into_iter()
            .flatten()
            .collect();

        if results.is_empty() {
            warn!("synth:no_results");
        }

        let allowed_kinds = kinds_for_sub_intent(sub_intent);
        let mut metrics: HashMap<String, Vec<ExtractedMetric>> = HashMap::new();
        for result in &results {
            for metric in extract_metrics(&result.content, &allowed_kinds) {
                metrics
                    .entry(format!("{:?}", metric.kind))
                    .or_default()
                    .push(metric);
            }
        }

        let quality_score = self.score_quality(&results, &metrics, today);
        let analysis = self.build_narrative(query_text, location_name, &results, &metrics, quality_score);

        debug!(elapsed = start.elapsed().as_secs_f64(), "synth:done");

        SynthesisResult {
            analysis,
            sources: results,
            quality_score,
            metrics,
        }
    }

    fn generate_queries(&self, query_text: &str, location_name: &str, sub_intent: Option<GeeSubIntent>) -> Vec<String> {
        let mut queries = Vec::new();
        let indicator_terms = sub_intent.map(GeeSubIntent::as_lowercase).unwrap_or("climate data");

        queries.push(format!("{indicator_terms} {location_name} latest data"));
        queries.push(format!("{query_text} {location_name}"));
        queries.push(format!("{indicator_terms} {location_name} site:*.gov OR site:*.edu"));
        for hint in CREDIBLE_DOMAIN_HINTS.iter().take(2) {
            queries.push(format!("{indicator_terms} {location_name} {hint}"));
        }

        queries.truncate(MAX_QUERIES);
        queries
    }

    fn score_quality(
        &self,
        results: &[WebSearchResult],
        metrics: &HashMap<String, Vec<ExtractedMetric>>,
        today: chrono::NaiveDate,
    ) -> f64 {
        if results.is_empty() {
            return 0.0;
        }

        let credibility = results
            .iter()
            .filter(|r| CREDIBLE_DOMAIN_HINTS.iter().any(|d| r.url.contains(d)))
            .count() as f64
            / results.len() as f64;

        let recency = results
            .iter()
            .filter(|r| mentions_recent_year(&r.content, today.year()))
            .count() as f64
            / results.len() as f64;

        let completeness = (metrics.len() as f64 / 6.0).min(1.0);

        let accuracy = {
            let all: Vec<f64> = metrics.values().flatten().map(|m| m.confidence).collect();
            if all.is_empty() {
                0.0
            } else {
                all.iter().sum::<f64>() / all.len() as f64
            }
        };

        (0.3 * credibility + 0.2 * recency + 0.25 * completeness + 0.25 * accuracy).clamp(0.0, 1.0)
    }

    fn build_narrative(
        &self,
        query_text: &str,
        location_name: &str,
        results: &[WebSearchResult],
        metrics: &HashMap<String, Vec<ExtractedMetric>>,
        quality_score: f64,
    ) -> String {
        let mut sections = Vec::new();
        sections.push(format!("📝 Query: {query_text}"));
        sections.push(format!("📍 Location: {location_name}"));
        sections.push(format!("🔎 Data quality: {:.2}", quality_score));

        if metrics.is_empty() {
            sections.push("No quantitative metrics could be extracted from search results.".to_string());
        } else {
            let mut lines = vec!["Top metrics found:".to_string()];
            for (kind, values) in metrics {
                if let Some(best) = values.iter().max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap()) {
                    lines.push(format!("  - {kind}: {:.2} (from \"{}\")", best.value, best.raw));
                }
            }
            sections.push(lines.join("\n"));
        }

        sections.push(format!("Sources consulted: {}", results.len()));
        if results.is_empty() {
            sections.push(
                "Limitations: no search results were available; this answer could not be corroborated.".to_string(),
            );
        } else {
            sections.push(
                "Limitations: figures are drawn from third-party web sources, not direct satellite measurement."
                    .to_string(),
            );
            sections.push("Recommendation: cross-check against an authoritative government or scientific source.".to_string());
        }

        sections.join("\n\n")
    }
}

fn kinds_for_sub_intent(sub_intent: Option<GeeSubIntent>) -> Vec<MetricKind> {
    match sub_intent {
        Some(GeeSubIntent::Lst) | Some(GeeSubIntent::Climate) => {
            vec![MetricKind::Temperature, MetricKind::Percentage, MetricKind::Coordinates]
        }
        Some(GeeSubIntent::Ndvi) => vec![MetricKind::Ndvi, MetricKind::Percentage, MetricKind::AreaKm2],
        Some(GeeSubIntent::Water) | Some(GeeSubIntent::Lulc) | Some(GeeSubIntent::Soil) => {
            vec![MetricKind::Percentage, MetricKind::AreaKm2, MetricKind::Coordinates]
        }
        Some(GeeSubIntent::Population) => vec![MetricKind::Population, MetricKind::Percentage],
        _ => vec![
            MetricKind::Temperature,
            MetricKind::Ndvi,
            MetricKind::AreaKm2,
            MetricKind::Percentage,
            MetricKind::Population,
            MetricKind::Coordinates,
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::error::ApiError;

    struct StubSearch {
        results: Vec<WebSearchResult>,
    }

    #[async_trait]
    impl WebSearch for StubSearch {
        async fn search(
            &self,
            _query: &str,
            _max_results: u32,
            _include_domains: Option<&[String]>,
            _exclude_domains: Option<&[String]>,
            _depth: SearchDepth,
        ) -> Result<Vec<WebSearchResult>, ApiError> {
            Ok(self.results.clone())
        }
    }

    #[tokio::test]
    async fn synthesizes_narrative_with_metrics() {
        let stub = StubSearch {
            results: vec![WebSearchResult {
                title: "NOAA climate report".to_string(),
                url: "https://noaa.gov/report".to_string(),
                content: "In 2024 the average temperature reached 38.2°C across the region.".to_string(),
                score: 0.9,
                published_date: Some("2024-06-01".to_string()),
            }],
        };
        let synthesizer = ResponseSynthesizer::new(Arc::new(stub));
        let today = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let result = synthesizer
            .synthesize("heat wave Chennai", "Chennai, India", Some(GeeSubIntent::Climate), today)
            .await;
        assert!(result.analysis.contains("Chennai"));
        assert!(result.quality_score > 0.0);
        assert!(!result.sources.is_empty());
    }

    #[tokio::test]
    async fn handles_empty_search_results() {
        let stub = StubSearch { results: vec![] };
        let synthesizer = ResponseSynthesizer::new(Arc::new(stub));
        let today = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let result = synthesizer.synthesize("weather", "Nowhere", None, today).await;
        assert_eq!(result.quality_score, 0.0);
        assert!(result.analysis.contains("Limitations"));
    }
}
