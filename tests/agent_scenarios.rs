//! End-to-end runs of `Agent::answer` against stub collaborators, covering
//! one scenario per route the dispatcher can take.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use geoqa::agent::Agent;
use geoqa::backends::{
    EntityExtractor, Geocoder, ImageryBackend, IntentLlm, SearchDepth, SyntheticImageryBackend,
    WebSearch, WebSearchResult,
};
use geoqa::dispatch::{DispatchConfig, ServiceDispatcher};
use geoqa::domain::{LocationEntity, LocationEntityType, Query, ResolvedLocation};
use geoqa::engine::AnalysisEngine;
use geoqa::error::{ApiError, ErrorType};
use geoqa::geoutil;
use geoqa::intent::IntentClassifier;
use geoqa::location::LocationParser;
use geoqa::synth::ResponseSynthesizer;

struct StubExtractor {
    entities: Vec<LocationEntity>,
}

#[async_trait]
impl EntityExtractor for StubExtractor {
    async fn extract(&self, _query: &str) -> Result<Vec<LocationEntity>, ApiError> {
        Ok(self.entities.clone())
    }
}

struct StubGeocoder {
    locations: HashMap<String, ResolvedLocation>,
}

#[async_trait]
impl Geocoder for StubGeocoder {
    async fn search(
        &self,
        query: &str,
        _country_code: Option<&str>,
        _limit: u32,
    ) -> Result<Vec<ResolvedLocation>, ApiError> {
        Ok(self.locations.get(query).cloned().into_iter().collect())
    }
}

struct StubLlm {
    top_level: Value,
    sub_intent: Option<Value>,
}

#[async_trait]
impl IntentLlm for StubLlm {
    async fn classify(&self, system_prompt: &str, _user_query: &str) -> Result<Value, ApiError> {
        if system_prompt.contains("sub-intent") {
            Ok(self.sub_intent.clone().unwrap_or(Value::Null))
        } else {
            Ok(self.top_level.clone())
        }
    }

    fn model_name(&self) -> &str {
        "stub-model"
    }
}

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

fn resolved_location(name: &str, lng: f64, lat: f64, radius_km: f64, importance: f64) -> ResolvedLocation {
    let geometry = geoutil::from_geo(&geo::Geometry::Polygon(geoutil::buffer_box(lng, lat, radius_km)));
    let area_km2 = geoutil::area_km2(&geometry);
    ResolvedLocation {
        display_name: name.to_string(),
        center: (lng, lat),
        geometry,
        area_km2,
        importance,
        place_id: name.to_string(),
    }
}

/// A `ResolvedLocation` whose reported area is fixed independently of its
/// (small, valid) geometry, for exercising the area gate without having to
/// construct a genuinely continent-sized polygon.
fn resolved_location_with_area(name: &str, lng: f64, lat: f64, area_km2: f64, importance: f64) -> ResolvedLocation {
    let mut location = resolved_location(name, lng, lat, 5.0, importance);
    location.area_km2 = area_km2;
    location
}

fn build_agent(
    extractor: Arc<dyn EntityExtractor>,
    geocoder: Arc<dyn Geocoder>,
    llm: Arc<dyn IntentLlm>,
    search: Arc<dyn WebSearch>,
    max_roi_km2: f64,
) -> Agent {
    let location_parser = LocationParser::new(extractor, geocoder, Duration::from_secs(5));
    let intent_classifier = IntentClassifier::new(llm, Duration::from_secs(5));
    let imagery: Arc<dyn ImageryBackend> = Arc::new(SyntheticImageryBackend::new());
    let engine = Arc::new(AnalysisEngine::new(imagery, 4));
    let synthesizer = Arc::new(ResponseSynthesizer::new(search));
    let dispatcher = ServiceDispatcher::new(
        engine,
        synthesizer,
        None,
        DispatchConfig {
            max_roi_km2,
            read_timeout_cap_secs: 30,
        },
    );
    Agent::new(location_parser, intent_classifier, dispatcher)
}

fn entity(name: &str) -> LocationEntity {
    LocationEntity {
        matched_name: name.to_string(),
        kind: LocationEntityType::City,
        confidence: 0.9,
    }
}

#[tokio::test]
async fn ndvi_query_over_mumbai_returns_vegetation_summary() {
    let mut locations = HashMap::new();
    locations.insert("Mumbai".to_string(), resolved_location("Mumbai, India", 72.8777, 19.0760, 20.0, 0.9));

    let agent = build_agent(
        Arc::new(StubExtractor { entities: vec![entity("Mumbai")] }),
        Arc::new(StubGeocoder { locations }),
        Arc::new(StubLlm {
            top_level: serde_json::json!({"intent": "GEE", "confidence": 0.9, "reasoning": "vegetation keywords"}),
            sub_intent: Some(serde_json::json!({"sub_intent": "NDVI", "confidence": 0.85, "reasoning": "ndvi mention"})),
        }),
        Arc::new(StubSearch { results: vec![] }),
        35_000.0,
    );

    let response = agent
        .answer(Query::new("What is the vegetation health in Mumbai?"))
        .await
        .expect("ndvi query should succeed");

    assert!(response.roi.is_some());
    assert!(response.analysis_data.is_some());
    assert!(response.summary.to_lowercase().contains("ndvi") || response.summary.to_lowercase().contains("vegetation"));
    assert!(response.confidence.unwrap() > 0.0);
}

#[tokio::test]
async fn water_query_over_delhi_flags_simulated_seasonal_split() {
    let mut locations = HashMap::new();
    locations.insert("Delhi".to_string(), resolved_location("Delhi, India", 77.1025, 28.7041, 20.0, 0.9));

    let agent = build_agent(
        Arc::new(StubExtractor { entities: vec![entity("Delhi")] }),
        Arc::new(StubGeocoder { locations }),
        Arc::new(StubLlm {
            top_level: serde_json::json!({"intent": "GEE", "confidence": 0.88, "reasoning": "water body keywords"}),
            sub_intent: Some(serde_json::json!({"sub_intent": "WATER", "confidence": 0.8, "reasoning": "water mention"})),
        }),
        Arc::new(StubSearch { results: vec![] }),
        35_000.0,
    );

    let response = agent
        .answer(Query::new("How much surface water is around Delhi?"))
        .await
        .expect("water query should succeed");

    assert!(response.summary.to_lowercase().contains("water"));
    assert_eq!(response.metadata["simulated"], Value::Bool(true));
}

#[tokio::test]
async fn current_events_query_routes_to_search_synthesis() {
    let mut locations = HashMap::new();
    locations.insert("Chennai".to_string(), resolved_location("Chennai, India", 80.2707, 13.0827, 20.0, 0.9));

    let agent = build_agent(
        Arc::new(StubExtractor { entities: vec![entity("Chennai")] }),
        Arc::new(StubGeocoder { locations }),
        Arc::new(StubLlm {
            top_level: serde_json::json!({"intent": "SEARCH", "confidence": 0.75, "reasoning": "current weather is not a GEE indicator"}),
            sub_intent: None,
        }),
        Arc::new(StubSearch {
            results: vec![WebSearchResult {
                title: "Chennai weather forecast".to_string(),
                url: "https://weather.example.invalid/chennai".to_string(),
                content: "Chennai is expecting a high of 34°C this week with monsoon showers.".to_string(),
                score: 0.9,
                published_date: Some("2026-07-28".to_string()),
            }],
        }),
        35_000.0,
    );

    let response = agent
        .answer(Query::new("What's the weather like in Chennai this week?"))
        .await
        .expect("search query should succeed");

    let sources = response.sources.expect("search path should attach sources");
    assert!(!sources.is_empty());
    assert!(response.summary.contains("sources"));
}

#[tokio::test]
async fn oversized_roi_is_rejected_before_the_engine_runs() {
    let mut locations = HashMap::new();
    locations.insert(
        "Madhya Pradesh".to_string(),
        resolved_location_with_area("Madhya Pradesh, India", 78.6569, 22.9734, 308_245.0, 0.7),
    );

    let agent = build_agent(
        Arc::new(StubExtractor { entities: vec![entity("Madhya Pradesh")] }),
        Arc::new(StubGeocoder { locations }),
        Arc::new(StubLlm {
            top_level: serde_json::json!({"intent": "GEE", "confidence": 0.8, "reasoning": "land use keywords"}),
            sub_intent: Some(serde_json::json!({"sub_intent": "LULC", "confidence": 0.8, "reasoning": "land use mention"})),
        }),
        Arc::new(StubSearch { results: vec![] }),
        35_000.0,
    );

    let err = agent
        .answer(Query::new("Classify land use across Madhya Pradesh"))
        .await
        .expect_err("an ROI this large should be rejected");

    assert_eq!(err.error_type, ErrorType::AreaTooLarge);
}

#[tokio::test]
async fn heat_island_query_over_bangalore_carries_uhi_details() {
    let mut locations = HashMap::new();
    locations.insert("Bangalore".to_string(), resolved_location("Bangalore, India", 77.5946, 12.9716, 20.0, 0.9));

    let agent = build_agent(
        Arc::new(StubExtractor { entities: vec![entity("Bangalore")] }),
        Arc::new(StubGeocoder { locations }),
        Arc::new(StubLlm {
            top_level: serde_json::json!({"intent": "GEE", "confidence": 0.87, "reasoning": "heat island keywords"}),
            sub_intent: Some(serde_json::json!({"sub_intent": "LST", "confidence": 0.82, "reasoning": "temperature mention"})),
        }),
        Arc::new(StubSearch { results: vec![] }),
        35_000.0,
    );

    let response = agent
        .answer(Query::new("Is there a heat island effect in Bangalore?"))
        .await
        .expect("lst query should succeed");

    let analysis_data = response.analysis_data.expect("gee path should attach analysis data");
    assert!(analysis_data["map_stats"]["uhi_details"].is_object());
}

#[tokio::test]
async fn blank_query_is_rejected_as_a_validation_error() {
    let agent = build_agent(
        Arc::new(StubExtractor { entities: vec![] }),
        Arc::new(StubGeocoder { locations: HashMap::new() }),
        Arc::new(StubLlm {
            top_level: serde_json::json!({"intent": "SEARCH", "confidence": 0.0, "reasoning": "empty query"}),
            sub_intent: None,
        }),
        Arc::new(StubSearch { results: vec![] }),
        35_000.0,
    );

    let err = agent
        .answer(Query::new("   "))
        .await
        .expect_err("a blank query must be rejected before any pipeline stage runs");

    assert_eq!(err.error_type, ErrorType::ValidationError);
}
