//! Keyword fallback scorer: consulted whenever the LLM call errors,
//! times out, or returns something that doesn't parse into a known variant.
//! Never fails — every input, including empty strings, produces a result.

use crate::domain::{GeeSubIntent, ServiceType};

const GEE_KEYWORDS: &[&str] = &[
    "ndvi",
    "vegetation",
    "land use",
    "land cover",
    "lulc",
    "temperature",
    "heat island",
    "lst",
    "water",
    "flood",
    "soil",
    "crop",
    "population density",
    "transportation",
    "satellite",
    "remote sensing",
    "imagery",
];

const SEARCH_KEYWORDS: &[&str] = &[
    "weather", "news", "latest", "current", "today", "forecast", "price", "event",
];

const RAG_KEYWORDS: &[&str] = &[
    "document", "uploaded", "pdf", "my file", "according to the document",
];

/// `(service_type, confidence, reasoning)`. Empty/whitespace queries always
/// route to `SEARCH` at zero confidence.
pub fn classify_service_type(text: &str) -> (ServiceType, f64, String) {
    if text.trim().is_empty() {
        return (ServiceType::Search, 0.0, "keyword_fallback:empty_query".to_string());
    }

    let lower = text.to_lowercase();
    let gee_matches = count_matches(&lower, GEE_KEYWORDS);
    let search_matches = count_matches(&lower, SEARCH_KEYWORDS);
    let rag_matches = count_matches(&lower, RAG_KEYWORDS);

    let candidates = [
        (ServiceType::Gee, gee_matches, GEE_KEYWORDS.len()),
        (ServiceType::Search, search_matches, SEARCH_KEYWORDS.len()),
        (ServiceType::Rag, rag_matches, RAG_KEYWORDS.len()),
    ];

    let (service_type, matches, total) = candidates
        .into_iter()
        .max_by_key(|(_, matches, _)| *matches)
        .expect("candidates is non-empty");

    if matches == 0 {
        return (
            ServiceType::Search,
            0.1,
            "keyword_fallback:no_keyword_match".to_string(),
        );
    }

    let confidence = (matches as f64 / total as f64 + 0.1).min(0.9);
    (
        service_type,
        confidence,
        format!("keyword_fallback:{matches}_matches"),
    )
}

const NDVI_KEYWORDS: &[&str] = &["ndvi", "vegetation", "plant health", "greenery", "chlorophyll"];
const LULC_KEYWORDS: &[&str] = &[
    "land use", "land cover", "lulc", "classification", "built-up", "urbanization",
];
const LST_KEYWORDS: &[&str] = &["temperature", "heat island", "lst", "surface temperature", "thermal"];
const WATER_KEYWORDS: &[&str] = &["water", "flood", "river", "lake", "reservoir", "water body", "water bodies"];
const CLIMATE_KEYWORDS: &[&str] = &["climate", "rainfall", "precipitation", "monsoon pattern"];
const SOIL_KEYWORDS: &[&str] = &["soil", "moisture", "erosion"];
const POPULATION_KEYWORDS: &[&str] = &["population", "demographic", "density"];
const TRANSPORTATION_KEYWORDS: &[&str] = &["road", "transport", "traffic", "highway"];

/// Default sub-intent when nothing matches: `LULC` at `0.3`.
pub fn classify_sub_intent(text: &str) -> (GeeSubIntent, f64, String) {
    let lower = text.to_lowercase();
    let candidates = [
        (GeeSubIntent::Ndvi, NDVI_KEYWORDS),
        (GeeSubIntent::Lulc, LULC_KEYWORDS),
        (GeeSubIntent::Lst, LST_KEYWORDS),
        (GeeSubIntent::Water, WATER_KEYWORDS),
        (GeeSubIntent::Climate, CLIMATE_KEYWORDS),
        (GeeSubIntent::Soil, SOIL_KEYWORDS),
        (GeeSubIntent::Population, POPULATION_KEYWORDS),
        (GeeSubIntent::Transportation, TRANSPORTATION_KEYWORDS),
    ];

    let (sub_intent, matches, total) = candidates
        .into_iter()
        .map(|(sub, words)| (sub, count_matches(&lower, words), words.len()))
        .max_by_key(|(_, matches, _)| *matches)
        .expect("candidates is non-empty");

    if matches == 0 {
        return (
            GeeSubIntent::Lulc,
            0.3,
            "keyword_fallback:default_sub_intent".to_string(),
        );
    }

    let confidence = (matches as f64 / total as f64 + 0.1).min(0.9);
    (sub_intent, confidence, format!("keyword_fallback:{matches}_matches"))
}

fn count_matches(lower_text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| lower_text.contains(*k)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_routes_to_search_at_zero_confidence() {
        let (service_type, confidence, _) = classify_service_type("");
        assert_eq!(service_type, ServiceType::Search);
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn whitespace_query_routes_to_search() {
        let (service_type, ..) = classify_service_type("   ");
        assert_eq!(service_type, ServiceType::Search);
    }

    #[test]
    fn ndvi_keywords_route_to_gee() {
        let (service_type, ..) = classify_service_type("NDVI vegetation health around Mumbai");
        assert_eq!(service_type, ServiceType::Gee);
    }

    #[test]
    fn no_match_defaults_to_lulc_sub_intent() {
        let (sub, confidence, _) = classify_sub_intent("tell me about this area");
        assert_eq!(sub, GeeSubIntent::Lulc);
        assert_eq!(confidence, 0.3);
    }

    #[test]
    fn water_keywords_route_to_water_sub_intent() {
        let (sub, ..) = classify_sub_intent("water bodies in Delhi");
        assert_eq!(sub, GeeSubIntent::Water);
    }
}
