//! Static keyword fallback consulted only when the `EntityExtractor`
//! transport call itself errors. A handful of country/state/major
//! city tokens, not an exhaustive place database.

use crate::domain::{LocationEntity, LocationEntityType};

const COUNTRIES: &[&str] = &["india", "pakistan", "bangladesh", "nepal", "sri lanka"];

const STATES: &[&str] = &[
    "maharashtra",
    "madhya pradesh",
    "punjab",
    "karnataka",
    "tamil nadu",
    "west bengal",
    "rajasthan",
    "gujarat",
    "kerala",
    "uttar pradesh",
];

const CITIES: &[&str] = &[
    "mumbai",
    "delhi",
    "bangalore",
    "bengaluru",
    "kolkata",
    "chennai",
    "hyderabad",
    "pune",
    "ahmedabad",
    "ludhiana",
];

/// Scans `text` case-insensitively for known place tokens, longest-match
/// first so e.g. "madhya pradesh" wins over any single-word overlap.
pub fn scan(text: &str) -> Vec<LocationEntity> {
    let lower = text.to_lowercase();
    let mut found = Vec::new();

    for (table, kind) in [
        (STATES, LocationEntityType::State),
        (CITIES, LocationEntityType::City),
        (COUNTRIES, LocationEntityType::Country),
    ] {
        for &token in table {
            if lower.contains(token) {
                found.push(LocationEntity {
                    matched_name: token.to_string(),
                    kind,
                    confidence: 0.6,
                });
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_state_over_nothing() {
        let entities = scan("land use of Madhya Pradesh this year");
        assert!(entities.iter().any(|e| e.matched_name == "madhya pradesh"));
    }

    #[test]
    fn empty_query_matches_nothing() {
        assert!(scan("").is_empty());
    }
}
