//! Regex families for indicator-appropriate metric extraction.

use once_cell::sync::Lazy;
use regex::Regex;

pub static TEMPERATURE_C: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(-?\d+(?:\.\d+)?)\s*(?:°|deg(?:rees)?)?\s*C\b").unwrap());
pub static TEMPERATURE_F: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(-?\d+(?:\.\d+)?)\s*(?:°|deg(?:rees)?)?\s*F\b").unwrap());
pub static NDVI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)ndvi\D{0,10}(0?\.\d+|1\.0)").unwrap());
pub static AREA_KM2: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:,\d{3})*(?:\.\d+)?)\s*(?:km2|km\^2|km²|sq\.?\s*km)").unwrap());
pub static PERCENTAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").unwrap());
pub static POPULATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(k|m|b|million|billion|thousand)\b").unwrap());
pub static COORDINATES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(-?\d{1,3}\.\d+)\s*[,\s]\s*(-?\d{1,3}\.\d+)").unwrap());
pub static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricKind {
    Temperature,
    Ndvi,
    AreaKm2,
    Percentage,
    Population,
    Coordinates,
}

#[derive(Debug, Clone)]
pub struct ExtractedMetric {
    pub kind: MetricKind,
    pub value: f64,
    pub raw: String,
    pub confidence: f64,
}

fn population_multiplier(unit: &str) -> f64 {
    match unit.to_lowercase().as_str() {
        "k" | "thousand" => 1_000.0,
        "m" | "million" => 1_000_000.0,
        "b" | "billion" => 1_000_000_000.0,
        _ => 1.0,
    }
}

/// Extracts every metric family from `text`, filtering to the per-indicator
/// sanity bounds declared alongside each regex above. `allowed` selects
/// which families are relevant for the current indicator.
pub fn extract_metrics(text: &str, allowed: &[MetricKind]) -> Vec<ExtractedMetric> {
    let mut out = Vec::new();

    if allowed.contains(&MetricKind::Temperature) {
        for caps in TEMPERATURE_C.captures_iter(text) {
            if let Some(v) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) {
                if (-50.0..=60.0).contains(&v) {
                    out.push(ExtractedMetric {
                        kind: MetricKind::Temperature,
                        value: v,
                        raw: caps[0].to_string(),
                        confidence: 0.85,
                    });
                }
            }
        }
        for caps in TEMPERATURE_F.captures_iter(text) {
            if let Some(f) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) {
                let c = (f - 32.0) * 5.0 / 9.0;
                if (-50.0..=60.0).contains(&c) {
                    out.push(ExtractedMetric {
                        kind: MetricKind::Temperature,
                        value: c,
                        raw: caps[0].to_string(),
                        confidence: 0.8,
                    });
                }
            }
        }
    }

    if allowed.contains(&MetricKind::Ndvi) {
        for caps in NDVI.captures_iter(text) {
            if let Some(v) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) {
                if (0.0..=1.0).contains(&v) {
                    out.push(ExtractedMetric {
                        kind: MetricKind::Ndvi,
                        value: v,
                        raw: caps[0].to_string(),
                        confidence: 0.9,
                    });
                }
            }
        }
    }

    if allowed.contains(&MetricKind::AreaKm2) {
        for caps in AREA_KM2.captures_iter(text) {
            let raw_num = caps[1].replace(',', "");
            if let Ok(v) = raw_num.parse::<f64>() {
                if v >= 0.0 {
                    out.push(ExtractedMetric {
                        kind: MetricKind::AreaKm2,
                        value: v,
                        raw: caps[0].to_string(),
                        confidence: 0.75,
                    });
                }
            }
        }
    }

    if allowed.contains(&MetricKind::Percentage) {
        for caps in PERCENTAGE.captures_iter(text) {
            if let Some(v) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) {
                if (0.0..=100.0).contains(&v) {
                    out.push(ExtractedMetric {
                        kind: MetricKind::Percentage,
                        value: v,
                        raw: caps[0].to_string(),
                        confidence: 0.8,
                    });
                }
            }
        }
    }

    if allowed.contains(&MetricKind::Population) {
        for caps in POPULATION.captures_iter(text) {
            if let (Some(n), Some(unit)) = (caps.get(1), caps.get(2)) {
                if let Ok(v) = n.as_str().parse::<f64>() {
                    let value = v * population_multiplier(unit.as_str());
                    if value >= 0.0 {
                        out.push(ExtractedMetric {
                            kind: MetricKind::Population,
                            value,
                            raw: caps[0].to_string(),
                            confidence: 0.65,
                        });
                    }
                }
            }
        }
    }

    if allowed.contains(&MetricKind::Coordinates) {
        for caps in COORDINATES.captures_iter(text) {
            if let (Some(a), Some(b)) = (caps.get(1), caps.get(2)) {
                if let (Ok(lat), Ok(lng)) = (a.as_str().parse::<f64>(), b.as_str().parse::<f64>()) {
                    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) {
                        out.push(ExtractedMetric {
                            kind: MetricKind::Coordinates,
                            value: lat,
                            raw: caps[0].to_string(),
                            confidence: 0.7,
                        });
                    }
                }
            }
        }
    }

    out
}

pub fn mentions_recent_year(text: &str, current_year: i32) -> bool {
    YEAR.find_iter(text).any(|m| {
        m.as_str()
            .parse::<i32>()
            .map(|y| current_year - y <= 3)
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_celsius_temperature() {
        let metrics = extract_metrics("the average was 34.5°C last summer", &[MetricKind::Temperature]);
        assert_eq!(metrics.len(), 1);
        assert!((metrics[0].value - 34.5).abs() < 1e-9);
    }

    #[test]
    fn converts_fahrenheit_to_celsius() {
        let metrics = extract_metrics("it reached 98.6 F", &[MetricKind::Temperature]);
        assert_eq!(metrics.len(), 1);
        assert!((metrics[0].value - 37.0).abs() < 0.1);
    }

    #[test]
    fn rejects_out_of_range_ndvi() {
        let metrics = extract_metrics("NDVI value 1.5 recorded", &[MetricKind::Ndvi]);
        assert!(metrics.is_empty());
    }

    #[test]
    fn applies_population_multipliers() {
        let metrics = extract_metrics("population of 2.5M residents", &[MetricKind::Population]);
        assert_eq!(metrics.len(), 1);
        assert!((metrics[0].value - 2_500_000.0).abs() < 1.0);
    }
}
