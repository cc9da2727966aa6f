use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Gee,
    Search,
    Rag,
}

/// The eight sub-intents the top-level classifier's second stage can name.
/// Only `Ndvi`, `Lulc`, `Lst` and `Water` have a backing `AnalysisEngine`
/// implementation (`Indicator`); the rest are recognized but route to the
/// search synthesizer because no analyzer exists for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GeeSubIntent {
    Ndvi,
    Lulc,
    Lst,
    Water,
    Climate,
    Soil,
    Population,
    Transportation,
}

impl GeeSubIntent {
    pub const ALL: [GeeSubIntent; 8] = [
        Self::Ndvi,
        Self::Lulc,
        Self::Lst,
        Self::Water,
        Self::Climate,
        Self::Soil,
        Self::Population,
        Self::Transportation,
    ];

    pub fn as_lowercase(self) -> &'static str {
        match self {
            Self::Ndvi => "ndvi",
            Self::Lulc => "lulc",
            Self::Lst => "lst",
            Self::Water => "water",
            Self::Climate => "climate",
            Self::Soil => "soil",
            Self::Population => "population",
            Self::Transportation => "transportation",
        }
    }

    pub fn indicator(self) -> Option<Indicator> {
        match self {
            Self::Ndvi => Some(Indicator::Ndvi),
            Self::Lulc => Some(Indicator::Lulc),
            Self::Lst => Some(Indicator::Lst),
            Self::Water => Some(Indicator::Water),
            _ => None,
        }
    }
}

/// The four indicators the `AnalysisEngine` knows how to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Ndvi,
    Lst,
    Lulc,
    Water,
}

impl Indicator {
    pub const ALL: [Indicator; 4] = [Self::Ndvi, Self::Lst, Self::Lulc, Self::Water];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ndvi => "ndvi",
            Self::Lst => "lst",
            Self::Lulc => "lulc",
            Self::Water => "water",
        }
    }

    pub const fn is_continuous(self) -> bool {
        matches!(self, Self::Ndvi | Self::Lst)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntentResult {
    pub service_type: ServiceType,
    pub confidence: f64,
    pub gee_sub_intent: Option<GeeSubIntent>,
    pub gee_confidence: Option<f64>,
    pub analysis_type: String,
    pub time_range: Option<TimeRange>,
    pub metrics: Vec<String>,
    pub reasoning: String,
    pub processing_time: Duration,
    pub model_used: String,
    pub success: bool,
    pub error: Option<String>,
}

impl IntentResult {
    /// Invariant: `service_type == Gee` implies `gee_sub_intent.is_some()`.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.service_type == ServiceType::Gee && self.gee_sub_intent.is_none() {
            return Err("GEE service_type requires a gee_sub_intent".to_string());
        }
        Ok(())
    }

    pub fn analysis_type_for(service_type: ServiceType, sub_intent: Option<GeeSubIntent>) -> String {
        match (service_type, sub_intent) {
            (ServiceType::Gee, Some(sub)) => sub.as_lowercase().to_string(),
            _ => "general".to_string(),
        }
    }
}
