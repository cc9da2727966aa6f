use geojson::Feature;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct FinalResponse {
    pub analysis: String,
    pub roi: Option<Feature>,
    pub summary: String,
    pub evidence: Vec<String>,
    pub metadata: Value,
    pub sources: Option<Vec<Value>>,
    pub confidence: Option<f64>,
    pub analysis_data: Option<Value>,
    pub service_result: Option<Value>,
}
