//! Abstract collaborators. The orchestration core depends only on these
//! traits; concrete HTTP adapters live alongside them and are swappable.

mod nominatim;
mod openrouter;
mod synthetic_imagery;
mod tavily;

pub use nominatim::NominatimClient;
pub use openrouter::OpenRouterClient;
pub use synthetic_imagery::SyntheticImageryBackend;
pub use tavily::TavilyClient;

use async_trait::async_trait;
use geo::Polygon;
use serde_json::Value;

use crate::domain::{LocationEntity, ResolvedLocation};
use crate::error::ApiError;

/// NER over the free-form query. Resilient by contract: a transport success
/// with an empty or malformed body yields `Ok(vec![])`, never an error.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, query: &str) -> Result<Vec<LocationEntity>, ApiError>;
}

/// Two independent LLM calls share this contract: the intent classifier and
/// the GEE sub-intent classifier are both just different system prompts over
/// the same transport.
#[async_trait]
pub trait IntentLlm: Send + Sync {
    /// Returns the raw JSON object the model produced (`{intent, confidence,
    /// reasoning}` or `{sub_intent, confidence, reasoning}`); the caller is
    /// responsible for the fallback discipline around malformed output.
    async fn classify(&self, system_prompt: &str, user_query: &str) -> Result<Value, ApiError>;

    fn model_name(&self) -> &str;
}

/// Geocodes a free-text place name into at most one resolved location,
/// Nominatim-style: highest source-reported importance wins, ties broken by
/// smaller area, oversized geometries rejected.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn search(
        &self,
        query: &str,
        country_code: Option<&str>,
        limit: u32,
    ) -> Result<Vec<ResolvedLocation>, ApiError>;
}

#[derive(Debug, Clone, Copy)]
pub struct VisParams {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone)]
pub struct MapId {
    pub url_format: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ReduceOptions {
    pub scale_m: f64,
    pub max_pixels: u64,
    pub best_effort: bool,
}

/// The satellite data access surface. Raw imagery access is explicitly out
/// of scope — this is the contract a plug-in (Earth Engine or otherwise)
/// must satisfy; `SyntheticImageryBackend` is the in-crate reference/test
/// implementation.
#[async_trait]
pub trait ImageryBackend: Send + Sync {
    /// Builds the composite collection for `dataset_id` filtered to the date
    /// window and ROI bounding box, and runs the reducers named in `stats`
    /// over `polygon`. Returns a flat map of stat name -> value (NaN/absent
    /// entries model "null" reductions the caller must detect).
    async fn reduce_region(
        &self,
        dataset_id: &str,
        polygon: &Polygon<f64>,
        date_start: chrono::NaiveDate,
        date_end: chrono::NaiveDate,
        stats: &[&str],
        options: ReduceOptions,
    ) -> Result<Value, ApiError>;

    /// Frequency histogram of a discrete band over `polygon`.
    async fn frequency_histogram(
        &self,
        dataset_id: &str,
        polygon: &Polygon<f64>,
        date_start: chrono::NaiveDate,
        date_end: chrono::NaiveDate,
        scale_m: f64,
    ) -> Result<std::collections::HashMap<String, f64>, ApiError>;

    /// Client-side point sampling fallback for histogram construction.
    async fn sample(
        &self,
        dataset_id: &str,
        polygon: &Polygon<f64>,
        scale_m: f64,
        num_pixels: u32,
    ) -> Result<Vec<Value>, ApiError>;

    /// Map-id / tile URL for the given visualization spec.
    async fn get_map_id(&self, dataset_id: &str, vis: VisParams) -> Result<MapId, ApiError>;

    /// Mean of `value_dataset_id` restricted to the pixels of `polygon`
    /// whose `mask_dataset_id` classification falls in `mask_classes` —
    /// the masked reduction UHI urban/rural means are built from. Returns
    /// `Ok(None)` when the window has no pixels in the mask, which the
    /// caller treats the same as an insufficient-pixel-count candidate.
    async fn reduce_masked_mean(
        &self,
        value_dataset_id: &str,
        mask_dataset_id: &str,
        polygon: &Polygon<f64>,
        date_start: chrono::NaiveDate,
        date_end: chrono::NaiveDate,
        mask_classes: &[&str],
        scale_m: f64,
    ) -> Result<Option<f64>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct WebSearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
    pub score: f64,
    pub published_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDepth {
    Basic,
    Advanced,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        max_results: u32,
        include_domains: Option<&[String]>,
        exclude_domains: Option<&[String]>,
        depth: SearchDepth,
    ) -> Result<Vec<WebSearchResult>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub analysis: String,
    pub sources: Vec<Value>,
    pub confidence: f64,
}

/// Document ingestion/embedding is out of scope; only the contract is
/// specified here.
#[async_trait]
pub trait RagService: Send + Sync {
    async fn ask(
        &self,
        query: &str,
        session_id: &str,
        k: u32,
        temperature: f64,
    ) -> Result<RagAnswer, ApiError>;

    /// Whether this session has documents uploaded for RAG to answer from.
    async fn has_documents(&self, session_id: &str) -> bool;
}
