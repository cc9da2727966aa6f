use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::domain::{LocationEntity, LocationEntityType};
use crate::error::ApiError;

use super::{EntityExtractor, IntentLlm};

/// Canonical `EntityExtractor`/`IntentLlm` adapter: an OpenAI-chat-compatible
/// endpoint (OpenRouter), configured from `OPENROUTER_API_KEY` and
/// `OPENROUTER_INTENT_MODEL`.
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenRouterClient {
    pub fn new(http: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            http,
            api_key,
            model,
            base_url: "https://openrouter.ai/api/v1/chat/completions".to_string(),
        }
    }

    /// Overrides the endpoint URL. Only ever needed to point this client at
    /// a stub server in tests.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    async fn chat_json(&self, system_prompt: &str, user_query: &str) -> Result<Value, ApiError> {
        let body = json!({
            "model": self.model,
            "temperature": 0.1,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_query },
            ],
        });

        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::new(crate::error::ErrorType::NerUnavailable, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ApiError::new(
                crate::error::ErrorType::NerUnavailable,
                format!("OpenRouter returned status {}", response.status()),
            ));
        }

        #[derive(Deserialize)]
        struct ChatChoice {
            message: ChatMessage,
        }
        #[derive(Deserialize)]
        struct ChatMessage {
            content: String,
        }
        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<ChatChoice>,
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ApiError::new(crate::error::ErrorType::NerUnavailable, e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                ApiError::new(crate::error::ErrorType::NerUnavailable, "empty choices")
            })?;

        serde_json::from_str(&content).map_err(|e| {
            ApiError::new(
                crate::error::ErrorType::NerUnavailable,
                format!("model returned non-JSON content: {e}"),
            )
        })
    }
}

const NER_SYSTEM_PROMPT: &str = r#"Extract location entities from the user's query.
Respond with a JSON object of shape {"entities": [{"matched_name": string, "type": "city"|"state"|"district"|"country"|"point"|"other", "confidence": number}]}.
If there are no locations, return {"entities": []}."#;

#[async_trait]
impl EntityExtractor for OpenRouterClient {
    async fn extract(&self, query: &str) -> Result<Vec<LocationEntity>, ApiError> {
        let value = self.chat_json(NER_SYSTEM_PROMPT, query).await?;

        let Some(entities) = value.get("entities").and_then(Value::as_array) else {
            debug!("NER response missing 'entities' array, treating as empty");
            return Ok(Vec::new());
        };

        let mut out = Vec::with_capacity(entities.len());
        for entity in entities {
            let Some(matched_name) = entity.get("matched_name").and_then(Value::as_str) else {
                continue;
            };
            let kind = match entity.get("type").and_then(Value::as_str) {
                Some("city") => LocationEntityType::City,
                Some("state") => LocationEntityType::State,
                Some("district") => LocationEntityType::District,
                Some("country") => LocationEntityType::Country,
                Some("point") => LocationEntityType::Point,
                _ => LocationEntityType::Other,
            };
            let confidence = entity
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(0.5)
                .clamp(0.0, 1.0);
            out.push(LocationEntity {
                matched_name: matched_name.to_string(),
                kind,
                confidence,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl IntentLlm for OpenRouterClient {
    async fn classify(&self, system_prompt: &str, user_query: &str) -> Result<Value, ApiError> {
        let value = self.chat_json(system_prompt, user_query).await?;
        if value.is_object() {
            Ok(value)
        } else {
            warn!("intent LLM returned a non-object JSON value");
            Err(ApiError::new(
                crate::error::ErrorType::IntentUnavailable,
                "expected a JSON object",
            ))
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
