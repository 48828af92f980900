//! Gemini on Vertex AI.
//!
//! Chat history is held client-side: every call posts the full history plus
//! the new user message to `generateContent`, and the exchange is appended to
//! the history only when the call succeeds.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{ConfigError, LlmError, LlmErrorKind};
use crate::llm::{ChatBackend, ChatSession};

/// Shared Vertex AI client. Construct once, then create one session per conversation.
#[derive(Clone)]
pub struct GeminiBackend {
    client: Client,
    settings: Settings,
}

impl GeminiBackend {
    pub fn new(settings: Settings) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &settings.access_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ConfigError::Client(format!("invalid access token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(settings.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        info!(
            project = %settings.project_id,
            location = %settings.location,
            endpoint = %settings.api_endpoint,
            "Vertex AI client ready"
        );

        Ok(Self { client, settings })
    }
}

impl ChatBackend for GeminiBackend {
    fn create_session(&self, model_id: &str) -> Box<dyn ChatSession> {
        Box::new(GeminiChat {
            id: Uuid::new_v4(),
            model_id: model_id.to_string(),
            url: self.settings.generate_content_url(model_id),
            client: self.client.clone(),
            history: Vec::new(),
        })
    }
}

/// One remote conversation.
pub struct GeminiChat {
    id: Uuid,
    model_id: String,
    url: String,
    client: Client,
    history: Vec<GeminiContent>,
}

impl GeminiChat {
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    #[instrument(skip(self, contents), fields(session = %self.id, model = %self.model_id))]
    async fn generate(&self, contents: &[GeminiContent]) -> Result<String, LlmError> {
        let request = GeminiRequest { contents };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {}", e))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {}", e))
                } else {
                    LlmError::unknown(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            error!(%status, %body, "Vertex AI request failed");
            let kind = LlmErrorKind::from_status(status.as_u16());
            let message = match serde_json::from_str::<GeminiErrorResponse>(&body) {
                Ok(err) => format!("HTTP {}: {}", status, err.error.message),
                Err(_) => format!("HTTP {}: {}", status, body),
            };
            return Err(LlmError::new(kind, message));
        }

        let parsed: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::malformed(format!("Failed to parse response: {}", e)))?;
        extract_text(parsed)
    }
}

#[async_trait]
impl ChatSession for GeminiChat {
    fn id(&self) -> Uuid {
        self.id
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn send(&mut self, text: &str) -> Result<String, LlmError> {
        let mut contents = self.history.clone();
        contents.push(GeminiContent::text("user", text));
        debug!(turns = contents.len(), "Sending generateContent request");

        let answer = self.generate(&contents).await?;

        contents.push(GeminiContent::text("model", &answer));
        self.history = contents;
        Ok(answer)
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: GeminiResponse) -> Result<String, LlmError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::malformed("No candidates in response"))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".to_string());
        return Err(LlmError::malformed(format!(
            "Response contained no text (finish reason: {})",
            reason
        )));
    }
    Ok(text)
}

// Vertex AI wire types

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: &'a [GeminiContent],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![GeminiPart {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}
