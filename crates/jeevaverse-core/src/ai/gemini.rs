use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{ChatBackend, GeminiError, GenerateRequest, GenerateResponse};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";

const UNKNOWN_API_ERROR: &str = "An unknown API error occurred.";

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Turn a raw HTTP answer into a response or a user-facing error.
pub fn interpret_response(status: StatusCode, body: &str) -> Result<GenerateResponse, GeminiError> {
    if !status.is_success() {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|e| e.error.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| UNKNOWN_API_ERROR.to_string());

        return Err(GeminiError::Api {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(body).map_err(|e| GeminiError::MalformedResponse(e.to_string()))
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    /// `api_key` may be `None` when `base_url` points at a proxy that
    /// attaches credentials itself.
    pub fn new(base_url: Option<&str>, model: Option<&str>, api_key: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ChatBackend for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, GeminiError> {
        let url = self.endpoint();
        log::info!("POST {} ({} parts)", url, request.contents.iter().map(|c| c.parts.len()).sum::<usize>());

        let mut builder = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(request);

        if let Some(key) = &self.api_key {
            builder = builder.header("x-goog-api-key", key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            log::warn!("Gemini returned {}", status);
        }

        interpret_response(status, &body)
    }
}
