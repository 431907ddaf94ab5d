pub mod gemini;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::AttachedImage;

pub use gemini::GeminiClient;

/// Returned when the service answers but produces no usable candidate.
pub const FALLBACK_RESPONSE: &str =
    "I'm sorry, I couldn't generate a response for this. It may have been blocked due to safety policies.";

/// Error from one generate call. `Display` is shown to the user.
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("{0}")]
    Network(String),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Request interrupted: {0}")]
    Interrupted(String),
}

impl From<reqwest::Error> for GeminiError {
    fn from(e: reqwest::Error) -> Self {
        GeminiError::Network(e.to_string())
    }
}

/// One request part. Serializes to `{"text": ..}` or `{"inline_data": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
}

impl GenerateRequest {
    /// Text part first (if any), then the image (if any).
    pub fn new(prompt: &str, image: Option<&AttachedImage>) -> Self {
        let mut parts = Vec::new();
        if !prompt.is_empty() {
            parts.push(Part::Text {
                text: prompt.to_string(),
            });
        }
        if let Some(image) = image {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.base64.clone(),
                },
            });
        }

        Self {
            contents: vec![Content { parts }],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate that has any.
    pub fn text(&self) -> Option<String> {
        self.candidates.iter().find_map(|candidate| {
            let parts = &candidate.content.as_ref()?.parts;
            let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
            (!text.is_empty()).then_some(text)
        })
    }

    pub fn text_or_fallback(&self) -> String {
        self.text().unwrap_or_else(|| FALLBACK_RESPONSE.to_string())
    }
}

/// The generative-AI service as seen by the session.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, GeminiError>;
}
