// =============================================================================
// GEMINI CLIENT - image description
// =============================================================================
//
// Sends the downloaded image inline to Gemini's generateContent endpoint and
// returns the model's short description for the report row.
//
// **Differences from the other Google clients:**
// - Authentication: API key as a query parameter (`?key=API_KEY`), not the
//   service account bearer token.
// - Response format: text lives at `candidates[0].content.parts[*].text`.
//
// **Environment Variables:**
// - `GEMINI_API_KEY` - Your API key from https://aistudio.google.com/apikey
// - `GEMINI_MODEL` - Model name (default: gemini-2.5-flash)
// - `GEMINI_PROMPT` - Prompt sent with the image

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::pipeline::{ImageDescriber, ServiceError};
use crate::infra::google::google_api::check_status;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_PROMPT: &str = "Describe this image in 2-3 sentences";

// =============================================================================
// GEMINI API DATA STRUCTURES
// =============================================================================

/// A single part of content: either the prompt text or the inline image.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

/// Base64 media embedded directly in the request.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

// =============================================================================
// GEMINI CLIENT IMPLEMENTATION
// =============================================================================

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    prompt: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Reads `GEMINI_API_KEY` (required), `GEMINI_MODEL` and `GEMINI_PROMPT`.
    pub fn from_env() -> Result<Self, ServiceError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| ServiceError::Auth("GEMINI_API_KEY is not set".to_string()))?;

        let mut client = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            client = client.with_model(model);
        }
        if let Ok(prompt) = std::env::var("GEMINI_PROMPT") {
            client = client.with_prompt(prompt);
        }
        Ok(client)
    }

    fn request_body(&self, payload: &[u8], mime_type: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part {
                        text: Some(self.prompt.clone()),
                        inline_data: None,
                    },
                    Part {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: mime_type.to_string(),
                            data: STANDARD.encode(payload),
                        }),
                    },
                ],
            }],
        }
    }

    /// Joins every text part of the first candidate.
    fn response_text(response: GenerateContentResponse) -> Result<String, ServiceError> {
        let candidate = response
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| {
                ServiceError::Rejected(
                    "no candidates in Gemini response - the image may have been blocked by safety filters"
                        .to_string(),
                )
            })?;

        let text = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl ImageDescriber for GeminiClient {
    async fn describe(&self, payload: &[u8], mime_type: &str) -> Result<String, ServiceError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );

        // The key goes in the query string; keep it out of the logs.
        tracing::debug!(model = %self.model, bytes = payload.len(), "Gemini generateContent");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&self.request_body(payload, mime_type))
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.without_url().to_string()))?;

        let response: GenerateContentResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;

        Self::response_text(response)
    }
}
