//! Gemini vision client.
//!
//! Used for the end-of-quiz summary and for describing reference images
//! offline so their descriptions can guide the transformations.

use async_trait::async_trait;
use judgment_orchestrator::{
    Image, SummaryConfig, SummaryRequest, SummaryResponse, Summarizer, REFERENCE_THEME_PROMPT,
    SUMMARY_PROMPT,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::GenAiError;

const SERVICE: &str = "Gemini";

/// Client for the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

impl GeminiClient {
    /// Creates a client from the summary settings.
    #[must_use]
    pub fn from_config(config: &SummaryConfig, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
        }
    }

    /// Sends one prompt with one image and returns the generated text.
    ///
    /// Text parts of the first candidate are concatenated and trimmed.
    ///
    /// # Errors
    ///
    /// Returns `GenAiError` if the request fails or no text comes back.
    pub async fn generate(&self, prompt: &str, image: &Image) -> Result<String, GenAiError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        debug!(model = %self.model, bytes = image.len(), "Requesting Gemini content");

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: prompt.to_string(),
                    },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: image.format().mime(),
                            data: image.to_base64(),
                        },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GenAiError::from_response(SERVICE, response).await);
        }

        let body: GenerateResponse = response.json().await?;
        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(GenAiError::EmptyResponse("Gemini returned no text"));
        }
        Ok(text.to_string())
    }

    /// Describes the props and style of a reference image.
    ///
    /// # Errors
    ///
    /// Returns `GenAiError` if the request fails or no text comes back.
    pub async fn describe_reference(&self, image: &Image) -> Result<String, GenAiError> {
        self.generate(REFERENCE_THEME_PROMPT, image).await
    }
}

#[async_trait]
impl Summarizer for GeminiClient {
    async fn summarize(
        &self,
        request: SummaryRequest,
    ) -> judgment_orchestrator::Result<SummaryResponse> {
        match self.generate(SUMMARY_PROMPT, &request.image).await {
            Ok(summary) => {
                info!(chars = summary.len(), "Summary generated");
                Ok(SummaryResponse { summary })
            }
            Err(e) => {
                warn!(error = %e, "Summary failed");
                Err(e.into())
            }
        }
    }
}
