//! Traits for the external services the quiz depends on.
//!
//! The controller only ever talks to these traits; the HTTP clients live in
//! the `judgment-genai` crate and the lead file store in [`crate::leads`].

use async_trait::async_trait;

use crate::error::Result;
use crate::image::Image;
use crate::question::Protocol;

/// Input for one image transformation step.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    /// The image to edit (the session's current image).
    pub image: Image,
    /// Protocol of the chosen answer.
    pub choice: Protocol,
    /// Name of the theme for that protocol.
    pub theme: String,
    /// One-based question number.
    pub question_number: usize,
    /// Reference description that guided the prompt, if any.
    pub guidance: Option<String>,
    /// Fully assembled editing prompt.
    pub prompt: String,
}

/// Output of a successful transformation.
#[derive(Debug, Clone)]
pub struct TransformResponse {
    /// The edited image.
    pub image: Image,
    /// Human-readable description of what was applied.
    pub description: String,
}

/// Input for the final summary.
#[derive(Debug, Clone)]
pub struct SummaryRequest {
    /// The final transformed image.
    pub image: Image,
}

/// Output of a successful summary.
#[derive(Debug, Clone)]
pub struct SummaryResponse {
    /// Summary text shown with the result.
    pub summary: String,
}

/// Edits a photo according to a textual directive.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Runs one transformation.
    ///
    /// Implementations must return an error for any non-success response or
    /// when the service does not produce an image.
    async fn transform(&self, request: TransformRequest) -> Result<TransformResponse>;
}

/// Produces summary text for an image.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarizes the final image.
    async fn summarize(&self, request: SummaryRequest) -> Result<SummaryResponse>;
}

/// Persists captured email addresses.
#[async_trait]
pub trait LeadSink: Send + Sync {
    /// Stores one submission. The address is already validated.
    async fn submit(&self, email: &str) -> Result<()>;
}
