//! Judgment Generation Clients
//!
//! HTTP clients for the hosted services behind the quiz collaborators:
//! Flux Kontext edits the photo after each answer and Gemini describes the
//! final image.
//!
//! Both clients implement the collaborator traits from
//! `judgment-orchestrator`, so the controller never sees HTTP details.

use judgment_orchestrator::{GenerationErrorKind, JudgmentError};
use thiserror::Error;

pub mod gemini;
pub mod kontext;

pub use gemini::GeminiClient;
pub use kontext::FluxKontextClient;

/// Longest error body kept in messages.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Errors that can occur while talking to a generation service.
#[derive(Debug, Error)]
pub enum GenAiError {
    /// The service answered with a non-success status.
    #[error("{service} returned HTTP {status}: {body}")]
    Http {
        /// Which service failed.
        service: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The request could not be sent or the body could not be read.
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The edit request ended in a status other than `Ready`.
    #[error("unexpected Kontext status: {0}")]
    UnexpectedStatus(String),

    /// The edit was still running after every poll.
    #[error("no Kontext result after {attempts} polls")]
    PollTimeout {
        /// Number of polls made.
        attempts: u32,
    },

    /// The response was missing the field we need.
    #[error("{0}")]
    EmptyResponse(&'static str),
}

impl GenAiError {
    /// Classifies the error for the controller.
    #[must_use]
    pub const fn kind(&self) -> GenerationErrorKind {
        match self {
            Self::Http { status, .. } => GenerationErrorKind::from_status(*status),
            Self::Network(_) => GenerationErrorKind::Network,
            Self::UnexpectedStatus(_) | Self::EmptyResponse(_) => {
                GenerationErrorKind::InvalidResponse
            }
            Self::PollTimeout { .. } => GenerationErrorKind::Other,
        }
    }

    /// Reads a failed response into an `Http` error.
    pub(crate) async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let body = if body.chars().count() > MAX_ERROR_BODY_CHARS {
            let truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            format!("{truncated}...(truncated)")
        } else {
            body
        };
        Self::Http {
            service,
            status,
            body,
        }
    }
}

impl From<GenAiError> for JudgmentError {
    fn from(err: GenAiError) -> Self {
        Self::generation(err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_classification() {
        let http = |status| GenAiError::Http {
            service: "Kontext",
            status,
            body: String::new(),
        };
        assert_eq!(http(401).kind(), GenerationErrorKind::Authentication);
        assert_eq!(http(429).kind(), GenerationErrorKind::RateLimit);
        assert_eq!(http(503).kind(), GenerationErrorKind::Server);
        assert_eq!(http(400).kind(), GenerationErrorKind::Other);
        assert_eq!(
            GenAiError::UnexpectedStatus("Error".to_string()).kind(),
            GenerationErrorKind::InvalidResponse
        );
        assert_eq!(
            GenAiError::PollTimeout { attempts: 3 }.kind(),
            GenerationErrorKind::Other
        );
    }

    #[test]
    fn test_conversion_keeps_kind_and_message() {
        let err: JudgmentError = GenAiError::Http {
            service: "Gemini",
            status: 429,
            body: "quota".to_string(),
        }
        .into();

        assert!(err.is_transient());
        assert_eq!(err.user_message(), "AI ERROR: Gemini returned HTTP 429: quota");
    }
}
