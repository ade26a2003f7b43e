//! Error types for the Judgment quiz orchestrator.
//!
//! This module defines the error hierarchy for all orchestrator operations,
//! including configuration loading, image decoding, session transitions,
//! generation collaborator calls, and lead capture.

use std::path::PathBuf;

/// A specialized `Result` type for Judgment orchestrator operations.
pub type Result<T> = std::result::Result<T, JudgmentError>;

/// Errors that can occur while running a quiz session.
///
/// Error variants are organized by subsystem and include actionable suggestions
/// where possible to help operators resolve issues.
#[derive(Debug, thiserror::Error)]
pub enum JudgmentError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your judgment.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Image Errors
    // ========================================================================
    /// A captured or generated image could not be decoded.
    #[error("Invalid image: {message}")]
    InvalidImage {
        /// Description of what was wrong with the image payload.
        message: String,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// A session was started without any questions.
    #[error("Cannot start a session with an empty question set")]
    EmptyQuestionSet,

    /// An answer was recorded for a question that is not the current one.
    #[error("Answer for question {given} does not match the current question {expected}")]
    QuestionMismatch {
        /// The question the caller answered.
        given: u32,
        /// The question the session is waiting on.
        expected: u32,
    },

    /// An answer was recorded while no question is open.
    #[error("No question is awaiting an answer")]
    NoActiveQuestion,

    /// A summary was attached before every question was answered.
    #[error("Session is not complete: {answered} of {total} questions answered")]
    SessionNotComplete {
        /// Number of answered questions.
        answered: usize,
        /// Number of questions in the session.
        total: usize,
    },

    /// A summary was attached to a session that already has one.
    #[error("Session already has a summary")]
    AlreadyFinished,

    /// Invalid state transition attempted.
    #[error("Invalid state transition: cannot go from {from} to {to}")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
    },

    // ========================================================================
    // Generation Collaborator Errors
    // ========================================================================
    /// A generation service call failed.
    #[error("Generation error ({kind}): {message}\n\nSuggestion: {suggestion}")]
    Generation {
        /// The kind of failure.
        kind: GenerationErrorKind,
        /// Detailed error message.
        message: String,
        /// Actionable suggestion for the operator.
        suggestion: String,
    },

    // ========================================================================
    // Lead Capture Errors
    // ========================================================================
    /// The submitted email address is not valid.
    #[error("Invalid email address: '{email}'")]
    InvalidEmail {
        /// The rejected address.
        email: String,
    },

    /// The lead store could not persist a submission.
    #[error("Failed to save lead to '{path}': {message}\n\nSuggestion: Check write permissions for the lead file")]
    LeadStore {
        /// Path of the lead file.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// The result report could not be built or rendered.
    #[error("Report error: {0}")]
    Report(#[from] judgment_report::ReportError),

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Categories of generation failures for structured error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    /// Authentication failure (invalid or missing API key).
    Authentication,
    /// Rate limit exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// The service answered but the payload was unusable (e.g. no image).
    InvalidResponse,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::InvalidResponse => write!(f, "invalid_response"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl GenerationErrorKind {
    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check the API key environment variable",
            Self::RateLimit => "Wait and retry, or reduce request frequency",
            Self::Server => "Retry later; the generation service may be experiencing issues",
            Self::Network => "Check your network connection",
            Self::InvalidResponse => "Retry the answer; the service returned no usable result",
            Self::Other => "Check the generation provider's status page",
        }
    }

    /// Classifies an HTTP status code returned by a generation service.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            429 => Self::RateLimit,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }
}

impl JudgmentError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `InvalidImage` error.
    #[must_use]
    pub fn invalid_image(message: impl Into<String>) -> Self {
        Self::InvalidImage {
            message: message.into(),
        }
    }

    /// Creates a new `Generation` error with automatic suggestion based on error kind.
    #[must_use]
    pub fn generation(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        let suggestion = kind.suggestion().to_string();
        Self::Generation {
            kind,
            message: message.into(),
            suggestion,
        }
    }

    /// Creates a new `InvalidEmail` error.
    #[must_use]
    pub fn invalid_email(email: impl Into<String>) -> Self {
        Self::InvalidEmail {
            email: email.into(),
        }
    }

    /// Creates a new `LeadStore` error.
    #[must_use]
    pub fn lead_store(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::LeadStore {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `InvalidStateTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns `true` if this error is transient and the user may simply retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Generation {
                kind: GenerationErrorKind::RateLimit
                    | GenerationErrorKind::Server
                    | GenerationErrorKind::Network
                    | GenerationErrorKind::InvalidResponse,
                ..
            }
        )
    }

    /// Short message suitable for showing to the quiz player.
    ///
    /// Unlike `Display`, this omits operator suggestions.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Generation { message, .. } => format!("AI ERROR: {message}"),
            other => format!("AI ERROR: {other}"),
        }
    }
}
