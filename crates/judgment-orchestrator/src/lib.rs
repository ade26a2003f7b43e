//! Judgment Quiz Orchestrator
//!
//! Owns the quiz session, drives the image transformation and summary
//! collaborators, and serves the HTTP API and WebSocket events.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use judgment_orchestrator::{AnswerRequest, Image, QuizController, Summarizer, Transformer};
//!
//! # async fn example(
//! #     transformer: Arc<dyn Transformer>,
//! #     summarizer: Arc<dyn Summarizer>,
//! # ) -> judgment_orchestrator::Result<()> {
//! let controller = QuizController::builder(transformer, summarizer).build();
//! controller
//!     .begin(Image::from_data_uri("data:image/png;base64,iVBORw0KGgo=")?)
//!     .await?;
//! let outcome = controller.answer(AnswerRequest::new(0)).await;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod collaborator;
pub mod config;
pub mod controller;
pub mod error;
pub mod image;
pub mod leads;
pub mod prompt;
pub mod question;
pub mod session;
pub mod websocket;

pub use api::{create_router, AppState, ErrorResponse, LeadRequest, LeadResponse, StartSessionRequest};
pub use collaborator::{
    LeadSink, SummaryRequest, SummaryResponse, Summarizer, TransformRequest, TransformResponse,
    Transformer,
};
pub use config::{read_api_key, Config, SummaryConfig, TransformConfig};
pub use controller::{
    AnswerRequest, QuizController, QuizControllerBuilder, RejectReason, SessionView, StepOutcome,
};
pub use error::{GenerationErrorKind, JudgmentError, Result};
pub use image::{Image, ImageFormat};
pub use leads::{JsonlLeadStore, Lead};
pub use prompt::{
    transform_prompt, verdict_title, Theme, Themes, REFERENCE_THEME_PROMPT, SUMMARY_PROMPT,
};
pub use question::{default_questions, Choice, Protocol, Question, QuestionBank};
pub use session::{AnswerRecord, RequestHandle, RequestKind, Session, SessionStatus};
pub use websocket::{EventBroadcaster, SessionEvent};
