//! HTTP API endpoints for the Judgment quiz.
//!
//! This module provides the REST API the browser front end drives. Every
//! handler delegates to the [`QuizController`]; the handlers only translate
//! between JSON bodies, status codes and controller outcomes.
//!
//! # Endpoints
//!
//! - `GET /api/session` - Current session view
//! - `POST /api/session` - Start a session from a captured photo
//! - `POST /api/reset` - Discard the session
//! - `GET /api/question` - The question awaiting an answer
//! - `POST /api/answer` - Answer the current question
//! - `POST /api/summary` - Retry a failed summary
//! - `GET /api/result` - Result report as JSON
//! - `GET /api/result/markdown` - Result report as Markdown
//! - `POST /api/lead` - Capture an email address
//! - `GET /ws` - Live session events
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use judgment_orchestrator::{
//!     create_router, AppState, Config, Result, SummaryRequest, SummaryResponse, Summarizer,
//!     TransformRequest, TransformResponse, Transformer,
//! };
//!
//! struct Identity;
//!
//! #[async_trait]
//! impl Transformer for Identity {
//!     async fn transform(&self, request: TransformRequest) -> Result<TransformResponse> {
//!         Ok(TransformResponse { image: request.image, description: request.prompt })
//!     }
//! }
//!
//! #[async_trait]
//! impl Summarizer for Identity {
//!     async fn summarize(&self, _request: SummaryRequest) -> Result<SummaryResponse> {
//!         Ok(SummaryResponse { summary: "Unchanged".to_string() })
//!     }
//! }
//!
//! # async fn example() {
//! let state = AppState::from_config(Config::default(), Arc::new(Identity), Arc::new(Identity));
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use judgment_report::{MarkdownGenerator, Report};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::collaborator::{LeadSink, Summarizer, Transformer};
use crate::config::Config;
use crate::controller::{AnswerRequest, QuizController, SessionView, StepOutcome};
use crate::error::JudgmentError;
use crate::image::Image;
use crate::leads::{validate_email, JsonlLeadStore};
use crate::question::Question;
use crate::websocket::ws_handler;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for starting a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    /// The captured photo as a `data:` URI.
    pub image: String,
}

/// Request body for the lead endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadRequest {
    /// The submitted email address.
    pub email: String,
}

/// Response body for the lead endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadResponse {
    /// Whether the lead was stored.
    pub saved: bool,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration.
    pub config: Config,
    /// The quiz controller owning the session.
    pub controller: QuizController,
    /// Destination for captured emails.
    pub leads: Arc<dyn LeadSink>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Creates state from already-built parts.
    #[must_use]
    pub fn new(config: Config, controller: QuizController, leads: Arc<dyn LeadSink>) -> Self {
        Self {
            config,
            controller,
            leads,
        }
    }

    /// Creates state whose controller and lead store follow `config`.
    #[must_use]
    pub fn from_config(
        config: Config,
        transformer: Arc<dyn Transformer>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        let controller = QuizController::builder(transformer, summarizer)
            .themes(config.themes.clone())
            .questions(config.question_bank())
            .build();
        let leads = Arc::new(JsonlLeadStore::new(&config.lead_file));
        Self::new(config, controller, leads)
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    Internal(String),
}

impl From<JudgmentError> for ApiError {
    fn from(err: JudgmentError) -> Self {
        let message = err.to_string();
        match err {
            JudgmentError::InvalidImage { .. } | JudgmentError::InvalidEmail { .. } => {
                Self::BadRequest(message)
            }
            JudgmentError::SessionNotComplete { .. } | JudgmentError::NoActiveQuestion => {
                Self::NotFound(message)
            }
            JudgmentError::QuestionMismatch { .. }
            | JudgmentError::AlreadyFinished
            | JudgmentError::InvalidStateTransition { .. } => Self::Conflict(message),
            JudgmentError::Generation { .. } => Self::BadGateway(err.user_message()),
            JudgmentError::ConfigParseError { .. }
            | JudgmentError::ConfigValidationError { .. }
            | JudgmentError::EmptyQuestionSet
            | JudgmentError::LeadStore { .. }
            | JudgmentError::Report(_)
            | JudgmentError::Io(_)
            | JudgmentError::Json(_) => Self::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// The router carries:
/// - All API routes under `/api`
/// - The event stream at `/ws`
/// - Permissive CORS, since the front end is served from elsewhere
/// - Tracing middleware for request logging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/session", get(handle_get_session).post(handle_start_session))
        .route("/reset", post(handle_reset))
        .route("/question", get(handle_question))
        .route("/answer", post(handle_answer))
        .route("/summary", post(handle_summary))
        .route("/result", get(handle_result))
        .route("/result/markdown", get(handle_result_markdown))
        .route("/lead", post(handle_lead));

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `GET /api/session`.
async fn handle_get_session(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    Json(state.controller.snapshot().await)
}

/// Handler for `POST /api/session`.
///
/// Decodes the photo and starts a fresh session, replacing any running one.
async fn handle_start_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let image = Image::from_data_uri(&request.image).map_err(|e| {
        warn!(error = %e, "Rejected captured photo");
        ApiError::from(e)
    })?;
    info!(format = ?image.format(), bytes = image.len(), "Photo captured");

    let view = state.controller.begin(image).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Handler for `POST /api/reset`.
async fn handle_reset(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    Json(state.controller.reset().await)
}

/// Handler for `GET /api/question`.
async fn handle_question(State(state): State<Arc<AppState>>) -> Result<Json<Question>, ApiError> {
    state
        .controller
        .current_question()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::from(JudgmentError::NoActiveQuestion))
}

/// Handler for `POST /api/answer`.
async fn handle_answer(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnswerRequest>,
) -> Response {
    info!(question = ?request.question_id, choice = request.choice, "Answer received");
    let outcome = state.controller.answer(request).await;
    outcome_response(outcome, StatusCode::OK)
}

/// Handler for `POST /api/summary`.
async fn handle_summary(State(state): State<Arc<AppState>>) -> Response {
    let outcome = state.controller.retry_summary().await;
    outcome_response(outcome, StatusCode::BAD_GATEWAY)
}

/// Handler for `GET /api/result`.
async fn handle_result(State(state): State<Arc<AppState>>) -> Result<Json<Report>, ApiError> {
    Ok(Json(state.controller.report().await?))
}

/// Handler for `GET /api/result/markdown`.
async fn handle_result_markdown(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let report = state.controller.report().await?;
    let markdown = MarkdownGenerator::new(&report).generate();
    Ok((
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        markdown,
    )
        .into_response())
}

/// Handler for `POST /api/lead`.
///
/// Never touches the quiz session.
async fn handle_lead(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LeadRequest>,
) -> Result<(StatusCode, Json<LeadResponse>), ApiError> {
    let email = validate_email(&request.email)?;
    state.leads.submit(email).await.map_err(|e| {
        warn!(error = %e, "Lead capture failed");
        ApiError::from(e)
    })?;
    Ok((StatusCode::CREATED, Json(LeadResponse { saved: true })))
}

/// Maps a controller outcome onto a status code.
///
/// `summary_failed` is the status for [`StepOutcome::SummaryFailed`]: an
/// answer that completed the quiz still succeeded, a summary retry did not.
fn outcome_response(outcome: StepOutcome, summary_failed: StatusCode) -> Response {
    let status = match &outcome {
        StepOutcome::Advanced { .. } | StepOutcome::Completed { .. } => StatusCode::OK,
        StepOutcome::SummaryFailed { .. } => summary_failed,
        StepOutcome::TransformFailed { .. } => StatusCode::BAD_GATEWAY,
        StepOutcome::Rejected { .. } | StepOutcome::Discarded => StatusCode::CONFLICT,
    };
    (status, Json(outcome)).into_response()
}

// ============================================================================
// Tests
// ============================================================================
