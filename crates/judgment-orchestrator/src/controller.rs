//! Quiz controller: drives the session through collaborator calls.
//!
//! The controller owns the session slot and is the only writer. Each
//! operation takes the lock for its synchronous part only; collaborator calls
//! run with the lock released and their results are applied only if the
//! request that produced them is still the outstanding one.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use judgment_orchestrator::{AnswerRequest, Image, QuizController, Summarizer, Transformer};
//!
//! # async fn example(
//! #     transformer: Arc<dyn Transformer>,
//! #     summarizer: Arc<dyn Summarizer>,
//! #     photo: Image,
//! # ) -> judgment_orchestrator::Result<()> {
//! let controller = QuizController::builder(transformer, summarizer).build();
//!
//! controller.begin(photo).await?;
//! let outcome = controller.answer(AnswerRequest::new(0)).await;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use judgment_report::{AnswerEntry, Report, Side};

use crate::collaborator::{SummaryRequest, Summarizer, TransformRequest, Transformer};
use crate::error::{GenerationErrorKind, JudgmentError, Result};
use crate::image::Image;
use crate::prompt::{transform_prompt, verdict_title, Themes};
use crate::question::{Choice, Protocol, Question, QuestionBank};
use crate::session::{AnswerRecord, RequestHandle, RequestKind, Session, SessionStatus};
use crate::websocket::{EventBroadcaster, SessionEvent};

// ============================================================================
// Requests and Outcomes
// ============================================================================

/// An answer submitted by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    /// The question being answered. When present it must match the current
    /// question, which protects against double submissions from stale pages.
    #[serde(default)]
    pub question_id: Option<u32>,
    /// Zero-based index into the current question's choices.
    pub choice: usize,
}

impl AnswerRequest {
    /// Answers whatever question is current.
    #[must_use]
    pub const fn new(choice: usize) -> Self {
        Self {
            question_id: None,
            choice,
        }
    }

    /// Answers a specific question.
    #[must_use]
    pub const fn for_question(question_id: u32, choice: usize) -> Self {
        Self {
            question_id: Some(question_id),
            choice,
        }
    }
}

/// Why a request was turned away without touching the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Another collaborator call is outstanding.
    Busy,
    /// No question is awaiting an answer.
    NoCurrentQuestion,
    /// The answer names a question other than the current one.
    QuestionMismatch,
    /// The choice index is out of range.
    UnknownChoice,
    /// Summary requested before completion or after it was attached.
    NotReadyForSummary,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Busy => write!(f, "a request is already in progress"),
            Self::NoCurrentQuestion => write!(f, "no question is awaiting an answer"),
            Self::QuestionMismatch => write!(f, "answer does not match the current question"),
            Self::UnknownChoice => write!(f, "unknown answer choice"),
            Self::NotReadyForSummary => write!(f, "session is not waiting for a summary"),
        }
    }
}

/// Result of an answer or summary request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The answer was applied and more questions remain.
    Advanced {
        /// Cursor after the answer.
        cursor: usize,
        /// Number of questions in the session.
        total: usize,
    },
    /// The last answer was applied and the summary attached.
    Completed {
        /// Result title.
        title: String,
        /// Summary text.
        summary: String,
    },
    /// The last answer was applied but the summary call failed.
    SummaryFailed {
        /// User-facing error message.
        message: String,
    },
    /// The transformation failed; the session is unchanged apart from the error.
    TransformFailed {
        /// User-facing error message.
        message: String,
    },
    /// The request was turned away before any collaborator call.
    Rejected {
        /// Why it was rejected.
        reason: RejectReason,
    },
    /// The session was reset or restarted while the call was running.
    Discarded,
}

// ============================================================================
// Session View
// ============================================================================

/// Read-only snapshot of the session for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Current generation of the session slot.
    pub generation: u64,
    /// Index of the next unanswered question.
    pub cursor: usize,
    /// Number of questions in the session.
    pub total: usize,
    /// The question awaiting an answer.
    pub current_question: Option<Question>,
    /// Whether a collaborator call is outstanding.
    pub busy: bool,
    /// Last user-facing error.
    pub last_error: Option<String>,
    /// The current image as a data URI.
    pub current_image: Option<Image>,
    /// Answer log.
    pub answers: Vec<AnswerRecord>,
    /// Summary, once attached.
    pub summary: Option<String>,
    /// Result title, once attached.
    pub title: Option<String>,
}

impl SessionView {
    fn of(session: &Session, generation: u64) -> Self {
        Self {
            status: session.status(),
            generation,
            cursor: session.cursor(),
            total: session.questions().len(),
            current_question: session.current_question().cloned(),
            busy: session.is_busy(),
            last_error: session.last_error().map(ToString::to_string),
            current_image: session.current_image().cloned(),
            answers: session.answers().to_vec(),
            summary: session.summary().map(ToString::to_string),
            title: session.title().map(ToString::to_string),
        }
    }
}

// ============================================================================
// Session Slot
// ============================================================================

/// The session plus the counters that identify requests against it.
#[derive(Debug, Default)]
struct SessionSlot {
    session: Session,
    generation: u64,
    next_sequence: u64,
}

impl SessionSlot {
    fn issue(&mut self, kind: RequestKind) -> RequestHandle {
        self.next_sequence += 1;
        RequestHandle {
            generation: self.generation,
            sequence: self.next_sequence,
            kind,
        }
    }

    /// Clears the outstanding call belonging to `handle`'s request, whatever
    /// stage it reached. Returns the stage that was cleared.
    fn abandon(&mut self, handle: RequestHandle) -> Option<RequestKind> {
        let pending = self.session.pending()?;
        if pending.generation != handle.generation || pending.sequence != handle.sequence {
            return None;
        }
        self.session.end_request(pending).then_some(pending.kind)
    }
}

/// Work captured under the lock when an answer is dispatched.
struct Dispatch {
    handle: RequestHandle,
    question: Question,
    choice: Choice,
    total: usize,
    request: TransformRequest,
}

// ============================================================================
// QuizController
// ============================================================================

/// Owns the quiz session and mediates every collaborator call.
///
/// Cloning is cheap and every clone drives the same session.
#[derive(Clone)]
pub struct QuizController {
    slot: Arc<Mutex<SessionSlot>>,
    transformer: Arc<dyn Transformer>,
    summarizer: Arc<dyn Summarizer>,
    themes: Arc<Themes>,
    bank: Arc<QuestionBank>,
    events: EventBroadcaster,
}

impl std::fmt::Debug for QuizController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizController")
            .field("themes", &self.themes)
            .field("questions", &self.bank.questions().len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`QuizController`].
pub struct QuizControllerBuilder {
    transformer: Arc<dyn Transformer>,
    summarizer: Arc<dyn Summarizer>,
    themes: Themes,
    bank: QuestionBank,
    events: EventBroadcaster,
}

impl QuizControllerBuilder {
    /// Sets the transformation themes.
    #[must_use]
    pub fn themes(mut self, themes: Themes) -> Self {
        self.themes = themes;
        self
    }

    /// Sets the question bank.
    #[must_use]
    pub fn questions(mut self, bank: QuestionBank) -> Self {
        self.bank = bank;
        self
    }

    /// Sets the event broadcaster.
    #[must_use]
    pub fn events(mut self, events: EventBroadcaster) -> Self {
        self.events = events;
        self
    }

    /// Builds the controller with an empty session at generation 0.
    #[must_use]
    pub fn build(self) -> QuizController {
        QuizController {
            slot: Arc::new(Mutex::new(SessionSlot::default())),
            transformer: self.transformer,
            summarizer: self.summarizer,
            themes: Arc::new(self.themes),
            bank: Arc::new(self.bank),
            events: self.events,
        }
    }
}

impl QuizController {
    /// Starts building a controller around the two generation collaborators.
    #[must_use]
    pub fn builder(
        transformer: Arc<dyn Transformer>,
        summarizer: Arc<dyn Summarizer>,
    ) -> QuizControllerBuilder {
        QuizControllerBuilder {
            transformer,
            summarizer,
            themes: Themes::default(),
            bank: QuestionBank::default(),
            events: EventBroadcaster::default(),
        }
    }

    /// Subscribes to session events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The configured themes.
    #[must_use]
    pub fn themes(&self) -> &Themes {
        &self.themes
    }

    /// Returns a snapshot of the session.
    pub async fn snapshot(&self) -> SessionView {
        let slot = self.slot.lock().await;
        SessionView::of(&slot.session, slot.generation)
    }

    /// Returns the question awaiting an answer.
    pub async fn current_question(&self) -> Option<Question> {
        self.slot.lock().await.session.current_question().cloned()
    }

    // ------------------------------------------------------------------------
    // Capture and restart
    // ------------------------------------------------------------------------

    /// Starts a new session from the captured photo.
    ///
    /// Any running attempt is replaced; results still in flight for it will
    /// be discarded.
    ///
    /// # Errors
    ///
    /// Returns `JudgmentError::EmptyQuestionSet` if the bank yields no
    /// questions. The previous session is kept in that case.
    pub async fn begin(&self, image: Image) -> Result<SessionView> {
        let questions = self.bank.draw(&mut rand::rng());
        let total = questions.len();

        let mut slot = self.slot.lock().await;
        slot.session.start(image, questions)?;
        slot.generation += 1;
        let generation = slot.generation;

        info!(generation, total, "Session started");
        self.events
            .send(SessionEvent::session_started(generation, total));
        Ok(SessionView::of(&slot.session, generation))
    }

    /// Discards the session and bumps the generation.
    pub async fn reset(&self) -> SessionView {
        let mut slot = self.slot.lock().await;
        if slot.session.is_busy() {
            debug!("Resetting with a request in flight; its result will be discarded");
        }
        slot.session.reset();
        slot.generation += 1;
        let generation = slot.generation;

        info!(generation, "Session reset");
        self.events.send(SessionEvent::session_reset(generation));
        SessionView::of(&slot.session, generation)
    }

    // ------------------------------------------------------------------------
    // Answer handling
    // ------------------------------------------------------------------------

    /// Handles one answer.
    ///
    /// The transform runs on a spawned task so the pending slot is released
    /// even if the caller stops waiting.
    pub async fn answer(&self, request: AnswerRequest) -> StepOutcome {
        let dispatch = match self.dispatch_answer(request).await {
            Ok(dispatch) => dispatch,
            Err(reason) => {
                debug!(%reason, "Answer rejected");
                return StepOutcome::Rejected { reason };
            }
        };

        let handle = dispatch.handle;
        let controller = self.clone();
        match tokio::spawn(async move { controller.complete_answer(dispatch).await }).await {
            Ok(outcome) => outcome,
            Err(e) => self.abandon(handle, e.to_string()).await,
        }
    }

    /// Validates the answer and claims the pending slot.
    async fn dispatch_answer(
        &self,
        request: AnswerRequest,
    ) -> std::result::Result<Dispatch, RejectReason> {
        let mut slot = self.slot.lock().await;

        if slot.session.is_busy() {
            return Err(RejectReason::Busy);
        }
        let question = slot
            .session
            .current_question()
            .cloned()
            .ok_or(RejectReason::NoCurrentQuestion)?;
        if request.question_id.is_some_and(|id| id != question.id) {
            return Err(RejectReason::QuestionMismatch);
        }
        let choice = question
            .choice(request.choice)
            .cloned()
            .ok_or(RejectReason::UnknownChoice)?;
        let image = slot
            .session
            .current_image()
            .cloned()
            .ok_or(RejectReason::NoCurrentQuestion)?;

        let handle = slot.issue(RequestKind::Transform);
        if !slot.session.begin_request(handle) {
            return Err(RejectReason::Busy);
        }

        let question_index = slot.session.cursor();
        let theme = self.themes.for_protocol(choice.protocol);
        let guidance = theme.guidance_for(question_index);
        let prompt = transform_prompt(theme, guidance);

        info!(
            question = question.id,
            number = question_index + 1,
            choice = %choice.protocol,
            "Dispatching transformation"
        );
        self.events.send(SessionEvent::answer_started(
            question.id,
            question_index + 1,
            choice.protocol,
        ));

        Ok(Dispatch {
            handle,
            total: slot.session.questions().len(),
            request: TransformRequest {
                image,
                choice: choice.protocol,
                theme: theme.name.clone(),
                question_number: question_index + 1,
                guidance: guidance.map(ToString::to_string),
                prompt,
            },
            question,
            choice,
        })
    }

    /// Runs the transform and applies its result.
    async fn complete_answer(&self, dispatch: Dispatch) -> StepOutcome {
        let Dispatch {
            handle,
            question,
            choice,
            total,
            request,
        } = dispatch;

        let result = self.transformer.transform(request).await;

        let mut slot = self.slot.lock().await;
        if !slot.session.is_pending(handle) {
            debug!(
                generation = handle.generation,
                current = slot.generation,
                "Discarding stale transformation result"
            );
            return StepOutcome::Discarded;
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let message = e.user_message();
                warn!(question = question.id, error = %e, "Transformation failed");
                slot.session.set_error(message.clone());
                slot.session.end_request(handle);
                self.events
                    .send(SessionEvent::answer_failed(Some(question.id), message.clone()));
                return StepOutcome::TransformFailed { message };
            }
        };

        if let Err(e) = slot
            .session
            .record_answer(question.id, &choice, response.image)
        {
            // The pending slot blocks every other writer, so this is a bug
            warn!(error = %e, "Could not record answer");
            slot.session.end_request(handle);
            return StepOutcome::Discarded;
        }

        let cursor = slot.session.cursor();
        info!(question = question.id, cursor, total, "Answer accepted");
        self.events.send(SessionEvent::answer_accepted(
            question.id,
            cursor,
            total,
            response.description,
        ));

        if slot.session.status() != SessionStatus::Complete {
            slot.session.end_request(handle);
            return StepOutcome::Advanced { cursor, total };
        }

        let summary_handle = RequestHandle {
            kind: RequestKind::Summarize,
            ..handle
        };
        slot.session.hand_over_request(handle, summary_handle);
        let Some(image) = slot.session.current_image().cloned() else {
            slot.session.end_request(summary_handle);
            return StepOutcome::Discarded;
        };
        drop(slot);

        self.run_summary(summary_handle, image, choice.protocol).await
    }

    // ------------------------------------------------------------------------
    // Summary
    // ------------------------------------------------------------------------

    /// Retries the summary for a completed session that has none.
    pub async fn retry_summary(&self) -> StepOutcome {
        let (handle, image, protocol) = {
            let mut slot = self.slot.lock().await;
            if slot.session.is_busy() {
                return StepOutcome::Rejected {
                    reason: RejectReason::Busy,
                };
            }
            let ready = slot.session.status() == SessionStatus::Complete
                && !slot.session.is_finished();
            let image = slot.session.current_image().cloned();
            let protocol = slot.session.answers().last().map(|a| a.choice);
            let (true, Some(image), Some(protocol)) = (ready, image, protocol) else {
                return StepOutcome::Rejected {
                    reason: RejectReason::NotReadyForSummary,
                };
            };

            let handle = slot.issue(RequestKind::Summarize);
            slot.session.begin_request(handle);
            (handle, image, protocol)
        };

        info!("Retrying summary");
        let controller = self.clone();
        match tokio::spawn(async move { controller.run_summary(handle, image, protocol).await })
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => self.abandon(handle, e.to_string()).await,
        }
    }

    /// Calls the summarizer and attaches the result.
    async fn run_summary(
        &self,
        handle: RequestHandle,
        image: Image,
        last_protocol: Protocol,
    ) -> StepOutcome {
        let result = self.summarizer.summarize(SummaryRequest { image }).await;

        let mut slot = self.slot.lock().await;
        if !slot.session.end_request(handle) {
            debug!("Discarding stale summary result");
            return StepOutcome::Discarded;
        }

        match result {
            Ok(response) => {
                let title = verdict_title(last_protocol);
                if let Err(e) = slot.session.finish(response.summary.clone(), title.clone()) {
                    warn!(error = %e, "Could not attach summary");
                    return StepOutcome::Rejected {
                        reason: RejectReason::NotReadyForSummary,
                    };
                }
                info!(%title, "Session complete");
                self.events.send(SessionEvent::session_complete(
                    title.clone(),
                    response.summary.clone(),
                ));
                StepOutcome::Completed {
                    title,
                    summary: response.summary,
                }
            }
            Err(e) => {
                let message = e.user_message();
                warn!(error = %e, "Summary failed");
                slot.session.set_error(message.clone());
                self.events
                    .send(SessionEvent::answer_failed(None, message.clone()));
                StepOutcome::SummaryFailed { message }
            }
        }
    }

    /// Releases the slot after a collaborator task died.
    async fn abandon(&self, handle: RequestHandle, reason: String) -> StepOutcome {
        let mut slot = self.slot.lock().await;
        let Some(stage) = slot.abandon(handle) else {
            return StepOutcome::Discarded;
        };
        let message = JudgmentError::generation(GenerationErrorKind::Other, reason).user_message();
        warn!(%message, ?stage, "Collaborator task aborted");
        slot.session.set_error(message.clone());
        self.events
            .send(SessionEvent::answer_failed(None, message.clone()));
        match stage {
            RequestKind::Transform => StepOutcome::TransformFailed { message },
            RequestKind::Summarize => StepOutcome::SummaryFailed { message },
        }
    }

    // ------------------------------------------------------------------------
    // Result report
    // ------------------------------------------------------------------------

    /// Builds the result report for a finished session.
    ///
    /// # Errors
    ///
    /// Returns `JudgmentError::SessionNotComplete` until the summary is attached.
    pub async fn report(&self) -> Result<Report> {
        let slot = self.slot.lock().await;
        let session = &slot.session;
        let (Some(summary), Some(title)) = (session.summary(), session.title()) else {
            return Err(JudgmentError::SessionNotComplete {
                answered: session.cursor(),
                total: session.questions().len(),
            });
        };

        let answers = session
            .answers()
            .iter()
            .zip(session.questions())
            .enumerate()
            .map(|(i, (record, question))| {
                AnswerEntry::new(i + 1, &question.text, &record.label, side_of(record.choice))
            })
            .collect();

        let report = Report::builder()
            .title(title)
            .summary(summary)
            .themes(self.themes.code.label(), self.themes.chaos.label())
            .answers(answers)
            .timing(session.started_at(), session.completed_at())
            .build()?;
        Ok(report)
    }
}

const fn side_of(protocol: Protocol) -> Side {
    match protocol {
        Protocol::Code => Side::Code,
        Protocol::Chaos => Side::Chaos,
    }
}

// ============================================================================
// Tests
// ============================================================================
