//! Session store for a single quiz attempt.
//!
//! This module defines the state machine that tracks one attempt from the
//! captured photo through every answered question to the final summary.
//! All transitions are synchronous and either apply completely or not at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{JudgmentError, Result};
use crate::image::Image;
use crate::question::{Choice, Protocol, Question};

// ============================================================================
// SessionStatus
// ============================================================================

/// Lifecycle status of a session.
///
/// The status transitions through these states:
/// - `Empty` -> `InProgress` (on start)
/// - `InProgress` -> `InProgress` (answer while questions remain)
/// - `InProgress` -> `Complete` (answer to the last question)
/// - any -> `Empty` (on reset)
///
/// Attaching the summary refines `Complete` without changing the status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No photo and no questions.
    #[default]
    Empty,
    /// Questions remain unanswered.
    InProgress,
    /// Every question has been answered.
    Complete,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

// ============================================================================
// AnswerRecord
// ============================================================================

/// One entry of the answer log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    /// The answered question.
    pub question_id: u32,
    /// Protocol of the chosen answer.
    pub choice: Protocol,
    /// Text of the chosen answer.
    pub label: String,
    /// When the answer was accepted.
    pub answered_at: DateTime<Utc>,
}

impl AnswerRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(question_id: u32, choice: &Choice) -> Self {
        Self {
            question_id,
            choice: choice.protocol,
            label: choice.text.clone(),
            answered_at: Utc::now(),
        }
    }
}

// ============================================================================
// RequestHandle
// ============================================================================

/// Which collaborator a pending request is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Image transformation for an answer.
    Transform,
    /// Summary of the final image.
    Summarize,
}

/// Identifies one outstanding collaborator call.
///
/// The generation ties the request to a session incarnation and the sequence
/// makes it unique within that incarnation. A result may only be applied
/// while the session still holds the exact handle that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHandle {
    /// Session generation that issued the request.
    pub generation: u64,
    /// Per-controller request counter.
    pub sequence: u64,
    /// Collaborator being called.
    pub kind: RequestKind,
}

// ============================================================================
// Session
// ============================================================================

/// Complete state of one quiz attempt.
///
/// Fields are private so the answer log, cursor and images can only move
/// together through the transition methods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    original_image: Option<Image>,
    current_image: Option<Image>,
    questions: Vec<Question>,
    answers: Vec<AnswerRecord>,
    cursor: usize,
    summary: Option<String>,
    title: Option<String>,
    pending: Option<RequestHandle>,
    last_error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates an empty session.
    ///
    /// # Examples
    ///
    /// ```
    /// use judgment_orchestrator::{Session, SessionStatus};
    ///
    /// let session = Session::new();
    /// assert_eq!(session.status(), SessionStatus::Empty);
    /// assert_eq!(session.cursor(), 0);
    /// assert!(session.current_question().is_none());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new attempt with the captured photo and the drawn questions.
    ///
    /// Every field is reset; the current image starts as the captured one.
    ///
    /// # Errors
    ///
    /// Returns `JudgmentError::EmptyQuestionSet` if `questions` is empty. The
    /// session is left untouched in that case.
    pub fn start(&mut self, image: Image, questions: Vec<Question>) -> Result<()> {
        if questions.is_empty() {
            return Err(JudgmentError::EmptyQuestionSet);
        }
        *self = Self {
            original_image: Some(image.clone()),
            current_image: Some(image),
            questions,
            started_at: Some(Utc::now()),
            ..Self::default()
        };
        Ok(())
    }

    /// Returns the question awaiting an answer, or `None` when there is none.
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.cursor)
    }

    /// Accepts the answer to the current question.
    ///
    /// Appends to the answer log, replaces the current image and advances
    /// the cursor by one.
    ///
    /// # Errors
    ///
    /// Returns `JudgmentError::NoActiveQuestion` when every question is
    /// already answered (or none were started) and
    /// `JudgmentError::QuestionMismatch` when `question_id` is not the current
    /// question. Nothing is modified on error.
    pub fn record_answer(&mut self, question_id: u32, choice: &Choice, image: Image) -> Result<()> {
        let current = self
            .current_question()
            .ok_or(JudgmentError::NoActiveQuestion)?;
        if current.id != question_id {
            return Err(JudgmentError::QuestionMismatch {
                given: question_id,
                expected: current.id,
            });
        }

        self.answers.push(AnswerRecord::new(question_id, choice));
        self.current_image = Some(image);
        self.cursor += 1;
        if self.cursor == self.questions.len() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Attaches the summary and title to a completed session.
    ///
    /// # Errors
    ///
    /// Returns `JudgmentError::InvalidStateTransition` for an empty session,
    /// `JudgmentError::SessionNotComplete` while questions remain, and
    /// `JudgmentError::AlreadyFinished` if a summary was already attached.
    pub fn finish(&mut self, summary: impl Into<String>, title: impl Into<String>) -> Result<()> {
        match self.status() {
            SessionStatus::Empty => {
                return Err(JudgmentError::invalid_transition(
                    SessionStatus::Empty,
                    SessionStatus::Complete,
                ));
            }
            SessionStatus::InProgress => {
                return Err(JudgmentError::SessionNotComplete {
                    answered: self.cursor,
                    total: self.questions.len(),
                });
            }
            SessionStatus::Complete => {}
        }
        if self.summary.is_some() {
            return Err(JudgmentError::AlreadyFinished);
        }
        self.summary = Some(summary.into());
        self.title = Some(title.into());
        Ok(())
    }

    /// Discards the attempt, leaving a session equal to [`Session::new`].
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    // ------------------------------------------------------------------------
    // Pending request slot and error message
    // ------------------------------------------------------------------------

    /// Marks a collaborator call as outstanding.
    ///
    /// Returns `false` without changing anything if another call is already
    /// outstanding. The last error is cleared when the slot is taken.
    pub fn begin_request(&mut self, handle: RequestHandle) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some(handle);
        self.last_error = None;
        true
    }

    /// Switches the outstanding call to a new handle (e.g. transform to summarize).
    ///
    /// Returns `false` if `from` is not the outstanding handle.
    pub fn hand_over_request(&mut self, from: RequestHandle, to: RequestHandle) -> bool {
        if self.pending != Some(from) {
            return false;
        }
        self.pending = Some(to);
        true
    }

    /// Clears the outstanding call if it is `handle`.
    ///
    /// Returns `false` if a different (or no) call is outstanding.
    pub fn end_request(&mut self, handle: RequestHandle) -> bool {
        if self.pending != Some(handle) {
            return false;
        }
        self.pending = None;
        true
    }

    /// Returns `true` if `handle` is the outstanding call.
    #[must_use]
    pub fn is_pending(&self, handle: RequestHandle) -> bool {
        self.pending == Some(handle)
    }

    /// Sets the user-facing error message without touching quiz progress.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    // ------------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------------

    /// Returns the lifecycle status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        if self.questions.is_empty() {
            SessionStatus::Empty
        } else if self.cursor < self.questions.len() {
            SessionStatus::InProgress
        } else {
            SessionStatus::Complete
        }
    }

    /// Returns `true` once the summary is attached.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.summary.is_some()
    }

    /// Returns `true` while a collaborator call is outstanding.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// The outstanding call, if any.
    #[must_use]
    pub const fn pending(&self) -> Option<RequestHandle> {
        self.pending
    }

    /// Index of the next unanswered question.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// The questions of this attempt.
    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// The answer log.
    #[must_use]
    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    /// The captured photo.
    #[must_use]
    pub const fn original_image(&self) -> Option<&Image> {
        self.original_image.as_ref()
    }

    /// The most recent successful transformation, or the captured photo.
    #[must_use]
    pub const fn current_image(&self) -> Option<&Image> {
        self.current_image.as_ref()
    }

    /// The summary text, once attached.
    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// The result title, once attached.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// The last user-facing error message.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// When the attempt started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// When the last question was answered.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

// ============================================================================
// Tests
// ============================================================================
