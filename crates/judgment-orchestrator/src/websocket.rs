//! WebSocket event types and broadcasting for live quiz observation.
//!
//! The front end listens on `/ws` to drive loading and glitch indicators
//! while a transformation is running. Events are broadcast to all connected
//! clients as the controller moves through a session.
//!
//! # Event Types
//!
//! - `connected` - Sent when a client connects, includes the session view
//! - `session_started` - A photo was captured and questions drawn
//! - `answer_started` - A transformation was dispatched
//! - `answer_accepted` - The transformed image was applied
//! - `answer_failed` - The transformation or summary failed
//! - `session_complete` - The summary and title are available
//! - `session_reset` - The session was discarded
//!
//! # Example
//!
//! ```no_run
//! use judgment_orchestrator::websocket::{EventBroadcaster, SessionEvent};
//!
//! # async fn example() {
//! let broadcaster = EventBroadcaster::new(100);
//! let mut receiver = broadcaster.subscribe();
//!
//! broadcaster.send(SessionEvent::session_reset(2));
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {:?}", event);
//! }
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::controller::SessionView;
use crate::question::Protocol;

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `connected` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedPayload {
    /// The session as seen at connection time.
    pub session: SessionView,
}

/// Payload for the `session_started` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartedPayload {
    /// Generation of the new session.
    pub generation: u64,
    /// Number of questions drawn.
    pub total_questions: usize,
    /// When the session started.
    pub timestamp: DateTime<Utc>,
}

/// Payload for the `answer_started` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerStartedPayload {
    /// The question being answered.
    pub question_id: u32,
    /// One-based question number.
    pub question_number: usize,
    /// Protocol of the chosen answer.
    pub choice: Protocol,
}

/// Payload for the `answer_accepted` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerAcceptedPayload {
    /// The answered question.
    pub question_id: u32,
    /// Cursor after the answer.
    pub cursor: usize,
    /// Number of questions in the session.
    pub total: usize,
    /// What the transformation applied.
    pub description: String,
}

/// Payload for the `answer_failed` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerFailedPayload {
    /// The question that failed, if the failure happened on an answer.
    pub question_id: Option<u32>,
    /// User-facing error message.
    pub message: String,
}

/// Payload for the `session_complete` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCompletePayload {
    /// Result title.
    pub title: String,
    /// Summary of the final image.
    pub summary: String,
}

/// Payload for the `session_reset` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResetPayload {
    /// Generation after the reset.
    pub generation: u64,
}

// ============================================================================
// Event Enum
// ============================================================================

/// WebSocket event types for quiz observation.
///
/// All events are serialized as JSON objects with "event" and "payload" fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Sent when a client connects.
    Connected(ConnectedPayload),
    /// Sent when a session starts.
    SessionStarted(SessionStartedPayload),
    /// Sent when a transformation is dispatched.
    AnswerStarted(AnswerStartedPayload),
    /// Sent when an answer is applied.
    AnswerAccepted(AnswerAcceptedPayload),
    /// Sent when a collaborator call fails.
    AnswerFailed(AnswerFailedPayload),
    /// Sent when the summary is attached.
    SessionComplete(SessionCompletePayload),
    /// Sent when the session is reset.
    SessionReset(SessionResetPayload),
}

impl SessionEvent {
    /// Creates a `Connected` event.
    #[must_use]
    pub const fn connected(session: SessionView) -> Self {
        Self::Connected(ConnectedPayload { session })
    }

    /// Creates a `SessionStarted` event.
    #[must_use]
    pub fn session_started(generation: u64, total_questions: usize) -> Self {
        Self::SessionStarted(SessionStartedPayload {
            generation,
            total_questions,
            timestamp: Utc::now(),
        })
    }

    /// Creates an `AnswerStarted` event.
    #[must_use]
    pub const fn answer_started(question_id: u32, question_number: usize, choice: Protocol) -> Self {
        Self::AnswerStarted(AnswerStartedPayload {
            question_id,
            question_number,
            choice,
        })
    }

    /// Creates an `AnswerAccepted` event.
    #[must_use]
    pub const fn answer_accepted(
        question_id: u32,
        cursor: usize,
        total: usize,
        description: String,
    ) -> Self {
        Self::AnswerAccepted(AnswerAcceptedPayload {
            question_id,
            cursor,
            total,
            description,
        })
    }

    /// Creates an `AnswerFailed` event.
    #[must_use]
    pub fn answer_failed(question_id: Option<u32>, message: impl Into<String>) -> Self {
        Self::AnswerFailed(AnswerFailedPayload {
            question_id,
            message: message.into(),
        })
    }

    /// Creates a `SessionComplete` event.
    #[must_use]
    pub const fn session_complete(title: String, summary: String) -> Self {
        Self::SessionComplete(SessionCompletePayload { title, summary })
    }

    /// Creates a `SessionReset` event.
    #[must_use]
    pub const fn session_reset(generation: u64) -> Self {
        Self::SessionReset(SessionResetPayload { generation })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::SessionStarted(_) => "session_started",
            Self::AnswerStarted(_) => "answer_started",
            Self::AnswerAccepted(_) => "answer_accepted",
            Self::AnswerFailed(_) => "answer_failed",
            Self::SessionComplete(_) => "session_complete",
            Self::SessionReset(_) => "session_reset",
        }
    }
}

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Broadcasts session events to all connected WebSocket clients.
///
/// Events are not persisted for disconnected clients.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBroadcaster {
    /// Creates a new `EventBroadcaster` with the specified per-subscriber buffer.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber for receiving events.
    ///
    /// A subscriber that falls behind receives a `Lagged` error and misses
    /// some events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Broadcasts an event, returning the number of subscribers reached.
    pub fn send(&self, event: SessionEvent) -> usize {
        // Err only means nobody is listening
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

/// Maximum number of missed pong responses before disconnecting.
const MAX_MISSED_PONGS: u8 = 3;

/// WebSocket upgrade handler for `/ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("New WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handles a single WebSocket connection.
///
/// Sends `connected` with the current session view, then forwards every
/// broadcast event and pings every 30 seconds. The connection is closed after
/// three missed pongs.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe first so nothing between the snapshot and the loop is lost
    let mut event_receiver = state.controller.subscribe();

    let connected_event = SessionEvent::connected(state.controller.snapshot().await);
    let connected_json = match serde_json::to_string(&connected_event) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize connected event: {}", e);
            return;
        }
    };

    if sender.send(Message::Text(connected_json)).await.is_err() {
        debug!("Client disconnected before receiving connected event");
        return;
    }

    info!("WebSocket client connected, sent session view");

    let mut heartbeat_interval = interval(Duration::from_secs(30));
    let mut missed_pongs = 0u8;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        missed_pongs = 0;
                        debug!("Received pong from client");
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client requested close");
                        break;
                    }
                    Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                        debug!("Ignoring data message from client");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            debug!("Failed to send pong, client disconnected");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }

            event = event_receiver.recv() => {
                match event {
                    Ok(session_event) => {
                        let json = match serde_json::to_string(&session_event) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!("Failed to serialize event: {}", e);
                                continue;
                            }
                        };

                        if sender.send(Message::Text(json)).await.is_err() {
                            debug!("Failed to send event, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Client lagged, missed {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Broadcaster closed");
                        break;
                    }
                }
            }

            _ = heartbeat_interval.tick() => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    debug!("Failed to send ping, client disconnected");
                    break;
                }
                missed_pongs += 1;
                if missed_pongs >= MAX_MISSED_PONGS {
                    info!("Client missed {} pongs, closing connection", MAX_MISSED_PONGS);
                    break;
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

// ============================================================================
// Tests
// ============================================================================
