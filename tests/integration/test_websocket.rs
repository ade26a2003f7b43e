//! Integration tests for WebSocket real-time event streaming.
//!
//! These tests validate that quiz progress driven over HTTP reaches every
//! connected WebSocket client, in order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use judgment_orchestrator::{
    create_router, AppState, Config, GenerationErrorKind, Image, ImageFormat, JudgmentError,
    Protocol, Result, SessionEvent, SessionStatus, SummaryRequest, SummaryResponse, Summarizer,
    TransformRequest, TransformResponse, Transformer,
};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const PHOTO: &str = "data:image/png;base64,iVBORw0KGgo=";

/// Helper type for WebSocket client
type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Default)]
struct StubTransformer {
    fail: AtomicBool,
}

#[async_trait]
impl Transformer for StubTransformer {
    async fn transform(&self, request: TransformRequest) -> Result<TransformResponse> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(JudgmentError::generation(
                GenerationErrorKind::Network,
                "connection reset",
            ));
        }
        Ok(TransformResponse {
            image: Image::new(ImageFormat::Jpeg, vec![7; 4]),
            description: format!("Edited towards {}", request.theme),
        })
    }
}

struct StubSummarizer;

#[async_trait]
impl Summarizer for StubSummarizer {
    async fn summarize(&self, _request: SummaryRequest) -> Result<SummaryResponse> {
        Ok(SummaryResponse {
            summary: "Chrome everywhere.".to_string(),
        })
    }
}

struct TestServer {
    base: String,
    ws_url: String,
    transformer: Arc<StubTransformer>,
}

/// Spawns a one-question quiz server on an ephemeral port.
async fn spawn_test_server() -> TestServer {
    let config = Config {
        question_count: Some(1),
        ..Config::default()
    };
    let transformer = Arc::new(StubTransformer::default());
    let state = AppState::from_config(config, transformer.clone(), Arc::new(StubSummarizer));
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    TestServer {
        base: format!("http://{addr}"),
        ws_url: format!("ws://{addr}/ws"),
        transformer,
    }
}

/// Connects a WebSocket client to the given URL.
async fn connect_client(url: &str) -> WsClient {
    let (ws_stream, _) = connect_async(url)
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

/// Connects and consumes the `connected` greeting.
async fn connect_ready(url: &str) -> WsClient {
    let mut client = connect_client(url).await;
    let event = receive_event(&mut client).await;
    assert!(
        matches!(event, SessionEvent::Connected(_)),
        "Expected Connected event, got: {event:?}"
    );
    client
}

/// Receives the next text message and parses it as a `SessionEvent`.
/// Automatically handles ping frames by responding with pong.
async fn receive_event(client: &mut WsClient) -> SessionEvent {
    loop {
        let msg = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("Timeout waiting for message")
            .expect("Stream ended")
            .expect("WebSocket error");

        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("Failed to parse event");
            }
            Message::Ping(data) => {
                client
                    .send(Message::Pong(data))
                    .await
                    .expect("Failed to send pong");
            }
            Message::Pong(_) => {}
            other => panic!("Expected text message, got: {other:?}"),
        }
    }
}

async fn post(base: &str, route: &str, body: serde_json::Value) -> reqwest::StatusCode {
    reqwest::Client::new()
        .post(format!("{base}{route}"))
        .json(&body)
        .send()
        .await
        .expect("Failed to send HTTP request")
        .status()
}

// ============================================================================
// Connection Tests
// ============================================================================

/// Tests that a client receives the session view on connection.
#[tokio::test]
async fn test_client_receives_connected_event_on_connect() {
    let server = spawn_test_server().await;

    let mut client = connect_client(&server.ws_url).await;
    let event = receive_event(&mut client).await;

    let SessionEvent::Connected(payload) = event else {
        panic!("Expected Connected event, got: {event:?}");
    };
    assert_eq!(payload.session.status, SessionStatus::Empty);
    assert_eq!(payload.session.generation, 0);
}

/// Tests that a late client sees the running session.
#[tokio::test]
async fn test_connected_event_contains_current_session() {
    let server = spawn_test_server().await;
    post(&server.base, "/api/session", json!({ "image": PHOTO })).await;

    let mut client = connect_client(&server.ws_url).await;
    let SessionEvent::Connected(payload) = receive_event(&mut client).await else {
        panic!("Expected Connected event");
    };
    assert_eq!(payload.session.status, SessionStatus::InProgress);
    assert_eq!(payload.session.generation, 1);
    assert_eq!(payload.session.total, 1);
    assert_eq!(
        payload.session.current_question.map(|q| q.id),
        Some(1)
    );
}

// ============================================================================
// Quiz Event Tests
// ============================================================================

/// Tests the event sequence for a complete one-question quiz.
#[tokio::test]
async fn test_quiz_events_arrive_in_order() {
    let server = spawn_test_server().await;
    let mut client = connect_ready(&server.ws_url).await;

    let status = post(&server.base, "/api/session", json!({ "image": PHOTO })).await;
    assert_eq!(status, reqwest::StatusCode::CREATED);
    let SessionEvent::SessionStarted(started) = receive_event(&mut client).await else {
        panic!("Expected SessionStarted event");
    };
    assert_eq!(started.generation, 1);
    assert_eq!(started.total_questions, 1);

    let status = post(&server.base, "/api/answer", json!({ "choice": 1 })).await;
    assert_eq!(status, reqwest::StatusCode::OK);

    let SessionEvent::AnswerStarted(answer) = receive_event(&mut client).await else {
        panic!("Expected AnswerStarted event");
    };
    assert_eq!(answer.question_id, 1);
    assert_eq!(answer.question_number, 1);
    assert_eq!(answer.choice, Protocol::Chaos);

    let SessionEvent::AnswerAccepted(accepted) = receive_event(&mut client).await else {
        panic!("Expected AnswerAccepted event");
    };
    assert_eq!(accepted.cursor, 1);
    assert_eq!(accepted.total, 1);
    assert_eq!(accepted.description, "Edited towards Chaos");

    let SessionEvent::SessionComplete(complete) = receive_event(&mut client).await else {
        panic!("Expected SessionComplete event");
    };
    assert_eq!(complete.title, "Judgment: Chaos Protocol");
    assert_eq!(complete.summary, "Chrome everywhere.");
}

/// Tests that a failed edit is broadcast with the question it failed on.
#[tokio::test]
async fn test_failed_answer_event_broadcast() {
    let server = spawn_test_server().await;
    post(&server.base, "/api/session", json!({ "image": PHOTO })).await;
    let mut client = connect_ready(&server.ws_url).await;
    server.transformer.fail.store(true, Ordering::SeqCst);

    let status = post(&server.base, "/api/answer", json!({ "choice": 0 })).await;
    assert_eq!(status, reqwest::StatusCode::BAD_GATEWAY);

    assert!(matches!(
        receive_event(&mut client).await,
        SessionEvent::AnswerStarted(_)
    ));
    let SessionEvent::AnswerFailed(failed) = receive_event(&mut client).await else {
        panic!("Expected AnswerFailed event");
    };
    assert_eq!(failed.question_id, Some(1));
    assert_eq!(failed.message, "AI ERROR: connection reset");
}

// ============================================================================
// Multiple Client Tests
// ============================================================================

/// Tests that events are broadcast to all connected clients.
#[tokio::test]
async fn test_events_broadcast_to_all_clients() {
    let server = spawn_test_server().await;
    let mut first = connect_ready(&server.ws_url).await;
    let mut second = connect_ready(&server.ws_url).await;

    let status = post(&server.base, "/api/reset", json!({})).await;
    assert_eq!(status, reqwest::StatusCode::OK);

    for client in [&mut first, &mut second] {
        let SessionEvent::SessionReset(payload) = receive_event(client).await else {
            panic!("Expected SessionReset event");
        };
        assert_eq!(payload.generation, 1);
    }
}

/// Tests that the server keeps serving after a client disconnects.
#[tokio::test]
async fn test_server_continues_after_client_disconnect() {
    let server = spawn_test_server().await;

    let mut leaving = connect_ready(&server.ws_url).await;
    leaving.close(None).await.expect("Failed to close");
    drop(leaving);

    let mut staying = connect_ready(&server.ws_url).await;
    post(&server.base, "/api/session", json!({ "image": PHOTO })).await;

    assert!(matches!(
        receive_event(&mut staying).await,
        SessionEvent::SessionStarted(_)
    ));
}
