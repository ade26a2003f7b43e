//! End-to-end integration tests for the Judgment quiz.
//!
//! A real server is bound to a local port and driven over HTTP with
//! `reqwest`. The image editing and vision services are the real clients
//! pointed at a `wiremock` server.

use std::path::PathBuf;
use std::sync::Arc;

use judgment_genai::{FluxKontextClient, GeminiClient};
use judgment_orchestrator::{create_router, AppState, Config, Image, ImageFormat};
use judgment_report::Report;
use reqwest::StatusCode;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PHOTO: &str = "data:image/png;base64,iVBORw0KGgo=";
const SAMPLE: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];
const SUMMARY: &str = "A figure framed by chrome racks and melting neon.";

/// Path to the sample config fixture.
fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/judgment.json")
}

/// Mounts a Kontext API that is ready on the first poll, plus a Gemini API.
async fn mock_services(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/flux-kontext-pro"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "edit-1" })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/get_result"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "edit-1",
            "status": "Ready",
            "result": { "sample": format!("{}/samples/edit-1.jpg", server.uri()) }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/samples/edit-1.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SAMPLE.to_vec(), "image/jpeg"))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": SUMMARY }] } }]
        })))
        .mount(server)
        .await;
}

/// Spawns the app on an ephemeral port and returns its base URL.
async fn spawn_app(server: &MockServer, lead_dir: &tempfile::TempDir) -> String {
    let mut config = Config::load_from_file(&fixture_path()).expect("Failed to load fixture");
    config.transform.base_url = server.uri();
    config.summary.base_url = server.uri();
    config.lead_file = lead_dir.path().join("leads.jsonl").display().to_string();
    config.validate().expect("Fixture overrides are valid");

    let transformer = Arc::new(FluxKontextClient::from_config(&config.transform, "bfl-key"));
    let summarizer = Arc::new(GeminiClient::from_config(&config.summary, "gemini-key"));
    let router = create_router(AppState::from_config(config, transformer, summarizer));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    format!("http://{addr}")
}

async fn get(base: &str, route: &str) -> (StatusCode, Value) {
    let response = reqwest::get(format!("{base}{route}"))
        .await
        .expect("Request failed");
    let status = response.status();
    (status, response.json().await.unwrap_or(Value::Null))
}

async fn post(base: &str, route: &str, body: Value) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(format!("{base}{route}"))
        .json(&body)
        .send()
        .await
        .expect("Request failed");
    let status = response.status();
    (status, response.json().await.unwrap_or(Value::Null))
}

/// Prompts sent to the editing service, in order.
async fn submitted_prompts(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .expect("Request recording is enabled")
        .iter()
        .filter(|r| r.url.path() == "/flux-kontext-pro")
        .map(|r| {
            let body: Value = serde_json::from_slice(&r.body).expect("Submit body is JSON");
            body["prompt"].as_str().unwrap_or_default().to_string()
        })
        .collect()
}

// ============================================================================
// Fixture Tests
// ============================================================================

/// Tests that the sample config loads and skips placeholder descriptions.
#[test]
fn test_sample_config_loads() {
    let config = Config::load_from_file(&fixture_path()).expect("Failed to load config");

    assert_eq!(config.question_count, Some(2));
    assert_eq!(config.question_bank().session_len(), 2);
    assert_eq!(config.transform.poll_interval_ms, 1);
    assert_eq!(config.transform.model, "flux-kontext-pro");
    assert_eq!(config.themes.code.name, "Code");
    assert_eq!(config.themes.code.label(), "TerminAEtor");
    assert!(config.themes.code.guidance_for(0).is_some());
    assert!(config.themes.code.guidance_for(1).is_none());
    assert_eq!(
        config.themes.chaos.guidance_for(5),
        config.themes.chaos.guidance_for(0)
    );
}

// ============================================================================
// Quiz Flow Tests
// ============================================================================

/// Tests the complete flow from photo capture through the result report.
#[tokio::test]
async fn test_full_quiz_over_http() {
    let server = MockServer::start().await;
    mock_services(&server).await;
    let lead_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let base = spawn_app(&server, &lead_dir).await;

    let (status, session) = get(&base, "/api/session").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["status"], "empty");

    let (status, session) = post(&base, "/api/session", json!({ "image": PHOTO })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session["status"], "in_progress");
    assert_eq!(session["total"], 2);
    assert_eq!(session["currentImage"], PHOTO);

    let (status, question) = get(&base, "/api/question").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(question["id"], 1);

    let (status, outcome) = post(
        &base,
        "/api/answer",
        json!({ "questionId": 1, "choice": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome, json!({ "outcome": "advanced", "cursor": 1, "total": 2 }));

    let (status, outcome) = post(&base, "/api/answer", json!({ "choice": 1 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "completed");
    assert_eq!(outcome["title"], "Judgment: Chaos Protocol");
    assert_eq!(outcome["summary"], SUMMARY);

    let (_, session) = get(&base, "/api/session").await;
    assert_eq!(session["status"], "complete");
    assert_eq!(session["busy"], false);
    assert_eq!(
        session["currentImage"],
        Image::new(ImageFormat::Jpeg, SAMPLE.to_vec()).to_data_uri()
    );
    assert_eq!(session["answers"].as_array().map(Vec::len), Some(2));

    let prompts = submitted_prompts(&server).await;
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("elements of the Code theme"));
    assert!(prompts[0].contains("Rows of chrome server racks"));
    assert!(prompts[1].contains("elements of the Chaos theme"));
    assert!(prompts[1].contains("Melting neon billboards"));

    let (status, body) = get(&base, "/api/result").await;
    assert_eq!(status, StatusCode::OK);
    let report: Report = serde_json::from_value(body).expect("Report JSON");
    assert_eq!(report.title, "Judgment: Chaos Protocol");
    assert_eq!(report.summary, SUMMARY);
    assert_eq!(report.verdict.code, 1);
    assert_eq!(report.verdict.chaos, 1);
    assert_eq!(report.verdict.code_percent, 50);
    assert_eq!(report.chaos_theme, "TerminAItor");

    let markdown = reqwest::get(format!("{base}/api/result/markdown"))
        .await
        .expect("Request failed")
        .text()
        .await
        .expect("Markdown body");
    assert!(markdown.starts_with("# Judgment Rendered: Judgment: Chaos Protocol"));
    assert!(markdown.contains("| Code | TerminAEtor | 1 | 50% |"));
    assert!(markdown.contains(SUMMARY));

    let (status, _) = post(&base, "/api/reset", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(&base, "/api/result").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// Tests that a failed edit keeps the photo and allows a retry.
#[tokio::test]
async fn test_failed_edit_keeps_previous_image() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/flux-kontext-pro"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mock_services(&server).await;
    let lead_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let base = spawn_app(&server, &lead_dir).await;

    post(&base, "/api/session", json!({ "image": PHOTO })).await;

    let (status, outcome) = post(&base, "/api/answer", json!({ "choice": 0 })).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(outcome["outcome"], "transform_failed");
    assert!(outcome["message"]
        .as_str()
        .unwrap_or_default()
        .contains("upstream exploded"));

    let (_, session) = get(&base, "/api/session").await;
    assert_eq!(session["cursor"], 0);
    assert_eq!(session["busy"], false);
    assert_eq!(session["currentImage"], PHOTO);
    assert!(session["lastError"]
        .as_str()
        .unwrap_or_default()
        .starts_with("AI ERROR:"));

    let (status, outcome) = post(&base, "/api/answer", json!({ "choice": 0 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "advanced");

    let (_, session) = get(&base, "/api/session").await;
    assert_eq!(session["lastError"], Value::Null);
}

// ============================================================================
// Lead Capture Tests
// ============================================================================

/// Tests that leads are appended to the configured file.
#[tokio::test]
async fn test_lead_capture_writes_file() {
    let server = MockServer::start().await;
    let lead_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let base = spawn_app(&server, &lead_dir).await;

    let (status, body) = post(&base, "/api/lead", json!({ "email": " sarah@cyberdyne.com " })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["saved"], true);

    let (status, body) = post(&base, "/api/lead", json!({ "email": "skynet" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let contents = std::fs::read_to_string(lead_dir.path().join("leads.jsonl"))
        .expect("Lead file written");
    let lines: Vec<Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).expect("Lead line is JSON"))
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["email"], "sarah@cyberdyne.com");
    assert!(lines[0]["timestamp"].is_string());
}
