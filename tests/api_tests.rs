// Integration tests for the HTTP surface
//
// Router-level tests driven with tower's oneshot: authentication rules,
// endpoint contracts, and the inline/queued response shapes.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use scribeflow::dispatch::{InlineDispatcher, QueuedDispatcher, WorkDispatcher};
use scribeflow::insights::{InsightBuilder, InsightModel, InsightModelError};
use scribeflow::queue::{JobQueue, JobStore, RetentionPolicy, WorkerPool};
use scribeflow::transcribe::{AudioPayload, SpeechEngine, SpeechEngineError, Transcriber};
use scribeflow::{create_router, AppState, ProcessingPipeline, SessionRegistry, TempStore};

const TOKEN: &str = "test-secret";
const BOUNDARY: &str = "scribeflow-test-boundary";

struct EchoEngine;

#[async_trait]
impl SpeechEngine for EchoEngine {
    async fn transcribe(&self, payload: AudioPayload<'_>) -> Result<String, SpeechEngineError> {
        match payload {
            AudioPayload::Encoded { bytes, .. } => {
                Ok(String::from_utf8_lossy(bytes).into_owned())
            }
            AudioPayload::Pcm { samples, .. } => Ok(format!("pcm:{}", samples.len())),
        }
    }
}

struct DownModel;

#[async_trait]
impl InsightModel for DownModel {
    async fn generate(&self, _prompt: &str) -> Result<String, InsightModelError> {
        Err(InsightModelError::ApiRequestFailed("unreachable".to_string()))
    }
}

struct TestApp {
    router: Router,
    _dir: TempDir,
}

fn test_app(queued: bool) -> TestApp {
    let dir = TempDir::new().unwrap();
    let temp = Arc::new(TempStore::new(dir.path()).unwrap());
    let transcriber = Arc::new(Transcriber::new(Arc::new(EchoEngine)));
    let insights = Arc::new(InsightBuilder::new(Arc::new(DownModel)));
    let pipeline = Arc::new(ProcessingPipeline::new(
        Arc::clone(&transcriber),
        Arc::clone(&insights),
        Arc::clone(&temp),
    ));
    let registry = Arc::new(SessionRegistry::new(
        transcriber,
        insights,
        Arc::clone(&temp),
    ));

    let (dispatcher, queue): (Arc<dyn WorkDispatcher>, Option<Arc<JobQueue>>) = if queued {
        let store = Arc::new(JobStore::new(RetentionPolicy::default()));
        let (job_queue, rx) = JobQueue::new(Arc::clone(&store));
        let job_queue = Arc::new(job_queue);
        WorkerPool::spawn(1, rx, store, pipeline);
        (
            Arc::new(QueuedDispatcher::new(Arc::clone(&job_queue), temp)),
            Some(job_queue),
        )
    } else {
        (Arc::new(InlineDispatcher::new(pipeline, temp)), None)
    };

    let state = AppState {
        dispatcher,
        queue,
        registry,
        bearer_token: Some(TOKEN.to_string()),
    };

    TestApp {
        router: create_router(state),
        _dir: dir,
    }
}

fn multipart_body(fields: &[(&str, &str)]) -> (String, String) {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    (
        body,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    )
}

fn multipart_file_body(field: &str, filename: &str, bytes: &[u8]) -> (Vec<u8>, String) {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
             filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    (
        body,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    )
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_open_and_dependency_free() {
    let app = test_app(false);

    let response = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn submission_without_a_credential_is_unauthorized() {
    let app = test_app(false);
    let (body, content_type) = multipart_body(&[("transcript", "hi")]);

    let response = app
        .router
        .oneshot(
            Request::post("/api/finalize")
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn a_wrong_credential_is_forbidden() {
    let app = test_app(false);
    let (body, content_type) = multipart_body(&[("transcript", "hi")]);

    let response = app
        .router
        .oneshot(
            Request::post("/api/finalize")
                .header(header::AUTHORIZATION, "Bearer wrong")
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn process_without_audio_or_url_is_a_client_error() {
    let app = test_app(false);
    let (body, content_type) = multipart_body(&[]);

    let response = app
        .router
        .oneshot(
            Request::post("/api/process")
                .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "missing_audio_url_or_audio");
}

#[tokio::test]
async fn inline_finalize_returns_the_complete_result_shape() {
    let app = test_app(false);
    let (body, content_type) = multipart_body(&[("transcript", "hello world")]);

    let response = app
        .router
        .oneshot(
            Request::post("/api/finalize")
                .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["transcript"], "hello world");
    // All four insight fields are present even when the model is unreachable.
    let insights = &body["insights"];
    assert!(insights["summary"].is_string());
    assert!(insights["topics"].is_array());
    assert!(insights["action_items"].is_array());
    assert_eq!(insights["sentiment"]["label"], "neutral");
    assert!(body["audio_id"].as_str().unwrap().starts_with("rest-"));
}

#[tokio::test]
async fn inline_process_transcribes_an_upload() {
    let app = test_app(false);
    let (body, content_type) = multipart_file_body("audio", "note.webm", b"dictated words");

    let response = app
        .router
        .oneshot(
            Request::post("/api/process")
                .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["transcript"], "dictated words");
}

#[tokio::test]
async fn queued_process_returns_a_job_handle_and_the_job_is_queryable() {
    let app = test_app(true);
    let (body, content_type) = multipart_file_body("audio", "note.webm", b"queued words");

    let response = app
        .router
        .clone()
        .oneshot(
            Request::post("/api/process")
                .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["queued"], true);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    // Poll the query path until the worker finishes.
    for _ in 0..200 {
        let response = app
            .router
            .clone()
            .oneshot(
                Request::get(format!("/jobs/{}", job_id))
                    .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["id"], job_id.as_str());
        if body["state"] == "completed" {
            assert_eq!(body["result"]["transcript"], "queued words");
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("queued job never completed");
}

#[tokio::test]
async fn unknown_job_ids_are_not_found() {
    let app = test_app(true);

    for id in ["b0b1c0de-0000-4000-8000-000000000000", "not-a-uuid"] {
        let response = app
            .router
            .clone()
            .oneshot(
                Request::get(format!("/jobs/{}", id))
                    .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["error"], "not_found");
    }
}

/// Perform a raw WebSocket handshake against a live server and return the
/// HTTP status line code. The upgrade needs a real connection, so oneshot
/// doesn't cut it here.
async fn ws_handshake_status(addr: std::net::SocketAddr, token: Option<&str>) -> u16 {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let path = match token {
        Some(t) => format!("/ws?token={}", t),
        None => "/ws".to_string(),
    };
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\
         Sec-WebSocket-Version: 13\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n",
        path, addr
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut buf = vec![0u8; 1024];
    let n = stream.read(&mut buf).await.unwrap();
    let head = String::from_utf8_lossy(&buf[..n]).into_owned();
    head.split_whitespace().nth(1).unwrap().parse().unwrap()
}

#[tokio::test]
async fn live_channel_rejects_unauthenticated_and_upgrades_authenticated() {
    let app = test_app(false);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    assert_eq!(ws_handshake_status(addr, None).await, 401);
    assert_eq!(ws_handshake_status(addr, Some("wrong")).await, 401);
    assert_eq!(ws_handshake_status(addr, Some(TOKEN)).await, 101);
}
