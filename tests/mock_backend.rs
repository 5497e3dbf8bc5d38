#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{Value, json};
use tokio::sync::oneshot;

pub type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub const INDEX_BODY: &str = "<html><body>storyweave shell</body></html>";
pub const APP_JS_BODY: &str = "console.log('storyweave');";

/// Scripted backend state. Status polls pop from the front of the queue; an
/// entry containing `__http_error` makes that poll answer HTTP 500, and an
/// exhausted queue does the same.
#[derive(Clone, Default)]
pub struct BackendState {
    pub statuses: Arc<Mutex<VecDeque<Value>>>,
    pub duplicate: Arc<Mutex<Option<Value>>>,
    pub upload_calls: Arc<AtomicUsize>,
    pub shell_hits: Arc<AtomicUsize>,
}

pub struct MockBackend {
    pub port: u16,
    pub state: BackendState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl MockBackend {
    pub async fn start() -> TestResult<Self> {
        let port = find_free_port()?;
        let state = BackendState::default();

        let app = Router::new()
            .route("/", get(serve_root))
            .route("/index.html", get(serve_index))
            .route("/app.js", get(serve_app_js))
            .route("/api/auth/token", post(issue_token))
            .route("/api/auth/me", get(me))
            .route("/api/list-stories", get(list_stories))
            .route("/api/load-story/{story_id}", get(load_story))
            .route("/api/check-duplicate", post(check_duplicate))
            .route("/api/upload", post(upload))
            .route("/api/status/{job_id}", get(job_status))
            .route("/api/slow", get(slow_endpoint))
            .route("/covers/{name}", get(serve_cover))
            .route("/releases/latest", get(latest_release))
            .route("/api/story/{story_id}/tts-status", get(tts_status))
            .route("/api/story/{story_id}/scene/{n}/audio", get(scene_audio))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(Self {
            port,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn push_status(&self, status: Value) {
        self.state
            .statuses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(status);
    }

    pub fn set_duplicate(&self, response: Value) {
        *self
            .state
            .duplicate
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(response);
    }

    pub fn upload_calls(&self) -> usize {
        self.state.upload_calls.load(Ordering::SeqCst)
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

pub fn find_free_port() -> TestResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// A base URL nothing listens on, for offline scenarios.
pub fn dead_base_url() -> TestResult<String> {
    Ok(format!("http://127.0.0.1:{}", find_free_port()?))
}

async fn serve_root(State(state): State<BackendState>) -> Html<&'static str> {
    state.shell_hits.fetch_add(1, Ordering::SeqCst);
    Html(INDEX_BODY)
}

async fn serve_index(State(state): State<BackendState>) -> Html<&'static str> {
    state.shell_hits.fetch_add(1, Ordering::SeqCst);
    Html(INDEX_BODY)
}

async fn serve_app_js(State(state): State<BackendState>) -> Response {
    state.shell_hits.fetch_add(1, Ordering::SeqCst);
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        APP_JS_BODY,
    )
        .into_response()
}

async fn issue_token() -> Json<Value> {
    Json(json!({"access_token": "test-token", "token_type": "bearer"}))
}

async fn me() -> Json<Value> {
    Json(json!({"username": "reader", "email": "reader@example.com"}))
}

async fn list_stories() -> Json<Value> {
    Json(json!([
        {"story_id": "s1", "name": "The Fox and the River", "saved_at": "2026-08-01T10:00:00Z"}
    ]))
}

async fn load_story(Path(story_id): Path<String>) -> Json<Value> {
    Json(json!({
        "name": format!("Story {}", story_id),
        "story_data": {
            "title": "The Fox and the River",
            "scenes": [{"scene": 1, "text": "A fox reached a wide river."}],
            "quiz": [{"question": "Who reached the river?"}]
        }
    }))
}

async fn check_duplicate(State(state): State<BackendState>) -> Json<Value> {
    let configured = state
        .duplicate
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone();
    Json(configured.unwrap_or_else(|| json!({"is_duplicate": false})))
}

async fn upload(State(state): State<BackendState>) -> Json<Value> {
    state.upload_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({"job_id": "abc123", "message": "Story generation started"}))
}

async fn job_status(State(state): State<BackendState>, Path(_job_id): Path<String>) -> Response {
    let next = state
        .statuses
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .pop_front();
    match next {
        Some(value) if value.get("__http_error").is_some() => {
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Some(value) => Json(value).into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn slow_endpoint() -> Json<Value> {
    tokio::time::sleep(std::time::Duration::from_millis(600)).await;
    Json(json!({"ok": true}))
}

async fn latest_release() -> Json<Value> {
    Json(json!({"tag_name": "v9.9.9"}))
}

async fn serve_cover(Path(name): Path<String>) -> Response {
    (
        [(header::CONTENT_TYPE, "image/png")],
        format!("png-bytes-for-{}", name),
    )
        .into_response()
}

async fn tts_status(Path(_story_id): Path<String>) -> Json<Value> {
    Json(json!({
        "tts_progress": {"1": "done", "2": "done"},
        "scenes_ready": [1, 2],
        "percentage": 50.0,
        "is_complete": false
    }))
}

async fn scene_audio(Path((_story_id, n)): Path<(String, u32)>) -> Response {
    (
        [(header::CONTENT_TYPE, "audio/mpeg")],
        format!("fake-audio-scene-{}", n),
    )
        .into_response()
}
