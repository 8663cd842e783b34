//! Shared helpers: a mock classification backend and a proxy wired to it.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Multipart, Query, State},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bird_watcher_proxy::{router, Config, ProxyState};
use http_body_util::BodyExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const LOCAL_HOST: &str = "localhost:3000";

#[derive(Default)]
pub struct MockBackend {
    hits: AtomicUsize,
}

impl MockBackend {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Deserialize)]
struct PromptParams {
    prompt: String,
}

#[derive(Deserialize)]
struct ModelParams {
    model: String,
}

async fn ollama(State(mock): State<Arc<MockBackend>>, Query(q): Query<PromptParams>) -> Response {
    mock.hit();
    match q.prompt.as_str() {
        "plain" => (
            [(header::CONTENT_TYPE, "text/plain")],
            "A robin is a small thrush.",
        )
            .into_response(),
        "teapot" => (StatusCode::IM_A_TEAPOT, Json(json!({ "error": "short and stout" }))).into_response(),
        prompt => Json(json!({ "response": format!("echo: {prompt}") })).into_response(),
    }
}

async fn ollama_stream(State(mock): State<Arc<MockBackend>>, Query(q): Query<PromptParams>) -> Response {
    mock.hit();
    match q.prompt.as_str() {
        "empty" => StatusCode::NO_CONTENT.into_response(),
        "broken" => {
            let parts: Vec<Result<Bytes, std::io::Error>> = vec![
                Ok(Bytes::from_static(b"event: update\n")),
                Err(std::io::Error::other("model crashed")),
            ];
            Response::builder()
                .header(header::CONTENT_TYPE, "text/event-stream")
                .body(Body::from_stream(futures::stream::iter(parts)))
                .unwrap()
        }
        _ => {
            let parts: Vec<Result<Bytes, Infallible>> = ["a", "b", "c"]
                .into_iter()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect();
            Response::builder()
                .header(header::CONTENT_TYPE, "text/event-stream")
                .body(Body::from_stream(futures::stream::iter(parts)))
                .unwrap()
        }
    }
}

async fn species(State(mock): State<Arc<MockBackend>>) -> Json<Value> {
    mock.hit();
    Json(json!({ "species": ["American Robin", "Blue Jay", "Northern Cardinal"] }))
}

async fn birdsubmit(
    State(mock): State<Arc<MockBackend>>,
    Query(q): Query<ModelParams>,
    mut multipart: Multipart,
) -> Response {
    mock.hit();
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() == Some("image") {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field.bytes().await.unwrap();
            return Json(json!({
                "predicted_species": "American Robin",
                "confidence": 0.93,
                "model": q.model,
                "file_name": file_name,
                "content_type": content_type,
                "bytes": bytes.len(),
            }))
            .into_response();
        }
    }
    (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "error": "no image" }))).into_response()
}

async fn text_submit(State(mock): State<Arc<MockBackend>>) -> &'static str {
    mock.hit();
    "Internal classifier hiccup"
}

/// Starts a mock backend on an ephemeral port.
pub async fn start_mock_backend() -> (SocketAddr, Arc<MockBackend>) {
    let mock = Arc::new(MockBackend::default());
    let app = Router::new()
        .route("/ollama", get(ollama))
        .route("/ollama/stream", get(ollama_stream))
        .route("/species", get(species))
        .route("/birdsubmit", post(birdsubmit))
        .route("/predict-text", post(text_submit))
        .with_state(mock.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, mock)
}

/// An address nothing listens on.
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn proxy_app(local: SocketAddr, remote: SocketAddr) -> Router {
    proxy_app_with(Config {
        local_api_base: format!("http://{local}/"),
        remote_api_base: format!("http://{remote}"),
        request_timeout_seconds: 5,
        connect_timeout_seconds: 2,
        ..Config::default()
    })
}

pub fn proxy_app_with(config: Config) -> Router {
    let state = ProxyState::from_config(&config).unwrap();
    router(state, config.max_upload_bytes())
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::HOST, LOCAL_HOST)
        .body(Body::empty())
        .unwrap()
}

pub fn multipart_request(uri: &str, image: Option<&[u8]>) -> Request<Body> {
    let boundary = "BirdWatcherBoundary";
    let mut body = Vec::new();
    if let Some(image) = image {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"robin.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(image);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(
        format!("--{boundary}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nbackyard\r\n--{boundary}--\r\n")
            .as_bytes(),
    );

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::HOST, LOCAL_HOST)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
