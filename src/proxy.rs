use std::time::Duration;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::QueryRejection,
        Multipart, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ProxyError;
use crate::locator::{request_host, BackendLocator};
use crate::upstream::{build_url, read_body, UpstreamBody};

pub(crate) const CHAT_CONTEXT: &str = "Failed to proxy chatbot request";
pub(crate) const SPECIES_CONTEXT: &str = "Failed to proxy species";
pub(crate) const SUBMIT_CONTEXT: &str = "Failed to proxy bird submission";
pub(crate) const NON_JSON_NOTE: &str = "Upstream returned non-JSON response";

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct ProxyState {
    pub client: reqwest::Client,
    pub locator: BackendLocator,
    pub request_timeout: Duration,
    pub submit_path: String,
}

impl ProxyState {
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        // No total timeout on the client itself: SSE relays may stay open for
        // minutes. Unary calls set `request_timeout` per request instead.
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self {
            client,
            locator: config.locator(),
            request_timeout: config.request_timeout(),
            submit_path: config.submit_path.clone(),
        })
    }

    pub fn base_url(&self, headers: &HeaderMap) -> String {
        let host = request_host(headers);
        let base = self.locator.base_url(host);
        debug!("🔍 Host {:?} -> backend {}", host, base);
        base
    }
}

/// Raw query pairs, in request order. Repeated keys are kept.
pub type QueryPairs = Result<Query<Vec<(String, String)>>, QueryRejection>;

/// First value for `key`, ignoring later repeats.
pub fn first_param(query: QueryPairs, key: &str) -> Result<Option<String>, ProxyError> {
    let Query(pairs) = query.map_err(|e| ProxyError::InvalidQuery(e.body_text()))?;
    Ok(pairs.into_iter().find(|(k, _)| k == key).map(|(_, v)| v))
}

#[derive(Debug)]
pub struct PromptQuery {
    pub prompt: Option<String>,
}

impl PromptQuery {
    pub fn from_query(query: QueryPairs) -> Result<Self, ProxyError> {
        Ok(Self { prompt: first_param(query, "prompt")? })
    }

    /// The prompt, or `MissingPrompt` when absent or empty.
    pub fn require(self) -> Result<String, ProxyError> {
        self.prompt
            .filter(|p| !p.is_empty())
            .ok_or(ProxyError::MissingPrompt)
    }
}

/// `GET /chatbot?prompt=` -> `GET {base}/ollama?prompt=`
pub async fn chatbot(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    query: QueryPairs,
) -> Result<Response, ProxyError> {
    let prompt = PromptQuery::from_query(query)?.require()?;
    let base = state.base_url(&headers);
    let url = build_url(&base, "/ollama", &[("prompt", &prompt)])
        .map_err(|e| ProxyError::upstream(CHAT_CONTEXT, e))?;

    info!("💬 Forwarding chat prompt ({} chars) to {}", prompt.len(), base);

    let response = state
        .client
        .get(url)
        .header(header::ACCEPT, "application/json, text/plain, */*")
        .timeout(state.request_timeout)
        .send()
        .await
        .map_err(|e| ProxyError::upstream(CHAT_CONTEXT, e))?;

    let (status, body) = read_body(response)
        .await
        .map_err(|e| ProxyError::upstream(CHAT_CONTEXT, e))?;
    info!("📬 Chat upstream status: {}", status);

    Ok(match body {
        UpstreamBody::Json(value) => (status, Json(value)).into_response(),
        UpstreamBody::Text(text) => {
            debug!("Chat upstream returned text, wrapping in envelope");
            (status, Json(json!({ "response": text, "note": NON_JSON_NOTE }))).into_response()
        }
    })
}

/// `GET /species` -> `GET {base}/species`, body and status verbatim.
pub async fn species(
    State(state): State<ProxyState>,
    headers: HeaderMap,
) -> Result<Response, ProxyError> {
    let base = state.base_url(&headers);
    let url = build_url(&base, "/species", &[]).map_err(|e| ProxyError::upstream(SPECIES_CONTEXT, e))?;

    let response = state
        .client
        .get(url)
        .timeout(state.request_timeout)
        .send()
        .await
        .map_err(|e| ProxyError::upstream(SPECIES_CONTEXT, e))?;

    let status = response.status();
    let value = response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| ProxyError::upstream(SPECIES_CONTEXT, e))?;

    info!("🐦 Species list fetched: {}", status);
    Ok((status, Json(value)).into_response())
}

/// Which classifier the backend should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSelector {
    /// The project's own trained model.
    SelfTrained,
    /// The Hugging Face hosted model.
    HuggingFace,
}

impl ModelSelector {
    pub fn parse(raw: Option<&str>) -> Result<Self, ProxyError> {
        match raw.map(str::trim) {
            None | Some("") | Some("self") => Ok(ModelSelector::SelfTrained),
            Some("hf") => Ok(ModelSelector::HuggingFace),
            Some(other) => Err(ProxyError::InvalidModel(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSelector::SelfTrained => "self",
            ModelSelector::HuggingFace => "hf",
        }
    }
}

struct ImageUpload {
    bytes: Vec<u8>,
    file_name: String,
    content_type: String,
}

fn multipart_error(e: MultipartError) -> ProxyError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ProxyError::UploadTooLarge(e.body_text())
    } else {
        ProxyError::Multipart(e.body_text())
    }
}

async fn read_image(mut multipart: Multipart) -> Result<ImageUpload, ProxyError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("image") {
            continue;
        }

        // Capture metadata before `.bytes()` consumes the field.
        let file_name = field.file_name().unwrap_or("upload.jpg").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;

        return Ok(ImageUpload { bytes: bytes.to_vec(), file_name, content_type });
    }
    Err(ProxyError::MissingImage)
}

/// `POST /birdsubmit?model=self|hf` with a multipart `image` field.
pub async fn bird_submit(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    query: QueryPairs,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ProxyError> {
    let model = ModelSelector::parse(first_param(query, "model")?.as_deref())?;
    let multipart = multipart.map_err(|e| ProxyError::Multipart(e.body_text()))?;
    let image = read_image(multipart).await?;

    info!(
        "📷 Image upload: {} ({} bytes, {}), model={}",
        image.file_name,
        image.bytes.len(),
        image.content_type,
        model.as_str()
    );

    let base = state.base_url(&headers);
    let url = build_url(&base, &state.submit_path, &[("model", model.as_str())])
        .map_err(|e| ProxyError::upstream(SUBMIT_CONTEXT, e))?;

    let part = reqwest::multipart::Part::bytes(image.bytes)
        .file_name(image.file_name)
        .mime_str(&image.content_type)
        .map_err(|e| ProxyError::Multipart(e.to_string()))?;
    let form = reqwest::multipart::Form::new().part("image", part);

    let response = state
        .client
        .post(url)
        .header(header::ACCEPT, "application/json")
        .multipart(form)
        .timeout(state.request_timeout)
        .send()
        .await
        .map_err(|e| ProxyError::upstream(SUBMIT_CONTEXT, e))?;

    let (status, body) = read_body(response)
        .await
        .map_err(|e| ProxyError::upstream(SUBMIT_CONTEXT, e))?;

    Ok(match body {
        UpstreamBody::Json(value) => {
            if status.is_success() {
                info!(
                    "✅ Prediction: {} ({})",
                    value.get("predicted_species").and_then(|v| v.as_str()).unwrap_or("?"),
                    value.get("confidence").map(|v| v.to_string()).unwrap_or_default()
                );
            } else {
                warn!("⚠️  Backend rejected submission: {}", status);
            }
            (status, Json(value)).into_response()
        }
        UpstreamBody::Text(text) => {
            let status = if status.is_success() { StatusCode::BAD_GATEWAY } else { status };
            warn!("⚠️  Backend returned non-JSON submission response, replying {}", status);
            (status, Json(json!({ "error": NON_JSON_NOTE, "details": text }))).into_response()
        }
    })
}
