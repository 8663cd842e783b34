use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Missing prompt parameter")]
    MissingPrompt,

    #[error("Missing `image` field in multipart form")]
    MissingImage,

    #[error("Unknown model {0:?}, expected \"self\" or \"hf\"")]
    InvalidModel(String),

    #[error("Failed to read multipart form")]
    Multipart(String),

    #[error("Invalid query string")]
    InvalidQuery(String),

    #[error("Upload too large")]
    UploadTooLarge(String),

    /// Any failure talking to the backend. `context` names what was being proxied.
    #[error("{context}")]
    Upstream { context: &'static str, details: String },

    #[error("Upstream did not provide a stream")]
    NoUpstreamStream,
}

impl ProxyError {
    pub fn upstream(context: &'static str, cause: impl std::fmt::Display) -> Self {
        ProxyError::Upstream { context, details: cause.to_string() }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingPrompt
            | ProxyError::MissingImage
            | ProxyError::InvalidModel(_)
            | ProxyError::Multipart(_)
            | ProxyError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            ProxyError::UploadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::NoUpstreamStream => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn body(&self) -> Value {
        match self {
            ProxyError::Multipart(details)
            | ProxyError::InvalidQuery(details)
            | ProxyError::UploadTooLarge(details)
            | ProxyError::Upstream { details, .. } => {
                json!({ "error": self.to_string(), "details": details })
            }
            _ => json!({ "error": self.to_string() }),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();

        tracing::error!(error = %self, status = %status, body = %self.body(), "❌ Request failed");

        (status, Json(self.body())).into_response()
    }
}
