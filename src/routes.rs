use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::proxy::{self, ProxyState};
use crate::stream;

/// Proxy endpoints, relative to wherever they are mounted.
fn api_routes() -> Router<ProxyState> {
    Router::new()
        .route("/chatbot", get(proxy::chatbot))
        .route("/chatbotsse", get(stream::chatbot_sse))
        .route("/species", get(proxy::species))
        .route("/birdsubmit", post(proxy::bird_submit))
}

/// The full HTTP surface. The API is served both at the root and under
/// `/api`, which is where the browser client calls it.
pub fn router(state: ProxyState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(api_routes())
        .nest("/api", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(state)
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "ok": true,
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}
