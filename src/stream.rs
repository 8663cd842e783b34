use std::fmt::Display;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Response, StatusCode},
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::ProxyError;
use crate::proxy::{PromptQuery, ProxyState, QueryPairs};
use crate::upstream::build_url;

const STREAM_CONTEXT: &str = "Failed to proxy chatbot stream";
const RELAY_CHANNEL_CAPACITY: usize = 100;

pub type RelayItem = Result<Bytes, std::io::Error>;

/// How a relay ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Completed { chunks: usize, bytes: usize },
    ClientDisconnected { chunks: usize, bytes: usize },
    UpstreamError(String),
}

/// `GET /chatbotsse?prompt=` -> `GET {base}/ollama/stream?prompt=`, relayed byte-for-byte.
pub async fn chatbot_sse(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    query: QueryPairs,
) -> Result<Response<Body>, ProxyError> {
    let prompt = PromptQuery::from_query(query)?.require()?;
    let base = state.base_url(&headers);
    let url = build_url(&base, "/ollama/stream", &[("prompt", &prompt)])
        .map_err(|e| ProxyError::upstream(STREAM_CONTEXT, e))?;

    info!("🌊 Opening upstream stream at {}/ollama/stream", base);

    // No per-request timeout here; a stream lives as long as the model talks.
    let upstream = state
        .client
        .get(url)
        .header(header::ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(|e| ProxyError::upstream(STREAM_CONTEXT, e))?;

    let status = upstream.status();
    info!("📬 Upstream stream status: {}", status);

    if !has_readable_body(&upstream) {
        return Err(ProxyError::NoUpstreamStream);
    }

    let (tx, rx) = mpsc::channel::<RelayItem>(RELAY_CHANNEL_CAPACITY);
    let relay_id = Uuid::new_v4();
    let span = info_span!("relay", id = %relay_id);

    tokio::spawn(
        async move {
            match relay(upstream.bytes_stream(), tx).await {
                RelayOutcome::UpstreamError(e) => error!("❌ Relay aborted by upstream: {}", e),
                outcome => debug!("Relay finished: {:?}", outcome),
            }
        }
        .instrument(span),
    );

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/event-stream; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache, no-transform")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .map_err(|e| ProxyError::upstream(STREAM_CONTEXT, e))
}

/// 204/304 and `Content-Length: 0` responses carry nothing to relay.
fn has_readable_body(response: &reqwest::Response) -> bool {
    let status = response.status();
    if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
        return false;
    }
    response.content_length() != Some(0)
}

/// Copies chunks from `upstream` into `tx` verbatim and in order.
///
/// Returns as soon as the upstream ends, fails, or the receiving side is
/// dropped. The receiver is watched even while the upstream is idle, so a
/// client that goes away releases the upstream connection right away
/// instead of on the next chunk. `upstream` is dropped on return.
pub async fn relay<S, E>(upstream: S, tx: mpsc::Sender<RelayItem>) -> RelayOutcome
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let start_time = Instant::now();
    let mut upstream = std::pin::pin!(upstream);
    let mut chunks = 0;
    let mut bytes = 0;

    loop {
        let next = tokio::select! {
            _ = tx.closed() => {
                warn!("⚠️  Client disconnected after {} chunks, closing upstream", chunks);
                return RelayOutcome::ClientDisconnected { chunks, bytes };
            }
            next = upstream.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                chunks += 1;
                bytes += chunk.len();
                debug!("📦 Chunk #{}: {} bytes at {:?}", chunks, chunk.len(), start_time.elapsed());

                if tx.send(Ok(chunk)).await.is_err() {
                    warn!("⚠️  Client disconnected after {} chunks, closing upstream", chunks);
                    return RelayOutcome::ClientDisconnected { chunks, bytes };
                }
            }
            Some(Err(e)) => {
                let message = e.to_string();
                // Surfaces as a body error, which aborts the client connection.
                let _ = tx.send(Err(std::io::Error::other(message.clone()))).await;
                return RelayOutcome::UpstreamError(message);
            }
            None => {
                info!(
                    "✅ Stream completed: {} chunks, {} bytes in {:?}",
                    chunks,
                    bytes,
                    start_time.elapsed()
                );
                return RelayOutcome::Completed { chunks, bytes };
            }
        }
    }
}
