use std::str::FromStr;

use axum::http::{header, HeaderMap, StatusCode};
use reqwest::Url;
use serde_json::Value;

pub type UrlParseError = <Url as FromStr>::Err;

/// A fully buffered backend response, classified once by content type.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamBody {
    Json(Value),
    Text(String),
}

pub fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false)
}

/// Reads the whole body. JSON content types must parse; anything else is kept as text.
pub async fn read_body(
    response: reqwest::Response,
) -> Result<(StatusCode, UpstreamBody), reqwest::Error> {
    let status = response.status();
    let body = if is_json_content_type(response.headers()) {
        UpstreamBody::Json(response.json::<Value>().await?)
    } else {
        UpstreamBody::Text(response.text().await?)
    };
    Ok((status, body))
}

/// `{base}{path}` with the given query pairs URL-encoded.
pub fn build_url(base: &str, path: &str, query: &[(&str, &str)]) -> Result<Url, UrlParseError> {
    let mut url = Url::parse(&format!("{base}{path}"))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}
