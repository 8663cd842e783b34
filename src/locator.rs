use axum::http::HeaderMap;

/// Picks the backend base URL for a request from the host it arrived on.
///
/// Browsers hitting the app through `localhost` / `127.0.0.1` talk to the
/// local backend; everything else goes to the remote one. Base URLs are
/// stored without trailing slashes so callers can append paths directly.
#[derive(Debug, Clone)]
pub struct BackendLocator {
    local_base: String,
    remote_base: String,
    prefer_https: bool,
}

impl BackendLocator {
    pub fn new(local_base: &str, remote_base: &str) -> Self {
        Self {
            local_base: strip_trailing_slash(local_base),
            remote_base: strip_trailing_slash(remote_base),
            prefer_https: false,
        }
    }

    pub fn with_prefer_https(mut self, prefer_https: bool) -> Self {
        self.prefer_https = prefer_https;
        self
    }

    pub fn local_base(&self) -> &str {
        &self.local_base
    }

    pub fn remote_base(&self) -> &str {
        &self.remote_base
    }

    pub fn locate(&self, host: &str) -> String {
        if is_local_host(host) {
            self.local_base.clone()
        } else {
            self.remote_base.clone()
        }
    }

    /// Like [`locate`](Self::locate), but rewrites the remote URL's scheme.
    /// Local backends are always addressed as configured (plain http).
    pub fn locate_with_scheme(&self, host: &str, prefer_https: bool) -> String {
        if is_local_host(host) {
            return self.local_base.clone();
        }
        let scheme = if prefer_https { "https" } else { "http" };
        let rest = self
            .remote_base
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.remote_base);
        format!("{scheme}://{rest}")
    }

    /// Base URL for a request, honouring the configured https preference.
    pub fn base_url(&self, host: &str) -> String {
        if self.prefer_https {
            self.locate_with_scheme(host, true)
        } else {
            self.locate(host)
        }
    }
}

/// `X-Forwarded-Host` wins over `Host`; missing headers yield `""`.
pub fn request_host(headers: &HeaderMap) -> &str {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
    };
    header("x-forwarded-host")
        .or_else(|| header("host"))
        .unwrap_or("")
}

/// `localhost` or `127.0.0.1`, case-insensitive, with an optional numeric port.
pub fn is_local_host(host: &str) -> bool {
    let (name, port) = match host.split_once(':') {
        Some((name, port)) => (name, Some(port)),
        None => (host, None),
    };
    let local_name = name.eq_ignore_ascii_case("localhost") || name == "127.0.0.1";
    let valid_port = port.map_or(true, |p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
    local_name && valid_port
}

fn strip_trailing_slash(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
