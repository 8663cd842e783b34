use std::time::Duration;

use clap::Parser;

use crate::locator::BackendLocator;

pub const DEFAULT_LOCAL_API_BASE: &str = "http://127.0.0.1:9000";
pub const DEFAULT_REMOTE_API_BASE: &str = "http://some.server.com:9000";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "bird-watcher-proxy",
    about = "Same-origin proxy for the Bird Watcher species classifier and chatbot",
    version
)]
pub struct Config {
    /// Backend used when the browser reached us through localhost.
    #[arg(long, env = "LOCAL_API_BASE", default_value = DEFAULT_LOCAL_API_BASE)]
    pub local_api_base: String,

    /// Backend used for every other host.
    #[arg(long, env = "REMOTE_API_BASE", default_value = DEFAULT_REMOTE_API_BASE)]
    pub remote_api_base: String,

    /// Force https for the remote backend (local is always plain http).
    #[arg(long, env = "PREFER_HTTPS")]
    pub prefer_https: bool,

    /// Host address to listen on.
    #[arg(long, env = "PROXY_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "PROXY_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Total timeout for unary upstream calls. Streams are not bounded by it.
    #[arg(long, env = "REQUEST_TIMEOUT_SECONDS", default_value_t = 120)]
    pub request_timeout_seconds: u64,

    /// Timeout for establishing a backend connection, streams included.
    #[arg(long, env = "CONNECT_TIMEOUT_SECONDS", default_value_t = 10)]
    pub connect_timeout_seconds: u64,

    /// Largest accepted image upload, in megabytes.
    #[arg(long, env = "MAX_UPLOAD_MB", default_value_t = 20)]
    pub max_upload_mb: usize,

    /// Backend path that receives image submissions.
    #[arg(long, env = "BIRD_SUBMIT_PATH", default_value = "/birdsubmit")]
    pub submit_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            local_api_base: DEFAULT_LOCAL_API_BASE.to_string(),
            remote_api_base: DEFAULT_REMOTE_API_BASE.to_string(),
            prefer_https: false,
            host: "127.0.0.1".to_string(),
            port: 3000,
            request_timeout_seconds: 120,
            connect_timeout_seconds: 10,
            max_upload_mb: 20,
            submit_path: "/birdsubmit".to_string(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, url) in [
            ("LOCAL_API_BASE", &self.local_api_base),
            ("REMOTE_API_BASE", &self.remote_api_base),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("{name} must be an http:// or https:// URL, got {url:?}");
            }
        }
        if self.request_timeout_seconds == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECONDS must be at least 1");
        }
        if self.connect_timeout_seconds == 0 {
            anyhow::bail!("CONNECT_TIMEOUT_SECONDS must be at least 1");
        }
        if self.max_upload_mb == 0 {
            anyhow::bail!("MAX_UPLOAD_MB must be at least 1");
        }
        if !self.submit_path.starts_with('/') {
            anyhow::bail!("BIRD_SUBMIT_PATH must start with '/', got {:?}", self.submit_path);
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn locator(&self) -> BackendLocator {
        BackendLocator::new(&self.local_api_base, &self.remote_api_base)
            .with_prefer_https(self.prefer_https)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}
