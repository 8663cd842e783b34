//! Same-origin proxy for the Bird Watcher app.
//!
//! Forwards image submissions, species lookups and chatbot prompts to the
//! classification backend, and relays the backend's SSE chat stream to the
//! browser byte-for-byte.

pub mod config;
pub mod error;
pub mod locator;
pub mod proxy;
pub mod routes;
pub mod stream;
pub mod upstream;

pub use config::Config;
pub use error::ProxyError;
pub use locator::BackendLocator;
pub use proxy::ProxyState;
pub use routes::router;
