//! IO modules - external system interfaces
//!
//! - `upstream` - Fetchers for the social-feed posts and the events page
//! - `markup` - Lightweight HTML scanner for the events page
//! - `http` - HTTP server (page, JSON API, health, metrics)
//! - `render` - JSON and HTML rendering of cached results
//! - `prometheus` - Prometheus text exposition

pub mod http;
pub mod markup;
pub mod prometheus;
pub mod render;
pub mod upstream;

// Re-export commonly used types
pub use http::{start_server, AppState};
pub use upstream::{build_fetcher, FetchError, Fetcher};
