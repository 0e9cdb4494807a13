//! Infrastructure - configuration, time and metrics
//!
//! - `config` - Application configuration (TOML loading, defaults)
//! - `clock` - Injectable time source
//! - `metrics` - Lock-free cache metrics

pub mod clock;
pub mod config;
pub mod metrics;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, UpstreamSource};
pub use metrics::{CacheMetrics, CacheMetricsSummary};
