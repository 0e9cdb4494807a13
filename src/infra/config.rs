//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! Every section is optional; missing keys take the defaults below.

use anyhow::{anyhow, Context};
use chrono::Duration;
use chrono_tz::Tz;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamSource {
    /// Social-feed posts (Graph API)
    Feed,
    /// Events web page
    Page,
}

impl UpstreamSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamSource::Feed => "feed",
            UpstreamSource::Page => "page",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: default_bind_address(), port: default_port() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_source")]
    pub source: UpstreamSource,
    /// Graph API base URL, `posts` is appended
    #[serde(default = "default_graph_url")]
    pub graph_url: String,
    #[serde(default = "default_page_id")]
    pub page_id: String,
    #[serde(default = "default_post_limit")]
    pub post_limit: u32,
    #[serde(default = "default_page_url")]
    pub page_url: String,
    /// Only headings after this text are read from the page (empty = whole page)
    #[serde(default = "default_content_marker")]
    pub content_marker: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// JSON file with `app_id` / `app_secret`
    #[serde(default = "default_auth_file")]
    pub auth_file: String,
    #[serde(default)]
    pub access_token: Option<String>,
}

fn default_source() -> UpstreamSource {
    UpstreamSource::Feed
}

fn default_graph_url() -> String {
    "https://graph.facebook.com/v2.0/".to_string()
}

fn default_page_id() -> String {
    "parkdatcurtin".to_string()
}

fn default_post_limit() -> u32 {
    50
}

fn default_page_url() -> String {
    "http://news.curtin.edu.au/events/parkd-curtin/".to_string()
}

fn default_content_marker() -> String {
    "editable-content".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_auth_file() -> String {
    "auth.json".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            graph_url: default_graph_url(),
            page_id: default_page_id(),
            post_limit: default_post_limit(),
            page_url: default_page_url(),
            content_marker: default_content_marker(),
            timeout_ms: default_timeout_ms(),
            auth_file: default_auth_file(),
            access_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
    /// Stale tier expiry, 0 disables expiry
    #[serde(default)]
    pub permanent_ttl_secs: u64,
    /// Capacity of the in-memory store (two entries per date)
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

fn default_max_age_secs() -> u64 {
    3600
}

fn default_max_entries() -> u64 {
    10_000
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age_secs(),
            permanent_ttl_secs: 0,
            max_entries: default_max_entries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSection {
    /// IANA name of the canonical timezone
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_stall_marker")]
    pub stall_marker: char,
}

fn default_timezone() -> String {
    "Australia/Perth".to_string()
}

fn default_stall_marker() -> char {
    '*'
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self { timezone: default_timezone(), stall_marker: default_stall_marker() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    60
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub schedule: ScheduleSection,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    bind_address: String,
    port: u16,
    upstream_source: UpstreamSource,
    graph_url: String,
    page_id: String,
    post_limit: u32,
    page_url: String,
    content_marker: Option<String>,
    upstream_timeout_ms: u64,
    auth_file: String,
    access_token: Option<String>,
    cache_max_age_secs: u64,
    cache_permanent_ttl_secs: u64,
    cache_max_entries: u64,
    timezone: Tz,
    stall_marker: char,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::build(TomlConfig::default(), chrono_tz::Australia::Perth, "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> anyhow::Result<Self> {
        let tz_name = toml_config.schedule.timezone.clone();
        let timezone: Tz =
            tz_name.parse().map_err(|e| anyhow!("Invalid timezone {tz_name:?}: {e}"))?;
        Ok(Self::build(toml_config, timezone, config_file))
    }

    fn build(toml_config: TomlConfig, timezone: Tz, config_file: String) -> Self {
        let content_marker = Some(toml_config.upstream.content_marker).filter(|m| !m.is_empty());

        Self {
            bind_address: toml_config.server.bind_address,
            port: toml_config.server.port,
            upstream_source: toml_config.upstream.source,
            graph_url: toml_config.upstream.graph_url,
            page_id: toml_config.upstream.page_id,
            post_limit: toml_config.upstream.post_limit,
            page_url: toml_config.upstream.page_url,
            content_marker,
            upstream_timeout_ms: toml_config.upstream.timeout_ms,
            auth_file: toml_config.upstream.auth_file,
            access_token: toml_config.upstream.access_token,
            cache_max_age_secs: toml_config.cache.max_age_secs,
            cache_permanent_ttl_secs: toml_config.cache.permanent_ttl_secs,
            cache_max_entries: toml_config.cache.max_entries,
            timezone,
            stall_marker: toml_config.schedule.stall_marker,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            config_file,
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Self::from_toml(toml_config, path.display().to_string())
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Load configuration - tries the TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn upstream_source(&self) -> UpstreamSource {
        self.upstream_source
    }

    pub fn graph_url(&self) -> &str {
        &self.graph_url
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    pub fn post_limit(&self) -> u32 {
        self.post_limit
    }

    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    pub fn content_marker(&self) -> Option<&str> {
        self.content_marker.as_deref()
    }

    pub fn upstream_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn auth_file(&self) -> &str {
        &self.auth_file
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::seconds(self.cache_max_age_secs as i64)
    }

    /// `None` when the stale tier never expires
    pub fn cache_permanent_ttl(&self) -> Option<Duration> {
        (self.cache_permanent_ttl_secs > 0)
            .then(|| Duration::seconds(self.cache_permanent_ttl_secs as i64))
    }

    pub fn cache_max_entries(&self) -> u64 {
        self.cache_max_entries
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn stall_marker(&self) -> char {
        self.stall_marker
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to point at a specific auth file
    #[cfg(test)]
    pub fn with_auth_file(mut self, path: &str) -> Self {
        self.auth_file = path.to_string();
        self
    }
}
