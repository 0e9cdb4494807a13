//! Integration tests for configuration loading

use chrono::Duration;
use std::io::Write;
use tempfile::NamedTempFile;
use visit_schedule::infra::{Config, UpstreamSource};

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[server]
bind_address = "127.0.0.1"
port = 8080

[upstream]
source = "page"
page_url = "http://example.test/events/"
content_marker = "main-content"
timeout_ms = 2500
access_token = "abc|def"

[cache]
max_age_secs = 600
permanent_ttl_secs = 86400
max_entries = 500

[schedule]
timezone = "Europe/London"
stall_marker = "-"

[metrics]
interval_secs = 15
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.bind_address(), "127.0.0.1");
    assert_eq!(config.port(), 8080);
    assert_eq!(config.upstream_source(), UpstreamSource::Page);
    assert_eq!(config.page_url(), "http://example.test/events/");
    assert_eq!(config.content_marker(), Some("main-content"));
    assert_eq!(config.upstream_timeout(), std::time::Duration::from_millis(2500));
    assert_eq!(config.access_token(), Some("abc|def"));
    assert_eq!(config.cache_max_age(), Duration::minutes(10));
    assert_eq!(config.cache_permanent_ttl(), Some(Duration::days(1)));
    assert_eq!(config.cache_max_entries(), 500);
    assert_eq!(config.timezone(), chrono_tz::Europe::London);
    assert_eq!(config.stall_marker(), '-');
    assert_eq!(config.metrics_interval_secs(), 15);
    assert_eq!(config.config_file(), temp_file.path().display().to_string());
}

#[test]
fn test_shipped_dev_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/dev.toml");
    let config = Config::from_file(path).unwrap();
    assert_eq!(config.upstream_source(), UpstreamSource::Feed);
    assert_eq!(config.timezone(), chrono_tz::Australia::Perth);
}

#[test]
fn test_invalid_toml_is_an_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[cache\nmax_age_secs = ").unwrap();
    temp_file.flush().unwrap();

    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.port(), 5000);
    assert_eq!(config.upstream_source(), UpstreamSource::Feed);
    assert_eq!(config.cache_max_age(), Duration::hours(1));
    assert_eq!(config.config_file(), "default");
}
