//! End-to-end tests: mock upstream -> fetcher -> cache -> HTTP server

use bytes::Bytes;
use chrono::{Duration, TimeZone, Utc};
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::net::TcpListener;
use tokio::sync::watch;
use visit_schedule::infra::{CacheMetrics, Config, ManualClock};
use visit_schedule::io::http::{serve, AppState};
use visit_schedule::io::upstream::build_fetcher;
use visit_schedule::services::{CacheConfig, MemoryStore, ScheduleCache, ScheduleRefresher};

const EVENTS_PAGE: &str = r#"<html><body><div class="editable-content">
<h2>Monday 4th March</h2><ul><li>Foo Ct - Alice, Bob</li></ul>
<h2>Tuesday 5th March</h2><ul><li>Bar Lane - Carol</li></ul>
</div></body></html>"#;

const POSTS: &str = r#"{"data":[{"updated_time":"2024-03-03T09:00:00+0000","message":"This week:\nMonday 4th March\n* Foo Ct - Alice"}]}"#;

/// Mock upstream: serves `body` until `down` is set, then 503
struct Upstream {
    addr: SocketAddr,
    down: Arc<AtomicBool>,
    hits: Arc<AtomicUsize>,
    /// Query string of the most recent request
    last_query: Arc<parking_lot::Mutex<Option<String>>>,
}

async fn start_upstream(body: &'static str) -> Upstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let down = Arc::new(AtomicBool::new(false));
    let hits = Arc::new(AtomicUsize::new(0));
    let last_query = Arc::new(parking_lot::Mutex::new(None));

    let (srv_down, srv_hits, srv_query) = (down.clone(), hits.clone(), last_query.clone());
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else { return };
            let (down, hits, query) = (srv_down.clone(), srv_hits.clone(), srv_query.clone());
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    hits.fetch_add(1, Ordering::SeqCst);
                    *query.lock() = req.uri().query().map(str::to_string);
                    let status =
                        if down.load(Ordering::SeqCst) { StatusCode::SERVICE_UNAVAILABLE } else { StatusCode::OK };
                    async move {
                        Ok::<_, Infallible>(
                            Response::builder().status(status).body(Full::new(Bytes::from(body))).unwrap(),
                        )
                    }
                });
                let _ = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await;
            });
        }
    });

    Upstream { addr, down, hits, last_query }
}

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

struct App {
    base: String,
    clock: Arc<ManualClock>,
    shutdown: watch::Sender<bool>,
}

async fn start_app(config: &Config) -> App {
    // Monday 2024-03-04 10:00 Perth
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 4, 2, 0, 0).unwrap()));
    let metrics = Arc::new(CacheMetrics::new());
    let refresher = ScheduleRefresher::new(build_fetcher(config).unwrap(), clock.clone(), config);
    let cache = ScheduleCache::new(
        Arc::new(MemoryStore::default()),
        Arc::new(refresher),
        clock.clone(),
        CacheConfig::from(config),
        metrics.clone(),
    );
    let state = Arc::new(AppState {
        cache: Arc::new(cache),
        clock: clock.clone(),
        timezone: config.timezone(),
        metrics,
        source: config.upstream_source().as_str().to_string(),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (shutdown, shutdown_rx) = watch::channel(false);
    tokio::spawn(serve(listener, state, shutdown_rx));

    App { base, clock, shutdown }
}

async fn get_json(url: &str) -> (u16, serde_json::Value) {
    let response = reqwest::get(url).await.unwrap();
    let status = response.status().as_u16();
    let body = response.text().await.unwrap();
    (status, serde_json::from_str(&body).unwrap())
}

#[tokio::test]
async fn test_page_source_end_to_end_with_stale_fallback() {
    let upstream = start_upstream(EVENTS_PAGE).await;
    let file = config_file(&format!(
        "[upstream]\nsource = \"page\"\npage_url = \"http://{}/events/\"\n",
        upstream.addr
    ));
    let app = start_app(&Config::from_file(file.path()).unwrap()).await;

    let (status, json) = get_json(&format!("{}/api/visits?date=2024-03-04", app.base)).await;
    assert_eq!(status, 200);
    assert_eq!(json["status"], 0);
    assert_eq!(json["visits"]["Foo Ct"], serde_json::json!(["Alice", "Bob"]));
    assert_eq!(json["pagination"]["next"], "/api/visits?date=2024-03-05");

    // the same refresh populated Tuesday
    let (_, json) = get_json(&format!("{}/api/visits?date=2024-03-05", app.base)).await;
    assert_eq!(json["visits"]["Bar Lane"], serde_json::json!(["Carol"]));
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);

    // upstream goes down and the fresh tier expires
    upstream.down.store(true, Ordering::SeqCst);
    app.clock.advance(Duration::hours(2));

    let (status, json) = get_json(&format!("{}/api/visits?date=2024-03-04", app.base)).await;
    assert_eq!(status, 200);
    assert_eq!(json["visits"]["Foo Ct"], serde_json::json!(["Alice", "Bob"]));
    assert_eq!(json["updated"], "2024-03-04T02:00:00Z");
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 2);

    // never-seen date: empty but well-formed
    let (status, json) = get_json(&format!("{}/api/visits?date=2024-04-01", app.base)).await;
    assert_eq!(status, 200);
    assert_eq!(json["visits"], serde_json::json!({}));

    let _ = app.shutdown.send(true);
}

#[tokio::test]
async fn test_feed_source_sends_graph_query() {
    let upstream = start_upstream(POSTS).await;
    let file = config_file(&format!(
        "[upstream]\nsource = \"feed\"\ngraph_url = \"http://{}/v2.0/\"\naccess_token = \"id|secret\"\npost_limit = 10\n",
        upstream.addr
    ));
    let app = start_app(&Config::from_file(file.path()).unwrap()).await;

    let (status, json) = get_json(&format!("{}/api/visits?date=2024-03-04", app.base)).await;
    assert_eq!(status, 200);
    assert_eq!(json["visits"]["Foo Ct"], serde_json::json!(["Alice"]));

    let query = upstream.last_query.lock().clone().unwrap();
    let pairs: Vec<(String, String)> =
        url::form_urlencoded::parse(query.as_bytes()).into_owned().collect();
    assert!(pairs.contains(&("id".to_string(), "parkdatcurtin".to_string())));
    assert!(pairs.contains(&("access_token".to_string(), "id|secret".to_string())));
    assert!(pairs.contains(&("fields".to_string(), "updated_time,message".to_string())));
    assert!(pairs.contains(&("limit".to_string(), "10".to_string())));

    let _ = app.shutdown.send(true);
}

#[tokio::test]
async fn test_http_routes() {
    let upstream = start_upstream(EVENTS_PAGE).await;
    let file = config_file(&format!(
        "[upstream]\nsource = \"page\"\npage_url = \"http://{}/\"\n",
        upstream.addr
    ));
    let app = start_app(&Config::from_file(file.path()).unwrap()).await;

    let (status, json) = get_json(&format!("{}/api/visits?date=next-tuesday", app.base)).await;
    assert_eq!(status, 400);
    assert_eq!(json["status"], 1);
    assert!(json["error"].as_str().unwrap().contains("next-tuesday"));

    let (status, json) = get_json(&format!("{}/api/visits", app.base)).await;
    assert_eq!(status, 400);
    assert_eq!(json["error"], "missing date parameter");

    let client = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none()).build().unwrap();
    let response = client.get(format!("{}/", app.base)).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 302);
    assert_eq!(response.headers()["location"], "/?date=2024-03-04");

    let page = client.get(format!("{}/?date=2024-03-04", app.base)).send().await.unwrap();
    assert_eq!(page.status().as_u16(), 200);
    assert!(page.text().await.unwrap().contains("<li>Alice</li>"));

    let health = client.get(format!("{}/health", app.base)).send().await.unwrap();
    assert_eq!(health.text().await.unwrap(), "ok");

    let metrics = client.get(format!("{}/metrics", app.base)).send().await.unwrap();
    assert!(metrics.text().await.unwrap().contains("schedule_cache_lookups_total{source=\"page\"}"));

    let _ = app.shutdown.send(true);
}
