//! HTTP front end
//!
//! Routes:
//! - `GET /?date=YYYY-MM-DD` - HTML page; missing/invalid date redirects to today
//! - `GET /api/visits?date=YYYY-MM-DD` - JSON document, 400 on a bad date
//! - `GET /health` - liveness
//! - `GET /metrics` - Prometheus text exposition of cache metrics
//!
//! Uses hyper for the HTTP server.

use crate::domain::dates::{parse_date_param, today_in};
use crate::infra::clock::Clock;
use crate::infra::metrics::CacheMetrics;
use crate::io::prometheus::format_prometheus_metrics;
use crate::io::render::{page_link, render_error_json, render_json, render_page};
use crate::services::cache::ScheduleCache;
use bytes::Bytes;
use chrono_tz::Tz;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Everything a request handler needs
pub struct AppState {
    pub cache: Arc<ScheduleCache>,
    pub clock: Arc<dyn Clock>,
    pub timezone: Tz,
    pub metrics: Arc<CacheMetrics>,
    /// `source` label on exported metrics
    pub source: String,
}

/// First value of `name` in a raw query string, percent-decoded
pub fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn text_response(status: StatusCode, content_type: &str, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", content_type)
        .body(Full::new(Bytes::from(body)))
        .expect("static response should not fail")
}

fn json_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .expect("static response should not fail")
}

fn redirect(location: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::FOUND)
        .header("Location", location)
        .body(Full::new(Bytes::new()))
        .expect("static response should not fail")
}

async fn page(query: Option<&str>, state: &AppState) -> Response<Full<Bytes>> {
    let raw = query_param(query, "date");
    let date = match parse_date_param(raw.as_deref(), state.timezone) {
        Ok(date) => date,
        Err(e) => {
            let today = today_in(state.timezone, state.clock.now());
            debug!(error = %e, today = %today, "page_date_redirect");
            return redirect(&page_link(today));
        }
    };
    let result = state.cache.get(date).await;
    text_response(StatusCode::OK, "text/html; charset=utf-8", render_page(date, &result))
}

async fn api_visits(query: Option<&str>, state: &AppState) -> Response<Full<Bytes>> {
    let raw = query_param(query, "date");
    match parse_date_param(raw.as_deref(), state.timezone) {
        Ok(date) => {
            let result = state.cache.get(date).await;
            json_response(StatusCode::OK, render_json(date, &result))
        }
        Err(e) => {
            debug!(error = %e, "api_date_rejected");
            json_response(StatusCode::BAD_REQUEST, render_error_json(&e.to_string()))
        }
    }
}

/// Route one request. Separated from hyper types so it can be driven directly.
pub async fn respond(
    method: &Method,
    path: &str,
    query: Option<&str>,
    state: &AppState,
) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::GET, "/") => page(query, state).await,
        (&Method::GET, "/api/visits") => api_visits(query, state).await,
        (&Method::GET, "/health") => text_response(StatusCode::OK, "text/plain", "ok".to_string()),
        (&Method::GET, "/metrics") => text_response(
            StatusCode::OK,
            "text/plain; version=0.0.4; charset=utf-8",
            format_prometheus_metrics(&state.metrics.report(), &state.source),
        ),
        _ => text_response(StatusCode::NOT_FOUND, "text/plain", "Not Found".to_string()),
    }
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(respond(req.method(), req.uri().path(), req.uri().query(), &state).await)
}

/// Accept connections on `listener` until `shutdown` flips to true
pub async fn serve(listener: TcpListener, state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let state = state.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let state = state.clone();
                                async move { handle_request(req, state).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "http_connection_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "http_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("http_server_shutdown");
                    return;
                }
            }
        }
    }
}

/// Bind `addr` and serve until shutdown
pub async fn start_server(
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "http_server_started");
    serve(listener, state, shutdown).await;
    Ok(())
}
