//! Presentation of cached results: JSON documents and the HTML page

use crate::domain::types::{VisitResult, NO_LOCATION};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

/// `status` value of a successful response
pub const STATUS_OK: u8 = 0;
/// `status` value of a caller error
pub const STATUS_ERROR: u8 = 1;

/// Heading used on the page for announcements without a stall
const OTHER_HEADING: &str = "Other";

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub next: String,
    pub prev: String,
}

#[derive(Debug, Serialize)]
pub struct VisitsResponse {
    pub date: NaiveDate,
    pub updated: DateTime<Utc>,
    pub visits: BTreeMap<String, Vec<String>>,
    pub pagination: Pagination,
    pub status: u8,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: u8,
    pub error: String,
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}

fn prev_day(date: NaiveDate) -> NaiveDate {
    date.pred_opt().unwrap_or(date)
}

pub fn page_link(date: NaiveDate) -> String {
    format!("/?date={date}")
}

pub fn api_link(date: NaiveDate) -> String {
    format!("/api/visits?date={date}")
}

pub fn visits_response(date: NaiveDate, result: &VisitResult) -> VisitsResponse {
    VisitsResponse {
        date,
        updated: result.updated,
        visits: result.grouped(),
        pagination: Pagination { next: api_link(next_day(date)), prev: api_link(prev_day(date)) },
        status: STATUS_OK,
    }
}

pub fn render_json(date: NaiveDate, result: &VisitResult) -> String {
    serde_json::to_string(&visits_response(date, result))
        .unwrap_or_else(|e| render_error_json(&format!("serialization failed: {e}")))
}

pub fn render_error_json(error: &str) -> String {
    let body = ErrorResponse { status: STATUS_ERROR, error: error.to_string() };
    serde_json::to_string(&body).unwrap_or_else(|_| r#"{"status":1}"#.to_string())
}

/// Escape text for HTML element content and attribute values
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Full HTML page for one date
pub fn render_page(date: NaiveDate, result: &VisitResult) -> String {
    let mut html = String::with_capacity(2048);
    let title = date.format("%A %-d %B %Y").to_string();

    let _ = writeln!(html, "<!DOCTYPE html>");
    let _ = writeln!(html, "<html lang=\"en\"><head><meta charset=\"utf-8\">");
    let _ = writeln!(html, "<title>Visits for {}</title></head><body>", escape_html(&title));
    let _ = writeln!(html, "<h1>{}</h1>", escape_html(&title));
    let _ = writeln!(
        html,
        "<nav><a rel=\"prev\" href=\"{}\">&larr; previous day</a> | <a rel=\"next\" href=\"{}\">next day &rarr;</a></nav>",
        page_link(prev_day(date)),
        page_link(next_day(date))
    );

    let groups = result.grouped();
    if groups.is_empty() {
        let _ = writeln!(html, "<p class=\"empty\">No visits listed for this day.</p>");
    }

    let located = groups.iter().filter(|(location, _)| location.as_str() != NO_LOCATION);
    let other = groups.get(NO_LOCATION).map(|visitors| (OTHER_HEADING, visitors));
    for (location, visitors) in located.map(|(l, v)| (l.as_str(), v)).chain(other) {
        let _ = writeln!(html, "<section><h2>{}</h2><ul>", escape_html(location));
        for visitor in visitors {
            let _ = writeln!(html, "<li>{}</li>", escape_html(visitor));
        }
        let _ = writeln!(html, "</ul></section>");
    }

    let _ = writeln!(
        html,
        "<footer>Updated <time datetime=\"{}\">{}</time></footer>",
        result.updated.to_rfc3339(),
        result.updated.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(html, "</body></html>");
    html
}
