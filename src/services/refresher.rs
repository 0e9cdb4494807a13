//! Refresh seam between the cache and upstream (fetch + parse)

use crate::domain::dates::today_in;
use crate::domain::types::ScheduleSnapshot;
use crate::infra::clock::Clock;
use crate::infra::config::Config;
use crate::io::upstream::Fetcher;
use crate::services::parser::ScheduleParser;
use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Produces a fresh snapshot of the whole published schedule.
///
/// `date` is the date that triggered the refresh; implementations may
/// return any number of other dates alongside it.
#[async_trait]
pub trait Refresher: Send + Sync {
    async fn refresh(&self, date: NaiveDate) -> anyhow::Result<ScheduleSnapshot>;
}

/// Fetches documents once and parses all of them
pub struct ScheduleRefresher {
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
    stall_marker: char,
    content_marker: Option<String>,
}

impl ScheduleRefresher {
    pub fn new(fetcher: Arc<dyn Fetcher>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        Self {
            fetcher,
            clock,
            timezone: config.timezone(),
            stall_marker: config.stall_marker(),
            content_marker: config.content_marker().map(str::to_string),
        }
    }
}

#[async_trait]
impl Refresher for ScheduleRefresher {
    async fn refresh(&self, date: NaiveDate) -> anyhow::Result<ScheduleSnapshot> {
        let start = Instant::now();
        let fetched_at = self.clock.now();
        let documents =
            self.fetcher.fetch_documents().await.context("Failed to fetch schedule documents")?;

        let parser = ScheduleParser::new(today_in(self.timezone, fetched_at))
            .with_stall_marker(self.stall_marker)
            .with_content_marker(self.content_marker.clone());
        let weeks = parser.parse_all(&documents);

        info!(
            requested = %date,
            documents = %documents.len(),
            days = %weeks.iter().map(|w| w.len()).sum::<usize>(),
            latency_ms = %start.elapsed().as_millis(),
            "schedule_refreshed"
        );
        Ok(ScheduleSnapshot::new(weeks, fetched_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Document, Visit};
    use crate::infra::clock::ManualClock;
    use crate::io::upstream::FetchError;
    use chrono::{TimeZone, Utc};

    struct StaticFetcher(Vec<Document>);

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch_documents(&self) -> Result<Vec<Document>, FetchError> {
            Ok(self.0.clone())
        }
    }

    struct DownFetcher;

    #[async_trait]
    impl Fetcher for DownFetcher {
        async fn fetch_documents(&self) -> Result<Vec<Document>, FetchError> {
            Err(FetchError::Status(503))
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 3, 2, 0, 0).unwrap()))
    }

    #[tokio::test]
    async fn test_refresh_parses_every_document() {
        let fetcher = StaticFetcher(vec![
            Document::Text("Monday 4th March\n* Quad - Alice".to_string()),
            Document::Text("Monday 26th February\n* Quad - Bob".to_string()),
        ]);
        let clock = clock();
        let refresher = ScheduleRefresher::new(Arc::new(fetcher), clock.clone(), &Config::default());

        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let snapshot = refresher.refresh(monday).await.unwrap();

        assert_eq!(snapshot.fetched_at, clock.now());
        assert_eq!(snapshot.weeks.len(), 2);
        let by_date = snapshot.by_date();
        assert_eq!(by_date[&monday].visits, vec![Visit::at("Quad", "Alice")]);
        assert!(by_date.contains_key(&NaiveDate::from_ymd_opt(2024, 2, 26).unwrap()));
    }

    #[tokio::test]
    async fn test_refresh_propagates_fetch_failure() {
        let refresher = ScheduleRefresher::new(Arc::new(DownFetcher), clock(), &Config::default());
        let err = refresher.refresh(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()).await.unwrap_err();
        assert!(format!("{err:#}").contains("HTTP 503"));
    }
}
