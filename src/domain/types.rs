//! Schedule data model shared by the parser, the cache and the server

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Location key used when grouping announcements that have no stall
pub const NO_LOCATION: &str = "";

/// One fetched upstream document, before parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Document {
    /// Plain text body of a social-feed post
    Text(String),
    /// HTML page
    Markup(String),
}

/// One vendor appearance, optionally tied to a stall location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub location: Option<String>,
    pub visitor: String,
}

impl Visit {
    pub fn at(location: impl Into<String>, visitor: impl Into<String>) -> Self {
        Self { location: Some(location.into()), visitor: visitor.into() }
    }

    /// Free-floating announcement, not listed under any stall
    pub fn bare(visitor: impl Into<String>) -> Self {
        Self { location: None, visitor: visitor.into() }
    }
}

/// All visits published for one calendar day (in the canonical zone)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub visits: Vec<Visit>,
}

/// Days recovered from one source document, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekRecord {
    pub days: Vec<DayRecord>,
}

impl WeekRecord {
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Everything one refresh produced, stamped with the fetch time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSnapshot {
    pub weeks: Vec<WeekRecord>,
    pub fetched_at: DateTime<Utc>,
}

impl ScheduleSnapshot {
    pub fn new(weeks: Vec<WeekRecord>, fetched_at: DateTime<Utc>) -> Self {
        Self { weeks, fetched_at }
    }

    /// Decompose into per-date results.
    ///
    /// Weeks are ordered most recent document first, so the first
    /// occurrence of a date wins over older posts listing the same day.
    pub fn by_date(&self) -> BTreeMap<NaiveDate, VisitResult> {
        let mut out = BTreeMap::new();
        for day in self.weeks.iter().flat_map(|week| week.days.iter()) {
            out.entry(day.date)
                .or_insert_with(|| VisitResult::new(day.visits.clone(), self.fetched_at));
        }
        out
    }
}

/// Cached value for one date.
///
/// `updated` is always the time the data was fetched upstream, never the
/// time it was re-served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitResult {
    pub visits: Vec<Visit>,
    pub updated: DateTime<Utc>,
}

impl VisitResult {
    pub fn new(visits: Vec<Visit>, updated: DateTime<Utc>) -> Self {
        Self { visits, updated }
    }

    /// "Checked at `now`, found nothing"
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self { visits: Vec::new(), updated: now }
    }

    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    /// Visitors grouped by location, locations sorted, visitor order kept.
    /// Bare announcements are grouped under [`NO_LOCATION`].
    pub fn grouped(&self) -> BTreeMap<String, Vec<String>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for visit in &self.visits {
            let key = visit.location.clone().unwrap_or_else(|| NO_LOCATION.to_string());
            groups.entry(key).or_default().push(visit.visitor.clone());
        }
        groups
    }
}
