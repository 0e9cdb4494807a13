//! Schedule parsing: source documents to weeks of visits
//!
//! Both input shapes (feed post text and HTML pages) are first segmented
//! into [`DayBlock`]s by a [`DocumentSource`]; a single block stage then
//! validates headers, parses dates and splits stall listings. A malformed
//! block or line is skipped, never fatal.

use crate::domain::dates::{parse_human_date, split_day_header, starts_with_weekday};
use crate::domain::types::{DayRecord, Document, Visit, WeekRecord};
use crate::io::markup::heading_sections;
use chrono::NaiveDate;
use tracing::debug;

/// Default leading character of a stall listing line
pub const DEFAULT_STALL_MARKER: char = '*';

/// Separator between a stall location and its visitor list
const LOCATION_SEPARATOR: &str = " - ";

/// One line under a day header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub text: String,
    /// Listed as a stall entry (marker line, or a markup list item)
    pub stall: bool,
}

impl RawEntry {
    pub fn stall(text: impl Into<String>) -> Self {
        Self { text: text.into(), stall: true }
    }

    pub fn bare(text: impl Into<String>) -> Self {
        Self { text: text.into(), stall: false }
    }
}

/// A candidate day: header line plus its entries.
/// The header is not yet known to name a weekday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayBlock {
    pub header: String,
    pub entries: Vec<RawEntry>,
}

impl DayBlock {
    pub fn new(header: impl Into<String>) -> Self {
        Self { header: header.into(), entries: Vec::new() }
    }
}

/// Segments one input shape into day blocks
pub trait DocumentSource {
    fn day_blocks(&self) -> Vec<DayBlock>;
}

/// Feed post body.
///
/// A weekday line opens a block, a blank line closes it. Any other line
/// outside a block opens a noise block that the block stage drops.
pub struct TextSource<'a> {
    body: &'a str,
    stall_marker: char,
}

impl<'a> TextSource<'a> {
    pub fn new(body: &'a str, stall_marker: char) -> Self {
        Self { body, stall_marker }
    }
}

impl DocumentSource for TextSource<'_> {
    fn day_blocks(&self) -> Vec<DayBlock> {
        let mut blocks = Vec::new();
        let mut current: Option<DayBlock> = None;

        for line in self.body.lines() {
            let line = line.trim();
            if line.is_empty() {
                blocks.extend(current.take());
                continue;
            }

            if current.is_none() || starts_with_weekday(line) {
                blocks.extend(current.take());
                current = Some(DayBlock::new(line));
                continue;
            }

            if let Some(block) = current.as_mut() {
                let entry = match line.strip_prefix(self.stall_marker) {
                    Some(rest) => RawEntry::stall(rest),
                    None => RawEntry::bare(line),
                };
                block.entries.push(entry);
            }
        }

        blocks.extend(current);
        blocks
    }
}

/// HTML page: each heading is a block header, the following list items
/// are its stall entries.
pub struct MarkupSource<'a> {
    html: &'a str,
    content_marker: Option<&'a str>,
}

impl<'a> MarkupSource<'a> {
    pub fn new(html: &'a str, content_marker: Option<&'a str>) -> Self {
        Self { html, content_marker }
    }
}

impl DocumentSource for MarkupSource<'_> {
    fn day_blocks(&self) -> Vec<DayBlock> {
        heading_sections(self.html, self.content_marker)
            .into_iter()
            .map(|section| DayBlock {
                header: section.title,
                entries: section.items.into_iter().map(RawEntry::stall).collect(),
            })
            .collect()
    }
}

/// Replace typographic variants upstream text uses inconsistently
pub fn normalize_typography(text: &str) -> String {
    text.replace('\u{2019}', "'").replace('\u{2013}', "-").replace('\u{a0}', " ")
}

/// Turns documents into [`WeekRecord`]s. Pure: no I/O, no clock.
#[derive(Debug, Clone)]
pub struct ScheduleParser {
    /// Anchor for dates written without a year
    reference: NaiveDate,
    stall_marker: char,
    content_marker: Option<String>,
}

impl ScheduleParser {
    pub fn new(reference: NaiveDate) -> Self {
        Self { reference, stall_marker: DEFAULT_STALL_MARKER, content_marker: None }
    }

    pub fn with_stall_marker(mut self, marker: char) -> Self {
        self.stall_marker = marker;
        self
    }

    pub fn with_content_marker(mut self, marker: Option<String>) -> Self {
        self.content_marker = marker;
        self
    }

    /// Parse one document into one week
    pub fn parse(&self, document: &Document) -> WeekRecord {
        let blocks = match document {
            Document::Text(body) => TextSource::new(body, self.stall_marker).day_blocks(),
            Document::Markup(html) => {
                MarkupSource::new(html, self.content_marker.as_deref()).day_blocks()
            }
        };
        self.parse_blocks(&blocks)
    }

    /// One week per document, in document order
    pub fn parse_all(&self, documents: &[Document]) -> Vec<WeekRecord> {
        documents.iter().map(|document| self.parse(document)).collect()
    }

    pub fn parse_blocks(&self, blocks: &[DayBlock]) -> WeekRecord {
        WeekRecord { days: blocks.iter().filter_map(|block| self.parse_block(block)).collect() }
    }

    fn parse_block(&self, block: &DayBlock) -> Option<DayRecord> {
        let header = normalize_typography(&block.header);
        let Some((_, date_text)) = split_day_header(&header) else {
            debug!(header = %header, "day_block_skipped_no_weekday");
            return None;
        };
        let Some(date) = parse_human_date(date_text, self.reference) else {
            debug!(header = %header, "day_block_skipped_bad_date");
            return None;
        };

        let visits = block.entries.iter().flat_map(parse_entry).collect();
        Some(DayRecord { date, visits })
    }
}

/// Visits for one entry line; empty when the line is skipped
fn parse_entry(entry: &RawEntry) -> Vec<Visit> {
    let text = normalize_typography(&entry.text);
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if !entry.stall {
        return vec![Visit::bare(text)];
    }

    let Some((location, visitors)) = text.split_once(LOCATION_SEPARATOR) else {
        debug!(line = %text, "stall_line_skipped_no_separator");
        return Vec::new();
    };
    let location = location.trim();

    visitors
        .split(',')
        .map(str::trim)
        .filter(|visitor| !visitor.is_empty())
        .map(|visitor| Visit::at(location, visitor))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn parser() -> ScheduleParser {
        ScheduleParser::new(date(2024, 3, 1))
    }

    fn text(body: &str) -> Document {
        Document::Text(body.to_string())
    }

    #[test]
    fn test_visitor_list_splitting() {
        let visits = parse_entry(&RawEntry::stall(" Foo Ct - Alice, Bob, Carol"));
        assert_eq!(
            visits,
            vec![Visit::at("Foo Ct", "Alice"), Visit::at("Foo Ct", "Bob"), Visit::at("Foo Ct", "Carol")]
        );
    }

    #[test]
    fn test_empty_visitors_dropped_after_trim() {
        let visits = parse_entry(&RawEntry::stall("Foo Ct - Alice, , Bob,"));
        assert_eq!(visits, vec![Visit::at("Foo Ct", "Alice"), Visit::at("Foo Ct", "Bob")]);
    }

    #[test]
    fn test_typographic_apostrophe_and_en_dash_normalized() {
        let visits = parse_entry(&RawEntry::stall("Foo Ct \u{2013} O\u{2019}Brien"));
        assert_eq!(visits, vec![Visit::at("Foo Ct", "O'Brien")]);
    }

    #[test]
    fn test_marker_line_without_separator_is_discarded() {
        assert!(parse_entry(&RawEntry::stall("All stalls closed today!")).is_empty());
        assert!(parse_entry(&RawEntry::stall("Foo-Bar Ct")).is_empty());
    }

    #[test]
    fn test_unmarked_line_is_bare_visit() {
        assert_eq!(parse_entry(&RawEntry::bare("Free coffee at noon")), vec![Visit::bare("Free coffee at noon")]);
    }

    #[test]
    fn test_text_source_segments_blocks() {
        let body = "Hi all, here is the schedule!\nSee you there\n\nMonday 4th March\n* Foo Ct - Alice\nBring a cup\nTuesday 5th March\n* Quad - Bob\n\nThanks!";
        let blocks = TextSource::new(body, '*').day_blocks();

        let headers: Vec<&str> = blocks.iter().map(|b| b.header.as_str()).collect();
        assert_eq!(headers, vec!["Hi all, here is the schedule!", "Monday 4th March", "Tuesday 5th March", "Thanks!"]);
        assert_eq!(blocks[1].entries, vec![RawEntry::stall(" Foo Ct - Alice"), RawEntry::bare("Bring a cup")]);
        assert_eq!(blocks[2].entries, vec![RawEntry::stall(" Quad - Bob")]);
    }

    #[test]
    fn test_end_to_end_stall_and_announcement() {
        let weeks = parser().parse_all(&[text("Monday 2024-03-04\n* Foo Ct - Alice\nMarket opens at 10")]);

        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].days.len(), 1);
        let day = &weeks[0].days[0];
        assert_eq!(day.date, date(2024, 3, 4));
        assert_eq!(day.visits, vec![Visit::at("Foo Ct", "Alice"), Visit::bare("Market opens at 10")]);
    }

    #[test]
    fn test_malformed_blocks_do_not_affect_others() {
        let body = "Monday 4th March\n* Foo Ct - Alice\n\n\
                    Funday 5th March\n* Quad - Mallory\n\n\
                    Wednesday the day after tomorrow\n* Quad - Trent\n\n\
                    Thursday 7th March\n* Quad - Bob\n\n\
                    Friday 8th March";
        let week = parser().parse(&text(body));

        let dates: Vec<NaiveDate> = week.days.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![date(2024, 3, 4), date(2024, 3, 7), date(2024, 3, 8)]);
        // a recognised day with no entries is kept, not dropped
        assert!(week.days[2].visits.is_empty());
    }

    #[test]
    fn test_parse_is_idempotent() {
        let doc = text("Monday 4th March\n* Foo Ct - Alice, Bob\n\nTuesday 5th March\nClosed");
        assert_eq!(parser().parse(&doc), parser().parse(&doc));
    }

    #[test]
    fn test_custom_stall_marker() {
        let doc = text("Monday 4th March\n- Foo Ct - Alice\n* Quad - Bob");
        let week = parser().with_stall_marker('-').parse(&doc);
        assert_eq!(week.days[0].visits, vec![Visit::at("Foo Ct", "Alice"), Visit::bare("* Quad - Bob")]);
    }

    #[test]
    fn test_markup_document() {
        let html = r#"<div class="editable-content">
            <h2>Monday 4 March</h2>
            <ul><li>Foo Ct &ndash; Alice,&nbsp;O&rsquo;Brien</li><li>Notice only</li></ul>
            <h2>Parking update</h2><ul><li>Lot 3 - closed</li></ul>
            <h2>Tuesday 5 March</h2><ul></ul>
        </div>"#;
        let week = parser()
            .with_content_marker(Some("editable-content".to_string()))
            .parse(&Document::Markup(html.to_string()));

        assert_eq!(week.days.len(), 2);
        assert_eq!(week.days[0].date, date(2024, 3, 4));
        assert_eq!(week.days[0].visits, vec![Visit::at("Foo Ct", "Alice"), Visit::at("Foo Ct", "O'Brien")]);
        assert_eq!(week.days[1].date, date(2024, 3, 5));
        assert!(week.days[1].visits.is_empty());
    }

    #[test]
    fn test_one_week_per_document() {
        let weeks = parser().parse_all(&[text("Monday 4th March\n* A - x"), text("no schedule here")]);
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].len(), 1);
        assert!(weeks[1].is_empty());
    }
}
