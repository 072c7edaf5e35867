use crate::config::LinkerConfig;
use crate::error::Result;
use crate::parser::{split_lines, ScheduleParser};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use tracing::info;

/// Lines of window text shown per event in the listing
const PREVIEW_LINES: usize = 10;
const UNKNOWN_DATE: &str = "Unknown";

/// A schedule window that carries no annotation block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedEvent {
    /// 1-based line of the time marker
    pub line: usize,
    pub date: Option<String>,
    pub time_range: String,
    pub venue: Option<String>,
    pub preview: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UnmatchedListing {
    pub events: Vec<UnmatchedEvent>,
    /// Event count per date in calendar order, unknown dates last
    pub by_date: Vec<(String, usize)>,
}

fn calendar_key(date: &str) -> (u32, u32) {
    match date.split_once('.') {
        Some((day, month)) => (
            month.parse().unwrap_or(u32::MAX),
            day.parse().unwrap_or(u32::MAX),
        ),
        None => (u32::MAX, u32::MAX),
    }
}

/// Collects the windows of an annotated schedule that have no metadata block
pub fn find_unmatched(text: &str, config: &LinkerConfig) -> Result<UnmatchedListing> {
    let parser = ScheduleParser::new(config)?;
    let lines = split_lines(text);

    let events: Vec<UnmatchedEvent> = parser
        .parse_lines(&lines)
        .into_iter()
        .filter(|w| !w.has_metadata)
        .map(|w| UnmatchedEvent {
            line: w.start_line + 1,
            time_range: w.time_range(),
            preview: lines[w.start_line..=w.anchor_line]
                .iter()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
                .take(PREVIEW_LINES)
                .map(str::to_string)
                .collect(),
            date: w.date,
            venue: w.venue,
        })
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for event in &events {
        *counts
            .entry(event.date.as_deref().unwrap_or(UNKNOWN_DATE))
            .or_default() += 1;
    }
    let mut by_date: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(date, n)| (date.to_string(), n))
        .collect();
    by_date.sort_by_key(|(date, _)| calendar_key(date));

    info!(
        "Found {} unmatched events across {} dates",
        events.len(),
        by_date.len()
    );
    Ok(UnmatchedListing { events, by_date })
}

impl UnmatchedListing {
    /// Plain-text listing of the first `limit` events, preceded by the per-date counts
    pub fn render(&self, limit: usize) -> String {
        let mut out = String::new();
        let rule = "=".repeat(60);
        let _ = writeln!(out, "UNMATCHED EVENTS: {}", self.events.len());
        let _ = writeln!(out, "{}\n", rule);

        let _ = writeln!(out, "By date:");
        for (date, count) in &self.by_date {
            let _ = writeln!(out, "  {}: {}", date, count);
        }
        let _ = writeln!(out);

        for (i, event) in self.events.iter().take(limit).enumerate() {
            let _ = writeln!(out, "Event {}:", i + 1);
            let _ = writeln!(
                out,
                "  Date: {}",
                event.date.as_deref().unwrap_or(UNKNOWN_DATE)
            );
            let _ = writeln!(out, "  Time: {}", event.time_range);
            let _ = writeln!(out, "  Line in file: {}", event.line);
            if let Some(venue) = &event.venue {
                let _ = writeln!(out, "  Venue: {}", venue);
            }
            let _ = writeln!(out, "  Content preview:");
            for line in &event.preview {
                let _ = writeln!(out, "    {}", line);
            }
            let _ = writeln!(out, "\n{}\n", "-".repeat(40));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::render_block;

    fn schedule() -> String {
        [
            "Je. 31.07",
            "EGLISE",
            "11:00-12:00",
            "Quatuor Ebene",
            "",
            "19:30-21:00",
            "Recital",
            "Ve. 1",
            "SALLE DES COMBINS",
            "18:30-20:00",
            "Orchestra",
            render_block(Some("https://www.verbierfestival.com/en/show/x/"), None)
                .join("\n")
                .as_str(),
            "20:30-22:00",
            "Late show",
        ]
        .join("\n")
    }

    #[test]
    fn test_finds_windows_without_blocks() {
        let listing = find_unmatched(&schedule(), &LinkerConfig::default()).unwrap();
        let lines: Vec<usize> = listing.events.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 6, 16]);
        assert_eq!(listing.events[0].venue.as_deref(), Some("EGLISE"));
        assert_eq!(listing.events[0].preview, vec!["11:00-12:00", "Quatuor Ebene"]);
        assert_eq!(listing.events[2].date.as_deref(), Some("01.08"));
    }

    #[test]
    fn test_dates_in_calendar_order() {
        let listing = find_unmatched(&schedule(), &LinkerConfig::default()).unwrap();
        assert_eq!(
            listing.by_date,
            vec![("31.07".to_string(), 2), ("01.08".to_string(), 1)]
        );
    }

    #[test]
    fn test_render_respects_limit() {
        let listing = find_unmatched(&schedule(), &LinkerConfig::default()).unwrap();
        let text = listing.render(1);
        assert!(text.starts_with("UNMATCHED EVENTS: 3\n"));
        assert!(text.contains("  31.07: 2"));
        assert!(text.contains("Event 1:"));
        assert!(!text.contains("Event 2:"));
        assert!(text.contains("  Time: 11:00-12:00"));
        assert!(text.contains("    Quatuor Ebene"));
    }
}
