use crate::constants::{
    BOOKING_URL_FIELD, EVENT_DATE_FIELD, EVENT_TIME_FIELD, EVENT_URL_FIELD, METADATA_CLOSE,
    METADATA_OPEN, NOTE_FIELD, UNMATCHED_NOTE, URL_NOT_AVAILABLE,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::ops::Range;

static BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\[EVENT_METADATA\](.*?)\[/EVENT_METADATA\]").expect("block regex")
});
static EVENT_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Event_URL:\s*(https?://\S+)").expect("event url regex"));
static BOOKING_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Booking_URL:\s*(https?://\S+)").expect("booking url regex"));
static EVENT_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*Event_Date:[ \t]*(\S[^\r\n]*)").expect("date regex"));
static EVENT_TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*Event_Time:[ \t]*(\S[^\r\n]*)").expect("time regex"));
static NOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*Note:[ \t]*(\S[^\r\n]*)").expect("note regex"));

/// An annotation block re-derived from text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataBlock {
    /// Byte range of the block, tags included
    #[serde(skip)]
    pub span: Range<usize>,
    /// 1-based line of the opening tag
    pub line: usize,
    pub event_url: Option<String>,
    pub booking_url: Option<String>,
    pub event_date: Option<String>,
    pub event_time: Option<String>,
    pub note: Option<String>,
}

fn capture(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// All annotation blocks in document order
pub fn extract_blocks(text: &str) -> Vec<MetadataBlock> {
    let mut blocks = Vec::new();
    let mut line = 1;
    let mut counted_to = 0;

    for caps in BLOCK_RE.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        // An unterminated opening tag earlier in the match is not part of the block.
        let (start, inner) = match inner.as_str().rfind(METADATA_OPEN) {
            Some(pos) => (
                inner.start() + pos,
                &inner.as_str()[pos + METADATA_OPEN.len()..],
            ),
            None => (whole.start(), inner.as_str()),
        };
        line += text[counted_to..start].matches('\n').count();
        counted_to = start;

        blocks.push(MetadataBlock {
            span: start..whole.end(),
            line,
            event_url: capture(&EVENT_URL_RE, inner),
            booking_url: capture(&BOOKING_URL_RE, inner),
            event_date: capture(&EVENT_DATE_RE, inner),
            event_time: capture(&EVENT_TIME_RE, inner),
            note: capture(&NOTE_RE, inner),
        });
    }
    blocks
}

/// Block lines for a matched window
pub fn render_block(event_url: Option<&str>, booking_url: Option<&str>) -> Vec<String> {
    vec![
        METADATA_OPEN.to_string(),
        format!("{}: {}", EVENT_URL_FIELD, event_url.unwrap_or(URL_NOT_AVAILABLE)),
        format!("{}: {}", BOOKING_URL_FIELD, booking_url.unwrap_or(URL_NOT_AVAILABLE)),
        METADATA_CLOSE.to_string(),
    ]
}

/// Block lines for a window without any matching record
pub fn render_unmatched_block(date: Option<&str>, time: &str) -> Vec<String> {
    vec![
        METADATA_OPEN.to_string(),
        format!("{}: {}", EVENT_URL_FIELD, URL_NOT_AVAILABLE),
        format!("{}: {}", BOOKING_URL_FIELD, URL_NOT_AVAILABLE),
        format!("{}: {}", EVENT_DATE_FIELD, date.unwrap_or("N/A")),
        format!("{}: {}", EVENT_TIME_FIELD, time),
        format!("{}: {}", NOTE_FIELD, UNMATCHED_NOTE),
        METADATA_CLOSE.to_string(),
    ]
}
