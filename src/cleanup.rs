use crate::constants::PRODUCT_ID_PARAM;
use crate::metadata::{extract_blocks, MetadataBlock};
use crate::metrics::LinkerMetrics;
use chrono::{DateTime, TimeZone};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// Booking URL without a product id
    BrokenBooking,
    /// Event URL already seen earlier in the document
    Duplicate,
}

impl RemovalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalReason::BrokenBooking => "broken",
            RemovalReason::Duplicate => "duplicate",
        }
    }
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemovedBlock {
    pub line: usize,
    pub event_url: Option<String>,
    pub booking_url: Option<String>,
    pub reason: RemovalReason,
}

#[derive(Debug, Clone)]
pub struct CleanResult {
    pub text: String,
    pub removed: Vec<RemovedBlock>,
    pub kept: usize,
}

impl CleanResult {
    pub fn removed_broken(&self) -> usize {
        self.count(RemovalReason::BrokenBooking)
    }

    pub fn removed_duplicates(&self) -> usize {
        self.count(RemovalReason::Duplicate)
    }

    fn count(&self, reason: RemovalReason) -> usize {
        self.removed.iter().filter(|r| r.reason == reason).count()
    }
}

/// True when the booking URL carries no `productId` query parameter
pub fn is_broken_booking_url(booking_url: &str) -> bool {
    match Url::parse(booking_url) {
        Ok(url) => !url.query_pairs().any(|(key, _)| key == PRODUCT_ID_PARAM),
        Err(_) => !booking_url.contains(PRODUCT_ID_PARAM),
    }
}

fn removal_reason(block: &MetadataBlock, seen: &HashSet<String>) -> Option<RemovalReason> {
    if block
        .booking_url
        .as_deref()
        .is_some_and(is_broken_booking_url)
    {
        return Some(RemovalReason::BrokenBooking);
    }
    match block.event_url.as_deref() {
        Some(url) if seen.contains(url) => Some(RemovalReason::Duplicate),
        _ => None,
    }
}

/// Byte range covering the block, its trailing newline and one blank line before it
fn removal_span(text: &str, span: &Range<usize>) -> Range<usize> {
    let mut start = span.start;
    let mut end = span.end;
    if text[end..].starts_with("\r\n") {
        end += 2;
    } else if text[end..].starts_with('\n') {
        end += 1;
    }
    let before = &text[..start];
    if before.ends_with("\n\n") {
        start -= 1;
    } else if before.ends_with("\r\n\r\n") {
        start -= 2;
    }
    start..end
}

/// Removes broken-booking and duplicate annotation blocks.
/// Running it again on its own output removes nothing.
pub fn clean(text: &str) -> CleanResult {
    let mut seen: HashSet<String> = HashSet::new();
    let mut removed = Vec::new();
    let mut spans = Vec::new();
    let mut kept = 0;

    for block in extract_blocks(text) {
        match removal_reason(&block, &seen) {
            Some(reason) => {
                debug!(
                    line = block.line,
                    reason = %reason,
                    "Removing block for {:?}",
                    block.event_url
                );
                LinkerMetrics::record_block_removed(reason.as_str());
                spans.push(removal_span(text, &block.span));
                removed.push(RemovedBlock {
                    line: block.line,
                    event_url: block.event_url,
                    booking_url: block.booking_url,
                    reason,
                });
            }
            None => {
                if let Some(url) = block.event_url {
                    seen.insert(url);
                }
                kept += 1;
            }
        }
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for span in spans {
        // A removal span may reach back over a newline already consumed by
        // the previous span when two removed blocks are adjacent.
        let start = span.start.max(last);
        out.push_str(&text[last..start]);
        last = span.end.max(last);
    }
    out.push_str(&text[last..]);

    let result = CleanResult {
        text: out,
        removed,
        kept,
    };
    info!(
        "Cleanup removed {} broken and {} duplicate blocks, kept {}",
        result.removed_broken(),
        result.removed_duplicates(),
        result.kept
    );
    result
}

/// Comment header prepended to a cleaned file
pub fn render_header<Tz>(title: &str, notes: &[String], cleaned_at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let mut header = format!(
        "# {}\n# Cleaned on {}\n",
        title,
        cleaned_at.format("%Y-%m-%d %H:%M:%S")
    );
    for note in notes {
        header.push_str("# ");
        header.push_str(note);
        header.push('\n');
    }
    header.push('\n');
    header
}
