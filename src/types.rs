use serde::{Deserialize, Serialize};
use std::fmt;

/// One `Event Page:` / `Ticketing:` pair from the ticket listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_url: Option<String>,
    /// `DD.MM`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// `HH:MM`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl TicketRecord {
    /// Hour component of `time`, if present and numeric
    pub fn hour(&self) -> Option<u32> {
        self.time.as_deref().and_then(hour_of)
    }
}

/// A contiguous span of schedule text belonging to one performance,
/// bounded by time markers. Line numbers are 0-based and inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    pub start_line: usize,
    pub end_line: usize,
    /// Last line of the performance's own text; annotation blocks go after it
    pub anchor_line: usize,
    pub date: Option<String>,
    pub time: String,
    pub end_time: Option<String>,
    pub venue: Option<String>,
    pub content: String,
    pub has_metadata: bool,
}

impl ScheduleWindow {
    pub fn hour(&self) -> Option<u32> {
        hour_of(&self.time)
    }

    pub fn time_range(&self) -> String {
        match &self.end_time {
            Some(end) => format!("{}-{}", self.time, end),
            None => self.time.clone(),
        }
    }
}

pub(crate) fn hour_of(time: &str) -> Option<u32> {
    time.split(':').next()?.trim().parse().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    Approximate,
    Content,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Exact => "exact",
            MatchTier::Approximate => "approximate",
            MatchTier::Content => "content",
        }
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A window paired with the ticket record chosen for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    pub window_index: usize,
    pub record_index: usize,
    pub tier: MatchTier,
}
