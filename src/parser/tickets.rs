use crate::config::{LinkerConfig, UrlOverride};
use crate::constants::{EVENT_PAGE_PREFIX, TICKETING_PREFIX};
use crate::parser::LineParser;
use crate::types::TicketRecord;
use chrono::NaiveTime;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

// vf<YY>-<MM>-<DD>-<HHMM>, e.g. vf25-07-17-1830
static SHOW_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"vf(\d{2})-(\d{2})-(\d{2})-(\d{2})(\d{2})").expect("show code regex")
});

/// Date/time code embedded in festival show identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ShowCode {
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

impl ShowCode {
    /// Finds the first valid code in `text`. Out-of-range codes are ignored.
    pub fn find(text: &str) -> Option<Self> {
        let caps = SHOW_CODE_RE.captures(text)?;
        let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
        let code = ShowCode {
            month: num(2)?,
            day: num(3)?,
            hour: num(4)?,
            minute: num(5)?,
        };
        let valid_date = (1..=12).contains(&code.month) && (1..=31).contains(&code.day);
        let valid_time = NaiveTime::from_hms_opt(code.hour, code.minute, 0).is_some();
        (valid_date && valid_time).then_some(code)
    }

    /// `DD.MM`
    pub fn date(&self) -> String {
        format!("{:02}.{:02}", self.day, self.month)
    }

    /// `HH:MM`
    pub fn time(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

/// Parses the ticket listing into [`TicketRecord`]s.
pub struct TicketParser {
    overrides: Vec<UrlOverride>,
}

impl TicketParser {
    pub fn new(config: &LinkerConfig) -> Self {
        Self {
            overrides: config.url_overrides.clone(),
        }
    }

    /// Date and time for an event URL: the embedded show code first, then the
    /// first override whose keyword occurs in the URL.
    pub fn derive_date_time(&self, event_url: &str) -> Option<(String, String)> {
        if let Some(code) = ShowCode::find(event_url) {
            return Some((code.date(), code.time()));
        }
        self.overrides
            .iter()
            .find(|ov| event_url.contains(&ov.keyword))
            .map(|ov| {
                debug!("Using override '{}' for {}", ov.keyword, event_url);
                (ov.date.clone(), ov.time.clone())
            })
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl LineParser for TicketParser {
    type Output = TicketRecord;

    fn parse(&self, text: &str) -> Vec<TicketRecord> {
        let mut records = Vec::new();
        let mut open: Option<TicketRecord> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();

            if let Some(rest) = line.strip_prefix(EVENT_PAGE_PREFIX) {
                if let Some(dropped) = open.take() {
                    debug!(
                        line = idx + 1,
                        "Event page {:?} has no ticketing line, dropping",
                        dropped.event_url
                    );
                }
                let event_url = non_empty(rest);
                let (date, time) = event_url
                    .as_deref()
                    .and_then(|url| self.derive_date_time(url))
                    .unzip();
                open = Some(TicketRecord {
                    event_url,
                    booking_url: None,
                    date,
                    time,
                });
            } else if let Some(rest) = line.strip_prefix(TICKETING_PREFIX) {
                match open.take() {
                    Some(mut record) => {
                        record.booking_url = non_empty(rest);
                        records.push(record);
                    }
                    None => debug!(line = idx + 1, "Ticketing line without event page, dropping"),
                }
            }
        }

        if let Some(dropped) = open {
            debug!("Trailing event page {:?} has no ticketing line, dropping", dropped.event_url);
        }

        info!(
            "Extracted {} ticket records ({} without date)",
            records.len(),
            records.iter().filter(|r| r.date.is_none()).count()
        );
        records
    }
}

/// Extracts ticket records from the listing text
pub fn extract_tickets(text: &str, config: &LinkerConfig) -> Vec<TicketRecord> {
    TicketParser::new(config).parse(text)
}
