//! Read-only consistency report over an annotated schedule.
//!
//! Nothing here fails on malformed data: URLs that cannot be parsed become
//! anomalies in the report.

use crate::config::LinkerConfig;
use crate::constants::{BOOKING_PATH, EVENT_PATH_PREFIX, PERF_ID_PARAM, PRODUCT_ID_PARAM};
use crate::error::Result;
use crate::metadata::{extract_blocks, MetadataBlock};
use crate::parser::{split_lines, ScheduleParser, ShowCode};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};
use url::Url;

static STANDARD_SHOW_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^vf\d{2}-\d{2}-\d{2}-\d{4}$").expect("show id regex"));
static SUFFIXED_SHOW_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^vf\d{2}-\d{2}-\d{2}-\d{4}-").expect("suffixed show id regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowIdPattern {
    /// `vfYY-MM-DD-HHMM`
    Standard,
    /// `vfYY-MM-DD-HHMM-<slug>`
    WithSuffix,
    Special,
}

pub fn classify_show_id(show_id: &str) -> ShowIdPattern {
    if STANDARD_SHOW_ID_RE.is_match(show_id) {
        ShowIdPattern::Standard
    } else if SUFFIXED_SHOW_ID_RE.is_match(show_id) {
        ShowIdPattern::WithSuffix
    } else {
        ShowIdPattern::Special
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrlIssue {
    pub line: usize,
    pub url: String,
    pub problem: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShowIdCounts {
    pub standard: usize,
    pub with_suffix: usize,
    pub special: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventUrlStats {
    pub total: usize,
    pub show_ids: ShowIdCounts,
    pub issues: Vec<UrlIssue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BookingUrlStats {
    pub total: usize,
    pub with_perf_id: usize,
    pub with_product_id: usize,
    /// Both `perfId` and `productId` present
    pub complete: usize,
    pub incomplete: usize,
    pub issues: Vec<UrlIssue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateUrl {
    pub url: String,
    pub first_line: usize,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub first: String,
    pub last: String,
    pub unique_dates: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScheduleStats {
    pub date_markers: usize,
    pub time_markers: usize,
    pub windows: usize,
    pub windows_with_metadata: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub total_blocks: usize,
    /// Blocks with neither an event nor a booking URL
    pub placeholder_blocks: usize,
    pub event_urls: EventUrlStats,
    pub booking_urls: BookingUrlStats,
    pub duplicate_event_urls: Vec<DuplicateUrl>,
    pub duplicate_booking_urls: Vec<DuplicateUrl>,
    pub anomalies: Vec<UrlIssue>,
    pub date_range: Option<DateRange>,
    pub schedule: ScheduleStats,
}

impl ValidationReport {
    pub fn problem_count(&self) -> usize {
        self.event_urls.issues.len()
            + self.booking_urls.issues.len()
            + self.duplicate_event_urls.len()
            + self.duplicate_booking_urls.len()
            + self.anomalies.len()
    }

    pub fn is_clean(&self) -> bool {
        self.problem_count() == 0
    }

    /// One line per problem, in report order
    pub fn problems(&self) -> Vec<String> {
        let url_issue = |kind: &str, i: &UrlIssue| {
            format!("line {}: {} {} ({})", i.line, kind, i.problem, i.url)
        };
        let duplicate = |kind: &str, d: &DuplicateUrl| {
            format!(
                "line {}: duplicate {} URL first seen on line {} ({})",
                d.line, kind, d.first_line, d.url
            )
        };

        let mut out = Vec::with_capacity(self.problem_count());
        out.extend(self.event_urls.issues.iter().map(|i| url_issue("event URL", i)));
        out.extend(self.booking_urls.issues.iter().map(|i| url_issue("booking URL", i)));
        out.extend(self.duplicate_event_urls.iter().map(|d| duplicate("event", d)));
        out.extend(self.duplicate_booking_urls.iter().map(|d| duplicate("booking", d)));
        out.extend(
            self.anomalies
                .iter()
                .map(|a| format!("line {}: {} ({})", a.line, a.problem, a.url)),
        );
        out
    }
}

struct UrlChecker {
    event_host: String,
    booking_host: String,
}

impl UrlChecker {
    fn check_event(&self, line: usize, raw: &str, report: &mut ValidationReport) {
        let stats = &mut report.event_urls;
        stats.total += 1;
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(e) => {
                report.anomalies.push(issue(line, raw, format!("unparseable event URL: {}", e)));
                return;
            }
        };

        if url.scheme() != "https" {
            stats.issues.push(issue(line, raw, format!("scheme is {}", url.scheme())));
        }
        if url.host_str() != Some(self.event_host.as_str()) {
            stats.issues.push(issue(
                line,
                raw,
                format!("host is not {}", self.event_host),
            ));
        }
        match url.path().strip_prefix(EVENT_PATH_PREFIX) {
            Some(rest) => {
                let show_id = rest.trim_end_matches('/');
                match classify_show_id(show_id) {
                    ShowIdPattern::Standard => stats.show_ids.standard += 1,
                    ShowIdPattern::WithSuffix => stats.show_ids.with_suffix += 1,
                    ShowIdPattern::Special => stats.show_ids.special += 1,
                }
            }
            None => stats.issues.push(issue(
                line,
                raw,
                format!("path does not start with {}", EVENT_PATH_PREFIX),
            )),
        }
    }

    fn check_booking(&self, line: usize, raw: &str, report: &mut ValidationReport) {
        let stats = &mut report.booking_urls;
        stats.total += 1;
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(e) => {
                report
                    .anomalies
                    .push(issue(line, raw, format!("unparseable booking URL: {}", e)));
                return;
            }
        };

        if url.scheme() != "https" {
            stats.issues.push(issue(line, raw, format!("scheme is {}", url.scheme())));
        }
        if url.host_str() != Some(self.booking_host.as_str()) {
            stats.issues.push(issue(
                line,
                raw,
                format!("host is not {}", self.booking_host),
            ));
        }
        if url.path().trim_end_matches('/') != BOOKING_PATH {
            stats
                .issues
                .push(issue(line, raw, format!("path is not {}", BOOKING_PATH)));
        }

        let has_param = |name: &str| url.query_pairs().any(|(key, _)| key == name);
        let perf = has_param(PERF_ID_PARAM);
        let product = has_param(PRODUCT_ID_PARAM);
        stats.with_perf_id += usize::from(perf);
        stats.with_product_id += usize::from(product);
        if perf && product {
            stats.complete += 1;
        } else {
            stats.incomplete += 1;
            let missing: Vec<&str> = [(perf, PERF_ID_PARAM), (product, PRODUCT_ID_PARAM)]
                .iter()
                .filter(|(present, _)| !present)
                .map(|(_, name)| *name)
                .collect();
            stats
                .issues
                .push(issue(line, raw, format!("missing {}", missing.join(", "))));
        }
    }
}

fn issue(line: usize, url: &str, problem: String) -> UrlIssue {
    UrlIssue {
        line,
        url: url.to_string(),
        problem,
    }
}

/// Later occurrences of a URL, each paired with the line of its first occurrence
fn find_duplicates<'a, F>(blocks: &'a [MetadataBlock], field: F) -> Vec<DuplicateUrl>
where
    F: Fn(&'a MetadataBlock) -> Option<&'a str>,
{
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    let mut duplicates = Vec::new();
    for block in blocks {
        let Some(url) = field(block) else { continue };
        match first_seen.get(url) {
            Some(first_line) => duplicates.push(DuplicateUrl {
                url: url.to_string(),
                first_line: *first_line,
                line: block.line,
            }),
            None => {
                first_seen.insert(url, block.line);
            }
        }
    }
    duplicates
}

fn date_range(blocks: &[MetadataBlock]) -> Option<DateRange> {
    let codes: BTreeSet<(u32, u32)> = blocks
        .iter()
        .filter_map(|b| b.event_url.as_deref())
        .filter_map(ShowCode::find)
        .map(|code| (code.month, code.day))
        .collect();
    let first = codes.iter().next()?;
    let last = codes.iter().next_back()?;
    let fmt = |(month, day): &(u32, u32)| format!("{:02}.{:02}", day, month);
    Some(DateRange {
        first: fmt(first),
        last: fmt(last),
        unique_dates: codes.len(),
    })
}

/// Builds the validation report for an annotated schedule
pub fn validate(text: &str, config: &LinkerConfig) -> Result<ValidationReport> {
    let blocks = extract_blocks(text);
    let checker = UrlChecker {
        event_host: config.event_host(),
        booking_host: config.booking_host(),
    };

    let mut report = ValidationReport {
        total_blocks: blocks.len(),
        ..Default::default()
    };

    for block in &blocks {
        if block.event_url.is_none() && block.booking_url.is_none() {
            report.placeholder_blocks += 1;
        }
        if let Some(url) = block.event_url.as_deref() {
            checker.check_event(block.line, url, &mut report);
        }
        if let Some(url) = block.booking_url.as_deref() {
            checker.check_booking(block.line, url, &mut report);
        }
    }

    report.duplicate_event_urls = find_duplicates(&blocks, |b| b.event_url.as_deref());
    report.duplicate_booking_urls = find_duplicates(&blocks, |b| b.booking_url.as_deref());
    report.date_range = date_range(&blocks);

    let parser = ScheduleParser::new(config)?;
    let lines = split_lines(text);
    let (date_markers, time_markers) = parser.count_markers(&lines);
    let windows = parser.parse_lines(&lines);
    report.schedule = ScheduleStats {
        date_markers,
        time_markers,
        windows: windows.len(),
        windows_with_metadata: windows.iter().filter(|w| w.has_metadata).count(),
    };

    if report.is_clean() {
        info!("Validated {} blocks, no problems", report.total_blocks);
    } else {
        warn!(
            "Validated {} blocks, {} problems",
            report.total_blocks,
            report.problem_count()
        );
    }
    Ok(report)
}
