use crate::config::LinkerConfig;
use crate::constants::{METADATA_CLOSE, METADATA_OPEN, PAGE_MARKER};
use crate::error::Result;
use crate::parser::{split_lines, LineParser};
use crate::types::ScheduleWindow;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

// 11:00-13:00, 9:30 - 11:00
static TIME_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})\s*-\s*(\d{1,2}):(\d{2})").expect("time range regex")
});

fn normalize_time(hour: &str, minute: &str) -> Option<String> {
    let h: u32 = hour.parse().ok()?;
    let m: u32 = minute.parse().ok()?;
    (h < 24 && m < 60).then(|| format!("{:02}:{:02}", h, m))
}

/// Start and end of a `HH:MM - HH:MM` time marker line
pub fn time_marker(line: &str) -> Option<(String, Option<String>)> {
    let caps = TIME_RANGE_RE.captures(line.trim())?;
    let start = normalize_time(&caps[1], &caps[2])?;
    let end = normalize_time(&caps[3], &caps[4]);
    Some((start, end))
}

pub fn is_page_marker(line: &str) -> bool {
    line.contains(PAGE_MARKER)
}

/// Tracks the date implied by successive date markers
struct DateState {
    current_date: Option<String>,
    month: u32,
    last_day: Option<u32>,
}

impl DateState {
    fn new(default_month: u32) -> Self {
        Self {
            current_date: None,
            month: default_month,
            last_day: None,
        }
    }

    fn apply(&mut self, day: u32, month: Option<u32>, config: &LinkerConfig) {
        let date = if let Some(m) = month {
            self.month = m;
            format!("{:02}.{:02}", day, m)
        } else if let Some(date) = config.day_override(day) {
            if let Some(m) = date.split('.').nth(1).and_then(|m| m.parse().ok()) {
                self.month = m;
            }
            date.to_string()
        } else {
            // A month-less day lower than the previous one means the month turned over.
            if matches!(self.last_day, Some(last) if day < last) {
                self.month = self.month % 12 + 1;
            }
            format!("{:02}.{:02}", day, self.month)
        };
        self.last_day = Some(day);
        self.current_date = Some(date);
    }
}

/// Window under construction
struct OpenWindow {
    start: usize,
    date: Option<String>,
    time: String,
    end_time: Option<String>,
    venue: Option<String>,
    content: Vec<String>,
    has_metadata: bool,
    first_date_marker: Option<usize>,
}

/// Segments schedule text into [`ScheduleWindow`]s using date markers,
/// time-range markers and venue lines.
pub struct ScheduleParser {
    config: LinkerConfig,
    date_re: Regex,
    venue_keywords: Vec<String>,
    default_month: u32,
}

impl ScheduleParser {
    pub fn new(config: &LinkerConfig) -> Result<Self> {
        let tokens = config
            .weekday_tokens
            .iter()
            .map(|t| regex::escape(t.trim()))
            .collect::<Vec<_>>()
            .join("|");
        let date_re = Regex::new(&format!(
            r"^(?:{})\.\s+(\d{{1,2}})(?:\.(\d{{1,2}}))?\b",
            tokens
        ))?;
        Ok(Self {
            config: config.clone(),
            date_re,
            venue_keywords: config
                .venue_keywords
                .iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect(),
            default_month: config.month()?,
        })
    }

    /// Day and optional month of a date marker line such as `Je. 17.07` or `Di. 3`
    pub fn date_marker(&self, line: &str) -> Option<(u32, Option<u32>)> {
        let caps = self.date_re.captures(line.trim())?;
        let day: u32 = caps.get(1)?.as_str().parse().ok()?;
        if !(1..=31).contains(&day) {
            return None;
        }
        match caps.get(2) {
            Some(m) => {
                let month: u32 = m.as_str().parse().ok()?;
                (1..=12).contains(&month).then_some((day, Some(month)))
            }
            None => Some((day, None)),
        }
    }

    /// Venue lines start with a configured keyword, matched case-sensitively
    /// so that performer names such as `Medranoff` stay content.
    pub fn is_venue_line(&self, line: &str) -> bool {
        let line = line.trim();
        self.venue_keywords.iter().any(|v| line.starts_with(v.as_str()))
    }

    /// Line index of the tag closing the block opened at `start`.
    ///
    /// A block is unterminated when another opening tag, a date marker or a
    /// time marker comes before its closing tag.
    fn block_end(&self, lines: &[&str], start: usize) -> Option<usize> {
        let first = lines[start].trim();
        if let Some(pos) = first.find(METADATA_OPEN) {
            if first[pos..].contains(METADATA_CLOSE) {
                return Some(start);
            }
        }
        for (j, raw) in lines.iter().enumerate().skip(start + 1) {
            let line = raw.trim();
            if line.contains(METADATA_CLOSE) {
                return Some(j);
            }
            if line.contains(METADATA_OPEN)
                || time_marker(line).is_some()
                || self.date_marker(line).is_some()
            {
                return None;
            }
        }
        None
    }

    /// Lines that may trail a performance without belonging to it
    fn is_filler(&self, line: &str) -> bool {
        let line = line.trim();
        line.is_empty() || is_page_marker(line) || self.is_venue_line(line)
    }

    fn close(&self, window: OpenWindow, end: usize, lines: &[&str]) -> ScheduleWindow {
        // Text after a date marker inside the window belongs to the next day.
        let limit = window
            .first_date_marker
            .map(|d| d.saturating_sub(1).max(window.start))
            .unwrap_or(end);
        let mut anchor = limit;
        while anchor > window.start && self.is_filler(lines[anchor]) {
            anchor -= 1;
        }

        ScheduleWindow {
            start_line: window.start,
            end_line: end,
            anchor_line: anchor,
            date: window.date,
            time: window.time,
            end_time: window.end_time,
            venue: window.venue,
            content: window.content.join(" "),
            has_metadata: window.has_metadata,
        }
    }

    pub fn parse_lines(&self, lines: &[&str]) -> Vec<ScheduleWindow> {
        let mut dates = DateState::new(self.default_month);
        let mut current_venue: Option<String> = None;
        let mut open: Option<OpenWindow> = None;
        let mut windows = Vec::new();
        let mut block_until: Option<usize> = None;

        for (i, raw) in lines.iter().enumerate() {
            let line = raw.trim();

            if block_until.is_some_and(|end| i <= end) {
                continue;
            }
            if line.contains(METADATA_OPEN) {
                match self.block_end(lines, i) {
                    Some(end) => {
                        block_until = Some(end);
                        if let Some(w) = open.as_mut() {
                            w.has_metadata = true;
                        }
                    }
                    None => warn!(line = i + 1, "Unterminated metadata block, tag ignored"),
                }
                continue;
            }
            if line.contains(METADATA_CLOSE) {
                continue;
            }

            if let Some((day, month)) = self.date_marker(line) {
                dates.apply(day, month, &self.config);
                current_venue = None;
                if let Some(w) = open.as_mut() {
                    w.first_date_marker.get_or_insert(i);
                }
                continue;
            }

            if let Some((time, end_time)) = time_marker(line) {
                if let Some(prev) = open.take() {
                    windows.push(self.close(prev, i - 1, lines));
                }
                open = Some(OpenWindow {
                    start: i,
                    date: dates.current_date.clone(),
                    time,
                    end_time,
                    venue: current_venue.clone(),
                    content: Vec::new(),
                    has_metadata: false,
                    first_date_marker: None,
                });
                continue;
            }

            if self.is_venue_line(line) {
                current_venue = Some(line.to_string());
                continue;
            }

            if let Some(w) = open.as_mut() {
                let collecting = w.first_date_marker.is_none()
                    && w.content.len() < self.config.content_lines;
                if collecting && !line.is_empty() && !is_page_marker(line) {
                    w.content.push(line.to_string());
                }
            }
        }

        if let Some(last) = open.take() {
            windows.push(self.close(last, lines.len() - 1, lines));
        }

        debug!(
            "Windows without date: {}",
            windows.iter().filter(|w| w.date.is_none()).count()
        );
        info!(
            "Parsed {} schedule windows ({} already annotated)",
            windows.len(),
            windows.iter().filter(|w| w.has_metadata).count()
        );
        windows
    }

    /// Number of date-marker and time-marker lines, for statistics reports
    pub fn count_markers(&self, lines: &[&str]) -> (usize, usize) {
        lines.iter().fold((0, 0), |(dates, times), line| {
            (
                dates + usize::from(self.date_marker(line).is_some()),
                times + usize::from(time_marker(line).is_some()),
            )
        })
    }
}

impl LineParser for ScheduleParser {
    type Output = ScheduleWindow;

    fn parse(&self, text: &str) -> Vec<ScheduleWindow> {
        self.parse_lines(&split_lines(text))
    }
}

/// Parses schedule text into windows
pub fn parse_schedule(text: &str, config: &LinkerConfig) -> Result<Vec<ScheduleWindow>> {
    Ok(ScheduleParser::new(config)?.parse(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinkerError;

    fn parse(text: &str) -> Vec<ScheduleWindow> {
        parse_schedule(text, &LinkerConfig::default()).unwrap()
    }

    #[test]
    fn test_single_window_before_next_time_line() {
        let windows = parse("Je. 17.07\nEGLISE\n11:00-13:00\nSome Concert\n15:00-16:00\n");
        assert_eq!(windows.len(), 2);
        let first = &windows[0];
        assert_eq!(first.start_line, 2);
        assert_eq!(first.end_line, 3);
        assert_eq!(first.date.as_deref(), Some("17.07"));
        assert_eq!(first.time, "11:00");
        assert_eq!(first.end_time.as_deref(), Some("13:00"));
        assert_eq!(first.venue.as_deref(), Some("EGLISE"));
        assert_eq!(first.content, "Some Concert");
        assert!(!first.has_metadata);
    }

    #[test]
    fn test_windows_ascend_and_do_not_overlap() {
        let text = "\
Intro text
Je. 17.07
EGLISE
11:00-13:00
Recital A
Piano
SALLE DES COMBINS
18:30 - 20:30
Orchestra B
Ve. 18.07
EGLISE
9:30 - 10:30
Masterclass C
";
        let windows = parse(text);
        assert_eq!(windows.len(), 3);
        for pair in windows.windows(2) {
            assert!(pair[0].start_line < pair[1].start_line);
            assert!(pair[0].end_line < pair[1].start_line);
        }
        assert_eq!(windows[1].venue.as_deref(), Some("SALLE DES COMBINS"));
        assert_eq!(windows[2].date.as_deref(), Some("18.07"));
        assert_eq!(windows[2].time, "09:30");
        // The last window runs to end of file.
        assert_eq!(windows[2].end_line, 12);
    }

    #[test]
    fn test_anchor_stops_before_trailing_markers() {
        let text = "\
Je. 17.07
11:00-13:00
Recital A

SALLE DES COMBINS
18:30-20:30
Orchestra B
Ve. 18.07
EGLISE
11:00-12:00
";
        let windows = parse(text);
        assert_eq!(windows[0].end_line, 4);
        assert_eq!(windows[0].anchor_line, 2);
        assert_eq!(windows[1].end_line, 8);
        assert_eq!(windows[1].anchor_line, 6);
        assert_eq!(windows[1].content, "Orchestra B");
    }

    #[test]
    fn test_month_less_days_roll_over() {
        let text = "Je. 31\n11:00-12:00\nA\nVe. 1\n11:00-12:00\nB\n";
        let windows = parse(text);
        assert_eq!(windows[0].date.as_deref(), Some("31.07"));
        assert_eq!(windows[1].date.as_deref(), Some("01.08"));
    }

    #[test]
    fn test_day_override_table() {
        let mut config = LinkerConfig::default();
        config.day_overrides.insert("2".to_string(), "02.09".to_string());
        let windows = parse_schedule("Sa. 2\n19:30-21:00\nGala\n", &config).unwrap();
        assert_eq!(windows[0].date.as_deref(), Some("02.09"));
    }

    #[test]
    fn test_time_before_any_date_has_no_date() {
        let windows = parse("10:00-11:00\nWarm-up\n");
        assert_eq!(windows.len(), 1);
        assert!(windows[0].date.is_none());
    }

    #[test]
    fn test_existing_metadata_is_detected_and_kept_out_of_content() {
        let text = "\
Je. 17.07
11:00-13:00
Recital A

[EVENT_METADATA]
Event_URL: https://www.verbierfestival.com/en/show/vf25-07-17-1100/
Booking_URL: https://ticketing.verbierfestival.com/selection/event/seat?perfId=1&productId=2
[/EVENT_METADATA]
15:00-16:00
Recital B
";
        let windows = parse(text);
        assert!(windows[0].has_metadata);
        assert_eq!(windows[0].content, "Recital A");
        assert!(!windows[1].has_metadata);
    }

    #[test]
    fn test_content_is_capped() {
        let mut config = LinkerConfig::default();
        config.content_lines = 2;
        let windows =
            parse_schedule("11:00-12:00\none\n\ntwo\n--- Page 3 ---\nthree\n", &config).unwrap();
        assert_eq!(windows[0].content, "one two");
    }

    #[test]
    fn test_count_markers() {
        let parser = ScheduleParser::new(&LinkerConfig::default()).unwrap();
        let lines = vec!["Je. 17.07", "11:00-13:00", "text", "Ve. 18.07", "12:00 - 13:00"];
        assert_eq!(parser.count_markers(&lines), (2, 2));
    }

    #[test]
    fn test_mixed_case_text_is_not_a_venue() {
        let text = "Je. 17.07\nEGLISE\n11:00-13:00\nMedranoff Quartet\nStudio recital of Bach\n";
        let windows = parse(text);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].venue.as_deref(), Some("EGLISE"));
        assert_eq!(windows[0].content, "Medranoff Quartet Studio recital of Bach");
        assert_eq!(windows[0].anchor_line, 4);
    }

    #[test]
    fn test_unterminated_block_does_not_hide_later_windows() {
        let text = "\
Je. 17.07
11:00-12:00
Recital A
[EVENT_METADATA]
Event_URL: https://www.verbierfestival.com/en/show/vf25-07-17-1100/
15:00-16:00
Recital B
18:00-19:00
Recital C
";
        let windows = parse(text);
        assert_eq!(windows.len(), 3);
        assert!(windows.iter().all(|w| !w.has_metadata));
        assert_eq!(windows[1].time, "15:00");
        assert_eq!(windows[1].content, "Recital B");
        assert_eq!(windows[2].content, "Recital C");
    }

    #[test]
    fn test_closed_block_after_unterminated_one_still_counts() {
        let text = "\
11:00-12:00
A
[EVENT_METADATA]
15:00-16:00
B
[EVENT_METADATA]
Event_URL: https://www.verbierfestival.com/en/show/vf25-07-17-1500/
[/EVENT_METADATA]
";
        let windows = parse(text);
        assert_eq!(windows.len(), 2);
        assert!(!windows[0].has_metadata);
        assert!(windows[1].has_metadata);
        assert_eq!(windows[1].content, "B");
    }

    #[test]
    fn test_invalid_default_month_is_config_error() {
        let mut config = LinkerConfig::default();
        config.default_month = "13".to_string();
        let err = ScheduleParser::new(&config).err().unwrap();
        assert!(matches!(err, LinkerError::Config(_)));
        assert!(parse_schedule("11:00-12:00\nA\n", &config).is_err());
    }
}
