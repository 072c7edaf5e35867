use crate::config::{ContentRule, LinkerConfig};
use crate::metrics::LinkerMetrics;
use crate::types::{Association, MatchTier, ScheduleWindow, TicketRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Whether a ticket record may be assigned to more than one window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Every window sees every record; a record can be assigned repeatedly
    #[default]
    Greedy,
    /// A record leaves the candidate pool once assigned
    Exclusive,
}

/// Three-tier matcher: exact date+time, date with hour within one, then content rules.
pub struct Matcher {
    rules: Vec<ContentRule>,
}

impl Matcher {
    pub fn new(config: &LinkerConfig) -> Self {
        let rules = config
            .content_rules
            .iter()
            .map(|rule| ContentRule {
                content_keywords: rule
                    .content_keywords
                    .iter()
                    .map(|k| k.to_lowercase())
                    .collect(),
                url_keyword: rule.url_keyword.to_lowercase(),
            })
            .collect();
        Self { rules }
    }

    /// Best record for `window`, tiers tried in strict priority order
    pub fn find_match(
        &self,
        window: &ScheduleWindow,
        records: &[TicketRecord],
    ) -> Option<(usize, MatchTier)> {
        self.find_match_among(window, records, |_| true)
    }

    fn find_match_among<F>(
        &self,
        window: &ScheduleWindow,
        records: &[TicketRecord],
        available: F,
    ) -> Option<(usize, MatchTier)>
    where
        F: Fn(usize) -> bool,
    {
        let available = &available;
        let candidates = move || {
            records
                .iter()
                .enumerate()
                .filter(move |(idx, _)| available(*idx))
        };

        if let Some(date) = window.date.as_deref() {
            let exact = candidates().find(|(_, r)| {
                r.date.as_deref() == Some(date) && r.time.as_deref() == Some(window.time.as_str())
            });
            if let Some((idx, _)) = exact {
                return Some((idx, MatchTier::Exact));
            }

            if let Some(hour) = window.hour() {
                let approx = candidates().find(|(_, r)| {
                    r.date.as_deref() == Some(date)
                        && r.hour().is_some_and(|h| h.abs_diff(hour) <= 1)
                });
                if let Some((idx, _)) = approx {
                    return Some((idx, MatchTier::Approximate));
                }
            }
        }

        let content = window.content.to_lowercase();
        candidates()
            .find(|(_, r)| {
                let Some(url) = r.event_url.as_deref() else {
                    return false;
                };
                let url = url.to_lowercase();
                self.rules.iter().any(|rule| {
                    url.contains(&rule.url_keyword)
                        && rule
                            .content_keywords
                            .iter()
                            .all(|k| content.contains(k.as_str()))
                })
            })
            .map(|(idx, _)| (idx, MatchTier::Content))
    }

    /// Matches every window not yet carrying metadata
    #[instrument(skip_all, fields(windows = windows.len(), records = records.len(), mode = ?mode))]
    pub fn match_all(
        &self,
        windows: &[ScheduleWindow],
        records: &[TicketRecord],
        mode: MatchMode,
    ) -> MatchOutcome {
        let mut used = vec![false; records.len()];
        let mut outcome = MatchOutcome::default();

        for (window_index, window) in windows.iter().enumerate() {
            if window.has_metadata {
                outcome.already_annotated.push(window_index);
                continue;
            }

            let found = match mode {
                MatchMode::Greedy => self.find_match(window, records),
                MatchMode::Exclusive => self.find_match_among(window, records, |idx| !used[idx]),
            };

            match found {
                Some((record_index, tier)) => {
                    debug!(
                        line = window.start_line + 1,
                        tier = %tier,
                        "Matched {:?} {} to {:?}",
                        window.date,
                        window.time,
                        records[record_index].event_url
                    );
                    LinkerMetrics::record_match(tier);
                    used[record_index] = true;
                    outcome.associations.push(Association {
                        window_index,
                        record_index,
                        tier,
                    });
                }
                None => outcome.unmatched_windows.push(window_index),
            }
        }

        outcome.unused_records = (0..records.len()).filter(|i| !used[*i]).collect();
        LinkerMetrics::record_unmatched(outcome.unmatched_windows.len());

        let stats = outcome.statistics(windows.len(), records.len());
        info!(
            "Matched {} windows (exact {}, approximate {}, content {}), {} unmatched, {} records reused",
            stats.matched,
            stats.exact,
            stats.approximate,
            stats.content,
            stats.unmatched_windows,
            stats.reused_records
        );
        outcome
    }
}

/// Result of matching all windows, as indices into the inputs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    pub associations: Vec<Association>,
    pub unmatched_windows: Vec<usize>,
    pub already_annotated: Vec<usize>,
    pub unused_records: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchStatistics {
    pub total_windows: usize,
    pub total_records: usize,
    pub matched: usize,
    pub exact: usize,
    pub approximate: usize,
    pub content: usize,
    pub unmatched_windows: usize,
    pub already_annotated: usize,
    pub unused_records: usize,
    /// Records assigned to more than one window
    pub reused_records: usize,
}

impl MatchOutcome {
    pub fn statistics(&self, total_windows: usize, total_records: usize) -> MatchStatistics {
        let tier_count = |tier: MatchTier| {
            self.associations
                .iter()
                .filter(|a| a.tier == tier)
                .count()
        };
        let mut uses: HashMap<usize, usize> = HashMap::new();
        for assoc in &self.associations {
            *uses.entry(assoc.record_index).or_default() += 1;
        }

        MatchStatistics {
            total_windows,
            total_records,
            matched: self.associations.len(),
            exact: tier_count(MatchTier::Exact),
            approximate: tier_count(MatchTier::Approximate),
            content: tier_count(MatchTier::Content),
            unmatched_windows: self.unmatched_windows.len(),
            already_annotated: self.already_annotated.len(),
            unused_records: self.unused_records.len(),
            reused_records: uses.values().filter(|n| **n > 1).count(),
        }
    }

    /// Self-contained report with the windows and records inlined
    pub fn to_report(&self, windows: &[ScheduleWindow], records: &[TicketRecord]) -> MatchReport {
        MatchReport {
            matched: self
                .associations
                .iter()
                .map(|a| MatchedPair {
                    window: windows[a.window_index].clone(),
                    record: records[a.record_index].clone(),
                    tier: a.tier,
                })
                .collect(),
            unmatched_windows: self
                .unmatched_windows
                .iter()
                .map(|i| windows[*i].clone())
                .collect(),
            unused_records: self
                .unused_records
                .iter()
                .map(|i| records[*i].clone())
                .collect(),
            statistics: self.statistics(windows.len(), records.len()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedPair {
    pub window: ScheduleWindow,
    pub record: TicketRecord,
    pub tier: MatchTier,
}

/// JSON side-file written by the `match` job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchReport {
    pub matched: Vec<MatchedPair>,
    pub unmatched_windows: Vec<ScheduleWindow>,
    pub unused_records: Vec<TicketRecord>,
    pub statistics: MatchStatistics,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(date: Option<&str>, time: &str, content: &str) -> ScheduleWindow {
        ScheduleWindow {
            start_line: 0,
            end_line: 0,
            anchor_line: 0,
            date: date.map(str::to_string),
            time: time.to_string(),
            end_time: None,
            venue: None,
            content: content.to_string(),
            has_metadata: false,
        }
    }

    fn record(url: &str, date: Option<&str>, time: Option<&str>) -> TicketRecord {
        TicketRecord {
            event_url: Some(url.to_string()),
            booking_url: Some(format!("{}?perfId=1&productId=2", url)),
            date: date.map(str::to_string),
            time: time.map(str::to_string),
        }
    }

    fn matcher() -> Matcher {
        Matcher::new(&LinkerConfig::default())
    }

    #[test]
    fn test_exact_beats_approximate() {
        let records = vec![
            record("https://x/approx", Some("17.07"), Some("18:00")),
            record("https://x/exact", Some("17.07"), Some("18:30")),
        ];
        let found = matcher().find_match(&window(Some("17.07"), "18:30", ""), &records);
        assert_eq!(found, Some((1, MatchTier::Exact)));
    }

    #[test]
    fn test_approximate_within_one_hour() {
        let records = vec![
            record("https://x/far", Some("17.07"), Some("15:00")),
            record("https://x/near", Some("17.07"), Some("20:00")),
        ];
        let m = matcher();
        assert_eq!(
            m.find_match(&window(Some("17.07"), "19:30", ""), &records),
            Some((1, MatchTier::Approximate))
        );
        assert_eq!(m.find_match(&window(Some("17.07"), "12:00", ""), &records), None);
        assert_eq!(m.find_match(&window(Some("18.07"), "20:00", ""), &records), None);
    }

    #[test]
    fn test_content_rule_requires_all_keywords() {
        let records = vec![
            record("https://x/show/lozakovich-moreau/", None, None),
            record("https://x/show/quatuor-ebene/", None, None),
        ];
        let m = matcher();
        assert_eq!(
            m.find_match(&window(None, "11:00", "QUATUOR ÉBENE ... Quatuor Ebene plays"), &records),
            Some((1, MatchTier::Content))
        );
        assert_eq!(
            m.find_match(&window(None, "11:00", "Quatuor Modigliani"), &records),
            None
        );
    }

    #[test]
    fn test_records_without_date_skip_time_tiers() {
        let records = vec![record("https://x/show/undated", None, Some("18:30"))];
        assert_eq!(
            matcher().find_match(&window(Some("17.07"), "18:30", "recital"), &records),
            None
        );
    }

    #[test]
    fn test_greedy_reuses_records() {
        let records = vec![record("https://x/a", Some("17.07"), Some("18:30"))];
        let windows = vec![
            window(Some("17.07"), "18:30", ""),
            window(Some("17.07"), "19:00", ""),
        ];
        let outcome = matcher().match_all(&windows, &records, MatchMode::Greedy);
        assert_eq!(outcome.associations.len(), 2);
        let stats = outcome.statistics(windows.len(), records.len());
        assert_eq!(stats.reused_records, 1);
        assert_eq!(stats.exact, 1);
        assert_eq!(stats.approximate, 1);
    }

    #[test]
    fn test_exclusive_consumes_records() {
        let records = vec![
            record("https://x/a", Some("17.07"), Some("18:30")),
            record("https://x/b", Some("17.07"), Some("19:30")),
        ];
        let windows = vec![
            window(Some("17.07"), "18:30", ""),
            window(Some("17.07"), "18:30", ""),
            window(Some("17.07"), "18:30", ""),
        ];
        let outcome = matcher().match_all(&windows, &records, MatchMode::Exclusive);
        assert_eq!(outcome.associations[0].record_index, 0);
        assert_eq!(outcome.associations[1].record_index, 1);
        assert_eq!(outcome.associations[1].tier, MatchTier::Approximate);
        assert_eq!(outcome.unmatched_windows, vec![2]);
        assert!(outcome.unused_records.is_empty());
    }

    #[test]
    fn test_annotated_windows_are_skipped() {
        let records = vec![record("https://x/a", Some("17.07"), Some("18:30"))];
        let mut annotated = window(Some("17.07"), "18:30", "");
        annotated.has_metadata = true;
        let outcome = matcher().match_all(&[annotated], &records, MatchMode::Greedy);
        assert!(outcome.associations.is_empty());
        assert_eq!(outcome.already_annotated, vec![0]);
        assert_eq!(outcome.unused_records, vec![0]);
    }
}
