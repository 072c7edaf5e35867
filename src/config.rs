use crate::constants::{CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE};
use crate::error::{LinkerError, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Fixed date/time for an event page whose URL carries no date code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlOverride {
    /// Substring looked up in the event URL
    pub keyword: String,
    /// `DD.MM`
    pub date: String,
    /// `HH:MM`
    pub time: String,
}

/// Content-tier matching rule: every content keyword must occur in the window
/// text and the url keyword in the event URL (both compared lowercase).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRule {
    pub content_keywords: Vec<String>,
    pub url_keyword: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    /// Registrable domain shared by the `www.` and `ticketing.` hosts
    pub festival_domain: String,
    /// Month assumed for date markers without an explicit month
    pub default_month: String,
    /// Number of non-blank lines kept as a window's matching excerpt
    pub content_lines: usize,
    pub weekday_tokens: Vec<String>,
    pub venue_keywords: Vec<String>,
    /// Day number -> `DD.MM` for month-less date markers
    pub day_overrides: BTreeMap<String, String>,
    pub url_overrides: Vec<UrlOverride>,
    pub content_rules: Vec<ContentRule>,
    /// First line of the header written on a cleaned file
    pub clean_title: String,
    /// Comment lines written under the header of a cleaned file
    pub clean_note: Vec<String>,
}

fn url_override(keyword: &str, date: &str, time: &str) -> UrlOverride {
    UrlOverride {
        keyword: keyword.to_string(),
        date: date.to_string(),
        time: time.to_string(),
    }
}

fn content_rule(content_keywords: &[&str], url_keyword: &str) -> ContentRule {
    ContentRule {
        content_keywords: content_keywords.iter().map(|k| k.to_string()).collect(),
        url_keyword: url_keyword.to_string(),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            festival_domain: "verbierfestival.com".to_string(),
            default_month: "07".to_string(),
            content_lines: 5,
            weekday_tokens: strings(&[
                "Lu", "Ma", "Me", "Je", "Ve", "Sa", "Di", "Mon", "Tue", "Wed", "Thu", "Fri",
                "Sat", "Sun",
            ]),
            venue_keywords: strings(&[
                "EGLISE",
                "ÉGLISE",
                "SALLE DES COMBINS",
                "VICTORIA HALL",
                "MEDRAN",
                "CINÉMA",
                "JARDIN",
                "PLACE DU VILLAGE",
                "CHAPITEAU",
                "CHALET",
                "STUDIO",
                "CENTRE",
                "TENTE",
            ]),
            day_overrides: BTreeMap::new(),
            // Order matters: "academy-presents-iv" must be tried before "academy-presents-v".
            url_overrides: vec![
                url_override("quatuor-ebene", "31.07", "11:00"),
                url_override("academy-presents-iv", "31.07", "15:30"),
                url_override("rencontres-inedites-viii", "31.07", "19:30"),
                url_override("brad-mehldau", "31.07", "18:30"),
                url_override("academy-presents-v", "01.08", "11:00"),
                url_override("lozakovich-moreau", "01.08", "19:30"),
                url_override("vfco-currentzis", "01.08", "18:30"),
                url_override("vfjo-kochanovsky", "02.08", "11:00"),
                url_override("vfo-jarvi-buniatishvili", "02.08", "19:30"),
                url_override("talk-with-paavo", "03.08", "11:00"),
                url_override("closing-concert", "03.08", "19:30"),
            ],
            content_rules: vec![
                content_rule(&["quatuor", "ebene"], "quatuor-ebene"),
                content_rule(&["brad mehldau"], "brad-mehldau"),
                content_rule(&["lozakovich", "moreau"], "lozakovich-moreau"),
                content_rule(&["currentzis"], "currentzis"),
                content_rule(&["closing", "yo-yo ma"], "closing-concert"),
            ],
            clean_title: "VERBIER FESTIVAL DATA".to_string(),
            clean_note: strings(&[
                "Note: This contains historical data from the 2024 festival.",
                "Booking URLs will show errors as the events have already occurred.",
                "This is expected behavior for the demo application.",
            ]),
        }
    }
}

impl LinkerConfig {
    /// Resolves the config file and loads it, falling back to built-in defaults.
    ///
    /// Lookup order: explicit path, `SCHEDULE_LINKER_CONFIG`, `schedule_linker.toml`
    /// in the working directory.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let resolved = match path {
            Some(p) => Some(p.to_path_buf()),
            None => match std::env::var(CONFIG_ENV_VAR) {
                Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v.trim())),
                _ => {
                    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                    local.exists().then_some(local)
                }
            },
        };

        match resolved {
            Some(p) => Self::from_file(&p),
            None => {
                debug!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            LinkerError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: LinkerConfig = toml::from_str(content)?;
        config.validate()?;
        config.default_month = format!("{:02}", parse_month(&config.default_month)?);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        parse_month(&self.default_month)?;

        if self.content_lines == 0 {
            return Err(LinkerError::Config(
                "content_lines must be at least 1".to_string(),
            ));
        }
        if self.weekday_tokens.is_empty() {
            return Err(LinkerError::Config(
                "weekday_tokens must not be empty".to_string(),
            ));
        }

        for ov in &self.url_overrides {
            if ov.keyword.trim().is_empty() {
                return Err(LinkerError::Config("url override with empty keyword".to_string()));
            }
            check_date(&ov.date)?;
            NaiveTime::parse_from_str(&ov.time, "%H:%M").map_err(|_| {
                LinkerError::Config(format!(
                    "url override '{}' has invalid time '{}'",
                    ov.keyword, ov.time
                ))
            })?;
        }

        for (day, date) in &self.day_overrides {
            day.trim().parse::<u32>().map_err(|_| {
                LinkerError::Config(format!("day override key '{}' is not a day number", day))
            })?;
            check_date(date)?;
        }

        for rule in &self.content_rules {
            if rule.content_keywords.is_empty() || rule.url_keyword.trim().is_empty() {
                return Err(LinkerError::Config(format!(
                    "content rule for '{}' needs content keywords and a url keyword",
                    rule.url_keyword
                )));
            }
        }

        Ok(())
    }

    /// Month assumed before the first date marker that names one
    pub fn month(&self) -> Result<u32> {
        parse_month(&self.default_month)
    }

    /// Looks up a month-less day number in `day_overrides`
    pub fn day_override(&self, day: u32) -> Option<&str> {
        self.day_overrides
            .iter()
            .find(|(k, _)| k.trim().parse::<u32>().ok() == Some(day))
            .map(|(_, v)| v.as_str())
    }

    pub fn event_host(&self) -> String {
        format!("www.{}", self.festival_domain)
    }

    pub fn booking_host(&self) -> String {
        format!("ticketing.{}", self.festival_domain)
    }
}

fn parse_month(month: &str) -> Result<u32> {
    match month.trim().parse::<u32>() {
        Ok(m) if (1..=12).contains(&m) => Ok(m),
        _ => Err(LinkerError::Config(format!("invalid month '{}'", month))),
    }
}

fn check_date(date: &str) -> Result<()> {
    let valid = date
        .split_once('.')
        .and_then(|(d, m)| Some((d.parse::<u32>().ok()?, m.parse::<u32>().ok()?)))
        .map(|(d, m)| date.len() == 5 && (1..=31).contains(&d) && (1..=12).contains(&m))
        .unwrap_or(false);
    if valid {
        Ok(())
    } else {
        Err(LinkerError::Config(format!(
            "invalid date '{}', expected DD.MM",
            date
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = LinkerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.url_overrides.len(), 11);
        assert_eq!(config.content_rules.len(), 5);
        assert_eq!(config.booking_host(), "ticketing.verbierfestival.com");
        assert_eq!(config.month().unwrap(), 7);
        assert_eq!(
            config.clean_note.last().map(String::as_str),
            Some("This is expected behavior for the demo application.")
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LinkerConfig::from_toml_str(
            r#"
            festival_domain = "example.org"
            default_month = "8"
            "#,
        )
        .unwrap();
        assert_eq!(config.festival_domain, "example.org");
        assert_eq!(config.default_month, "08");
        assert_eq!(config.content_lines, 5);
        assert!(!config.url_overrides.is_empty());
    }

    #[test]
    fn test_override_tables_from_toml() {
        let config = LinkerConfig::from_toml_str(
            r#"
            [[url_overrides]]
            keyword = "gala-night"
            date = "05.08"
            time = "20:00"

            [[content_rules]]
            content_keywords = ["gala"]
            url_keyword = "gala-night"

            [day_overrides]
            "1" = "01.08"
            "#,
        )
        .unwrap();
        assert_eq!(config.url_overrides.len(), 1);
        assert_eq!(config.url_overrides[0].keyword, "gala-night");
        assert_eq!(config.content_rules[0].content_keywords, vec!["gala"]);
        assert_eq!(config.day_override(1), Some("01.08"));
        assert_eq!(config.day_override(2), None);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(LinkerConfig::from_toml_str("default_month = \"13\"").is_err());
        assert!(LinkerConfig::from_toml_str(
            r#"
            [[url_overrides]]
            keyword = "x"
            date = "2025-08-01"
            time = "20:00"
            "#
        )
        .is_err());
        assert!(LinkerConfig::from_toml_str(
            r#"
            [[content_rules]]
            content_keywords = []
            url_keyword = "x"
            "#
        )
        .is_err());
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "content_lines = 3").unwrap();
        let config = LinkerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.content_lines, 3);
    }

    #[test]
    fn test_missing_explicit_path_is_config_error() {
        let err = LinkerConfig::load(Some(Path::new("/nonexistent/linker.toml"))).unwrap_err();
        assert!(matches!(err, LinkerError::Config(_)));
    }
}
