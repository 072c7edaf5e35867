use crate::cleanup::{clean, render_header, RemovedBlock};
use crate::config::LinkerConfig;
use crate::error::Result;
use crate::injector::plan_annotations;
use crate::matcher::{MatchMode, MatchStatistics, Matcher};
use crate::metrics::LinkerMetrics;
use crate::parser::{extract_tickets, parse_schedule};
use crate::types::{ScheduleWindow, TicketRecord};
use crate::unmatched::find_unmatched;
use crate::validate::{validate, ValidationReport};
use chrono::Local;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Serialize)]
pub struct TicketsJobResult {
    pub records: usize,
    pub records_with_date: usize,
    pub output_file: String,
}

#[derive(Debug, Serialize)]
pub struct WindowsJobResult {
    pub windows: usize,
    pub windows_without_date: usize,
    pub already_annotated: usize,
    pub output_file: String,
}

#[derive(Debug, Serialize)]
pub struct MatchJobResult {
    pub statistics: MatchStatistics,
    pub output_file: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotateOptions {
    pub mode: MatchMode,
    /// Also insert placeholder blocks for windows without a match
    pub include_unmatched: bool,
}

#[derive(Debug, Serialize)]
pub struct AnnotateJobResult {
    pub statistics: MatchStatistics,
    pub inserted_blocks: usize,
    pub placeholder_blocks: usize,
    pub output_file: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanOptions {
    /// Copy the input next to itself before writing the output
    pub backup: bool,
    /// Prepend the configured comment header
    pub header: bool,
}

#[derive(Debug, Serialize)]
pub struct CleanJobResult {
    pub removed: Vec<RemovedBlock>,
    pub removed_broken: usize,
    pub removed_duplicates: usize,
    pub kept: usize,
    pub backup_file: Option<String>,
    pub output_file: String,
}

#[derive(Debug, Serialize)]
pub struct UnmatchedJobResult {
    pub unmatched: usize,
    pub listed: usize,
    pub output_file: String,
}

pub struct Pipeline;

impl Pipeline {
    fn load_tickets(path: &Path, config: &LinkerConfig) -> Result<Vec<TicketRecord>> {
        let text = fs::read_to_string(path)?;
        let records = extract_tickets(&text, config);
        LinkerMetrics::record_tickets_extracted(records.len());
        Ok(records)
    }

    fn load_windows(path: &Path, config: &LinkerConfig) -> Result<(String, Vec<ScheduleWindow>)> {
        let text = fs::read_to_string(path)?;
        let windows = parse_schedule(&text, config)?;
        LinkerMetrics::record_windows_parsed(windows.len());
        Ok((text, windows))
    }

    fn finish(job: &'static str, started: Instant) {
        let secs = started.elapsed().as_secs_f64();
        LinkerMetrics::record_job_duration(job, secs);
        debug!("Job {} finished in {:.3}s", job, secs);
    }

    /// Ticket listing -> JSON array of ticket records
    #[instrument(skip(config), fields(tickets = %tickets.display()))]
    pub fn extract_tickets(
        tickets: &Path,
        output: &Path,
        config: &LinkerConfig,
    ) -> Result<TicketsJobResult> {
        let started = Instant::now();
        info!("🎫 Extracting ticket records from {}", tickets.display());

        let records = Self::load_tickets(tickets, config)?;
        let output_file = Self::persist_to_json(&records, output)?;
        info!("💾 Saved {} records to {}", records.len(), output_file);

        Self::finish("tickets", started);
        Ok(TicketsJobResult {
            records: records.len(),
            records_with_date: records.iter().filter(|r| r.date.is_some()).count(),
            output_file,
        })
    }

    /// Schedule text -> JSON array of schedule windows
    #[instrument(skip(config), fields(schedule = %schedule.display()))]
    pub fn parse_windows(
        schedule: &Path,
        output: &Path,
        config: &LinkerConfig,
    ) -> Result<WindowsJobResult> {
        let started = Instant::now();
        info!("📅 Parsing schedule windows from {}", schedule.display());

        let (_, windows) = Self::load_windows(schedule, config)?;
        let output_file = Self::persist_to_json(&windows, output)?;
        info!("💾 Saved {} windows to {}", windows.len(), output_file);

        Self::finish("windows", started);
        Ok(WindowsJobResult {
            windows: windows.len(),
            windows_without_date: windows.iter().filter(|w| w.date.is_none()).count(),
            already_annotated: windows.iter().filter(|w| w.has_metadata).count(),
            output_file,
        })
    }

    /// Schedule + tickets -> JSON match report
    #[instrument(skip(config), fields(schedule = %schedule.display(), tickets = %tickets.display()))]
    pub fn match_events(
        schedule: &Path,
        tickets: &Path,
        output: &Path,
        mode: MatchMode,
        config: &LinkerConfig,
    ) -> Result<MatchJobResult> {
        let started = Instant::now();
        let records = Self::load_tickets(tickets, config)?;
        let (_, windows) = Self::load_windows(schedule, config)?;

        info!("🔗 Matching {} windows against {} records", windows.len(), records.len());
        let outcome = Matcher::new(config).match_all(&windows, &records, mode);
        let report = outcome.to_report(&windows, &records);
        let output_file = Self::persist_to_json(&report, output)?;
        info!("💾 Saved match report to {}", output_file);

        Self::finish("match", started);
        Ok(MatchJobResult {
            statistics: report.statistics,
            output_file,
        })
    }

    /// Schedule + tickets -> annotated schedule text
    #[instrument(skip(config, options), fields(schedule = %schedule.display(), tickets = %tickets.display()))]
    pub fn annotate(
        schedule: &Path,
        tickets: &Path,
        output: &Path,
        options: AnnotateOptions,
        config: &LinkerConfig,
    ) -> Result<AnnotateJobResult> {
        let started = Instant::now();
        let records = Self::load_tickets(tickets, config)?;
        let (text, windows) = Self::load_windows(schedule, config)?;

        let outcome = Matcher::new(config).match_all(&windows, &records, options.mode);
        let plan = plan_annotations(&windows, &records, &outcome, options.include_unmatched);
        let annotated = plan.apply_to_text(&text);
        LinkerMetrics::record_blocks_inserted(plan.len());

        let output_file = Self::write_text(output, &annotated)?;
        info!("✍️ Inserted {} blocks into {}", plan.len(), output_file);

        let statistics = outcome.statistics(windows.len(), records.len());
        if statistics.unmatched_windows > 0 && !options.include_unmatched {
            warn!(
                "{} windows left without a block",
                statistics.unmatched_windows
            );
        }

        Self::finish("annotate", started);
        Ok(AnnotateJobResult {
            inserted_blocks: plan.len(),
            placeholder_blocks: if options.include_unmatched {
                outcome.unmatched_windows.len()
            } else {
                0
            },
            statistics,
            output_file,
        })
    }

    /// Sibling path `<stem>_backup_before_cleaning.<ext>`
    pub fn backup_path(input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "schedule".to_string());
        let ext = input
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| "txt".to_string());
        input.with_file_name(format!("{}_backup_before_cleaning.{}", stem, ext))
    }

    /// Annotated text -> text without broken or duplicate blocks
    #[instrument(skip(config, options), fields(input = %input.display()))]
    pub fn clean(
        input: &Path,
        output: &Path,
        options: CleanOptions,
        config: &LinkerConfig,
    ) -> Result<CleanJobResult> {
        let started = Instant::now();
        let text = fs::read_to_string(input)?;

        let backup_file = if options.backup {
            let backup = Self::backup_path(input);
            fs::copy(input, &backup)?;
            info!("🗄️ Backup created: {}", backup.display());
            Some(backup.to_string_lossy().to_string())
        } else {
            None
        };

        info!("🧹 Cleaning {}", input.display());
        let result = clean(&text);
        let cleaned = if options.header {
            let mut with_header =
                render_header(&config.clean_title, &config.clean_note, &Local::now());
            if text.contains("\r\n") {
                with_header = with_header.replace('\n', "\r\n");
            }
            with_header.push_str(&result.text);
            with_header
        } else {
            result.text.clone()
        };
        let output_file = Self::write_text(output, &cleaned)?;
        info!("💾 Cleaned file saved to {}", output_file);

        Self::finish("clean", started);
        Ok(CleanJobResult {
            removed_broken: result.removed_broken(),
            removed_duplicates: result.removed_duplicates(),
            kept: result.kept,
            removed: result.removed,
            backup_file,
            output_file,
        })
    }

    /// Validation report, optionally also written as JSON
    #[instrument(skip(config), fields(input = %input.display()))]
    pub fn validate(
        input: &Path,
        json_output: Option<&Path>,
        config: &LinkerConfig,
    ) -> Result<ValidationReport> {
        let started = Instant::now();
        let text = fs::read_to_string(input)?;
        let report = validate(&text, config)?;
        if let Some(path) = json_output {
            let output_file = Self::persist_to_json(&report, path)?;
            info!("💾 Saved validation report to {}", output_file);
        }
        Self::finish("validate", started);
        Ok(report)
    }

    /// Annotated text -> plain-text listing of windows without blocks
    #[instrument(skip(config), fields(input = %input.display()))]
    pub fn list_unmatched(
        input: &Path,
        output: &Path,
        limit: usize,
        config: &LinkerConfig,
    ) -> Result<UnmatchedJobResult> {
        let started = Instant::now();
        let text = fs::read_to_string(input)?;
        let listing = find_unmatched(&text, config)?;
        let output_file = Self::write_text(output, &listing.render(limit))?;
        info!("💾 Saved unmatched listing to {}", output_file);

        Self::finish("unmatched", started);
        Ok(UnmatchedJobResult {
            unmatched: listing.events.len(),
            listed: listing.events.len().min(limit),
            output_file,
        })
    }

    fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn write_text(path: &Path, text: &str) -> Result<String> {
        Self::ensure_parent(path)?;
        fs::write(path, text)?;
        Ok(path.to_string_lossy().to_string())
    }

    /// Persist a serializable value as pretty JSON
    fn persist_to_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<String> {
        Self::ensure_parent(path)?;
        let json_content = serde_json::to_string_pretty(value)?;
        fs::write(path, json_content)?;
        Ok(path.to_string_lossy().to_string())
    }
}
