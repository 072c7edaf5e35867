use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use schedule_linker::logging;
use schedule_linker::pipeline::{AnnotateOptions, CleanOptions, Pipeline};
use schedule_linker::validate::ValidationReport;
use schedule_linker::{LinkerConfig, MatchMode};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "schedule_linker")]
#[command(about = "Links festival schedule text to event and booking pages")]
#[command(version = "0.1.0")]
struct Cli {
    /// TOML config file (defaults: $SCHEDULE_LINKER_CONFIG, ./schedule_linker.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract ticket records from the ticket listing
    Tickets {
        #[arg(long)]
        tickets: PathBuf,
        #[arg(long, default_value = "output/tickets.json")]
        output: PathBuf,
    },
    /// Parse the schedule into performance windows
    Windows {
        #[arg(long)]
        schedule: PathBuf,
        #[arg(long, default_value = "output/windows.json")]
        output: PathBuf,
    },
    /// Match windows to ticket records and write the match report
    Match {
        #[arg(long)]
        schedule: PathBuf,
        #[arg(long)]
        tickets: PathBuf,
        /// Assign each ticket record to at most one window
        #[arg(long)]
        exclusive: bool,
        #[arg(long, default_value = "output/matches.json")]
        output: PathBuf,
    },
    /// Write the schedule with metadata blocks inserted
    Annotate {
        #[arg(long)]
        schedule: PathBuf,
        #[arg(long)]
        tickets: PathBuf,
        /// Assign each ticket record to at most one window
        #[arg(long)]
        exclusive: bool,
        /// Insert placeholder blocks for windows without a match
        #[arg(long)]
        include_unmatched: bool,
        #[arg(long)]
        output: PathBuf,
    },
    /// Remove broken and duplicate metadata blocks
    Clean {
        #[arg(long)]
        input: PathBuf,
        /// Copy the input to <stem>_backup_before_cleaning.<ext> first
        #[arg(long)]
        backup: bool,
        /// Prepend the configured comment header
        #[arg(long)]
        header: bool,
        #[arg(long)]
        output: PathBuf,
    },
    /// Report on the metadata blocks of an annotated schedule
    Validate {
        #[arg(long)]
        input: PathBuf,
        /// Also write the report as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// List schedule windows that still have no metadata block
    Unmatched {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value = "output/unmatched_events.txt")]
        output: PathBuf,
    },
}

fn match_mode(exclusive: bool) -> MatchMode {
    if exclusive {
        MatchMode::Exclusive
    } else {
        MatchMode::Greedy
    }
}

fn print_report(report: &ValidationReport) {
    let rule = "=".repeat(80);
    println!("{}", rule);
    println!("SCHEDULE METADATA VALIDATION");
    println!("{}", rule);

    println!("\n📊 Blocks: {} ({} placeholders)", report.total_blocks, report.placeholder_blocks);

    let events = &report.event_urls;
    println!("\n🔗 Event URLs: {}", events.total);
    println!("   Standard show ids: {}", events.show_ids.standard);
    println!("   Show ids with suffix: {}", events.show_ids.with_suffix);
    println!("   Special show ids: {}", events.show_ids.special);

    let booking = &report.booking_urls;
    println!("\n🎟️  Booking URLs: {}", booking.total);
    println!("   With perfId: {}", booking.with_perf_id);
    println!("   With productId: {}", booking.with_product_id);
    println!("   Complete: {}", booking.complete);
    println!("   Incomplete: {}", booking.incomplete);

    if let Some(range) = &report.date_range {
        println!("\n📅 Dates: {} to {} ({} unique)", range.first, range.last, range.unique_dates);
    }

    let schedule = &report.schedule;
    println!("\n🗓️  Schedule:");
    println!("   Date markers: {}", schedule.date_markers);
    println!("   Time markers: {}", schedule.time_markers);
    println!("   Windows: {}", schedule.windows);
    println!("   Windows with metadata: {}", schedule.windows_with_metadata);

    let problems = report.problems();
    if problems.is_empty() {
        println!("\n✅ No problems found");
    } else {
        println!("\n⚠️  {} problems:", problems.len());
        for problem in &problems {
            println!("   - {}", problem);
        }
    }
    println!("{}", rule);
}

fn main() -> Result<()> {
    logging::init_logging();

    let cli = Cli::parse();
    let config = LinkerConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::Tickets { tickets, output } => {
            let result = Pipeline::extract_tickets(&tickets, &output, &config)
                .with_context(|| format!("Failed to extract tickets from {}", tickets.display()))?;
            println!("\n📊 Ticket records: {}", result.records);
            println!("   With date: {}", result.records_with_date);
            println!("   Output file: {}", result.output_file);
        }
        Commands::Windows { schedule, output } => {
            let result = Pipeline::parse_windows(&schedule, &output, &config)
                .with_context(|| format!("Failed to parse schedule {}", schedule.display()))?;
            println!("\n📊 Schedule windows: {}", result.windows);
            println!("   Without date: {}", result.windows_without_date);
            println!("   Already annotated: {}", result.already_annotated);
            println!("   Output file: {}", result.output_file);
        }
        Commands::Match {
            schedule,
            tickets,
            exclusive,
            output,
        } => {
            let result =
                Pipeline::match_events(&schedule, &tickets, &output, match_mode(exclusive), &config)
                    .with_context(|| format!("Failed to match {}", schedule.display()))?;
            let stats = &result.statistics;
            println!("\n📊 Match results:");
            println!("   Windows: {}", stats.total_windows);
            println!("   Matched: {}", stats.matched);
            println!("     Exact: {}", stats.exact);
            println!("     Approximate: {}", stats.approximate);
            println!("     Content: {}", stats.content);
            println!("   Unmatched: {}", stats.unmatched_windows);
            println!("   Unused records: {}", stats.unused_records);
            println!("   Output file: {}", result.output_file);
        }
        Commands::Annotate {
            schedule,
            tickets,
            exclusive,
            include_unmatched,
            output,
        } => {
            let options = AnnotateOptions {
                mode: match_mode(exclusive),
                include_unmatched,
            };
            let result = Pipeline::annotate(&schedule, &tickets, &output, options, &config)
                .with_context(|| format!("Failed to annotate {}", schedule.display()))?;
            println!("\n📊 Annotation results:");
            println!("   Matched windows: {}", result.statistics.matched);
            println!("   Unmatched windows: {}", result.statistics.unmatched_windows);
            println!("   Already annotated: {}", result.statistics.already_annotated);
            println!("   Blocks inserted: {}", result.inserted_blocks);
            println!("   Placeholder blocks: {}", result.placeholder_blocks);
            if result.statistics.reused_records > 0 {
                warn!(
                    "{} ticket records were assigned to more than one window",
                    result.statistics.reused_records
                );
            }
            println!("   Output file: {}", result.output_file);
        }
        Commands::Clean {
            input,
            backup,
            header,
            output,
        } => {
            let result =
                Pipeline::clean(&input, &output, CleanOptions { backup, header }, &config)
                    .with_context(|| format!("Failed to clean {}", input.display()))?;
            if let Some(backup_file) = &result.backup_file {
                println!("✅ Backup created: {}", backup_file);
            }
            for removed in &result.removed {
                println!(
                    "  ❌ Removing {} block at line {}: {}",
                    removed.reason,
                    removed.line,
                    removed.event_url.as_deref().unwrap_or("-")
                );
            }
            println!("\n📊 Cleaning summary:");
            println!("   Broken URLs removed: {}", result.removed_broken);
            println!("   Duplicates removed: {}", result.removed_duplicates);
            println!("   Blocks remaining: {}", result.kept);
            println!("   Output file: {}", result.output_file);
        }
        Commands::Validate { input, json } => {
            let report = Pipeline::validate(&input, json.as_deref(), &config)
                .with_context(|| format!("Failed to validate {}", input.display()))?;
            print_report(&report);
        }
        Commands::Unmatched {
            input,
            limit,
            output,
        } => {
            let result = Pipeline::list_unmatched(&input, &output, limit, &config)
                .with_context(|| format!("Failed to list unmatched events in {}", input.display()))?;
            println!("\n📊 Unmatched events: {}", result.unmatched);
            println!("   Listed: {}", result.listed);
            println!("   Output file: {}", result.output_file);
        }
    }

    info!("Done");
    Ok(())
}
