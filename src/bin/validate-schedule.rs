use anyhow::{Context, Result};
use clap::Parser;
use schedule_linker::validate::validate;
use schedule_linker::LinkerConfig;
use std::{fs, path::PathBuf};

/// Check the metadata blocks of an annotated schedule.
#[derive(Parser, Debug)]
#[command(name = "validate-schedule", version, about = "Check metadata blocks of an annotated schedule")]
struct Cli {
    /// Path to the annotated schedule text
    path: PathBuf,

    /// Optional TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let config = LinkerConfig::load(args.config.as_deref()).context("Failed to load config")?;

    let text = fs::read_to_string(&args.path)
        .with_context(|| format!("Failed to read {}", args.path.display()))?;
    let report = validate(&text, &config)
        .with_context(|| format!("Failed to validate {}", args.path.display()))?;

    if report.is_clean() {
        println!("valid");
        Ok(())
    } else {
        eprintln!("invalid:");
        for problem in report.problems() {
            eprintln!("- {}", problem);
        }
        std::process::exit(1)
    }
}
