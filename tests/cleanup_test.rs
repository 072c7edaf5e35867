use anyhow::Result;
use schedule_linker::cleanup::RemovalReason;
use schedule_linker::pipeline::{CleanOptions, Pipeline};
use schedule_linker::LinkerConfig;
use std::fs;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

const ANNOTATED: &str = "\
Je. 17.07
EGLISE
11:00-13:00
Recital A

[EVENT_METADATA]
Event_URL: https://www.verbierfestival.com/en/show/vf25-07-17-1100/
Booking_URL: https://ticketing.verbierfestival.com/selection/event/seat?perfId=1&productId=11
[/EVENT_METADATA]
15:00-16:00
Recital A again

[EVENT_METADATA]
Event_URL: https://www.verbierfestival.com/en/show/vf25-07-17-1100/
Booking_URL: https://ticketing.verbierfestival.com/selection/event/seat?perfId=1&productId=11
[/EVENT_METADATA]
18:30-20:30
Opening Concert

[EVENT_METADATA]
Event_URL: https://www.verbierfestival.com/en/show/vf25-07-17-1830/
Booking_URL: https://ticketing.verbierfestival.com/selection/event/seat?perfId=2
[/EVENT_METADATA]
21:00-22:00
Late Recital

[EVENT_METADATA]
Event_URL: https://www.verbierfestival.com/en/show/vf25-07-17-2100/
Booking_URL: https://ticketing.verbierfestival.com/selection/event/seat?perfId=4&productId=44
[/EVENT_METADATA]
";

const CLEANED: &str = "\
Je. 17.07
EGLISE
11:00-13:00
Recital A

[EVENT_METADATA]
Event_URL: https://www.verbierfestival.com/en/show/vf25-07-17-1100/
Booking_URL: https://ticketing.verbierfestival.com/selection/event/seat?perfId=1&productId=11
[/EVENT_METADATA]
15:00-16:00
Recital A again
18:30-20:30
Opening Concert
21:00-22:00
Late Recital

[EVENT_METADATA]
Event_URL: https://www.verbierfestival.com/en/show/vf25-07-17-2100/
Booking_URL: https://ticketing.verbierfestival.com/selection/event/seat?perfId=4&productId=44
[/EVENT_METADATA]
";

#[test]
fn test_clean_job_removes_broken_and_duplicate_blocks() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("verbier.txt");
    let output = dir.path().join("verbier_clean.txt");
    fs::write(&input, ANNOTATED)?;

    let result = Pipeline::clean(&input, &output, CleanOptions::default(), &LinkerConfig::default())?;
    assert_eq!(result.removed_broken, 1);
    assert_eq!(result.removed_duplicates, 1);
    assert_eq!(result.kept, 2);
    assert!(result.backup_file.is_none());
    assert_eq!(result.removed[0].reason, RemovalReason::Duplicate);
    assert_eq!(result.removed[0].line, 13);
    assert_eq!(result.removed[1].reason, RemovalReason::BrokenBooking);

    assert_eq!(fs::read_to_string(&output)?, CLEANED);
    // The input is left untouched.
    assert_eq!(fs::read_to_string(&input)?, ANNOTATED);
    Ok(())
}

#[test]
fn test_clean_job_backup_and_header() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("verbier.txt");
    let output = dir.path().join("verbier_clean.txt");
    fs::write(&input, ANNOTATED)?;

    let options = CleanOptions {
        backup: true,
        header: true,
    };
    let result = Pipeline::clean(&input, &output, options, &LinkerConfig::default())?;

    let backup = dir.path().join("verbier_backup_before_cleaning.txt");
    assert_eq!(result.backup_file, Some(backup.to_string_lossy().to_string()));
    assert_eq!(fs::read_to_string(&backup)?, ANNOTATED);

    let cleaned = fs::read_to_string(&output)?;
    assert!(cleaned.starts_with("# VERBIER FESTIVAL DATA\n# Cleaned on "));
    assert!(cleaned.contains("# Note: This contains historical data from the 2024 festival.\n"));
    assert!(cleaned.contains(
        "# Booking URLs will show errors as the events have already occurred.\n\
         # This is expected behavior for the demo application.\n\n"
    ));
    assert!(cleaned.ends_with(CLEANED));
    Ok(())
}

#[test]
fn test_second_clean_pass_removes_nothing() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("schedule.txt");
    let first = dir.path().join("first.txt");
    let second = dir.path().join("second.txt");
    fs::write(&input, ANNOTATED)?;
    let config = LinkerConfig::default();

    Pipeline::clean(&input, &first, CleanOptions::default(), &config)?;
    let result = Pipeline::clean(&first, &second, CleanOptions::default(), &config)?;

    assert!(result.removed.is_empty());
    assert_eq!(fs::read_to_string(&first)?, fs::read_to_string(&second)?);
    Ok(())
}

#[test]
fn test_clean_header_from_config_file() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("schedule.txt");
    let output = dir.path().join("clean.txt");
    fs::write(&input, ANNOTATED)?;

    let mut config_file = NamedTempFile::new()?;
    writeln!(config_file, "clean_title = \"TEST DATA\"")?;
    writeln!(config_file, "clean_note = [\"Demo only.\"]")?;
    let config = LinkerConfig::load(Some(config_file.path()))?;

    let options = CleanOptions {
        backup: false,
        header: true,
    };
    Pipeline::clean(&input, &output, options, &config)?;

    let cleaned = fs::read_to_string(&output)?;
    let header: Vec<&str> = cleaned.lines().take(4).collect();
    assert_eq!(header[0], "# TEST DATA");
    assert!(header[1].starts_with("# Cleaned on "));
    assert_eq!(header[2], "# Demo only.");
    assert_eq!(header[3], "");
    Ok(())
}

#[test]
fn test_clean_job_keeps_crlf_with_header() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("verbier.txt");
    let output = dir.path().join("verbier_clean.txt");
    fs::write(&input, ANNOTATED.replace('\n', "\r\n"))?;

    let options = CleanOptions {
        backup: false,
        header: true,
    };
    let result = Pipeline::clean(&input, &output, options, &LinkerConfig::default())?;
    assert_eq!(result.kept, 2);

    let cleaned = fs::read_to_string(&output)?;
    assert!(cleaned.starts_with("# VERBIER FESTIVAL DATA\r\n# Cleaned on "));
    assert!(cleaned.ends_with(&CLEANED.replace('\n', "\r\n")));
    assert_eq!(cleaned.matches('\n').count(), cleaned.matches("\r\n").count());
    Ok(())
}
