pub mod schedule;
pub mod tickets;

pub use schedule::{parse_schedule, ScheduleParser};
pub use tickets::{extract_tickets, ShowCode, TicketParser};

/// Line-oriented parser over one of the two text corpora.
///
/// Parsers never fail on data shape: lines they cannot interpret are skipped
/// and fields they cannot derive are left empty.
pub trait LineParser {
    type Output;

    fn parse(&self, text: &str) -> Vec<Self::Output>;
}

/// Splits text into lines without their terminators.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}
