use crate::matcher::MatchOutcome;
use crate::metadata::{render_block, render_unmatched_block};
use crate::types::{ScheduleWindow, TicketRecord};
use tracing::debug;

/// Lines to insert after a given line of the original text
#[derive(Debug, Clone, PartialEq)]
pub struct Insertion {
    /// 0-based line index in the original, pre-insertion numbering
    pub after_line: usize,
    pub lines: Vec<String>,
}

/// Insertions computed against the original line numbering, applied in one
/// forward pass that builds a new buffer.
#[derive(Debug, Clone, Default)]
pub struct InsertPlan {
    insertions: Vec<Insertion>,
}

impl InsertPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, after_line: usize, lines: Vec<String>) {
        self.insertions.push(Insertion { after_line, lines });
    }

    pub fn len(&self) -> usize {
        self.insertions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insertions.is_empty()
    }

    pub fn insertions(&self) -> &[Insertion] {
        &self.insertions
    }

    /// Original lines interleaved with the planned insertions.
    /// Insertions sharing an anchor keep the order they were pushed in;
    /// anchors past the last line are appended at the end.
    pub fn apply(&self, lines: &[&str]) -> Vec<String> {
        let ordered = self.ordered();
        let extra: usize = ordered.iter().map(|ins| ins.lines.len()).sum();
        let mut out = Vec::with_capacity(lines.len() + extra);
        let mut pending = ordered.into_iter().peekable();

        for (idx, line) in lines.iter().enumerate() {
            out.push(line.to_string());
            while let Some(ins) = pending.next_if(|ins| ins.after_line <= idx) {
                out.extend(ins.lines.iter().cloned());
            }
        }
        for ins in pending {
            debug!(
                "Insertion anchored at line {} is past the end, appending",
                ins.after_line + 1
            );
            out.extend(ins.lines.iter().cloned());
        }
        out
    }

    /// Like [`InsertPlan::apply`] on whole text.
    ///
    /// Original lines keep their own terminators. Inserted lines use `\r\n`
    /// when the text contains any, `\n` otherwise. A missing final newline
    /// stays missing.
    pub fn apply_to_text(&self, text: &str) -> String {
        let eol = if text.contains("\r\n") { "\r\n" } else { "\n" };
        let extra: usize = self
            .insertions
            .iter()
            .flat_map(|ins| ins.lines.iter())
            .map(|l| l.len() + eol.len())
            .sum();
        let mut out = String::with_capacity(text.len() + extra);
        let mut pending = self.ordered().into_iter().peekable();

        let push_lines = |out: &mut String, ins: &Insertion| {
            for line in &ins.lines {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push_str(eol);
                }
                out.push_str(line);
                out.push_str(eol);
            }
        };

        let mut ends_with_insert = false;
        for (idx, piece) in text.split_inclusive('\n').enumerate() {
            out.push_str(piece);
            ends_with_insert = false;
            while let Some(ins) = pending.next_if(|ins| ins.after_line <= idx) {
                push_lines(&mut out, ins);
                ends_with_insert = true;
            }
        }
        for ins in pending {
            debug!(
                "Insertion anchored at line {} is past the end, appending",
                ins.after_line + 1
            );
            push_lines(&mut out, ins);
            ends_with_insert = true;
        }

        if ends_with_insert && !text.ends_with('\n') && out.ends_with(eol) {
            out.truncate(out.len() - eol.len());
        }
        out
    }

    /// Insertions sorted by anchor, stable for equal anchors
    fn ordered(&self) -> Vec<&Insertion> {
        let mut ordered: Vec<&Insertion> = self.insertions.iter().collect();
        ordered.sort_by_key(|ins| ins.after_line);
        ordered
    }
}

/// Blank separator line followed by the block
fn with_separator(block: Vec<String>) -> Vec<String> {
    let mut lines = Vec::with_capacity(block.len() + 1);
    lines.push(String::new());
    lines.extend(block);
    lines
}

/// Plans one block per association, plus placeholder blocks for unmatched
/// windows when `include_unmatched` is set.
pub fn plan_annotations(
    windows: &[ScheduleWindow],
    records: &[TicketRecord],
    outcome: &MatchOutcome,
    include_unmatched: bool,
) -> InsertPlan {
    let mut plan = InsertPlan::new();

    for assoc in &outcome.associations {
        let window = &windows[assoc.window_index];
        let record = &records[assoc.record_index];
        plan.push(
            window.anchor_line,
            with_separator(render_block(
                record.event_url.as_deref(),
                record.booking_url.as_deref(),
            )),
        );
    }

    if include_unmatched {
        for idx in &outcome.unmatched_windows {
            let window = &windows[*idx];
            plan.push(
                window.anchor_line,
                with_separator(render_unmatched_block(window.date.as_deref(), &window.time)),
            );
        }
    }

    plan
}
