//! Crontab text generation and parsing.
//!
//! Each window becomes two marker/entry line pairs:
//!
//! ```text
//! # mediasync:rest-stop nightly maintenance
//! 30 23 * * * systemctl stop player.service
//! # mediasync:rest-start nightly maintenance
//! 0 1 * * * systemctl start player.service
//! ```

use super::RestTimePair;
use crate::clock::TimeOfDay;

pub const STOP_MARKER: &str = "# mediasync:rest-stop";
pub const START_MARKER: &str = "# mediasync:rest-start";

/// Commands and label written into generated entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronCommands {
    stop: String,
    start: String,
    description: String,
}

impl CronCommands {
    /// All three values are sanitized before use
    pub fn new(stop: &str, start: &str, description: &str) -> Self {
        Self {
            stop: sanitize(stop),
            start: sanitize(start),
            description: sanitize(description),
        }
    }

    pub fn stop(&self) -> &str {
        &self.stop
    }

    pub fn start(&self) -> &str {
        &self.start
    }
}

/// Replace control characters with spaces and trim, so free text cannot
/// smuggle extra lines into the crontab
pub fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Render the marker/entry lines for `pairs`, newline-terminated
pub fn render_entries(pairs: &[RestTimePair], commands: &CronCommands) -> String {
    let mut out = String::new();
    for pair in pairs {
        push_entry(&mut out, STOP_MARKER, &commands.description, pair.start, &commands.stop);
        push_entry(&mut out, START_MARKER, &commands.description, pair.stop, &commands.start);
    }
    out
}

/// Replace the marker-bracketed entries in `existing` with entries for `pairs`,
/// keeping every other line as it was
pub fn merge_entries(existing: &str, pairs: &[RestTimePair], commands: &CronCommands) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut lines = existing.lines().peekable();

    while let Some(line) = lines.next() {
        if is_marker(line) {
            if lines.peek().is_some_and(|next| is_entry(next)) {
                lines.next();
            }
            continue;
        }
        kept.push(line);
    }

    while kept.last().is_some_and(|line| line.trim().is_empty()) {
        kept.pop();
    }

    let mut out = kept.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(&render_entries(pairs, commands));
    out
}

/// Reconstruct windows from marker-bracketed entries.
///
/// A stop entry pairs with the next start entry. A stop without a following
/// start, or a start without a preceding stop, is dropped.
pub fn parse_entries(text: &str) -> Vec<RestTimePair> {
    let mut pairs = Vec::new();
    let mut pending_stop: Option<TimeOfDay> = None;
    let mut lines = text.lines().peekable();

    while let Some(line) = lines.next() {
        let line = line.trim();
        let is_stop = line.starts_with(STOP_MARKER);
        if !is_stop && !line.starts_with(START_MARKER) {
            continue;
        }

        // a marker directly followed by another marker has no entry of its own
        let entry = lines.next_if(|next| is_entry(next));
        let Some(time) = entry.and_then(parse_entry_time) else {
            pending_stop = None;
            continue;
        };

        if is_stop {
            pending_stop = Some(time);
        } else if let Some(start) = pending_stop.take() {
            pairs.push(RestTimePair::new(start, time));
        }
    }

    pairs
}

fn push_entry(out: &mut String, marker: &str, description: &str, time: TimeOfDay, command: &str) {
    out.push_str(marker);
    if !description.is_empty() {
        out.push(' ');
        out.push_str(description);
    }
    out.push('\n');
    out.push_str(&format!("{} {} * * * {}\n", time.minute(), time.hour(), command));
}

fn is_marker(line: &str) -> bool {
    let line = line.trim();
    line.starts_with(STOP_MARKER) || line.starts_with(START_MARKER)
}

fn is_entry(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && !line.starts_with('#')
}

/// Minute and hour of a daily `M H * * * command` line
fn parse_entry_time(line: &str) -> Option<TimeOfDay> {
    let mut fields = line.split_whitespace();
    let minute = fields.next()?.parse().ok()?;
    let hour = fields.next()?.parse().ok()?;
    if fields.take(3).filter(|field| *field == "*").count() != 3 {
        return None;
    }
    TimeOfDay::new(hour, minute)
}
