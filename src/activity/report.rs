//! Activity log summary and its terminal rendering.

use std::collections::BTreeMap;
use std::fmt;

use chrono::DateTime;
use serde::Serialize;

use super::HUMAN_TIME_FORMAT;

const BAR_WIDTH: usize = 30;

/// Aggregate figures over the analyzed logs.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LogReport {
    /// Number of start records.
    pub sessions: usize,
    /// Operation records; start and end records are not counted.
    pub events: usize,
    /// Distinct wall-clock minutes holding at least one operation.
    pub active_minutes: usize,
    pub events_per_minute: f64,
    /// Sum of session durations. A session without an end record lasts
    /// until the last event before the next start.
    pub session_seconds: f64,
    pub first_event: Option<f64>,
    pub last_event: Option<f64>,
    /// Operation counts keyed by operation name.
    pub by_operation: BTreeMap<String, usize>,
    /// Operation counts keyed by UNIX minute.
    pub per_minute: BTreeMap<i64, usize>,
}

impl LogReport {
    pub fn session_minutes(&self) -> f64 {
        self.session_seconds / 60.0
    }
}

impl fmt::Display for LogReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Activity summary")?;
        writeln!(f, "  Sessions:          {:>8}", format_number(self.sessions))?;
        writeln!(f, "  Operations:        {:>8}", format_number(self.events))?;
        writeln!(f, "  Active minutes:    {:>8}", format_number(self.active_minutes))?;
        writeln!(f, "  Ops per minute:    {:>8.2}", self.events_per_minute)?;
        writeln!(f, "  Session minutes:   {:>8.1}", self.session_minutes())?;
        if let (Some(first), Some(last)) = (self.first_event, self.last_event) {
            writeln!(f, "  First operation:   {}", human_time(first))?;
            writeln!(f, "  Last operation:    {}", human_time(last))?;
        }

        if !self.by_operation.is_empty() {
            writeln!(f)?;
            writeln!(f, "Operations by name:")?;
            let mut entries: Vec<(&String, &usize)> = self.by_operation.iter().collect();
            entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            let max = entries.first().map(|(_, count)| **count).unwrap_or(0);
            let name_width = entries.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
            for (name, count) in entries {
                writeln!(
                    f,
                    "  {name:<name_width$}  {:>6}  {}",
                    format_number(*count),
                    bar(*count, max)
                )?;
            }
        }
        Ok(())
    }
}

fn human_time(seconds: f64) -> String {
    let micros = (seconds * 1_000_000.0).round() as i64;
    match DateTime::from_timestamp_micros(micros) {
        Some(time) => time.format(HUMAN_TIME_FORMAT).to_string(),
        None => format!("{seconds}"),
    }
}

fn bar(count: usize, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let filled = ((count as f64 / max as f64) * BAR_WIDTH as f64).round() as usize;
    "█".repeat(filled.max(1))
}

fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
