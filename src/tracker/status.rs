//! Display strings for the session status and the activity indicator.
//!
//! Everything here is a pure function of its inputs; the host decides where
//! the text ends up.

use chrono::{DateTime, Duration, Local};
use serde::Serialize;

use crate::models::{Session, format_hms};
use crate::tracker::idle::IdleReport;

/// Color of the activity label. Hosts map it onto their own palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityColor {
    Green,
    Red,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityLabel {
    pub text: String,
    pub color: ActivityColor,
}

pub fn tracking_status(elapsed: Duration) -> String {
    format!("Tracking: {}", format_hms(elapsed))
}

pub fn not_tracking_status() -> String {
    "Not Tracking".to_string()
}

/// Status line for `session` observed at `now`.
pub fn status_line(session: &Session, now: DateTime<Local>) -> String {
    match session.elapsed_at(now) {
        Some(elapsed) => tracking_status(elapsed),
        None => not_tracking_status(),
    }
}

/// Short form used for the history list: `Idle` or `Active | Keys: 3, Mouse: 9`.
pub fn activity_summary(report: &IdleReport) -> String {
    if report.is_idle {
        "Idle".to_string()
    } else if report.detail.is_empty() {
        "Active".to_string()
    } else {
        format!("Active | {}", report.detail)
    }
}

pub fn activity_label(report: &IdleReport) -> ActivityLabel {
    ActivityLabel {
        text: format!("Activity Status: {}", activity_summary(report)),
        color: if report.is_idle {
            ActivityColor::Red
        } else {
            ActivityColor::Green
        },
    }
}

pub fn activity_history_line(at: DateTime<Local>, report: &IdleReport) -> String {
    format!("{} - {}", at.format("%H:%M:%S"), activity_summary(report))
}

/// `2025-01-02 08:00:00 -> 08:02:05 | 00:02:05`
pub fn session_summary_line(start: DateTime<Local>, stop: DateTime<Local>, elapsed: Duration) -> String {
    format!(
        "{} -> {} | {}",
        start.format("%Y-%m-%d %H:%M:%S"),
        stop.format("%H:%M:%S"),
        format_hms(elapsed)
    )
}
