use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone};
use std::fmt;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One durable line of the event log.
///
/// START never carries a duration and STOP always does, so the two shapes are
/// separate variants instead of a record with an optional field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRecord {
    Start {
        timestamp: DateTime<Local>,
    },
    Stop {
        timestamp: DateTime<Local>,
        duration: Duration,
    },
}

impl LogRecord {
    pub fn event_type(&self) -> &'static str {
        match self {
            LogRecord::Start { .. } => "START",
            LogRecord::Stop { .. } => "STOP",
        }
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        match self {
            LogRecord::Start { timestamp } | LogRecord::Stop { timestamp, .. } => *timestamp,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            LogRecord::Start { .. } => None,
            LogRecord::Stop { duration, .. } => Some(*duration),
        }
    }

    /// CSV line without terminator: `EventType,Timestamp,Duration`.
    pub fn to_csv_line(&self) -> String {
        let duration = self.duration().map(format_hms).unwrap_or_default();
        format!(
            "{},{},{}",
            self.event_type(),
            self.timestamp().format(TIMESTAMP_FORMAT),
            duration
        )
    }

    /// Best-effort parse of a line previously written by `to_csv_line`.
    pub fn parse_line(line: &str) -> Option<LogRecord> {
        let mut fields = line.trim_end_matches(['\r', '\n']).splitn(3, ',');
        let event = fields.next()?;
        let naive = NaiveDateTime::parse_from_str(fields.next()?, TIMESTAMP_FORMAT).ok()?;
        let timestamp = Local.from_local_datetime(&naive).earliest()?;
        let duration = fields.next().unwrap_or("");

        match event {
            "START" => Some(LogRecord::Start { timestamp }),
            "STOP" => Some(LogRecord::Stop {
                timestamp,
                duration: parse_hms(duration)?,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_csv_line())
    }
}

/// `HH:MM:SS` with total hours, so a 27 hour session reads `27:00:00`.
/// Negative input renders as `00:00:00`.
pub fn format_hms(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

fn parse_hms(text: &str) -> Option<Duration> {
    let mut parts = text.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: i64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
        return None;
    }
    Some(Duration::seconds(hours * 3600 + minutes * 60 + seconds))
}
