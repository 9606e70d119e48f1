use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, TrackerError};
use crate::models::LogRecord;

pub const LOG_HEADER: &str = "Event,TimeStamp,Duration";
pub const LINE_TERMINATOR: &str = "\r\n";

/// Append-only CSV log of START/STOP records.
///
/// Every append opens the file, writes one line and syncs it to disk before
/// returning, so nothing is buffered across calls.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the log with its header if missing. An existing log is left
    /// untouched; its START/STOP lines are returned for the history view.
    pub fn ensure_exists(&self) -> Result<Vec<String>> {
        let init_err = |source| TrackerError::LogInit {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(init_err)?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(mut file) => {
                write_line(&mut file, LOG_HEADER).map_err(init_err)?;
                log::info!("Created event log at {}", self.path.display());
                Ok(Vec::new())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(self.replay()),
            Err(e) => Err(init_err(e)),
        }
    }

    /// Reads back well-formed START/STOP lines. Advisory only: anything that
    /// does not parse as a record is skipped.
    pub fn replay(&self) -> Vec<String> {
        match fs::read(&self.path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes)
                .lines()
                .filter(|line| LogRecord::parse_line(line).is_some())
                .map(str::to_string)
                .collect(),
            Err(e) => {
                log::warn!("Could not replay event log {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    pub fn append(&self, record: &LogRecord) -> Result<()> {
        self.append_line(&record.to_csv_line())
            .map_err(|source| TrackerError::LogAppend {
                event: record.event_type(),
                path: self.path.clone(),
                source,
            })?;
        log::debug!("Appended {} record to {}", record.event_type(), self.path.display());
        Ok(())
    }

    fn append_line(&self, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        // Recreate the header if the log vanished while we were running.
        if file.metadata()?.len() == 0 {
            write_line(&mut file, LOG_HEADER)?;
        }
        write_line(&mut file, line)
    }
}

fn write_line(file: &mut File, line: &str) -> io::Result<()> {
    let mut buf = String::with_capacity(line.len() + LINE_TERMINATOR.len());
    buf.push_str(line);
    buf.push_str(LINE_TERMINATOR);
    file.write_all(buf.as_bytes())?;
    file.sync_data()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Local, TimeZone};
    use tempfile::TempDir;

    fn sample_records() -> (LogRecord, LogRecord) {
        let t0 = Local.with_ymd_and_hms(2025, 1, 2, 8, 0, 0).unwrap();
        (
            LogRecord::Start { timestamp: t0 },
            LogRecord::Stop {
                timestamp: t0 + Duration::seconds(125),
                duration: Duration::seconds(125),
            },
        )
    }

    #[test]
    fn test_ensure_exists_writes_header_once() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("timelog.csv"));

        assert!(log.ensure_exists().unwrap().is_empty());
        assert_eq!(
            fs::read_to_string(log.path()).unwrap(),
            "Event,TimeStamp,Duration\r\n"
        );
    }

    #[test]
    fn test_ensure_exists_is_idempotent_and_replays() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("timelog.csv"));
        let (start, stop) = sample_records();

        log.ensure_exists().unwrap();
        log.append(&start).unwrap();
        log.append(&stop).unwrap();
        let before = fs::read(log.path()).unwrap();

        let replayed = log.ensure_exists().unwrap();
        let replayed_again = log.ensure_exists().unwrap();

        assert_eq!(fs::read(log.path()).unwrap(), before);
        assert_eq!(
            replayed,
            vec![
                "START,2025-01-02 08:00:00,".to_string(),
                "STOP,2025-01-02 08:02:05,00:02:05".to_string(),
            ]
        );
        assert_eq!(replayed, replayed_again);
    }

    #[test]
    fn test_append_uses_crlf_and_preserves_prior_lines() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("timelog.csv"));
        let (start, stop) = sample_records();

        log.ensure_exists().unwrap();
        log.append(&start).unwrap();
        log.append(&stop).unwrap();

        assert_eq!(
            fs::read_to_string(log.path()).unwrap(),
            "Event,TimeStamp,Duration\r\n\
             START,2025-01-02 08:00:00,\r\n\
             STOP,2025-01-02 08:02:05,00:02:05\r\n"
        );
    }

    #[test]
    fn test_append_recreates_missing_log_with_header() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("timelog.csv"));
        let (start, _) = sample_records();

        log.ensure_exists().unwrap();
        fs::remove_file(log.path()).unwrap();
        log.append(&start).unwrap();

        assert_eq!(
            fs::read_to_string(log.path()).unwrap(),
            "Event,TimeStamp,Duration\r\nSTART,2025-01-02 08:00:00,\r\n"
        );
    }

    #[test]
    fn test_replay_skips_foreign_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("timelog.csv");
        fs::write(
            &path,
            "Event,TimeStamp,Duration\r\nnotes\r\nSTOP,x,y\r\nSTART,2025-01-02 08:00:00,\r\n",
        )
        .unwrap();

        let log = EventLog::new(&path);
        assert_eq!(
            log.ensure_exists().unwrap(),
            vec!["START,2025-01-02 08:00:00,".to_string()]
        );
    }

    #[test]
    fn test_append_failure_names_event() {
        let dir = TempDir::new().unwrap();
        // A directory in place of the file makes every open fail.
        let log = EventLog::new(dir.path());
        let (start, _) = sample_records();

        let err = log.append(&start).unwrap_err();
        assert!(matches!(err, TrackerError::LogAppend { event: "START", .. }));
    }
}
