use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::TrackerError;

/// Which idle-detection strategy the idle-check task consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdleStrategy {
    /// Count global key/mouse events between checks.
    #[default]
    Counter,
    /// Ask the OS for the time of the last input.
    OsQuery,
}

impl FromStr for IdleStrategy {
    type Err = TrackerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "counter" | "counters" => Ok(IdleStrategy::Counter),
            "os-query" | "os_query" | "osquery" | "os" => Ok(IdleStrategy::OsQuery),
            _ => Err(TrackerError::Config {
                key: "IDLE_STRATEGY",
                value: value.to_string(),
                reason: "expected `counter` or `os-query`".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub log_file: PathBuf,
    pub screenshot_dir: PathBuf,
    pub tick_interval: Duration,
    pub idle_check_interval: Duration,
    pub screenshot_interval: Duration,
    pub idle_strategy: IdleStrategy,
    pub debug_logs: bool,
}

impl Settings {
    fn get_env_path() -> Result<PathBuf> {
        Ok(env::current_dir()
            .context("Failed to resolve working directory")?
            .join(".env"))
    }

    /// Loads `.env` from the working directory (if any) and reads settings
    /// from the process environment.
    pub fn new() -> Result<Self> {
        let env_path = Self::get_env_path()?;
        if dotenvy::from_path(&env_path).is_ok() {
            log::info!("Loaded settings overrides from {}", env_path.display());
        }

        let base_dir = env::current_dir().context("Failed to resolve working directory")?;
        let settings = Self::from_lookup(base_dir, |key| env::var(key).ok())?;
        log::info!("Settings: {:?}", settings);
        Ok(settings)
    }

    /// Builds settings from an arbitrary key lookup. Relative defaults are
    /// resolved against `base_dir`.
    pub fn from_lookup<F>(base_dir: PathBuf, lookup: F) -> Result<Self, TrackerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_file = lookup("TIMELOG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| base_dir.join("timelog.csv"));
        let screenshot_dir = lookup("SCREENSHOT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| base_dir.join("Screenshots"));

        let idle_strategy = match lookup("IDLE_STRATEGY") {
            Some(value) => value.parse()?,
            None => IdleStrategy::default(),
        };

        let debug_logs = lookup("DEBUG_LOGS_ENABLED")
            .map(|value| flag_enabled(&value))
            .unwrap_or(false);

        Ok(Self {
            log_file,
            screenshot_dir,
            tick_interval: interval_secs(&lookup, "TICK_INTERVAL_SECS", 1)?,
            idle_check_interval: interval_secs(&lookup, "IDLE_CHECK_INTERVAL_SECS", 10)?,
            screenshot_interval: interval_secs(&lookup, "SCREENSHOT_INTERVAL_SECS", 60)?,
            idle_strategy,
            debug_logs,
        })
    }
}

/// Diagnostics toggle. Anything unrecognised means off, never an error.
fn flag_enabled(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn interval_secs<F>(lookup: &F, key: &'static str, default: u64) -> Result<Duration, TrackerError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(Duration::from_secs(default));
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(TrackerError::Config {
            key,
            value: raw,
            reason: "interval must be at least one second".to_string(),
        }),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(TrackerError::Config {
            key,
            value: raw,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings, TrackerError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(PathBuf::from("/work"), |key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_match_original_intervals() {
        let settings = settings_from(&[]).unwrap();
        assert_eq!(settings.log_file, PathBuf::from("/work/timelog.csv"));
        assert_eq!(settings.screenshot_dir, PathBuf::from("/work/Screenshots"));
        assert_eq!(settings.tick_interval, Duration::from_secs(1));
        assert_eq!(settings.idle_check_interval, Duration::from_secs(10));
        assert_eq!(settings.screenshot_interval, Duration::from_secs(60));
        assert_eq!(settings.idle_strategy, IdleStrategy::Counter);
        assert!(!settings.debug_logs);
    }

    #[test]
    fn test_env_overrides() {
        let settings = settings_from(&[
            ("TIMELOG_FILE", "/tmp/log.csv"),
            ("IDLE_STRATEGY", "os-query"),
            ("SCREENSHOT_INTERVAL_SECS", "300"),
            ("DEBUG_LOGS_ENABLED", "true"),
        ])
        .unwrap();
        assert_eq!(settings.log_file, PathBuf::from("/tmp/log.csv"));
        assert_eq!(settings.idle_strategy, IdleStrategy::OsQuery);
        assert_eq!(settings.screenshot_interval, Duration::from_secs(300));
        assert!(settings.debug_logs);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = settings_from(&[("IDLE_CHECK_INTERVAL_SECS", "0")]).unwrap_err();
        assert!(matches!(
            err,
            TrackerError::Config { key: "IDLE_CHECK_INTERVAL_SECS", .. }
        ));
    }

    #[test]
    fn test_debug_flag_accepts_common_spellings_and_never_fails() {
        for (raw, expected) in [("1", true), ("YES", true), ("on", true), ("0", false), ("nope", false), ("", false)] {
            let settings = settings_from(&[("DEBUG_LOGS_ENABLED", raw)]).unwrap();
            assert_eq!(settings.debug_logs, expected, "DEBUG_LOGS_ENABLED={raw:?}");
        }
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let err = settings_from(&[("IDLE_STRATEGY", "psychic")]).unwrap_err();
        assert!(err.to_string().contains("IDLE_STRATEGY"));
    }

    #[test]
    fn test_strategy_parsing_is_lenient_about_spelling() {
        assert_eq!("Counter".parse::<IdleStrategy>().unwrap(), IdleStrategy::Counter);
        assert_eq!(" os_query ".parse::<IdleStrategy>().unwrap(), IdleStrategy::OsQuery);
    }
}
