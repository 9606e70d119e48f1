use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

use crate::config::settings::Settings;
use crate::error::TrackerError;

/// Flags shared by the UI and the daemon.
pub fn base_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .version(env!("CARGO_PKG_VERSION"))
        .about(about)
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .value_name("PATH")
                .help("CSV event log (overrides TIMELOG_FILE)"),
        )
        .arg(
            Arg::new("screenshot-dir")
                .long("screenshot-dir")
                .value_name("DIR")
                .help("Screenshot root directory (overrides SCREENSHOT_DIR)"),
        )
        .arg(
            Arg::new("idle-strategy")
                .long("idle-strategy")
                .value_name("STRATEGY")
                .value_parser(["counter", "os-query"])
                .help("Idle detection strategy (overrides IDLE_STRATEGY)"),
        )
}

pub fn apply_overrides(matches: &ArgMatches, settings: &mut Settings) -> Result<(), TrackerError> {
    if let Some(path) = matches.get_one::<String>("log-file") {
        settings.log_file = PathBuf::from(path);
    }
    if let Some(dir) = matches.get_one::<String>("screenshot-dir") {
        settings.screenshot_dir = PathBuf::from(dir);
    }
    if let Some(strategy) = matches.get_one::<String>("idle-strategy") {
        settings.idle_strategy = strategy.parse()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdleStrategy;

    #[test]
    fn test_cli_overrides_env_settings() {
        let mut settings = Settings::from_lookup(PathBuf::from("/work"), |_| None).unwrap();
        let matches = base_command("timetracker", "test")
            .try_get_matches_from([
                "timetracker",
                "--log-file",
                "/data/log.csv",
                "--idle-strategy",
                "os-query",
            ])
            .unwrap();

        apply_overrides(&matches, &mut settings).unwrap();

        assert_eq!(settings.log_file, PathBuf::from("/data/log.csv"));
        assert_eq!(settings.screenshot_dir, PathBuf::from("/work/Screenshots"));
        assert_eq!(settings.idle_strategy, IdleStrategy::OsQuery);
    }

    #[test]
    fn test_cli_rejects_unknown_strategy() {
        let result = base_command("timetracker", "test")
            .try_get_matches_from(["timetracker", "--idle-strategy", "guess"]);
        assert!(result.is_err());
    }
}
