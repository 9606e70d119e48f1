use anyhow::{Context, Result};
use clap::Arg;
use dotenvy::dotenv;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;

use timetracker::config::{IdleStrategy, Settings, cli};
use timetracker::logging;
use timetracker::tracker::idle_query::DbusIdleQuery;
use timetracker::tracker::input::RdevInputSource;
use timetracker::tracker::{
    CounterIdleDetector, IdleDetector, Intervals, LastInputSource, Notifier, SessionController,
};
use timetracker::ui::App;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli::base_command("timetracker", "Track work sessions, screenshots and idle time")
        .arg(
            Arg::new("test-idle")
                .long("test-idle")
                .help("Run one idle check with the configured strategy instead of the UI")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    dotenv().ok();

    let mut settings = Settings::new()?;
    cli::apply_overrides(&matches, &mut settings)?;
    logging::init(settings.debug_logs, Path::new("app.log"))?;

    if matches.get_flag("test-idle") {
        return test_idle_detection(&settings).await;
    }

    log::info!("Starting time tracker");
    let (notifier, events) = Notifier::channel();
    let controller = SessionController::with_system_backends(&settings, notifier, Handle::current());

    let history = controller
        .init_log()
        .with_context(|| format!("Cannot use event log {}", settings.log_file.display()))?;
    log::info!("Replayed {} log line(s)", history.len());

    let mut app = App::new(controller, events, history);
    app.run().await?;

    Ok(())
}

async fn test_idle_detection(settings: &Settings) -> Result<()> {
    match settings.idle_strategy {
        IdleStrategy::OsQuery => {
            println!("Querying session idle time over D-Bus...");
            let query = DbusIdleQuery::new(
                Handle::current(),
                Intervals::from(settings).idle_check_deadline,
            );
            match tokio::task::spawn_blocking(move || query.last_input()).await? {
                Ok(last_input) => {
                    let idle = chrono::Local::now() - last_input;
                    println!("✅ Success! Last input {} seconds ago", idle.num_seconds());
                }
                Err(e) => println!("❌ Failed: {:#}", e),
            }
        }
        IdleStrategy::Counter => {
            println!(
                "Counting input events for {} seconds...",
                settings.idle_check_interval.as_secs()
            );
            let detector = CounterIdleDetector::new(Arc::new(RdevInputSource::new()));
            detector.attach()?;
            tokio::time::sleep(settings.idle_check_interval).await;
            let report = detector.evaluate(chrono::Local::now());
            detector.release();
            println!("idle={} ({})", report.is_idle, report.detail);
        }
    }
    Ok(())
}
