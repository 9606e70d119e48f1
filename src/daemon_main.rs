use anyhow::{Context, Result};
use clap::Arg;
use dotenvy::dotenv;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;

use timetracker::config::{Settings, cli};
use timetracker::logging;
use timetracker::tracker::{Notifier, SessionController, TrackerEvent};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli::base_command(
        "timetracker_daemon",
        "Headless tracker: tracks from launch until SIGINT/SIGTERM",
    )
    .arg(
        Arg::new("json")
            .long("json")
            .help("Print every tracker event as a JSON line")
            .action(clap::ArgAction::SetTrue),
    )
    .get_matches();

    dotenv().ok();

    let mut settings = Settings::new()?;
    cli::apply_overrides(&matches, &mut settings)?;
    logging::init(settings.debug_logs, Path::new("daemon.log"))?;
    log::info!("Starting time tracker daemon with {:?}", settings);
    let json = matches.get_flag("json");

    let (notifier, events) = Notifier::channel();
    let mut controller = SessionController::with_system_backends(&settings, notifier, Handle::current());

    let history = controller
        .init_log()
        .with_context(|| format!("Cannot use event log {}", settings.log_file.display()))?;
    if !json {
        for line in &history {
            println!("{}", line);
        }
    }

    run(&mut controller, events, json).await
}

async fn run(
    controller: &mut SessionController,
    mut events: UnboundedReceiver<TrackerEvent>,
    json: bool,
) -> Result<()> {
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown_flag))?;
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown_flag))?;

    if let Err(e) = controller.start().await {
        log::error!("Tracking started without a START record: {}", e);
    }

    let mut shutdown_check = tokio::time::interval(Duration::from_millis(200));
    loop {
        tokio::select! {
            Some(event) = events.recv() => print_event(&event, json)?,
            _ = shutdown_check.tick() => {
                if shutdown_flag.load(Ordering::Relaxed) {
                    log::info!("Received shutdown signal, stopping and exiting...");
                    break;
                }
            }
        }
    }

    if let Err(e) = controller.stop().await {
        log::error!("Tracking stopped without a STOP record: {}", e);
    }
    controller.shutdown().await;

    while let Ok(event) = events.try_recv() {
        print_event(&event, json)?;
    }
    Ok(())
}

fn print_event(event: &TrackerEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    match event {
        TrackerEvent::History { line } => println!("{}", line),
        TrackerEvent::Activity { label, .. } => log::debug!("{}", label),
        TrackerEvent::Status { text } => log::trace!("{}", text),
        TrackerEvent::Tracking { active } => log::debug!("tracking={}", active),
    }
    Ok(())
}
