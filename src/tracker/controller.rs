use chrono::{DateTime, Local, TimeDelta};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{IdleStrategy, Settings};
use crate::error::Result;
use crate::models::{LogRecord, Session, SessionState};
use crate::tracker::clock::{Clock, SystemClock};
use crate::tracker::display::CommandCapture;
use crate::tracker::event_log::EventLog;
use crate::tracker::events::{Notifier, TrackerEvent};
use crate::tracker::idle::{CounterIdleDetector, IdleDetector, IdleReport, OsQueryIdleDetector};
use crate::tracker::idle_query::DbusIdleQuery;
use crate::tracker::input::RdevInputSource;
use crate::tracker::screenshot::ScreenshotScheduler;
use crate::tracker::status;

/// Firing periods of the three periodic tasks, and how long the blocking
/// part of an idle check or screenshot firing may take before it is given up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    pub tick: Duration,
    pub idle_check: Duration,
    pub screenshot: Duration,
    pub idle_check_deadline: Duration,
    pub screenshot_deadline: Duration,
}

impl Intervals {
    /// Deadlines default to four fifths of each period.
    pub fn new(tick: Duration, idle_check: Duration, screenshot: Duration) -> Self {
        Self {
            tick,
            idle_check,
            screenshot,
            idle_check_deadline: idle_check * 4 / 5,
            screenshot_deadline: screenshot * 4 / 5,
        }
    }
}

impl Default for Intervals {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(1),
            Duration::from_secs(10),
            Duration::from_secs(60),
        )
    }
}

impl From<&Settings> for Intervals {
    fn from(settings: &Settings) -> Self {
        Self::new(
            settings.tick_interval,
            settings.idle_check_interval,
            settings.screenshot_interval,
        )
    }
}

/// Collaborators the controller drives.
pub struct TrackerParts {
    pub event_log: EventLog,
    pub screenshots: ScreenshotScheduler,
    pub detector: Arc<dyn IdleDetector>,
    pub clock: Arc<dyn Clock>,
    pub notifier: Notifier,
}

/// What a `start`/`stop` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started {
        at: DateTime<Local>,
    },
    Stopped {
        started: DateTime<Local>,
        at: DateTime<Local>,
        elapsed: TimeDelta,
    },
    /// Start while tracking or stop while not tracking.
    Unchanged,
}

/// State shared with the periodic tasks. The session mutex is held for the
/// whole body of every firing, which keeps firings and transitions strictly
/// serialized.
struct Shared {
    session: Mutex<Session>,
    clock: Arc<dyn Clock>,
    detector: Arc<dyn IdleDetector>,
    screenshots: Arc<ScreenshotScheduler>,
    notifier: Notifier,
    idle_check_deadline: Duration,
    screenshot_deadline: Duration,
}

impl Shared {
    async fn tick(&self) {
        let session = self.session.lock().await;
        if session.is_tracking() {
            let text = status::status_line(&session, self.clock.now());
            self.notifier.send(TrackerEvent::Status { text });
        }
    }

    async fn idle_check(&self) {
        let session = self.session.lock().await;
        if !session.is_tracking() {
            return;
        }

        let now = self.clock.now();
        let detector = Arc::clone(&self.detector);
        let evaluation = tokio::task::spawn_blocking(move || detector.evaluate(now));
        let report = match time::timeout(self.idle_check_deadline, evaluation).await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                log::error!("Idle evaluation crashed, assuming active: {}", e);
                IdleReport::active("idle check failed")
            }
            Err(_) => {
                log::warn!(
                    "Idle evaluation exceeded {:?}, assuming active",
                    self.idle_check_deadline
                );
                IdleReport::active("idle check timed out")
            }
        };
        drop(session);

        log::debug!("Idle check: idle={} ({})", report.is_idle, report.detail);
        self.notifier.send(TrackerEvent::activity(
            status::activity_label(&report),
            report.detail.clone(),
        ));
        self.notifier
            .send(TrackerEvent::history(status::activity_history_line(now, &report)));
    }

    async fn screenshot(&self) {
        let session = self.session.lock().await;
        if !session.is_tracking() {
            return;
        }

        let now = self.clock.now();
        let screenshots = Arc::clone(&self.screenshots);
        let firing = tokio::task::spawn_blocking(move || screenshots.capture_all(now));
        let summary = match time::timeout(self.screenshot_deadline, firing).await {
            Ok(Ok(report)) => {
                if report.is_success() {
                    log::info!("Saved {} screenshot(s)", report.saved.len());
                } else if report.failures.is_empty() {
                    log::info!("No active displays to capture");
                } else {
                    log::warn!(
                        "Screenshot firing had {} failure(s) out of {} display(s)",
                        report.failures.len(),
                        report.attempted
                    );
                }
                report.summary()
            }
            Ok(Err(e)) => {
                log::error!("Screenshot worker crashed: {}", e);
                format!("Screenshot error: {}", e)
            }
            Err(_) => {
                log::warn!("Screenshot firing exceeded {:?}", self.screenshot_deadline);
                format!(
                    "Screenshot error: capture timed out after {:?}",
                    self.screenshot_deadline
                )
            }
        };
        drop(session);

        self.notifier.send(TrackerEvent::history(summary));
    }
}

struct PeriodicTasks {
    cancel: CancellationToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl PeriodicTasks {
    /// Cancels and waits for every task, so nothing fires after this returns.
    async fn halt(self) {
        self.cancel.cancel();
        for (name, handle) in self.handles {
            if let Err(e) = handle.await {
                log::error!("{} task ended abnormally: {}", name, e);
            }
        }
    }
}

fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    mut body: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        // First firing one full period after start, like a UI timer.
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => body().await,
            }
        }
        log::debug!("{} task stopped", name);
    })
}

/// The Start/Stop state machine and owner of the periodic tasks.
pub struct SessionController {
    shared: Arc<Shared>,
    event_log: EventLog,
    intervals: Intervals,
    tasks: Option<PeriodicTasks>,
}

impl SessionController {
    pub fn new(parts: TrackerParts, intervals: Intervals) -> Self {
        Self {
            shared: Arc::new(Shared {
                session: Mutex::new(Session::new()),
                clock: parts.clock,
                detector: parts.detector,
                screenshots: Arc::new(parts.screenshots),
                notifier: parts.notifier,
                idle_check_deadline: intervals.idle_check_deadline,
                screenshot_deadline: intervals.screenshot_deadline,
            }),
            event_log: parts.event_log,
            intervals,
            tasks: None,
        }
    }

    /// Wires the real desktop backends selected by `settings`.
    pub fn with_system_backends(settings: &Settings, notifier: Notifier, runtime: Handle) -> Self {
        let intervals = Intervals::from(settings);
        let detector: Arc<dyn IdleDetector> = match settings.idle_strategy {
            IdleStrategy::Counter => {
                log::info!("Idle detection: counting global input events");
                Arc::new(CounterIdleDetector::new(Arc::new(RdevInputSource::new())))
            }
            IdleStrategy::OsQuery => {
                log::info!("Idle detection: querying session idle time over D-Bus");
                Arc::new(OsQueryIdleDetector::new(
                    Arc::new(DbusIdleQuery::new(runtime.clone(), intervals.idle_check_deadline)),
                    settings.idle_check_interval,
                ))
            }
        };

        let parts = TrackerParts {
            event_log: EventLog::new(&settings.log_file),
            screenshots: ScreenshotScheduler::new(
                &settings.screenshot_dir,
                Arc::new(CommandCapture::new(runtime, intervals.screenshot_deadline)),
            ),
            detector,
            clock: Arc::new(SystemClock),
            notifier,
        };
        Self::new(parts, intervals)
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn intervals(&self) -> Intervals {
        self.intervals
    }

    /// Creates the log if needed and returns prior START/STOP lines.
    pub fn init_log(&self) -> Result<Vec<String>> {
        self.event_log.ensure_exists()
    }

    pub async fn state(&self) -> SessionState {
        self.shared.session.lock().await.state()
    }

    pub fn tasks_running(&self) -> bool {
        self.tasks.is_some()
    }

    /// NotTracking -> Tracking.
    ///
    /// An `Err` means the START record could not be written; the session has
    /// still started.
    pub async fn start(&mut self) -> Result<Transition> {
        let now = {
            let mut session = self.shared.session.lock().await;
            let now = self.shared.clock.now();
            if !session.begin(now) {
                log::debug!("Start ignored: already tracking");
                return Ok(Transition::Unchanged);
            }
            now
        };
        log::info!("Tracking started at {}", now);

        self.shared.detector.reset();
        if let Err(e) = self.shared.detector.attach() {
            log::warn!("Input monitoring unavailable, idle checks will report active: {:#}", e);
            self.shared
                .notifier
                .send(TrackerEvent::history(format!("Activity monitoring unavailable: {}", e)));
        }
        self.tasks = Some(self.spawn_tasks());

        self.shared.notifier.send(TrackerEvent::Tracking { active: true });
        self.shared.notifier.send(TrackerEvent::Status {
            text: status::tracking_status(TimeDelta::zero()),
        });

        self.append_record(LogRecord::Start { timestamp: now })?;
        Ok(Transition::Started { at: now })
    }

    /// Tracking -> NotTracking.
    ///
    /// An `Err` means the STOP record could not be written; the session has
    /// still ended.
    pub async fn stop(&mut self) -> Result<Transition> {
        self.halt_tasks().await;

        let (started, now, elapsed) = {
            let mut session = self.shared.session.lock().await;
            let now = self.shared.clock.now();
            match session.end(now) {
                Some((started, elapsed)) => (started, now, elapsed),
                None => {
                    log::debug!("Stop ignored: not tracking");
                    return Ok(Transition::Unchanged);
                }
            }
        };
        log::info!("Tracking stopped after {}", crate::models::format_hms(elapsed));

        self.shared.detector.reset();

        self.shared.notifier.send(TrackerEvent::Tracking { active: false });
        self.shared.notifier.send(TrackerEvent::Status {
            text: status::not_tracking_status(),
        });
        self.shared.notifier.send(TrackerEvent::history(status::session_summary_line(
            started, now, elapsed,
        )));

        self.append_record(LogRecord::Stop {
            timestamp: now,
            duration: elapsed,
        })?;
        Ok(Transition::Stopped {
            started,
            at: now,
            elapsed,
        })
    }

    /// Halts the periodic tasks and drops the input subscription. Leaves the
    /// session state alone. Safe to call any number of times.
    pub async fn shutdown(&mut self) {
        self.halt_tasks().await;
        self.shared.detector.release();
        log::info!("Tracker shut down");
    }

    async fn halt_tasks(&mut self) {
        if let Some(tasks) = self.tasks.take() {
            tasks.halt().await;
        }
    }

    fn spawn_tasks(&self) -> PeriodicTasks {
        let cancel = CancellationToken::new();

        let tick = {
            let shared = Arc::clone(&self.shared);
            spawn_periodic("tick", self.intervals.tick, cancel.clone(), move || {
                let shared = Arc::clone(&shared);
                async move { shared.tick().await }
            })
        };
        let idle_check = {
            let shared = Arc::clone(&self.shared);
            spawn_periodic("idle-check", self.intervals.idle_check, cancel.clone(), move || {
                let shared = Arc::clone(&shared);
                async move { shared.idle_check().await }
            })
        };
        let screenshot = {
            let shared = Arc::clone(&self.shared);
            spawn_periodic("screenshot", self.intervals.screenshot, cancel.clone(), move || {
                let shared = Arc::clone(&shared);
                async move { shared.screenshot().await }
            })
        };

        PeriodicTasks {
            cancel,
            handles: vec![
                ("tick", tick),
                ("idle-check", idle_check),
                ("screenshot", screenshot),
            ],
        }
    }

    fn append_record(&self, record: LogRecord) -> Result<()> {
        if let Err(e) = self.event_log.append(&record) {
            log::error!("{}", e);
            self.shared
                .notifier
                .send(TrackerEvent::history(format!("Log error: {}", e)));
            return Err(e);
        }
        Ok(())
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        // Without a runtime to await on, cancellation is the best we can do.
        if let Some(tasks) = self.tasks.take() {
            tasks.cancel.cancel();
        }
        self.shared.detector.release();
    }
}
