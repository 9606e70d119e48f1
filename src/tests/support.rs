//! Fake collaborators for scenario tests.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Local, TimeZone};
use image::RgbaImage;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::tracker::{
    Clock, DisplayBounds, DisplayCapture, DisplayInfo, EventLog, IdleDetector, IdleReport,
    InputEventSource, InputObserver, Intervals, LastInputSource, ManualClock, Notifier,
    ScreenshotScheduler, SessionController, TrackerEvent, TrackerParts,
};

pub fn t0() -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 4, 7, 9, 30, 0).unwrap()
}

pub const NEVER: Duration = Duration::from_secs(3600);

/// Short periods with deadlines loose enough that a slow test machine never
/// trips them.
pub fn intervals(tick: Duration, idle_check: Duration, screenshot: Duration) -> Intervals {
    Intervals {
        idle_check_deadline: Duration::from_secs(2),
        screenshot_deadline: Duration::from_secs(2),
        ..Intervals::new(tick, idle_check, screenshot)
    }
}

/// Counts calls instead of looking at input.
#[derive(Default)]
pub struct RecordingDetector {
    pub evaluations: AtomicUsize,
    pub attaches: AtomicUsize,
    pub releases: AtomicUsize,
    pub resets: AtomicUsize,
}

impl IdleDetector for RecordingDetector {
    fn evaluate(&self, _now: DateTime<Local>) -> IdleReport {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        IdleReport::active("recorded")
    }

    fn attach(&self) -> Result<()> {
        self.attaches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Input stream driven by the test.
#[derive(Default)]
pub struct ScriptedInput {
    observer: Mutex<Option<Arc<dyn InputObserver>>>,
}

impl ScriptedInput {
    pub fn press_keys(&self, n: usize) {
        for _ in 0..n {
            if let Some(observer) = self.observer.lock().unwrap().as_ref() {
                observer.on_key_event();
            }
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.observer.lock().unwrap().is_some()
    }
}

impl InputEventSource for ScriptedInput {
    fn subscribe(&self, observer: Arc<dyn InputObserver>) -> Result<()> {
        *self.observer.lock().unwrap() = Some(observer);
        Ok(())
    }

    fn unsubscribe(&self) {
        *self.observer.lock().unwrap() = None;
    }
}

/// Displays that hand back blank images, optionally failing some of them.
pub struct FakeDisplays {
    pub ids: Vec<&'static str>,
    pub failing: Vec<&'static str>,
    pub captures: AtomicUsize,
}

impl FakeDisplays {
    pub fn new(ids: Vec<&'static str>, failing: Vec<&'static str>) -> Self {
        Self {
            ids,
            failing,
            captures: AtomicUsize::new(0),
        }
    }
}

impl DisplayCapture for FakeDisplays {
    fn displays(&self) -> Result<Vec<DisplayInfo>> {
        Ok(self
            .ids
            .iter()
            .map(|id| DisplayInfo {
                id: id.to_string(),
                bounds: DisplayBounds {
                    x: 0,
                    y: 0,
                    width: 2,
                    height: 2,
                },
            })
            .collect())
    }

    fn capture(&self, display: &DisplayInfo) -> Result<RgbaImage> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&display.id.as_str()) {
            return Err(anyhow!("disk full"));
        }
        Ok(RgbaImage::new(display.bounds.width, display.bounds.height))
    }
}

/// A last-input query that takes `0` to answer.
pub struct StalledLastInput(pub Duration);

impl LastInputSource for StalledLastInput {
    fn last_input(&self) -> Result<DateTime<Local>> {
        std::thread::sleep(self.0);
        Ok(t0())
    }
}

/// One display whose capture takes `0` to return.
pub struct StalledDisplay(pub Duration);

impl DisplayCapture for StalledDisplay {
    fn displays(&self) -> Result<Vec<DisplayInfo>> {
        Ok(vec![DisplayInfo {
            id: "eDP-1".to_string(),
            bounds: DisplayBounds {
                x: 0,
                y: 0,
                width: 2,
                height: 2,
            },
        }])
    }

    fn capture(&self, display: &DisplayInfo) -> Result<RgbaImage> {
        std::thread::sleep(self.0);
        Ok(RgbaImage::new(display.bounds.width, display.bounds.height))
    }
}

pub struct Harness {
    pub controller: SessionController,
    pub events: UnboundedReceiver<TrackerEvent>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(
        log_path: &Path,
        screenshot_dir: &Path,
        detector: Arc<dyn IdleDetector>,
        capture: Arc<dyn DisplayCapture>,
        intervals: Intervals,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let (notifier, events) = Notifier::channel();
        let shared_clock: Arc<dyn Clock> = clock.clone();
        let parts = TrackerParts {
            event_log: EventLog::new(log_path),
            screenshots: ScreenshotScheduler::new(screenshot_dir, capture),
            detector,
            clock: shared_clock,
            notifier,
        };
        Self {
            controller: SessionController::new(parts, intervals),
            events,
            clock,
        }
    }

    pub fn drain(&mut self) -> Vec<TrackerEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }

    pub fn history(&mut self) -> Vec<String> {
        self.drain()
            .into_iter()
            .filter_map(|event| match event {
                TrackerEvent::History { line } => Some(line),
                _ => None,
            })
            .collect()
    }
}
