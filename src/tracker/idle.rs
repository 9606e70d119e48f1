use anyhow::Result;
use chrono::{DateTime, Local, TimeDelta};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::tracker::input::{InputEventSource, InputObserver};

/// Outcome of one idle check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdleReport {
    pub is_idle: bool,
    /// Human-readable summary for the history list and diagnostics.
    pub detail: String,
}

impl IdleReport {
    pub fn idle(detail: impl Into<String>) -> Self {
        Self {
            is_idle: true,
            detail: detail.into(),
        }
    }

    pub fn active(detail: impl Into<String>) -> Self {
        Self {
            is_idle: false,
            detail: detail.into(),
        }
    }
}

/// Reports whether the user has been idle since the previous check.
///
/// Implementations never fail: a fault inside the detector yields a
/// not-idle report.
pub trait IdleDetector: Send + Sync {
    fn evaluate(&self, now: DateTime<Local>) -> IdleReport;

    /// Starts observing input, if the strategy needs to.
    fn attach(&self) -> Result<()> {
        Ok(())
    }

    /// Stops observing input. Must tolerate repeated calls.
    fn release(&self) {}

    /// Discards whatever was observed so far.
    fn reset(&self) {}
}

/// Key and mouse tallies for the current window.
#[derive(Debug, Default)]
pub struct ActivityCounters {
    keyboard: AtomicU64,
    mouse: AtomicU64,
}

impl ActivityCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.keyboard.load(Ordering::SeqCst),
            self.mouse.load(Ordering::SeqCst),
        )
    }

    /// Reads and zeroes both counters. Each counter is swapped in one atomic
    /// step, so an event racing the boundary lands in exactly one window.
    pub fn take(&self) -> (u64, u64) {
        (
            self.keyboard.swap(0, Ordering::SeqCst),
            self.mouse.swap(0, Ordering::SeqCst),
        )
    }
}

impl InputObserver for ActivityCounters {
    fn on_key_event(&self) {
        self.keyboard.fetch_add(1, Ordering::SeqCst);
    }

    fn on_mouse_event(&self) {
        self.mouse.fetch_add(1, Ordering::SeqCst);
    }
}

/// Idle when no key or mouse event arrived since the last evaluation.
pub struct CounterIdleDetector {
    counters: Arc<ActivityCounters>,
    source: Arc<dyn InputEventSource>,
    attached: AtomicBool,
}

impl CounterIdleDetector {
    pub fn new(source: Arc<dyn InputEventSource>) -> Self {
        Self {
            counters: Arc::new(ActivityCounters::new()),
            source,
            attached: AtomicBool::new(false),
        }
    }

    pub fn counters(&self) -> &Arc<ActivityCounters> {
        &self.counters
    }
}

impl IdleDetector for CounterIdleDetector {
    fn evaluate(&self, _now: DateTime<Local>) -> IdleReport {
        let (keys, mouse) = self.counters.take();

        if !self.attached.load(Ordering::SeqCst) || !self.source.is_healthy() {
            return IdleReport::active("input monitoring unavailable");
        }

        let detail = format!("Keys: {}, Mouse: {}", keys, mouse);
        if keys == 0 && mouse == 0 {
            IdleReport::idle(detail)
        } else {
            IdleReport::active(detail)
        }
    }

    fn attach(&self) -> Result<()> {
        if self.attached.load(Ordering::SeqCst) {
            return Ok(());
        }
        let observer: Arc<dyn InputObserver> = self.counters.clone();
        self.source.subscribe(observer)?;
        self.attached.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) {
        if self.attached.swap(false, Ordering::SeqCst) {
            self.source.unsubscribe();
            log::info!("Input subscription released");
        }
    }

    fn reset(&self) {
        self.counters.take();
    }
}

/// OS capability returning the time of the last system-wide input.
pub trait LastInputSource: Send + Sync {
    fn last_input(&self) -> Result<DateTime<Local>>;
}

/// Idle when the OS reports no input for at least one check interval.
pub struct OsQueryIdleDetector {
    source: Arc<dyn LastInputSource>,
    threshold: TimeDelta,
}

impl OsQueryIdleDetector {
    pub fn new(source: Arc<dyn LastInputSource>, idle_check_interval: Duration) -> Self {
        Self {
            source,
            threshold: TimeDelta::from_std(idle_check_interval).unwrap_or(TimeDelta::MAX),
        }
    }
}

impl IdleDetector for OsQueryIdleDetector {
    fn evaluate(&self, now: DateTime<Local>) -> IdleReport {
        match self.source.last_input() {
            Ok(last_input) => {
                let idle_for = now - last_input;
                let secs = idle_for.num_seconds().max(0);
                if idle_for >= self.threshold {
                    IdleReport::idle(format!("No input for {}s", secs))
                } else {
                    IdleReport::active(format!("Last input {}s ago", secs))
                }
            }
            Err(e) => {
                log::warn!("Idle query failed, assuming active: {:#}", e);
                IdleReport::active("idle query unavailable")
            }
        }
    }
}
