use anyhow::{Context, Result};
use rdev::{EventType, listen};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Receives arrival of global input events. Payloads are never forwarded.
pub trait InputObserver: Send + Sync {
    fn on_key_event(&self);
    fn on_mouse_event(&self);
}

/// Global keyboard/mouse event stream.
pub trait InputEventSource: Send + Sync {
    /// Routes events to `observer` until `unsubscribe` is called. Replaces
    /// any previous observer.
    fn subscribe(&self, observer: Arc<dyn InputObserver>) -> Result<()>;

    /// Stops delivery. Safe to call repeatedly or without a subscription.
    fn unsubscribe(&self);

    /// False once the source knows it can no longer deliver events.
    fn is_healthy(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Key,
    Mouse,
}

/// Key-down, mouse move and mouse click count as activity. Releases and
/// wheel events do not.
pub fn classify(event: &EventType) -> Option<InputKind> {
    match event {
        EventType::KeyPress(_) => Some(InputKind::Key),
        EventType::MouseMove { .. } | EventType::ButtonPress(_) => Some(InputKind::Mouse),
        _ => None,
    }
}

type ObserverSlot = Arc<Mutex<Option<Arc<dyn InputObserver>>>>;

/// Global input hook backed by `rdev::listen`.
///
/// rdev offers no way to stop its listener, so the thread is started once and
/// unsubscribing just empties the observer slot.
pub struct RdevInputSource {
    observer: ObserverSlot,
    started: AtomicBool,
    failed: Arc<AtomicBool>,
}

impl Default for RdevInputSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RdevInputSource {
    pub fn new() -> Self {
        Self {
            observer: Arc::new(Mutex::new(None)),
            started: AtomicBool::new(false),
            failed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn start_listener(&self) -> Result<()> {
        let observer = Arc::clone(&self.observer);
        let failed = Arc::clone(&self.failed);

        std::thread::Builder::new()
            .name("input-listener".to_string())
            .spawn(move || {
                let callback = move |event: rdev::Event| {
                    let Some(kind) = classify(&event.event_type) else {
                        return;
                    };
                    let Ok(slot) = observer.lock() else {
                        return;
                    };
                    if let Some(observer) = slot.as_ref() {
                        match kind {
                            InputKind::Key => observer.on_key_event(),
                            InputKind::Mouse => observer.on_mouse_event(),
                        }
                    }
                };
                if let Err(error) = listen(callback) {
                    log::error!("Error listening for input events: {:?}", error);
                    failed.store(true, Ordering::SeqCst);
                }
            })
            .context("Failed to spawn input listener thread")?;

        log::info!("Global input listener started");
        Ok(())
    }
}

impl InputEventSource for RdevInputSource {
    fn subscribe(&self, observer: Arc<dyn InputObserver>) -> Result<()> {
        match self.observer.lock() {
            Ok(mut slot) => *slot = Some(observer),
            Err(poisoned) => *poisoned.into_inner() = Some(observer),
        }

        if !self.started.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.start_listener() {
                self.failed.store(true, Ordering::SeqCst);
                return Err(e);
            }
        }
        Ok(())
    }

    fn unsubscribe(&self) {
        match self.observer.lock() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    fn is_healthy(&self) -> bool {
        !self.failed.load(Ordering::SeqCst)
    }
}
