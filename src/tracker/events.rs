use serde::Serialize;
use tokio::sync::mpsc;

use crate::tracker::status::{ActivityColor, ActivityLabel};

/// Notifications from the tracker to whatever host renders them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TrackerEvent {
    Status { text: String },
    Tracking { active: bool },
    Activity {
        label: String,
        color: ActivityColor,
        detail: String,
    },
    History { line: String },
}

impl TrackerEvent {
    pub fn activity(label: ActivityLabel, detail: impl Into<String>) -> Self {
        TrackerEvent::Activity {
            label: label.text,
            color: label.color,
            detail: detail.into(),
        }
    }

    pub fn history(line: impl Into<String>) -> Self {
        TrackerEvent::History { line: line.into() }
    }
}

/// Sending half handed to the controller and its periodic tasks.
///
/// A host that has gone away is not an error; events are simply dropped.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<TrackerEvent>,
}

impl Notifier {
    pub fn new(tx: mpsc::UnboundedSender<TrackerEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TrackerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn send(&self, event: TrackerEvent) {
        if self.tx.send(event).is_err() {
            log::debug!("Tracker event dropped: host receiver closed");
        }
    }
}
