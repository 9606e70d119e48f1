pub mod clock;
pub mod controller;
pub mod display;
pub mod event_log;
pub mod events;
pub mod idle;
pub mod idle_query;
pub mod input;
pub mod screenshot;
pub mod status;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{Intervals, SessionController, TrackerParts, Transition};
pub use event_log::EventLog;
pub use events::{Notifier, TrackerEvent};
pub use idle::{CounterIdleDetector, IdleDetector, IdleReport, LastInputSource, OsQueryIdleDetector};
pub use input::{InputEventSource, InputObserver};
pub use screenshot::{CaptureReport, DisplayBounds, DisplayCapture, DisplayInfo, ScreenshotScheduler};
