use chrono::{DateTime, Duration, Local};

/// The two states of the tracking state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    NotTracking,
    Tracking { start_time: DateTime<Local> },
}

/// The single tracked session of this process.
///
/// The start time lives inside the `Tracking` variant, so it exists exactly
/// when a session is active.
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.state, SessionState::Tracking { .. })
    }

    pub fn start_time(&self) -> Option<DateTime<Local>> {
        match self.state {
            SessionState::Tracking { start_time } => Some(start_time),
            SessionState::NotTracking => None,
        }
    }

    /// Elapsed time of the active session at `now`, never negative.
    pub fn elapsed_at(&self, now: DateTime<Local>) -> Option<Duration> {
        self.start_time().map(|start| clamp_elapsed(now - start))
    }

    /// NotTracking -> Tracking. Returns false if a session was already active.
    pub fn begin(&mut self, now: DateTime<Local>) -> bool {
        if self.is_tracking() {
            return false;
        }
        self.state = SessionState::Tracking { start_time: now };
        true
    }

    /// Tracking -> NotTracking, returning `(start_time, elapsed)` of the
    /// session that just ended.
    pub fn end(&mut self, now: DateTime<Local>) -> Option<(DateTime<Local>, Duration)> {
        let start = self.start_time()?;
        self.state = SessionState::NotTracking;
        Some((start, clamp_elapsed(now - start)))
    }
}

fn clamp_elapsed(delta: Duration) -> Duration {
    if delta < Duration::zero() {
        Duration::zero()
    } else {
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap() + Duration::seconds(secs as i64)
    }

    #[test]
    fn test_start_time_defined_only_while_tracking() {
        let mut session = Session::new();
        assert_eq!(session.start_time(), None);

        assert!(session.begin(at(0)));
        assert_eq!(session.start_time(), Some(at(0)));

        let (start, elapsed) = session.end(at(30)).unwrap();
        assert_eq!(start, at(0));
        assert_eq!(elapsed, Duration::seconds(30));
        assert_eq!(session.start_time(), None);
        assert_eq!(session.state(), SessionState::NotTracking);
    }

    #[test]
    fn test_double_begin_keeps_original_start() {
        let mut session = Session::new();
        assert!(session.begin(at(0)));
        assert!(!session.begin(at(10)));
        assert_eq!(session.start_time(), Some(at(0)));
    }

    #[test]
    fn test_end_without_begin_is_noop() {
        let mut session = Session::new();
        assert!(session.end(at(5)).is_none());
    }

    #[test]
    fn test_elapsed_clamped_when_clock_goes_backwards() {
        let mut session = Session::new();
        session.begin(at(100));
        assert_eq!(session.elapsed_at(at(40)), Some(Duration::zero()));
        let (_, elapsed) = session.end(at(50)).unwrap();
        assert_eq!(elapsed, Duration::zero());
    }
}
