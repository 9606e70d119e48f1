use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Local, TimeDelta};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::OnceCell;
use zbus::Connection;

use crate::tracker::idle::LastInputSource;

/// Last-input time from the desktop session over D-Bus.
///
/// Tries GNOME Mutter's idle monitor first, then the freedesktop ScreenSaver
/// interface (KDE and others). `last_input` blocks on the runtime handle, so
/// call it from a blocking thread (`spawn_blocking`), never from async code.
/// A query that has not answered within `deadline` fails.
pub struct DbusIdleQuery {
    runtime: Handle,
    deadline: Duration,
    connection: OnceCell<Connection>,
}

impl DbusIdleQuery {
    pub fn new(runtime: Handle, deadline: Duration) -> Self {
        Self {
            runtime,
            deadline,
            connection: OnceCell::new(),
        }
    }

    async fn connection(&self) -> Result<&Connection> {
        self.connection
            .get_or_try_init(|| async { Connection::session().await })
            .await
            .context("Failed to connect to the D-Bus session bus")
    }

    async fn idle_millis(&self) -> Result<u64> {
        let connection = self.connection().await?;

        match Self::mutter_idle_time(connection).await {
            Ok(idle_ms) => Ok(idle_ms),
            Err(e1) => {
                log::debug!("Mutter IdleMonitor failed: {}", e1);
                match Self::screensaver_idle_time(connection).await {
                    Ok(idle_ms) => Ok(idle_ms),
                    Err(e2) => {
                        log::debug!("ScreenSaver GetSessionIdleTime failed: {}", e2);
                        Err(anyhow!(
                            "no idle monitor available (mutter: {}; screensaver: {})",
                            e1,
                            e2
                        ))
                    }
                }
            }
        }
    }

    async fn mutter_idle_time(connection: &Connection) -> Result<u64> {
        let response = connection
            .call_method(
                Some("org.gnome.Mutter.IdleMonitor"),
                "/org/gnome/Mutter/IdleMonitor/Core",
                Some("org.gnome.Mutter.IdleMonitor"),
                "GetIdletime",
                &(),
            )
            .await?;
        let idle_ms: u64 = response.body().deserialize()?;
        Ok(idle_ms)
    }

    async fn screensaver_idle_time(connection: &Connection) -> Result<u64> {
        let response = connection
            .call_method(
                Some("org.freedesktop.ScreenSaver"),
                "/org/freedesktop/ScreenSaver",
                Some("org.freedesktop.ScreenSaver"),
                "GetSessionIdleTime",
                &(),
            )
            .await?;
        let idle_ms: u32 = response.body().deserialize()?;
        Ok(u64::from(idle_ms))
    }
}

impl LastInputSource for DbusIdleQuery {
    fn last_input(&self) -> Result<DateTime<Local>> {
        let idle_ms = self
            .runtime
            .block_on(tokio::time::timeout(self.deadline, self.idle_millis()))
            .map_err(|_| anyhow!("idle query timed out after {:?}", self.deadline))??;
        log::debug!("Session idle time: {} ms", idle_ms);
        Ok(last_input_from_idle(Local::now(), idle_ms))
    }
}

pub(crate) fn last_input_from_idle(now: DateTime<Local>, idle_ms: u64) -> DateTime<Local> {
    let idle = i64::try_from(idle_ms)
        .ok()
        .and_then(TimeDelta::try_milliseconds)
        .unwrap_or(TimeDelta::MAX);
    now.checked_sub_signed(idle)
        .unwrap_or_else(|| now - TimeDelta::days(36_500))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_last_input_from_idle_millis() {
        let now = Local.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(last_input_from_idle(now, 0), now);
        assert_eq!(last_input_from_idle(now, 12_500), now - TimeDelta::milliseconds(12_500));
    }

    #[test]
    fn test_absurd_idle_time_saturates() {
        let now = Local.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert!(last_input_from_idle(now, u64::MAX) < now - TimeDelta::days(365));
    }
}
