use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// A writer that flushes after every write so log lines survive a crash.
struct FlushingWriter {
    inner: Arc<Mutex<File>>,
}

impl FlushingWriter {
    fn new(file: File) -> Self {
        Self {
            inner: Arc::new(Mutex::new(file)),
        }
    }
}

impl Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut file = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let result = file.write(buf);
        file.flush()?;
        result
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut file = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        file.flush()
    }
}

/// Diagnostic logging. With `debug_enabled` everything at debug and above
/// goes to `log_path`; otherwise logging is off unless `RUST_LOG` says
/// otherwise.
pub fn init(debug_enabled: bool, log_path: &Path) -> Result<()> {
    if debug_enabled {
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("timetracker=debug"))
            .target(env_logger::Target::Pipe(Box::new(FlushingWriter::new(log_file))))
            .init();

        log::info!("=== DEBUG LOGGING ENABLED ===");
        log::info!("Writing logs to {}", log_path.display());
        log::info!("To disable: Remove DEBUG_LOGS_ENABLED from .env or set to false");
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off")).init();
    }
    Ok(())
}
