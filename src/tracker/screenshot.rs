use anyhow::Result;
use chrono::{DateTime, Local};
use image::{ImageFormat, RgbaImage};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::TrackerError;

/// Position and size of a display in virtual screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayInfo {
    pub id: String,
    pub bounds: DisplayBounds,
}

/// Enumerates active displays and grabs their contents.
pub trait DisplayCapture: Send + Sync {
    fn displays(&self) -> Result<Vec<DisplayInfo>>;
    fn capture(&self, display: &DisplayInfo) -> Result<RgbaImage>;
}

/// What happened during one screenshot firing.
#[derive(Debug)]
pub struct CaptureReport {
    pub taken_at: DateTime<Local>,
    pub attempted: usize,
    pub saved: Vec<PathBuf>,
    pub failures: Vec<TrackerError>,
}

impl CaptureReport {
    fn new(taken_at: DateTime<Local>) -> Self {
        Self {
            taken_at,
            attempted: 0,
            saved: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.saved.is_empty()
    }

    /// One history line for the whole firing.
    pub fn summary(&self) -> String {
        match self.failures.first() {
            None if self.saved.is_empty() => "Screenshot skipped: no active displays".to_string(),
            None => format!("Screenshot saved: {}", self.taken_at.format("%H:%M:%S")),
            Some(first) if self.attempted > 1 => format!(
                "Screenshot error: {} ({} of {} displays failed)",
                first,
                self.failures.len(),
                self.attempted
            ),
            Some(first) => format!("Screenshot error: {}", first),
        }
    }
}

/// Captures every active display into `<root>/<yyyy-MM-dd>/`.
pub struct ScreenshotScheduler {
    root: PathBuf,
    capture: Arc<dyn DisplayCapture>,
}

impl ScreenshotScheduler {
    pub fn new(root: impl Into<PathBuf>, capture: Arc<dyn DisplayCapture>) -> Self {
        Self {
            root: root.into(),
            capture,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn day_dir(&self, at: DateTime<Local>) -> PathBuf {
        self.root.join(at.format("%Y-%m-%d").to_string())
    }

    /// Runs one firing. Failures are collected in the report, never returned:
    /// one display failing does not stop the others.
    pub fn capture_all(&self, at: DateTime<Local>) -> CaptureReport {
        let mut report = CaptureReport::new(at);

        let day_dir = self.day_dir(at);
        if let Err(source) = fs::create_dir_all(&day_dir) {
            report.failures.push(TrackerError::ScreenshotDir {
                path: day_dir,
                source,
            });
            return report;
        }

        let displays = match self.capture.displays() {
            Ok(displays) => displays,
            Err(e) => {
                report.failures.push(TrackerError::Capture {
                    display: "*".to_string(),
                    message: format!("{:#}", e),
                });
                return report;
            }
        };

        let mut used = HashSet::new();
        for display in &displays {
            report.attempted += 1;
            match self.capture_one(display, &day_dir, at, &mut used) {
                Ok(path) => {
                    log::debug!("Saved screenshot of {} to {}", display.id, path.display());
                    report.saved.push(path);
                }
                Err(e) => {
                    log::warn!("{}", e);
                    report.failures.push(e);
                }
            }
        }

        report
    }

    fn capture_one(
        &self,
        display: &DisplayInfo,
        day_dir: &Path,
        at: DateTime<Local>,
        used: &mut HashSet<PathBuf>,
    ) -> Result<PathBuf, TrackerError> {
        let image = self
            .capture
            .capture(display)
            .map_err(|e| TrackerError::Capture {
                display: display.id.clone(),
                message: format!("{:#}", e),
            })?;

        let path = unique_path(day_dir, &file_stem(&display.id, at), used);
        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| TrackerError::Persist {
                path: path.clone(),
                message: e.to_string(),
            })?;
        Ok(path)
    }
}

/// `screen_<display>_<HHmmss>` with the display id made filesystem-safe.
pub fn file_stem(display_id: &str, at: DateTime<Local>) -> String {
    format!("screen_{}_{}", sanitize_display_id(display_id), at.format("%H%M%S"))
}

pub fn sanitize_display_id(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "display".to_string()
    } else {
        cleaned
    }
}

/// First of `stem.png`, `stem-1.png`, ... not on disk and not claimed earlier
/// in this firing.
fn unique_path(dir: &Path, stem: &str, used: &mut HashSet<PathBuf>) -> PathBuf {
    let mut candidate = dir.join(format!("{}.png", stem));
    let mut n = 1;
    while used.contains(&candidate) || candidate.exists() {
        candidate = dir.join(format!("{}-{}.png", stem, n));
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}
