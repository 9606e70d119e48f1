use anyhow::{Context, Result, anyhow, bail};
use image::{ImageFormat, RgbaImage};
use std::env;
use std::time::Duration;
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::time;

use crate::tracker::screenshot::{DisplayBounds, DisplayCapture, DisplayInfo};

/// Screen capture through the usual desktop tools.
///
/// Monitors come from `xrandr --listmonitors`. Pixels come from `grim` on
/// Wayland sessions and ImageMagick `import` on X11. Each tool runs on the
/// given runtime and is killed once it outlives `deadline`, so both trait
/// methods must be called from a blocking thread.
pub struct CommandCapture {
    use_wayland: bool,
    runtime: Handle,
    deadline: Duration,
}

impl CommandCapture {
    pub fn new(runtime: Handle, deadline: Duration) -> Self {
        let use_wayland = Self::is_wayland();
        if use_wayland {
            log::info!("Session type: Wayland - capturing with grim");
        } else {
            log::info!("Session type: X11 - capturing with ImageMagick import");
        }
        Self {
            use_wayland,
            runtime,
            deadline,
        }
    }

    fn is_wayland() -> bool {
        env::var("WAYLAND_DISPLAY").is_ok()
            || env::var("XDG_SESSION_TYPE").map(|s| s == "wayland").unwrap_or(false)
    }

    fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>> {
        self.runtime.block_on(run_with_deadline(program, args, self.deadline))
    }
}

/// Runs `program` to completion and returns its stdout. The child is killed
/// if it has not exited within `deadline`.
pub async fn run_with_deadline(
    program: &str,
    args: &[String],
    deadline: Duration,
) -> Result<Vec<u8>> {
    let running = Command::new(program).args(args).kill_on_drop(true).output();
    let output = match time::timeout(deadline, running).await {
        Ok(result) => result.with_context(|| format!("Failed to run {}", program))?,
        Err(_) => bail!("{} did not finish within {:?}", program, deadline),
    };
    if !output.status.success() {
        bail!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(output.stdout)
}

impl DisplayCapture for CommandCapture {
    fn displays(&self) -> Result<Vec<DisplayInfo>> {
        let stdout = self.run("xrandr", &["--listmonitors".to_string()])?;
        let displays = parse_listmonitors(&String::from_utf8_lossy(&stdout));
        if displays.is_empty() {
            return Err(anyhow!("xrandr reported no monitors"));
        }
        Ok(displays)
    }

    fn capture(&self, display: &DisplayInfo) -> Result<RgbaImage> {
        let b = display.bounds;
        let png = if self.use_wayland {
            self.run(
                "grim",
                &[
                    "-g".to_string(),
                    format!("{},{} {}x{}", b.x, b.y, b.width, b.height),
                    "-".to_string(),
                ],
            )?
        } else {
            self.run(
                "import",
                &[
                    "-window".to_string(),
                    "root".to_string(),
                    "-crop".to_string(),
                    format!("{}x{}{:+}{:+}", b.width, b.height, b.x, b.y),
                    "png:-".to_string(),
                ],
            )?
        };

        let image = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .with_context(|| format!("Capture of {} returned an unreadable image", display.id))?;
        Ok(image.to_rgba8())
    }
}

/// Parses `xrandr --listmonitors` output:
///
/// ```text
/// Monitors: 2
///  0: +*eDP-1 1920/344x1080/194+0+0  eDP-1
///  1: +HDMI-1 2560/597x1440/336+1920+0  HDMI-1
/// ```
pub fn parse_listmonitors(output: &str) -> Vec<DisplayInfo> {
    output
        .lines()
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 4 || !tokens[0].ends_with(':') {
                return None;
            }
            let bounds = parse_geometry(tokens[2])?;
            let id = tokens[tokens.len() - 1].to_string();
            Some(DisplayInfo { id, bounds })
        })
        .collect()
}

/// `1920/344x1080/194+0+0` (physical sizes after `/` are ignored).
fn parse_geometry(token: &str) -> Option<DisplayBounds> {
    let (width_part, rest) = token.split_once('x')?;
    let width = width_part.split('/').next()?.parse().ok()?;

    let offset_start = rest.find(['+', '-'])?;
    let (height_part, offsets) = rest.split_at(offset_start);
    let height = height_part.split('/').next()?.parse().ok()?;

    let (x, y) = split_offsets(offsets)?;
    Some(DisplayBounds {
        x,
        y,
        width,
        height,
    })
}

/// `+1920+0`, `-1920+0`, `+0-1080`
fn split_offsets(offsets: &str) -> Option<(i32, i32)> {
    let second = offsets[1..].find(['+', '-'])? + 1;
    let (x, y) = offsets.split_at(second);
    Some((x.parse().ok()?, y.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_hung_tool_is_killed_at_deadline() {
        let started = Instant::now();
        let err = run_with_deadline("sleep", &["5".to_string()], Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(err.to_string().starts_with("sleep did not finish within"), "{err}");
    }

    #[tokio::test]
    async fn test_failing_tool_reports_exit_status() {
        let err = run_with_deadline("false", &[], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("false exited with"), "{err}");
    }

    #[tokio::test]
    async fn test_tool_output_is_returned() {
        let stdout = run_with_deadline("echo", &["monitors".to_string()], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&stdout).trim(), "monitors");
    }

    #[test]
    fn test_parse_listmonitors_two_monitors() {
        let output = "Monitors: 2\n \
                      0: +*eDP-1 1920/344x1080/194+0+0  eDP-1\n \
                      1: +HDMI-1 2560/597x1440/336+1920+0  HDMI-1\n";
        let displays = parse_listmonitors(output);
        assert_eq!(
            displays,
            vec![
                DisplayInfo {
                    id: "eDP-1".to_string(),
                    bounds: DisplayBounds { x: 0, y: 0, width: 1920, height: 1080 },
                },
                DisplayInfo {
                    id: "HDMI-1".to_string(),
                    bounds: DisplayBounds { x: 1920, y: 0, width: 2560, height: 1440 },
                },
            ]
        );
    }

    #[test]
    fn test_parse_geometry_negative_offsets() {
        assert_eq!(
            parse_geometry("1280/300x1024/240-1280+0"),
            Some(DisplayBounds { x: -1280, y: 0, width: 1280, height: 1024 })
        );
        assert_eq!(
            parse_geometry("800/1x600/1+0-600"),
            Some(DisplayBounds { x: 0, y: -600, width: 800, height: 600 })
        );
    }

    #[test]
    fn test_parse_listmonitors_ignores_noise() {
        assert!(parse_listmonitors("Monitors: 0\n").is_empty());
        assert!(parse_listmonitors(" 0: +X garbage X\n").is_empty());
    }
}
