//! Wallpaper application backends.
//!
//! The engine talks to a [`WallpaperApplier`], so the rotation logic stays
//! independent of how a platform actually sets an image.

#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "windows")]
pub use self::windows::{WindowsApplier, WindowsFullscreen, WindowsMonitors};

use crate::error::ApplyError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Applies images to the desktop, a single monitor, or the lock screen.
///
/// Re-applying the same path must be harmless; the engine does not
/// deduplicate.
#[async_trait]
pub trait WallpaperApplier: Send + Sync {
    async fn apply_desktop(&self, path: &Path) -> Result<(), ApplyError>;
    async fn apply_monitor(&self, device_id: &str, path: &Path) -> Result<(), ApplyError>;
    async fn apply_lock_screen(&self, path: &Path) -> Result<(), ApplyError>;
}

/// Reports whether a fullscreen application currently owns the foreground.
pub trait FullscreenDetector: Send + Sync {
    fn fullscreen_active(&self) -> bool;
}

/// Detector for platforms without a fullscreen query.
pub struct NoFullscreen;

impl FullscreenDetector for NoFullscreen {
    fn fullscreen_active(&self) -> bool {
        false
    }
}

/// Apply section of the config file.
///
/// Command templates expand `%f` to the image path and `%d` to the monitor
/// device id before running through the shell.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyConfig {
    /// Command for the whole desktop, e.g. `feh --bg-fill %f`.
    #[serde(default)]
    pub desktop_command: String,
    /// Command for one monitor, e.g. `swww img -o %d %f`.
    #[serde(default)]
    pub monitor_command: String,
    /// Command for the lock screen image.
    #[serde(default)]
    pub lock_screen_command: String,
    /// Monitor device ids, in index order, for setups where the compositor
    /// cannot be queried directly.
    #[serde(default)]
    pub monitors: Vec<String>,
}

/// Applier that shells out to user-configured command templates.
pub struct CommandApplier {
    config: ApplyConfig,
}

impl CommandApplier {
    pub fn new(config: ApplyConfig) -> Self {
        Self { config }
    }

    async fn run(
        &self,
        template: &str,
        surface: &'static str,
        path: &Path,
        device_id: &str,
    ) -> Result<(), ApplyError> {
        if template.trim().is_empty() {
            return Err(ApplyError::NoCommand(surface));
        }

        let command = template
            .replace("%f", &path.display().to_string())
            .replace("%d", device_id);
        debug!("Applying {} wallpaper: {}", surface, command);

        let status = shell(&command).status().await?;
        if !status.success() {
            return Err(ApplyError::CommandFailed { command, status });
        }
        Ok(())
    }
}

fn shell(command: &str) -> tokio::process::Command {
    #[cfg(target_os = "windows")]
    {
        let mut cmd = tokio::process::Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    }
    #[cfg(not(target_os = "windows"))]
    {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

#[async_trait]
impl WallpaperApplier for CommandApplier {
    async fn apply_desktop(&self, path: &Path) -> Result<(), ApplyError> {
        self.run(&self.config.desktop_command, "desktop", path, "").await
    }

    async fn apply_monitor(&self, device_id: &str, path: &Path) -> Result<(), ApplyError> {
        self.run(&self.config.monitor_command, "monitor", path, device_id)
            .await
    }

    async fn apply_lock_screen(&self, path: &Path) -> Result<(), ApplyError> {
        self.run(&self.config.lock_screen_command, "lock screen", path, "")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn applier(desktop: &str, monitor: &str, lock: &str) -> CommandApplier {
        CommandApplier::new(ApplyConfig {
            desktop_command: desktop.to_string(),
            monitor_command: monitor.to_string(),
            lock_screen_command: lock.to_string(),
            monitors: Vec::new(),
        })
    }

    #[tokio::test]
    async fn empty_template_reports_no_command() {
        let applier = applier("", "", "");
        let err = applier
            .apply_desktop(Path::new("/tmp/a.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplyError::NoCommand("desktop")));
    }

    #[cfg(not(target_os = "windows"))]
    #[tokio::test]
    async fn successful_command_passes() {
        let applier = applier("true", "", "");
        applier.apply_desktop(Path::new("/tmp/a.jpg")).await.unwrap();
    }

    #[cfg(not(target_os = "windows"))]
    #[tokio::test]
    async fn failing_command_reports_status() {
        let applier = applier("false", "", "");
        let err = applier
            .apply_desktop(Path::new("/tmp/a.jpg"))
            .await
            .unwrap_err();
        match err {
            ApplyError::CommandFailed { command, status } => {
                assert_eq!(command, "false");
                assert!(!status.success());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(not(target_os = "windows"))]
    #[tokio::test]
    async fn placeholders_reach_the_shell() {
        let dir = std::env::temp_dir().join(format!("wallflow-apply-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let marker = dir.join("paper.png");
        std::fs::write(&marker, b"x").unwrap();

        // `test -f %f` only succeeds when the substituted path exists.
        let applier = applier("", "test -f %f && test -n '%d'", "");
        applier.apply_monitor("DP-1", &marker).await.unwrap();

        let missing = PathBuf::from(dir.join("absent.png"));
        let err = applier.apply_monitor("DP-1", &missing).await.unwrap_err();
        assert!(matches!(err, ApplyError::CommandFailed { .. }));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn no_fullscreen_detector_never_pauses() {
        assert!(!NoFullscreen.fullscreen_active());
    }
}
