//! Rotation targets and the per-tick resolution rules.
//!
//! Resolution is a pure function of the config snapshot and the monitor
//! list; every random choice happens later, during orchestration.

use crate::monitors::MonitorInfo;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rotation section of the config file, also the per-tick mode snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Give each monitor its own wallpaper from its own tag set.
    #[serde(default)]
    pub per_monitor: bool,
    /// Give each monitor its own wallpaper from one shared query.
    #[serde(default)]
    pub monitors_randomized: bool,
    /// Rotate the lock screen independently from its own tag set.
    #[serde(default)]
    pub lock_screen_separate: bool,
    /// Fetch a fresh lock screen image instead of reusing the desktop's.
    #[serde(default)]
    pub lock_screen_randomized: bool,
    /// Pick the lock screen's source monitor at random each tick.
    #[serde(default)]
    pub lock_screen_source_randomized: bool,
    /// Monitor the lock screen follows in per-monitor mode.
    #[serde(default)]
    pub lock_screen_monitor: usize,
    /// Chance, in percent, that a target gets a stored favorite instead of
    /// a fresh search.
    #[serde(default = "default_favorites_percent")]
    pub favorites_percent: u8,
    /// Hold rotations while a fullscreen application is up.
    #[serde(default)]
    pub pause_on_fullscreen: bool,
    /// Whether the schedule was armed when the process last exited.
    #[serde(default)]
    pub was_running: bool,
}

fn default_favorites_percent() -> u8 {
    10
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            per_monitor: false,
            monitors_randomized: false,
            lock_screen_separate: false,
            lock_screen_randomized: false,
            lock_screen_source_randomized: false,
            lock_screen_monitor: 0,
            favorites_percent: default_favorites_percent(),
            pause_on_fullscreen: false,
            was_running: false,
        }
    }
}

/// Which tag set feeds a target's search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TagScope {
    /// Fresh draw from the shared set.
    Shared,
    /// The single query drawn from the shared set for this tick.
    SharedTick,
    /// The monitor's own set.
    Monitor(usize),
    /// The lock screen's own set.
    LockScreen,
}

/// An addressable apply destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TargetKind {
    Desktop,
    Monitor { index: usize, device_id: String },
    LockScreen,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Desktop => write!(f, "desktop"),
            TargetKind::Monitor { index, .. } => write!(f, "monitor {}", index + 1),
            TargetKind::LockScreen => write!(f, "lock screen"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Target {
    pub kind: TargetKind,
    /// Cache file prefix; doubles as the retention group key.
    pub prefix: String,
    pub scope: TagScope,
}

/// What to do about the lock screen when no explicit target covers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LockScreenPlan {
    /// Covered by a target in the list, or nothing to do.
    None,
    /// Follow the monitor at `index`: fetch from its tags when randomized,
    /// otherwise mirror its image from this run.
    FromMonitor { index: usize },
    /// Mirror this run's desktop image.
    ReuseDesktop,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedTargets {
    pub targets: Vec<Target>,
    pub lock_screen: LockScreenPlan,
}

/// Maps the mode flags and monitor list onto this tick's targets.
///
/// Per-monitor modes need more than one monitor; anything less collapses to
/// a single desktop-wide target.
pub fn resolve_targets(config: &RotationConfig, monitors: &[MonitorInfo]) -> ResolvedTargets {
    let per_monitor_active =
        (config.per_monitor || config.monitors_randomized) && monitors.len() > 1;

    let mut targets = Vec::new();
    if per_monitor_active {
        let mut ordered: Vec<&MonitorInfo> = monitors.iter().collect();
        ordered.sort_by_key(|m| m.index);
        for monitor in ordered {
            targets.push(Target {
                kind: TargetKind::Monitor {
                    index: monitor.index,
                    device_id: monitor.device_id.clone(),
                },
                prefix: format!("monitor{}", monitor.index),
                scope: if config.monitors_randomized {
                    TagScope::SharedTick
                } else {
                    TagScope::Monitor(monitor.index)
                },
            });
        }
    } else {
        targets.push(Target {
            kind: TargetKind::Desktop,
            prefix: "desktop".to_string(),
            scope: TagScope::Shared,
        });
    }

    let lock_screen = if config.lock_screen_separate {
        targets.push(Target {
            kind: TargetKind::LockScreen,
            prefix: "lockscreen".to_string(),
            scope: TagScope::LockScreen,
        });
        LockScreenPlan::None
    } else if per_monitor_active {
        LockScreenPlan::FromMonitor {
            index: config.lock_screen_monitor.min(monitors.len() - 1),
        }
    } else if config.lock_screen_randomized {
        targets.push(Target {
            kind: TargetKind::LockScreen,
            prefix: "lockscreen".to_string(),
            scope: TagScope::Shared,
        });
        LockScreenPlan::None
    } else {
        LockScreenPlan::ReuseDesktop
    };

    ResolvedTargets {
        targets,
        lock_screen,
    }
}
