//! Per-run outcome report.
//!
//! A run never raises; whatever happened to each target is recorded here
//! and the schedule moves on.

use super::targets::{Target, TargetKind};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Where an applied image came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ImageOrigin {
    /// Copied out of the favorites store.
    Favorite,
    /// Downloaded from the remote source.
    Remote { url: String },
    /// Another target's image from this same run.
    Reused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// No tags selected and no favorite drawn.
    NoCriteria,
    /// The source had nothing for the query.
    NoResults,
    /// Derivation found no image from this run to mirror.
    NothingToReuse,
}

#[derive(Debug, Clone, Serialize)]
pub enum TargetStatus {
    Applied { path: PathBuf, origin: ImageOrigin },
    Skipped { reason: SkipReason },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetOutcome {
    pub target: Target,
    pub status: TargetStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
    pub outcomes: Vec<TargetOutcome>,
}

impl RunReport {
    pub fn new(started_at: NaiveDateTime) -> Self {
        Self {
            started_at,
            finished_at: None,
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, target: Target, status: TargetStatus) {
        self.outcomes.push(TargetOutcome { target, status });
    }

    pub fn finish(&mut self, at: NaiveDateTime) {
        self.finished_at = Some(at);
    }

    /// Image applied to the desktop in this run, if any.
    pub fn desktop_path(&self) -> Option<&Path> {
        self.outcomes.iter().find_map(|o| match (&o.target.kind, &o.status) {
            (TargetKind::Desktop, TargetStatus::Applied { path, .. }) => Some(path.as_path()),
            _ => None,
        })
    }

    /// Image applied to the given monitor in this run, if any.
    pub fn monitor_path(&self, index: usize) -> Option<&Path> {
        self.outcomes.iter().find_map(|o| match (&o.target.kind, &o.status) {
            (TargetKind::Monitor { index: i, .. }, TargetStatus::Applied { path, .. })
                if *i == index =>
            {
                Some(path.as_path())
            }
            _ => None,
        })
    }

    /// First monitor image applied in this run, in target order.
    pub fn first_monitor_path(&self) -> Option<&Path> {
        self.outcomes.iter().find_map(|o| match (&o.target.kind, &o.status) {
            (TargetKind::Monitor { .. }, TargetStatus::Applied { path, .. }) => {
                Some(path.as_path())
            }
            _ => None,
        })
    }

    /// One-line tally for the log.
    pub fn summary(&self) -> String {
        let mut applied = 0;
        let mut skipped = 0;
        let mut failed = 0;
        for outcome in &self.outcomes {
            match outcome.status {
                TargetStatus::Applied { .. } => applied += 1,
                TargetStatus::Skipped { .. } => skipped += 1,
                TargetStatus::Failed { .. } => failed += 1,
            }
        }
        format!("{applied} applied, {skipped} skipped, {failed} failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::targets::TagScope;
    use chrono::NaiveDate;

    fn report() -> RunReport {
        RunReport::new(
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        )
    }

    fn monitor_target(index: usize) -> Target {
        Target {
            kind: TargetKind::Monitor {
                index,
                device_id: format!("DISPLAY{index}"),
            },
            prefix: format!("monitor{index}"),
            scope: TagScope::Monitor(index),
        }
    }

    #[test]
    fn lookups_only_see_applied_outcomes() {
        let mut report = report();
        report.record(
            monitor_target(0),
            TargetStatus::Skipped {
                reason: SkipReason::NoCriteria,
            },
        );
        report.record(
            monitor_target(1),
            TargetStatus::Applied {
                path: PathBuf::from("/cache/monitor1_x.jpg"),
                origin: ImageOrigin::Remote {
                    url: "https://example.com/x.jpg".to_string(),
                },
            },
        );

        assert_eq!(report.monitor_path(0), None);
        assert_eq!(
            report.monitor_path(1),
            Some(Path::new("/cache/monitor1_x.jpg"))
        );
        assert_eq!(
            report.first_monitor_path(),
            Some(Path::new("/cache/monitor1_x.jpg"))
        );
        assert_eq!(report.desktop_path(), None);
        assert_eq!(report.summary(), "1 applied, 1 skipped, 0 failed");
    }

    #[test]
    fn first_monitor_path_respects_target_order() {
        let mut report = report();
        for index in [0, 1] {
            report.record(
                monitor_target(index),
                TargetStatus::Applied {
                    path: PathBuf::from(format!("/cache/monitor{index}.jpg")),
                    origin: ImageOrigin::Reused,
                },
            );
        }
        assert_eq!(
            report.first_monitor_path(),
            Some(Path::new("/cache/monitor0.jpg"))
        );
    }
}
