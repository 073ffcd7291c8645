//! One rotation pass: favorite injection, query building, search, download,
//! application, lock-screen derivation and cache retention.

use super::report::{ImageOrigin, RunReport, SkipReason, TargetStatus};
use super::targets::{resolve_targets, LockScreenPlan, RotationConfig, TagScope, Target, TargetKind};
use crate::apply::WallpaperApplier;
use crate::cache;
use crate::error::ApplyError;
use crate::favorites::{maybe_inject_favorite, FavoritesStore};
use crate::monitors::MonitorInfo;
use crate::source::ImageSource;
use crate::tags::{build_query, TagSet};
use rand::rngs::StdRng;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Highest random search page. Pages past the result count come back empty
/// and the source retries page 1.
const SEARCH_PAGE_MAX: u32 = 5;

/// Immutable view of settings and displays for one run. Edits made while a
/// run is in flight only affect the next one.
#[derive(Clone)]
pub struct RunSnapshot {
    pub config: RotationConfig,
    pub monitors: Vec<MonitorInfo>,
    pub shared_tags: TagSet,
    pub lock_tags: TagSet,
    /// Per-monitor tag sets, indexed like the monitor list. Missing entries
    /// count as empty sets.
    pub monitor_tags: Vec<TagSet>,
}

/// Receives coarse progress strings for status surfaces.
pub trait StatusSink: Send + Sync {
    fn phase(&self, text: String);
}

/// Sink for callers that do not surface progress.
pub struct NullSink;

impl StatusSink for NullSink {
    fn phase(&self, _text: String) {}
}

pub struct Orchestrator {
    source: Arc<dyn ImageSource>,
    applier: Arc<dyn WallpaperApplier>,
    favorites: Arc<dyn FavoritesStore>,
    status: Arc<dyn StatusSink>,
    cache_dir: PathBuf,
    keep_per_prefix: usize,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn ImageSource>,
        applier: Arc<dyn WallpaperApplier>,
        favorites: Arc<dyn FavoritesStore>,
        status: Arc<dyn StatusSink>,
        cache_dir: PathBuf,
        keep_per_prefix: usize,
    ) -> Self {
        Self {
            source,
            applier,
            favorites,
            status,
            cache_dir,
            keep_per_prefix,
        }
    }

    /// Runs one full pass over the resolved targets. Never fails: problems
    /// are absorbed into the report per target, and retention runs even
    /// when every target came up empty.
    pub async fn run_once(&self, snapshot: &RunSnapshot, rng: &mut StdRng) -> RunReport {
        let mut report = RunReport::new(now());
        let resolved = resolve_targets(&snapshot.config, &snapshot.monitors);
        debug!(
            "Resolved {} target(s), lock screen: {:?}",
            resolved.targets.len(),
            resolved.lock_screen
        );

        let shared_tick_query = if resolved
            .targets
            .iter()
            .any(|t| t.scope == TagScope::SharedTick)
        {
            Some(build_query(&snapshot.shared_tags, rng))
        } else {
            None
        };

        for target in &resolved.targets {
            let status = self
                .rotate_target(snapshot, target, shared_tick_query.as_deref(), rng)
                .await;
            if let TargetStatus::Failed { error } = &status {
                warn!("{} failed: {}", target.kind, error);
            }
            report.record(target.clone(), status);
        }

        self.follow_up_lock_screen(snapshot, &resolved.lock_screen, &mut report, rng)
            .await;

        cache::prune(&self.cache_dir, self.keep_per_prefix);

        report.finish(now());
        info!("Rotation finished: {}", report.summary());
        self.status.phase("Wallpaper updated".to_string());
        report
    }

    /// Favorite first; otherwise a fresh search from the target's tag set.
    async fn rotate_target(
        &self,
        snapshot: &RunSnapshot,
        target: &Target,
        shared_tick_query: Option<&str>,
        rng: &mut StdRng,
    ) -> TargetStatus {
        if let Some(path) = maybe_inject_favorite(
            self.favorites.as_ref(),
            &self.cache_dir,
            &target.prefix,
            snapshot.config.favorites_percent,
            rng,
        ) {
            self.status
                .phase(format!("Applying favorite to {}", target.kind));
            return self.apply_path(target, path, ImageOrigin::Favorite).await;
        }

        let query = match target.scope {
            TagScope::Shared => build_query(&snapshot.shared_tags, rng),
            TagScope::SharedTick => shared_tick_query.unwrap_or_default().to_string(),
            TagScope::Monitor(i) => snapshot
                .monitor_tags
                .get(i)
                .map(|tags| build_query(tags, rng))
                .unwrap_or_default(),
            TagScope::LockScreen => build_query(&snapshot.lock_tags, rng),
        };
        if query.is_empty() {
            debug!("{}: no criteria, skipping", target.kind);
            return TargetStatus::Skipped {
                reason: SkipReason::NoCriteria,
            };
        }

        self.fetch_and_apply(target, &query, rng).await
    }

    /// Search, pick, download, cache, apply.
    async fn fetch_and_apply(&self, target: &Target, query: &str, rng: &mut StdRng) -> TargetStatus {
        self.status.phase(format!("Searching for {}", target.kind));
        let page = rng.gen_range(1..=SEARCH_PAGE_MAX);
        let hits = match self.source.search(query, page).await {
            Ok(hits) => hits,
            Err(e) => {
                return TargetStatus::Failed {
                    error: e.to_string(),
                }
            }
        };
        if hits.is_empty() {
            debug!("{}: no results for '{}'", target.kind, query);
            return TargetStatus::Skipped {
                reason: SkipReason::NoResults,
            };
        }
        let hit = &hits[rng.gen_range(0..hits.len())];

        self.status
            .phase(format!("Downloading for {}", target.kind));
        let bytes = match self.source.download(&hit.url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return TargetStatus::Failed {
                    error: e.to_string(),
                }
            }
        };
        let path = match cache::store_download(&self.cache_dir, &target.prefix, &hit.url, &bytes) {
            Ok(path) => path,
            Err(e) => {
                return TargetStatus::Failed {
                    error: format!("cache write failed: {e}"),
                }
            }
        };

        self.apply_path(target, path, ImageOrigin::Remote { url: hit.url.clone() })
            .await
    }

    async fn apply_path(&self, target: &Target, path: PathBuf, origin: ImageOrigin) -> TargetStatus {
        match self.apply(target, &path).await {
            Ok(()) => TargetStatus::Applied { path, origin },
            Err(e) => TargetStatus::Failed {
                error: e.to_string(),
            },
        }
    }

    async fn apply(&self, target: &Target, path: &Path) -> Result<(), ApplyError> {
        match &target.kind {
            TargetKind::Desktop => self.applier.apply_desktop(path).await,
            TargetKind::Monitor { device_id, .. } => {
                match self.applier.apply_monitor(device_id, path).await {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        warn!(
                            "Per-monitor apply failed ({}), applying desktop-wide instead",
                            e
                        );
                        self.applier.apply_desktop(path).await
                    }
                }
            }
            TargetKind::LockScreen => self.applier.apply_lock_screen(path).await,
        }
    }

    /// Lock-screen follow-up for runs where no explicit target covered it.
    async fn follow_up_lock_screen(
        &self,
        snapshot: &RunSnapshot,
        plan: &LockScreenPlan,
        report: &mut RunReport,
        rng: &mut StdRng,
    ) {
        match plan {
            LockScreenPlan::None => {}
            LockScreenPlan::FromMonitor { index } => {
                let index = if snapshot.config.lock_screen_source_randomized
                    && !snapshot.monitors.is_empty()
                {
                    rng.gen_range(0..snapshot.monitors.len())
                } else {
                    *index
                };

                match snapshot.monitor_tags.get(index) {
                    Some(tags) if snapshot.config.lock_screen_randomized && tags.has_criteria() => {
                        let target = Target {
                            kind: TargetKind::LockScreen,
                            prefix: "lockscreen_random".to_string(),
                            scope: TagScope::Monitor(index),
                        };
                        let status = if let Some(path) = maybe_inject_favorite(
                            self.favorites.as_ref(),
                            &self.cache_dir,
                            &target.prefix,
                            snapshot.config.favorites_percent,
                            rng,
                        ) {
                            self.status.phase("Applying favorite to lock screen".to_string());
                            self.apply_path(&target, path, ImageOrigin::Favorite).await
                        } else {
                            let query = build_query(tags, rng);
                            self.fetch_and_apply(&target, &query, rng).await
                        };
                        report.record(target, status);
                    }
                    _ => {
                        let path = report.monitor_path(index).map(Path::to_path_buf);
                        self.mirror_to_lock_screen(path, report).await;
                    }
                }
            }
            LockScreenPlan::ReuseDesktop => {
                let path = report
                    .desktop_path()
                    .or_else(|| report.first_monitor_path())
                    .map(Path::to_path_buf);
                self.mirror_to_lock_screen(path, report).await;
            }
        }
    }

    /// Applies an already-cached image from this run to the lock screen.
    async fn mirror_to_lock_screen(&self, path: Option<PathBuf>, report: &mut RunReport) {
        let target = Target {
            kind: TargetKind::LockScreen,
            prefix: "lockscreen".to_string(),
            scope: TagScope::LockScreen,
        };
        let status = match path {
            Some(path) => {
                self.status.phase("Updating lock screen".to_string());
                match self.applier.apply_lock_screen(&path).await {
                    Ok(()) => TargetStatus::Applied {
                        path,
                        origin: ImageOrigin::Reused,
                    },
                    Err(e) => TargetStatus::Failed {
                        error: e.to_string(),
                    },
                }
            }
            None => TargetStatus::Skipped {
                reason: SkipReason::NothingToReuse,
            },
        };
        report.record(target, status);
    }
}

fn now() -> chrono::NaiveDateTime {
    chrono::Local::now().naive_local()
}
