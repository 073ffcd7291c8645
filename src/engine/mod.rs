//! Rotation engine: the schedule loop and its control surface.

pub mod orchestrator;
pub mod report;
pub mod schedule;
pub mod targets;

pub use orchestrator::{NullSink, Orchestrator, RunSnapshot, StatusSink};
pub use report::{ImageOrigin, RunReport, SkipReason, TargetOutcome, TargetStatus};
pub use schedule::{IntervalUnit, ScheduleConfig, ScheduleMode, ScheduleSpec, ScheduleState};
pub use targets::{
    resolve_targets, LockScreenPlan, ResolvedTargets, RotationConfig, TagScope, Target, TargetKind,
};

use crate::apply::{FullscreenDetector, WallpaperApplier};
use crate::config::AppConfig;
use crate::error::ConfigError;
use crate::favorites::FavoritesStore;
use crate::monitors::{MonitorInfo, MonitorProvider};
use crate::source::ImageSource;
use crate::tags::TagSet;
use chrono::{Local, NaiveDateTime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Engine state for status surfaces.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineStatus {
    pub is_running: bool,
    pub is_busy: bool,
    /// Human-readable progress line, e.g. "Downloading for monitor 2".
    pub phase: String,
    pub next_fire: Option<NaiveDateTime>,
    pub last_run: Option<RunReport>,
    /// Most recent applied image per cache prefix, kept across runs.
    pub last_applied: HashMap<String, PathBuf>,
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self {
            is_running: false,
            is_busy: false,
            phase: "Idle".to_string(),
            next_fire: None,
            last_run: None,
            last_applied: HashMap::new(),
        }
    }
}

/// Drives rotations on a schedule and exposes start/stop/skip controls.
pub struct RotationEngine {
    config: Arc<RwLock<AppConfig>>,
    orchestrator: Arc<Orchestrator>,
    monitors: Arc<dyn MonitorProvider>,
    fullscreen: Arc<dyn FullscreenDetector>,
    favorites: Arc<dyn FavoritesStore>,
    is_running: Arc<AtomicBool>,
    is_busy: Arc<AtomicBool>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    skip_tx: Option<mpsc::Sender<()>>,
    status_tx: watch::Sender<EngineStatus>,
}

impl RotationEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<RwLock<AppConfig>>,
        source: Arc<dyn ImageSource>,
        applier: Arc<dyn WallpaperApplier>,
        favorites: Arc<dyn FavoritesStore>,
        monitors: Arc<dyn MonitorProvider>,
        fullscreen: Arc<dyn FullscreenDetector>,
        cache_dir: PathBuf,
        keep_per_prefix: usize,
    ) -> Self {
        let (status_tx, _) = watch::channel(EngineStatus::default());
        let orchestrator = Arc::new(Orchestrator::new(
            source,
            applier,
            favorites.clone(),
            Arc::new(WatchSink(status_tx.clone())),
            cache_dir,
            keep_per_prefix,
        ));
        Self {
            config,
            orchestrator,
            monitors,
            fullscreen,
            favorites,
            is_running: Arc::new(AtomicBool::new(false)),
            is_busy: Arc::new(AtomicBool::new(false)),
            shutdown_tx: None,
            skip_tx: None,
            status_tx,
        }
    }

    /// Arms the schedule and spawns the rotation loop. Validates the
    /// schedule section and that some search criteria or favorites exist.
    /// Calling it again while running is a warning, not an error.
    pub async fn start(&mut self) -> Result<(), ConfigError> {
        if self.is_running.load(Ordering::SeqCst) {
            warn!("Rotation engine is already running");
            return Ok(());
        }

        let spec = {
            let config = self.config.read().await;
            let spec = ScheduleSpec::from_config(&config.schedule)?;
            Self::ensure_criteria(&config, &self.monitors.detect(), self.favorites.as_ref())?;
            spec
        };

        info!("Starting rotation engine...");

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let (skip_tx, skip_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);
        self.skip_tx = Some(skip_tx);

        let state = ScheduleState::armed(spec, Local::now().naive_local());
        self.is_running.store(true, Ordering::SeqCst);
        self.status_tx.send_modify(|s| {
            s.is_running = true;
            s.phase = "Running".to_string();
            s.next_fire = state.next_fire();
        });
        self.persist_running(true).await;

        let engine_loop = EngineLoop {
            config: self.config.clone(),
            orchestrator: self.orchestrator.clone(),
            monitors: self.monitors.clone(),
            fullscreen: self.fullscreen.clone(),
            is_running: self.is_running.clone(),
            is_busy: self.is_busy.clone(),
            status_tx: self.status_tx.clone(),
            state,
        };
        tokio::spawn(engine_loop.run(shutdown_rx, skip_rx));

        info!("Rotation engine started");
        Ok(())
    }

    /// Disarms the schedule. Safe to call when already stopped.
    pub async fn stop(&mut self) {
        if !self.is_running.load(Ordering::SeqCst) {
            debug!("Rotation engine is not running");
            return;
        }
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
        self.skip_tx = None;
        self.is_running.store(false, Ordering::SeqCst);
        self.persist_running(false).await;
        info!("Rotation engine stopped");
    }

    /// Requests an immediate rotation. Ignored while one is in flight or
    /// when the engine is stopped.
    pub fn skip_now(&self) {
        if !self.is_running.load(Ordering::SeqCst) {
            debug!("Engine not running, skip ignored");
            return;
        }
        if self.is_busy.load(Ordering::SeqCst) {
            debug!("Rotation in flight, skip ignored");
            return;
        }
        if let Some(tx) = &self.skip_tx {
            let _ = tx.try_send(());
        }
    }

    /// One manual rotation outside the schedule.
    pub async fn rotate_once(&self) -> RunReport {
        let snapshot = {
            let config = self.config.read().await;
            build_snapshot(&config, self.monitors.detect())
        };
        let mut rng = StdRng::from_entropy();
        self.orchestrator.run_once(&snapshot, &mut rng).await
    }

    pub fn status(&self) -> EngineStatus {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.status_tx.subscribe()
    }

    fn ensure_criteria(
        config: &AppConfig,
        monitors: &[MonitorInfo],
        favorites: &dyn FavoritesStore,
    ) -> Result<(), ConfigError> {
        let per_monitor_active = (config.rotation.per_monitor
            || config.rotation.monitors_randomized)
            && monitors.len() > 1;
        let has_tags = if per_monitor_active && !config.rotation.monitors_randomized {
            config
                .tags
                .monitors
                .iter()
                .any(|s| TagSet::from_selection(s).has_criteria())
        } else {
            TagSet::from_selection(&config.tags.shared).has_criteria()
        };
        if has_tags || !favorites.list().is_empty() {
            Ok(())
        } else {
            Err(ConfigError::NoCriteria)
        }
    }

    async fn persist_running(&self, running: bool) {
        let mut config = self.config.write().await;
        config.rotation.was_running = running;
        if let Err(e) = config.save() {
            warn!("Failed to persist running state: {}", e);
        }
    }
}

/// Forwards orchestrator phases into the status channel.
struct WatchSink(watch::Sender<EngineStatus>);

impl StatusSink for WatchSink {
    fn phase(&self, text: String) {
        self.0.send_modify(|s| s.phase = text);
    }
}

fn build_snapshot(config: &AppConfig, monitors: Vec<MonitorInfo>) -> RunSnapshot {
    RunSnapshot {
        config: config.rotation.clone(),
        monitors,
        shared_tags: TagSet::from_selection(&config.tags.shared),
        lock_tags: TagSet::from_selection(&config.tags.lock_screen),
        monitor_tags: config
            .tags
            .monitors
            .iter()
            .map(TagSet::from_selection)
            .collect(),
    }
}

struct EngineLoop {
    config: Arc<RwLock<AppConfig>>,
    orchestrator: Arc<Orchestrator>,
    monitors: Arc<dyn MonitorProvider>,
    fullscreen: Arc<dyn FullscreenDetector>,
    is_running: Arc<AtomicBool>,
    is_busy: Arc<AtomicBool>,
    status_tx: watch::Sender<EngineStatus>,
    state: ScheduleState,
}

impl EngineLoop {
    async fn run(mut self, mut shutdown_rx: mpsc::Receiver<()>, mut skip_rx: mpsc::Receiver<()>) {
        info!("Rotation loop started");

        // interval mode rotates once right away; daily mode waits for its slot
        if self.state.spec().fires_on_start() {
            self.tick().await;
        }

        loop {
            let wait = self.state.wait_from(Local::now().naive_local());
            debug!("Next rotation in {:?}", wait);
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Rotation loop received shutdown signal");
                    break;
                }
                _ = skip_rx.recv() => {
                    debug!("Skip requested");
                    self.tick().await;
                }
                _ = sleep(wait) => {
                    self.tick().await;
                }
            }
            // skips that queued up while a run was in flight are stale
            while skip_rx.try_recv().is_ok() {}
        }

        self.is_running.store(false, Ordering::SeqCst);
        self.is_busy.store(false, Ordering::SeqCst);
        self.status_tx.send_modify(|s| {
            s.is_running = false;
            s.is_busy = false;
            s.next_fire = None;
            s.phase = "Stopped".to_string();
        });
        info!("Rotation loop stopped");
    }

    async fn tick(&mut self) {
        if !self.state.begin_run() {
            debug!("Rotation already in flight, ignoring tick");
            return;
        }
        self.is_busy.store(true, Ordering::SeqCst);
        self.status_tx.send_modify(|s| s.is_busy = true);

        let (snapshot, pause_on_fullscreen) = {
            let config = self.config.read().await;
            (
                build_snapshot(&config, self.monitors.detect()),
                config.rotation.pause_on_fullscreen,
            )
        };

        if pause_on_fullscreen && self.fullscreen.fullscreen_active() {
            info!("Fullscreen application active, holding this rotation");
            self.status_tx
                .send_modify(|s| s.phase = "Paused (fullscreen app)".to_string());
        } else {
            let mut rng = StdRng::from_entropy();
            let report = self.orchestrator.run_once(&snapshot, &mut rng).await;
            self.status_tx.send_modify(|s| {
                for outcome in &report.outcomes {
                    if let TargetStatus::Applied { path, .. } = &outcome.status {
                        s.last_applied
                            .insert(outcome.target.prefix.clone(), path.clone());
                    }
                }
                s.last_run = Some(report);
            });
        }

        self.state.complete_run(Local::now().naive_local());
        self.is_busy.store(false, Ordering::SeqCst);
        self.status_tx.send_modify(|s| {
            s.is_busy = false;
            s.next_fire = self.state.next_fire();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TagsConfig;
    use crate::error::{ApplyError, SourceError};
    use crate::source::RemoteImage;
    use crate::tags::TagSelection;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    struct CountingSource {
        searches: Mutex<Vec<String>>,
    }

    impl CountingSource {
        fn new() -> Self {
            Self {
                searches: Mutex::new(Vec::new()),
            }
        }

        fn search_count(&self) -> usize {
            self.searches.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ImageSource for CountingSource {
        async fn search(&self, query: &str, _page_hint: u32) -> Result<Vec<RemoteImage>, SourceError> {
            self.searches.lock().unwrap().push(query.to_string());
            Ok(vec![RemoteImage {
                id: "w".to_string(),
                url: "https://img.example/w.jpg".to_string(),
            }])
        }

        async fn download(&self, _url: &str) -> Result<Vec<u8>, SourceError> {
            Ok(b"bytes".to_vec())
        }
    }

    struct SlowApplier {
        delay: Duration,
        applied: Mutex<usize>,
    }

    impl SlowApplier {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                applied: Mutex::new(0),
            }
        }

        fn count(&self) -> usize {
            *self.applied.lock().unwrap()
        }
    }

    #[async_trait]
    impl WallpaperApplier for SlowApplier {
        async fn apply_desktop(&self, _path: &Path) -> Result<(), ApplyError> {
            sleep(self.delay).await;
            *self.applied.lock().unwrap() += 1;
            Ok(())
        }

        async fn apply_monitor(&self, _device_id: &str, _path: &Path) -> Result<(), ApplyError> {
            self.apply_desktop(_path).await
        }

        async fn apply_lock_screen(&self, _path: &Path) -> Result<(), ApplyError> {
            self.apply_desktop(_path).await
        }
    }

    struct EmptyFavorites;

    impl FavoritesStore for EmptyFavorites {
        fn list(&self) -> Vec<PathBuf> {
            Vec::new()
        }

        fn copy_to(&self, _favorite: &Path, dest: &Path) -> std::io::Result<PathBuf> {
            Ok(dest.to_path_buf())
        }
    }

    struct OneMonitor;

    impl MonitorProvider for OneMonitor {
        fn detect(&self) -> Vec<MonitorInfo> {
            vec![MonitorInfo {
                index: 0,
                device_id: "DISPLAY0".to_string(),
                display_name: "Monitor 1".to_string(),
            }]
        }
    }

    struct Fullscreen(bool);

    impl FullscreenDetector for Fullscreen {
        fn fullscreen_active(&self) -> bool {
            self.0
        }
    }

    struct Fixture {
        engine: RotationEngine,
        source: Arc<CountingSource>,
        applier: Arc<SlowApplier>,
        dir: PathBuf,
    }

    impl Fixture {
        fn new(config: AppConfig) -> Self {
            Self::with_detector(config, false)
        }

        fn with_detector(mut config: AppConfig, fullscreen: bool) -> Self {
            let dir = std::env::temp_dir().join(format!("wallflow-engine-{}", Uuid::new_v4()));
            std::fs::create_dir_all(&dir).unwrap();
            config.set_path(dir.join("config.toml"));

            let source = Arc::new(CountingSource::new());
            let applier = Arc::new(SlowApplier::new(Duration::from_millis(0)));
            let engine = RotationEngine::new(
                Arc::new(RwLock::new(config)),
                source.clone(),
                applier.clone(),
                Arc::new(EmptyFavorites),
                Arc::new(OneMonitor),
                Arc::new(Fullscreen(fullscreen)),
                dir.join("cache"),
                3,
            );
            Self {
                engine,
                source,
                applier,
                dir,
            }
        }

        fn cleanup(&self) {
            std::fs::remove_dir_all(&self.dir).ok();
        }
    }

    fn interval_config(value: i64, unit: IntervalUnit) -> AppConfig {
        let mut config = AppConfig::default();
        config.schedule.mode = ScheduleMode::Interval;
        config.schedule.interval = value;
        config.schedule.interval_unit = unit;
        config.tags = TagsConfig {
            shared: TagSelection {
                selected: Vec::new(),
                custom: "sunset".to_string(),
            },
            ..Default::default()
        };
        config
    }

    fn daily_config(time: &str) -> AppConfig {
        let mut config = interval_config(20, IntervalUnit::Minutes);
        config.schedule.mode = ScheduleMode::Daily;
        config.schedule.daily_time = time.to_string();
        config
    }

    /// A daily slot hours away, so the loop never fires during a test.
    fn far_slot() -> String {
        (Local::now() + chrono::Duration::hours(6))
            .format("%H:%M")
            .to_string()
    }

    #[tokio::test]
    async fn start_rejects_empty_criteria() {
        let mut config = interval_config(20, IntervalUnit::Minutes);
        config.tags = TagsConfig::default();
        let mut fixture = Fixture::new(config);

        let err = fixture.engine.start().await.unwrap_err();
        assert!(matches!(err, ConfigError::NoCriteria));
        assert!(!fixture.engine.status().is_running);
        fixture.cleanup();
    }

    #[tokio::test]
    async fn start_rejects_bad_schedule() {
        let mut fixture = Fixture::new(interval_config(0, IntervalUnit::Minutes));
        let err = fixture.engine.start().await.unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInterval(_)));

        let mut fixture2 = Fixture::new(daily_config("25:99"));
        let err = fixture2.engine.start().await.unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTime(_)));

        fixture.cleanup();
        fixture2.cleanup();
    }

    #[tokio::test]
    async fn interval_mode_rotates_immediately() {
        let mut fixture = Fixture::new(interval_config(1, IntervalUnit::Hours));
        fixture.engine.start().await.unwrap();

        sleep(Duration::from_millis(300)).await;
        assert_eq!(fixture.source.search_count(), 1);
        let status = fixture.engine.status();
        assert!(status.is_running);
        assert!(status.last_applied.contains_key("desktop"));
        assert!(status.next_fire.is_some());

        fixture.engine.stop().await;
        fixture.cleanup();
    }

    #[tokio::test]
    async fn daily_mode_waits_for_its_slot() {
        let mut fixture = Fixture::new(daily_config(&far_slot()));
        fixture.engine.start().await.unwrap();

        sleep(Duration::from_millis(200)).await;
        assert_eq!(fixture.source.search_count(), 0);
        assert!(fixture.engine.status().next_fire.is_some());

        fixture.engine.stop().await;
        fixture.cleanup();
    }

    #[tokio::test]
    async fn skip_now_rotates_once() {
        let mut fixture = Fixture::new(daily_config(&far_slot()));
        fixture.engine.start().await.unwrap();
        sleep(Duration::from_millis(50)).await;

        fixture.engine.skip_now();
        sleep(Duration::from_millis(300)).await;
        assert_eq!(fixture.source.search_count(), 1);
        // desktop apply plus the lock screen mirror
        assert_eq!(fixture.applier.count(), 2);

        fixture.engine.stop().await;
        fixture.cleanup();
    }

    #[tokio::test]
    async fn skips_during_a_run_are_dropped() {
        let mut config = interval_config(1, IntervalUnit::Hours);
        config.schedule.mode = ScheduleMode::Daily;
        config.schedule.daily_time = far_slot();

        let dir = std::env::temp_dir().join(format!("wallflow-engine-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        config.set_path(dir.join("config.toml"));

        let source = Arc::new(CountingSource::new());
        let applier = Arc::new(SlowApplier::new(Duration::from_millis(400)));
        let mut engine = RotationEngine::new(
            Arc::new(RwLock::new(config)),
            source.clone(),
            applier.clone(),
            Arc::new(EmptyFavorites),
            Arc::new(OneMonitor),
            Arc::new(Fullscreen(false)),
            dir.join("cache"),
            3,
        );

        engine.start().await.unwrap();
        sleep(Duration::from_millis(50)).await;

        engine.skip_now();
        sleep(Duration::from_millis(150)).await;
        // the run is still applying; these must all be dropped
        engine.skip_now();
        engine.skip_now();
        sleep(Duration::from_millis(900)).await;

        assert_eq!(source.search_count(), 1);
        assert_eq!(applier.count(), 2); // desktop + mirrored lock screen

        engine.stop().await;
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mut fixture = Fixture::new(daily_config(&far_slot()));
        fixture.engine.start().await.unwrap();
        sleep(Duration::from_millis(50)).await;

        fixture.engine.stop().await;
        fixture.engine.stop().await;
        sleep(Duration::from_millis(100)).await;

        let status = fixture.engine.status();
        assert!(!status.is_running);
        assert!(!status.is_busy);
        assert_eq!(status.next_fire, None);

        fixture.cleanup();
    }

    #[tokio::test]
    async fn starting_twice_is_a_no_op() {
        let mut fixture = Fixture::new(daily_config(&far_slot()));
        fixture.engine.start().await.unwrap();
        sleep(Duration::from_millis(50)).await;
        fixture.engine.start().await.unwrap();
        sleep(Duration::from_millis(100)).await;

        assert_eq!(fixture.source.search_count(), 0);
        fixture.engine.stop().await;
        fixture.cleanup();
    }

    #[tokio::test]
    async fn fullscreen_pause_holds_the_rotation() {
        let mut config = interval_config(1, IntervalUnit::Hours);
        config.rotation.pause_on_fullscreen = true;
        let mut fixture = Fixture::with_detector(config, true);
        fixture.engine.start().await.unwrap();

        sleep(Duration::from_millis(200)).await;
        assert_eq!(fixture.source.search_count(), 0);
        assert_eq!(fixture.engine.status().phase, "Paused (fullscreen app)");
        // the slot was consumed and the schedule moved on
        assert!(fixture.engine.status().next_fire.is_some());

        fixture.engine.stop().await;
        fixture.cleanup();
    }

    #[tokio::test]
    async fn running_state_is_persisted_across_transitions() {
        let mut fixture = Fixture::new(daily_config(&far_slot()));
        let config_path = fixture.dir.join("config.toml");

        fixture.engine.start().await.unwrap();
        let on_disk = std::fs::read_to_string(&config_path).unwrap();
        assert!(on_disk.contains("was_running = true"));

        fixture.engine.stop().await;
        let on_disk = std::fs::read_to_string(&config_path).unwrap();
        assert!(on_disk.contains("was_running = false"));

        fixture.cleanup();
    }

    #[tokio::test]
    async fn rotate_once_works_without_the_schedule() {
        let fixture = Fixture::new(interval_config(20, IntervalUnit::Minutes));
        let report = fixture.engine.rotate_once().await;
        assert_eq!(fixture.source.search_count(), 1);
        assert!(report.desktop_path().is_some());
        fixture.cleanup();
    }
}
