//! Wallflow - scheduled wallpaper rotation backed by wallhaven.cc
//!
//! Core library: tag-driven image search, per-monitor and lock screen
//! application, cache retention and a favorites store.

pub mod apply;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod favorites;
pub mod monitors;
pub mod source;
pub mod tags;

use std::sync::Arc;
use tokio::sync::RwLock;

pub use config::AppConfig;
pub use engine::{EngineStatus, RotationEngine, RunReport};
pub use error::{ApplyError, ConfigError, SourceError};
pub use favorites::DirFavorites;
pub use source::WallhavenSource;

use apply::{FullscreenDetector, WallpaperApplier};
use monitors::MonitorProvider;

/// Platform backends the engine runs against.
pub struct Backends {
    pub applier: Arc<dyn WallpaperApplier>,
    pub monitors: Arc<dyn MonitorProvider>,
    pub fullscreen: Arc<dyn FullscreenDetector>,
}

/// Native backends on Windows; config-driven shell commands elsewhere.
pub fn platform_backends(config: &AppConfig) -> Backends {
    #[cfg(target_os = "windows")]
    {
        let _ = config;
        Backends {
            applier: Arc::new(apply::WindowsApplier::new()),
            monitors: Arc::new(apply::WindowsMonitors::new()),
            fullscreen: Arc::new(apply::WindowsFullscreen::new()),
        }
    }
    #[cfg(not(target_os = "windows"))]
    {
        Backends {
            applier: Arc::new(apply::CommandApplier::new(config.apply.clone())),
            monitors: Arc::new(monitors::DeclaredMonitors::new(config.apply.monitors.clone())),
            fullscreen: Arc::new(apply::NoFullscreen),
        }
    }
}

/// Application state: the rotation engine wired to config, image source,
/// favorites and the platform backends.
pub struct AppState {
    /// Application config (TOML file).
    pub config: Arc<RwLock<AppConfig>>,
    /// Favorites directory store.
    pub favorites: Arc<DirFavorites>,
    /// The rotation engine.
    pub engine: RotationEngine,
}

impl AppState {
    /// Builds the state from an already loaded config.
    pub fn new(app_config: AppConfig) -> anyhow::Result<Self> {
        let cache_dir = app_config.cache_dir()?;
        let favorites_dir = app_config.favorites_dir()?;
        let keep_per_prefix = app_config.storage.keep_per_prefix;

        let source = Arc::new(WallhavenSource::new(app_config.source.clone())?);
        let favorites = Arc::new(DirFavorites::new(favorites_dir));
        let backends = platform_backends(&app_config);
        let config = Arc::new(RwLock::new(app_config));

        let engine = RotationEngine::new(
            config.clone(),
            source,
            backends.applier,
            favorites.clone(),
            backends.monitors,
            backends.fullscreen,
            cache_dir,
            keep_per_prefix,
        );

        Ok(Self {
            config,
            favorites,
            engine,
        })
    }
}
