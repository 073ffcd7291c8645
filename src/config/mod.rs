//! TOML configuration.
//!
//! Stored per the platform convention:
//! - Linux: ~/.config/wallflow/config.toml
//! - macOS: ~/Library/Application Support/com.wallflow.Wallflow/config.toml
//! - Windows: %APPDATA%\wallflow\Wallflow\config.toml

use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

// Re-export section types that live next to the code they drive.
pub use crate::apply::ApplyConfig;
pub use crate::engine::schedule::{IntervalUnit, ScheduleConfig, ScheduleMode};
pub use crate::engine::targets::RotationConfig;
pub use crate::source::SourceConfig;
pub use crate::tags::TagSelection;

/// Local storage locations and retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Cache directory override; defaults under the platform data dir.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Favorites directory override.
    #[serde(default)]
    pub favorites_dir: Option<PathBuf>,
    /// Cached images kept per target prefix after a run.
    #[serde(default = "default_keep_per_prefix")]
    pub keep_per_prefix: usize,
}

fn default_keep_per_prefix() -> usize {
    3
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            favorites_dir: None,
            keep_per_prefix: default_keep_per_prefix(),
        }
    }
}

/// Search criteria per rotation surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagsConfig {
    /// Criteria shared by the desktop and any non-randomized monitors.
    #[serde(default)]
    pub shared: TagSelection,
    /// Criteria for a separately randomized lock screen.
    #[serde(default)]
    pub lock_screen: TagSelection,
    /// Per-monitor criteria, indexed by monitor position.
    #[serde(default)]
    pub monitors: Vec<TagSelection>,
}

/// Application configuration (top level).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Rotation schedule.
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Rotation targets and modes.
    #[serde(default)]
    pub rotation: RotationConfig,
    /// Search criteria per surface.
    #[serde(default)]
    pub tags: TagsConfig,
    /// Remote image source.
    #[serde(default)]
    pub source: SourceConfig,
    /// Cache and favorites storage.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Wallpaper apply backends.
    #[serde(default)]
    pub apply: ApplyConfig,
    /// Where this config was loaded from; `None` means the default path.
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schedule: ScheduleConfig::default(),
            rotation: RotationConfig::default(),
            tags: TagsConfig::default(),
            source: SourceConfig::default(),
            storage: StorageConfig::default(),
            apply: ApplyConfig::default(),
            path: None,
        }
    }
}

impl AppConfig {
    /// Configuration directory path.
    pub fn config_dir() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("com", "wallflow", "Wallflow") {
            Ok(proj_dirs.config_dir().to_path_buf())
        } else {
            // fall back to ~/.wallflow
            let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot find home directory"))?;
            Ok(home.join(".wallflow"))
        }
    }

    /// Full path of the configuration file.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Platform data directory for cached and favorite images.
    pub fn data_dir() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("com", "wallflow", "Wallflow") {
            Ok(proj_dirs.data_local_dir().to_path_buf())
        } else {
            let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot find home directory"))?;
            Ok(home.join(".wallflow"))
        }
    }

    /// Directory downloaded wallpapers are cached in.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.storage.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::data_dir()?.join("cache")),
        }
    }

    /// Directory favorite images are collected in.
    pub fn favorites_dir(&self) -> Result<PathBuf> {
        match &self.storage.favorites_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::data_dir()?.join("favorites")),
        }
    }

    /// Overrides where `save` writes this config.
    pub fn set_path(&mut self, path: PathBuf) {
        self.path = Some(path);
    }

    /// Loads the configuration from the default path.
    ///
    /// If the file does not exist, writes the defaults and returns them.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path()?)
    }

    /// Loads the configuration from an explicit path, remembering it for
    /// later saves.
    pub fn load_from(path: PathBuf) -> Result<Self> {
        debug!("Loading config from: {}", path.display());

        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let mut config: Self = toml::from_str(&content).map_err(|e| {
                warn!("Failed to parse config file: {}", e);
                e
            })?;
            config.path = Some(path.clone());
            info!("Config loaded from: {}", path.display());
            Ok(config)
        } else {
            info!("Config file not found, creating default at: {}", path.display());
            let mut config = Self::default();
            config.path = Some(path);
            config.save()?;
            Ok(config)
        }
    }

    /// Saves the configuration to its path.
    pub fn save(&self) -> Result<()> {
        let path = match &self.path {
            Some(p) => p.clone(),
            None => Self::config_path()?,
        };
        let dir = path.parent().ok_or_else(|| anyhow!("Invalid config path"))?;

        if !dir.exists() {
            fs::create_dir_all(dir)?;
            debug!("Created config directory: {}", dir.display());
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, &content)?;

        // user read/write only (Unix)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&path, perms)?;
        }

        info!("Config saved to: {}", path.display());
        Ok(())
    }
}
