//! Favorites store and probabilistic favorite injection.
//!
//! Favorites live outside the rotating cache and are never pruned. On any
//! tick a target may draw a favorite instead of searching remotely; the
//! favorite is copied into the cache under the target's prefix so retention
//! treats it like any downloaded file.

use crate::cache;
use rand::Rng;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// Favorites storage contract.
pub trait FavoritesStore: Send + Sync {
    /// All favorite image paths, newest first.
    fn list(&self) -> Vec<PathBuf>;

    /// Copies a favorite to the given destination, returning the new path.
    fn copy_to(&self, favorite: &Path, dest: &Path) -> io::Result<PathBuf>;
}

/// Directory-backed favorites store.
pub struct DirFavorites {
    dir: PathBuf,
}

impl DirFavorites {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Promotes an image into the favorites directory under a
    /// `fav_{timestamp}_{base}` name and returns the new path.
    pub fn add(&self, source: &Path) -> io::Result<PathBuf> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "source has no file name"))?;
        if !cache::is_image_file(name) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not an image file: {}", name),
            ));
        }
        fs::create_dir_all(&self.dir)?;
        let dest = self
            .dir
            .join(cache::prefixed_name("fav", cache::original_base_name(name)));
        fs::copy(source, &dest)?;
        Ok(dest)
    }

    /// Removes one favorite by file name.
    pub fn remove(&self, file_name: &str) -> io::Result<()> {
        fs::remove_file(self.dir.join(file_name))
    }
}

impl FavoritesStore for DirFavorites {
    fn list(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        let mut files: Vec<(SystemTime, PathBuf)> = entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                let name = path.file_name()?.to_str()?;
                if !path.is_file() || !cache::is_image_file(name) {
                    return None;
                }
                let modified = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                Some((modified, path))
            })
            .collect();
        files.sort_by(|a, b| b.0.cmp(&a.0));
        files.into_iter().map(|(_, path)| path).collect()
    }

    fn copy_to(&self, favorite: &Path, dest: &Path) -> io::Result<PathBuf> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(favorite, dest)?;
        Ok(dest.to_path_buf())
    }
}

/// Decides, independently per target per tick, whether to reuse a favorite
/// instead of searching remotely. With a non-empty store and a uniform draw
/// in `[0,100)` below `percent`, one favorite picked uniformly at random is
/// copied into the cache under a fresh name carrying `prefix`. Copy failures
/// are swallowed and fall back to the remote path.
pub fn maybe_inject_favorite(
    store: &dyn FavoritesStore,
    cache_dir: &Path,
    prefix: &str,
    percent: u8,
    rng: &mut impl Rng,
) -> Option<PathBuf> {
    let favorites = store.list();
    if favorites.is_empty() {
        return None;
    }
    if rng.gen_range(0u32..100) >= u32::from(percent) {
        return None;
    }
    let favorite = &favorites[rng.gen_range(0..favorites.len())];
    let name = favorite.file_name().and_then(|n| n.to_str())?;
    let dest = cache_dir.join(cache::prefixed_name(prefix, cache::original_base_name(name)));
    match store.copy_to(favorite, &dest) {
        Ok(path) => {
            debug!("injected favorite {} for {}", name, prefix);
            Some(path)
        }
        Err(e) => {
            warn!("failed to copy favorite {}: {}", name, e);
            None
        }
    }
}
