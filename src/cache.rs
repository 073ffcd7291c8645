//! Rolling wallpaper cache: file naming, base-name recovery and retention
//! pruning.
//!
//! Every cache file is named `{prefix}_{YYYYMMDD_HHMMSS}_{base}` where the
//! prefix identifies the target the file was fetched for. Retention keeps a
//! fixed number of files per prefix group and deletes the rest, best effort.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use uuid::Uuid;

/// Extensions admitted into the cache and the favorites store.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Whether a file name carries a known image extension.
pub fn is_image_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Builds `{prefix}_{timestamp}_{base}` for the given instant.
pub fn prefixed_name_at(prefix: &str, base: &str, at: NaiveDateTime) -> String {
    format!("{}_{}_{}", prefix, at.format(TIMESTAMP_FORMAT), base)
}

/// Builds `{prefix}_{timestamp}_{base}` stamped with the current local time.
pub fn prefixed_name(prefix: &str, base: &str) -> String {
    prefixed_name_at(prefix, base, chrono::Local::now().naive_local())
}

/// Recovers the original base name from a `{prefix}_{date}_{time}_{base}`
/// name. Names that do not match the pattern are returned whole.
pub fn original_base_name(file_name: &str) -> &str {
    let parts: Vec<&str> = file_name.splitn(4, '_').collect();
    if parts.len() == 4 && is_digits(parts[1], 8) && is_digits(parts[2], 6) {
        parts[3]
    } else {
        file_name
    }
}

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.chars().all(|c| c.is_ascii_digit())
}

/// Writes downloaded bytes into the cache under the target's prefix and
/// returns the new path. The base name is a fresh UUID; the extension comes
/// from the URL when it is a known image extension, otherwise it is sniffed
/// from the bytes, defaulting to jpg.
pub fn store_download(
    cache_dir: &Path,
    prefix: &str,
    url: &str,
    bytes: &[u8],
) -> std::io::Result<PathBuf> {
    fs::create_dir_all(cache_dir)?;
    let ext = url_extension(url)
        .or_else(|| sniffed_extension(bytes).map(str::to_string))
        .unwrap_or_else(|| "jpg".to_string());
    let base = format!("{}.{}", Uuid::new_v4().simple(), ext);
    let path = cache_dir.join(prefixed_name(prefix, &base));
    fs::write(&path, bytes)?;
    Ok(path)
}

fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

fn sniffed_extension(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        image::ImageFormat::Jpeg => Some("jpg"),
        image::ImageFormat::Png => Some("png"),
        image::ImageFormat::WebP => Some("webp"),
        image::ImageFormat::Bmp => Some("bmp"),
        _ => None,
    }
}

/// Retention grouping key for a cache file name. The full target prefix is
/// the key, so `monitor0` and `monitor1` are distinct groups and
/// `lockscreen_random` does not share a group with `lockscreen`. Names
/// without a separator fall into "other".
pub fn group_key(file_name: &str) -> &str {
    if file_name.starts_with("lockscreen_random_") {
        return "lockscreen_random";
    }
    match file_name.find('_') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => "other",
    }
}

/// Deletes all but the `keep` most recent image files per prefix group.
/// Enumeration and deletion failures are logged and swallowed; this never
/// fails the surrounding run.
pub fn prune(cache_dir: &Path, keep: usize) {
    let entries = match fs::read_dir(cache_dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("cache prune skipped, cannot read {}: {}", cache_dir.display(), e);
            return;
        }
    };

    let mut groups: HashMap<String, Vec<(Recency, PathBuf)>> = HashMap::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if !path.is_file() || !is_image_file(&name) {
            continue;
        }
        let key = group_key(&name).to_string();
        let recency = recency(&path, &name);
        groups.entry(key).or_default().push((recency, path));
    }

    let mut deleted = 0usize;
    for files in groups.values_mut() {
        if files.len() <= keep {
            continue;
        }
        files.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, path) in files.drain(keep..) {
            match fs::remove_file(&path) {
                Ok(()) => deleted += 1,
                Err(e) => warn!("failed to prune {}: {}", path.display(), e),
            }
        }
    }
    if deleted > 0 {
        debug!("cache prune removed {} file(s)", deleted);
    }
}

type Recency = (NaiveDateTime, SystemTime);

/// Recency of a cache file. The stamp embedded in the name is authoritative
/// (it is the creation instant by construction); filesystem mtime breaks
/// ties and covers foreign files.
fn recency(path: &Path, name: &str) -> Recency {
    let stamp = name_timestamp(name).unwrap_or(NaiveDateTime::MIN);
    let mtime = fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH);
    (stamp, mtime)
}

fn name_timestamp(file_name: &str) -> Option<NaiveDateTime> {
    let parts: Vec<&str> = file_name.split('_').collect();
    for window in parts.windows(2) {
        if is_digits(window[0], 8) && is_digits(window[1], 6) {
            let stamp = format!("{}_{}", window[0], window[1]);
            if let Ok(ts) = NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT) {
                return Some(ts);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "wallflow-cache-{}-{}",
            tag,
            Uuid::new_v4().simple()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn stamp(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn prefixed_name_layout() {
        let name = prefixed_name_at("desktop", "abc.jpg", stamp(12, 0, 0));
        assert_eq!(name, "desktop_20240305_120000_abc.jpg");
    }

    #[test]
    fn base_name_recovery() {
        assert_eq!(
            original_base_name("desktop_20240305_120000_abc.jpg"),
            "abc.jpg"
        );
        assert_eq!(original_base_name("fav_20240101_000001_pic.png"), "pic.png");
        // malformed stamps keep the whole name
        assert_eq!(original_base_name("desktop_2024_12_abc.jpg"), "desktop_2024_12_abc.jpg");
        assert_eq!(original_base_name("plain.jpg"), "plain.jpg");
        // the two-word prefix pushes the stamp out of the expected slots
        assert_eq!(
            original_base_name("lockscreen_random_20240305_120000_abc.jpg"),
            "lockscreen_random_20240305_120000_abc.jpg"
        );
    }

    #[test]
    fn grouping_distinguishes_monitor_indexes() {
        assert_eq!(group_key("desktop_20240305_120000_a.jpg"), "desktop");
        assert_eq!(group_key("monitor0_20240305_120000_a.jpg"), "monitor0");
        assert_eq!(group_key("monitor1_20240305_120000_a.jpg"), "monitor1");
        assert_eq!(group_key("monitor12_20240305_120000_a.jpg"), "monitor12");
        assert_eq!(group_key("lockscreen_20240305_120000_a.jpg"), "lockscreen");
        assert_eq!(
            group_key("lockscreen_random_20240305_120000_a.jpg"),
            "lockscreen_random"
        );
        assert_eq!(group_key("plain.jpg"), "other");
    }

    #[test]
    fn download_extension_from_url() {
        let dir = temp_dir("url-ext");
        let path = store_download(
            &dir,
            "desktop",
            "https://w.wallhaven.cc/full/ab/wallhaven-abc123.png?v=1",
            b"not really an image",
        )
        .unwrap();
        assert_eq!(path.extension().unwrap(), "png");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("desktop_"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn download_extension_sniffed_when_url_has_none() {
        let dir = temp_dir("sniff-ext");
        let png_magic = [0x89u8, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        let path = store_download(&dir, "monitor0", "https://example.com/image", &png_magic).unwrap();
        assert_eq!(path.extension().unwrap(), "png");

        let path = store_download(&dir, "monitor0", "https://example.com/image", b"garbage").unwrap();
        assert_eq!(path.extension().unwrap(), "jpg");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn prune_keeps_three_newest_per_group() {
        let dir = temp_dir("prune");
        let make = |name: &str| fs::write(dir.join(name), b"x").unwrap();

        for s in 0..5 {
            make(&prefixed_name_at("desktop", "a.jpg", stamp(12, 0, s)));
        }
        for s in 0..4 {
            make(&prefixed_name_at("monitor0", "a.jpg", stamp(12, 1, s)));
        }
        for s in 0..2 {
            make(&prefixed_name_at("monitor1", "a.jpg", stamp(12, 2, s)));
        }
        make("plain.jpg");
        make("notes_readme.txt");

        prune(&dir, 3);

        let mut names: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        assert_eq!(
            names,
            vec![
                "desktop_20240305_120002_a.jpg",
                "desktop_20240305_120003_a.jpg",
                "desktop_20240305_120004_a.jpg",
                "monitor0_20240305_120101_a.jpg",
                "monitor0_20240305_120102_a.jpg",
                "monitor0_20240305_120103_a.jpg",
                "monitor1_20240305_120200_a.jpg",
                "monitor1_20240305_120201_a.jpg",
                "notes_readme.txt",
                "plain.jpg",
            ]
        );
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn prune_missing_dir_is_a_noop() {
        prune(Path::new("/nonexistent/wallflow-cache"), 3);
    }
}
