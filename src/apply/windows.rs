//! Windows backends: `IDesktopWallpaper` COM for monitors, the classic
//! `SystemParametersInfoW` call for the whole desktop, WinRT for the lock
//! screen.

use super::{FullscreenDetector, WallpaperApplier};
use crate::error::ApplyError;
use crate::monitors::{MonitorInfo, MonitorProvider};
use async_trait::async_trait;
use std::ffi::c_void;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use tracing::{debug, warn};
use windows::core::{HSTRING, PCWSTR};
use windows::Storage::StorageFile;
use windows::System::UserProfile::LockScreen;
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoTaskMemFree, CLSCTX_ALL, COINIT_APARTMENTTHREADED,
};
use windows::Win32::UI::Shell::{
    DesktopWallpaper, IDesktopWallpaper, SHQueryUserNotificationState, DWPOS_FILL,
    QUNS_PRESENTATION_MODE, QUNS_RUNNING_D3D_FULL_SCREEN,
};
use windows::Win32::UI::WindowsAndMessaging::{
    SystemParametersInfoW, SPIF_SENDCHANGE, SPIF_UPDATEINIFILE, SPI_SETDESKWALLPAPER,
};

fn wide(path: &Path) -> Vec<u16> {
    path.as_os_str().encode_wide().chain(std::iter::once(0)).collect()
}

fn full_path(path: &Path) -> Result<std::path::PathBuf, ApplyError> {
    Ok(std::path::absolute(path)?)
}

fn desktop_wallpaper() -> windows::core::Result<IDesktopWallpaper> {
    unsafe {
        // S_FALSE / RPC_E_CHANGED_MODE just mean COM is already up on this
        // thread.
        let _ = CoInitializeEx(None, COINIT_APARTMENTTHREADED);
        CoCreateInstance(&DesktopWallpaper, None, CLSCTX_ALL)
    }
}

fn set_desktop_sync(path: &Path) -> Result<(), ApplyError> {
    let full = full_path(path)?;
    let wide_path = wide(&full);
    unsafe {
        SystemParametersInfoW(
            SPI_SETDESKWALLPAPER,
            0,
            Some(wide_path.as_ptr() as *mut c_void),
            SPIF_UPDATEINIFILE | SPIF_SENDCHANGE,
        )?;
    }
    Ok(())
}

fn set_monitor_sync(device_id: &str, path: &Path) -> Result<(), ApplyError> {
    let full = full_path(path)?;
    let wide_path = wide(&full);
    let wide_device: Vec<u16> = device_id.encode_utf16().chain(std::iter::once(0)).collect();
    let wallpaper = desktop_wallpaper()?;
    unsafe {
        wallpaper.SetPosition(DWPOS_FILL)?;
        wallpaper.SetWallpaper(PCWSTR(wide_device.as_ptr()), PCWSTR(wide_path.as_ptr()))?;
    }
    Ok(())
}

fn set_lock_screen_sync(path: &Path) -> Result<(), ApplyError> {
    let full = full_path(path)?;
    let file = StorageFile::GetFileFromPathAsync(&HSTRING::from(full.as_os_str()))
        .map_err(ApplyError::from)?
        .get()
        .map_err(ApplyError::from)?;
    LockScreen::SetImageFileAsync(&file)
        .map_err(ApplyError::from)?
        .get()
        .map_err(ApplyError::from)?;
    Ok(())
}

/// Native applier for Windows desktops.
pub struct WindowsApplier;

impl WindowsApplier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowsApplier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WallpaperApplier for WindowsApplier {
    async fn apply_desktop(&self, path: &Path) -> Result<(), ApplyError> {
        debug!("Setting desktop wallpaper: {}", path.display());
        set_desktop_sync(path)
    }

    async fn apply_monitor(&self, device_id: &str, path: &Path) -> Result<(), ApplyError> {
        debug!("Setting wallpaper on {}: {}", device_id, path.display());
        set_monitor_sync(device_id, path)
    }

    async fn apply_lock_screen(&self, path: &Path) -> Result<(), ApplyError> {
        debug!("Setting lock screen image: {}", path.display());
        let owned = path.to_path_buf();
        // WinRT blocks on an async operation internally; keep it off the
        // runtime workers.
        tokio::task::spawn_blocking(move || set_lock_screen_sync(&owned))
            .await
            .map_err(|e| ApplyError::Os(e.to_string()))?
    }
}

/// Monitor provider backed by `IDesktopWallpaper` enumeration.
pub struct WindowsMonitors;

impl WindowsMonitors {
    pub fn new() -> Self {
        Self
    }

    fn device_paths() -> windows::core::Result<Vec<String>> {
        let wallpaper = desktop_wallpaper()?;
        let mut paths = Vec::new();
        unsafe {
            let count = wallpaper.GetMonitorDevicePathCount()?;
            for i in 0..count {
                let raw = wallpaper.GetMonitorDevicePathAt(i)?;
                if raw.is_null() {
                    continue;
                }
                let device = raw.to_string().unwrap_or_default();
                CoTaskMemFree(Some(raw.0 as *const c_void));
                if !device.is_empty() {
                    paths.push(device);
                }
            }
        }
        Ok(paths)
    }
}

impl Default for WindowsMonitors {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorProvider for WindowsMonitors {
    fn detect(&self) -> Vec<MonitorInfo> {
        match Self::device_paths() {
            Ok(paths) => paths
                .into_iter()
                .enumerate()
                .map(|(index, device_id)| MonitorInfo {
                    index,
                    device_id,
                    display_name: format!("Monitor {}", index + 1),
                })
                .collect(),
            Err(e) => {
                warn!("Monitor enumeration failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// Fullscreen detection through the shell notification state.
pub struct WindowsFullscreen;

impl WindowsFullscreen {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowsFullscreen {
    fn default() -> Self {
        Self::new()
    }
}

impl FullscreenDetector for WindowsFullscreen {
    fn fullscreen_active(&self) -> bool {
        match unsafe { SHQueryUserNotificationState() } {
            Ok(state) => {
                state == QUNS_RUNNING_D3D_FULL_SCREEN || state == QUNS_PRESENTATION_MODE
            }
            Err(_) => false,
        }
    }
}
