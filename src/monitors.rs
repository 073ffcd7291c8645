//! Monitor model and enumeration contract.

use serde::Serialize;

/// One attached display.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorInfo {
    pub index: usize,
    pub device_id: String,
    pub display_name: String,
}

/// Display enumeration. Queried fresh before every run so a display
/// reconfiguration takes effect on the next tick, never mid-run.
pub trait MonitorProvider: Send + Sync {
    fn detect(&self) -> Vec<MonitorInfo>;
}

/// Provider backed by a device list declared in the config file, for
/// setups where the applier is a shell command.
pub struct DeclaredMonitors {
    devices: Vec<String>,
}

impl DeclaredMonitors {
    pub fn new(devices: Vec<String>) -> Self {
        Self { devices }
    }
}

impl MonitorProvider for DeclaredMonitors {
    fn detect(&self) -> Vec<MonitorInfo> {
        self.devices
            .iter()
            .enumerate()
            .map(|(index, device)| MonitorInfo {
                index,
                device_id: device.clone(),
                display_name: format!("Monitor {}", index + 1),
            })
            .collect()
    }
}
