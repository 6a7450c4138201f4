#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "windows")]
pub use windows::classic_airpods_device;

/// Platforms without a classic-presence probe report nothing; the BLE
/// advertisement path still works on its own.
#[cfg(not(target_os = "windows"))]
pub async fn classic_airpods_device() -> Option<String> {
    None
}

use serde::Deserialize;

// Only the windows module feeds real query output through these; elsewhere
// they are exercised by the tests alone.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
#[derive(Debug, Deserialize)]
pub(crate) struct PnpDevice {
    #[serde(rename = "Status")]
    pub status: Option<String>,
    #[serde(rename = "FriendlyName")]
    pub friendly_name: Option<String>,
}

/// PowerShell's `ConvertTo-Json` emits a bare object for a single result and
/// an array for several.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum PnpQueryOutput {
    One(PnpDevice),
    Many(Vec<PnpDevice>),
}

/// Pick the name of the first connected (`Status == "OK"`) device out of a
/// `Get-PnpDevice | ConvertTo-Json` result.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub(crate) fn parse_pnp_device_json(stdout: &str) -> Option<String> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return None;
    }

    let output: PnpQueryOutput = match serde_json::from_str(trimmed) {
        Ok(output) => output,
        Err(err) => {
            log::debug!("Failed to parse PnP device info: {err}");
            return None;
        }
    };

    let devices = match output {
        PnpQueryOutput::One(device) => vec![device],
        PnpQueryOutput::Many(devices) => devices,
    };

    devices
        .into_iter()
        .filter(|device| device.status.as_deref() == Some("OK"))
        .find_map(|device| device.friendly_name.filter(|name| !name.is_empty()))
}
