use std::time::Duration;

use log::{debug, warn};
use tokio::process::Command;
use tokio::time::timeout;

use crate::os::parse_pnp_device_json;

/// How long the PowerShell query may take before it is abandoned.
const QUERY_DEADLINE: Duration = Duration::from_secs(8);

// Finds paired bluetooth AirPods devices. The Avrcp/Find My transport
// endpoints show up as separate PnP devices and are excluded here so that
// only the audio device itself counts as "connected".
const PS_QUERY: &str = "Get-PnpDevice -Class Bluetooth -ErrorAction SilentlyContinue \
 | Where-Object { $_.FriendlyName -like '*AirPod*' \
   -and $_.FriendlyName -notlike '*Avrcp*' \
   -and $_.FriendlyName -notlike '*Find My*' } \
 | Select-Object Status, FriendlyName \
 | ConvertTo-Json -Compress";

/// Ask Windows whether an AirPods device is connected over classic
/// bluetooth. Returns the friendly device name when one is.
pub async fn classic_airpods_device() -> Option<String> {
    let output = Command::new("powershell")
        .args(["-NoProfile", "-Command", PS_QUERY])
        .output();

    let output = match timeout(QUERY_DEADLINE, output).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            warn!("Failed to run the bluetooth device query: {err}");
            return None;
        }
        Err(_) => {
            warn!("Bluetooth device query timed out");
            return None;
        }
    };

    if !output.status.success() {
        debug!("Bluetooth device query exited with {}", output.status);
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let name = parse_pnp_device_json(&stdout);
    if let Some(name) = &name {
        debug!("AirPods connected (classic BT): {name}");
    }
    name
}
