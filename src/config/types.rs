use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the state machine and the background pollers.
///
/// All values have sensible defaults; a missing or empty settings file is
/// equivalent to `Settings::default()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Seconds of BLE silence before the device is considered disconnected.
    pub disconnect_timeout_secs: u64,
    /// Minimum milliseconds between observer notifications.
    pub debounce_ms: u64,
    /// How often the silence-timeout ticker wakes up, in seconds.
    pub timeout_poll_secs: u64,
    /// How often the classic-presence poller queries the OS, in seconds.
    pub classic_poll_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            disconnect_timeout_secs: 30,
            debounce_ms: 500,
            timeout_poll_secs: 5,
            classic_poll_secs: 5,
        }
    }
}

impl Settings {
    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_secs(self.disconnect_timeout_secs)
    }

    pub fn debounce_interval(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn timeout_poll_interval(&self) -> Duration {
        Duration::from_secs(self.timeout_poll_secs)
    }

    pub fn classic_poll_interval(&self) -> Duration {
        Duration::from_secs(self.classic_poll_secs)
    }
}
