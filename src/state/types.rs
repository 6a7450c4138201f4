use tokio::time::Instant;

use crate::protocol::types::BatteryReading;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Complete snapshot of the current device status.
///
/// A snapshot is never mutated in place; every transition in the state
/// manager replaces it wholesale, so a clone handed to an observer stays
/// internally consistent forever.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub connection: ConnectionState,
    /// Smoothed battery reading from BLE advertisements, when one is live.
    pub battery: Option<BatteryReading>,
    /// When the last advertisement (or classic connect) was seen.
    pub last_seen: Option<Instant>,
    /// False when the bluetooth adapter is missing or off.
    pub bluetooth_available: bool,
    /// Device name reported by the classic-bluetooth presence poller.
    pub classic_device_name: Option<String>,
}

impl Default for DeviceState {
    fn default() -> Self {
        DeviceState {
            connection: ConnectionState::Disconnected,
            battery: None,
            last_seen: None,
            bluetooth_available: true,
            classic_device_name: None,
        }
    }
}

impl DeviceState {
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    /// True if any available battery level is at or below 20%.
    pub fn is_low_battery(&self) -> bool {
        self.battery.as_ref().is_some_and(BatteryReading::is_low)
    }
}

/// Receives a state snapshot on every (debounced) user-visible transition.
///
/// Implementations must not block; they are invoked synchronously from
/// whichever task triggered the transition.
pub trait StateObserver: Send + Sync {
    fn state_changed(&self, state: &DeviceState);
}

/// Handle returned by `StateManager::add_observer`, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(pub(crate) u64);
