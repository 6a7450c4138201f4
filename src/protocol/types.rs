use crate::protocol::constants::LOW_BATTERY_PERCENT;

/// A single decoded Proximity Pairing advertisement.
///
/// Battery levels are percentages in steps of 10, or `None` when the device
/// did not report that level (for example the case battery while both pods
/// are out of the case).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryReading {
    pub left_battery: Option<u8>,
    pub right_battery: Option<u8>,
    pub case_battery: Option<u8>,
    pub left_charging: bool,
    pub right_charging: bool,
    pub case_charging: bool,
    pub model: &'static str,
    pub raw_status: u8,
}

impl BatteryReading {
    /// True when any reported battery level is at or below 20%.
    pub fn is_low(&self) -> bool {
        [self.left_battery, self.right_battery, self.case_battery]
            .into_iter()
            .flatten()
            .any(|level| level <= LOW_BATTERY_PERCENT)
    }
}
