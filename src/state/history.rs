use std::collections::VecDeque;

use crate::protocol::types::BatteryReading;

/// How many recent readings are kept for smoothing.
pub const HISTORY_CAPACITY: usize = 5;

/// Bounded FIFO of recent battery readings.
///
/// Advertisement flicker is typically single-sample noise; a mode filter over
/// a five sample window suppresses it without a perceptible lag.
#[derive(Debug, Default)]
pub struct ReadingHistory {
    readings: VecDeque<BatteryReading>,
}

impl ReadingHistory {
    pub fn new() -> Self {
        ReadingHistory {
            readings: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Append a reading, silently evicting the oldest past capacity.
    pub fn record(&mut self, reading: BatteryReading) {
        if self.readings.len() == HISTORY_CAPACITY {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Derive a stabilized reading by per-field mode voting.
    ///
    /// Each battery level and charging flag independently takes the most
    /// frequent value across the held samples; battery fields with no
    /// non-null samples fall through to `latest`. The model label and raw
    /// status byte are never smoothed.
    pub fn smoothed(&self, latest: &BatteryReading) -> BatteryReading {
        if self.readings.is_empty() {
            return *latest;
        }

        BatteryReading {
            left_battery: mode(self.readings.iter().filter_map(|r| r.left_battery))
                .or(latest.left_battery),
            right_battery: mode(self.readings.iter().filter_map(|r| r.right_battery))
                .or(latest.right_battery),
            case_battery: mode(self.readings.iter().filter_map(|r| r.case_battery))
                .or(latest.case_battery),
            left_charging: mode(self.readings.iter().map(|r| r.left_charging))
                .unwrap_or(latest.left_charging),
            right_charging: mode(self.readings.iter().map(|r| r.right_charging))
                .unwrap_or(latest.right_charging),
            case_charging: mode(self.readings.iter().map(|r| r.case_charging))
                .unwrap_or(latest.case_charging),
            model: latest.model,
            raw_status: latest.raw_status,
        }
    }
}

/// Statistical mode; ties break toward the value that first reaches the
/// winning count in iteration order.
fn mode<T: Copy + PartialEq>(values: impl Iterator<Item = T>) -> Option<T> {
    let mut counts: Vec<(T, usize)> = Vec::new();
    let mut best: Option<(T, usize)> = None;

    for value in values {
        let count = match counts.iter_mut().find(|(v, _)| *v == value) {
            Some(entry) => {
                entry.1 += 1;
                entry.1
            }
            None => {
                counts.push((value, 1));
                1
            }
        };

        match best {
            Some((_, top)) if count <= top => {}
            _ => best = Some((value, count)),
        }
    }

    best.map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(left: Option<u8>, right: Option<u8>, case: Option<u8>) -> BatteryReading {
        BatteryReading {
            left_battery: left,
            right_battery: right,
            case_battery: case,
            left_charging: false,
            right_charging: false,
            case_charging: false,
            model: "AirPods Pro 2",
            raw_status: 0,
        }
    }

    #[test]
    fn capacity_is_bounded_with_fifo_eviction() {
        let mut history = ReadingHistory::new();
        // Six distinguishable sentinel readings.
        for left in [0u8, 10, 20, 30, 40, 50] {
            history.record(reading(Some(left), None, None));
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);

        // The first sentinel (left=0) was evicted: the remaining five are
        // all distinct, so the mode falls to the earliest survivor.
        let smoothed = history.smoothed(&reading(Some(50), None, None));
        assert_eq!(smoothed.left_battery, Some(10));
    }

    #[test]
    fn mode_picks_the_majority_value() {
        let mut history = ReadingHistory::new();
        for left in [50u8, 50, 60, 50, 70] {
            history.record(reading(Some(left), None, None));
        }
        let smoothed = history.smoothed(&reading(Some(70), None, None));
        assert_eq!(smoothed.left_battery, Some(50));
    }

    #[test]
    fn tie_breaks_toward_first_to_reach_the_count() {
        // 60 is seen first, but 50 is the first value to reach a count of 2.
        assert_eq!(mode([60u8, 50, 50, 60].into_iter()), Some(50));
    }

    #[test]
    fn fields_with_no_samples_pass_through_the_latest_reading() {
        let mut history = ReadingHistory::new();
        history.record(reading(Some(50), None, None));
        history.record(reading(Some(50), None, None));

        let latest = reading(Some(50), None, Some(70));
        let smoothed = history.smoothed(&latest);
        assert_eq!(smoothed.left_battery, Some(50));
        assert_eq!(smoothed.right_battery, None);
        // Case level never appeared in the history, so the latest raw value
        // passes through.
        assert_eq!(smoothed.case_battery, Some(70));
    }

    #[test]
    fn charging_flags_are_smoothed_independently() {
        let mut history = ReadingHistory::new();
        for charging in [true, true, false, true] {
            let mut r = reading(Some(50), Some(50), None);
            r.left_charging = charging;
            history.record(r);
        }
        let smoothed = history.smoothed(&reading(Some(50), Some(50), None));
        assert!(smoothed.left_charging);
        assert!(!smoothed.right_charging);
    }

    #[test]
    fn model_and_status_come_from_the_latest_reading() {
        let mut history = ReadingHistory::new();
        let mut old = reading(Some(50), None, None);
        old.model = "AirPods Pro";
        old.raw_status = 0x01;
        history.record(old);

        let mut latest = reading(Some(50), None, None);
        latest.model = "AirPods Pro 2";
        latest.raw_status = 0x09;
        history.record(latest);

        let smoothed = history.smoothed(&latest);
        assert_eq!(smoothed.model, "AirPods Pro 2");
        assert_eq!(smoothed.raw_status, 0x09);
    }

    #[test]
    fn empty_history_returns_the_latest_reading() {
        let history = ReadingHistory::new();
        let latest = reading(Some(30), Some(40), Some(50));
        assert_eq!(history.smoothed(&latest), latest);
    }
}
