use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{error, info};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::types::Settings;
use crate::error::readable_panic_payload;
use crate::protocol::types::BatteryReading;
use crate::state::history::ReadingHistory;
use crate::state::types::{ConnectionState, DeviceState, ObserverId, StateObserver};

/// Everything that must change together under one lock: the history buffer,
/// the current snapshot, the observer registry and the debounce timestamp.
struct Inner {
    state: DeviceState,
    history: ReadingHistory,
    observers: Vec<(ObserverId, Arc<dyn StateObserver>)>,
    next_observer_id: u64,
    last_notify: Option<Instant>,
}

/// Observers and snapshot collected under the lock, delivered outside it.
type PendingDispatch = (Vec<Arc<dyn StateObserver>>, DeviceState);

/// Thread-safe, observable device state container.
///
/// Three concurrent activities push events here: advertisement ingestion,
/// classic-presence polling and the silence-timeout ticker. Every mutation
/// replaces the snapshot wholesale and (debounced) fans it out to the
/// registered observers.
pub struct StateManager {
    inner: Mutex<Inner>,
    disconnect_timeout: Duration,
    debounce_interval: Duration,
    timeout_poll_interval: Duration,
}

impl StateManager {
    pub fn new(settings: &Settings) -> Self {
        StateManager {
            inner: Mutex::new(Inner {
                state: DeviceState::default(),
                history: ReadingHistory::new(),
                observers: Vec::new(),
                next_observer_id: 0,
                last_notify: None,
            }),
            disconnect_timeout: settings.disconnect_timeout(),
            debounce_interval: settings.debounce_interval(),
            timeout_poll_interval: settings.timeout_poll_interval(),
        }
    }

    // ---- observers ----

    pub fn add_observer(&self, observer: Arc<dyn StateObserver>) -> ObserverId {
        let mut inner = self.lock();
        let id = ObserverId(inner.next_observer_id);
        inner.next_observer_id += 1;
        inner.observers.push((id, observer));
        id
    }

    pub fn remove_observer(&self, id: ObserverId) {
        let mut inner = self.lock();
        inner.observers.retain(|(observer_id, _)| *observer_id != id);
    }

    /// Snapshot of the current state.
    pub fn current_state(&self) -> DeviceState {
        self.lock().state.clone()
    }

    // ---- events ----

    /// A decoded BLE advertisement arrived.
    pub fn handle_advertisement(&self, reading: BatteryReading) {
        let pending = {
            let mut inner = self.lock();
            inner.history.record(reading);
            let smoothed = inner.history.smoothed(&reading);

            inner.state = DeviceState {
                connection: ConnectionState::Connected,
                battery: Some(smoothed),
                last_seen: Some(Instant::now()),
                bluetooth_available: true,
                classic_device_name: inner.state.classic_device_name.clone(),
            };
            self.collect_notification(&mut inner)
        };
        Self::dispatch(pending);
    }

    /// Mark the device as disconnected (silence timeout or manual).
    pub fn mark_disconnected(&self) {
        let pending = {
            let mut inner = self.lock();
            if inner.state.connection == ConnectionState::Disconnected
                && inner.state.classic_device_name.is_none()
            {
                // Already disconnected, skip the duplicate notification.
                return;
            }
            inner.state = DeviceState {
                connection: ConnectionState::Disconnected,
                battery: None,
                last_seen: inner.state.last_seen,
                bluetooth_available: inner.state.bluetooth_available,
                classic_device_name: None,
            };
            self.collect_notification(&mut inner)
        };
        Self::dispatch(pending);
    }

    /// The presence poller saw the device connect over classic bluetooth.
    ///
    /// A live BLE reading is richer evidence than this coarse signal and is
    /// never overwritten by it.
    pub fn handle_classic_connected(&self, device_name: String) {
        let pending = {
            let mut inner = self.lock();
            if inner.state.connection == ConnectionState::Connected && inner.state.battery.is_some()
            {
                return;
            }
            inner.state = DeviceState {
                connection: ConnectionState::Connected,
                battery: inner.state.battery,
                last_seen: Some(Instant::now()),
                bluetooth_available: true,
                classic_device_name: Some(device_name),
            };
            self.collect_notification(&mut inner)
        };
        Self::dispatch(pending);
    }

    /// The presence poller saw the classic bluetooth connection go away.
    pub fn handle_classic_disconnected(&self) {
        let pending = {
            let mut inner = self.lock();

            let ble_fresh = inner.state.battery.is_some()
                && inner
                    .state
                    .last_seen
                    .is_some_and(|seen| seen.elapsed() < self.disconnect_timeout);
            if ble_fresh {
                // The BLE reading is still fresh; only drop the classic name
                // and keep the snapshot connected.
                inner.state = DeviceState {
                    classic_device_name: None,
                    ..inner.state.clone()
                };
                return;
            }

            inner.state = DeviceState {
                connection: ConnectionState::Disconnected,
                battery: None,
                last_seen: inner.state.last_seen,
                bluetooth_available: inner.state.bluetooth_available,
                classic_device_name: None,
            };
            self.collect_notification(&mut inner)
        };
        Self::dispatch(pending);
    }

    /// The bluetooth adapter is missing or off.
    pub fn set_adapter_unavailable(&self) {
        let pending = {
            let mut inner = self.lock();
            inner.state = DeviceState {
                connection: ConnectionState::Disconnected,
                battery: None,
                last_seen: None,
                bluetooth_available: false,
                classic_device_name: None,
            };
            self.collect_notification(&mut inner)
        };
        Self::dispatch(pending);
    }

    /// The bluetooth adapter is usable again. Recovery alone is not user
    /// visible; the next advertisement carries the real update, so no
    /// notification goes out.
    pub fn set_adapter_available(&self) {
        let mut inner = self.lock();
        inner.state = DeviceState {
            bluetooth_available: true,
            ..inner.state.clone()
        };
    }

    // ---- silence timeout ----

    /// Periodically check whether BLE advertisements have stopped arriving.
    /// Exits within one poll interval of `cancel` being cancelled.
    pub fn spawn_timeout_checker(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(self.timeout_poll_interval) => {
                        if self.reading_timed_out() {
                            info!("No advertisement for {:?}, marking disconnected", self.disconnect_timeout);
                            self.mark_disconnected();
                        }
                    }
                }
            }
        })
    }

    fn reading_timed_out(&self) -> bool {
        let inner = self.lock();
        inner.state.connection == ConnectionState::Connected
            && inner.state.battery.is_some()
            && inner
                .state
                .last_seen
                .is_some_and(|seen| seen.elapsed() > self.disconnect_timeout)
    }

    // ---- dispatch ----

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("state lock poisoned")
    }

    /// Apply the debounce rule and, if a notification is due, collect the
    /// observer list and snapshot to deliver once the lock is released.
    fn collect_notification(&self, inner: &mut Inner) -> Option<PendingDispatch> {
        let now = Instant::now();
        if let Some(last) = inner.last_notify {
            if now.duration_since(last) < self.debounce_interval {
                // The held state was already updated; a later event has to
                // flush it to the observers.
                return None;
            }
        }
        inner.last_notify = Some(now);

        let observers = inner
            .observers
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        Some((observers, inner.state.clone()))
    }

    fn dispatch(pending: Option<PendingDispatch>) {
        let Some((observers, snapshot)) = pending else {
            return;
        };
        for observer in observers {
            let result = catch_unwind(AssertUnwindSafe(|| observer.state_changed(&snapshot)));
            if let Err(payload) = result {
                error!("State observer panicked: {}", readable_panic_payload(&payload));
            }
        }
    }
}
