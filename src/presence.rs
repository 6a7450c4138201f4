use std::sync::Arc;
use std::time::Duration;

use log::info;
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::os;
use crate::state::manager::StateManager;

/// Periodically ask the OS whether the device is connected over classic
/// bluetooth and feed edge transitions into the state manager.
///
/// Classic presence is a coarse supplement to the BLE advertisement path:
/// it carries no battery data, but it is the primary connection mode while
/// the device is actively in use.
pub fn spawn_presence_poller(
    state: Arc<StateManager>,
    cancel: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    spawn(async move {
        let mut was_connected = false;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(interval) => {
                    match os::classic_airpods_device().await {
                        Some(name) if !was_connected => {
                            was_connected = true;
                            info!("Classic bluetooth device connected: {name}");
                            state.handle_classic_connected(name);
                        }
                        None if was_connected => {
                            was_connected = false;
                            info!("Classic bluetooth device disconnected");
                            state.handle_classic_disconnected();
                        }
                        _ => {}
                    }
                }
            }
        }
    })
}
