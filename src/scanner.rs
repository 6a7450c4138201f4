use std::sync::Arc;
use std::time::Duration;

use btleplug::api::{Central as _, CentralEvent, Manager as _, ScanFilter};
use btleplug::platform::{Adapter, Manager};
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::error::ScanError;
use crate::protocol::constants::APPLE_COMPANY_ID;
use crate::protocol::parser::parse_manufacturer_data;
use crate::state::manager::StateManager;

/**
 * How long (milliseconds) to wait before restarting the scan after an
 * adapter failure.
 */
const SCAN_RETRY_DELAY: u64 = 10_000;

async fn first_adapter() -> Result<Adapter, ScanError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().ok_or(ScanError::NoAdapter)
}

/// Run one scan session until cancellation or an adapter failure.
async fn scan_session(state: &StateManager, cancel: &CancellationToken) -> Result<(), ScanError> {
    let adapter = first_adapter().await?;
    let mut events = adapter.events().await?;

    info!(
        "Scanning using adapter {}...",
        adapter
            .adapter_info()
            .await
            .unwrap_or("UNKNOWN".to_string())
    );
    adapter.start_scan(ScanFilter::default()).await?;
    state.set_adapter_available();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(err) = adapter.stop_scan().await {
                    debug!("Failed to stop scan during shutdown: {err}");
                }
                return Ok(());
            }
            event = events.next() => match event {
                Some(CentralEvent::ManufacturerDataAdvertisement { manufacturer_data, .. }) => {
                    if let Some(payload) = manufacturer_data.get(&APPLE_COMPANY_ID) {
                        if let Some(reading) = parse_manufacturer_data(APPLE_COMPANY_ID, payload) {
                            debug!(
                                "{} advertisement | L:{:?} R:{:?} C:{:?}",
                                reading.model,
                                reading.left_battery,
                                reading.right_battery,
                                reading.case_battery,
                            );
                            state.handle_advertisement(reading);
                        }
                    }
                }
                Some(_) => {}
                None => return Err(ScanError::EventStreamClosed),
            }
        }
    }
}

/// Continuous BLE scanning with automatic restart on failure.
///
/// On any adapter error the state manager is told the adapter is gone and
/// the scan is retried after a delay; a working restart flips it back.
pub fn spawn_scanner(state: Arc<StateManager>, cancel: CancellationToken) -> JoinHandle<()> {
    spawn(async move {
        loop {
            match scan_session(&state, &cancel).await {
                Ok(()) => break, // cancelled
                Err(err) => {
                    warn!(
                        "BLE scan failed: {err}; retrying in {}s",
                        SCAN_RETRY_DELAY / 1000
                    );
                    state.set_adapter_unavailable();

                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = sleep(Duration::from_millis(SCAN_RETRY_DELAY)) => {}
                    }
                }
            }
        }
    })
}
