use std::env;
use std::sync::Arc;

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::io::ConfigIO;
use crate::config::types::Settings;
use crate::error::AppRunError;
use crate::state::manager::StateManager;
use crate::state::types::{ConnectionState, DeviceState, StateObserver};

pub mod config;
pub mod error;
pub mod os;
pub mod presence;
pub mod protocol;
pub mod scanner;
pub mod state;

pub fn init_logging() {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(fern::log_file(log_file).expect("Failed to open LOG_FILE"));
    }

    dispatch.apply().expect("Failed to initialize logger");
}

/// Renders state transitions to the log. This is the only consumer shipped
/// with the binary; a UI would register its own observer the same way.
struct LogObserver;

impl StateObserver for LogObserver {
    fn state_changed(&self, state: &DeviceState) {
        match state.connection {
            ConnectionState::Connected => {
                if let Some(battery) = &state.battery {
                    info!(
                        "{} | left {} right {} case {}",
                        battery.model,
                        format_level(battery.left_battery, battery.left_charging),
                        format_level(battery.right_battery, battery.right_charging),
                        format_level(battery.case_battery, battery.case_charging),
                    );
                    if state.is_low_battery() {
                        warn!("Battery low");
                    }
                } else if let Some(name) = &state.classic_device_name {
                    info!("{name} | connected, no battery data yet");
                }
            }
            ConnectionState::Disconnected => {
                if state.bluetooth_available {
                    info!("Disconnected");
                } else {
                    warn!("Bluetooth adapter unavailable");
                }
            }
        }
    }
}

fn format_level(level: Option<u8>, charging: bool) -> String {
    let level = match level {
        Some(level) => format!("{level}%"),
        None => String::from("--"),
    };
    if charging {
        format!("{level}+")
    } else {
        level
    }
}

pub async fn run() -> Result<(), AppRunError> {
    let mut config_io = ConfigIO::new_sync()?;

    // one running instance per settings file
    let mut locker = config_io.locker()?;
    let _lock_guard = locker.lock()?;

    let settings = match config_io.read().await? {
        Some(settings) => settings,
        None => {
            let settings = Settings::default();
            config_io.save(&settings).await?;
            settings
        }
    };

    let manager = Arc::new(StateManager::new(&settings));
    manager.add_observer(Arc::new(LogObserver));

    let cancel = CancellationToken::new();
    let ticker = manager.clone().spawn_timeout_checker(cancel.clone());
    let scan = scanner::spawn_scanner(manager.clone(), cancel.clone());
    let poller = presence::spawn_presence_poller(
        manager.clone(),
        cancel.clone(),
        settings.classic_poll_interval(),
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    // Cancel first so no event reaches the observers during teardown.
    cancel.cancel();
    for (name, handle) in [("ticker", ticker), ("scanner", scan), ("poller", poller)] {
        if let Err(err) = handle.await {
            warn!("Failed to join {name} task: {err}");
        }
    }

    Ok(())
}
