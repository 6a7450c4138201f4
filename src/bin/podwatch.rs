use log::info;

use podwatch::error::{AppRunError, ConfigError};
use podwatch::{init_logging, run};

#[tokio::main]
async fn main() -> Result<(), AppRunError> {
    init_logging();
    info!(concat!("podwatch ", env!("CARGO_PKG_VERSION")));

    match run().await {
        Err(AppRunError::Config {
            source: ConfigError::CanNotLock { .. },
        }) => {
            eprintln!("podwatch is already running");
            Ok(())
        }
        result => result,
    }
}
