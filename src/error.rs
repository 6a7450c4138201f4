use std::any::Any;
use std::io;
use std::str::Utf8Error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to settings file")]
    NoConfigPath,

    #[error("Failed to acquire file lock on settings file: {source}")]
    CanNotLock { source: io::Error },

    #[error("Failed to decode settings as utf-8: {source}")]
    Utf8Error {
        #[from]
        source: Utf8Error,
    },

    #[error("Failed to read/write settings file: {source}")]
    IOError {
        #[from]
        source: io::Error,
    },

    #[error("Failed to parse/build settings file: {source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Error communicating with the BLE stack (btleplug): {source}")]
    Btle {
        #[from]
        source: btleplug::Error,
    },

    #[error("No bluetooth adapter is available")]
    NoAdapter,

    #[error("The BLE event stream ended unexpectedly")]
    EventStreamClosed,
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to run application (config): {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Failed to run application (io): {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

pub fn readable_panic_payload(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("???")
    }
}
