use std::env::current_exe;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str;
use std::sync::Arc;
use std::sync::Mutex;

use directories_next::ProjectDirs;
use fd_lock::{RwLock, RwLockWriteGuard};
use log::{info, warn};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::config::types::Settings;
use crate::error::ConfigError;

// creates a path to podwatch.json in the same directory as the executable
// this could be useful for usb sticks
fn get_portable_config_path() -> Option<PathBuf> {
    match current_exe() {
        Ok(mut path) => {
            if !path.set_extension("json") {
                warn!("current exe has no filename: {}", path.to_string_lossy());
                return None;
            }

            Some(path)
        }
        Err(err) => {
            warn!("failed to get current exe path: {:?}", err);
            None
        }
    }
}

// creates a path to podwatch.json in an os dependent standard directory, such
// as %AppData% on windows.
fn get_local_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "podwatch").map(|dirs| dirs.config_dir().join("podwatch.json"))
}

fn get_config_path() -> Result<PathBuf, ConfigError> {
    let portable = get_portable_config_path();
    if let Some(path) = portable {
        let attr = std::fs::metadata(&path);
        match attr {
            Ok(attr) => {
                if attr.is_file() {
                    return Ok(path);
                }
            }
            Err(err) => {
                warn!(
                    "Could not read metadata of: {}; Using local path instead. ({:?})",
                    path.to_string_lossy(),
                    err
                );
            }
        }
    }

    match get_local_config_path() {
        None => Err(ConfigError::NoConfigPath),
        Some(path) => Ok(path),
    }
}

pub struct ConfigIOLocker {
    rw_lock: RwLock<std::fs::File>,
}

impl ConfigIOLocker {
    pub fn lock(&mut self) -> Result<RwLockWriteGuard<'_, std::fs::File>, ConfigError> {
        match self.rw_lock.try_write() {
            Ok(guard) => Ok(guard),
            Err(source) => Err(ConfigError::CanNotLock { source }),
        }
    }
}

struct ConfigIOInner {
    file: std::fs::File,
}

#[derive(Clone)]
pub struct ConfigIO {
    inner: Arc<Mutex<ConfigIOInner>>,
}

impl ConfigIO {
    pub fn new_sync() -> Result<Self, ConfigError> {
        let path = get_config_path()?;
        info!("Using settings file {}", path.to_string_lossy());

        let directory = path
            .parent()
            .expect("Failed to determine parent path of settings path");
        std::fs::create_dir_all(directory)?;

        // the file handle doubles as the lock target so that only one
        // instance of this application uses the settings file.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .truncate(false)
            .append(false)
            .create(true)
            .open(path)?;

        let inner = ConfigIOInner { file };
        Ok(ConfigIO {
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    pub fn locker(&mut self) -> Result<ConfigIOLocker, ConfigError> {
        let inner = self.inner.lock().expect("Failed to lock ConfigIO inner");

        Ok(ConfigIOLocker {
            rw_lock: RwLock::new(inner.file.try_clone()?),
        })
    }

    // The File returned from here should never be closed!
    fn get_file(&self) -> Result<File, ConfigError> {
        let inner = self.inner.lock().expect("Failed to lock ConfigIO inner");
        let file = inner.file.try_clone()?; // std File
        Ok(File::from_std(file)) // tokio File
    }

    /// Read the settings file. `None` means the file is empty (first run).
    pub async fn read(&self) -> Result<Option<Settings>, ConfigError> {
        let mut file = self.get_file()?;
        info!("Reading settings file");

        let mut content = vec![];
        file.read_to_end(&mut content).await?;

        if content.is_empty() {
            return Ok(None);
        }

        let content = str::from_utf8(&content)?;

        let settings: Settings = serde_json::from_str(content)?;
        Ok(Some(settings))
    }

    pub async fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        let mut file = self.get_file()?;
        info!("Saving settings");

        let content = serde_json::to_string_pretty(settings)?;
        file.rewind().await?;
        file.set_len(0).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
