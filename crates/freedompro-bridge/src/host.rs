//! File-backed accessory host.
//!
//! Stands in for a smart-home controller: registered accessories are
//! persisted as JSON and handed back as restored accessories on the next
//! run, and characteristic changes are logged.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info};

use freedompro_core::{AccessoryHost, CoreError, LocalAccessory};

use crate::error::CliError;

pub const STORE_FILE: &str = "accessories.json";

pub struct FileHost {
    path: PathBuf,
    accessories: Mutex<Vec<LocalAccessory>>,
}

impl FileHost {
    /// Open (or start) the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CliError> {
        let path = path.into();
        let accessories: Vec<LocalAccessory> = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), count = accessories.len(), "opened accessory store");

        Ok(Self {
            path,
            accessories: Mutex::new(accessories),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, accessories: &[LocalAccessory]) -> Result<(), CliError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(accessories)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl AccessoryHost for FileHost {
    fn restored_accessories(&self) -> Vec<LocalAccessory> {
        self.accessories
            .lock()
            .map(|a| a.clone())
            .unwrap_or_default()
    }

    fn register_accessory(&self, accessory: &LocalAccessory) -> Result<(), CoreError> {
        let mut accessories = self.accessories.lock().map_err(|e| CoreError::Host {
            message: e.to_string(),
        })?;

        accessories.push(accessory.clone());
        if let Err(e) = self.persist(&accessories) {
            accessories.pop();
            return Err(CoreError::Host {
                message: format!("failed to write {}: {e}", self.path.display()),
            });
        }

        info!(
            accessory = %accessory.display_name,
            composite = %accessory.composite_id(),
            "registered accessory"
        );
        Ok(())
    }

    fn restore_accessory(&self, accessory: &LocalAccessory) {
        debug!(accessory = %accessory.display_name, "accessory restored");
    }

    fn notify_characteristic_changed(&self, accessory: &LocalAccessory, on: bool) {
        info!(
            accessory = %accessory.display_name,
            composite = %accessory.composite_id(),
            on,
            "characteristic On changed"
        );
    }
}
