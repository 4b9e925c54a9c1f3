//! Settings blob storage - Fixed-path key-value blobs with atomic replace

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::core::settings::{GlobalSettings, InstanceSettings};

/// File name of the global settings blob.
const GLOBAL_SETTINGS_FILE: &str = "MultiplaySettings.asset";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings blob {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write settings blob {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("settings blob {path} is not a key-value map: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("background settings write was aborted")]
    Aborted,
}

/// Loads and saves the per-instance and global settings blobs.
///
/// Each blob is a flat string-to-string map serialized as JSON, stored under
/// the origin workspace's `Library/` directory so it never travels into a
/// clone (clones symlink `Library` back to the origin and therefore see the
/// same blobs). Writes go through a temporary file and an atomic rename so a
/// concurrent reader never observes a torn blob.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    library_dir: PathBuf,
}

impl SettingsStore {
    pub fn new(origin: &Path) -> Self {
        Self {
            library_dir: origin.join("Library"),
        }
    }

    /// Path of the settings blob for one instance.
    pub fn instance_path(&self, id: u32) -> PathBuf {
        self.library_dir
            .join(format!("EditorInstanceSettings_{id}.asset"))
    }

    /// Path of the global settings blob.
    pub fn global_path(&self) -> PathBuf {
        self.library_dir.join(GLOBAL_SETTINGS_FILE)
    }

    /// Load one instance's settings; a missing or empty blob yields defaults.
    pub fn load(&self, id: u32) -> Result<InstanceSettings, SettingsError> {
        Ok(self
            .read_map(&self.instance_path(id))?
            .map(InstanceSettings::from_map)
            .unwrap_or_default())
    }

    /// Overwrite one instance's settings blob.
    pub fn save(&self, id: u32, settings: &InstanceSettings) -> Result<(), SettingsError> {
        self.write_map(&self.instance_path(id), &settings.to_map())
    }

    /// Overwrite one instance's settings blob off the calling thread.
    ///
    /// The write has completed (or failed) by the time the future resolves,
    /// so an awaiting caller can immediately read its own write.
    pub async fn save_async(
        &self,
        id: u32,
        settings: &InstanceSettings,
    ) -> Result<(), SettingsError> {
        let store = self.clone();
        let settings = settings.clone();
        tokio::task::spawn_blocking(move || store.save(id, &settings))
            .await
            .map_err(|_| SettingsError::Aborted)?
    }

    /// Delete one instance's settings blob; missing blob is a no-op.
    pub fn remove(&self, id: u32) -> Result<(), SettingsError> {
        let path = self.instance_path(id);
        if !path.exists() {
            return Ok(());
        }
        fs::remove_file(&path).map_err(|source| SettingsError::Write { path, source })
    }

    /// Load the global settings; a missing or empty blob yields defaults.
    pub fn load_global(&self) -> Result<GlobalSettings, SettingsError> {
        Ok(self
            .read_map(&self.global_path())?
            .map(GlobalSettings::from_map)
            .unwrap_or_default())
    }

    /// Overwrite the global settings blob.
    pub fn save_global(&self, settings: &GlobalSettings) -> Result<(), SettingsError> {
        self.write_map(&self.global_path(), &settings.to_map())
    }

    fn read_map(&self, path: &Path) -> Result<Option<BTreeMap<String, String>>, SettingsError> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.is_empty() {
            return Ok(None);
        }
        let map = serde_json::from_slice(&bytes).map_err(|source| SettingsError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(map))
    }

    fn write_map(
        &self,
        path: &Path,
        map: &BTreeMap<String, String>,
    ) -> Result<(), SettingsError> {
        let write = |path: &Path| -> io::Result<()> {
            fs::create_dir_all(&self.library_dir)?;
            let bytes = serde_json::to_vec_pretty(map)
                .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
            let mut tmp = tempfile::NamedTempFile::new_in(&self.library_dir)?;
            io::Write::write_all(&mut tmp, &bytes)?;
            tmp.persist(path).map_err(|err| err.error)?;
            Ok(())
        };
        write(path).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("settings blob written to {:?}", path);
        Ok(())
    }
}
