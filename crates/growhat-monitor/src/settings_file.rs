//! Flat-file settings storage

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::error;

use growhat_core::storage::{SettingsBackend, SettingsError};

/// Settings path used when none is given on the command line
pub const DEFAULT_SETTINGS_PATH: &str = "settings.bin";

/// Stores the settings record in a single file.
///
/// Writes go to a sibling temporary file first and are renamed into place, so
/// a crash mid-write leaves the previous settings intact.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsBackend for FileBackend {
    fn read(&mut self) -> Result<Option<Vec<u8>>, SettingsError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                error!("Failed to read {}: {}", self.path.display(), e);
                Err(SettingsError::backend(&e.to_string()))
            }
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), SettingsError> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                error!("Failed to write {}: {}", self.path.display(), e);
                SettingsError::backend(&e.to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use growhat_core::config::Settings;
    use growhat_core::storage::SettingsStore;

    fn scratch_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "growhat-{}-{}.bin",
            name,
            std::process::id()
        ));
        fs::remove_file(&path).ok();
        path
    }

    #[test]
    fn test_missing_file_loads_nothing() {
        let mut backend = FileBackend::new(scratch_path("missing"));
        assert_eq!(backend.read(), Ok(None));
    }

    #[test]
    fn test_store_survives_restart() {
        let path = scratch_path("restart");
        let mut settings = Settings::default();
        settings.channels[2].enabled = true;
        settings.channels[2].dry_point = 24.5;

        let mut store = SettingsStore::new(FileBackend::new(&path));
        assert_eq!(store.save_if_changed(&settings), Ok(true));
        assert_eq!(store.save_if_changed(&settings), Ok(false));

        let mut reopened = SettingsStore::new(FileBackend::new(&path));
        assert_eq!(reopened.load(), Ok(Some(settings)));

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_garbage_file_is_a_decode_error() {
        let path = scratch_path("garbage");
        fs::write(&path, [0xffu8; 4]).unwrap();

        let mut store = SettingsStore::new(FileBackend::new(&path));
        assert!(matches!(store.load(), Err(SettingsError::Decode(_))));

        fs::remove_file(&path).ok();
    }
}
