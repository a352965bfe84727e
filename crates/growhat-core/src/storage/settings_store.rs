use alloc::vec::Vec;

use log::{debug, error, info};
use thiserror_no_std::Error;

use crate::config::Settings;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Failed to encode settings: {0}")]
    Encode(heapless::String<64>),
    #[error("Settings file is malformed: {0}")]
    Decode(heapless::String<64>),
    #[error("Settings storage error: {0}")]
    Backend(heapless::String<64>),
}

impl SettingsError {
    /// Backend error with a static message
    pub fn backend(message: &str) -> Self {
        Self::Backend(truncated(message))
    }
}

fn truncated(message: &str) -> heapless::String<64> {
    let mut out = heapless::String::new();
    for ch in message.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

fn describe(e: postcard::Error) -> heapless::String<64> {
    let mut out = heapless::String::new();
    core::fmt::write(&mut out, format_args!("{}", e)).ok();
    out
}

/// Raw byte storage for the settings record, e.g. a flat file
pub trait SettingsBackend {
    /// Stored bytes, or `None` if nothing has been saved yet.
    fn read(&mut self) -> Result<Option<Vec<u8>>, SettingsError>;

    /// Replace the stored bytes.
    fn write(&mut self, bytes: &[u8]) -> Result<(), SettingsError>;
}

/// Loads and saves [`Settings`] as postcard bytes.
///
/// Saving is debounced: the encoded record is compared with the last one
/// written (or loaded) and only changed content reaches the backend. That
/// makes it cheap to call [`save_if_changed`](Self::save_if_changed) on every
/// tick.
pub struct SettingsStore<B: SettingsBackend> {
    backend: B,
    last_saved: Option<Vec<u8>>,
}

impl<B: SettingsBackend> SettingsStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            last_saved: None,
        }
    }

    /// Load the stored settings. `Ok(None)` means nothing has been saved yet.
    pub fn load(&mut self) -> Result<Option<Settings>, SettingsError> {
        let Some(bytes) = self.backend.read()? else {
            info!("No stored settings, using defaults");
            return Ok(None);
        };

        let settings: Settings = postcard::from_bytes(&bytes).map_err(|e| {
            error!("Failed to decode settings: {:?}", e);
            SettingsError::Decode(describe(e))
        })?;

        self.last_saved = Some(bytes);
        Ok(Some(settings))
    }

    /// Write `settings` if they differ from what was last stored. Returns
    /// whether a write happened.
    pub fn save_if_changed(&mut self, settings: &Settings) -> Result<bool, SettingsError> {
        let bytes = postcard::to_allocvec(settings).map_err(|e| SettingsError::Encode(describe(e)))?;

        if self.last_saved.as_deref() == Some(bytes.as_slice()) {
            return Ok(false);
        }

        self.backend.write(&bytes)?;
        debug!("Saved settings ({} bytes)", bytes.len());
        self.last_saved = Some(bytes);
        Ok(true)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelField, Editable};

    #[derive(Default)]
    struct MemoryBackend {
        bytes: Option<Vec<u8>>,
        writes: usize,
        fail_writes: bool,
    }

    impl SettingsBackend for MemoryBackend {
        fn read(&mut self) -> Result<Option<Vec<u8>>, SettingsError> {
            Ok(self.bytes.clone())
        }

        fn write(&mut self, bytes: &[u8]) -> Result<(), SettingsError> {
            if self.fail_writes {
                return Err(SettingsError::backend("disk full"));
            }
            self.bytes = Some(bytes.to_vec());
            self.writes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_empty_backend_loads_none() {
        let mut store = SettingsStore::new(MemoryBackend::default());
        assert_eq!(store.load(), Ok(None));
    }

    #[test]
    fn test_unchanged_settings_are_not_rewritten() {
        let mut store = SettingsStore::new(MemoryBackend::default());
        let mut settings = Settings::default();

        assert_eq!(store.save_if_changed(&settings), Ok(true));
        assert_eq!(store.save_if_changed(&settings), Ok(false));
        assert_eq!(store.backend().writes, 1);

        settings.channels[1].warn_level = 0.35;
        assert_eq!(store.save_if_changed(&settings), Ok(true));
        assert_eq!(store.backend().writes, 2);
    }

    #[test]
    fn test_load_returns_saved_settings() {
        let mut settings = Settings::default();
        settings.channels[0].set(ChannelField::AutoWater, true.into());
        settings.general.alarm_interval = 30;

        let mut writer = SettingsStore::new(MemoryBackend::default());
        writer.save_if_changed(&settings).unwrap();

        let backend = MemoryBackend {
            bytes: writer.backend().bytes.clone(),
            ..Default::default()
        };
        let mut reader = SettingsStore::new(backend);
        assert_eq!(reader.load(), Ok(Some(settings.clone())));

        // Loaded content counts as saved
        assert_eq!(reader.save_if_changed(&settings), Ok(false));
    }

    #[test]
    fn test_malformed_bytes_fail_to_decode() {
        let backend = MemoryBackend {
            bytes: Some(alloc::vec![0xff, 0xff, 0xff]),
            ..Default::default()
        };
        let mut store = SettingsStore::new(backend);
        assert!(matches!(store.load(), Err(SettingsError::Decode(_))));
    }

    #[test]
    fn test_failed_write_is_retried() {
        let backend = MemoryBackend {
            fail_writes: true,
            ..Default::default()
        };
        let mut store = SettingsStore::new(backend);
        let settings = Settings::default();

        assert!(matches!(
            store.save_if_changed(&settings),
            Err(SettingsError::Backend(_))
        ));
        store.backend.fail_writes = false;
        assert_eq!(store.save_if_changed(&settings), Ok(true));
    }
}
