//! In-memory reading history and settings persistence

mod history;
mod settings_store;

pub use history::{HISTORY_CAPACITY, ReadingHistory};
pub use settings_store::{SettingsBackend, SettingsError, SettingsStore};
