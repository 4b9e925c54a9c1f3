//! Persistence module - Settings blob storage

mod store;

pub use store::{SettingsError, SettingsStore};
