//! Centralized TOML-based settings for roomforge.
//!
//! Settings are loaded from `~/.roomforge/settings.toml` with environment
//! variable interpolation for path values.
//!
//! # Usage
//!
//! ```rust,ignore
//! use roomforge_lib::settings::SettingsManager;
//!
//! let manager = SettingsManager::new().await?;
//! let settings = manager.get().await;
//! println!("{}", settings.storage.data_dir.display());
//! ```

pub mod loader;
pub mod schema;

pub use loader::{get_with_env_fallback, SettingsManager};
pub use schema::{
    AnchorSettings, LoggingSettings, MergeSettings, ProcessingSettings, RoomforgeSettings,
    StorageSettings,
};
