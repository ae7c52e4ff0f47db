//! Pawmeet Store - local persistent state for the conversation engine
//!
//! Everything here lives on the device and is never synced to the backend.
//! Today that is a single table:
//!
//! - `unread_watermarks`: per-conversation "read up to" timestamp (epoch millis)
//!
//! The schema is managed by Sea-ORM migrations, run automatically when a
//! store is opened from a path.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use pawmeet_store::{StoreConfig, WatermarkStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = WatermarkStore::with_config(StoreConfig::default()).await?;
//!
//! store.advance("conv-1", 1_700_000_000_000).await?;
//! assert_eq!(store.get("conv-1").await?, Some(1_700_000_000_000));
//! # Ok(())
//! # }
//! ```

pub mod entities;
pub mod migration;
pub mod watermark_store;

pub use watermark_store::WatermarkStore;

/// Configuration for the local store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    pub db_path: std::path::PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::path::PathBuf::from("pawmeet.db"),
        }
    }
}
