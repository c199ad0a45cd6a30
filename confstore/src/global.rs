//! Process-wide store instance
//!
//! The first call to [`ConfigStore::instance`] or [`ConfigStore::install`]
//! opens the store; concurrent first callers block until that single
//! initialization finishes and then share the same instance. Hand the
//! returned reference to the components that need settings.

use once_cell::sync::OnceCell;
use tracing::{debug, info};

use confstore_utils::Result;

use crate::store::{ConfigStore, StoreOptions};

static GLOBAL: OnceCell<ConfigStore> = OnceCell::new();

impl ConfigStore {
    /// The process-wide store, opened with default options on first use
    pub fn instance() -> Result<&'static ConfigStore> {
        Self::install(StoreOptions::default())
    }

    /// The process-wide store, opened with `options` on first use
    ///
    /// If the store is already open, `options` are ignored and the existing
    /// instance is returned. A failed open leaves the store uninitialized.
    pub fn install(options: StoreOptions) -> Result<&'static ConfigStore> {
        if let Some(store) = GLOBAL.get() {
            debug!("Settings store already initialized");
            return Ok(store);
        }

        GLOBAL.get_or_try_init(|| {
            info!(path = %options.path.display(), "Initializing process-wide settings store");
            ConfigStore::open(options)
        })
    }

    /// The process-wide store if it has been opened
    pub fn try_instance() -> Option<&'static ConfigStore> {
        GLOBAL.get()
    }
}
