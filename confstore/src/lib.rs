//! confstore: process-wide persistent settings
//!
//! A single [`ConfigStore`] holds the settings tree for the whole process.
//! Values are addressed by dotted paths (`window.width`); writes are kept
//! in memory and flushed to a JSON document after a short quiet period, and
//! [`ConfigStore::close`] flushes whatever is still pending at shutdown.
//!
//! ```no_run
//! use confstore::ConfigStore;
//!
//! # fn main() -> confstore::Result<()> {
//! let store = ConfigStore::instance()?;
//! let width = store.get("window.width", 1037);
//! store.save("window.width", 1280);
//! store.close()?;
//! # let _ = width;
//! # Ok(())
//! # }
//! ```

pub mod defaults;
pub mod flush;
mod global;
pub mod loader;
pub mod storage;
pub mod store;
pub mod value;

pub use confstore_utils::{Result, StoreError};
pub use defaults::{
    default_config_path, default_tree, install_dir, CONFIG_FILE_NAME, DEFAULT_DATA_PATH,
};
pub use flush::{FlushEvent, FlushState, DEFAULT_FLUSH_DELAY};
pub use storage::{DocumentStorage, JsonFileStorage, MemoryStorage};
pub use store::{ConfigStore, StoreOptions};
pub use value::{ConfigTree, ConfigValue};
