//! First-time load of the settings tree

use tracing::{debug, info};

use confstore_utils::Result;

use crate::storage::DocumentStorage;
use crate::value::{shallow_merge, ConfigTree};

/// Load the settings tree, creating the document from `defaults` if absent.
///
/// The stored document is merged over `defaults` one level deep: a stored
/// top-level key replaces the entire default value under that key.
pub fn load_or_create(storage: &dyn DocumentStorage, defaults: &ConfigTree) -> Result<ConfigTree> {
    let path = storage.location();

    let stored = match storage.read()? {
        Some(tree) => tree,
        None => {
            storage.create(defaults)?;
            info!(path = %path.display(), "Created settings document from defaults");
            storage.read()?.unwrap_or_default()
        }
    };

    debug!(
        path = %path.display(),
        stored_keys = stored.len(),
        default_keys = defaults.len(),
        "Merging stored settings over defaults"
    );

    let mut tree = defaults.clone();
    shallow_merge(&mut tree, stored);
    Ok(tree)
}
