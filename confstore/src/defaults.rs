//! Default settings
//!
//! Built into the binary and written out as the initial document when no
//! settings file exists yet. Callers may inject their own table through
//! [`StoreOptions::defaults`](crate::StoreOptions::defaults).
//!
//! The settings document lives next to the executable unless the caller
//! chooses another base directory.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tracing::warn;

use crate::value::ConfigTree;

/// Fallback returned by [`ConfigStore::data_path`](crate::ConfigStore::data_path)
pub const DEFAULT_DATA_PATH: &str = "./data";

/// File name of the persisted settings document
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Directory holding the running executable
///
/// Falls back to the working directory if the executable path is unknown.
pub fn install_dir() -> PathBuf {
    match std::env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
        Err(e) => {
            warn!(error = %e, "Cannot resolve executable path, using working directory");
            PathBuf::from(".")
        }
    }
}

/// Settings document inside `base`
pub fn config_path_in(base: impl AsRef<Path>) -> PathBuf {
    base.as_ref().join(CONFIG_FILE_NAME)
}

/// Default settings document: `config.json` next to the executable
pub fn default_config_path() -> PathBuf {
    config_path_in(install_dir())
}

/// Build the default settings table
pub fn default_tree() -> ConfigTree {
    let table = json!({
        "language": "zh-CN",
        "save_dir": "./data",
        "theme": "light",
        "export_format": "png",
        "window": {
            "width": 1037,
            "height": 800,
            "x": 249,
            "y": 23,
            "fullscreen": false,
            "on_top": false
        },
        "tinify": {
            "tinify_key": "",
            "preserve": [],
            "compression_count": 0
        },
        "edge_optimization": {
            "r": 90,
            "is_edge_optimization": true
        },
        "api_server": {
            "is_enable": false,
            "port": 11111
        }
    });

    match table {
        Value::Object(map) => map,
        _ => ConfigTree::new(),
    }
}
