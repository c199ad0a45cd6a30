//! Shared helpers for confstore integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use confstore::{ConfigStore, ConfigTree, MemoryStorage, StoreOptions};
use serde_json::Value;

/// Debounce delay used by the timing tests
pub const DELAY: Duration = Duration::from_millis(100);

pub fn tree(value: Value) -> ConfigTree {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

/// Open a store over in-memory storage with the test delay
pub fn memory_store(defaults: Value) -> (ConfigStore, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let options = StoreOptions::new("memory.json")
        .with_defaults(tree(defaults))
        .with_flush_delay(DELAY)
        .with_storage(storage.clone());
    (ConfigStore::open(options).unwrap(), storage)
}

/// Poll until `condition` holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
