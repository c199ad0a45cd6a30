//! The settings store
//!
//! [`ConfigStore`] owns the in-memory settings tree, the dirty flag and the
//! flush timer marker. All three live behind one lock so that a write, the
//! decision to arm a timer, and a flush never interleave.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info, trace, warn};

use confstore_utils::Result;

use crate::defaults::{config_path_in, default_config_path, default_tree, DEFAULT_DATA_PATH};
use crate::flush::{
    flush_timer_task, ArmedTimer, FlushEvent, FlushRuntime, FlushState, DEFAULT_FLUSH_DELAY,
};
use crate::loader::load_or_create;
use crate::storage::{DocumentStorage, JsonFileStorage};
use crate::value::{assign, lookup, ConfigTree, ConfigValue};

/// Capacity of the flush event channel
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Options used to open a [`ConfigStore`]
#[derive(Clone)]
pub struct StoreOptions {
    /// Settings file (ignored when `storage` is set); defaults to
    /// `config.json` next to the executable
    pub path: PathBuf,
    /// Default table the stored document is merged over
    pub defaults: ConfigTree,
    /// Delay between the first unflushed write and the flush
    pub flush_delay: Duration,
    /// Custom backing storage
    pub storage: Option<Arc<dyn DocumentStorage>>,
    /// Existing tokio runtime for timer tasks; a dedicated one is started otherwise
    pub runtime: Option<Handle>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            path: default_config_path(),
            defaults: default_tree(),
            flush_delay: DEFAULT_FLUSH_DELAY,
            storage: None,
            runtime: None,
        }
    }
}

impl StoreOptions {
    /// Options for a settings file at `path`, other fields defaulted
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Options for `config.json` inside `base`, other fields defaulted
    pub fn in_dir(base: impl AsRef<Path>) -> Self {
        Self::new(config_path_in(base))
    }

    pub fn with_defaults(mut self, defaults: ConfigTree) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_flush_delay(mut self, delay: Duration) -> Self {
        self.flush_delay = delay;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn DocumentStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("path", &self.path)
            .field("default_keys", &self.defaults.len())
            .field("flush_delay", &self.flush_delay)
            .field("storage", &self.storage.as_ref().map(|s| s.location().to_path_buf()))
            .field("runtime", &self.runtime.is_some())
            .finish()
    }
}

/// Mutable state guarded as one unit
pub(crate) struct StoreState {
    tree: ConfigTree,
    dirty: bool,
    timer: Option<ArmedTimer>,
    next_timer_id: u64,
}

/// State shared between the store and its timer tasks
pub(crate) struct Shared {
    state: RwLock<StoreState>,
    storage: Arc<dyn DocumentStorage>,
    events: broadcast::Sender<FlushEvent>,
}

impl Shared {
    /// Write the tree if dirty. Returns the bytes written, if any.
    fn flush_locked(&self, state: &mut StoreState) -> Result<Option<usize>> {
        if !state.dirty {
            return Ok(None);
        }

        match self.storage.write(&state.tree) {
            Ok(bytes) => {
                state.dirty = false;
                info!(
                    path = %self.storage.location().display(),
                    bytes,
                    "Settings flushed"
                );
                let _ = self.events.send(FlushEvent::Flushed { bytes });
                Ok(Some(bytes))
            }
            Err(e) => {
                let _ = self.events.send(FlushEvent::Failed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Called from the timer task once the delay has elapsed
    pub(crate) fn fire_timer(&self, timer_id: u64) {
        let mut state = self.state.write();

        if state.timer.as_ref().map(|t| t.id) != Some(timer_id) {
            debug!(timer_id, "Stale flush timer ignored");
            return;
        }

        if let Err(e) = self.flush_locked(&mut state) {
            error!(
                path = %self.storage.location().display(),
                error = %e,
                "Debounced settings flush failed"
            );
        }
        state.timer = None;
    }
}

/// Process-wide settings store
///
/// Reads resolve dotted paths against the in-memory tree. Writes update the
/// tree immediately and schedule a single debounced flush of the whole
/// document; [`ConfigStore::close`] flushes any pending state synchronously.
pub struct ConfigStore {
    shared: Arc<Shared>,
    flush_delay: Duration,
    runtime: Option<FlushRuntime>,
}

impl ConfigStore {
    /// Open a store: create the document if absent, then load and merge it
    pub fn open(options: StoreOptions) -> Result<Self> {
        let StoreOptions {
            path,
            defaults,
            flush_delay,
            storage,
            runtime,
        } = options;

        let storage: Arc<dyn DocumentStorage> = match storage {
            Some(storage) => storage,
            None => Arc::new(JsonFileStorage::new(path)),
        };

        let tree = load_or_create(storage.as_ref(), &defaults)?;

        let runtime = match runtime {
            Some(handle) => FlushRuntime::Shared(handle),
            None => FlushRuntime::owned()?,
        };

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        info!(
            path = %storage.location().display(),
            keys = tree.len(),
            flush_delay_ms = flush_delay.as_millis() as u64,
            "Settings store opened"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                state: RwLock::new(StoreState {
                    tree,
                    dirty: false,
                    timer: None,
                    next_timer_id: 0,
                }),
                storage,
                events,
            }),
            flush_delay,
            runtime: Some(runtime),
        })
    }

    // === Reads ===

    /// Resolve a dotted path, returning `default` if it cannot be resolved
    pub fn get(&self, path: &str, default: impl Into<ConfigValue>) -> ConfigValue {
        self.get_opt(path).unwrap_or_else(|| default.into())
    }

    /// Resolve a dotted path
    pub fn get_opt(&self, path: &str) -> Option<ConfigValue> {
        lookup(&self.shared.state.read().tree, path).cloned()
    }

    /// Whether a dotted path resolves to a value
    pub fn contains(&self, path: &str) -> bool {
        lookup(&self.shared.state.read().tree, path).is_some()
    }

    /// Top-level keys, in document order
    pub fn keys(&self) -> Vec<String> {
        self.shared.state.read().tree.keys().cloned().collect()
    }

    /// Number of top-level keys
    pub fn len(&self) -> usize {
        self.shared.state.read().tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.state.read().tree.is_empty()
    }

    /// Copy of the whole tree
    pub fn snapshot(&self) -> ConfigTree {
        self.shared.state.read().tree.clone()
    }

    /// The `data_path` setting, or `./data` if unset or not a string
    pub fn data_path(&self) -> String {
        match self.get_opt("data_path") {
            Some(Value::String(path)) => path,
            _ => DEFAULT_DATA_PATH.to_string(),
        }
    }

    // === Writes ===

    /// Assign a value at a dotted path and schedule a flush
    ///
    /// Intermediate nodes that are missing or not objects are replaced by
    /// objects. `save` never performs I/O itself, but it may wait for the
    /// lock while a timer-driven flush is writing the document.
    pub fn save(&self, path: &str, value: impl Into<ConfigValue>) {
        let mut state = self.shared.state.write();
        assign(&mut state.tree, path, value.into());
        state.dirty = true;

        if state.timer.is_some() {
            trace!(path, "Settings write coalesced into pending flush");
        } else {
            self.arm_timer(&mut state);
        }
    }

    fn arm_timer(&self, state: &mut StoreState) {
        let timer_id = state.next_timer_id;
        state.next_timer_id += 1;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        state.timer = Some(ArmedTimer {
            id: timer_id,
            cancel: cancel_tx,
        });

        if let Some(runtime) = &self.runtime {
            runtime.handle().spawn(flush_timer_task(
                Arc::clone(&self.shared),
                timer_id,
                self.flush_delay,
                cancel_rx,
            ));
        }

        debug!(
            timer_id,
            delay_ms = self.flush_delay.as_millis() as u64,
            "Flush timer armed"
        );
    }

    // === Persistence ===

    /// Write the tree now if it has unflushed changes
    ///
    /// Returns `true` if a write happened. Does not touch a pending timer;
    /// it will find nothing to do when it fires.
    pub fn flush(&self) -> Result<bool> {
        let mut state = self.shared.state.write();
        Ok(self.shared.flush_locked(&mut state)?.is_some())
    }

    /// Cancel any pending timer and flush synchronously
    ///
    /// Call once at shutdown. On error the tree stays dirty.
    pub fn close(&self) -> Result<()> {
        let mut state = self.shared.state.write();

        if let Some(timer) = state.timer.take() {
            debug!(timer_id = timer.id, "Cancelling flush timer on close");
            timer.cancel();
        }

        self.shared.flush_locked(&mut state)?;
        info!(path = %self.shared.storage.location().display(), "Settings store closed");
        Ok(())
    }

    // === Introspection ===

    /// Whether the tree has changes not yet written
    pub fn is_dirty(&self) -> bool {
        self.shared.state.read().dirty
    }

    pub fn flush_state(&self) -> FlushState {
        if self.shared.state.read().timer.is_some() {
            FlushState::Armed
        } else {
            FlushState::Idle
        }
    }

    pub fn flush_delay(&self) -> Duration {
        self.flush_delay
    }

    /// Location of the settings document
    pub fn path(&self) -> &Path {
        self.shared.storage.location()
    }

    /// Receive an event for every flush attempt
    pub fn subscribe(&self) -> broadcast::Receiver<FlushEvent> {
        self.shared.events.subscribe()
    }
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("path", &self.path())
            .field("flush_delay", &self.flush_delay)
            .field("dirty", &self.is_dirty())
            .field("flush_state", &self.flush_state())
            .finish()
    }
}

impl Drop for ConfigStore {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.write();
            if let Some(timer) = state.timer.take() {
                timer.cancel();
            }
            if state.dirty {
                warn!(
                    path = %self.shared.storage.location().display(),
                    "Settings store dropped without close, flushing"
                );
                if let Err(e) = self.shared.flush_locked(&mut state) {
                    error!(error = %e, "Final settings flush failed");
                }
            }
        }

        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown();
        }
    }
}
