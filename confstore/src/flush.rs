//! Debounced write-back
//!
//! A write moves the flusher from [`FlushState::Idle`] to
//! [`FlushState::Armed`] and spawns one delayed timer task. Further writes
//! while armed are coalesced into that same timer. When the timer fires it
//! writes the current tree if it is still dirty and returns to idle.
//! Closing the store cancels the timer and flushes synchronously.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::oneshot;
use tracing::{debug, error};

use confstore_utils::{Result, StoreError};

use crate::store::Shared;

/// Default delay between the first unflushed write and the flush
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_secs(5);

/// Name of the worker thread of a store-owned flush runtime
pub const FLUSH_THREAD_NAME: &str = "confstore-flush";

/// Whether a flush is scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushState {
    /// No timer outstanding
    Idle,
    /// A timer is outstanding and will flush when it fires
    Armed,
}

/// Outcome of a flush, broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FlushEvent {
    /// The whole document was written
    Flushed { bytes: usize },
    /// Writing the document failed; the tree stays dirty
    Failed { message: String },
}

/// Marker for the single outstanding timer
///
/// Dropping it (or sending on `cancel`) stops the timer task.
#[derive(Debug)]
pub(crate) struct ArmedTimer {
    /// Distinguishes this timer from earlier, already cancelled ones
    pub id: u64,
    pub cancel: oneshot::Sender<()>,
}

impl ArmedTimer {
    pub fn cancel(self) {
        // Receiver is gone if the timer already fired
        let _ = self.cancel.send(());
    }
}

/// Runtime the timer tasks are spawned on
#[derive(Debug)]
pub(crate) enum FlushRuntime {
    /// Dedicated one-worker runtime owned by the store
    Owned(Runtime),
    /// A runtime owned by the embedding application
    Shared(Handle),
}

impl FlushRuntime {
    /// Build a dedicated runtime for timer tasks
    pub fn owned() -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(1)
            .thread_name(FLUSH_THREAD_NAME)
            .enable_time()
            .build()
            .map_err(|e| StoreError::runtime(format!("Failed to start flush runtime: {}", e)))?;
        Ok(Self::Owned(runtime))
    }

    pub fn handle(&self) -> &Handle {
        match self {
            Self::Owned(runtime) => runtime.handle(),
            Self::Shared(handle) => handle,
        }
    }

    /// Stop an owned runtime without blocking the caller
    pub fn shutdown(self) {
        if let Self::Owned(runtime) = self {
            runtime.shutdown_background();
        }
    }
}

/// Timer task: wait for the delay, then flush unless cancelled first
pub(crate) async fn flush_timer_task(
    shared: Arc<Shared>,
    timer_id: u64,
    delay: Duration,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = &mut cancel_rx => {
            debug!(timer_id, "Flush timer cancelled");
            return;
        }
    }

    // Storage I/O is blocking
    let result = tokio::task::spawn_blocking(move || shared.fire_timer(timer_id)).await;
    if let Err(e) = result {
        error!(timer_id, error = %e, "Flush timer task failed");
    }
}
