//! Background worker thread for the connection loop
//!
//! Spawns a thread with its own single-threaded tokio runtime to drive the
//! async [`ConnectionManager`] while the public API stays synchronous.

use std::thread::{self, JoinHandle};

use tokio::sync::watch;

use crate::connection::ConnectionManager;
use crate::error::{Result, StreamError};

const WORKER_THREAD_NAME: &str = "balance-stream";

/// Spawn the worker that runs `manager` until `shutdown` fires
///
/// The runtime is built on the calling thread so that a runtime failure is
/// reported to the caller instead of only being logged.
pub(crate) fn spawn_stream_worker(
    manager: ConnectionManager,
    shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<()>> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| StreamError::WorkerStart(format!("failed to build runtime: {}", e)))?;

    thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || {
            rt.block_on(manager.run(shutdown));
            tracing::debug!("Stream worker exiting");
        })
        .map_err(|e| StreamError::WorkerStart(format!("failed to spawn thread: {}", e)))
}
