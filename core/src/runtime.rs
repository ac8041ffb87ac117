//! Shared background runtime for callback-style calls.
//!
//! Unless a client pins a handle, every call runs here rather than on the
//! caller's runtime, so a caller's runtime shutting down cannot strand a
//! pending callback.

use std::sync::{mpsc, Mutex};
use std::thread;

use tokio::runtime::{Builder, Handle};
use tracing::debug;

use crate::error::TransportError;

static SHARED: Mutex<Option<Handle>> = Mutex::new(None);

/// Handle to the shared runtime, starting it on first use.
///
/// One thread owns a multi-thread runtime and parks it forever, handing its
/// `Handle` back to the initializer. Startup failures are returned, not
/// raised, and a later call retries.
pub(crate) fn shared() -> Result<Handle, TransportError> {
    let mut slot = SHARED
        .lock()
        .map_err(|_| TransportError::new("shared fetch runtime lock poisoned"))?;
    if let Some(handle) = slot.as_ref() {
        return Ok(handle.clone());
    }

    let (tx, rx) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name("fetch-rt".to_string())
        .spawn(move || {
            let rt = match Builder::new_multi_thread()
                .enable_all()
                .thread_name("fetch-rt-worker")
                .build()
            {
                Ok(rt) => rt,
                Err(err) => {
                    let _ = tx.send(Err(err));
                    return;
                }
            };
            debug!("shared fetch runtime started");
            let _ = tx.send(Ok(rt.handle().clone()));
            rt.block_on(std::future::pending::<()>());
        })
        .map_err(TransportError::new)?;

    let handle = rx
        .recv()
        .map_err(|_| TransportError::new("fetch runtime thread exited before start"))?
        .map_err(TransportError::new)?;
    *slot = Some(handle.clone());
    Ok(handle)
}
