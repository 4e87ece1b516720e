//! Single-thread dispatch workers.
//!
//! Each controller owns a callback worker, the only thread that ever runs
//! the analyzer, which serializes invocations by construction. The
//! keep-latest controller additionally owns a drain worker that re-checks
//! the cache slot after every dispatch.
//!
//! Workers hold a `Weak` reference back to the controller internals, so the
//! reference cycle controller -> sender -> worker -> controller never forms:
//! dropping the controller drops the senders, the channel disconnects, and
//! the threads wind down on their own. A `send` on a disconnected channel
//! returns the task to the caller, which is the submission-failure signal
//! both controllers recover from inline.

use anyhow::{anyhow, Result};
use crossbeam_channel::{Receiver, SendError, Sender};
use std::sync::{Arc, Weak};
use std::thread;

use crate::frame::Frame;

/// One frame handed to a callback worker for analysis.
pub(crate) struct Dispatch {
    pub(crate) frame: Frame,
}

/// Signal for the drain worker to re-check the cache slot.
pub(crate) struct DrainCache;

/// Spawn a named worker that runs `handler` for each task until every
/// sender is gone or the controller internals have been dropped.
pub(crate) fn spawn_worker<S, T, F>(
    name: &str,
    shared: &Arc<S>,
    rx: Receiver<T>,
    handler: F,
) -> Result<()>
where
    S: Send + Sync + 'static,
    T: Send + 'static,
    F: Fn(&S, T) + Send + 'static,
{
    let weak: Weak<S> = Arc::downgrade(shared);
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            for task in rx.iter() {
                let Some(shared) = weak.upgrade() else { break };
                handler(shared.as_ref(), task);
            }
        })
        .map_err(|e| anyhow!("failed to spawn {} worker: {}", name, e))?;
    Ok(())
}

/// Post a task, getting it back if the worker is gone.
pub(crate) fn post<T>(tx: &Sender<T>, task: T) -> std::result::Result<(), T> {
    tx.send(task).map_err(|SendError(task)| task)
}
