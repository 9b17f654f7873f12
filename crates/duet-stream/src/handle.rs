//! Control handle shared between the manager and the run it supervises.

use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tokio::sync::{Notify, watch};
use tokio_util::sync::CancellationToken;

use crate::state::StreamState;

/// Controls for the current (or last) run.
pub(crate) struct RunSlot {
    /// Fires when the run is asked to stop
    pub(crate) cancel: CancellationToken,
    /// Holds the run's final state once it has gone idle
    pub(crate) finished: watch::Receiver<Option<StreamState>>,
}

impl RunSlot {
    /// A fresh slot plus the sender its run reports completion on
    pub(crate) fn new() -> (Self, watch::Sender<Option<StreamState>>) {
        let (tx, rx) = watch::channel(None);
        let slot = Self {
            cancel: CancellationToken::new(),
            finished: rx,
        };
        (slot, tx)
    }
}

/// The current run's slot plus the idle notification.
///
/// The slot mutex doubles as the lifecycle lock: every idle/running
/// transition happens while it is held. All fields are `Arc`-wrapped, so
/// cloning is cheap.
#[derive(Clone)]
pub(crate) struct RunHandle {
    slot: Arc<Mutex<RunSlot>>,
    idle_notify: Arc<Notify>,
}

impl RunHandle {
    pub(crate) fn new() -> Self {
        let (slot, _) = RunSlot::new();
        Self {
            slot: Arc::new(Mutex::new(slot)),
            idle_notify: Arc::new(Notify::new()),
        }
    }

    /// Take the lifecycle lock.
    pub(crate) fn lock(&self) -> MutexGuard<'_, RunSlot> {
        self.slot.lock()
    }

    /// Wake everything waiting in [`RunHandle::idle`].
    pub(crate) fn notify_idle(&self) {
        self.idle_notify.notify_waiters();
    }

    /// A future that resolves at the next `notify_idle`.
    ///
    /// Registration happens on creation, so create it before checking
    /// whether a run is active. A wake-up only means some run ended;
    /// recheck the state after it resolves.
    pub(crate) fn idle(&self) -> tokio::sync::futures::Notified<'_> {
        self.idle_notify.notified()
    }
}
