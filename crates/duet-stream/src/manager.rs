//! Stream lifecycle manager

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    handle::{RunHandle, RunSlot},
    registry::{SubscriberId, SubscriberRegistry, Subscription},
    run::{self, RunContext},
    settings::{self, SettingsUpdate, StreamSettings},
    source::{BoxedSink, BoxedSource},
    state::{StateCell, StreamState},
};

/// Owns the stream state and runs at most one stream at a time.
///
/// Construct once and share behind an `Arc`. `start` must be called from
/// within a Tokio runtime.
pub struct StreamManager {
    settings: RwLock<Arc<StreamSettings>>,
    source: BoxedSource,
    sink: BoxedSink,
    state: Arc<StateCell>,
    registry: Arc<SubscriberRegistry>,
    handle: RunHandle,
}

impl StreamManager {
    /// Create an idle manager
    pub fn new(settings: StreamSettings, source: BoxedSource, sink: BoxedSink) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            state: Arc::new(StateCell::new(
                settings.default_max_turns,
                settings.error_history,
            )),
            registry: Arc::new(SubscriberRegistry::new(settings.subscriber_buffer)),
            settings: RwLock::new(Arc::new(settings)),
            source,
            sink,
            handle: RunHandle::new(),
        })
    }

    /// Start a run of `max_turns` turns in the background.
    ///
    /// Returns the initial state right away; fails with
    /// [`Error::AlreadyRunning`] while another run is active.
    pub fn start(&self, max_turns: u32) -> Result<StreamState> {
        settings::check_max_turns(max_turns)?;
        let settings = self.settings.read().clone();
        let run_id = Uuid::new_v4();

        let (initial, cancel, finished) = {
            let mut slot = self.handle.lock();
            let topic = settings.topics.first().cloned().unwrap_or_default();
            let initial = self
                .state
                .begin(run_id, max_turns, topic, settings.error_history)
                .inspect_err(|_| {
                    tracing::warn!("Attempted to start stream while already running");
                })?;
            let (next, finished) = RunSlot::new();
            *slot = next;
            (initial, slot.cancel.clone(), finished)
        };

        let ctx = RunContext {
            run_id,
            max_turns,
            settings,
            source: Arc::clone(&self.source),
            sink: Arc::clone(&self.sink),
            state: Arc::clone(&self.state),
            registry: Arc::clone(&self.registry),
            cancel,
        };
        tokio::spawn(run::supervise(ctx, self.handle.clone(), finished));

        tracing::info!("Stream started with max_turns={}", max_turns);
        Ok(initial)
    }

    /// Start a run with the configured default turn count
    pub fn start_default(&self) -> Result<StreamState> {
        let turns = self.settings.read().default_max_turns;
        self.start(turns)
    }

    /// Ask the active run to stop and wait until it has.
    ///
    /// An in-flight source or sink call is awaited, not dropped; it receives
    /// the cancellation signal and is expected to return early.
    pub async fn stop(&self) -> Result<StreamState> {
        let mut finished = {
            let slot = self.handle.lock();
            if !self.state.is_running() {
                tracing::warn!("Attempted to stop stream that is not running");
                return Err(Error::NotRunning);
            }
            slot.cancel.cancel();
            slot.finished.clone()
        };
        tracing::info!("Stream stop requested");

        // Wait on this run's own completion, not on whichever run goes idle next
        let final_state = finished
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|state| (*state).clone());
        Ok(final_state.unwrap_or_else(|| self.state.snapshot()))
    }

    /// Consistent snapshot of the current state
    pub fn status(&self) -> StreamState {
        self.state.snapshot()
    }

    /// Whether a run is active
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Wait until no run is active.
    pub async fn wait_for_idle(&self) {
        loop {
            let idle = self.handle.idle();
            if !self.state.is_running() {
                return;
            }
            idle.await;
        }
    }

    /// Wait until no run is active, with a timeout.
    /// Returns `true` if idle was reached, `false` on timeout.
    pub async fn wait_for_idle_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_for_idle())
            .await
            .is_ok()
    }

    /// Register a live subscriber
    pub fn subscribe(&self) -> Subscription {
        self.registry.subscribe()
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.registry.unsubscribe(id);
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Settings the next run will use
    pub fn settings(&self) -> Arc<StreamSettings> {
        self.settings.read().clone()
    }

    /// Change settings for the next run. The active run is unaffected.
    pub fn update_settings(&self, update: SettingsUpdate) -> Result<Vec<&'static str>> {
        let mut guard = self.settings.write();
        let mut next = (**guard).clone();
        let updated = next.apply(update)?;
        next.validate()?;
        *guard = Arc::new(next);
        tracing::info!("Configuration updated: {:?}", updated);
        Ok(updated)
    }
}
