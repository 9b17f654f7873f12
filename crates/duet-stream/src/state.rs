//! Stream state: the shared record of what is happening now

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Snapshot of the stream state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamState {
    /// Whether a run loop is executing
    pub running: bool,
    /// Turns completed in the active (or last) run
    pub current_turn: u32,
    /// Turn ceiling for the active (or last) run
    pub max_turns: u32,
    /// Topic currently in effect
    pub current_topic: String,
    /// Most recent failures, oldest first
    pub recent_errors: Vec<String>,
    /// Failures recorded in the active (or last) run, including evicted ones
    #[serde(default)]
    pub total_errors: u32,
    /// Identifier of the active (or last) run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
}

impl StreamState {
    /// Idle state with the given turn ceiling
    pub fn idle(max_turns: u32) -> Self {
        Self {
            running: false,
            current_turn: 0,
            max_turns: max_turns.max(1),
            current_topic: String::new(),
            recent_errors: Vec::new(),
            total_errors: 0,
            run_id: None,
        }
    }
}

impl Default for StreamState {
    fn default() -> Self {
        Self::idle(1)
    }
}

struct Inner {
    running: bool,
    current_turn: u32,
    max_turns: u32,
    current_topic: String,
    errors: VecDeque<String>,
    error_capacity: usize,
    total_errors: u32,
    run_id: Option<Uuid>,
}

impl Inner {
    fn snapshot(&self) -> StreamState {
        StreamState {
            running: self.running,
            current_turn: self.current_turn,
            max_turns: self.max_turns,
            current_topic: self.current_topic.clone(),
            recent_errors: self.errors.iter().cloned().collect(),
            total_errors: self.total_errors,
            run_id: self.run_id,
        }
    }
}

/// Mutex-guarded stream state.
///
/// Every accessor takes the lock once and returns a full snapshot, so a
/// reader never sees half of an update.
pub(crate) struct StateCell {
    inner: Mutex<Inner>,
}

impl StateCell {
    pub(crate) fn new(max_turns: u32, error_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                running: false,
                current_turn: 0,
                max_turns: max_turns.max(1),
                current_topic: String::new(),
                errors: VecDeque::new(),
                error_capacity: error_capacity.max(1),
                total_errors: 0,
                run_id: None,
            }),
        }
    }

    pub(crate) fn snapshot(&self) -> StreamState {
        self.inner.lock().snapshot()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    /// Idle -> running. Fails without touching anything if already running.
    pub(crate) fn begin(
        &self,
        run_id: Uuid,
        max_turns: u32,
        topic: String,
        error_capacity: usize,
    ) -> Result<StreamState> {
        let mut inner = self.inner.lock();
        if inner.running {
            return Err(Error::AlreadyRunning);
        }
        inner.running = true;
        inner.current_turn = 0;
        inner.max_turns = max_turns.max(1);
        inner.current_topic = topic;
        inner.errors.clear();
        inner.total_errors = 0;
        inner.error_capacity = error_capacity.max(1);
        inner.run_id = Some(run_id);
        Ok(inner.snapshot())
    }

    pub(crate) fn current_turn(&self) -> u32 {
        self.inner.lock().current_turn
    }

    pub(crate) fn current_topic(&self) -> String {
        self.inner.lock().current_topic.clone()
    }

    /// Count one more completed turn, never past the ceiling.
    pub(crate) fn complete_turn(&self) -> StreamState {
        let mut inner = self.inner.lock();
        if inner.current_turn < inner.max_turns {
            inner.current_turn += 1;
        }
        inner.snapshot()
    }

    pub(crate) fn set_topic(&self, topic: impl Into<String>) -> StreamState {
        let mut inner = self.inner.lock();
        inner.current_topic = topic.into();
        inner.snapshot()
    }

    /// Append an error, evicting the oldest when full.
    pub(crate) fn record_error(&self, message: impl Into<String>) -> StreamState {
        let mut inner = self.inner.lock();
        if inner.errors.len() >= inner.error_capacity {
            inner.errors.pop_front();
        }
        inner.errors.push_back(message.into());
        inner.total_errors = inner.total_errors.saturating_add(1);
        inner.snapshot()
    }

    /// Running -> idle.
    pub(crate) fn finish(&self) -> StreamState {
        let mut inner = self.inner.lock();
        inner.running = false;
        inner.snapshot()
    }
}
