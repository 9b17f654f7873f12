//! Turn and published event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::settings::AgentProfile;
use crate::state::StreamState;

/// One produced utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub timestamp: DateTime<Utc>,
    /// Identifier of the speaking agent
    pub agent: String,
    /// Display name of the speaking agent
    pub agent_name: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// 1-based position within the run
    pub turn_index: u32,
}

impl Turn {
    pub(crate) fn new(
        turn_index: u32,
        agent: &AgentProfile,
        text: impl Into<String>,
        topic: Option<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            agent: agent.id.clone(),
            agent_name: agent.name.clone(),
            text: text.into(),
            topic,
            turn_index,
        }
    }
}

/// Events delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A turn was produced
    Turn(Turn),
    /// Stream state changed
    Status(StreamState),
}

impl StreamEvent {
    /// The turn carried by this event, if any
    pub fn as_turn(&self) -> Option<&Turn> {
        match self {
            StreamEvent::Turn(turn) => Some(turn),
            StreamEvent::Status(_) => None,
        }
    }

    /// The state carried by this event, if any
    pub fn as_status(&self) -> Option<&StreamState> {
        match self {
            StreamEvent::Status(state) => Some(state),
            StreamEvent::Turn(_) => None,
        }
    }

    /// Check if this is the last event of a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Status(state) if !state.running)
    }
}
