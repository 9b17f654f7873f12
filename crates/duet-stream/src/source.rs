//! Collaborator traits: where turns come from and where they go

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{DeliveryError, GenerationError};
use crate::events::Turn;
use crate::settings::AgentProfile;

/// Input for producing the next line
#[derive(Debug, Clone, Copy)]
pub struct TurnRequest<'a> {
    /// Most recent turns under the current topic, oldest first
    pub history: &'a [Turn],
    /// Who speaks next
    pub agent: &'a AgentProfile,
    /// Topic in effect
    pub topic: &'a str,
    /// 1-based index the produced turn will get
    pub turn_index: u32,
}

/// Produces the next spoken line
#[async_trait]
pub trait TurnSource: Send + Sync {
    /// Generate text for `request.agent`.
    ///
    /// `cancel` fires when the run is asked to stop; implementations should
    /// return [`GenerationError::Aborted`] promptly once it does.
    async fn generate(
        &self,
        request: TurnRequest<'_>,
        cancel: CancellationToken,
    ) -> Result<String, GenerationError>;
}

/// Performs side effects for a produced turn (speech, overlay, transcript)
#[async_trait]
pub trait TurnSink: Send + Sync {
    async fn deliver(&self, turn: &Turn, cancel: CancellationToken) -> Result<(), DeliveryError>;
}

/// Type alias for a shared source
pub type BoxedSource = Arc<dyn TurnSource>;

/// Type alias for a shared sink
pub type BoxedSink = Arc<dyn TurnSink>;

/// Sink that does nothing
pub struct NullSink;

#[async_trait]
impl TurnSink for NullSink {
    async fn deliver(&self, _turn: &Turn, _cancel: CancellationToken) -> Result<(), DeliveryError> {
        Ok(())
    }
}
