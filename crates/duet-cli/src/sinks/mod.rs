//! Turn sinks used by the CLI

mod playback;
mod transcript;

pub use playback::{DEFAULT_CHARS_PER_SECOND, PacedPlayback};
pub use transcript::TranscriptSink;

use async_trait::async_trait;
use duet_stream::{BoxedSink, DeliveryError, Turn, TurnSink};
use tokio_util::sync::CancellationToken;

/// Runs several sinks in order for every turn.
///
/// A failing sink does not prevent the rest from running; all failures are
/// reported together.
pub struct SinkChain {
    sinks: Vec<BoxedSink>,
}

impl SinkChain {
    pub fn new(sinks: Vec<BoxedSink>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl TurnSink for SinkChain {
    async fn deliver(&self, turn: &Turn, cancel: CancellationToken) -> Result<(), DeliveryError> {
        let mut failures = Vec::new();

        for sink in &self.sinks {
            match sink.deliver(turn, cancel.clone()).await {
                Ok(()) => {}
                Err(DeliveryError::Aborted) => return Err(DeliveryError::Aborted),
                Err(DeliveryError::Failed(message)) => failures.push(message),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DeliveryError::Failed(failures.join("; ")))
        }
    }
}
