//! Error types for duet-stream

use thiserror::Error;

/// Result type alias using duet-stream Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the stream control surface
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A run is already active
    #[error("Stream is already running")]
    AlreadyRunning,

    /// No run is active
    #[error("No stream is currently running")]
    NotRunning,

    /// Requested turn count is outside the accepted range
    #[error("max_turns must be between {min} and {max}, got {requested}")]
    InvalidMaxTurns { requested: u32, min: u32, max: u32 },

    /// Settings failed validation
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// The run loop could not continue
    #[error("Run aborted: {0}")]
    Unrecoverable(String),
}

/// Failure reported by a [`TurnSource`](crate::source::TurnSource)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The call observed the stop signal and gave up
    #[error("Generation aborted")]
    Aborted,

    /// The source returned nothing worth speaking
    #[error("Empty response from source")]
    EmptyResponse,

    /// Any other failure from the source
    #[error("{0}")]
    Failed(String),
}

impl GenerationError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Failure reported by a [`TurnSink`](crate::source::TurnSink)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The call observed the stop signal and gave up
    #[error("Delivery aborted")]
    Aborted,

    /// Any other failure from the sink
    #[error("{0}")]
    Failed(String),
}

impl DeliveryError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl From<std::io::Error> for DeliveryError {
    fn from(e: std::io::Error) -> Self {
        Self::Failed(format!("I/O error: {}", e))
    }
}
