//! duet-stream: lifecycle manager for two-agent dialogue streams
//!
//! This crate runs at most one dialogue stream at a time as a background
//! task, tracks its state, and fans every produced turn out to any number
//! of live subscribers without letting a slow one hold up the rest.

pub mod error;
pub mod events;
mod handle;
pub mod manager;
pub mod registry;
pub mod run;
pub mod settings;
pub mod source;
pub mod state;

pub use error::{DeliveryError, Error, GenerationError, Result};
pub use events::{StreamEvent, Turn};
pub use manager::StreamManager;
pub use registry::{PublishReport, SubscriberId, SubscriberRegistry, Subscription};
pub use run::RunSummary;
pub use settings::{AgentProfile, SettingsUpdate, StreamSettings};
pub use source::{BoxedSink, BoxedSource, NullSink, TurnRequest, TurnSink, TurnSource};
pub use state::StreamState;
