//! Error types for the event engine.
//!
//! Failure handling is split by where the failure can be reported:
//!
//! - [`EngineError`] is returned synchronously from engine calls. It only
//!   covers configuration misuse - with no driver running there is nothing
//!   to report through asynchronously.
//! - [`EventError`] is what a [`BotEvent::Error`](crate::events::BotEvent)
//!   carries. Transport and classification failures inside a driver tick are
//!   wrapped into it and emitted; the tick loop always continues.
//! - A missing identity (no session yet) is deliberately *not* an error:
//!   affected items are dropped silently.

use serde_json::Value;
use thiserror::Error;

use crate::source::SourceError;

/// Errors returned synchronously from engine calls.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Event emission was disabled in the engine configuration.
    #[error("events are disabled in this configuration")]
    EventsDisabled,

    /// The configuration is unusable as given.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

/// A record that could not be classified.
///
/// Carries the offending payload (when one is available) so an `error`
/// listener can inspect or persist it.
#[derive(Debug, Clone, Error)]
#[error("unclassifiable record: {message}")]
pub struct ClassificationError {
    /// What was wrong with the record.
    pub message: String,
    /// The raw payload that failed classification, if available.
    pub payload: Option<Value>,
}

impl ClassificationError {
    pub fn new(message: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            message: message.into(),
            payload,
        }
    }
}

/// The cause carried by an `error` event.
///
/// Cloneable so one failure can fan out to every registered listener and
/// the broadcast tap.
#[derive(Debug, Clone, Error)]
pub enum EventError {
    /// A remote fetch or stream operation failed. The driver retries on its
    /// own schedule; this is informational.
    #[error("transport failure in {context}: {source}")]
    Transport {
        /// Which driver operation failed.
        context: &'static str,
        source: SourceError,
    },

    /// A record could not be classified. The item was skipped.
    #[error(transparent)]
    Classification(#[from] ClassificationError),

    /// A draft event could not be hydrated into its full payload.
    #[error("hydration failed for {reference}: {source}")]
    Hydration {
        /// The URI or DID that failed to resolve.
        reference: String,
        source: SourceError,
    },
}

impl EventError {
    /// Wrap a source failure with the driver operation it interrupted.
    pub fn transport(context: &'static str, source: SourceError) -> Self {
        Self::Transport { context, source }
    }
}
