//! Engine configuration.
//!
//! Defaults match the hosted service's tolerances: 5-second polling on both
//! feeds and the well-known public relay for the commit stream. Everything
//! is overridable through the builder.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::EngineError;

/// The well-known public relay serving the network-wide commit stream.
pub const DEFAULT_RELAY_URL: &str = "wss://bsky.network";

/// Default interval between notification polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default interval between chat log polls.
pub const DEFAULT_CHAT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How the main driver sources events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Poll the notification list endpoint.
    #[default]
    Polling,
    /// Subscribe to the live commit stream.
    Firehose,
}

/// Configuration for an [`EventEngine`](crate::engine::EventEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How the main driver sources events.
    pub strategy: Strategy,
    /// Interval between notification polls.
    pub poll_interval: Duration,
    /// Interval between chat log polls.
    pub chat_poll_interval: Duration,
    /// Where the polling watermark starts. `None` means engine construction
    /// time: notifications that pre-date the engine are never delivered.
    pub starting_watermark: Option<DateTime<Utc>>,
    /// Commit stream endpoint (firehose strategy only).
    pub relay_url: String,
    /// Whether event emission is enabled at all. When false, `on()` fails
    /// synchronously and no driver ever starts.
    pub enable_events: bool,
    /// Buffer capacity of the bus's broadcast tap.
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            chat_poll_interval: DEFAULT_CHAT_POLL_INTERVAL,
            starting_watermark: None,
            relay_url: DEFAULT_RELAY_URL.to_string(),
            enable_events: true,
            channel_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Check the configuration for values no driver could run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.poll_interval.is_zero() {
            return Err(EngineError::Configuration(
                "poll interval must be non-zero".to_string(),
            ));
        }
        if self.chat_poll_interval.is_zero() {
            return Err(EngineError::Configuration(
                "chat poll interval must be non-zero".to_string(),
            ));
        }
        if self.strategy == Strategy::Firehose && self.relay_url.is_empty() {
            return Err(EngineError::Configuration(
                "firehose strategy requires a relay URL".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source events from the notification list (the default).
    pub fn polling(mut self) -> Self {
        self.config.strategy = Strategy::Polling;
        self
    }

    /// Source events from the live commit stream.
    pub fn firehose(mut self) -> Self {
        self.config.strategy = Strategy::Firehose;
        self
    }

    /// Set the notification poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the chat log poll interval.
    pub fn chat_poll_interval(mut self, interval: Duration) -> Self {
        self.config.chat_poll_interval = interval;
        self
    }

    /// Deliver notifications indexed after `instant` instead of only those
    /// arriving after construction.
    pub fn starting_watermark(mut self, instant: DateTime<Utc>) -> Self {
        self.config.starting_watermark = Some(instant);
        self
    }

    /// Use a custom commit stream endpoint.
    pub fn relay_url(mut self, url: impl Into<String>) -> Self {
        self.config.relay_url = url.into();
        self
    }

    /// Disable event emission entirely.
    pub fn disable_events(mut self) -> Self {
        self.config.enable_events = false;
        self
    }

    /// Set the broadcast tap capacity.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Build the configuration.
    pub fn build_config(self) -> EngineConfig {
        self.config
    }
}
