//! # Skein Bot
//!
//! The event engine of the skein SDK: turns a remote, continuously-changing
//! data source - a polled notification feed or a live commit stream - into a
//! typed, de-duplicated sequence of bot-level events.
//!
//! ## Architecture
//!
//! - [`EventEngine`]: the facade. Lazily starts background drivers on the
//!   first listener registration and tears them down on stop.
//! - [`classifier`]: pure mapping from raw records to event drafts.
//! - [`PollingDriver`] / [`FirehoseDriver`] / [`ChatDriver`]: the background
//!   tasks feeding the classifier.
//! - [`EventBus`]: the typed publish/subscribe surface, with an optional
//!   broadcast tap for stream-style consumption.
//! - [`source`]: the injected remote capabilities (notification list,
//!   commit stream, chat log, entity resolver).
//!
//! ## Example
//!
//! ```ignore
//! use skein_bot::{EventEngine, EventKind};
//!
//! let engine = EventEngine::new(sources);
//! engine.set_identity(bot_did).await;
//!
//! engine.on(EventKind::Reply, |event| {
//!     println!("someone replied: {event:?}");
//! })?;
//!
//! // ... later
//! engine.stop().await;
//! ```
//!
//! ## Failure visibility
//!
//! Driver failures surface as `error` events. A bot that registers any
//! listener without also registering an `error` listener will miss them -
//! the bus only logs a warning in that case. Attach an `error` listener.

pub mod bus;
pub mod chat;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod firehose;
pub mod hydrate;
pub mod lifecycle;
pub mod polling;
pub mod progress;
pub mod source;
pub mod stream;
pub mod testing;

pub use bus::{EventBus, ListenerId};
pub use chat::ChatDriver;
pub use classifier::{ClassifyContext, EventDraft, classify_notification, classify_record};
pub use config::{
    DEFAULT_CHAT_POLL_INTERVAL, DEFAULT_POLL_INTERVAL, DEFAULT_RELAY_URL, EngineBuilder,
    EngineConfig, Strategy,
};
pub use engine::{EngineSources, EventEngine};
pub use error::{ClassificationError, EngineError, EventError};
pub use events::{BotEvent, DriverKind, EventKind};
pub use firehose::FirehoseDriver;
pub use lifecycle::{DriverCell, DriverHandle, DriverState};
pub use polling::PollingDriver;
pub use progress::{PageCursor, Watermark};
pub use source::{
    ChatSource, CommitSource, CommitSubscription, EntityResolver, NotificationSource, SourceError,
    StreamItem,
};
