//! Injected remote capabilities.
//!
//! The engine never talks to the network directly. Each remote surface it
//! depends on - the notification list, the commit stream, the chat log, and
//! the entity resolver - is an injected trait object, so classification and
//! driver logic can be exercised against in-memory fakes
//! (see [`crate::testing`]).
//!
//! The resolver is expected to memoize: the engine hands it the same URI or
//! DID repeatedly and relies on the resolver's cache, not its own.

use async_trait::async_trait;
use skein_proto::{AtUri, ChatLogPage, CommitEvent, Did, Notification, Post, Profile};
use thiserror::Error;

/// A failure at a remote capability boundary.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The remote could not be reached or the connection dropped.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The remote responded with something undecodable.
    #[error("decode failure: {0}")]
    Decode(String),
    /// The referenced entity does not exist (deleted, suspended, never was).
    #[error("not found: {0}")]
    NotFound(String),
}

/// The notification list endpoint.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    /// Fetch the full current notification list in one page, newest first.
    async fn list_notifications(&self) -> Result<Vec<Notification>, SourceError>;
}

/// The chat log endpoint.
#[async_trait]
pub trait ChatSource: Send + Sync {
    /// Fetch the next chat log page from the given cursor position.
    async fn chat_log(&self, cursor: Option<&str>) -> Result<ChatLogPage, SourceError>;
}

/// The entity resolver that hydrates bare references into full objects.
#[async_trait]
pub trait EntityResolver: Send + Sync {
    /// Hydrate a post URI.
    async fn post(&self, uri: &AtUri) -> Result<Post, SourceError>;

    /// Hydrate an actor DID.
    async fn profile(&self, did: &Did) -> Result<Profile, SourceError>;
}

/// An item delivered by a live commit-stream subscription.
#[derive(Debug)]
pub enum StreamItem {
    /// The subscription is established.
    Open,
    /// A commit batch arrived.
    Commit(CommitEvent),
    /// A transport-level error. The subscription itself may still be alive.
    Error(SourceError),
    /// The subscription ended. The driver reconnects.
    Closed,
}

/// An open subscription to the commit stream.
#[async_trait]
pub trait CommitSubscription: Send {
    /// Wait for the next stream item.
    async fn next(&mut self) -> StreamItem;
}

/// The commit stream endpoint.
#[async_trait]
pub trait CommitSource: Send + Sync {
    /// Open a subscription to the network-wide commit feed.
    async fn subscribe(&self, endpoint: &str)
        -> Result<Box<dyn CommitSubscription>, SourceError>;
}
