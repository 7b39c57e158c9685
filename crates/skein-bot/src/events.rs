//! Bot-level events.
//!
//! [`BotEvent`] is the typed union the engine emits; [`EventKind`] is its
//! fieldless mirror, used as the listener-table key and in the classifier's
//! suppression checks.

use derive_more::Display;
use skein_proto::{AtUri, ChatMessage, Post, Profile};

use crate::error::EventError;

/// An event emitted by the engine.
#[derive(Debug, Clone)]
pub enum BotEvent {
    /// The commit stream connected.
    Open,
    /// The commit stream disconnected. The engine reconnects on its own.
    Close,
    /// A failure inside a driver tick. The offending item was skipped.
    Error(EventError),
    /// Someone replied to one of the bot's posts.
    Reply(Post),
    /// Someone quoted one of the bot's posts.
    Quote(Post),
    /// Someone mentioned the bot.
    Mention(Post),
    /// Someone reposted one of the bot's posts.
    Repost {
        /// The reposted post.
        post: Post,
        /// Who reposted it.
        user: Profile,
        /// URI of the repost record itself.
        uri: AtUri,
    },
    /// Someone liked one of the bot's posts.
    Like {
        /// The liked post.
        subject: Post,
        /// Who liked it.
        user: Profile,
        /// URI of the like record itself.
        uri: AtUri,
    },
    /// Someone followed the bot.
    Follow {
        /// The new follower.
        user: Profile,
        /// URI of the follow record.
        uri: AtUri,
    },
    /// A direct message arrived.
    Message(ChatMessage),
}

impl BotEvent {
    /// The kind tag of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Open => EventKind::Open,
            Self::Close => EventKind::Close,
            Self::Error(_) => EventKind::Error,
            Self::Reply(_) => EventKind::Reply,
            Self::Quote(_) => EventKind::Quote,
            Self::Mention(_) => EventKind::Mention,
            Self::Repost { .. } => EventKind::Repost,
            Self::Like { .. } => EventKind::Like,
            Self::Follow { .. } => EventKind::Follow,
            Self::Message(_) => EventKind::Message,
        }
    }
}

/// Which background driver serves an event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    /// The notification poller or the commit-stream driver, per strategy.
    Main,
    /// The chat log poller.
    Chat,
}

/// The kind tag of a [`BotEvent`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    #[display("open")]
    Open,
    #[display("close")]
    Close,
    #[display("error")]
    Error,
    #[display("reply")]
    Reply,
    #[display("quote")]
    Quote,
    #[display("mention")]
    Mention,
    #[display("repost")]
    Repost,
    #[display("like")]
    Like,
    #[display("follow")]
    Follow,
    #[display("message")]
    Message,
}

impl EventKind {
    /// The driver responsible for producing events of this kind.
    pub fn driver(&self) -> DriverKind {
        match self {
            Self::Message => DriverKind::Chat,
            _ => DriverKind::Main,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(EventKind::Reply.to_string(), "reply");
        assert_eq!(EventKind::Message.to_string(), "message");
    }

    #[test]
    fn test_kind_driver_mapping() {
        assert_eq!(EventKind::Message.driver(), DriverKind::Chat);
        assert_eq!(EventKind::Reply.driver(), DriverKind::Main);
        assert_eq!(EventKind::Open.driver(), DriverKind::Main);
        assert_eq!(EventKind::Error.driver(), DriverKind::Main);
    }

    #[test]
    fn test_event_kind_tags() {
        assert_eq!(BotEvent::Open.kind(), EventKind::Open);
        assert_eq!(BotEvent::Close.kind(), EventKind::Close);
    }
}
