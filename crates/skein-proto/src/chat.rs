//! Chat log pages - the chat poller's unit of work.
//!
//! The chat log endpoint is cursor-paged: each page echoes back a cursor to
//! resume from, and entries are discriminated by `$type` like every other
//! wire union.

use crate::did::Did;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of the chat log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatLogPage {
    /// Token to resume from. Absent when the log is fully caught up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    /// Log entries, oldest first within the page.
    pub logs: Vec<ChatLogEntry>,
}

/// A single chat log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum ChatLogEntry {
    /// A message was created in a conversation.
    #[serde(rename = "chat.bsky.convo.defs#logCreateMessage")]
    CreateMessage {
        #[serde(rename = "convoId")]
        convo_id: String,
        message: ChatItem,
    },
    /// A message was deleted from a conversation.
    #[serde(rename = "chat.bsky.convo.defs#logDeleteMessage")]
    DeleteMessage {
        #[serde(rename = "convoId")]
        convo_id: String,
    },
    #[serde(other)]
    Unknown,
}

/// The message payload of a chat log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum ChatItem {
    /// A live message.
    #[serde(rename = "chat.bsky.convo.defs#messageView")]
    MessageView(MessageView),
    /// A tombstone for a deleted message.
    #[serde(rename = "chat.bsky.convo.defs#deletedMessageView")]
    DeletedMessageView {
        id: String,
    },
    #[serde(other)]
    Unknown,
}

/// A live chat message as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    /// Message identifier, unique within the conversation.
    pub id: String,
    /// Revision tag for edits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// The message text.
    pub text: String,
    /// Who sent it.
    pub sender: MessageSender,
    /// When it was sent.
    pub sent_at: DateTime<Utc>,
}

/// The sender reference carried by a message view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSender {
    pub did: Did,
}
