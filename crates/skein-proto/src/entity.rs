//! Hydrated entity views.
//!
//! The engine hands bare URIs and DIDs to an external resolver and gets
//! these back. They are the payloads bot-level events carry.

use crate::did::Did;
use crate::record::PostRecord;
use crate::uri::AtUri;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A hydrated actor profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub did: Did,
    /// Human-readable handle, e.g. `alice.example.com`.
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// A hydrated post: the record plus its address and author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub uri: AtUri,
    pub cid: String,
    pub author: Profile,
    pub record: PostRecord,
    pub indexed_at: DateTime<Utc>,
}

/// A hydrated direct message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    /// The conversation the message belongs to.
    pub convo_id: String,
    pub text: String,
    pub sender: Profile,
    pub sent_at: DateTime<Utc>,
}
