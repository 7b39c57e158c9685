//! Tagged-union wire records.
//!
//! Records arrive as JSON objects discriminated by a `$type` field. The
//! [`Record`] enum matches the discriminators the engine classifies;
//! everything else falls to [`Record::Unknown`] so a decode never aborts a
//! batch.

use crate::did::Did;
use crate::uri::StrongRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A wire record, discriminated by its `$type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum Record {
    /// A post in a feed.
    #[serde(rename = "app.bsky.feed.post")]
    Post(PostRecord),
    /// A like of a record.
    #[serde(rename = "app.bsky.feed.like")]
    Like(LikeRecord),
    /// A repost of a post.
    #[serde(rename = "app.bsky.feed.repost")]
    Repost(RepostRecord),
    /// A follow of an actor.
    #[serde(rename = "app.bsky.graph.follow")]
    Follow(FollowRecord),
    /// Any record type the engine does not classify.
    #[serde(other)]
    Unknown,
}

impl Record {
    /// Decode a record from a raw JSON payload.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }
}

/// A post record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    /// The post text.
    pub text: String,
    /// Thread references, present when this post is a reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyRef>,
    /// Embedded content, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<Embed>,
    /// Rich-text annotations over byte ranges of `text`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facets: Option<Vec<Facet>>,
    /// Author-asserted creation time.
    pub created_at: DateTime<Utc>,
}

/// Thread position of a reply post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyRef {
    /// The root of the thread.
    pub root: StrongRef,
    /// The post being replied to.
    pub parent: StrongRef,
}

/// Embedded content within a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum Embed {
    /// A direct embed of another record (a quote).
    #[serde(rename = "app.bsky.embed.record")]
    Record {
        /// The embedded record reference.
        record: StrongRef,
    },
    /// A record embed alongside media.
    #[serde(rename = "app.bsky.embed.recordWithMedia")]
    RecordWithMedia {
        /// The record half of the embed.
        record: EmbeddedRecord,
        /// The media half, opaque to the engine.
        media: serde_json::Value,
    },
    /// Media-only or unrecognized embeds; never a quote.
    #[serde(other)]
    Other,
}

/// The nested record object inside a record-with-media embed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedRecord {
    /// The embedded record reference.
    pub record: StrongRef,
}

impl Embed {
    /// The quoted record reference, if this embed quotes one.
    pub fn record_ref(&self) -> Option<&StrongRef> {
        match self {
            Embed::Record { record } => Some(record),
            Embed::RecordWithMedia { record, .. } => Some(&record.record),
            Embed::Other => None,
        }
    }
}

/// A rich-text annotation over a byte range of the post text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facet {
    /// The annotated byte range.
    pub index: ByteSlice,
    /// The annotations applied to the range.
    pub features: Vec<FacetFeature>,
}

/// A byte range within post text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteSlice {
    pub byte_start: u64,
    pub byte_end: u64,
}

/// A single rich-text feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum FacetFeature {
    /// A mention of an actor.
    #[serde(rename = "app.bsky.richtext.facet#mention")]
    Mention {
        /// The mentioned actor.
        did: Did,
    },
    /// A hyperlink.
    #[serde(rename = "app.bsky.richtext.facet#link")]
    Link { uri: String },
    /// A hashtag.
    #[serde(rename = "app.bsky.richtext.facet#tag")]
    Tag { tag: String },
    #[serde(other)]
    Unknown,
}

/// A like record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeRecord {
    /// The liked record.
    pub subject: StrongRef,
    pub created_at: DateTime<Utc>,
}

/// A repost record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepostRecord {
    /// The reposted record.
    pub subject: StrongRef,
    pub created_at: DateTime<Utc>,
}

/// A follow record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRecord {
    /// The followed actor.
    pub subject: Did,
    pub created_at: DateTime<Utc>,
}
