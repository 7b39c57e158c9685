//! Notifications - the polling source's unit of work.

use crate::did::Did;
use crate::uri::AtUri;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Why a notification was generated, as classified by the source.
///
/// The source's own classification is coarser than the engine's: a `reply`
/// reason covers any post in a thread the bot participates in, not only
/// direct replies to the bot. Reasons added to the protocol after this
/// crate decode as [`NotificationReason::Unknown`] rather than failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationReason {
    Like,
    Repost,
    Follow,
    Mention,
    Reply,
    Quote,
    Unknown,
}

impl NotificationReason {
    /// The wire string of this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Repost => "repost",
            Self::Follow => "follow",
            Self::Mention => "mention",
            Self::Reply => "reply",
            Self::Quote => "quote",
            Self::Unknown => "unknown",
        }
    }

    fn from_wire(s: &str) -> Self {
        match s {
            "like" => Self::Like,
            "repost" => Self::Repost,
            "follow" => Self::Follow,
            "mention" => Self::Mention,
            "reply" => Self::Reply,
            "quote" => Self::Quote,
            _ => Self::Unknown,
        }
    }
}

impl Serialize for NotificationReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NotificationReason {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&s))
    }
}

/// A single entry from the notification list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// URI of the record that triggered the notification.
    pub uri: AtUri,
    /// Content hash of that record.
    pub cid: String,
    /// The actor whose action triggered the notification.
    pub author: Did,
    /// The source's classification of this notification.
    pub reason: NotificationReason,
    /// Subject record of the reason, when the reason has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_subject: Option<AtUri>,
    /// The raw record payload; decoded lazily by the classifier.
    pub record: serde_json::Value,
    /// When the source indexed the record. The polling watermark is
    /// compared against this field.
    pub indexed_at: DateTime<Utc>,
}
