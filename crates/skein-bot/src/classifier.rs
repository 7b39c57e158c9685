//! Event classification.
//!
//! The classifier is a pure mapping from one raw record plus context to
//! zero or more [`EventDraft`]s. Drafts carry only bare references; drivers
//! hydrate them into full [`BotEvent`](crate::events::BotEvent)s through the
//! injected resolver (see [`crate::hydrate`]).
//!
//! Rules are evaluated independently, so a single record can produce more
//! than one draft - a post that both replies to the bot and mentions it
//! yields a `Reply` draft and a `Mention` draft. Kinds with no registered
//! listener are skipped; that is an optimization permitted by the engine's
//! contract, not load-bearing for correctness.

use std::collections::HashSet;

use serde_json::Value;
use skein_proto::{
    AtUri, Did, FacetFeature, Notification, NotificationReason, PostRecord, Record,
};

use crate::error::ClassificationError;
use crate::events::EventKind;

/// Context a classification runs against.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    /// The bot's own repository DID.
    pub bot: &'a Did,
    /// Kinds that currently have at least one listener.
    pub listened: &'a HashSet<EventKind>,
}

impl ClassifyContext<'_> {
    fn wants(&self, kind: EventKind) -> bool {
        self.listened.contains(&kind)
    }
}

/// A pre-hydration event: the classification outcome plus the bare
/// references needed to build the full event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDraft {
    /// A post replying to the bot. `post` is the replying post.
    Reply { post: AtUri },
    /// A post quoting the bot. `post` is the quoting post.
    Quote { post: AtUri },
    /// A post mentioning the bot. `post` is the mentioning post.
    Mention { post: AtUri },
    /// A repost of one of the bot's posts.
    Repost {
        /// The reposted post.
        subject: AtUri,
        /// Who reposted.
        actor: Did,
        /// URI of the repost record.
        via: AtUri,
    },
    /// A like of one of the bot's posts.
    Like {
        /// The liked post.
        subject: AtUri,
        /// Who liked.
        actor: Did,
        /// URI of the like record.
        via: AtUri,
    },
    /// A follow of the bot.
    Follow {
        /// The new follower.
        actor: Did,
        /// URI of the follow record.
        via: AtUri,
    },
}

impl EventDraft {
    /// The event kind this draft hydrates into.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Reply { .. } => EventKind::Reply,
            Self::Quote { .. } => EventKind::Quote,
            Self::Mention { .. } => EventKind::Mention,
            Self::Repost { .. } => EventKind::Repost,
            Self::Like { .. } => EventKind::Like,
            Self::Follow { .. } => EventKind::Follow,
        }
    }
}

/// Classify one raw record (streaming path).
///
/// `uri` is the record's canonical URI and `author` the repository owner
/// who created it. Returns every draft whose rule matches and whose kind
/// has a listener. Record types the engine does not handle produce no
/// drafts; records that *claim* a handled type but fail to decode produce
/// a [`ClassificationError`] carrying the payload.
pub fn classify_record(
    uri: &AtUri,
    author: &Did,
    record: &Value,
    ctx: &ClassifyContext<'_>,
) -> Result<Vec<EventDraft>, ClassificationError> {
    let decoded = Record::from_value(record).map_err(|e| {
        ClassificationError::new(format!("undecodable record: {e}"), Some(record.clone()))
    })?;

    let mut drafts = Vec::new();
    match decoded {
        Record::Post(post) => classify_post(&post, uri, ctx, &mut drafts),
        Record::Repost(repost) => {
            if ctx.wants(EventKind::Repost) && repost.subject.uri.repo() == ctx.bot {
                drafts.push(EventDraft::Repost {
                    subject: repost.subject.uri,
                    actor: author.clone(),
                    via: uri.clone(),
                });
            }
        }
        Record::Like(like) => {
            if ctx.wants(EventKind::Like) && like.subject.uri.repo() == ctx.bot {
                drafts.push(EventDraft::Like {
                    subject: like.subject.uri,
                    actor: author.clone(),
                    via: uri.clone(),
                });
            }
        }
        Record::Follow(follow) => {
            if ctx.wants(EventKind::Follow) && &follow.subject == ctx.bot {
                drafts.push(EventDraft::Follow {
                    actor: author.clone(),
                    via: uri.clone(),
                });
            }
        }
        Record::Unknown => {}
    }

    Ok(drafts)
}

/// Apply the three post rules independently; each can contribute a draft.
fn classify_post(
    post: &PostRecord,
    uri: &AtUri,
    ctx: &ClassifyContext<'_>,
    drafts: &mut Vec<EventDraft>,
) {
    if ctx.wants(EventKind::Reply)
        && post
            .reply
            .as_ref()
            .is_some_and(|reply| reply.parent.uri.repo() == ctx.bot)
    {
        drafts.push(EventDraft::Reply { post: uri.clone() });
    }

    if ctx.wants(EventKind::Quote)
        && post
            .embed
            .as_ref()
            .and_then(|embed| embed.record_ref())
            .is_some_and(|target| target.uri.repo() == ctx.bot)
    {
        drafts.push(EventDraft::Quote { post: uri.clone() });
    }

    if ctx.wants(EventKind::Mention) && mentions(post, ctx.bot) {
        drafts.push(EventDraft::Mention { post: uri.clone() });
    }
}

fn mentions(post: &PostRecord, bot: &Did) -> bool {
    post.facets.iter().flatten().any(|facet| {
        facet
            .features
            .iter()
            .any(|feature| matches!(feature, FacetFeature::Mention { did } if did == bot))
    })
}

/// Classify one notification (polling path).
///
/// The source has already sorted notifications into reasons, so this path
/// keys off the reason rather than re-deriving it - with one exception:
/// `reply`-reason items are checked against the record's parent reference,
/// because the source's reply notion covers any post in a thread the bot
/// participates in, not only direct replies.
pub fn classify_notification(
    notification: &Notification,
    ctx: &ClassifyContext<'_>,
) -> Result<Vec<EventDraft>, ClassificationError> {
    let mut drafts = Vec::new();
    match notification.reason {
        NotificationReason::Reply => {
            if !ctx.wants(EventKind::Reply) {
                return Ok(drafts);
            }
            let decoded = Record::from_value(&notification.record).map_err(|e| {
                ClassificationError::new(
                    format!("undecodable reply record: {e}"),
                    Some(notification.record.clone()),
                )
            })?;
            let Record::Post(post) = decoded else {
                return Err(ClassificationError::new(
                    "reply notification does not carry a post record",
                    Some(notification.record.clone()),
                ));
            };
            if post
                .reply
                .as_ref()
                .is_some_and(|reply| reply.parent.uri.repo() == ctx.bot)
            {
                drafts.push(EventDraft::Reply {
                    post: notification.uri.clone(),
                });
            }
        }
        NotificationReason::Quote => {
            if ctx.wants(EventKind::Quote) {
                drafts.push(EventDraft::Quote {
                    post: notification.uri.clone(),
                });
            }
        }
        NotificationReason::Mention => {
            if ctx.wants(EventKind::Mention) {
                drafts.push(EventDraft::Mention {
                    post: notification.uri.clone(),
                });
            }
        }
        NotificationReason::Repost => {
            if ctx.wants(EventKind::Repost) {
                drafts.push(EventDraft::Repost {
                    subject: reason_subject(notification)?,
                    actor: notification.author.clone(),
                    via: notification.uri.clone(),
                });
            }
        }
        NotificationReason::Like => {
            if ctx.wants(EventKind::Like) {
                drafts.push(EventDraft::Like {
                    subject: reason_subject(notification)?,
                    actor: notification.author.clone(),
                    via: notification.uri.clone(),
                });
            }
        }
        NotificationReason::Follow => {
            if ctx.wants(EventKind::Follow) {
                drafts.push(EventDraft::Follow {
                    actor: notification.author.clone(),
                    via: notification.uri.clone(),
                });
            }
        }
        // Reasons this engine does not handle (new source-side categories)
        // are not malformed data; they produce nothing.
        NotificationReason::Unknown => {}
    }
    Ok(drafts)
}

fn reason_subject(notification: &Notification) -> Result<AtUri, ClassificationError> {
    notification.reason_subject.clone().ok_or_else(|| {
        ClassificationError::new(
            format!("{:?} notification without a subject", notification.reason),
            Some(notification.record.clone()),
        )
    })
}
