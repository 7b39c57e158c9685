//! Draft hydration.
//!
//! Turns the classifier's bare-reference drafts into full events by
//! resolving posts and profiles through the injected resolver. All drafts
//! passed in one call come from a single record, and references are fetched
//! at most once per call - a post matching both the reply and mention rules
//! costs one post lookup, shared by both events.

use std::collections::HashMap;

use skein_proto::{AtUri, Did, Post, Profile};

use crate::classifier::EventDraft;
use crate::error::EventError;
use crate::events::BotEvent;
use crate::source::EntityResolver;

/// Hydrate the drafts of one record, in draft order.
///
/// Each draft resolves independently: a failed lookup yields an
/// `Err` in its slot and does not disturb the other drafts.
pub async fn hydrate_drafts(
    resolver: &dyn EntityResolver,
    drafts: Vec<EventDraft>,
) -> Vec<Result<BotEvent, EventError>> {
    let mut posts: HashMap<AtUri, Post> = HashMap::new();
    let mut profiles: HashMap<Did, Profile> = HashMap::new();
    let mut events = Vec::with_capacity(drafts.len());

    for draft in drafts {
        let event = match draft {
            EventDraft::Reply { post } => fetch_post(resolver, &mut posts, &post)
                .await
                .map(BotEvent::Reply),
            EventDraft::Quote { post } => fetch_post(resolver, &mut posts, &post)
                .await
                .map(BotEvent::Quote),
            EventDraft::Mention { post } => fetch_post(resolver, &mut posts, &post)
                .await
                .map(BotEvent::Mention),
            EventDraft::Repost { subject, actor, via } => {
                match (
                    fetch_post(resolver, &mut posts, &subject).await,
                    fetch_profile(resolver, &mut profiles, &actor).await,
                ) {
                    (Ok(post), Ok(user)) => Ok(BotEvent::Repost { post, user, uri: via }),
                    (Err(e), _) | (_, Err(e)) => Err(e),
                }
            }
            EventDraft::Like { subject, actor, via } => {
                match (
                    fetch_post(resolver, &mut posts, &subject).await,
                    fetch_profile(resolver, &mut profiles, &actor).await,
                ) {
                    (Ok(subject), Ok(user)) => Ok(BotEvent::Like { subject, user, uri: via }),
                    (Err(e), _) | (_, Err(e)) => Err(e),
                }
            }
            EventDraft::Follow { actor, via } => fetch_profile(resolver, &mut profiles, &actor)
                .await
                .map(|user| BotEvent::Follow { user, uri: via }),
        };
        events.push(event);
    }

    events
}

async fn fetch_post(
    resolver: &dyn EntityResolver,
    cache: &mut HashMap<AtUri, Post>,
    uri: &AtUri,
) -> Result<Post, EventError> {
    if let Some(post) = cache.get(uri) {
        return Ok(post.clone());
    }
    let post = resolver
        .post(uri)
        .await
        .map_err(|source| EventError::Hydration {
            reference: uri.to_string(),
            source,
        })?;
    cache.insert(uri.clone(), post.clone());
    Ok(post)
}

async fn fetch_profile(
    resolver: &dyn EntityResolver,
    cache: &mut HashMap<Did, Profile>,
    did: &Did,
) -> Result<Profile, EventError> {
    if let Some(profile) = cache.get(did) {
        return Ok(profile.clone());
    }
    let profile = resolver
        .profile(did)
        .await
        .map_err(|source| EventError::Hydration {
            reference: did.to_string(),
            source,
        })?;
    cache.insert(did.clone(), profile.clone());
    Ok(profile)
}
