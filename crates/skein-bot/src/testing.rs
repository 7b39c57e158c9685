//! In-memory fakes for the remote capabilities.
//!
//! Each mock is scripted: tests queue responses up front and the drivers
//! consume them in order. Exhausted mocks return quiet defaults (an empty
//! notification list, a cursorless empty chat page, a subscription that
//! stays silent), so a driver keeps ticking without failing.
//!
//! Shipped as a regular module rather than test-only code so demos and
//! downstream crates can drive an engine without a network.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use skein_proto::{
    AtUri, ChatLogPage, Did, Notification, Post, PostRecord, Profile,
};

use crate::engine::EngineSources;
use crate::source::{
    ChatSource, CommitSource, CommitSubscription, EntityResolver, NotificationSource, SourceError,
    StreamItem,
};

/// Scripted notification list endpoint.
#[derive(Default)]
pub struct MockNotificationSource {
    pages: Mutex<VecDeque<Result<Vec<Notification>, SourceError>>>,
    fetches: AtomicUsize,
}

impl MockNotificationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a page of notifications for a future fetch.
    pub fn push_page(&self, page: Vec<Notification>) {
        self.pages
            .lock()
            .expect("mock pages poisoned")
            .push_back(Ok(page));
    }

    /// Queue a fetch failure.
    pub fn push_error(&self, error: SourceError) {
        self.pages
            .lock()
            .expect("mock pages poisoned")
            .push_back(Err(error));
    }

    /// How many fetches have happened.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl NotificationSource for MockNotificationSource {
    async fn list_notifications(&self) -> Result<Vec<Notification>, SourceError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.pages
            .lock()
            .expect("mock pages poisoned")
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Scripted chat log endpoint. Records every cursor it is asked for.
#[derive(Default)]
pub struct MockChatSource {
    pages: Mutex<VecDeque<Result<ChatLogPage, SourceError>>>,
    cursors_seen: Mutex<Vec<Option<String>>>,
}

impl MockChatSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a chat log page for a future fetch.
    pub fn push_page(&self, page: ChatLogPage) {
        self.pages
            .lock()
            .expect("mock pages poisoned")
            .push_back(Ok(page));
    }

    /// Queue a fetch failure.
    pub fn push_error(&self, error: SourceError) {
        self.pages
            .lock()
            .expect("mock pages poisoned")
            .push_back(Err(error));
    }

    /// The cursor argument of every fetch so far, in order.
    pub fn cursors_seen(&self) -> Vec<Option<String>> {
        self.cursors_seen
            .lock()
            .expect("mock cursors poisoned")
            .clone()
    }
}

#[async_trait]
impl ChatSource for MockChatSource {
    async fn chat_log(&self, cursor: Option<&str>) -> Result<ChatLogPage, SourceError> {
        self.cursors_seen
            .lock()
            .expect("mock cursors poisoned")
            .push(cursor.map(str::to_string));
        self.pages
            .lock()
            .expect("mock pages poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Ok(ChatLogPage {
                    cursor: None,
                    logs: Vec::new(),
                })
            })
    }
}

/// Scripted commit stream endpoint.
///
/// Each `subscribe` call consumes one script: either a connect failure or a
/// sequence of stream items. A subscription whose items run out goes silent
/// (it never closes on its own), and with no scripts left, subscriptions
/// start silent.
#[derive(Default)]
pub struct MockCommitSource {
    scripts: Mutex<VecDeque<Result<Vec<StreamItem>, SourceError>>>,
    connects: AtomicUsize,
}

impl MockCommitSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the item sequence of a future subscription.
    pub fn push_session(&self, items: Vec<StreamItem>) {
        self.scripts
            .lock()
            .expect("mock scripts poisoned")
            .push_back(Ok(items));
    }

    /// Queue a connect failure.
    pub fn push_connect_error(&self, error: SourceError) {
        self.scripts
            .lock()
            .expect("mock scripts poisoned")
            .push_back(Err(error));
    }

    /// How many subscriptions have been opened.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CommitSource for MockCommitSource {
    async fn subscribe(
        &self,
        _endpoint: &str,
    ) -> Result<Box<dyn CommitSubscription>, SourceError> {
        self.connects.fetch_add(1, Ordering::Relaxed);
        let script = self
            .scripts
            .lock()
            .expect("mock scripts poisoned")
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))?;
        Ok(Box::new(MockSubscription {
            items: script.into(),
        }))
    }
}

/// The subscription side of [`MockCommitSource`].
pub struct MockSubscription {
    items: VecDeque<StreamItem>,
}

#[async_trait]
impl CommitSubscription for MockSubscription {
    async fn next(&mut self) -> StreamItem {
        match self.items.pop_front() {
            Some(item) => item,
            // Script exhausted: stay open and silent.
            None => futures::future::pending().await,
        }
    }
}

/// Entity resolver that synthesizes hydrated objects on demand and counts
/// lookups, so tests can assert hydrate-once behavior.
#[derive(Default)]
pub struct MockResolver {
    posts: DashMap<AtUri, Post>,
    profiles: DashMap<Did, Profile>,
    failing_posts: DashMap<AtUri, ()>,
    post_lookups: AtomicUsize,
    profile_lookups: AtomicUsize,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload a specific hydrated post.
    pub fn insert_post(&self, post: Post) {
        self.posts.insert(post.uri.clone(), post);
    }

    /// Preload a specific hydrated profile.
    pub fn insert_profile(&self, profile: Profile) {
        self.profiles.insert(profile.did.clone(), profile);
    }

    /// Make lookups of `uri` fail with `NotFound`.
    pub fn fail_post(&self, uri: &AtUri) {
        self.failing_posts.insert(uri.clone(), ());
    }

    /// How many post lookups have reached the resolver.
    pub fn post_calls(&self) -> usize {
        self.post_lookups.load(Ordering::Relaxed)
    }

    /// How many profile lookups have reached the resolver.
    pub fn profile_calls(&self) -> usize {
        self.profile_lookups.load(Ordering::Relaxed)
    }

    fn synthesize_profile(did: &Did) -> Profile {
        let tail = did.as_str().rsplit(':').next().unwrap_or("actor");
        Profile {
            did: did.clone(),
            handle: format!("{tail}.example.com"),
            display_name: None,
        }
    }
}

#[async_trait]
impl EntityResolver for MockResolver {
    async fn post(&self, uri: &AtUri) -> Result<Post, SourceError> {
        self.post_lookups.fetch_add(1, Ordering::Relaxed);
        if self.failing_posts.contains_key(uri) {
            return Err(SourceError::NotFound(uri.to_string()));
        }
        if let Some(post) = self.posts.get(uri) {
            return Ok(post.clone());
        }
        Ok(Post {
            uri: uri.clone(),
            cid: "mock-cid".to_string(),
            author: Self::synthesize_profile(uri.repo()),
            record: PostRecord {
                text: String::new(),
                reply: None,
                embed: None,
                facets: None,
                created_at: Utc::now(),
            },
            indexed_at: Utc::now(),
        })
    }

    async fn profile(&self, did: &Did) -> Result<Profile, SourceError> {
        self.profile_lookups.fetch_add(1, Ordering::Relaxed);
        if let Some(profile) = self.profiles.get(did) {
            return Ok(profile.clone());
        }
        Ok(Self::synthesize_profile(did))
    }
}

/// A full set of default mocks, for engines that only need quiet sources.
pub fn mock_sources() -> EngineSources {
    EngineSources {
        notifications: std::sync::Arc::new(MockNotificationSource::new()),
        commits: std::sync::Arc::new(MockCommitSource::new()),
        chat: std::sync::Arc::new(MockChatSource::new()),
        resolver: std::sync::Arc::new(MockResolver::new()),
    }
}
