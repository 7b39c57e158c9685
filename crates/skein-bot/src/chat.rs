//! Chat log driver.
//!
//! An independent cursor-paged poller for the direct-message log. The
//! cursor starts empty and only moves when a page returns one; a cursorless
//! page means "caught up" and the stored cursor is kept for the next tick.
//!
//! Stopping cancels the driver's token, which unblocks the between-tick
//! wait promptly instead of letting it run to the next tick boundary.

use std::sync::Arc;
use std::time::Duration;

use skein_proto::{ChatItem, ChatLogEntry, ChatMessage, Did};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::bus::EventBus;
use crate::error::{ClassificationError, EventError};
use crate::events::BotEvent;
use crate::progress::PageCursor;
use crate::source::{ChatSource, EntityResolver};

/// Background driver for the direct-message log.
pub struct ChatDriver {
    source: Arc<dyn ChatSource>,
    resolver: Arc<dyn EntityResolver>,
    bus: Arc<EventBus>,
    identity: Arc<RwLock<Option<Did>>>,
    interval: Duration,
    cursor: PageCursor,
}

impl ChatDriver {
    pub fn new(
        source: Arc<dyn ChatSource>,
        resolver: Arc<dyn EntityResolver>,
        bus: Arc<EventBus>,
        identity: Arc<RwLock<Option<Did>>>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            resolver,
            bus,
            identity,
            interval,
            cursor: PageCursor::new(),
        }
    }

    /// Spawn the chat polling loop as a background task.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }

    async fn run(mut self, token: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "chat log poller started"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = interval.tick() => self.tick().await,
            }
        }

        debug!("chat log poller stopped");
    }

    async fn tick(&mut self) {
        let bot = { self.identity.read().await.clone() };
        let Some(bot) = bot else {
            trace!("no identity yet; dropping chat tick");
            return;
        };

        let page = match self.source.chat_log(self.cursor.get()).await {
            Ok(page) => page,
            Err(e) => {
                debug!(error = %e, "chat log fetch failed");
                self.bus
                    .emit(BotEvent::Error(EventError::transport("chat log poll", e)));
                return;
            }
        };

        self.cursor.advance(page.cursor);

        for entry in page.logs {
            self.handle_entry(entry, &bot).await;
        }
    }

    async fn handle_entry(&self, entry: ChatLogEntry, bot: &Did) {
        match entry {
            ChatLogEntry::CreateMessage { convo_id, message } => match message {
                ChatItem::MessageView(view) => {
                    if &view.sender.did == bot {
                        return;
                    }
                    match self.resolver.profile(&view.sender.did).await {
                        Ok(sender) => self.bus.emit(BotEvent::Message(ChatMessage {
                            id: view.id,
                            convo_id,
                            text: view.text,
                            sender,
                            sent_at: view.sent_at,
                        })),
                        Err(e) => self.bus.emit(BotEvent::Error(EventError::Hydration {
                            reference: view.sender.did.to_string(),
                            source: e,
                        })),
                    }
                }
                ChatItem::DeletedMessageView { .. } => {}
                ChatItem::Unknown => self.bus.emit(BotEvent::Error(EventError::Classification(
                    ClassificationError::new("unrecognized chat message shape", None),
                ))),
            },
            ChatLogEntry::DeleteMessage { .. } => {}
            ChatLogEntry::Unknown => self.bus.emit(BotEvent::Error(EventError::Classification(
                ClassificationError::new("unrecognized chat log entry", None),
            ))),
        }
    }
}
