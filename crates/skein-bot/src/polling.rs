//! Notification polling driver.
//!
//! Polls the notification list on a fixed interval and feeds fresh items
//! through the classifier. Freshness is decided by a [`Watermark`]: only
//! items indexed strictly after it count, and it advances *before* the
//! batch is classified so a mid-batch failure cannot re-deliver the head
//! item on the next tick.
//!
//! Items within a tick are classified in the order the source returns them
//! (newest first). The engine does not normalize this to chronological
//! order; consumers needing strict ordering should sort on `indexed_at`.

use std::sync::Arc;
use std::time::Duration;

use skein_proto::Did;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::bus::EventBus;
use crate::classifier::{ClassifyContext, classify_notification};
use crate::error::EventError;
use crate::events::BotEvent;
use crate::hydrate::hydrate_drafts;
use crate::progress::Watermark;
use crate::source::{EntityResolver, NotificationSource};

/// Background driver for the polled notification feed.
pub struct PollingDriver {
    source: Arc<dyn NotificationSource>,
    resolver: Arc<dyn EntityResolver>,
    bus: Arc<EventBus>,
    identity: Arc<RwLock<Option<Did>>>,
    interval: Duration,
    watermark: Watermark,
}

impl PollingDriver {
    pub fn new(
        source: Arc<dyn NotificationSource>,
        resolver: Arc<dyn EntityResolver>,
        bus: Arc<EventBus>,
        identity: Arc<RwLock<Option<Did>>>,
        interval: Duration,
        watermark: Watermark,
    ) -> Self {
        Self {
            source,
            resolver,
            bus,
            identity,
            interval,
            watermark,
        }
    }

    /// Spawn the polling loop as a background task.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }

    async fn run(mut self, token: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "notification poller started"
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

        debug!("notification poller stopped");
    }

    /// One poll cycle. Failures are emitted as `error` events; the cycle
    /// never propagates them, so the loop always reaches the next tick.
    async fn tick(&mut self) {
        let bot = { self.identity.read().await.clone() };
        let Some(bot) = bot else {
            trace!("no identity yet; dropping poll tick");
            return;
        };

        let notifications = match self.source.list_notifications().await {
            Ok(list) => list,
            Err(e) => {
                debug!(error = %e, "notification fetch failed");
                self.bus
                    .emit(BotEvent::Error(EventError::transport("notification poll", e)));
                return;
            }
        };

        let fresh: Vec<_> = notifications
            .iter()
            .filter(|n| self.watermark.is_new(n.indexed_at))
            .collect();
        if fresh.is_empty() {
            return;
        }

        // Advance before classifying: the head item must never be
        // re-delivered even if classification below fails.
        if let Some(newest) = fresh.iter().map(|n| n.indexed_at).max() {
            self.watermark.advance(newest);
        }

        debug!(count = fresh.len(), "classifying fresh notifications");

        let listened = self.bus.listened_kinds();
        let ctx = ClassifyContext {
            bot: &bot,
            listened: &listened,
        };

        for notification in fresh {
            match classify_notification(notification, &ctx) {
                Ok(drafts) => {
                    if drafts.is_empty() {
                        continue;
                    }
                    for event in hydrate_drafts(self.resolver.as_ref(), drafts).await {
                        match event {
                            Ok(event) => self.bus.emit(event),
                            Err(e) => self.bus.emit(BotEvent::Error(e)),
                        }
                    }
                }
                Err(e) => self
                    .bus
                    .emit(BotEvent::Error(EventError::Classification(e))),
            }
        }
    }
}
