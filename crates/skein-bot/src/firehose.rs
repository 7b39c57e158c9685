//! Commit-stream driver.
//!
//! Maintains a live subscription to the network-wide commit feed and
//! classifies `create` ops as they arrive. There is no watermark: position
//! is the stream's own. Transport `open`/`error` items are re-emitted at
//! the bot level unchanged; a closed stream is re-opened with exponential
//! backoff, reset after the next successful open.
//!
//! Commits arriving before the engine has an identity are dropped, not
//! queued.

use std::sync::Arc;
use std::time::Duration;

use skein_proto::{CommitEvent, Did, OpAction};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::bus::EventBus;
use crate::classifier::{ClassifyContext, classify_record};
use crate::error::{ClassificationError, EventError};
use crate::events::BotEvent;
use crate::hydrate::hydrate_drafts;
use crate::source::{CommitSource, EntityResolver, StreamItem};

/// Reconnect backoff: 2^(n-1) seconds after the n-th consecutive failure,
/// capped at 64 seconds.
#[derive(Debug)]
struct ReconnectState {
    consecutive_failures: u32,
}

impl ReconnectState {
    fn new() -> Self {
        Self {
            consecutive_failures: 0,
        }
    }

    fn backoff_duration(&self) -> Duration {
        let exponent = self.consecutive_failures.saturating_sub(1).min(6);
        Duration::from_secs(2u64.pow(exponent))
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }
}

/// Background driver for the live commit stream.
pub struct FirehoseDriver {
    source: Arc<dyn CommitSource>,
    resolver: Arc<dyn EntityResolver>,
    bus: Arc<EventBus>,
    identity: Arc<RwLock<Option<Did>>>,
    endpoint: String,
}

impl FirehoseDriver {
    pub fn new(
        source: Arc<dyn CommitSource>,
        resolver: Arc<dyn EntityResolver>,
        bus: Arc<EventBus>,
        identity: Arc<RwLock<Option<Did>>>,
        endpoint: String,
    ) -> Self {
        Self {
            source,
            resolver,
            bus,
            identity,
            endpoint,
        }
    }

    /// Spawn the subscription loop as a background task.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }

    async fn run(self, token: CancellationToken) {
        info!(endpoint = %self.endpoint, "commit stream driver started");
        let mut reconnect = ReconnectState::new();

        'outer: loop {
            let mut subscription = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                result = self.source.subscribe(&self.endpoint) => match result {
                    Ok(subscription) => subscription,
                    Err(e) => {
                        warn!(error = %e, "commit stream connect failed");
                        self.bus.emit(BotEvent::Error(EventError::transport(
                            "commit stream connect",
                            e,
                        )));
                        reconnect.record_failure();
                        if !wait_backoff(&token, &reconnect).await {
                            break;
                        }
                        continue;
                    }
                },
            };

            loop {
                let item = tokio::select! {
                    biased;
                    _ = token.cancelled() => break 'outer,
                    item = subscription.next() => item,
                };

                match item {
                    StreamItem::Open => {
                        debug!("commit stream open");
                        reconnect.record_success();
                        self.bus.emit(BotEvent::Open);
                    }
                    StreamItem::Commit(commit) => self.handle_commit(commit).await,
                    StreamItem::Error(e) => {
                        debug!(error = %e, "commit stream error");
                        self.bus
                            .emit(BotEvent::Error(EventError::transport("commit stream", e)));
                    }
                    StreamItem::Closed => {
                        debug!("commit stream closed");
                        self.bus.emit(BotEvent::Close);
                        reconnect.record_failure();
                        break;
                    }
                }
            }

            if !wait_backoff(&token, &reconnect).await {
                break;
            }
        }

        debug!("commit stream driver stopped");
    }

    /// Classify the `create` ops of one commit batch, in op order.
    async fn handle_commit(&self, commit: CommitEvent) {
        let bot = { self.identity.read().await.clone() };
        let Some(bot) = bot else {
            trace!("no identity yet; dropping commit");
            return;
        };

        let listened = self.bus.listened_kinds();
        let ctx = ClassifyContext {
            bot: &bot,
            listened: &listened,
        };

        for op in &commit.ops {
            if op.action != OpAction::Create {
                continue;
            }

            let uri = match op.uri(&commit.repo) {
                Ok(uri) => uri,
                Err(e) => {
                    self.bus.emit(BotEvent::Error(EventError::Classification(
                        ClassificationError::new(
                            format!("bad record path {:?}: {e}", op.path),
                            op.record.clone(),
                        ),
                    )));
                    continue;
                }
            };

            let Some(record) = op.record.as_ref() else {
                self.bus.emit(BotEvent::Error(EventError::Classification(
                    ClassificationError::new(
                        format!("create op without a record at {uri}"),
                        None,
                    ),
                )));
                continue;
            };

            match classify_record(&uri, &commit.repo, record, &ctx) {
                Ok(drafts) => {
                    if drafts.is_empty() {
                        continue;
                    }
                    // One hydration pass per op: drafts that reference the
                    // same record share a single resolver call.
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

/// Sleep out the reconnect backoff. Returns `false` when cancelled.
async fn wait_backoff(token: &CancellationToken, reconnect: &ReconnectState) -> bool {
    let delay = reconnect.backoff_duration();
    debug!(delay_secs = delay.as_secs(), "reconnecting after backoff");
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
