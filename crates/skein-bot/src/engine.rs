//! The event engine facade.
//!
//! [`EventEngine`] ties the pieces together: it owns the bus, the identity
//! slot, and one [`DriverHandle`] per background driver, and decides which
//! driver a listener registration should start.
//!
//! The engine is inert at construction. The first `on()` call for a kind
//! starts the driver that serves it; `stop()` and `remove_all_listeners()`
//! tear the drivers down again, discarding watermark and cursor state.
//!
//! ## Lifecycle policy
//!
//! Drivers run until explicitly stopped. Removing listeners with `off()` -
//! even down to zero - leaves the drivers running; only `stop()` and
//! `remove_all_listeners()` stop them. Re-registering after a stop starts
//! the drivers fresh: the polling watermark re-baselines, so items that
//! arrived while stopped are not replayed.
//!
//! ## Identity precondition
//!
//! Until [`EventEngine::set_identity`] installs the bot's own DID, every
//! driver drops its input silently - no events, no errors. Hosts call it
//! once a session is established and the own-profile is resolved.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use skein_proto::Did;
use tokio::sync::RwLock;

use crate::bus::{EventBus, ListenerId};
use crate::chat::ChatDriver;
use crate::config::{EngineConfig, Strategy};
use crate::error::EngineError;
use crate::events::{BotEvent, DriverKind, EventKind};
use crate::firehose::FirehoseDriver;
use crate::lifecycle::DriverHandle;
use crate::polling::PollingDriver;
use crate::progress::Watermark;
use crate::source::{ChatSource, CommitSource, EntityResolver, NotificationSource};

/// The injected remote capabilities an engine runs against.
///
/// A real host wires these to its XRPC client and entity cache; tests wire
/// them to the fakes in [`crate::testing`].
#[derive(Clone)]
pub struct EngineSources {
    pub notifications: Arc<dyn NotificationSource>,
    pub commits: Arc<dyn CommitSource>,
    pub chat: Arc<dyn ChatSource>,
    pub resolver: Arc<dyn EntityResolver>,
}

/// The event engine: turns remote activity into typed bot events.
pub struct EventEngine {
    config: EngineConfig,
    sources: EngineSources,
    bus: Arc<EventBus>,
    identity: Arc<RwLock<Option<Did>>>,
    main_driver: DriverHandle,
    chat_driver: DriverHandle,
    /// When the engine was built; the default watermark origin.
    constructed_at: DateTime<Utc>,
    /// Whether the main driver has ever been started.
    started_once: AtomicBool,
}

impl EventEngine {
    /// Create an engine with default configuration.
    pub fn new(sources: EngineSources) -> Self {
        Self::build(sources, EngineConfig::default())
    }

    /// Create an engine with the given configuration.
    pub fn with_config(sources: EngineSources, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self::build(sources, config))
    }

    fn build(sources: EngineSources, config: EngineConfig) -> Self {
        let bus = Arc::new(EventBus::new(config.channel_capacity));
        Self {
            config,
            sources,
            bus,
            identity: Arc::new(RwLock::new(None)),
            main_driver: DriverHandle::new(),
            chat_driver: DriverHandle::new(),
            constructed_at: Utc::now(),
            started_once: AtomicBool::new(false),
        }
    }

    /// Install the bot's own DID, unlocking classification.
    ///
    /// Called by the host once a session exists and the own-profile has
    /// resolved. Until then drivers drop their input silently.
    pub async fn set_identity(&self, did: Did) {
        *self.identity.write().await = Some(did);
    }

    /// The installed identity, if any.
    pub async fn identity(&self) -> Option<Did> {
        self.identity.read().await.clone()
    }

    /// Register a callback for an event kind, lazily starting the driver
    /// that serves it.
    ///
    /// The listener is attached before the driver is started, so no event
    /// can fire ahead of the registration. Fails synchronously when events
    /// are disabled in the configuration - there is no driver to report
    /// through.
    pub fn on<F>(&self, kind: EventKind, f: F) -> Result<ListenerId, EngineError>
    where
        F: Fn(BotEvent) + Send + Sync + 'static,
    {
        if !self.config.enable_events {
            return Err(EngineError::EventsDisabled);
        }
        let id = self.bus.on(kind, f);
        self.ensure_driver(kind.driver());
        Ok(id)
    }

    /// Remove one listener. The driver keeps running; see the lifecycle
    /// policy above.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.bus.off(kind, id)
    }

    /// Clear listeners - all of them, or one kind's - and forcibly stop the
    /// background drivers.
    pub async fn remove_all_listeners(&self, kind: Option<EventKind>) {
        self.bus.clear(kind);
        self.stop().await;
    }

    /// Stop both drivers. After this returns no new tick starts; a tick
    /// already in flight finishes (and may still emit) first.
    pub async fn stop(&self) {
        self.main_driver.stop().await;
        self.chat_driver.stop().await;
    }

    /// Whether any background driver currently exists.
    pub fn is_running(&self) -> bool {
        self.main_driver.is_running() || self.chat_driver.is_running()
    }

    /// Whether any callback is registered for `kind`.
    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.bus.has_listeners(kind)
    }

    /// Subscribe to the broadcast tap: every emitted event, no lifecycle
    /// effect. See [`EventBus::subscribe`].
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<BotEvent> {
        self.bus.subscribe()
    }

    /// The broadcast tap as an async stream.
    pub fn event_stream(
        &self,
    ) -> std::pin::Pin<Box<dyn futures::Stream<Item = BotEvent> + Send>> {
        self.bus.event_stream()
    }

    fn ensure_driver(&self, driver: DriverKind) {
        match driver {
            DriverKind::Main => {
                self.main_driver.start(|token| {
                    let task = match self.config.strategy {
                        Strategy::Polling => PollingDriver::new(
                            Arc::clone(&self.sources.notifications),
                            Arc::clone(&self.sources.resolver),
                            Arc::clone(&self.bus),
                            Arc::clone(&self.identity),
                            self.config.poll_interval,
                            self.starting_watermark(),
                        )
                        .spawn(token),
                        Strategy::Firehose => FirehoseDriver::new(
                            Arc::clone(&self.sources.commits),
                            Arc::clone(&self.sources.resolver),
                            Arc::clone(&self.bus),
                            Arc::clone(&self.identity),
                            self.config.relay_url.clone(),
                        )
                        .spawn(token),
                    };
                    self.started_once.store(true, Ordering::Release);
                    task
                });
            }
            DriverKind::Chat => {
                self.chat_driver.start(|token| {
                    ChatDriver::new(
                        Arc::clone(&self.sources.chat),
                        Arc::clone(&self.sources.resolver),
                        Arc::clone(&self.bus),
                        Arc::clone(&self.identity),
                        self.config.chat_poll_interval,
                    )
                    .spawn(token)
                });
            }
        }
    }

    /// The watermark a (re)started polling driver begins from.
    ///
    /// A caller-supplied instant always wins. Otherwise the first start
    /// baselines at construction time, and a restart after `stop()`
    /// baselines at the restart instant - stopped periods are not replayed.
    fn starting_watermark(&self) -> Watermark {
        match self.config.starting_watermark {
            Some(instant) => Watermark::starting_at(instant),
            None if !self.started_once.load(Ordering::Acquire) => {
                Watermark::starting_at(self.constructed_at)
            }
            None => Watermark::now(),
        }
    }
}
