//! The dispatch loop.
//!
//! A [`Bot`] is assembled once (command handlers, periodic tasks, background
//! functions, authorized chats) and then [`run`](Bot::run) merges four
//! sources into one serialized stream of sends:
//!
//! ```text
//!  cancellation ─┐
//!  base ticker  ─┼──► select! ──► retry_till_cancelled(transport.send)
//!  inbound cmd  ─┤
//!  background   ─┘
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use meerkat_core::OutboundEvent;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Shutdown;
use crate::periodic::{BASE_PERIOD, PeriodicTaskDef, TaskFunction};
use crate::retry::{RETRY_INTERVAL, retry_till_cancelled};
use crate::transport::{ChatTransport, InboundMessage};

/// Capacity of the channel shared by all background functions.
pub const BACKGROUND_EVENTS_CAPACITY: usize = 10;

/// Answers one chat command. The reply is sent back to the chat it came from.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(
        &self,
        message: &InboundMessage,
        cancel: &CancellationToken,
    ) -> anyhow::Result<OutboundEvent>;
}

/// Long-running producer of background events, e.g. a directory monitor.
pub type BackgroundFunction =
    Box<dyn FnOnce(CancellationToken, mpsc::Sender<OutboundEvent>) -> BoxFuture<'static, ()> + Send>;

pub struct Bot<T> {
    dispatcher: Dispatcher<T>,
    background: Vec<BackgroundFunction>,
}

/// Everything the loop needs once the background functions are started.
struct Dispatcher<T> {
    runtime: String,
    transport: T,
    authorized: Vec<i64>,
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
    periodic_tasks: Vec<PeriodicTaskDef>,
    tick: u64,
    base_period: Duration,
    retry_interval: Duration,
    cancel: CancellationToken,
}

impl<T: ChatTransport> Bot<T> {
    pub fn new(
        runtime: impl Into<String>,
        transport: T,
        authorized: Vec<i64>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            dispatcher: Dispatcher {
                runtime: runtime.into(),
                transport,
                authorized,
                handlers: HashMap::new(),
                periodic_tasks: Vec::new(),
                tick: 0,
                base_period: BASE_PERIOD,
                retry_interval: RETRY_INTERVAL,
                cancel,
            },
            background: Vec::new(),
        }
    }

    /// Overrides the tick period. Call before adding periodic tasks, whose
    /// intervals are converted to ticks when added.
    pub fn with_base_period(mut self, period: Duration) -> Self {
        self.dispatcher.base_period = period;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.dispatcher.retry_interval = interval;
        self
    }

    pub fn add_handler(&mut self, command: impl Into<String>, handler: impl CommandHandler + 'static) {
        let command = command.into();
        info!("📡 Telegram: registered handler for {}", command);
        self.dispatcher.handlers.insert(command, Arc::new(handler));
    }

    pub fn add_periodic_task(
        &mut self,
        interval: Duration,
        intro: impl Into<String>,
        function: impl TaskFunction + 'static,
    ) {
        let base = self.dispatcher.base_period;
        let task = PeriodicTaskDef::new(interval, base, intro, Arc::new(function));
        info!(
            "📡 Telegram: added periodic task every {} tick(s) of {:?}",
            task.interval(), base
        );
        self.dispatcher.periodic_tasks.push(task);
    }

    pub fn add_background_task<F, Fut>(&mut self, task: F)
    where
        F: FnOnce(CancellationToken, mpsc::Sender<OutboundEvent>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.background
            .push(Box::new(move |cancel, events| task(cancel, events).boxed()));
    }

    /// Runs until the shared cancellation fires and returns how it ended.
    pub async fn run(self, mut updates: mpsc::Receiver<InboundMessage>) -> Shutdown {
        let Self {
            mut dispatcher,
            background: functions,
        } = self;
        let cancel = dispatcher.cancel.clone();

        // 1. Start background functions on a shared event channel
        let (events_tx, mut events) = mpsc::channel(BACKGROUND_EVENTS_CAPACITY);
        let mut background = JoinSet::new();
        for function in functions {
            background.spawn(function(cancel.clone(), events_tx.clone()));
        }
        drop(events_tx);

        // 2. Multiplex
        let period = dispatcher.base_period;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut updates_open = true;
        let mut events_open = true;

        info!("📡 Telegram: dispatch loop running ({})", dispatcher.runtime);
        let status = loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Shutdown::Cancelled { runtime: dispatcher.runtime.clone() },
                _ = ticker.tick() => dispatcher.on_tick().await,
                update = updates.recv(), if updates_open => match update {
                    Some(message) => dispatcher.on_command(message).await,
                    None => {
                        warn!("📡 Telegram: update stream closed");
                        updates_open = false;
                        Ok(())
                    }
                },
                event = events.recv(), if events_open => match event {
                    Some(event) => dispatcher.on_background_event(event).await,
                    None => {
                        debug!("📡 Telegram: all background functions finished");
                        events_open = false;
                        Ok(())
                    }
                },
            };
            if let Err(shutdown) = step {
                break shutdown;
            }
        };

        // 3. Unblock producers still waiting on the channel, then join them
        drop(events);
        while let Some(joined) = background.join_next().await {
            if let Err(e) = joined {
                error!("📡 Telegram: background function failed: {}", e);
            }
        }
        info!("📡 Telegram: {}", status);
        status
    }
}

impl<T: ChatTransport> Dispatcher<T> {
    async fn on_tick(&mut self) -> Result<(), Shutdown> {
        self.tick += 1;
        for task in &self.periodic_tasks {
            if !task.is_due(self.tick) {
                continue;
            }
            let report = task.function.report(&self.cancel).await;
            if report.is_empty() {
                continue;
            }
            let message = task.message(&report);
            for chat in &self.authorized {
                let mut event = OutboundEvent::text(message.as_str());
                event.set_destination(*chat);
                self.send_with_retry(&event).await?;
            }
        }
        Ok(())
    }

    async fn on_command(&self, message: InboundMessage) -> Result<(), Shutdown> {
        if !self.authorized.contains(&message.chat_id) {
            info!(
                "📡 Telegram: ignoring message from unauthorized chat {}",
                message.chat_id
            );
            return Ok(());
        }

        // Only the first word selects the handler; "/temp now" runs /temp and
        // the handler sees the full text.
        let command = command_token(&message.text);
        let Some(handler) = self.handlers.get(command) else {
            debug!("📡 Telegram: no handler for {:?}", command);
            return Ok(());
        };

        info!("📩 [Telegram] {} from {}", command, message.chat_id);
        let reply = match handler.handle(&message, &self.cancel).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("📡 Telegram: {} handler failed: {}", command, e);
                return Ok(());
            }
        };

        let mut reply = Delivery(reply);
        reply.set_destination(message.chat_id);
        self.send_with_retry(&reply).await
    }

    async fn on_background_event(&self, event: OutboundEvent) -> Result<(), Shutdown> {
        let event = Delivery(event);
        info!("📡 Telegram: background {} event", event.kind());
        for chat in &self.authorized {
            let mut copy = Delivery(event.clone());
            copy.set_destination(*chat);
            self.send_with_retry(&copy).await?;
        }
        Ok(())
    }

    async fn send_with_retry(&self, event: &OutboundEvent) -> Result<(), Shutdown> {
        retry_till_cancelled(&self.cancel, self.retry_interval, &self.runtime, || {
            self.transport.send(event)
        })
        .await
    }
}

/// Command lookup key: the first word, without any `@botname` suffix.
fn command_token(text: &str) -> &str {
    let word = text.split_whitespace().next().unwrap_or_default();
    word.split('@').next().unwrap_or_default()
}

/// Releases the wrapped event's payload when dropped, whether the send
/// succeeded, failed, or was abandoned on cancellation.
struct Delivery(OutboundEvent);

impl Deref for Delivery {
    type Target = OutboundEvent;

    fn deref(&self) -> &OutboundEvent {
        &self.0
    }
}

impl DerefMut for Delivery {
    fn deref_mut(&mut self) -> &mut OutboundEvent {
        &mut self.0
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        self.0.release();
    }
}
