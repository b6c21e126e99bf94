//! Event channel adapter: owns the single connection to the game server.
//!
//! [`EventChannelAdapter`] opens the transport through a [`Connector`],
//! spawns background reader/writer tasks, and republishes everything it sees
//! through an [`EventRegistry`] so that several consumers can subscribe
//! without touching the transport.
//!
//! Lifecycle:
//! - [`connect`](EventChannelAdapter::connect) is idempotent and returns
//!   immediately; the outcome arrives as a `connect` or `error` event.
//! - An unexpected disconnect or a failed connect schedules a reconnection
//!   after `min(base * attempt, max)`; once the attempt budget is spent an
//!   `error` event reports it and the adapter stays offline until the next
//!   explicit `connect()`.
//! - [`disconnect`](EventChannelAdapter::disconnect) spends the budget so no
//!   reconnection follows, and releases the transport.
//!
//! Every method that spawns work must be called from within a tokio runtime.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use quiz_core::protocol::{ClientEvent, decode_server_frame};
use quiz_core::transport::{Connector, Transport, TransportError, TransportReader, TransportWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::ChannelConfig;
use crate::error::{ChannelError, ClientError, Result};
use crate::reconnect::{ReconnectDecision, ReconnectState};
use crate::registry::{ChannelEvent, DisconnectReason, EventKind, EventRegistry, HandlerId};

// ---------------------------------------------------------------------------
// Capability surface
// ---------------------------------------------------------------------------

/// What a session controller may do with the channel: subscribe, check
/// connectivity, and emit. It never sees the transport.
pub trait GameChannel: Send + Sync + 'static {
    /// Open the connection if it is not already open or opening.
    fn connect(&self);

    fn is_connected(&self) -> bool;

    fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static;

    fn off(&self, kind: EventKind, id: HandlerId) -> bool;

    /// Send an event upstream. Fails with [`ClientError::NotConnected`] when
    /// the channel is down; nothing is queued in that case.
    fn emit(&self, event: ClientEvent) -> Result<()>;

    fn join_game(&self, user_id: &str) -> Result<()> {
        self.emit(ClientEvent::JoinGame {
            user_id: user_id.to_string(),
        })
    }

    fn start_game(&self) -> Result<()> {
        self.emit(ClientEvent::StartGame)
    }

    fn stop_game(&self) -> Result<()> {
        self.emit(ClientEvent::StopGame)
    }

    fn submit_answer(&self, question_id: &str, answer: &str, user_id: &str) -> Result<()> {
        self.emit(ClientEvent::Answer {
            question_id: question_id.to_string(),
            user_id: user_id.to_string(),
            answer: answer.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Connection bookkeeping shared between the handle and its tasks.
#[derive(Default)]
struct Link {
    connected: bool,
    connecting: bool,
    /// Bumped for every connection attempt and on `disconnect()`. Tasks that
    /// belong to an older generation leave the link alone.
    generation: u64,
    reconnect: ReconnectState,
    outgoing: Option<mpsc::UnboundedSender<ClientEvent>>,
    connection_task: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
}

struct Inner<C> {
    connector: C,
    config: ChannelConfig,
    registry: EventRegistry,
    link: Mutex<Link>,
}

/// Cheaply cloneable handle to one logical game channel connection.
pub struct EventChannelAdapter<C: Connector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for EventChannelAdapter<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> fmt::Debug for EventChannelAdapter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let link = self.inner.lock();
        f.debug_struct("EventChannelAdapter")
            .field("url", &self.inner.config.channel_url())
            .field("connected", &link.connected)
            .field("reconnect_attempts", &link.reconnect.attempts())
            .field("registry", &self.inner.registry)
            .finish()
    }
}

impl<C: Connector> EventChannelAdapter<C> {
    /// Create an adapter. No connection is opened until [`connect`](Self::connect).
    pub fn new(connector: C, config: ChannelConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                config,
                registry: EventRegistry::new(),
                link: Mutex::new(Link::default()),
            }),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    /// Open the connection. No-op while connected or while an attempt is in
    /// flight. Otherwise the reconnection budget starts over, which is how a
    /// caller recovers after it was exhausted or after `disconnect()`.
    pub fn connect(&self) {
        let mut link = self.inner.lock();
        if link.connected || link.connecting {
            return;
        }
        link.reconnect.reset();
        Inner::start_attempt(&self.inner, &mut link);
    }

    /// Close the connection and suppress automatic reconnection. Idempotent.
    pub fn disconnect(&self) {
        let (was_connected, connection_task, reconnect_timer) = {
            let mut link = self.inner.lock();
            link.reconnect.suppress(&self.inner.config);
            link.generation += 1;
            let was_connected = link.connected;
            link.connected = false;
            link.connecting = false;
            link.outgoing = None;
            (
                was_connected,
                link.connection_task.take(),
                link.reconnect_timer.take(),
            )
        };

        if let Some(task) = connection_task {
            task.abort();
        }
        if let Some(timer) = reconnect_timer {
            timer.abort();
        }

        if was_connected {
            tracing::info!("disconnected by client");
            self.inner.registry.dispatch(&ChannelEvent::Disconnect {
                reason: DisconnectReason::ClientDisconnect,
            });
        }
    }

    /// Drop every subscriber, then disconnect.
    pub fn destroy(&self) {
        self.inner.registry.clear();
        self.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.lock().reconnect.attempts()
    }

    /// Whether a reconnection attempt is scheduled and has not fired yet.
    pub fn reconnect_pending(&self) -> bool {
        self.inner
            .lock()
            .reconnect_timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        self.inner.registry.on(kind, handler)
    }

    pub fn off(&self, kind: EventKind, id: HandlerId) -> bool {
        self.inner.registry.off(kind, id)
    }

    /// Number of local subscribers for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner.registry.count(kind)
    }

    pub fn emit(&self, event: ClientEvent) -> Result<()> {
        let link = self.inner.lock();
        if !link.connected {
            return Err(ClientError::NotConnected);
        }
        let tx = link.outgoing.as_ref().ok_or(ClientError::NotConnected)?;
        let name = event.name();
        tx.send(event).map_err(|_| ClientError::NotConnected)?;
        tracing::debug!(event = name, "emitted");
        Ok(())
    }
}

impl<C: Connector> GameChannel for EventChannelAdapter<C> {
    fn connect(&self) {
        EventChannelAdapter::connect(self);
    }

    fn is_connected(&self) -> bool {
        EventChannelAdapter::is_connected(self)
    }

    fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        EventChannelAdapter::on(self, kind, handler)
    }

    fn off(&self, kind: EventKind, id: HandlerId) -> bool {
        EventChannelAdapter::off(self, kind, id)
    }

    fn emit(&self, event: ClientEvent) -> Result<()> {
        EventChannelAdapter::emit(self, event)
    }
}

// ---------------------------------------------------------------------------
// Background work
// ---------------------------------------------------------------------------

impl<C: Connector> Inner<C> {
    fn lock(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    /// Spawn a new connection task, superseding any previous one.
    fn start_attempt(this: &Arc<Self>, link: &mut Link) {
        link.generation += 1;
        link.connecting = true;
        if let Some(old) = link.connection_task.take() {
            old.abort();
        }
        if let Some(timer) = link.reconnect_timer.take() {
            timer.abort();
        }
        let generation = link.generation;
        let inner = Arc::clone(this);
        link.connection_task = Some(tokio::spawn(async move {
            inner.run_connection(generation).await;
        }));
    }

    async fn run_connection(self: Arc<Self>, generation: u64) {
        let url = self.config.channel_url();
        tracing::debug!(%url, "connecting");

        let attempt = tokio::time::timeout(self.config.connect_timeout, self.connector.connect(&url));
        let transport = match attempt.await {
            Ok(Ok(transport)) => transport,
            Ok(Err(e)) => return self.on_connect_error(generation, e),
            Err(_) => return self.on_connect_error(generation, TransportError::Timeout),
        };

        let (mut reader, writer) = transport.split();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        {
            let mut link = self.lock();
            if link.generation != generation {
                return;
            }
            link.connected = true;
            link.connecting = false;
            link.reconnect.on_connected();
            link.outgoing = Some(cmd_tx);
        }
        let mut writer_task = tokio::spawn(write_loop(writer, cmd_rx));

        tracing::info!(%url, "connected");
        self.registry.dispatch(&ChannelEvent::Connect);

        // Either half failing ends the connection.
        let failure = loop {
            if !self.is_current(generation) {
                writer_task.abort();
                return;
            }
            tokio::select! {
                read = reader.recv() => match read {
                    Ok(Some(frame)) => self.dispatch_frame(&frame),
                    Ok(None) => break None,
                    Err(e) => break Some(e),
                },
                written = &mut writer_task => match written {
                    Ok(Err(e)) => break Some(e),
                    Err(e) => break Some(TransportError::Io(e.to_string())),
                    // The command sender is only dropped once this
                    // generation is torn down.
                    Ok(Ok(())) => return,
                },
            }
        };

        writer_task.abort();
        self.on_connection_lost(generation, failure);
    }

    fn dispatch_frame(&self, frame: &str) {
        match decode_server_frame(frame) {
            Ok(event) => {
                tracing::debug!(event = event.name(), "received");
                self.registry.dispatch(&ChannelEvent::Server(event));
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame");
                self.registry.dispatch(&ChannelEvent::Error {
                    error: ChannelError::MalformedFrame(e.to_string()),
                });
            }
        }
    }

    fn on_connect_error(self: Arc<Self>, generation: u64, err: TransportError) {
        {
            let mut link = self.lock();
            if link.generation != generation {
                return;
            }
            link.connecting = false;
            link.connected = false;
            link.outgoing = None;
        }
        tracing::warn!(error = %err, "connect error");
        self.registry.dispatch(&ChannelEvent::Error {
            error: ChannelError::ConnectFailed(err),
        });
        self.schedule_reconnect(generation);
    }

    /// `failure` is `None` when the server closed the connection cleanly.
    fn on_connection_lost(self: Arc<Self>, generation: u64, failure: Option<TransportError>) {
        {
            let mut link = self.lock();
            if link.generation != generation {
                return;
            }
            link.connected = false;
            link.connecting = false;
            link.outgoing = None;
        }
        let reason = match &failure {
            Some(e) => DisconnectReason::TransportError(e.to_string()),
            None => DisconnectReason::ServerClosed,
        };
        tracing::info!(%reason, "disconnected");
        self.registry.dispatch(&ChannelEvent::Disconnect { reason });
        if let Some(e) = failure {
            self.registry.dispatch(&ChannelEvent::Error {
                error: ChannelError::ConnectionLost(e),
            });
        }
        self.schedule_reconnect(generation);
    }

    fn schedule_reconnect(self: Arc<Self>, generation: u64) {
        let decision = {
            let mut link = self.lock();
            if link.generation != generation {
                return;
            }
            let decision = link.reconnect.on_connection_lost(&self.config);
            if let ReconnectDecision::Retry { delay, .. } = decision {
                if let Some(old) = link.reconnect_timer.take() {
                    old.abort();
                }
                let inner = Arc::clone(&self);
                link.reconnect_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    inner.reconnect_now(generation);
                }));
            }
            decision
        };

        match decision {
            ReconnectDecision::Retry { attempt, delay } => {
                tracing::warn!(
                    attempt,
                    max = self.config.max_reconnect_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "scheduling reconnection"
                );
            }
            ReconnectDecision::GiveUp { attempts } => {
                tracing::error!(attempts, "giving up on reconnection");
                self.registry.dispatch(&ChannelEvent::Error {
                    error: ChannelError::ReconnectExhausted { attempts },
                });
            }
        }
    }

    fn reconnect_now(self: Arc<Self>, generation: u64) {
        let mut link = self.lock();
        if link.generation != generation || link.connected || link.connecting {
            return;
        }
        // This task is the timer; dropping its own handle does not abort it.
        link.reconnect_timer = None;
        Self::start_attempt(&self, &mut link);
    }
}

/// Drain outgoing events into the transport. Returns `Ok` once the command
/// sender is dropped and the first write error otherwise.
async fn write_loop<W: TransportWriter>(
    mut writer: W,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientEvent>,
) -> std::result::Result<(), TransportError> {
    while let Some(event) = cmd_rx.recv().await {
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, event = event.name(), "failed to encode event");
                continue;
            }
        };
        if let Err(e) = writer.send(&frame).await {
            tracing::warn!(error = %e, event = event.name(), "write failed");
            return Err(e);
        }
    }
    Ok(())
}
