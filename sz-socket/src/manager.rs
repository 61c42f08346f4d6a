//! Realtime channel manager.
//!
//! Owns one reconnecting channel to the hub's WebSocket endpoint. A single
//! driver task processes every command, transport event and retry timer
//! firing in turn, so state observed through the handle always reflects the
//! last event fully handled.
//!
//! Lifecycle guarantees:
//! - at most one live transport and one pending retry timer at a time
//! - reconnects follow only unintentional closes, bounded by the policy
//! - `disconnect`, `close` and dropping the handle all suppress retries
//! - events from abandoned connection attempts are ignored

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use sz_core::error::{SzError, SzResult};

use crate::auth::{authenticate_frame, IdentityProvider};
use crate::config::ChannelConfig;
use crate::events::{
    ChannelCallbacks, ChannelEvent, ChannelState, CloseInfo, EventDispatcher, Frame,
    InboundMessage,
};
use crate::reconnect::RetryTimer;
use crate::transport::{ConnectRequest, Transport, TransportEvent, TransportEvents, TransportFactory};
use crate::websocket::WebSocketFactory;

enum Command {
    Connect,
    Disconnect,
    Send {
        frame: Frame,
        reply: oneshot::Sender<SzResult<()>>,
    },
    Shutdown,
}

/// Builder for [`ChannelManager`].
pub struct ChannelBuilder {
    config: ChannelConfig,
    factory: Arc<dyn TransportFactory>,
    identity: Option<Arc<dyn IdentityProvider>>,
    callbacks: ChannelCallbacks,
    dispatcher: Option<EventDispatcher>,
}

impl ChannelBuilder {
    /// Use a custom transport instead of the default WebSocket one.
    pub fn transport(self, factory: impl TransportFactory + 'static) -> Self {
        self.shared_transport(Arc::new(factory))
    }

    pub fn shared_transport(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Identity source for the authentication handshake.
    pub fn identity(mut self, provider: impl IdentityProvider + 'static) -> Self {
        self.identity = Some(Arc::new(provider));
        self
    }

    pub fn callbacks(mut self, callbacks: ChannelCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Publish events on an existing dispatcher.
    pub fn dispatcher(mut self, dispatcher: EventDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Start the driver task. Must be called within a tokio runtime.
    pub fn spawn(self) -> ChannelManager {
        let dispatcher = self
            .dispatcher
            .unwrap_or_else(|| EventDispatcher::new(self.config.event_buffer));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ChannelState::Closed);
        let (last_message_tx, last_message_rx) = watch::channel(None);
        let endpoint = self.config.endpoint.clone();

        let driver = ChannelDriver {
            config: self.config,
            factory: self.factory,
            identity: self.identity,
            callbacks: self.callbacks,
            dispatcher: dispatcher.clone(),
            state_tx,
            last_message_tx,
            transport: None,
            generation: 0,
            reconnect_attempts: 0,
            retry: RetryTimer::default(),
            suppress_reconnect: false,
            events_tx,
            retry_tx,
        };
        let task = tokio::spawn(driver.run(command_rx, events_rx, retry_rx));

        ChannelManager {
            commands: command_tx,
            state_rx,
            last_message_rx,
            dispatcher,
            endpoint,
            driver: Some(task),
        }
    }
}

/// Handle to one reconnecting realtime channel.
///
/// Dropping the handle tears the channel down; [`close`](Self::close) does
/// the same and waits until the transport and timers are released.
pub struct ChannelManager {
    commands: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ChannelState>,
    last_message_rx: watch::Receiver<Option<InboundMessage>>,
    dispatcher: EventDispatcher,
    endpoint: Url,
    driver: Option<JoinHandle<()>>,
}

impl ChannelManager {
    /// Start configuring a channel using the default WebSocket transport.
    pub fn builder(config: ChannelConfig) -> ChannelBuilder {
        ChannelBuilder {
            config,
            factory: Arc::new(WebSocketFactory),
            identity: None,
            callbacks: ChannelCallbacks::default(),
            dispatcher: None,
        }
    }

    /// Spawn a channel with the default transport and no identity.
    pub fn spawn(config: ChannelConfig) -> Self {
        Self::builder(config).spawn()
    }

    /// Request a connection. Returns immediately; no-op while open.
    pub fn connect(&self) -> SzResult<()> {
        self.command(Command::Connect)
    }

    /// Close the connection and stop reconnecting. Idempotent.
    pub fn disconnect(&self) -> SzResult<()> {
        self.command(Command::Disconnect)
    }

    /// Send a frame. Dropped with [`SzError::NotOpen`] unless the channel is open.
    pub async fn send(&self, frame: Frame) -> SzResult<()> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Send { frame, reply })?;
        rx.await.map_err(|_| SzError::ChannelClosed)?
    }

    pub async fn send_text(&self, text: impl Into<String>) -> SzResult<()> {
        self.send(Frame::text(text)).await
    }

    pub async fn send_json<T: serde::Serialize>(&self, value: &T) -> SzResult<()> {
        self.send(Frame::json(value)?).await
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChannelState {
        *self.state_rx.borrow()
    }

    /// Subscribe to state changes.
    pub fn state_receiver(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    /// Wait until the channel reaches `target`.
    pub async fn wait_for_state(&self, target: ChannelState) -> SzResult<()> {
        let mut rx = self.state_rx.clone();
        rx.wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| SzError::ChannelClosed)
    }

    /// The most recent inbound frame, if any.
    pub fn last_message(&self) -> Option<InboundMessage> {
        self.last_message_rx.borrow().clone()
    }

    pub fn last_message_receiver(&self) -> watch::Receiver<Option<InboundMessage>> {
        self.last_message_rx.clone()
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ChannelEvent> {
        self.dispatcher.subscribe()
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Tear the channel down and wait for the driver to release everything.
    pub async fn close(mut self) -> SzResult<()> {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(task) = self.driver.take() {
            task.await
                .map_err(|e| SzError::Internal(format!("channel driver failed: {e}")))?;
        }
        Ok(())
    }

    fn command(&self, command: Command) -> SzResult<()> {
        self.commands.send(command).map_err(|_| SzError::ChannelClosed)
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

struct ChannelDriver {
    config: ChannelConfig,
    factory: Arc<dyn TransportFactory>,
    identity: Option<Arc<dyn IdentityProvider>>,
    callbacks: ChannelCallbacks,
    dispatcher: EventDispatcher,
    state_tx: watch::Sender<ChannelState>,
    last_message_tx: watch::Sender<Option<InboundMessage>>,
    transport: Option<Box<dyn Transport>>,
    /// Bumped on every connection attempt; events tagged otherwise are stale.
    generation: u64,
    reconnect_attempts: u32,
    retry: RetryTimer,
    /// Set by intentional teardown; cleared by an explicit connect.
    suppress_reconnect: bool,
    events_tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
    retry_tx: mpsc::UnboundedSender<u64>,
}

impl ChannelDriver {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<(u64, TransportEvent)>,
        mut retries: mpsc::UnboundedReceiver<u64>,
    ) {
        info!("channel for {} started", self.config.endpoint);
        if self.config.auto_connect {
            self.connect(true);
        }

        loop {
            tokio::select! {
                biased;
                command = commands.recv() => {
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Some((generation, event)) = events.recv() => {
                    self.handle_transport_event(generation, event);
                }
                Some(ticket) = retries.recv() => self.handle_retry(ticket),
            }
        }
        info!("channel for {} stopped", self.config.endpoint);
    }

    /// Returns false once the handle is gone or asked for shutdown.
    fn handle_command(&mut self, command: Option<Command>) -> bool {
        match command {
            Some(Command::Connect) => self.connect(true),
            Some(Command::Disconnect) => self.disconnect(),
            Some(Command::Send { frame, reply }) => {
                let _ = reply.send(self.send(frame));
            }
            Some(Command::Shutdown) | None => {
                self.disconnect();
                return false;
            }
        }
        true
    }

    fn state(&self) -> ChannelState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, new_state: ChannelState) {
        self.state_tx.send_if_modified(|state| {
            if *state == new_state {
                return false;
            }
            info!("channel state: {} -> {}", *state, new_state);
            *state = new_state;
            true
        });
    }

    /// `explicit` is false only for timer-driven reconnects.
    fn connect(&mut self, explicit: bool) {
        if self.state() == ChannelState::Open {
            debug!("already open, skipping connect");
            return;
        }
        if self.retry.cancel() {
            debug!("cancelled pending reconnect");
        }
        if explicit {
            self.suppress_reconnect = false;
            self.reconnect_attempts = 0;
        }
        if let Some(mut superseded) = self.transport.take() {
            debug!("closing superseded connection attempt {}", self.generation);
            superseded.close(CloseInfo::normal("superseded"));
        }

        self.generation += 1;
        self.set_state(ChannelState::Connecting);
        info!(
            "connecting to {} (attempt generation {})",
            self.config.endpoint, self.generation
        );

        let events = TransportEvents::new(self.generation, self.events_tx.clone());
        let request = ConnectRequest {
            endpoint: &self.config.endpoint,
            protocols: &self.config.protocols,
        };
        match self.factory.open(request, events) {
            Ok(transport) => self.transport = Some(transport),
            Err(e) => {
                error!("failed to create transport: {e}");
                self.on_error(e.to_string());
            }
        }
    }

    fn disconnect(&mut self) {
        self.suppress_reconnect = true;
        if self.retry.cancel() {
            debug!("cancelled pending reconnect");
        }

        match self.transport.take() {
            Some(mut transport) => {
                let info = CloseInfo::normal("client disconnect");
                transport.close(info.clone());
                self.set_state(ChannelState::Closed);
                info!("disconnected from {}", self.config.endpoint);
                self.callbacks.fire_close(&info);
                self.dispatcher.dispatch(ChannelEvent::Closed(info));
            }
            None => self.set_state(ChannelState::Closed),
        }
    }

    fn send(&mut self, frame: Frame) -> SzResult<()> {
        let state = self.state();
        match self.transport.as_mut() {
            Some(transport) if state == ChannelState::Open => transport.send(frame),
            _ => {
                warn!("dropping {}-byte frame: channel is {state}", frame.len());
                Err(SzError::NotOpen {
                    state: state.to_string(),
                })
            }
        }
    }

    fn handle_transport_event(&mut self, generation: u64, event: TransportEvent) {
        if generation != self.generation || self.transport.is_none() {
            debug!(
                "ignoring {event:?} from stale connection {generation} (current {})",
                self.generation
            );
            return;
        }

        match event {
            TransportEvent::Open => self.on_open(),
            TransportEvent::Message(frame) => self.on_message(frame),
            TransportEvent::Close(info) => {
                self.transport = None;
                self.on_close(info);
            }
            TransportEvent::Error(e) => self.on_error(e),
        }
    }

    fn on_open(&mut self) {
        self.set_state(ChannelState::Open);
        self.reconnect_attempts = 0;
        info!("connected to {}", self.config.endpoint);

        if self.config.auto_authenticate {
            self.authenticate();
        }
        self.callbacks.fire_open();
        self.dispatcher.dispatch(ChannelEvent::Opened);
    }

    /// Fire-and-forget; a lost handshake is re-sent on the next open.
    fn authenticate(&mut self) {
        let Some(provider) = &self.identity else {
            return;
        };
        let Some(identity) = provider.identity() else {
            debug!("no identity available, skipping handshake");
            return;
        };
        let Some(transport) = self.transport.as_mut() else {
            return;
        };

        match authenticate_frame(&identity).and_then(|frame| transport.send(frame)) {
            Ok(()) => info!("sent authenticate frame for user {}", identity.user_id),
            Err(e) => warn!("authentication handshake not sent: {e}"),
        }
    }

    fn on_message(&mut self, frame: Frame) {
        debug!("received {}-byte frame", frame.len());
        let message = InboundMessage::now(frame);
        self.last_message_tx.send_replace(Some(message.clone()));
        self.callbacks.fire_message(&message);
        self.dispatcher.dispatch(ChannelEvent::Message(message));
    }

    /// Errors end the current connection and funnel into the close path.
    fn on_error(&mut self, error: String) {
        warn!("channel error: {error}");
        self.callbacks.fire_error(&error);
        self.dispatcher.dispatch(ChannelEvent::Error(error.clone()));

        if let Some(mut transport) = self.transport.take() {
            transport.close(CloseInfo::abnormal(error.clone()));
        }
        self.on_close(CloseInfo::abnormal(error));
    }

    fn on_close(&mut self, info: CloseInfo) {
        self.set_state(ChannelState::Closed);
        info!("connection to {} closed: {info}", self.config.endpoint);
        self.callbacks.fire_close(&info);
        self.dispatcher.dispatch(ChannelEvent::Closed(info));

        if !self.suppress_reconnect {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        let policy = &self.config.reconnect;
        match policy.next_attempt(self.reconnect_attempts) {
            Some(attempt) => {
                self.reconnect_attempts = attempt;
                let delay = policy.delay_for(attempt);
                warn!(
                    "reconnect attempt {attempt}/{} in {:.1}s",
                    policy.max_attempts,
                    delay.as_secs_f64()
                );
                self.retry.schedule(delay, &self.retry_tx);
                self.dispatcher
                    .dispatch(ChannelEvent::ReconnectScheduled { attempt, delay });
            }
            None => {
                error!(
                    "max reconnect attempts ({}) reached, channel stays closed",
                    policy.max_attempts
                );
                self.dispatcher.dispatch(ChannelEvent::ReconnectsExhausted {
                    attempts: self.reconnect_attempts,
                });
            }
        }
    }

    fn handle_retry(&mut self, ticket: u64) {
        if !self.retry.take_fired(ticket) {
            debug!("ignoring cancelled retry timer {ticket}");
            return;
        }
        if self.suppress_reconnect {
            return;
        }
        self.connect(false);
    }
}
