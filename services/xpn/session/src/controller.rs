//! Session controller: the connection state machine.
//!
//! Sits between the socket transport and everything else. Raw socket
//! events come in, semantic events go out: login on open, envelope
//! decode and dispatch on message, a countdown status line on close.
//! All state transitions happen here and nowhere else.

use crate::pending::PendingRequests;
use crate::transport::SocketTransport;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use xpn_bus::{Event, EventBus, SubscriptionId, Topic};
use xpn_wire::envelope::{SERVICE_SERVER, SERVICE_STATUS, SERVICE_XPRESSION};
use xpn_wire::{
    decode, Command, ConnectionSettings, ConnectionState, CorrelationId, Envelope,
    InboundEnvelope, Reply, StatusReport,
};

/// Fixed status line published when the socket reports an error
pub const ERROR_MESSAGE: &str = "Connection encountered error!";

/// Raised when a request's connection goes away before its reply
#[derive(Debug, Error)]
#[error("request dropped before a reply arrived")]
pub struct RequestDropped;

/// Tunables for session teardown
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// How long a logout envelope gets to flush before the socket closes
    pub logout_grace: Duration,
    /// Delay between a server-reported error and the forced disconnect
    pub error_disconnect_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            logout_grace: Duration::from_millis(1000),
            error_disconnect_delay: Duration::from_millis(500),
        }
    }
}

/// Connection state machine and inbound dispatcher
pub struct SessionController {
    bus: EventBus,
    transport: SocketTransport,
    pending: PendingRequests,
    config: SessionConfig,
    settings: Mutex<ConnectionSettings>,
    state: Mutex<ConnectionState>,
    message: Mutex<String>,
    auto_reconnect: AtomicBool,
    // Bumping the generation orphans any running countdown task
    countdown_gen: AtomicU64,
    subscriptions: Mutex<Vec<(Topic, SubscriptionId)>>,
}

impl SessionController {
    pub fn new(
        bus: EventBus,
        transport: SocketTransport,
        settings: ConnectionSettings,
        config: SessionConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            bus,
            transport,
            pending: PendingRequests::new(),
            config,
            settings: Mutex::new(settings),
            state: Mutex::new(ConnectionState::Disconnected),
            message: Mutex::new("Not connected.".to_string()),
            auto_reconnect: AtomicBool::new(true),
            countdown_gen: AtomicU64::new(0),
            subscriptions: Mutex::new(Vec::new()),
        })
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    /// Snapshot of state, status line and the reconnect flag
    pub fn status(&self) -> StatusReport {
        StatusReport {
            state: self.state(),
            message: lock(&self.message).clone(),
            auto_reconnect: self.auto_reconnect.load(Ordering::SeqCst),
        }
    }

    /// Register the controller's bus handlers.
    ///
    /// `conn.*` topics drive the controller; socket topics feed it
    /// transport events. [`Self::unbind`] removes everything again.
    pub fn bind(self: &Arc<Self>) {
        let mut subs = Vec::new();

        let this = Arc::clone(self);
        subs.push((
            Topic::ConnConnect,
            self.bus.subscribe_always(Topic::ConnConnect, move |_| {
                let this = Arc::clone(&this);
                tokio::spawn(async move { this.connect().await });
            }),
        ));

        let this = Arc::clone(self);
        subs.push((
            Topic::ConnDisconnect,
            self.bus.subscribe_always(Topic::ConnDisconnect, move |_| {
                let this = Arc::clone(&this);
                tokio::spawn(async move { this.disconnect().await });
            }),
        ));

        let this = Arc::clone(self);
        subs.push((
            Topic::ConnReconnect,
            self.bus.subscribe_always(Topic::ConnReconnect, move |_| {
                let this = Arc::clone(&this);
                tokio::spawn(async move { this.reconnect().await });
            }),
        ));

        let this = Arc::clone(self);
        subs.push((
            Topic::ConnSendMessage,
            self.bus.subscribe_always(Topic::ConnSendMessage, move |event| {
                if let Event::Message(text) = event {
                    this.send_message(text.clone());
                }
            }),
        ));

        let this = Arc::clone(self);
        subs.push((
            Topic::ConnUpdateSettings,
            self.bus
                .subscribe_always(Topic::ConnUpdateSettings, move |event| {
                    if let Event::Settings(settings) = event {
                        this.update_settings(settings.clone());
                    }
                }),
        ));

        let this = Arc::clone(self);
        subs.push((
            Topic::ConnGetStatus,
            self.bus.subscribe_always(Topic::ConnGetStatus, move |_| {
                this.publish_status();
            }),
        ));

        let this = Arc::clone(self);
        subs.push((
            Topic::SocketOpened,
            self.bus.subscribe_always(Topic::SocketOpened, move |_| {
                this.on_opened();
            }),
        ));

        let this = Arc::clone(self);
        subs.push((
            Topic::SocketMessage,
            self.bus.subscribe_always(Topic::SocketMessage, move |event| {
                if let Event::Message(raw) = event {
                    this.on_message(raw);
                }
            }),
        ));

        let this = Arc::clone(self);
        subs.push((
            Topic::SocketClosed,
            self.bus.subscribe_always(Topic::SocketClosed, move |event| {
                if let Event::Closed { reason, retry_in } = event {
                    this.on_closed(reason, *retry_in);
                }
            }),
        ));

        let this = Arc::clone(self);
        subs.push((
            Topic::SocketError,
            self.bus.subscribe_always(Topic::SocketError, move |_| {
                this.on_socket_error();
            }),
        ));

        lock(&self.subscriptions).extend(subs);
    }

    /// Remove every handler registered by [`Self::bind`]
    pub fn unbind(&self) {
        self.cancel_countdown();
        for (topic, id) in lock(&self.subscriptions).drain(..) {
            self.bus.unsubscribe(&topic, id);
        }
    }

    /// Open the session. An authenticated session is torn down gracefully
    /// first, so `connect` doubles as "reconnect with current settings".
    pub async fn connect(&self) {
        if self.state() == ConnectionState::Authenticated {
            self.disconnect().await;
        }

        self.cancel_countdown();
        let url = lock(&self.settings).url();
        self.set_state(ConnectionState::Connecting, format!("Connecting to {url}."));
        info!(%url, "session connecting");
        self.bus.publish(Topic::NetworkConnecting, Event::Trigger);

        self.transport.update_settings(lock(&self.settings).clone());
        self.transport.connect();
    }

    /// Tear the session down. Resolves once the transport has been told
    /// to close with reconnection disabled.
    pub async fn disconnect(&self) {
        self.auto_reconnect.store(false, Ordering::SeqCst);
        self.cancel_countdown();

        match self.state() {
            ConnectionState::Disconnected => {
                self.transport.disconnect(false);
            }
            ConnectionState::Connecting | ConnectionState::Connected => {
                self.transport.disconnect(false);
                self.set_state(ConnectionState::Disconnected, "Not connected.".to_string());
            }
            ConnectionState::Authenticated => {
                let username = lock(&self.settings).username.clone();
                self.transport.send(Envelope::logout(&username).to_json());
                // Give the logout envelope time to flush
                tokio::time::sleep(self.config.logout_grace).await;
                self.transport.disconnect(false);
                self.set_state(ConnectionState::Disconnected, "Not connected.".to_string());
            }
        }
    }

    /// Cycle the connection. Only meaningful while Authenticated;
    /// ignored in every other state.
    pub async fn reconnect(&self) {
        if self.state() != ConnectionState::Authenticated {
            debug!("ignoring reconnect, session not authenticated");
            return;
        }
        self.disconnect().await;
        self.connect().await;
    }

    /// Swap in new connection settings for the next attempt
    pub fn update_settings(&self, settings: ConnectionSettings) {
        *lock(&self.settings) = settings.clone();
        self.transport.update_settings(settings);
    }

    /// Write a text frame, but only while the socket is open.
    /// Anything sent in other states is dropped without error.
    pub fn send_message(&self, text: String) {
        if self.state().is_open() {
            self.transport.send(text);
        } else {
            debug!("dropping outbound message, socket not open");
        }
    }

    /// Issue a command that expects a reply.
    ///
    /// Generates the correlation id, stamps it into the command, registers
    /// the pending entry and publishes the command topic. The returned
    /// future resolves with the matching reply; there is no per-request
    /// timeout, callers impose their own deadline if they need one.
    pub async fn request(&self, mut command: Command) -> Result<Reply, RequestDropped> {
        let id = CorrelationId::generate();
        command.set_uuid(id.clone());
        let rx = self.pending.register(id);
        self.bus
            .publish(Topic::Command(command.kind()), Event::Command(command));
        rx.await.map_err(|_| RequestDropped)
    }

    /// Publish the current status snapshot on `conn.status`
    pub fn publish_status(&self) {
        self.bus
            .publish(Topic::ConnStatus, Event::Status(self.status()));
    }

    fn on_opened(self: &Arc<Self>) {
        self.cancel_countdown();
        self.auto_reconnect.store(true, Ordering::SeqCst);
        self.set_state(ConnectionState::Connected, "Logging in.".to_string());

        let settings = lock(&self.settings).clone();
        self.transport
            .send(Envelope::login(&settings.username, &settings.password).to_json());
    }

    fn on_message(self: &Arc<Self>, raw: &str) {
        let envelope = match decode(raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                debug!(%err, "dropping undecodable frame");
                return;
            }
        };

        match envelope.service.as_str() {
            SERVICE_STATUS => self.on_status_message(&envelope),
            SERVICE_XPRESSION => self.on_xpression_message(&envelope),
            SERVICE_SERVER => {
                if envelope.data.message.as_deref() == Some("connected") {
                    self.bus.publish(Topic::NetworkConnected, Event::Trigger);
                }
            }
            service => {
                // Forward-compatibility escape hatch for unknown services
                self.bus.publish(
                    Topic::Service(service.to_string()),
                    Event::Raw(envelope.data_raw.clone()),
                );
            }
        }
    }

    fn on_status_message(self: &Arc<Self>, envelope: &InboundEnvelope) {
        let message = envelope.data.message.as_deref().unwrap_or_default();
        match envelope.data.kind.as_deref() {
            Some("login") => {
                let expected = format!("Logged in as user: {}", lock(&self.settings).username);
                if message.trim() == expected && self.state() == ConnectionState::Connected {
                    info!(%message, "session authenticated");
                    self.set_state(ConnectionState::Authenticated, message.to_string());
                    self.bus.publish(Topic::SessionAuthenticated, Event::Trigger);
                } else {
                    debug!(%message, "ignoring login status");
                }
            }
            Some("error") => {
                warn!(%message, "session error reported");
                *lock(&self.message) = message.to_string();
                self.bus.publish(
                    Topic::SessionError,
                    Event::StatusMessage(message.to_string()),
                );
                let this = Arc::clone(self);
                let delay = self.config.error_disconnect_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    this.disconnect().await;
                });
            }
            kind => debug!(?kind, "ignoring status message"),
        }
    }

    fn on_xpression_message(&self, envelope: &InboundEnvelope) {
        let category = envelope.data.category.as_deref().unwrap_or_default();
        let action = envelope.data.action.as_deref().unwrap_or_default();

        if category == "main" && action == "start" {
            match &envelope.data.value {
                Some(value) => {
                    let reply = Reply::from_value(action, value);
                    self.bus
                        .publish(Topic::ControllerStarted, Event::Reply(reply.clone()));
                    self.resolve_reply(reply);
                }
                None => self.bus.publish(Topic::ControllerStarted, Event::Trigger),
            }
            return;
        }

        let Some(value) = &envelope.data.value else {
            debug!(%category, %action, "reply without a value payload");
            return;
        };
        let reply = Reply::from_value(action, value);

        // Replies fan out: category topic for class subscribers, raw
        // correlation topic for one-shot waiters, pending map for futures.
        match category {
            "takeitem" => {
                if let Some(take_id) = reply.take_id {
                    self.bus
                        .publish(Topic::TakeItem(take_id), Event::Reply(reply.clone()));
                }
            }
            "widget" => {
                if let Some(name) = &reply.name {
                    self.bus
                        .publish(Topic::Widget(name.clone()), Event::Reply(reply.clone()));
                }
            }
            _ => {}
        }

        self.resolve_reply(reply);
    }

    /// Settle a reply's pending entry and publish its correlation topic
    fn resolve_reply(&self, reply: Reply) {
        if let Some(uuid) = reply.uuid.clone() {
            self.pending.resolve(&uuid, reply.clone());
            self.bus.publish(Topic::Reply(uuid), Event::Reply(reply));
        }
    }

    fn on_closed(self: &Arc<Self>, reason: &str, retry_in: Option<Duration>) {
        let message = match retry_in {
            Some(delay) => {
                let secs = eta_seconds(delay);
                reconnect_message(secs, reason)
            }
            None => "Connection closed.".to_string(),
        };

        self.set_state(ConnectionState::Disconnected, message.clone());
        self.bus.publish(Topic::NetworkDisconnected, Event::Trigger);
        self.bus
            .publish(Topic::NetworkConnectionMsg, Event::StatusMessage(message));

        if let Some(delay) = retry_in {
            self.start_countdown(eta_seconds(delay), reason.to_string());
        }
    }

    fn on_socket_error(&self) {
        self.set_state(ConnectionState::Disconnected, ERROR_MESSAGE.to_string());
        self.bus.publish(
            Topic::NetworkConnectionMsg,
            Event::StatusMessage(ERROR_MESSAGE.to_string()),
        );
    }

    fn set_state(&self, state: ConnectionState, message: String) {
        *lock(&self.state) = state;
        *lock(&self.message) = message;
        self.publish_status();
    }

    /// Republish the remaining-time message once per second until the
    /// retry fires or a newer countdown supersedes this one
    fn start_countdown(self: &Arc<Self>, secs: u64, reason: String) {
        let token = self.countdown_gen.fetch_add(1, Ordering::SeqCst) + 1;
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut remaining = secs;
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                if this.countdown_gen.load(Ordering::SeqCst) != token {
                    return;
                }
                remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    return;
                }
                let text = reconnect_message(remaining, &reason);
                *lock(&this.message) = text.clone();
                this.bus
                    .publish(Topic::NetworkConnectionMsg, Event::StatusMessage(text));
            }
        });
    }

    fn cancel_countdown(&self) {
        self.countdown_gen.fetch_add(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Whole seconds shown for a retry delay, floored at one
fn eta_seconds(delay: Duration) -> u64 {
    let millis = delay.as_millis() as u64;
    (millis.div_ceil(1000)).max(1)
}

fn reconnect_message(secs: u64, reason: &str) -> String {
    let plural = if secs == 1 { "" } else { "s" };
    format!("Connection closed. Reconnect will be attempted in {secs} second{plural}. {reason}")
        .trim_end()
        .to_string()
}
