//! WebSocket transport with reconnection policy.
//!
//! The transport owns exactly one underlying socket at a time. It runs as
//! a single tokio task; the [`SocketTransport`] handle is a cheap clone
//! that feeds it commands. Raw socket events (`SocketOpened`,
//! `SocketMessage`, `SocketClosed`, `SocketError`) are published on the
//! event bus and nowhere else; downstream components never touch the
//! socket.

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use xpn_bus::{Event, EventBus, Topic};
use xpn_wire::ConnectionSettings;

/// Close reason reported when the connect watchdog fires
pub const TIMEOUT_REASON: &str = "Connection timed out";
/// Close reason reported when an attempt is torn down locally
const LOCAL_CLOSE_REASON: &str = "Connection closed";

/// Tunables for the transport
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Watchdog for the initial connection attempt
    pub connect_timeout: Duration,
    /// First retry delay after a close
    pub backoff_floor: Duration,
    /// Ceiling for the doubling retry delay
    pub backoff_cap: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            backoff_floor: Duration::from_millis(1500),
            backoff_cap: Duration::from_secs(30),
        }
    }
}

enum TransportCmd {
    Connect,
    Disconnect { auto_reconnect: bool },
    Send(String),
    UpdateSettings(ConnectionSettings),
}

/// Handle to the transport task
#[derive(Clone)]
pub struct SocketTransport {
    cmd_tx: mpsc::UnboundedSender<TransportCmd>,
}

impl SocketTransport {
    /// Spawn the transport task and return its handle
    pub fn spawn(bus: EventBus, settings: ConnectionSettings, config: TransportConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(bus, cmd_rx, settings, config));
        Self { cmd_tx }
    }

    /// Open the socket. No-op while an attempt is in flight or a socket
    /// already exists.
    pub fn connect(&self) {
        let _ = self.cmd_tx.send(TransportCmd::Connect);
    }

    /// Close the socket (if any), recording whether a reconnect should
    /// follow the resulting close. No-op while already disconnected.
    pub fn disconnect(&self, auto_reconnect: bool) {
        let _ = self.cmd_tx.send(TransportCmd::Disconnect { auto_reconnect });
    }

    /// Write a text frame. Dropped silently when no socket is open.
    pub fn send(&self, text: String) {
        let _ = self.cmd_tx.send(TransportCmd::Send(text));
    }

    /// Replace the connection settings used by the next attempt
    pub fn update_settings(&self, settings: ConnectionSettings) {
        let _ = self.cmd_tx.send(TransportCmd::UpdateSettings(settings));
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Attempt {
    Socket(Box<WsStream>),
    Failed(String),
    Aborted { auto_reconnect: bool },
}

async fn run(
    bus: EventBus,
    mut rx: mpsc::UnboundedReceiver<TransportCmd>,
    mut settings: ConnectionSettings,
    config: TransportConfig,
) {
    'idle: loop {
        // Idle: no socket, no retry scheduled
        loop {
            match rx.recv().await {
                None => return,
                Some(TransportCmd::Connect) => break,
                Some(TransportCmd::UpdateSettings(s)) => settings = s,
                Some(TransportCmd::Disconnect { .. }) => {}
                Some(TransportCmd::Send(_)) => {}
            }
        }

        let mut auto_reconnect = true;
        let mut backoff = config.backoff_floor;

        'attempt: loop {
            let reason = match attempt(&bus, &mut rx, &mut settings, &config).await {
                None => return,
                Some(Attempt::Socket(ws)) => {
                    backoff = config.backoff_floor;
                    bus.publish(Topic::SocketOpened, Event::Opened);
                    match connected(&bus, &mut rx, &mut settings, *ws, &mut auto_reconnect).await {
                        None => return,
                        Some(reason) => reason,
                    }
                }
                Some(Attempt::Failed(reason)) => reason,
                Some(Attempt::Aborted { auto_reconnect: auto }) => {
                    auto_reconnect = auto;
                    LOCAL_CLOSE_REASON.to_string()
                }
            };

            if !auto_reconnect {
                debug!(%reason, "socket closed, no retry");
                bus.publish(
                    Topic::SocketClosed,
                    Event::Closed {
                        reason,
                        retry_in: None,
                    },
                );
                continue 'idle;
            }

            let delay = backoff;
            backoff = (backoff * 2).min(config.backoff_cap);
            debug!(%reason, ?delay, "socket closed, retry scheduled");
            bus.publish(
                Topic::SocketClosed,
                Event::Closed {
                    reason,
                    retry_in: Some(delay),
                },
            );

            // Backoff wait; a disconnect here cancels the retry silently
            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    () = &mut sleep => continue 'attempt,
                    cmd = rx.recv() => match cmd {
                        None => return,
                        Some(TransportCmd::Connect) => continue 'attempt,
                        Some(TransportCmd::Disconnect { auto_reconnect: false }) => continue 'idle,
                        Some(TransportCmd::Disconnect { auto_reconnect: true }) => {}
                        Some(TransportCmd::UpdateSettings(s)) => settings = s,
                        Some(TransportCmd::Send(_)) => {}
                    }
                }
            }
        }
    }
}

/// One connection attempt under the watchdog. Returns `None` when the
/// handle was dropped.
async fn attempt(
    bus: &EventBus,
    rx: &mut mpsc::UnboundedReceiver<TransportCmd>,
    settings: &mut ConnectionSettings,
    config: &TransportConfig,
) -> Option<Attempt> {
    let url = settings.url();
    debug!(%url, "connecting");

    let connect = tokio::time::timeout(config.connect_timeout, connect_async(url));
    tokio::pin!(connect);

    loop {
        tokio::select! {
            result = &mut connect => {
                return Some(match result {
                    Err(_) => Attempt::Failed(TIMEOUT_REASON.to_string()),
                    Ok(Err(err)) => {
                        warn!(%err, "connect failed");
                        bus.publish(Topic::SocketError, Event::SocketError(err.to_string()));
                        Attempt::Failed(err.to_string())
                    }
                    Ok(Ok((ws, _response))) => Attempt::Socket(Box::new(ws)),
                });
            }
            cmd = rx.recv() => match cmd {
                None => return None,
                Some(TransportCmd::Disconnect { auto_reconnect }) => {
                    return Some(Attempt::Aborted { auto_reconnect });
                }
                Some(TransportCmd::Connect) => {}
                Some(TransportCmd::UpdateSettings(s)) => *settings = s,
                Some(TransportCmd::Send(_)) => {}
            }
        }
    }
}

/// Pump an open socket until it closes. Returns the close reason, or
/// `None` when the handle was dropped.
async fn connected(
    bus: &EventBus,
    rx: &mut mpsc::UnboundedReceiver<TransportCmd>,
    settings: &mut ConnectionSettings,
    mut ws: WsStream,
    auto_reconnect: &mut bool,
) -> Option<String> {
    loop {
        tokio::select! {
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    bus.publish(Topic::SocketMessage, Event::Message(text.to_string()));
                }
                Some(Ok(Message::Close(frame))) => {
                    return Some(frame.map(|f| f.reason.to_string()).unwrap_or_default());
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = ws.send(Message::Pong(payload)).await;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(%err, "socket error");
                    bus.publish(Topic::SocketError, Event::SocketError(err.to_string()));
                    let _ = ws.close(None).await;
                    return Some(err.to_string());
                }
                None => return Some(String::new()),
            },
            cmd = rx.recv() => match cmd {
                None => {
                    let _ = ws.close(None).await;
                    return None;
                }
                Some(TransportCmd::Send(text)) => {
                    if let Err(err) = ws.send(Message::text(text)).await {
                        warn!(%err, "send failed");
                        bus.publish(Topic::SocketError, Event::SocketError(err.to_string()));
                        return Some(err.to_string());
                    }
                }
                Some(TransportCmd::Disconnect { auto_reconnect: auto }) => {
                    // Keep draining until the close completes
                    *auto_reconnect = auto;
                    let _ = ws.close(None).await;
                }
                Some(TransportCmd::Connect) => {}
                Some(TransportCmd::UpdateSettings(s)) => *settings = s,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn test_config() -> TransportConfig {
        TransportConfig {
            connect_timeout: Duration::from_secs(2),
            backoff_floor: Duration::from_millis(40),
            backoff_cap: Duration::from_millis(160),
        }
    }

    fn capture(bus: &EventBus, topic: Topic) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        bus.subscribe_always(topic, move |event| {
            let _ = tx.send(event.clone());
        });
        rx
    }

    /// Echo server that counts accepted sockets
    async fn echo_server(accepts: Arc<AtomicUsize>) -> ConnectionSettings {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accepts.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                    while let Some(Ok(msg)) = ws.next().await {
                        if let Message::Text(text) = msg {
                            let _ = ws.send(Message::text(text.to_string())).await;
                        }
                    }
                });
            }
        });

        ConnectionSettings {
            host: "127.0.0.1".to_string(),
            port,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_connect_and_message_roundtrip() {
        let bus = EventBus::new();
        let mut opened = capture(&bus, Topic::SocketOpened);
        let mut messages = capture(&bus, Topic::SocketMessage);

        let accepts = Arc::new(AtomicUsize::new(0));
        let settings = echo_server(accepts.clone()).await;
        let transport = SocketTransport::spawn(bus, settings, test_config());

        transport.connect();
        timeout(WAIT, opened.recv()).await.unwrap().unwrap();

        transport.send("hello".to_string());
        let echoed = timeout(WAIT, messages.recv()).await.unwrap().unwrap();
        assert_eq!(echoed.as_message(), Some("hello"));

        transport.disconnect(false);
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let bus = EventBus::new();
        let mut opened = capture(&bus, Topic::SocketOpened);

        let accepts = Arc::new(AtomicUsize::new(0));
        let settings = echo_server(accepts.clone()).await;
        let transport = SocketTransport::spawn(bus, settings, test_config());

        transport.connect();
        transport.connect();
        timeout(WAIT, opened.recv()).await.unwrap().unwrap();

        // Give the second command time to be consumed as a no-op
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(accepts.load(Ordering::SeqCst), 1);

        transport.disconnect(false);
    }

    #[tokio::test]
    async fn test_explicit_disconnect_schedules_no_retry() {
        let bus = EventBus::new();
        let mut opened = capture(&bus, Topic::SocketOpened);
        let mut closed = capture(&bus, Topic::SocketClosed);

        let accepts = Arc::new(AtomicUsize::new(0));
        let settings = echo_server(accepts.clone()).await;
        let transport = SocketTransport::spawn(bus, settings, test_config());

        transport.connect();
        timeout(WAIT, opened.recv()).await.unwrap().unwrap();

        transport.disconnect(false);
        let event = timeout(WAIT, closed.recv()).await.unwrap().unwrap();
        match event {
            Event::Closed { retry_in, .. } => assert!(retry_in.is_none()),
            other => panic!("expected Closed, got {other:?}"),
        }

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(accepts.load(Ordering::SeqCst), 1, "no reconnect expected");
    }

    #[tokio::test]
    async fn test_backoff_doubles_to_cap_and_resets_on_open() {
        let bus = EventBus::new();
        let mut closed = capture(&bus, Topic::SocketClosed);
        let mut opened = capture(&bus, Topic::SocketOpened);

        // Reserve a port with no listener behind it
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let settings = ConnectionSettings {
            host: "127.0.0.1".to_string(),
            port,
            ..Default::default()
        };
        let transport = SocketTransport::spawn(bus, settings, test_config());
        transport.connect();

        let mut delays = Vec::new();
        for _ in 0..4 {
            match timeout(WAIT, closed.recv()).await.unwrap().unwrap() {
                Event::Closed { retry_in, .. } => delays.push(retry_in.unwrap()),
                other => panic!("expected Closed, got {other:?}"),
            }
        }
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(40),
                Duration::from_millis(80),
                Duration::from_millis(160),
                Duration::from_millis(160),
            ]
        );

        // A listener appears; the next retry succeeds and resets the backoff
        let accepts = Arc::new(AtomicUsize::new(0));
        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        let inner_accepts = accepts.clone();
        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                inner_accepts.fetch_add(1, Ordering::SeqCst);
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                // Hang up straight away to observe the reset delay
                let _ = ws.close(None).await;
                while ws.next().await.is_some() {}
            }
        });

        timeout(WAIT, opened.recv()).await.unwrap().unwrap();
        match timeout(WAIT, closed.recv()).await.unwrap().unwrap() {
            Event::Closed { retry_in, .. } => {
                assert_eq!(retry_in, Some(Duration::from_millis(40)));
            }
            other => panic!("expected Closed, got {other:?}"),
        }

        transport.disconnect(false);
    }

    #[tokio::test]
    async fn test_disconnect_during_backoff_cancels_retry() {
        let bus = EventBus::new();
        let mut closed = capture(&bus, Topic::SocketClosed);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let settings = ConnectionSettings {
            host: "127.0.0.1".to_string(),
            port,
            ..Default::default()
        };
        let config = TransportConfig {
            backoff_floor: Duration::from_secs(60),
            ..test_config()
        };
        let transport = SocketTransport::spawn(bus, settings, config);
        transport.connect();

        // First failure schedules a long retry
        timeout(WAIT, closed.recv()).await.unwrap().unwrap();
        transport.disconnect(false);

        // The cancelled retry produces no further close events
        assert!(timeout(Duration::from_millis(200), closed.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_server_close_reports_floor_retry() {
        let bus = EventBus::new();
        let mut opened = capture(&bus, Topic::SocketOpened);
        let mut closed = capture(&bus, Topic::SocketClosed);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let _ = ws.close(None).await;
                while ws.next().await.is_some() {}
            }
        });

        let settings = ConnectionSettings {
            host: "127.0.0.1".to_string(),
            port,
            ..Default::default()
        };
        let transport = SocketTransport::spawn(bus, settings, test_config());
        transport.connect();

        timeout(WAIT, opened.recv()).await.unwrap().unwrap();
        match timeout(WAIT, closed.recv()).await.unwrap().unwrap() {
            Event::Closed { retry_in, .. } => {
                assert_eq!(retry_in, Some(Duration::from_millis(40)), "floor delay");
            }
            other => panic!("expected Closed, got {other:?}"),
        }

        transport.disconnect(false);
    }
}
