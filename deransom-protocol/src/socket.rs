//! Reconnecting Event Socket
//!
//! Owns one logical WebSocket connection to a De-Ransom push endpoint and
//! keeps it alive: abnormal closures and failed connection attempts feed an
//! exponential-backoff reconnection loop, while parsed frames are dispatched
//! to the registered [`EventHandler`].
//!
//! ## Connection lifecycle
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected -+-> Reconnecting
//!       ^                                                  |        |
//!       |               (clean disconnect, or              |        |
//!       +---------------- attempts exhausted) <------------+        |
//!       ^                                                           |
//!       +--------------------- Connecting <-------------------------+
//! ```
//!
//! Each [`EventSocket::connect`] call spawns a single session task that
//! exclusively owns the transport; reconnecting replaces the stream
//! wholesale, so no bindings to a dead connection survive. A clean
//! [`EventSocket::disconnect`] cancels a pending backoff wait instead of
//! letting a stale attempt fire later.

use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::backoff::{ReconnectPolicy, ReconnectStrategy};
use crate::handler::EventHandler;
use crate::message::{ClientMessage, ServerMessage};

/// Outbound messages buffered while the writer catches up
const OUTBOUND_BUFFER: usize = 32;

/// Observable connection state of an [`EventSocket`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport; either never connected, cleanly closed, or exhausted
    Disconnected,
    /// A connection attempt is in flight
    Connecting,
    /// The transport is open and frames flow
    Connected,
    /// Waiting out a backoff delay before the next attempt
    Reconnecting,
}

/// How an established connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseOutcome {
    /// Caller-requested shutdown or a normal close from the server;
    /// never followed by reconnection
    Clean,
    /// Error, non-normal close code, or the stream ended abruptly;
    /// feeds the reconnection procedure
    Abnormal,
}

/// A running session task and its shutdown signal
struct Session {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Everything a session task needs, moved in at spawn time
struct SessionContext {
    url: String,
    handler: Arc<dyn EventHandler>,
    policy: ReconnectPolicy,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    outbound: Arc<Mutex<Option<mpsc::Sender<Message>>>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl SessionContext {
    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }
}

/// Client for the De-Ransom server-push endpoint
///
/// One instance per logical endpoint. The handler and lifecycle hooks are
/// registered at construction; `connect` starts the session and everything
/// after that (dispatch, ping replies, reconnection) happens without caller
/// involvement.
///
/// # Examples
///
/// ```no_run
/// use deransom_protocol::{EventHandler, EventSocket, SecurityEvent};
/// use std::sync::Arc;
///
/// struct PrintHandler;
///
/// #[async_trait::async_trait]
/// impl EventHandler for PrintHandler {
///     async fn on_event(&self, event: SecurityEvent) {
///         println!("{} {}", event.event_type, event.file_path);
///     }
/// }
///
/// # async fn run() {
/// let socket = EventSocket::new("ws://localhost:5000/ws", Arc::new(PrintHandler));
/// socket.connect().await;
/// # }
/// ```
pub struct EventSocket {
    url: String,
    handler: Arc<dyn EventHandler>,
    policy: ReconnectPolicy,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    state_rx: watch::Receiver<ConnectionState>,
    outbound: Arc<Mutex<Option<mpsc::Sender<Message>>>>,
    session: Mutex<Option<Session>>,
}

impl EventSocket {
    /// Create a socket with the default reconnection policy
    pub fn new(url: impl Into<String>, handler: Arc<dyn EventHandler>) -> Self {
        Self::with_policy(url, handler, ReconnectPolicy::default())
    }

    /// Create a socket with an explicit reconnection policy
    pub fn with_policy(
        url: impl Into<String>,
        handler: Arc<dyn EventHandler>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        Self {
            url: url.into(),
            handler,
            policy,
            state_tx: Arc::new(state_tx),
            state_rx,
            outbound: Arc::new(Mutex::new(None)),
            session: Mutex::new(None),
        }
    }

    /// Target endpoint this socket connects to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current connection state
    pub fn current_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch the connection state as it changes
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Whether the transport is currently open
    pub fn is_connected(&self) -> bool {
        self.current_state() == ConnectionState::Connected
    }

    /// Start (or restart) the session
    ///
    /// Idempotent entry point: an already-running session is shut down
    /// cleanly before the new one spawns, so at most one transport exists at
    /// a time. Establishment failures never surface here; they are logged
    /// and retried by the session itself.
    pub async fn connect(&self) {
        let mut session = self.session.lock().await;

        if let Some(old) = session.take() {
            debug!("connect() while a session is active, closing the old one first");
            let _ = old.shutdown_tx.send(true);
            if let Err(e) = old.task.await {
                debug!("Previous session task did not end cleanly: {}", e);
            }
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctx = SessionContext {
            url: self.url.clone(),
            handler: Arc::clone(&self.handler),
            policy: self.policy,
            state_tx: Arc::clone(&self.state_tx),
            outbound: Arc::clone(&self.outbound),
            shutdown_rx,
        };

        let task = tokio::spawn(run_session(ctx));
        *session = Some(Session { shutdown_tx, task });
    }

    /// Request a clean shutdown
    ///
    /// Closes the transport with a normal status code and cancels any
    /// pending reconnect. Never triggers the reconnection path. Calling this
    /// without an active session is a no-op.
    pub async fn disconnect(&self) {
        let mut session = self.session.lock().await;

        match session.take() {
            Some(active) => {
                debug!("Requesting clean shutdown of the event socket");
                let _ = active.shutdown_tx.send(true);
                if let Err(e) = active.task.await {
                    debug!("Session task did not end cleanly: {}", e);
                }
            }
            None => debug!("disconnect() called with no active session"),
        }
    }

    /// Send a message to the server, if currently connected
    ///
    /// Serializes `message` to a JSON text frame. While disconnected this is
    /// a no-op that logs a usage error and returns `false`; outbound
    /// messages are not queued across disconnections.
    pub async fn send<M: Serialize>(&self, message: &M) -> bool {
        let frame = match serde_json::to_string(message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to serialize outbound message: {}", e);
                return false;
            }
        };

        let sender = self.outbound.lock().await.clone();
        let Some(sender) = sender else {
            warn!("Cannot send message: event socket is not connected");
            return false;
        };

        match sender.send(Message::Text(frame.into())).await {
            Ok(()) => true,
            Err(_) => {
                warn!("Cannot send message: connection is shutting down");
                false
            }
        }
    }
}

/// Session task: connect, pump frames, reconnect with backoff until a clean
/// shutdown or attempt exhaustion
async fn run_session(ctx: SessionContext) {
    let mut strategy = ReconnectStrategy::new(ctx.policy);
    let mut shutdown_rx = ctx.shutdown_rx.clone();

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        ctx.set_state(ConnectionState::Connecting);
        debug!("Connecting to event socket at {}", ctx.url);

        match connect_async(ctx.url.as_str()).await {
            Ok((stream, _response)) => {
                info!("Event socket connected to {}", ctx.url);
                strategy.reset();
                ctx.set_state(ConnectionState::Connected);
                ctx.handler.on_connect().await;

                let outcome = drive_connection(stream, &ctx, &mut shutdown_rx).await;

                ctx.set_state(ConnectionState::Disconnected);
                ctx.handler.on_disconnect().await;

                if outcome == CloseOutcome::Clean {
                    break;
                }
            }
            Err(e) => {
                warn!("Failed to open event socket: {}", e);
                ctx.set_state(ConnectionState::Disconnected);
                ctx.handler.on_disconnect().await;
            }
        }

        match strategy.next_delay() {
            Some(delay) => {
                info!("Reconnecting in {:?} ({})", delay, strategy.status());
                ctx.set_state(ConnectionState::Reconnecting);
                if wait_or_shutdown(delay, &mut shutdown_rx).await {
                    debug!("Shutdown requested during backoff, abandoning reconnect");
                    break;
                }
            }
            None => {
                warn!(
                    "Reconnect attempts exhausted after {} tries; staying disconnected \
                     until an explicit connect()",
                    strategy.attempt()
                );
                break;
            }
        }
    }

    ctx.set_state(ConnectionState::Disconnected);
}

/// Wait out a backoff delay; returns true if shutdown was requested
async fn wait_or_shutdown(delay: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        changed = shutdown_rx.changed() => changed.is_err() || *shutdown_rx.borrow(),
    }
}

/// Pump one established connection until it closes
async fn drive_connection(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    ctx: &SessionContext,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> CloseOutcome {
    let (mut sink, mut source) = stream.split();

    let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);
    *ctx.outbound.lock().await = Some(out_tx);

    let outcome = loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "client disconnect".into(),
                    };
                    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                        debug!("Error sending close frame: {}", e);
                    }
                    break CloseOutcome::Clean;
                }
            }
            Some(message) = out_rx.recv() => {
                if let Err(e) = sink.send(message).await {
                    warn!("Failed to write outbound message: {}", e);
                    break CloseOutcome::Abnormal;
                }
            }
            frame = source.next() => {
                match frame {
                    Some(Ok(message)) => {
                        if let Some(outcome) = handle_frame(message, &mut sink, ctx).await {
                            break outcome;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Transport error: {}", e);
                        break CloseOutcome::Abnormal;
                    }
                    None => {
                        warn!("Connection closed without a close frame");
                        break CloseOutcome::Abnormal;
                    }
                }
            }
        }
    };

    *ctx.outbound.lock().await = None;
    outcome
}

/// React to one transport frame; `Some` ends the connection
async fn handle_frame<S>(
    message: Message,
    sink: &mut S,
    ctx: &SessionContext,
) -> Option<CloseOutcome>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    match message {
        Message::Text(text) => {
            dispatch_text(text.as_str(), sink, ctx).await;
            None
        }
        Message::Close(frame) => match frame {
            Some(frame) if frame.code == CloseCode::Normal => {
                info!("Server closed the connection normally");
                Some(CloseOutcome::Clean)
            }
            Some(frame) => {
                warn!(
                    "Abnormal closure: code {}, reason {:?}",
                    u16::from(frame.code),
                    frame.reason.as_str()
                );
                Some(CloseOutcome::Abnormal)
            }
            None => {
                warn!("Abnormal closure: no status code");
                Some(CloseOutcome::Abnormal)
            }
        },
        // Transport-level pings are answered by the WebSocket layer itself;
        // only the JSON liveness protocol needs a reply from us.
        Message::Ping(_) | Message::Pong(_) => None,
        Message::Binary(_) => {
            debug!("Ignoring unexpected binary frame");
            None
        }
        Message::Frame(_) => None,
    }
}

/// Parse a text frame and dispatch it by kind
async fn dispatch_text<S>(raw: &str, sink: &mut S, ctx: &SessionContext)
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    match ServerMessage::from_frame(raw) {
        Ok(ServerMessage::SecurityEvent { event, .. }) => {
            debug!("Security event: {} {}", event.event_type, event.file_path);
            ctx.handler.on_event(event).await;
        }
        Ok(ServerMessage::Ping) => {
            debug!("Liveness ping received, replying with pong");
            match ClientMessage::Pong.to_frame() {
                Ok(frame) => {
                    if let Err(e) = sink.send(Message::Text(frame.into())).await {
                        warn!("Failed to send pong: {}", e);
                    }
                }
                Err(e) => warn!("Failed to encode pong: {}", e),
            }
        }
        Ok(ServerMessage::StatusUpdate(update)) => {
            debug!("Status update: {}", update.status);
            ctx.handler.on_status_update(update).await;
        }
        Ok(ServerMessage::Unknown { kind }) => {
            warn!("Dropping message with unknown type {:?}", kind);
        }
        Err(e) => {
            warn!("Discarding malformed frame: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SecurityEvent;

    struct NullHandler;

    #[async_trait::async_trait]
    impl EventHandler for NullHandler {
        async fn on_event(&self, _event: SecurityEvent) {}
    }

    #[test]
    fn test_initial_state_is_disconnected() {
        let socket = EventSocket::new("ws://localhost:9/ws", Arc::new(NullHandler));
        assert_eq!(socket.current_state(), ConnectionState::Disconnected);
        assert!(!socket.is_connected());
        assert_eq!(socket.url(), "ws://localhost:9/ws");
    }

    #[tokio::test]
    async fn test_send_while_disconnected_is_rejected() {
        let socket = EventSocket::new("ws://localhost:9/ws", Arc::new(NullHandler));
        let delivered = socket.send(&ClientMessage::Pong).await;
        assert!(!delivered);
    }

    #[tokio::test]
    async fn test_disconnect_without_session_is_a_noop() {
        let socket = EventSocket::new("ws://localhost:9/ws", Arc::new(NullHandler));
        socket.disconnect().await;
        assert_eq!(socket.current_state(), ConnectionState::Disconnected);
    }
}
