//! BroadcastServer: accept loop, client registry, and scan fan-out.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections from browsers on the LAN.
//! 3. Upgrading each connection to a WebSocket session.
//! 4. Tracking every open session in the client registry and notifying the
//!    owner whenever the population changes.
//! 5. Fanning each qualified scan out to every registered session as a text
//!    frame carrying the raw payload verbatim.
//! 6. Gracefully shutting all of it down on `stop`.
//!
//! # State machine
//!
//! ```text
//! Stopped ──start()──► Starting ──► Running ──stop()──► Stopping ──► Stopped
//! ```
//!
//! `start` fails with `AlreadyRunning` outside `Stopped`; `stop` is an
//! idempotent no-op when already `Stopped` and always reaches `Stopped`,
//! even when the graceful close times out.
//!
//! # Per-session delivery
//!
//! Each session owns a small outbound queue drained by its own task.
//! `broadcast` only does a non-blocking `try_send` into each queue, so a
//! slow or dead connection can never delay delivery to the others; it is
//! dropped instead.  Within one connection the queue is FIFO, so every
//! client sees payloads in broadcast order.
//!
//! # Registry discipline
//!
//! The registry is mutated only by the server's own accept, close, and
//! broadcast-failure paths.  Count notifications are sent while the registry
//! lock is held, so they are observed in the same order as the mutations
//! they describe and the notified count always matches
//! [`BroadcastServer::connected_client_count`] at that moment.  The event
//! channel is unbounded so those sends never block: an owner that lags in
//! draining the receiver can never wedge the registry lock, and `stop`
//! always makes progress.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Opaque handle identifying one client connection in the registry.
pub type ConnectionId = Uuid;

/// How long the accept loop waits before re-checking the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How often `stop` re-checks the registry while draining sessions.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Depth of each session's outbound queue.  Deep enough to absorb normal
/// scan bursts; a client that falls this far behind is dropped.
const OUTBOUND_QUEUE_DEPTH: usize = 32;

// ── Configuration and events ──────────────────────────────────────────────────

/// Listener configuration, immutable for the lifetime of one server
/// instance.  Changing the port means stopping this instance and creating a
/// new one.
///
/// Deployments configure an explicit port in `1..=65535` (default 8080).
/// Port `0` is additionally accepted and means "let the OS pick an
/// ephemeral port"; the port actually bound is then available from
/// [`BroadcastServer::local_addr`] once running (tests rely on this).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
        }
    }
}

impl ServerConfig {
    fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

/// Events emitted by the server to its owner.
#[derive(Debug)]
pub enum ServerEvent {
    /// The registry size changed (connect, disconnect, or drop on failure).
    ClientCountChanged(usize),
    /// A transport-level failure on one connection.  The connection has
    /// already been dropped; the server keeps running.
    TransportError {
        connection_id: ConnectionId,
        message: String,
    },
}

// ── Error types ───────────────────────────────────────────────────────────────

/// Error type for `start`.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("port {port} is already in use")]
    PortInUse { port: u16 },
    #[error("permission denied binding port {port}")]
    PermissionDenied { port: u16 },
    #[error("server is already running")]
    AlreadyRunning,
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Error type for `stop`.  Even on error the server ends in `Stopped`.
#[derive(Debug, Error)]
pub enum StopError {
    #[error("graceful close timed out after {timeout:?}; remaining connections were dropped")]
    GracefulCloseTimedOut { timeout: Duration },
}

/// Error type for `broadcast`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BroadcastError {
    /// Informational: the registry is empty, there is nobody to deliver to.
    #[error("no clients connected")]
    NoClientsConnected,
    /// `broadcast` is only valid while the server is `Running`.
    #[error("server is not running")]
    NotRunning,
}

// ── Internal state ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Registry entry for one open session.
struct ClientHandle {
    peer_addr: SocketAddr,
    outbound: mpsc::Sender<WsMessage>,
}

/// State shared between the server handle, the accept loop, and sessions.
struct Shared {
    config: ServerConfig,
    state: StdMutex<ServerState>,
    /// The authoritative set of open client connections.  Entries are added
    /// on successful handshake and removed exactly once on close.
    registry: Mutex<HashMap<ConnectionId, ClientHandle>>,
    /// Mirror of `registry.len()`, updated under the registry lock, so the
    /// count accessor never needs the async lock.
    client_count: AtomicUsize,
    /// Cleared by `stop` to end the accept loop and refuse late handshakes.
    accepting: AtomicBool,
    /// Address actually bound (resolves port 0 to the OS-assigned port).
    local_addr: StdMutex<Option<SocketAddr>>,
    /// Unbounded so notifications sent under the registry lock never block.
    event_tx: mpsc::UnboundedSender<ServerEvent>,
}

impl Shared {
    fn set_state(&self, state: ServerState) {
        *self.state.lock().expect("state lock poisoned") = state;
    }

    fn state(&self) -> ServerState {
        *self.state.lock().expect("state lock poisoned")
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// WebSocket broadcast server for qualified scan payloads.
pub struct BroadcastServer {
    shared: Arc<Shared>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl BroadcastServer {
    /// Creates a stopped server and returns it together with the receiver
    /// for [`ServerEvent`]s.  Events are how connect/disconnect counts and
    /// transport failures surface; the channel is unbounded, so an owner
    /// that falls behind draining it accumulates events but can never stall
    /// the server itself.
    pub fn new(config: ServerConfig) -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let server = Self {
            shared: Arc::new(Shared {
                config,
                state: StdMutex::new(ServerState::Stopped),
                registry: Mutex::new(HashMap::new()),
                client_count: AtomicUsize::new(0),
                accepting: AtomicBool::new(false),
                local_addr: StdMutex::new(None),
                event_tx,
            }),
            accept_task: Mutex::new(None),
        };
        (server, event_rx)
    }

    /// Binds the listener and begins accepting connections.
    ///
    /// # Errors
    ///
    /// - [`StartError::AlreadyRunning`] unless the server is `Stopped`.
    /// - [`StartError::PortInUse`] / [`StartError::PermissionDenied`] /
    ///   [`StartError::Bind`] when the listener cannot be bound; the server
    ///   returns to `Stopped`.
    pub async fn start(&self) -> Result<(), StartError> {
        {
            let mut state = self.shared.state.lock().expect("state lock poisoned");
            if *state != ServerState::Stopped {
                return Err(StartError::AlreadyRunning);
            }
            *state = ServerState::Starting;
        }

        let addr = self.shared.config.socket_addr();
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                self.shared.set_state(ServerState::Stopped);
                return Err(map_bind_error(source, addr));
            }
        };

        let bound = listener.local_addr().ok();
        *self
            .shared
            .local_addr
            .lock()
            .expect("local_addr lock poisoned") = bound;

        self.shared.accepting.store(true, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(accept_loop(listener, shared));
        *self.accept_task.lock().await = Some(task);

        self.shared.set_state(ServerState::Running);
        info!(
            "broadcast server listening on {}",
            bound.unwrap_or(addr)
        );
        Ok(())
    }

    /// Stops accepting, closes every session, and releases the port.
    ///
    /// Sessions are first asked to close gracefully; any still open after
    /// `grace` are forcibly dropped.  Idempotent: calling `stop` while
    /// already `Stopped` is a no-op success.  The server always ends in
    /// `Stopped`, even on error.
    ///
    /// # Errors
    ///
    /// [`StopError::GracefulCloseTimedOut`] when connections had to be
    /// dropped forcibly.
    pub async fn stop(&self, grace: Duration) -> Result<(), StopError> {
        {
            let mut state = self.shared.state.lock().expect("state lock poisoned");
            if *state == ServerState::Stopped {
                return Ok(());
            }
            *state = ServerState::Stopping;
        }

        // End the accept loop.  Awaiting the task guarantees the listener is
        // dropped — and the port released — before `stop` returns.
        self.shared.accepting.store(false, Ordering::SeqCst);
        if let Some(task) = self.accept_task.lock().await.take() {
            if let Err(e) = task.await {
                error!("accept task ended abnormally: {e}");
            }
        }

        // Ask every session to close gracefully.
        {
            let registry = self.shared.registry.lock().await;
            for (id, handle) in registry.iter() {
                debug!("requesting close of client {id} at {}", handle.peer_addr);
                if handle.outbound.try_send(WsMessage::Close(None)).is_err() {
                    debug!("client {id}: close request not queued; session already ending");
                }
            }
        }

        // Wait for the sessions to deregister themselves.
        let deadline = tokio::time::Instant::now() + grace;
        let mut timed_out = false;
        loop {
            if self.shared.registry.lock().await.is_empty() {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                timed_out = true;
                break;
            }
            sleep(STOP_POLL_INTERVAL).await;
        }

        if timed_out {
            // Force-close the stragglers: clearing the registry drops each
            // session's outbound sender, which terminates its select loop
            // and closes the socket.
            let mut registry = self.shared.registry.lock().await;
            let remaining = registry.len();
            registry.clear();
            self.shared.client_count.store(0, Ordering::SeqCst);
            if remaining > 0 {
                warn!("forcibly dropped {remaining} connection(s) after graceful-close timeout");
                let _ = self
                    .shared
                    .event_tx
                    .send(ServerEvent::ClientCountChanged(0));
            }
        }

        self.shared.set_state(ServerState::Stopped);
        *self
            .shared
            .local_addr
            .lock()
            .expect("local_addr lock poisoned") = None;
        info!("broadcast server stopped");

        if timed_out {
            Err(StopError::GracefulCloseTimedOut { timeout: grace })
        } else {
            Ok(())
        }
    }

    /// Delivers `payload` to every registered connection as a WebSocket text
    /// frame, independently per connection.
    ///
    /// A delivery failure on one connection drops that connection (with a
    /// [`ServerEvent::TransportError`] and a count change) but never aborts
    /// delivery to the rest, and never fails the call itself.
    ///
    /// # Errors
    ///
    /// - [`BroadcastError::NotRunning`] outside `Running`.
    /// - [`BroadcastError::NoClientsConnected`] when the registry is empty —
    ///   informational, not a failure.
    pub async fn broadcast(&self, payload: &str) -> Result<(), BroadcastError> {
        if self.shared.state() != ServerState::Running {
            return Err(BroadcastError::NotRunning);
        }

        // Snapshot the targets so the registry lock is not held while
        // queueing frames.
        let targets: Vec<(ConnectionId, mpsc::Sender<WsMessage>)> = {
            let registry = self.shared.registry.lock().await;
            registry
                .iter()
                .map(|(id, handle)| (*id, handle.outbound.clone()))
                .collect()
        };

        if targets.is_empty() {
            return Err(BroadcastError::NoClientsConnected);
        }

        let delivered = targets.len();
        let mut failed: Vec<(ConnectionId, String)> = Vec::new();
        for (id, outbound) in targets {
            // `try_send` never waits: a slow or dead connection cannot delay
            // delivery to the others.
            match outbound.try_send(WsMessage::Text(payload.to_string())) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    failed.push((id, "outbound queue full".to_string()));
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    failed.push((id, "connection closed".to_string()));
                }
            }
        }

        for (id, reason) in failed {
            warn!("dropping client {id}: {reason}");
            report_transport_error(&self.shared, id, &reason);
            remove_client(&self.shared, id).await;
        }

        debug!("queued broadcast for {delivered} client(s)");
        Ok(())
    }

    /// Whether the server is currently `Running`.
    pub fn is_running(&self) -> bool {
        self.shared.state() == ServerState::Running
    }

    /// Point-in-time size of the client registry.
    pub fn connected_client_count(&self) -> usize {
        self.shared.client_count.load(Ordering::SeqCst)
    }

    /// The address actually bound, while running.  With port 0 in the config
    /// this is where the OS-assigned port shows up.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self
            .shared
            .local_addr
            .lock()
            .expect("local_addr lock poisoned")
    }
}

fn map_bind_error(source: std::io::Error, addr: SocketAddr) -> StartError {
    match source.kind() {
        std::io::ErrorKind::AddrInUse => StartError::PortInUse { port: addr.port() },
        std::io::ErrorKind::PermissionDenied => StartError::PermissionDenied { port: addr.port() },
        _ => StartError::Bind { addr, source },
    }
}

// ── Accept loop ───────────────────────────────────────────────────────────────

/// Accepts connections until the `accepting` flag is cleared.
///
/// Each accepted socket is handed off to a dedicated session task so a slow
/// handshake never delays the next accept.  The short timeout on `accept`
/// lets the loop notice shutdown even when nobody is connecting.
async fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    loop {
        if !shared.accepting.load(Ordering::SeqCst) {
            debug!("accept loop stopping");
            break;
        }

        match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                let connection_id = Uuid::new_v4();
                debug!("incoming connection from {peer_addr}");
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    run_session(shared, connection_id, stream, peer_addr).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g. out of file descriptors).
                // Log it and keep accepting rather than taking the server down.
                error!("accept error: {e}");
            }
            Err(_) => {
                // Timeout — no connection attempt; re-check the flag.
            }
        }
    }
    // The listener drops here, releasing the port.
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Runs the complete lifecycle of one client session: handshake, registry
/// entry, outbound queue draining, inbound close detection, deregistration.
async fn run_session(
    shared: Arc<Shared>,
    connection_id: ConnectionId,
    stream: TcpStream,
    peer_addr: SocketAddr,
) {
    // `accept_async` performs the HTTP Upgrade handshake; afterwards the
    // stream speaks WebSocket frames.
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed with {peer_addr}: {e}");
            return;
        }
    };

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<WsMessage>(OUTBOUND_QUEUE_DEPTH);
    if !register_client(&shared, connection_id, peer_addr, outbound_tx).await {
        // The server began stopping between accept and handshake; drop the
        // socket without ever counting it.
        debug!("refusing late connection from {peer_addr}; server is stopping");
        return;
    }
    info!("client connected: {peer_addr} ({connection_id})");

    let (mut sink, mut source) = ws_stream.split();

    loop {
        tokio::select! {
            queued = outbound_rx.recv() => match queued {
                Some(message) => {
                    let closing = matches!(message, WsMessage::Close(_));
                    if let Err(e) = sink.send(message).await {
                        report_transport_error(&shared, connection_id, &e.to_string());
                        break;
                    }
                    if closing {
                        // Server-initiated graceful close; the frame is out,
                        // the session is over.
                        break;
                    }
                }
                // All senders dropped: the server force-closed this session.
                None => break,
            },
            frame = source.next() => match frame {
                Some(Ok(WsMessage::Close(_))) | None => {
                    debug!("client {peer_addr} closed the connection");
                    break;
                }
                Some(Ok(_)) => {
                    // Clients have nothing to say on this protocol; inbound
                    // frames are ignored, never interpreted.
                    debug!("ignoring inbound frame from {peer_addr}");
                }
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => break,
                Some(Err(e)) => {
                    report_transport_error(&shared, connection_id, &e.to_string());
                    break;
                }
            }
        }
    }

    if remove_client(&shared, connection_id).await {
        info!("client disconnected: {peer_addr} ({connection_id})");
    }
}

// ── Registry mutation ─────────────────────────────────────────────────────────

/// Adds a session to the registry and notifies the owner.
///
/// Returns `false` (refusing the session) when the server is no longer
/// accepting.  The count event is sent while the lock is held so
/// notification order matches mutation order.
async fn register_client(
    shared: &Arc<Shared>,
    connection_id: ConnectionId,
    peer_addr: SocketAddr,
    outbound: mpsc::Sender<WsMessage>,
) -> bool {
    if !shared.accepting.load(Ordering::SeqCst) {
        return false;
    }
    let mut registry = shared.registry.lock().await;
    registry.insert(
        connection_id,
        ClientHandle {
            peer_addr,
            outbound,
        },
    );
    let count = registry.len();
    shared.client_count.store(count, Ordering::SeqCst);
    let _ = shared.event_tx.send(ServerEvent::ClientCountChanged(count));
    true
}

/// Removes a session from the registry, exactly once.
///
/// Safe to call from both the session's own close path and the broadcast
/// failure path: whichever arrives second finds no entry and does nothing,
/// so the count is never decremented twice.
async fn remove_client(shared: &Arc<Shared>, connection_id: ConnectionId) -> bool {
    let mut registry = shared.registry.lock().await;
    if registry.remove(&connection_id).is_none() {
        return false;
    }
    let count = registry.len();
    shared.client_count.store(count, Ordering::SeqCst);
    let _ = shared.event_tx.send(ServerEvent::ClientCountChanged(count));
    true
}

fn report_transport_error(shared: &Arc<Shared>, connection_id: ConnectionId, message: &str) {
    let _ = shared.event_tx.send(ServerEvent::TransportError {
        connection_id,
        message: message.to_string(),
    });
}

// ── Tests ─────────────────────────────────────────────────────────────────────
