//! IPC WebSocket server implementation.
//!
//! The server:
//!
//! - Listens on localhost only (security)
//! - Uses JSON text frames (see [`protocol`](crate::ipc::protocol))
//! - Requires authentication handshake (security)
//! - Registers every authenticated connection as a hub listener
//!
//! # Connection lifecycle
//!
//! ```text
//! accept ─► loopback check ─► WS handshake ─► Auth frame ─► register listener
//!                                                  │              │
//!                                          reject & close   writer task: snapshot,
//!                                                           ListenerReady, live events
//!                                                                 │
//!                              reader loop: Command frames ─► Bridge::submit
//!                                                                 │
//!                                                 disconnect ─► unregister
//! ```
//!
//! Registration suspends until the daemon is available, so it runs beside the reader
//! loop: commands sent before the daemon comes up are queued, not refused.

use crate::bridge::Bridge;
use crate::daemon::DaemonClient;
use crate::error::actor::ActorError;
use crate::error::ipc::IpcError;
use crate::error::transport::TransportError;
use crate::event::Event;
use crate::hub::{ListenerId, ListenerTransport};
use crate::ipc::IPC_HOST;
use crate::ipc::connection_state::ConnectionState;
use crate::ipc::handle::IpcServerHandle;
use crate::ipc::protocol::{self, IpcClientMessage, IpcServerMessage};

use common::ErrorLocation;

use std::net::SocketAddr;
use std::panic::Location;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn as TokioSpawn;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use uuid::Uuid;

type WsWrite = SplitSink<WebSocketStream<TcpStream>, Message>;
type Registration = Result<Result<Option<ListenerId>, ActorError>, JoinError>;

/// Starts the IPC WebSocket server on the specified port.
///
/// Binds `127.0.0.1:<ipc_port>` (port 0 picks a free port, see
/// [`IpcServerHandle::local_addr`]) and spawns a background task accepting
/// connections.
///
/// # Errors
///
/// Returns [`IpcError::Io`] if:
/// - Port is already in use
/// - Insufficient permissions to bind port
pub async fn start_ipc_server<D: DaemonClient>(
    ipc_port: u16,
    auth_token: Option<String>,
    bridge: Bridge<D>,
) -> Result<IpcServerHandle, IpcError> {
    let auth_token = auth_token.unwrap_or_else(|| {
        let token = Uuid::new_v4().to_string();
        info!("Generated IPC auth token");
        token
    });

    let listener = TcpListener::bind((IPC_HOST, ipc_port)).await?;
    let local_addr = listener.local_addr()?;

    info!("IPC server listening on {}", local_addr);

    let token = auth_token.clone();
    let accept_task = TokioSpawn(async move {
        while let Ok((stream, addr)) = listener.accept().await {
            info!("Client connecting from {}", addr);
            let token_clone = token.clone();
            let bridge_clone = bridge.clone();
            TokioSpawn(async move {
                if let Err(e) = handle_connection(stream, addr, token_clone, bridge_clone).await {
                    warn!("Connection from {} ended with error: {}", addr, e);
                }
            });
        }
    });

    Ok(IpcServerHandle {
        local_addr,
        auth_token,
        accept_task,
    })
}

/// Hub transport for one connection: events go to the connection's writer task.
struct ConnectionTransport {
    outbound: mpsc::UnboundedSender<IpcServerMessage>,
}

impl ListenerTransport for ConnectionTransport {
    fn send(&self, event: &Event) -> Result<(), TransportError> {
        self.outbound
            .send(IpcServerMessage::Event {
                event: event.clone(),
            })
            .map_err(|_| TransportError::disconnected("IPC connection writer has stopped"))
    }
}

/// Handles a single WebSocket connection.
///
/// # Protocol
///
/// 1. **First message MUST be** `Auth` with valid token
/// 2. Server responds with `AuthResponse` (success or failure)
/// 3. If auth fails, connection closes immediately
/// 4. If auth succeeds, the connection is registered as a listener and `Command`
///    frames are submitted to the bridge
///
/// # Security
///
/// - Non-loopback connections are rejected immediately
/// - First message must be the auth message (not any other message type)
/// - All failures close the connection (fail-closed security model)
async fn handle_connection<D: DaemonClient>(
    stream: TcpStream,
    addr: SocketAddr,
    auth_token: String,
    bridge: Bridge<D>,
) -> Result<(), IpcError> {
    // SECURITY: Reject non-loopback connections
    if !addr.ip().is_loopback() {
        warn!("Rejected non-loopback connection from {}", addr);
        return Ok(());
    }

    let ws_stream = match accept_async(stream).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            error!("WebSocket handshake failed: {}", e);
            return Err(IpcError::Handshake {
                message: format!("WebSocket handshake failed: {}", e),
                location: ErrorLocation::from(Location::caller()),
            });
        }
    };

    let (mut write, mut read) = ws_stream.split();
    let mut state = ConnectionState::new(auth_token);

    // SECURITY: First message MUST be the auth message
    match read.next().await {
        Some(Ok(frame)) => match protocol::decode::<IpcClientMessage>(&frame) {
            Ok(Some(IpcClientMessage::Auth { token })) => {
                if state.validate_token(&token) {
                    info!("Client {} authenticated successfully", addr);
                    send_auth_response(&mut write, true, None).await?;
                } else {
                    warn!("Client {} auth failed: invalid token", addr);
                    send_auth_response(&mut write, false, Some("Invalid authentication token"))
                        .await?;
                    return Ok(());
                }
            }
            Ok(_) => {
                warn!(
                    "Client {} auth failed: first message was not an auth message",
                    addr
                );
                return Ok(());
            }
            Err(e) => {
                warn!("Client {} sent an undecodable first message: {}", addr, e);
                return Ok(());
            }
        },
        Some(Err(e)) => {
            error!("Error reading first message from {}: {}", addr, e);
            return Err(IpcError::Read {
                message: format!("Error reading first message: {}", e),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        None => {
            warn!("Client {} disconnected before sending auth", addr);
            return Ok(());
        }
    }

    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<IpcServerMessage>();

    let writer = TokioSpawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let frame = match protocol::encode(&message) {
                Ok(frame) => frame,
                Err(e) => {
                    error!("Dropping unencodable message for {}: {}", addr, e);
                    continue;
                }
            };
            if let Err(e) = write.send(frame).await {
                debug!("Writer for {} stopped: {}", addr, e);
                break;
            }
        }
        let _ = write.close().await;
    });

    let registration = {
        let bridge = bridge.clone();
        let transport = ConnectionTransport {
            outbound: outbound.clone(),
        };
        TokioSpawn(async move { bridge.register_listener(transport).await })
    };
    let mut registration = Some(registration);

    while let Some(frame) = read.next().await {
        if let Some(handle) = registration.take_if(|handle| handle.is_finished()) {
            record_registration(&mut state, handle.await, addr);
        }

        let frame = match frame {
            Ok(Message::Close(_)) => break,
            Ok(frame) => frame,
            Err(e) => {
                error!("Error reading message from {}: {}", addr, e);
                break;
            }
        };

        let reply = match protocol::decode::<IpcClientMessage>(&frame) {
            Ok(Some(IpcClientMessage::Command { command })) => {
                debug!("Client {} submitted a command", addr);
                bridge.submit(command).err().map(|e| e.to_string())
            }
            Ok(Some(IpcClientMessage::Auth { .. })) => Some("Already authenticated".to_string()),
            Ok(None) => None,
            Err(e) => {
                warn!("Invalid message from {}: {}", addr, e);
                Some(format!("Invalid message: {e}"))
            }
        };

        if let Some(message) = reply {
            if outbound.send(IpcServerMessage::Error { message }).is_err() {
                break;
            }
        }
    }

    info!("Client {} disconnected", addr);

    if let Some(handle) = registration.take() {
        if handle.is_finished() {
            record_registration(&mut state, handle.await, addr);
        } else {
            // Still waiting for the daemon. The hub drops the transport once its
            // snapshot send fails against the stopped writer.
            handle.abort();
        }
    }

    if let Some(id) = state.take_listener() {
        if let Err(e) = bridge.unregister_listener(id) {
            debug!("Could not unregister {}: {}", id, e);
        }
    }

    drop(outbound);
    writer.abort();
    Ok(())
}

fn record_registration(
    state: &mut ConnectionState,
    result: Registration,
    addr: SocketAddr,
) {
    if !state.is_authenticated() {
        return;
    }

    match result {
        Ok(Ok(Some(id))) => {
            debug!("Client {} is {}", addr, id);
            state.set_listener(id);
        }
        Ok(Ok(None)) => warn!("Client {} dropped during snapshot replay", addr),
        Ok(Err(e)) => warn!("Client {} could not register: {}", addr, e),
        Err(e) => warn!("Registration task for {} failed: {}", addr, e),
    }
}

/// Send authentication response to client.
///
/// # Errors
///
/// Returns [`IpcError::Send`] if the frame cannot be written.
async fn send_auth_response(
    write: &mut WsWrite,
    success: bool,
    error: Option<&str>,
) -> Result<(), IpcError> {
    let response = IpcServerMessage::AuthResponse {
        success,
        error: error.map(str::to_string),
    };

    write
        .send(protocol::encode(&response)?)
        .await
        .map_err(|e| IpcError::Send {
            message: format!("Failed to send auth response: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })
}
