//! IPC WebSocket server implementation.
//!
//! The server:
//!
//! - Listens on localhost only
//! - Uses binary protobuf messages
//! - Requires an authentication handshake before any call
//! - Serves each connection on its own task
//!
//! # Connection layout
//!
//! After authentication a connection is split in two. The reader task decodes
//! requests, calls the façade and enqueues responses. A writer task owns the sink and
//! drains the outbound queue, which is also where status pushes land. When the reader
//! finishes, the writer is aborted; dropping its queue receiver is the disconnect signal
//! that removes the connection's status callbacks from the registry.

use crate::codec::{WireStatusSnapshot, WireString};
use crate::config::IpcConfig;
use crate::dispatch::WireStatus;
use crate::error::ipc::IpcError;
use crate::facade::UpdateEngineFacade;
use crate::ipc::callback::ConnectionCallback;
use crate::ipc::connection_state::ConnectionState;
use crate::ipc::handle::IpcServerHandle;
use crate::proto::IpcErrorCode::{AuthError, InternalError, InvalidMessage};
use crate::proto::{
    AUTH_REQUEST_ID, IpcAuthHandshakeResponse, IpcCallResponse, IpcClientMessage, IpcErrorCode,
    IpcErrorResponse, IpcServerMessage, IpcStatus, IpcStatusSnapshot, ipc_call_response,
    ipc_client_message, ipc_server_message,
};

use common::{ErrorLocation, RedactedToken};

use std::net::SocketAddr;
use std::panic::Location;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use prost::Message as ProstMessage;
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn as TokioSpawn;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use uuid::Uuid;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

/// Starts the IPC WebSocket server.
///
/// Binds `127.0.0.1:<config.port>` and spawns a background task accepting WebSocket
/// connections. Port 0 binds an ephemeral port; read it back from the handle.
///
/// # Returns
///
/// Returns [`IpcServerHandle`] carrying the bound address and the auth token in use.
///
/// # Errors
///
/// Returns [`IpcError::Io`] if the port is in use or cannot be bound.
pub async fn start_ipc_server(
    config: &IpcConfig,
    facade: UpdateEngineFacade,
) -> Result<IpcServerHandle, IpcError> {
    // Generated tokens are logged exactly once, configured ones never
    let auth_token = RedactedToken::new(config.auth_token.clone().unwrap_or_else(|| {
        let token = Uuid::new_v4().to_string();
        info!("Generated IPC auth token: {}", token);
        token
    }));

    let address = format!("127.0.0.1:{}", config.port);
    let listener = TcpListener::bind(&address).await?;
    let local_addr = listener.local_addr()?;

    info!("IPC server listening on {}", local_addr);

    let token_for_accept = auth_token.clone();
    TokioSpawn(async move {
        while let Ok((stream, addr)) = listener.accept().await {
            info!("Client connecting from {}", addr);
            let token_clone = token_for_accept.as_str().to_string();
            let facade_clone = facade.clone();
            TokioSpawn(async move {
                if let Err(e) = handle_connection(stream, addr, token_clone, facade_clone).await {
                    error!("Connection from {} ended with error: {}", addr, e);
                }
            });
        }
    });

    Ok(IpcServerHandle::new(local_addr, auth_token))
}

/// Handles a single WebSocket connection.
///
/// 1. Rejects non-loopback peers
/// 2. Performs the WebSocket handshake
/// 3. Requires an auth handshake as the first message
/// 4. Serves requests until the client disconnects
///
/// # Errors
///
/// - [`IpcError::Handshake`] - WebSocket upgrade failed
/// - [`IpcError::Auth`] - Wrong token, or first message was not an auth handshake
/// - [`IpcError::ProtobufDecode`] - First message was not valid protobuf
/// - [`IpcError::Send`] - Failed to send to the client
/// - [`IpcError::Read`] - Failed to read from the client
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    auth_token: String,
    facade: UpdateEngineFacade,
) -> Result<(), IpcError> {
    if !addr.ip().is_loopback() {
        warn!("Rejected non-loopback connection from {}", addr);
        return Ok(());
    }

    let ws_stream = accept_async(stream).await.map_err(|e| IpcError::Handshake {
        message: format!("WebSocket handshake failed: {}", e),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let (mut write, mut read) = ws_stream.split();
    let mut state = ConnectionState::new(auth_token);

    authenticate(&mut write, &mut read, &mut state, addr).await?;
    if !state.is_authenticated() {
        return Ok(());
    }

    let (outbound_tx, mut outbound_rx) = unbounded_channel::<IpcServerMessage>();
    let writer = TokioSpawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if let Err(e) = send_protobuf_response(&mut write, &message).await {
                error!("Writer for {} stopped: {}", addr, e);
                break;
            }
        }
    });

    let result = serve_requests(&mut read, &facade, &outbound_tx, addr).await;

    // Dropping the receiver fires the death watch of every callback this connection registered.
    writer.abort();
    info!("Client {} disconnected", addr);
    result
}

/// Read and check the auth handshake.
///
/// Returns [`IpcError::Auth`] after answering a bad token, or when the first message is
/// not a handshake. A client that leaves or sends non-binary data first gets `Ok` with
/// `state` still unauthenticated.
async fn authenticate(
    write: &mut WsSink,
    read: &mut WsSource,
    state: &mut ConnectionState,
    addr: SocketAddr,
) -> Result<(), IpcError> {
    let Some(msg) = read.next().await else {
        warn!("Client {} disconnected before sending auth", addr);
        return Ok(());
    };

    match msg {
        Ok(Message::Binary(data)) => {
            let client_msg = IpcClientMessage::decode(&data[..])?;

            match client_msg.payload {
                Some(ipc_client_message::Payload::AuthHandshake(auth)) => {
                    if state.validate_token(&auth.token) {
                        info!("Client {} authenticated successfully", addr);
                        send_auth_response(write, true, None).await
                    } else {
                        warn!("Client {} auth failed: invalid token", addr);
                        send_auth_response(write, false, Some("Invalid authentication token"))
                            .await?;
                        Err(IpcError::Auth {
                            message: format!("Client {addr} presented an invalid token"),
                            location: ErrorLocation::from(Location::caller()),
                        })
                    }
                }
                _ => Err(IpcError::Auth {
                    message: format!("First message from {addr} was not an auth handshake"),
                    location: ErrorLocation::from(Location::caller()),
                }),
            }
        }
        Ok(_) => {
            warn!("Client {} sent non-binary first message", addr);
            Ok(())
        }
        Err(e) => Err(IpcError::Read {
            message: format!("Error reading first message: {}", e),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}

/// Main message loop for an authenticated connection.
async fn serve_requests(
    read: &mut WsSource,
    facade: &UpdateEngineFacade,
    outbound: &UnboundedSender<IpcServerMessage>,
    addr: SocketAddr,
) -> Result<(), IpcError> {
    while let Some(msg) = read.next().await {
        let data = match msg {
            Ok(Message::Binary(data)) => data,
            Ok(Message::Close(_)) => break,
            Ok(_) => {
                debug!("Client {} sent non-binary message after auth", addr);
                continue;
            }
            Err(e) => {
                return Err(IpcError::Read {
                    message: format!("Error reading message: {}", e),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        let client_msg = match IpcClientMessage::decode(&data[..]) {
            Ok(msg) => msg,
            Err(e) => {
                error!("Failed to decode protobuf from {}: {}", addr, e);
                enqueue(outbound, error_message(0, InvalidMessage, "Invalid protobuf message"))?;
                continue;
            }
        };

        let request_id = client_msg.request_id;
        let Some(payload) = client_msg.payload else {
            warn!("Client {} sent message with no payload", addr);
            enqueue(
                outbound,
                error_message(request_id, InvalidMessage, "No payload in message"),
            )?;
            continue;
        };

        let response = match handle_message(payload, facade, outbound).await {
            Ok(payload) => IpcServerMessage {
                request_id,
                payload: Some(payload),
            },
            Err(IpcError::InvalidMessage { message, .. }) => {
                warn!("Invalid request from {}: {}", addr, message);
                error_message(request_id, InvalidMessage, &message)
            }
            Err(e) => {
                error!("Error handling message from {}: {}", addr, e);
                error_message(request_id, InternalError, &e.to_string())
            }
        };

        enqueue(outbound, response)?;
    }

    Ok(())
}

/// Route one request to the façade and build the response payload.
async fn handle_message(
    payload: ipc_client_message::Payload,
    facade: &UpdateEngineFacade,
    outbound: &UnboundedSender<IpcServerMessage>,
) -> Result<ipc_server_message::Payload, IpcError> {
    use ipc_call_response::Output;
    use ipc_client_message::Payload;

    let response = match payload {
        Payload::AttemptUpdate(req) => {
            info!("Handling attempt_update request");
            let app_version = decode_wire_string(&req.app_version, "app_version")?;
            let omaha_url = decode_wire_string(&req.omaha_url, "omaha_url")?;
            call_response(
                facade.attempt_update(&app_version, &omaha_url, req.flags),
                None,
            )
        }
        Payload::AttemptRollback(req) => {
            info!("Handling attempt_rollback request");
            call_response(facade.attempt_rollback(req.powerwash), None)
        }
        Payload::CanRollback(_) => {
            let mut can_rollback = false;
            let status = facade.can_rollback(&mut can_rollback);
            output_on_success(status, Output::BoolValue(can_rollback))
        }
        Payload::ResetStatus(_) => {
            info!("Handling reset_status request");
            call_response(facade.reset_status(), None)
        }
        Payload::GetStatus(_) => {
            let mut status_out = WireStatusSnapshot::default();
            let status = facade.get_status(&mut status_out);
            output_on_success(status, Output::Status(IpcStatusSnapshot::from(&status_out)))
        }
        Payload::RebootIfNeeded(_) => {
            info!("Handling reboot_if_needed request");
            call_response(facade.reboot_if_needed(), None)
        }
        Payload::SetChannel(req) => {
            info!("Handling set_channel request");
            let target_channel = decode_wire_string(&req.target_channel, "target_channel")?;
            call_response(facade.set_channel(&target_channel, req.powerwash), None)
        }
        Payload::GetChannel(req) => {
            let mut channel = WireString::new();
            let status = facade.get_channel(req.get_current_channel, &mut channel);
            call_response(status, Some(Output::StringValue(channel.to_le_bytes())))
        }
        Payload::SetP2pUpdatePermission(req) => {
            call_response(facade.set_p2p_update_permission(req.enabled), None)
        }
        Payload::GetP2pUpdatePermission(_) => {
            let mut enabled = false;
            let status = facade.get_p2p_update_permission(&mut enabled);
            output_on_success(status, Output::BoolValue(enabled))
        }
        Payload::SetUpdateOverCellularPermission(req) => {
            call_response(facade.set_update_over_cellular_permission(req.enabled), None)
        }
        Payload::GetUpdateOverCellularPermission(_) => {
            let mut enabled = false;
            let status = facade.get_update_over_cellular_permission(&mut enabled);
            output_on_success(status, Output::BoolValue(enabled))
        }
        Payload::GetDurationSinceUpdate(_) => {
            let mut duration = 0;
            let status = facade.get_duration_since_update(&mut duration);
            output_on_success(status, Output::Int64Value(duration))
        }
        Payload::GetPrevVersion(_) => {
            let mut version = WireString::new();
            let status = facade.get_prev_version(&mut version);
            call_response(status, Some(Output::StringValue(version.to_le_bytes())))
        }
        Payload::GetRollbackPartition(_) => {
            let mut partition = WireString::new();
            let status = facade.get_rollback_partition(&mut partition);
            output_on_success(status, Output::StringValue(partition.to_le_bytes()))
        }
        Payload::RegisterStatusCallback(_) => {
            info!("Handling register_status_callback request");
            let callback = Arc::new(ConnectionCallback::new(outbound.clone()));
            call_response(facade.register_status_callback(callback).await, None)
        }
        Payload::AuthHandshake(_) => {
            return Ok(ipc_server_message::Payload::Error(IpcErrorResponse {
                code: AuthError as i32,
                message: "Auth handshake already completed".to_string(),
            }));
        }
    };

    Ok(ipc_server_message::Payload::CallResponse(response))
}

fn call_response(
    status: WireStatus,
    output: Option<ipc_call_response::Output>,
) -> IpcCallResponse {
    IpcCallResponse {
        status: Some(IpcStatus {
            code: status.code(),
            message: status.message().to_string(),
        }),
        output,
    }
}

/// Attach `output` only when the call succeeded; failed calls leave the slot unwritten.
fn output_on_success(status: WireStatus, output: ipc_call_response::Output) -> IpcCallResponse {
    let output = status.is_ok().then_some(output);
    call_response(status, output)
}

#[track_caller]
fn decode_wire_string(bytes: &[u8], field: &str) -> Result<WireString, IpcError> {
    WireString::from_le_bytes(bytes).ok_or_else(|| IpcError::InvalidMessage {
        message: format!("{field} is not valid UTF-16LE (odd byte length {})", bytes.len()),
        location: ErrorLocation::from(Location::caller()),
    })
}

fn error_message(request_id: u64, error_code: IpcErrorCode, message: &str) -> IpcServerMessage {
    IpcServerMessage {
        request_id,
        payload: Some(ipc_server_message::Payload::Error(IpcErrorResponse {
            code: error_code as i32,
            message: message.to_string(),
        })),
    }
}

#[track_caller]
fn enqueue(
    outbound: &UnboundedSender<IpcServerMessage>,
    message: IpcServerMessage,
) -> Result<(), IpcError> {
    outbound.send(message).map_err(|_| IpcError::Send {
        message: "Connection writer stopped".to_string(),
        location: ErrorLocation::from(Location::caller()),
    })
}

/// Send authentication response to client.
///
/// # Errors
///
/// Returns [`IpcError::ProtobufEncode`] if encoding fails, or [`IpcError::Send`] if sending fails.
async fn send_auth_response(
    write: &mut WsSink,
    success: bool,
    error: Option<&str>,
) -> Result<(), IpcError> {
    let response = IpcServerMessage {
        request_id: AUTH_REQUEST_ID,
        payload: Some(ipc_server_message::Payload::AuthHandshakeResponse(
            IpcAuthHandshakeResponse {
                success,
                error: error.map(|s| s.to_string()),
            },
        )),
    };

    send_protobuf_response(write, &response).await
}

/// Send a protobuf response message.
async fn send_protobuf_response(
    write: &mut WsSink,
    response: &IpcServerMessage,
) -> Result<(), IpcError> {
    let mut buf = Vec::with_capacity(response.encoded_len());
    response
        .encode(&mut buf)
        .map_err(|e| IpcError::ProtobufEncode {
            message: format!("Failed to encode response: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    write
        .send(Message::Binary(buf.into()))
        .await
        .map_err(|e| IpcError::Send {
            message: format!("Failed to send response: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
}
