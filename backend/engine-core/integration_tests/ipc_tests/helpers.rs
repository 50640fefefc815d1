//! Test helpers for IPC integration tests.
//!
//! This module provides utilities for testing the IPC WebSocket server:
//! - A scripted backend with a switchable failure mode
//! - Connecting to server
//! - Sending/receiving protobuf messages
//! - Authentication helpers
//! - Connection state checks

use engine_core::codec::{WireString, to_native};
use engine_core::config::IpcConfig;
use engine_core::error::ipc::IpcError;
use engine_core::facade::UpdateEngineFacade;
use engine_core::ipc::{IpcServerHandle, start_ipc_server};
use engine_core::proto::{
    IpcAuthHandshake, IpcAuthHandshakeResponse, IpcCallResponse, IpcClientMessage,
    IpcServerMessage, ipc_client_message, ipc_server_message,
};
use engine_core::service::{OperationError, StatusSnapshot, UpdateEngineService};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures_util::{SinkExt, StreamExt};
use prost::Message as ProstMessage;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub type TestSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Test constants for authentication
pub const TEST_AUTH_TOKEN: &str = "test-token-12345";

pub const CURRENT_CHANNEL: &str = "stable-channel";
pub const PREV_VERSION: &str = "1.2.2";
pub const BACKEND_FAILURE: &str = "backend unavailable";

/// Backend returning fixed values, or failing every call once `fail` is set.
#[derive(Default)]
pub struct ScriptedService {
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedService {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls_made(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn respond<T>(&self, value: T) -> Result<T, OperationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            Err(OperationError::new(BACKEND_FAILURE))
        } else {
            Ok(value)
        }
    }
}

impl UpdateEngineService for ScriptedService {
    fn attempt_update(
        &self,
        _app_version: &str,
        _omaha_url: &str,
        _flags: i32,
    ) -> Result<(), OperationError> {
        self.respond(())
    }

    fn attempt_rollback(&self, _powerwash: bool) -> Result<(), OperationError> {
        self.respond(())
    }

    fn can_rollback(&self) -> Result<bool, OperationError> {
        self.respond(true)
    }

    fn reset_status(&self) -> Result<(), OperationError> {
        self.respond(())
    }

    fn get_status(&self) -> Result<StatusSnapshot, OperationError> {
        self.respond(StatusSnapshot {
            last_checked_time: 42,
            progress: 0.0,
            current_operation: "IDLE".to_string(),
            new_version: String::new(),
            new_size: 0,
        })
    }

    fn reboot_if_needed(&self) -> Result<(), OperationError> {
        self.respond(())
    }

    fn set_channel(&self, _target_channel: &str, _powerwash: bool) -> Result<(), OperationError> {
        self.respond(())
    }

    fn get_channel(&self, _get_current_channel: bool) -> Result<String, OperationError> {
        self.respond(CURRENT_CHANNEL.to_string())
    }

    fn set_p2p_update_permission(&self, _enabled: bool) -> Result<(), OperationError> {
        self.respond(())
    }

    fn get_p2p_update_permission(&self) -> Result<bool, OperationError> {
        self.respond(true)
    }

    fn set_update_over_cellular_permission(&self, _enabled: bool) -> Result<(), OperationError> {
        self.respond(())
    }

    fn get_update_over_cellular_permission(&self) -> Result<bool, OperationError> {
        self.respond(false)
    }

    fn get_duration_since_update(&self) -> Result<i64, OperationError> {
        self.respond(1_000_000)
    }

    fn get_prev_version(&self) -> Result<String, OperationError> {
        self.respond(PREV_VERSION.to_string())
    }

    fn get_rollback_partition(&self) -> Result<String, OperationError> {
        self.respond("/dev/sda5".to_string())
    }
}

/// A running server plus handles on its façade and backend.
pub struct TestServer {
    pub handle: IpcServerHandle,
    pub facade: UpdateEngineFacade,
    pub service: Arc<ScriptedService>,
}

/// Test helper: Start the IPC server on an ephemeral port with the test token.
pub async fn start_test_ipc_server() -> Result<TestServer, IpcError> {
    let service = Arc::new(ScriptedService::default());
    let backend: Arc<dyn UpdateEngineService> = service.clone();
    let facade = UpdateEngineFacade::new(backend);
    let config = IpcConfig {
        port: 0,
        auth_token: Some(String::from(TEST_AUTH_TOKEN)),
    };

    let handle = start_ipc_server(&config, facade.clone()).await?;

    Ok(TestServer {
        handle,
        facade,
        service,
    })
}

/// Test helper: Connect to IPC server and return WebSocket stream.
pub async fn connect_to_server(ipc_port: u16) -> TestSocket {
    let url = format!("ws://127.0.0.1:{}", ipc_port);
    let (ws_stream, _) = connect_async(&url)
        .await
        .expect("Failed to connect to WebSocket server");
    ws_stream
}

/// Test helper: Connect and authenticate with the test token.
pub async fn connect_authenticated(ipc_port: u16) -> TestSocket {
    let mut ws = connect_to_server(ipc_port).await;
    let auth_response = authenticate(&mut ws, TEST_AUTH_TOKEN).await;
    assert!(auth_response.success, "Auth should succeed");
    ws
}

/// Test helper: Send protobuf message over WebSocket.
pub async fn send_protobuf<T: ProstMessage>(ws: &mut TestSocket, message: &T) {
    let mut buf = Vec::new();
    message.encode(&mut buf).expect("Failed to encode protobuf");
    ws.send(Message::Binary(buf.into()))
        .await
        .expect("Failed to send message");
}

/// Test helper: Receive and decode protobuf message.
pub async fn receive_protobuf<T: ProstMessage + Default>(ws: &mut TestSocket) -> T {
    let msg = tokio::time::timeout(tokio::time::Duration::from_secs(2), ws.next())
        .await
        .expect("Timed out waiting for message")
        .expect("No message received")
        .expect("Error receiving message");

    let bytes = msg.into_data();
    T::decode(&bytes[..]).expect("Failed to decode protobuf")
}

/// Test helper: Send auth handshake and return response.
pub async fn authenticate(ws: &mut TestSocket, token: &str) -> IpcAuthHandshakeResponse {
    let auth_msg = IpcClientMessage {
        request_id: 1,
        payload: Some(ipc_client_message::Payload::AuthHandshake(
            IpcAuthHandshake {
                token: token.to_string(),
            },
        )),
    };

    send_protobuf(ws, &auth_msg).await;

    let response: IpcServerMessage = receive_protobuf(ws).await;
    match response.payload {
        Some(ipc_server_message::Payload::AuthHandshakeResponse(resp)) => resp,
        _ => panic!("Expected AuthHandshakeResponse, got something else"),
    }
}

/// Test helper: Send one request and return the matching call response.
pub async fn call(
    ws: &mut TestSocket,
    request_id: u64,
    payload: ipc_client_message::Payload,
) -> IpcCallResponse {
    let msg = IpcClientMessage {
        request_id,
        payload: Some(payload),
    };
    send_protobuf(ws, &msg).await;

    let response: IpcServerMessage = receive_protobuf(ws).await;
    assert_eq!(
        response.request_id, request_id,
        "Should receive response with matching request_id"
    );
    match response.payload {
        Some(ipc_server_message::Payload::CallResponse(resp)) => resp,
        other => panic!("Expected CallResponse, got {:?}", other),
    }
}

/// Test helper: Decode a UTF-16LE protobuf field.
pub fn decode_text(bytes: &[u8]) -> String {
    to_native(&WireString::from_le_bytes(bytes).expect("Even-length UTF-16LE bytes"))
}

pub fn encode_text(text: &str) -> Vec<u8> {
    WireString::from(text).to_le_bytes()
}

/// Test helper: Check if WebSocket connection is closed.
pub async fn is_connection_closed(ws: &mut TestSocket) -> bool {
    match tokio::time::timeout(tokio::time::Duration::from_millis(100), ws.next()).await {
        Err(_) => true,
        Ok(None) => true,
        Ok(Some(Ok(Message::Close(_)))) => true,
        Ok(Some(Ok(_))) => false,
        Ok(Some(Err(_))) => true,
    }
}
