use crate::ipc_tests::helpers::{
    BACKEND_FAILURE, CURRENT_CHANNEL, PREV_VERSION, TEST_AUTH_TOKEN, authenticate, call,
    connect_authenticated, connect_to_server, decode_text, encode_text, is_connection_closed,
    receive_protobuf, send_protobuf, start_test_ipc_server,
};

use engine_core::dispatch::SERVICE_SPECIFIC_ERROR_CODE;
use engine_core::proto::{
    IpcAuthHandshake, IpcClientMessage, IpcEmptyRequest, IpcErrorCode, IpcGetChannelRequest,
    IpcServerMessage, IpcSetChannelRequest, STATUS_UPDATE_REQUEST_ID, ipc_call_response,
    ipc_client_message, ipc_server_message,
};

use futures_util::SinkExt;
use tokio::time::{Duration, sleep, timeout};
use tokio_tungstenite::tungstenite::Message;

/// **VALUE**: Verifies the handshake accepts the configured token.
///
/// **BUG THIS CATCHES**: Would catch if the token comparison or the response framing
/// breaks, which would lock every client out.
#[tokio::test]
async fn given_valid_token_when_authenticating_then_succeeds() {
    // GIVEN: IPC server running on an ephemeral port
    let server = start_test_ipc_server()
        .await
        .expect("Failed to start IPC server");
    assert_eq!(server.handle.auth_token(), TEST_AUTH_TOKEN);

    // WHEN: Client authenticates with the configured token
    let mut ws = connect_to_server(server.handle.port()).await;
    let response = authenticate(&mut ws, TEST_AUTH_TOKEN).await;

    // THEN: Handshake succeeds with no error text
    assert!(response.success);
    assert!(response.error.is_none());
}

/// **VALUE**: Verifies the server handle can be logged without leaking the token.
///
/// **BUG THIS CATCHES**: Would catch the handle's Debug output printing the token, which
/// the daemon logs at startup.
#[tokio::test]
async fn given_server_handle_when_debug_formatted_then_token_redacted() {
    let server = start_test_ipc_server()
        .await
        .expect("Failed to start IPC server");

    let logged = format!("{:?}", server.handle);

    assert!(!logged.contains(TEST_AUTH_TOKEN), "Token leaked: {logged}");
    assert!(logged.contains("REDACTED"));
    assert_eq!(server.handle.auth_token(), TEST_AUTH_TOKEN);
}

/// **VALUE**: Verifies a wrong token is refused and the connection is closed.
///
/// **WHY THIS MATTERS**: The token is the only thing keeping other local processes from
/// driving the update engine.
#[tokio::test]
async fn given_invalid_token_when_authenticating_then_rejected_and_closed() {
    let server = start_test_ipc_server()
        .await
        .expect("Failed to start IPC server");
    let mut ws = connect_to_server(server.handle.port()).await;

    let response = authenticate(&mut ws, "wrong-token").await;

    assert!(!response.success);
    assert!(response.error.is_some());
    assert!(
        is_connection_closed(&mut ws).await,
        "Server should close connection after failed auth"
    );
}

#[tokio::test]
async fn given_non_auth_first_message_when_sent_then_connection_closed() {
    let server = start_test_ipc_server()
        .await
        .expect("Failed to start IPC server");
    let mut ws = connect_to_server(server.handle.port()).await;

    let msg = IpcClientMessage {
        request_id: 5,
        payload: Some(ipc_client_message::Payload::ResetStatus(IpcEmptyRequest {})),
    };
    send_protobuf(&mut ws, &msg).await;

    assert!(is_connection_closed(&mut ws).await);
    assert!(
        server.service.calls_made() == 0,
        "Unauthenticated request must never reach the backend"
    );
}

/// **VALUE**: Verifies a successful query carries status 0 and its output.
#[tokio::test]
async fn given_authenticated_when_get_channel_then_returns_channel_text() {
    let server = start_test_ipc_server()
        .await
        .expect("Failed to start IPC server");
    let mut ws = connect_authenticated(server.handle.port()).await;

    let response = call(
        &mut ws,
        2,
        ipc_client_message::Payload::GetChannel(IpcGetChannelRequest {
            get_current_channel: true,
        }),
    )
    .await;

    let status = response.status.expect("status present");
    assert_eq!(status.code, 0);
    assert!(status.message.is_empty());
    match response.output {
        Some(ipc_call_response::Output::StringValue(bytes)) => {
            assert_eq!(decode_text(&bytes), CURRENT_CHANNEL);
        }
        other => panic!("Expected string output, got {:?}", other),
    }
}

#[tokio::test]
async fn given_authenticated_when_multiple_requests_then_each_answered_in_order() {
    let server = start_test_ipc_server()
        .await
        .expect("Failed to start IPC server");
    let mut ws = connect_authenticated(server.handle.port()).await;

    let rollback = call(
        &mut ws,
        2,
        ipc_client_message::Payload::CanRollback(IpcEmptyRequest {}),
    )
    .await;
    let duration = call(
        &mut ws,
        3,
        ipc_client_message::Payload::GetDurationSinceUpdate(IpcEmptyRequest {}),
    )
    .await;
    let status = call(
        &mut ws,
        4,
        ipc_client_message::Payload::GetStatus(IpcEmptyRequest {}),
    )
    .await;

    assert_eq!(
        rollback.output,
        Some(ipc_call_response::Output::BoolValue(true))
    );
    assert_eq!(
        duration.output,
        Some(ipc_call_response::Output::Int64Value(1_000_000))
    );
    match status.output {
        Some(ipc_call_response::Output::Status(snapshot)) => {
            assert_eq!(snapshot.last_checked_time, 42);
            assert_eq!(decode_text(&snapshot.current_operation), "IDLE");
            assert!(snapshot.new_version.is_empty());
        }
        other => panic!("Expected status output, got {:?}", other),
    }
}

/// **VALUE**: Verifies backend failures surface as a service-specific status carrying
/// the backend's message.
///
/// **BUG THIS CATCHES**: Would catch if a failed call reports success, drops the message,
/// or still attaches an output the backend never produced.
#[tokio::test]
async fn given_failing_backend_when_queried_then_returns_service_specific_status() {
    let server = start_test_ipc_server()
        .await
        .expect("Failed to start IPC server");
    server.service.set_failing(true);
    let mut ws = connect_authenticated(server.handle.port()).await;

    let status_response = call(
        &mut ws,
        2,
        ipc_client_message::Payload::GetStatus(IpcEmptyRequest {}),
    )
    .await;
    let version_response = call(
        &mut ws,
        3,
        ipc_client_message::Payload::GetPrevVersion(IpcEmptyRequest {}),
    )
    .await;

    let status = status_response.status.expect("status present");
    assert_eq!(status.code, SERVICE_SPECIFIC_ERROR_CODE);
    assert_eq!(status.message, BACKEND_FAILURE);
    assert!(status_response.output.is_none());

    // Version queries always write their slot, empty on failure
    let status = version_response.status.expect("status present");
    assert_eq!(status.code, SERVICE_SPECIFIC_ERROR_CODE);
    assert_eq!(
        version_response.output,
        Some(ipc_call_response::Output::StringValue(Vec::new()))
    );
}

#[tokio::test]
async fn given_recovered_backend_when_queried_then_succeeds_again() {
    let server = start_test_ipc_server()
        .await
        .expect("Failed to start IPC server");
    let mut ws = connect_authenticated(server.handle.port()).await;

    server.service.set_failing(true);
    let failed = call(
        &mut ws,
        2,
        ipc_client_message::Payload::GetPrevVersion(IpcEmptyRequest {}),
    )
    .await;
    server.service.set_failing(false);
    let recovered = call(
        &mut ws,
        3,
        ipc_client_message::Payload::GetPrevVersion(IpcEmptyRequest {}),
    )
    .await;

    assert_eq!(failed.status.map(|s| s.code), Some(SERVICE_SPECIFIC_ERROR_CODE));
    assert_eq!(recovered.status.map(|s| s.code), Some(0));
    match recovered.output {
        Some(ipc_call_response::Output::StringValue(bytes)) => {
            assert_eq!(decode_text(&bytes), PREV_VERSION);
        }
        other => panic!("Expected string output, got {:?}", other),
    }
}

/// **VALUE**: Verifies text arguments with an odd byte count are rejected before the
/// backend sees them.
#[tokio::test]
async fn given_odd_length_text_when_set_channel_then_invalid_message_error() {
    let server = start_test_ipc_server()
        .await
        .expect("Failed to start IPC server");
    let mut ws = connect_authenticated(server.handle.port()).await;

    let msg = IpcClientMessage {
        request_id: 7,
        payload: Some(ipc_client_message::Payload::SetChannel(
            IpcSetChannelRequest {
                target_channel: vec![0x62, 0x00, 0x65],
                powerwash: false,
            },
        )),
    };
    send_protobuf(&mut ws, &msg).await;

    let response: IpcServerMessage = receive_protobuf(&mut ws).await;
    assert_eq!(response.request_id, 7);
    match response.payload {
        Some(ipc_server_message::Payload::Error(error)) => {
            assert_eq!(error.code, IpcErrorCode::InvalidMessage as i32);
        }
        other => panic!("Expected Error payload, got {:?}", other),
    }
    assert_eq!(server.service.calls_made(), 0);
}

#[tokio::test]
async fn given_well_formed_text_when_set_channel_then_ok() {
    let server = start_test_ipc_server()
        .await
        .expect("Failed to start IPC server");
    let mut ws = connect_authenticated(server.handle.port()).await;

    let response = call(
        &mut ws,
        2,
        ipc_client_message::Payload::SetChannel(IpcSetChannelRequest {
            target_channel: encode_text("beta-channel"),
            powerwash: true,
        }),
    )
    .await;

    assert_eq!(response.status.map(|s| s.code), Some(0));
    assert!(response.output.is_none());
}

#[tokio::test]
async fn given_garbage_bytes_when_sent_then_invalid_message_and_connection_survives() {
    let server = start_test_ipc_server()
        .await
        .expect("Failed to start IPC server");
    let mut ws = connect_authenticated(server.handle.port()).await;

    ws.send(Message::Binary(vec![0xFF, 0xFF, 0xFF].into()))
        .await
        .expect("Failed to send garbage");

    let response: IpcServerMessage = receive_protobuf(&mut ws).await;
    assert_eq!(response.request_id, 0);
    assert!(matches!(
        response.payload,
        Some(ipc_server_message::Payload::Error(ref error))
            if error.code == IpcErrorCode::InvalidMessage as i32
    ));

    let follow_up = call(
        &mut ws,
        2,
        ipc_client_message::Payload::ResetStatus(IpcEmptyRequest {}),
    )
    .await;
    assert_eq!(follow_up.status.map(|s| s.code), Some(0));
}

#[tokio::test]
async fn given_repeated_auth_handshake_when_sent_then_auth_error() {
    let server = start_test_ipc_server()
        .await
        .expect("Failed to start IPC server");
    let mut ws = connect_authenticated(server.handle.port()).await;

    let msg = IpcClientMessage {
        request_id: 9,
        payload: Some(ipc_client_message::Payload::AuthHandshake(
            IpcAuthHandshake {
                token: TEST_AUTH_TOKEN.to_string(),
            },
        )),
    };
    send_protobuf(&mut ws, &msg).await;

    let response: IpcServerMessage = receive_protobuf(&mut ws).await;
    assert_eq!(response.request_id, 9);
    assert!(matches!(
        response.payload,
        Some(ipc_server_message::Payload::Error(ref error))
            if error.code == IpcErrorCode::AuthError as i32
    ));
}

/// **VALUE**: Verifies a registered connection receives broadcast status pushes.
///
/// **WHY THIS MATTERS**: Status callbacks are how clients follow update progress without
/// polling.
#[tokio::test]
async fn given_registered_callback_when_status_broadcast_then_client_receives_update() {
    // GIVEN: An authenticated client registered for status callbacks
    let server = start_test_ipc_server()
        .await
        .expect("Failed to start IPC server");
    let mut ws = connect_authenticated(server.handle.port()).await;
    let registered = call(
        &mut ws,
        2,
        ipc_client_message::Payload::RegisterStatusCallback(IpcEmptyRequest {}),
    )
    .await;
    assert_eq!(registered.status.map(|s| s.code), Some(0));
    assert_eq!(server.facade.subscriber_count().await, 1);

    // WHEN: The engine broadcasts a status change
    server
        .facade
        .send_status_update(100, 0.25, "DOWNLOADING", "1.2.3", 5000)
        .await;

    // THEN: The client receives it as an unsolicited StatusUpdate
    let push: IpcServerMessage = receive_protobuf(&mut ws).await;
    assert_eq!(push.request_id, STATUS_UPDATE_REQUEST_ID);
    match push.payload {
        Some(ipc_server_message::Payload::StatusUpdate(update)) => {
            assert_eq!(update.last_checked_time, 100);
            assert_eq!(update.progress, 0.25);
            assert_eq!(decode_text(&update.current_operation), "DOWNLOADING");
            assert_eq!(decode_text(&update.new_version), "1.2.3");
            assert_eq!(update.new_size, 5000);
        }
        other => panic!("Expected StatusUpdate, got {:?}", other),
    }
}

/// **VALUE**: Verifies a closed connection is dropped from the subscriber list.
///
/// **BUG THIS CATCHES**: Would catch callbacks leaking after their client is gone, which
/// grows the list forever and pushes into dead queues on every broadcast.
#[tokio::test]
async fn given_registered_client_when_disconnected_then_subscriber_removed() {
    let server = start_test_ipc_server()
        .await
        .expect("Failed to start IPC server");
    let mut staying = connect_authenticated(server.handle.port()).await;
    let mut leaving = connect_authenticated(server.handle.port()).await;
    for ws in [&mut staying, &mut leaving] {
        call(
            ws,
            2,
            ipc_client_message::Payload::RegisterStatusCallback(IpcEmptyRequest {}),
        )
        .await;
    }
    assert_eq!(server.facade.subscriber_count().await, 2);

    leaving.close(None).await.expect("Failed to close socket");
    drop(leaving);

    let removed = timeout(Duration::from_secs(2), async {
        while server.facade.subscriber_count().await != 1 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(removed.is_ok(), "Disconnected subscriber should be removed");

    server
        .facade
        .send_status_update(1, 1.0, "UPDATED_NEED_REBOOT", "1.2.3", 0)
        .await;
    let push: IpcServerMessage = receive_protobuf(&mut staying).await;
    assert_eq!(push.request_id, STATUS_UPDATE_REQUEST_ID);
}
