// Unit tests for the connection-backed status callback

use crate::codec::{WireString, to_native};
use crate::ipc::ConnectionCallback;
use crate::proto::{STATUS_UPDATE_REQUEST_ID, ipc_server_message};
use crate::registry::{StatusCallback, SubscriberRegistry};
use crate::tests::support::{eventually, sample_status};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::unbounded_channel;

/// **VALUE**: A push lands in the connection's outbound queue as a StatusUpdate with
/// request ID 0 and UTF-16LE text fields.
#[test]
fn given_status_update_when_pushed_then_enqueued_as_status_message() {
    let (tx, mut rx) = unbounded_channel();
    let callback = ConnectionCallback::new(tx);

    callback.handle_status_update(&sample_status());

    let message = rx.try_recv().expect("status update should be queued");
    assert_eq!(message.request_id, STATUS_UPDATE_REQUEST_ID);
    let Some(ipc_server_message::Payload::StatusUpdate(update)) = message.payload else {
        panic!("Expected StatusUpdate payload");
    };
    assert_eq!(update.last_checked_time, 100);
    assert_eq!(update.progress, 0.5);
    let operation = WireString::from_le_bytes(&update.current_operation).unwrap();
    assert_eq!(to_native(&operation), "DOWNLOADING");
    let version = WireString::from_le_bytes(&update.new_version).unwrap();
    assert_eq!(to_native(&version), "1.2.3");
    assert_eq!(update.new_size, 5000);
}

/// **VALUE**: Pushing to a closed connection is silently dropped.
///
/// **BUG THIS CATCHES**: Would catch a panic on send error that would abort the
/// broadcast for every later subscriber.
#[test]
fn given_closed_connection_when_pushed_then_dropped_without_panic() {
    let (tx, rx) = unbounded_channel();
    let callback = ConnectionCallback::new(tx);
    drop(rx);

    callback.handle_status_update(&sample_status());
}

#[tokio::test]
async fn given_open_connection_then_death_watch_stays_pending() {
    let (tx, _rx) = unbounded_channel();
    let callback = ConnectionCallback::new(tx);

    let fired = tokio::time::timeout(Duration::from_millis(50), callback.death_watch()).await;

    assert!(fired.is_err(), "Watch must not fire while the queue is open");
}

/// **VALUE**: Closing the outbound queue removes the callback from the registry.
///
/// **WHY THIS MATTERS**: This is the disconnect path for real subscribers.
#[tokio::test]
async fn given_registered_connection_when_queue_closes_then_removed_from_registry() {
    let registry = SubscriberRegistry::new();
    let (tx, rx) = unbounded_channel();
    registry
        .register(Arc::new(ConnectionCallback::new(tx)))
        .await;
    assert_eq!(registry.len().await, 1);

    drop(rx);

    eventually(|| {
        let registry = registry.clone();
        async move { registry.is_empty().await }
    })
    .await;
}
