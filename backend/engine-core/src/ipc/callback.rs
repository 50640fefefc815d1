//! Status callback backed by a WebSocket connection.

use crate::codec::{WireStatusSnapshot, snapshot_to_wire};
use crate::proto::{
    IpcServerMessage, IpcStatusSnapshot, STATUS_UPDATE_REQUEST_ID, ipc_server_message,
};
use crate::registry::StatusCallback;
use crate::service::StatusSnapshot;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use log::debug;
use tokio::sync::mpsc::UnboundedSender;

/// Pushes status updates into a connection's outbound queue.
///
/// The connection is considered dead once its writer stops draining the queue
/// (the receiver is dropped), which is what [`StatusCallback::death_watch`] waits for.
/// Every registration creates a fresh `ConnectionCallback`, so one connection may hold
/// several registry entries.
pub struct ConnectionCallback {
    outbound: UnboundedSender<IpcServerMessage>,
}

impl ConnectionCallback {
    pub fn new(outbound: UnboundedSender<IpcServerMessage>) -> Self {
        Self { outbound }
    }
}

impl StatusCallback for ConnectionCallback {
    fn handle_status_update(&self, snapshot: &StatusSnapshot) {
        let message = IpcServerMessage {
            request_id: STATUS_UPDATE_REQUEST_ID,
            payload: Some(ipc_server_message::Payload::StatusUpdate(
                IpcStatusSnapshot::from(&snapshot_to_wire(snapshot)),
            )),
        };

        if self.outbound.send(message).is_err() {
            debug!("Dropped status update for closed connection");
        }
    }

    fn death_watch(&self) -> BoxFuture<'static, ()> {
        let outbound = self.outbound.clone();
        async move { outbound.closed().await }.boxed()
    }
}

impl From<&WireStatusSnapshot> for IpcStatusSnapshot {
    fn from(status: &WireStatusSnapshot) -> Self {
        Self {
            last_checked_time: status.last_checked_time,
            progress: status.progress,
            current_operation: status.current_operation.to_le_bytes(),
            new_version: status.new_version.to_le_bytes(),
            new_size: status.new_size,
        }
    }
}
