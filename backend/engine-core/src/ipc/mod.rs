//! WebSocket transport for the update engine façade.
//!
//! This module exposes [`UpdateEngineFacade`](crate::facade::UpdateEngineFacade) to
//! local clients:
//!
//! - WebSocket server (localhost-only)
//! - Binary protobuf protocol (see [`crate::proto`])
//! - Authentication handshake as the first message
//! - One request variant per facade operation, plus status callback registration
//!
//! # Status callbacks
//!
//! A `RegisterStatusCallback` request turns the calling connection into a subscriber.
//! Status broadcasts are pushed to it as `StatusUpdate` messages with request ID 0 until
//! the connection closes, at which point the registry drops it.

mod callback;
pub(crate) mod connection_state;
mod handle;
mod server;

pub use callback::ConnectionCallback;
pub use handle::IpcServerHandle;
pub use server::start_ipc_server;
