//! IPC server handle type.

use common::RedactedToken;

use std::net::SocketAddr;

/// Handle to a running IPC WebSocket server.
///
/// Returned by [`start_ipc_server`](crate::ipc::start_ipc_server). Dropping it does
/// **not** stop the server; the accept loop runs until the process exits. Debug output
/// redacts the token.
#[derive(Debug, Clone)]
pub struct IpcServerHandle {
    local_addr: SocketAddr,
    auth_token: RedactedToken,
}

impl IpcServerHandle {
    pub(crate) fn new(local_addr: SocketAddr, auth_token: RedactedToken) -> Self {
        Self {
            local_addr,
            auth_token,
        }
    }

    /// Address actually bound, useful when the configured port was 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Token clients must present in their auth handshake.
    pub fn auth_token(&self) -> &str {
        self.auth_token.as_str()
    }
}
