//! IPC server handle type.

use std::net::SocketAddr;

use log::info;
use tokio::task::JoinHandle;

/// Handle to a running IPC WebSocket server.
///
/// Dropping the handle leaves the server running; call [`IpcServerHandle::shutdown`]
/// to stop accepting connections. Connections already accepted keep running until
/// their client disconnects.
pub struct IpcServerHandle {
    pub(crate) local_addr: SocketAddr,
    pub(crate) auth_token: String,
    pub(crate) accept_task: JoinHandle<()>,
}

impl IpcServerHandle {
    /// Address actually bound (useful when started on port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Token clients must present in their first frame.
    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    /// WebSocket URL for local clients.
    pub fn url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    pub fn shutdown(&self) {
        info!("IPC server on {} shutting down", self.local_addr);
        self.accept_task.abort();
    }
}
