//! IPC module for WebSocket-based listener transport.
//!
//! UI processes attach to the bridge over a localhost WebSocket. Each authenticated
//! connection becomes one hub listener and may submit [`BridgeCommand`](crate::command::BridgeCommand)s.

pub(crate) mod connection_state;
mod handle;
pub mod protocol;
mod server;

pub use handle::IpcServerHandle;
pub use server::start_ipc_server;

pub const IPC_HOST: &str = "127.0.0.1";
