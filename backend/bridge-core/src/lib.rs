//! Local control-plane bridge between a VPN daemon and its UI listeners.
//!
//! The bridge holds an intermittently-available daemon connection and:
//! - serializes mutating commands per feature ([`actors`]),
//! - republishes daemon state to a changing set of listeners ([`hub`]),
//! - replays a consistent snapshot to listeners that attach late,
//! - retries transient lookups with bounded backoff ([`retry`]).
//!
//! Start a [`Bridge`], keep it connected with [`supervise_daemon`], and expose it to
//! UI processes with [`ipc::start_ipc_server`].

pub mod actors;
pub mod bridge;
pub mod command;
pub mod config;
pub mod daemon;
pub mod error;
pub mod event;
pub mod hub;
pub mod ipc;
pub mod retry;
pub mod sync;

pub use bridge::{Bridge, supervise_daemon};
pub use command::BridgeCommand;
pub use config::BridgeConfig;
pub use daemon::{DaemonClient, DaemonConnector};
pub use error::CoreError;
pub use event::Event;
pub use hub::{HubHandle, ListenerId, ListenerTransport};

#[cfg(test)]
mod tests;
