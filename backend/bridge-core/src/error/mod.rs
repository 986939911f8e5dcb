pub mod actor;
pub mod config;
pub mod daemon;
pub mod fetch;
pub mod ipc;
pub mod transport;

pub use actor::ActorError;
pub use config::ConfigError;
pub use daemon::DaemonError;
pub use fetch::FetchError;
pub use ipc::IpcError;
pub use transport::TransportError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Actor(#[from] ActorError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Daemon(#[from] DaemonError),

    #[error(transparent)]
    Ipc(#[from] IpcError),
}
