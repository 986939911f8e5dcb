//! Bridge start-up and shutdown.
//!
//! ```text
//! config.json + .env ─► BridgeConfig ─► logger
//!                                   ├─► Bridge (actors + hub)
//!                                   ├─► IPC server (127.0.0.1:<port>)
//!                                   └─► daemon supervisor (connect / reconnect)
//! ```

use crate::error::ServiceError;
use crate::logger::initialize as LoggerInitialize;

use bridge_core::config::BridgeConfig;
use bridge_core::ipc::{IpcServerHandle, start_ipc_server};
use bridge_core::{Bridge, DaemonClient, DaemonConnector, supervise_daemon};

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::net::SocketAddr;
use std::panic::Location;
use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub const LOG_DIR_NAME: &str = "logs";

/// How long [`BridgeService::shutdown`] waits for the supervisor to notice.
const SUPERVISOR_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// A running bridge with its IPC server and daemon supervisor.
pub struct BridgeService<D: DaemonClient> {
    config: BridgeConfig,
    bridge: Bridge<D>,
    ipc: IpcServerHandle,
    supervisor: JoinHandle<()>,
}

impl<D: DaemonClient> BridgeService<D> {
    /// Load config from `config_dir` (plus `.env` and environment overrides), start
    /// logging into `config_dir/logs`, then [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Config`] if the config is corrupt or invalid
    /// - [`ServiceError::Service`] if the log directory or logger cannot be set up
    /// - [`ServiceError::Ipc`] if the IPC port cannot be bound
    pub async fn launch<C>(connector: C, config_dir: &Path) -> Result<Self, ServiceError>
    where
        C: DaemonConnector<Client = D>,
    {
        let config = BridgeConfig::load_with_env(config_dir)?;

        let log_dir = config_dir.join(LOG_DIR_NAME);
        create_dir_all(&log_dir).map_err(|e| ServiceError::Service {
            message: format!("Failed to create log directory: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        LoggerInitialize(&log_dir, config.log_level_filter())?;
        info!("Log directory: {}", log_dir.display());

        Self::start(connector, config).await
    }

    /// Start the bridge, its IPC server and the daemon supervisor.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Ipc`] if the IPC server cannot bind; the bridge is shut down
    /// again before returning.
    pub async fn start<C>(connector: C, config: BridgeConfig) -> Result<Self, ServiceError>
    where
        C: DaemonConnector<Client = D>,
    {
        info!("Bridge service starting");

        let bridge = Bridge::start(&config.retry);

        let ipc = match start_ipc_server(
            config.ipc.port,
            config.ipc.auth_token.clone(),
            bridge.clone(),
        )
        .await
        {
            Ok(ipc) => ipc,
            Err(e) => {
                bridge.shutdown();
                return Err(e.into());
            }
        };

        info!("IPC server started on {}", ipc.local_addr());

        let supervisor = tokio::spawn(supervise_daemon(connector, bridge.clone()));

        Ok(Self {
            config,
            bridge,
            ipc,
            supervisor,
        })
    }

    pub fn bridge(&self) -> &Bridge<D> {
        &self.bridge
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn ipc_addr(&self) -> SocketAddr {
        self.ipc.local_addr()
    }

    /// Token local clients must present; generated when the config has none.
    pub fn auth_token(&self) -> &str {
        self.ipc.auth_token()
    }

    /// Stop accepting clients, shut the bridge down and wait for the supervisor.
    pub async fn shutdown(self) {
        info!("Bridge service shutting down");

        self.ipc.shutdown();
        self.bridge.shutdown();

        let mut supervisor = self.supervisor;
        match timeout(SUPERVISOR_STOP_TIMEOUT, &mut supervisor).await {
            Ok(Ok(())) => info!("Bridge service stopped"),
            Ok(Err(e)) => warn!("Daemon supervisor failed: {e}"),
            Err(_) => {
                warn!("Daemon supervisor did not stop in time, aborting");
                supervisor.abort();
            }
        }
    }
}
