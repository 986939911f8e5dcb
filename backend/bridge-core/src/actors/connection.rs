//! Tunnel connect/disconnect.
//!
//! Conflated: if the user mashes connect and disconnect while a call is in flight,
//! only their last intent is sent.

use crate::actors::{BackpressurePolicy, Feature};
use crate::daemon::DaemonClient;
use crate::daemon::models::TunnelState;
use crate::error::daemon::DaemonError;
use crate::sync::EventNotifier;

use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionCommand {
    Connect,
    Reconnect,
    Disconnect,
}

pub struct ConnectionActor {
    tunnel_state: EventNotifier<TunnelState>,
}

impl ConnectionActor {
    pub fn new(tunnel_state: EventNotifier<TunnelState>) -> Self {
        Self { tunnel_state }
    }
}

impl<D: DaemonClient> Feature<D> for ConnectionActor {
    type Command = ConnectionCommand;
    type Update = TunnelState;

    const NAME: &'static str = "connection";
    const POLICY: BackpressurePolicy = BackpressurePolicy::Conflated;

    async fn execute(&mut self, daemon: &D, command: ConnectionCommand) -> Result<(), DaemonError> {
        let acted = match command {
            ConnectionCommand::Connect => daemon.connect_tunnel().await?,
            ConnectionCommand::Reconnect => daemon.reconnect_tunnel().await?,
            ConnectionCommand::Disconnect => daemon.disconnect_tunnel().await?,
        };

        if !acted {
            debug!("Daemon ignored {command:?} in its current state");
        }
        Ok(())
    }

    fn apply(&mut self, state: TunnelState) {
        self.tunnel_state.notify(state);
    }
}
