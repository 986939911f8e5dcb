//! Daemon event pump.
//!
//! Whenever a daemon connection becomes available, the pump loads the initial service
//! state and then follows the daemon's event stream, forwarding every item to the
//! update channel of the actor that owns it. The pump never publishes feature state
//! itself; the owning actor's loop stays the single writer. Version info has no
//! owning actor and is published here.

use crate::actors::account::AccountUpdate;
use crate::actors::location::LocationUpdate;
use crate::daemon::DaemonClient;
use crate::daemon::models::{
    AccountHistory, AppVersionInfo, DaemonEvent, DeviceState, DnsOptions, RelayList, Settings,
    TunnelState,
};
use crate::sync::{EventNotifier, Intermittent};

use std::sync::Arc;

use futures_util::StreamExt;
use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Where each kind of daemon event goes.
#[derive(Clone)]
pub struct UpdateRoutes {
    pub connection: UnboundedSender<TunnelState>,
    pub location: UnboundedSender<LocationUpdate>,
    pub settings: UnboundedSender<Settings>,
    pub dns: UnboundedSender<DnsOptions>,
    pub relay: UnboundedSender<RelayList>,
    pub account: UnboundedSender<AccountUpdate>,
    pub key_rotation: UnboundedSender<DeviceState>,
    pub version: EventNotifier<AppVersionInfo>,
}

impl UpdateRoutes {
    // A closed channel means its actor has shut down; the event has nowhere to go.
    pub fn route(&self, event: DaemonEvent) {
        match event {
            DaemonEvent::TunnelState(state) => {
                let _ = self.location.send(LocationUpdate::TunnelState(state.clone()));
                let _ = self.connection.send(state);
            }
            DaemonEvent::Settings(settings) => {
                let _ = self.dns.send(settings.tunnel_options.dns_options.clone());
                let _ = self.settings.send(settings);
            }
            DaemonEvent::RelayList(relays) => {
                let _ = self.relay.send(relays);
            }
            DaemonEvent::VersionInfo(version) => self.version.notify(version),
            DaemonEvent::Device(device) => {
                let _ = self.key_rotation.send(device.clone());
                let _ = self.account.send(AccountUpdate::Device(device));
            }
        }
    }

    fn route_history(&self, history: AccountHistory) {
        let _ = self.account.send(AccountUpdate::History(history));
    }

    async fn load_initial_state<D: DaemonClient>(&self, daemon: &D) {
        match daemon.get_tunnel_state().await {
            Ok(state) => self.route(DaemonEvent::TunnelState(state)),
            Err(e) => warn!("Failed to load tunnel state: {e}"),
        }
        match daemon.get_settings().await {
            Ok(settings) => self.route(DaemonEvent::Settings(settings)),
            Err(e) => warn!("Failed to load settings: {e}"),
        }
        match daemon.get_relay_locations().await {
            Ok(relays) => self.route(DaemonEvent::RelayList(relays)),
            Err(e) => warn!("Failed to load relay list: {e}"),
        }
        match daemon.get_version_info().await {
            Ok(version) => self.route(DaemonEvent::VersionInfo(version)),
            Err(e) => warn!("Failed to load version info: {e}"),
        }
        match daemon.get_device().await {
            Ok(device) => self.route(DaemonEvent::Device(device)),
            Err(e) => warn!("Failed to load device state: {e}"),
        }
        match daemon.get_account_history().await {
            Ok(history) => self.route_history(AccountHistory::from(history)),
            Err(e) => warn!("Failed to load account history: {e}"),
        }
    }
}

/// Spawn the pump. It runs until aborted.
pub fn spawn_event_pump<D: DaemonClient>(
    daemon: Intermittent<Arc<D>>,
    routes: UpdateRoutes,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut availability = daemon.subscribe();

        loop {
            let client = daemon.wait().await;
            // Everything up to this client has been seen.
            let _ = availability.borrow_and_update();

            info!("Daemon available, loading initial state");
            routes.load_initial_state(&*client).await;

            let mut events = client.events();
            let cell_changed = loop {
                tokio::select! {
                    event = events.next() => match event {
                        Some(event) => {
                            debug!("Daemon event: {event:?}");
                            routes.route(event);
                        }
                        None => break false,
                    },
                    changed = availability.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        break true;
                    }
                }
            };
            drop(events);
            drop(client);

            if !cell_changed {
                warn!("Daemon event stream ended, waiting for a new connection");
                if availability.changed().await.is_err() {
                    return;
                }
            }
        }
    })
}
