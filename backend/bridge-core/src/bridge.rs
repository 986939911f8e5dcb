//! The bridge: every actor, the hub and the event pump wired together.
//!
//! ```text
//!                 ┌──────────── Bridge ─────────────┐
//! listeners ─────►│ submit ─► feature actors ─┐     │
//!  (IPC, ...)     │                           ▼     │
//!       ▲         │      daemon ◄── availability    │◄── supervise_daemon
//!       │         │        │          cell          │
//!       │         │        ▼                        │
//!       └─────────│ hub ◄─ notifiers ◄─ event pump  │
//!                 └─────────────────────────────────┘
//! ```

use crate::actors::account::{AccountActor, AccountCommand, AccountNotifiers};
use crate::actors::connection::{ConnectionActor, ConnectionCommand};
use crate::actors::daemon_events::{UpdateRoutes, spawn_event_pump};
use crate::actors::dns::{DnsActor, DnsCommand};
use crate::actors::key_rotation::{KeyRotationActor, KeyRotationCommand};
use crate::actors::location::{LocationActor, LocationCommand};
use crate::actors::relay::{RelayActor, RelayCommand};
use crate::actors::settings::{SettingsActor, SettingsCommand};
use crate::actors::voucher::{VoucherActor, VoucherCommand};
use crate::actors::{ActorHandle, spawn_feature};
use crate::command::BridgeCommand;
use crate::config::RetryConfig;
use crate::daemon::{DaemonClient, DaemonConnector};
use crate::error::actor::ActorError;
use crate::hub::{BroadcastHub, HubHandle, ListenerId, ListenerTransport, SnapshotSources};
use crate::sync::Intermittent;

use std::sync::Arc;
use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep as TokioSleep;

const RECONNECT_MAX_INTERVAL: Duration = Duration::from_secs(30);

struct Actors {
    connection: ActorHandle<ConnectionCommand>,
    settings: ActorHandle<SettingsCommand>,
    dns: ActorHandle<DnsCommand>,
    account: ActorHandle<AccountCommand>,
    location: ActorHandle<LocationCommand>,
    relay: ActorHandle<RelayCommand>,
    voucher: ActorHandle<VoucherCommand>,
    key_rotation: ActorHandle<KeyRotationCommand>,
}

impl Actors {
    fn close(&self) {
        self.connection.close();
        self.settings.close();
        self.dns.close();
        self.account.close();
        self.location.close();
        self.relay.close();
        self.voucher.close();
        self.key_rotation.close();
    }
}

struct BridgeInner<D: DaemonClient> {
    daemon: Intermittent<Arc<D>>,
    sources: SnapshotSources,
    actors: Actors,
    hub: HubHandle,
    hub_task: JoinHandle<()>,
    pump: JoinHandle<()>,
    shut_down: watch::Sender<bool>,
}

/// Handle to a running bridge. Cheap to clone.
pub struct Bridge<D: DaemonClient> {
    inner: Arc<BridgeInner<D>>,
}

impl<D: DaemonClient> Clone for Bridge<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: DaemonClient> Bridge<D> {
    /// Spawn every actor, the hub and the event pump. Must be called inside a tokio
    /// runtime. The bridge starts without a daemon; see [`Bridge::daemon_available`].
    pub fn start(retry: &RetryConfig) -> Self {
        let daemon: Intermittent<Arc<D>> = Intermittent::new();
        let sources = SnapshotSources::default();

        let (connection_tx, connection_rx) = mpsc::unbounded_channel();
        let (settings_tx, settings_rx) = mpsc::unbounded_channel();
        let (dns_tx, dns_rx) = mpsc::unbounded_channel();
        let (account_tx, account_rx) = mpsc::unbounded_channel();
        let (location_tx, location_rx) = mpsc::unbounded_channel();
        let (relay_tx, relay_rx) = mpsc::unbounded_channel();
        let (key_rotation_tx, key_rotation_rx) = mpsc::unbounded_channel();
        let (_voucher_tx, voucher_rx) = mpsc::unbounded_channel();

        let account_notifiers = AccountNotifiers {
            device: sources.device.clone(),
            history: sources.account_history.clone(),
            expiry: sources.account_expiry.clone(),
            login: sources.login.clone(),
            creation: sources.account_creation.clone(),
        };

        let actors = Actors {
            connection: spawn_feature(
                ConnectionActor::new(sources.tunnel_state.clone()),
                daemon.clone(),
                connection_rx,
            ),
            settings: spawn_feature(
                SettingsActor::new(sources.settings.clone()),
                daemon.clone(),
                settings_rx,
            ),
            dns: spawn_feature(
                DnsActor::new(sources.dns_options.clone()),
                daemon.clone(),
                dns_rx,
            ),
            account: spawn_feature(
                AccountActor::new(
                    daemon.clone(),
                    account_notifiers,
                    account_tx.clone(),
                    retry.account_backoff(),
                    retry.cache_ttl(),
                ),
                daemon.clone(),
                account_rx,
            ),
            location: spawn_feature(
                LocationActor::new(
                    daemon.clone(),
                    sources.location.clone(),
                    location_tx.clone(),
                    retry.location_backoff(),
                    retry.cache_ttl(),
                ),
                daemon.clone(),
                location_rx,
            ),
            relay: spawn_feature(
                RelayActor::new(sources.relay_list.clone()),
                daemon.clone(),
                relay_rx,
            ),
            voucher: spawn_feature(
                VoucherActor::new(sources.voucher.clone()),
                daemon.clone(),
                voucher_rx,
            ),
            key_rotation: spawn_feature(
                KeyRotationActor::new(sources.key_status.clone()),
                daemon.clone(),
                key_rotation_rx,
            ),
        };

        let (hub, hub_task) = BroadcastHub::spawn(daemon.clone(), sources.clone());

        let routes = UpdateRoutes {
            connection: connection_tx,
            location: location_tx,
            settings: settings_tx,
            dns: dns_tx,
            relay: relay_tx,
            account: account_tx,
            key_rotation: key_rotation_tx,
            version: sources.version_info.clone(),
        };
        let pump = spawn_event_pump(daemon.clone(), routes);

        info!("Bridge started");

        Self {
            inner: Arc::new(BridgeInner {
                daemon,
                sources,
                actors,
                hub,
                hub_task,
                pump,
                shut_down: watch::Sender::new(false),
            }),
        }
    }

    /// Hand a live daemon connection to the bridge. Queued commands start flowing.
    pub fn daemon_available(&self, client: Arc<D>) {
        info!("Daemon connection available");
        self.inner.daemon.set(client);
    }

    /// The daemon connection dropped. Actors suspend before their next call.
    pub fn daemon_lost(&self) {
        if self.inner.daemon.clear().is_some() {
            warn!("Daemon connection lost");
        }
    }

    pub fn is_daemon_available(&self) -> bool {
        self.inner.daemon.is_available()
    }

    /// Route a listener command to the actor that owns it. Never waits for the daemon.
    ///
    /// # Errors
    ///
    /// [`ActorError::QueueClosed`] after [`Bridge::shutdown`].
    pub fn submit(&self, command: BridgeCommand) -> Result<(), ActorError> {
        let actors = &self.inner.actors;

        match command {
            BridgeCommand::Connect => actors.connection.send(ConnectionCommand::Connect),
            BridgeCommand::Reconnect => actors.connection.send(ConnectionCommand::Reconnect),
            BridgeCommand::Disconnect => actors.connection.send(ConnectionCommand::Disconnect),

            BridgeCommand::SetAllowLan(allow) => {
                actors.settings.send(SettingsCommand::SetAllowLan(allow))
            }
            BridgeCommand::SetAutoConnect(enabled) => {
                actors.settings.send(SettingsCommand::SetAutoConnect(enabled))
            }
            BridgeCommand::SetWireguardMtu(mtu) => {
                actors.settings.send(SettingsCommand::SetWireguardMtu(mtu))
            }
            BridgeCommand::SetQuantumResistant(state) => {
                actors.settings.send(SettingsCommand::SetQuantumResistant(state))
            }
            BridgeCommand::SetObfuscation(settings) => {
                actors.settings.send(SettingsCommand::SetObfuscation(settings))
            }

            BridgeCommand::SetDnsOptions(options) => {
                actors.dns.send(DnsCommand::SetDnsOptions(options))
            }
            BridgeCommand::SetDnsState(state) => actors.dns.send(DnsCommand::SetDnsState(state)),
            BridgeCommand::AddCustomDns(address) => {
                actors.dns.send(DnsCommand::AddCustomDns(address))
            }
            BridgeCommand::SetCustomDns { index, address } => {
                actors.dns.send(DnsCommand::SetCustomDns { index, address })
            }
            BridgeCommand::DeleteCustomDns(address) => {
                actors.dns.send(DnsCommand::DeleteCustomDns(address))
            }

            BridgeCommand::CreateAccount => {
                actors.account.send(AccountCommand::CreateAccount)?;
                actors.account.send(AccountCommand::FetchAccountHistory)
            }
            BridgeCommand::Login(token) => {
                actors.account.send(AccountCommand::Login(token))?;
                actors.account.send(AccountCommand::FetchAccountHistory)
            }
            BridgeCommand::Logout => actors.account.send(AccountCommand::Logout),
            BridgeCommand::ClearAccountHistory => {
                actors.account.send(AccountCommand::ClearAccountHistory)
            }
            BridgeCommand::RefreshAccountExpiry => {
                actors.account.send(AccountCommand::RefreshAccountExpiry)
            }

            BridgeCommand::FetchLocation => actors.location.send(LocationCommand::FetchLocation),
            BridgeCommand::SelectLocation(constraint) => {
                actors.relay.send(RelayCommand::SelectLocation(constraint))
            }

            BridgeCommand::SubmitVoucher(code) => {
                actors.voucher.send(VoucherCommand::SubmitVoucher(code))
            }

            BridgeCommand::RotateKey => actors.key_rotation.send(KeyRotationCommand::RotateKey),
            BridgeCommand::VerifyKey => actors.key_rotation.send(KeyRotationCommand::VerifyKey),
        }
    }

    /// See [`HubHandle::register`].
    pub async fn register_listener<T: ListenerTransport>(
        &self,
        transport: T,
    ) -> Result<Option<ListenerId>, ActorError> {
        self.inner.hub.register(transport).await
    }

    #[track_caller]
    pub fn unregister_listener(&self, id: ListenerId) -> Result<(), ActorError> {
        self.inner.hub.unregister(id)
    }

    pub fn hub(&self) -> &HubHandle {
        &self.inner.hub
    }

    /// The notifiers behind the published state, for in-process consumers.
    pub fn sources(&self) -> &SnapshotSources {
        &self.inner.sources
    }

    /// Close every queue and stop the event pump. In-flight daemon calls finish.
    pub fn shutdown(&self) {
        if self.inner.shut_down.send_replace(true) {
            return;
        }

        info!("Bridge shutting down");
        self.inner.actors.close();
        self.inner.hub.close();
        self.inner.pump.abort();
    }

    pub fn is_shut_down(&self) -> bool {
        *self.inner.shut_down.borrow()
    }

    /// Resolves once [`Bridge::shutdown`] has been called.
    pub async fn stopped(&self) {
        let mut shut_down = self.inner.shut_down.subscribe();
        let _ = shut_down.wait_for(|stopped| *stopped).await;
    }

    pub fn is_hub_running(&self) -> bool {
        !self.inner.hub_task.is_finished()
    }
}

/// Keep the bridge connected to the daemon for as long as it runs.
///
/// Connection attempts back off exponentially without a deadline; the backoff resets
/// after every successful connection. Returns once the bridge has been shut down.
pub async fn supervise_daemon<C: DaemonConnector>(connector: C, bridge: Bridge<C::Client>) {
    let mut backoff = ExponentialBackoff {
        max_interval: RECONNECT_MAX_INTERVAL,
        max_elapsed_time: None,
        ..Default::default()
    };

    while !bridge.is_shut_down() {
        match connector.connect().await {
            Ok(client) => {
                backoff.reset();
                bridge.daemon_available(Arc::clone(&client));
                tokio::select! {
                    _ = client.closed() => {}
                    _ = bridge.stopped() => {}
                }
                bridge.daemon_lost();
            }
            Err(e) => {
                let delay = backoff.next_backoff().unwrap_or(RECONNECT_MAX_INTERVAL);
                warn!("Failed to connect to daemon, retrying after {delay:?}: {e}");
                tokio::select! {
                    _ = TokioSleep(delay) => {}
                    _ = bridge.stopped() => {}
                }
            }
        }
    }

    info!("Daemon supervisor stopped");
}
