//! The privileged daemon as seen by the bridge.
//!
//! The bridge never talks to the daemon's wire protocol directly. A host crate
//! implements [`DaemonConnector`] (dialing the management socket) and
//! [`DaemonClient`] (one live connection), and the bridge drives both.
//!
//! Every method maps to one management RPC. "Not connected" is not an error here:
//! a client only exists while its connection is up, and actors wait on the
//! availability cell instead of calling a dead client.

pub mod models;

use crate::error::daemon::DaemonError;
use crate::daemon::models::{
    AccountData, AppVersionInfo, Constraint, DaemonEvent, DeviceState, DnsOptions,
    GeoIpLocation, LocationConstraint, ObfuscationSettings, QuantumResistantState, RelayList,
    Settings, TunnelState, VoucherSubmission,
};

use common::AccountToken;

use std::future::Future;
use std::sync::Arc;

use futures_util::stream::BoxStream;

pub trait DaemonClient: Send + Sync + 'static {
    // Tunnel. The boolean is whether the daemon acted on the request.
    fn connect_tunnel(&self) -> impl Future<Output = Result<bool, DaemonError>> + Send;
    fn disconnect_tunnel(&self) -> impl Future<Output = Result<bool, DaemonError>> + Send;
    fn reconnect_tunnel(&self) -> impl Future<Output = Result<bool, DaemonError>> + Send;
    fn get_tunnel_state(&self) -> impl Future<Output = Result<TunnelState, DaemonError>> + Send;

    // Settings
    fn get_settings(&self) -> impl Future<Output = Result<Settings, DaemonError>> + Send;
    fn set_allow_lan(&self, allow: bool) -> impl Future<Output = Result<(), DaemonError>> + Send;
    fn set_auto_connect(
        &self,
        auto_connect: bool,
    ) -> impl Future<Output = Result<(), DaemonError>> + Send;
    fn set_wireguard_mtu(
        &self,
        mtu: Option<u16>,
    ) -> impl Future<Output = Result<(), DaemonError>> + Send;
    fn set_quantum_resistant(
        &self,
        state: QuantumResistantState,
    ) -> impl Future<Output = Result<(), DaemonError>> + Send;
    fn set_obfuscation(
        &self,
        settings: ObfuscationSettings,
    ) -> impl Future<Output = Result<(), DaemonError>> + Send;
    fn set_dns_options(
        &self,
        options: DnsOptions,
    ) -> impl Future<Output = Result<(), DaemonError>> + Send;

    // Relays
    fn set_relay_location(
        &self,
        location: Constraint<LocationConstraint>,
    ) -> impl Future<Output = Result<(), DaemonError>> + Send;
    fn get_relay_locations(&self) -> impl Future<Output = Result<RelayList, DaemonError>> + Send;

    // Account and device
    fn get_device(&self) -> impl Future<Output = Result<DeviceState, DaemonError>> + Send;
    fn create_account(&self) -> impl Future<Output = Result<AccountToken, DaemonError>> + Send;
    fn login_account(
        &self,
        token: &AccountToken,
    ) -> impl Future<Output = Result<(), DaemonError>> + Send;
    fn logout_account(&self) -> impl Future<Output = Result<(), DaemonError>> + Send;
    fn get_account_history(
        &self,
    ) -> impl Future<Output = Result<Option<AccountToken>, DaemonError>> + Send;
    fn clear_account_history(&self) -> impl Future<Output = Result<(), DaemonError>> + Send;
    fn get_account_data(
        &self,
        token: &AccountToken,
    ) -> impl Future<Output = Result<AccountData, DaemonError>> + Send;
    fn submit_voucher(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<VoucherSubmission, DaemonError>> + Send;

    // Keys
    fn rotate_wireguard_key(&self) -> impl Future<Output = Result<(), DaemonError>> + Send;
    fn verify_wireguard_key(&self) -> impl Future<Output = Result<bool, DaemonError>> + Send;

    // Misc
    /// `None` while the daemon is still resolving the exit location.
    fn get_current_location(
        &self,
    ) -> impl Future<Output = Result<Option<GeoIpLocation>, DaemonError>> + Send;
    fn get_version_info(&self) -> impl Future<Output = Result<AppVersionInfo, DaemonError>> + Send;

    /// Daemon-pushed state changes. Ends when the connection drops.
    fn events(&self) -> BoxStream<'static, DaemonEvent>;

    /// Resolves once the underlying connection is gone.
    fn closed(&self) -> impl Future<Output = ()> + Send;
}

/// Dials the daemon. Called repeatedly by [`crate::bridge::supervise_daemon`].
pub trait DaemonConnector: Send + Sync + 'static {
    type Client: DaemonClient;

    fn connect(&self) -> impl Future<Output = Result<Arc<Self::Client>, DaemonError>> + Send;
}
