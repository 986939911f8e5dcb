//! Everything a listener can receive.
//!
//! Snapshot replay and live broadcast use the same type, so a listener cannot tell a
//! replayed value from a fresh one. [`Event::ListenerReady`] is the only event that
//! exists purely for the replay protocol.

use crate::daemon::models::{
    AccountCreationResult, AccountExpiry, AccountHistory, AppVersionInfo, DeviceState,
    DnsOptions, GeoIpLocation, KeyStatus, LoginResult, RelayList, Settings, TunnelState,
    VoucherSubmissionResult,
};
use crate::hub::ListenerId;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum Event {
    TunnelStateChanged(TunnelState),
    SettingsChanged(Settings),
    DnsOptionsChanged(DnsOptions),
    LocationChanged(Option<GeoIpLocation>),
    RelayListChanged(RelayList),
    DeviceStateChanged(DeviceState),
    AccountHistoryChanged(AccountHistory),
    AccountExpiryChanged(AccountExpiry),
    LoginResult(LoginResult),
    AccountCreated(AccountCreationResult),
    VoucherSubmitted(VoucherSubmissionResult),
    KeyStatusChanged(KeyStatus),
    VersionInfoChanged(AppVersionInfo),
    /// Last event of a registration snapshot.
    ListenerReady { listener_id: ListenerId },
}

impl Event {
    /// Short name for logs. Never includes payload data.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::TunnelStateChanged(_) => "TunnelStateChanged",
            Event::SettingsChanged(_) => "SettingsChanged",
            Event::DnsOptionsChanged(_) => "DnsOptionsChanged",
            Event::LocationChanged(_) => "LocationChanged",
            Event::RelayListChanged(_) => "RelayListChanged",
            Event::DeviceStateChanged(_) => "DeviceStateChanged",
            Event::AccountHistoryChanged(_) => "AccountHistoryChanged",
            Event::AccountExpiryChanged(_) => "AccountExpiryChanged",
            Event::LoginResult(_) => "LoginResult",
            Event::AccountCreated(_) => "AccountCreated",
            Event::VoucherSubmitted(_) => "VoucherSubmitted",
            Event::KeyStatusChanged(_) => "KeyStatusChanged",
            Event::VersionInfoChanged(_) => "VersionInfoChanged",
            Event::ListenerReady { .. } => "ListenerReady",
        }
    }
}
