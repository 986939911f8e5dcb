//! Commands accepted from listeners.
//!
//! A [`BridgeCommand`] is what crosses the IPC boundary. [`crate::bridge::Bridge::submit`]
//! routes it to the feature actor that owns it; the listener never waits for a reply and
//! observes the outcome through broadcast events.

use crate::daemon::models::{
    Constraint, DnsOptions, DnsState, LocationConstraint, ObfuscationSettings,
    QuantumResistantState,
};

use common::AccountToken;

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "args")]
pub enum BridgeCommand {
    // connection
    Connect,
    Reconnect,
    Disconnect,

    // settings
    SetAllowLan(bool),
    SetAutoConnect(bool),
    SetWireguardMtu(Option<u16>),
    SetQuantumResistant(QuantumResistantState),
    SetObfuscation(ObfuscationSettings),

    // dns
    SetDnsOptions(DnsOptions),
    SetDnsState(DnsState),
    AddCustomDns(IpAddr),
    SetCustomDns { index: usize, address: IpAddr },
    DeleteCustomDns(IpAddr),

    // account
    CreateAccount,
    Login(AccountToken),
    Logout,
    ClearAccountHistory,
    RefreshAccountExpiry,

    // location / relays
    FetchLocation,
    SelectLocation(Constraint<LocationConstraint>),

    // voucher
    SubmitVoucher(String),

    // keys
    RotateKey,
    VerifyKey,
}
