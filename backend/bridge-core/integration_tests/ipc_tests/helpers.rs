//! Test helpers for IPC integration tests.
//!
//! This module provides utilities for testing the IPC WebSocket server:
//! - A stub daemon recording the calls it receives
//! - Starting a bridge plus IPC server on a free port
//! - Sending/receiving JSON messages
//! - Authentication helpers
//! - Connection state checks

use bridge_core::config::RetryConfig;
use bridge_core::daemon::models::{
    AccountData, AppVersionInfo, Constraint, DaemonEvent, DeviceState, DnsOptions,
    GeoIpLocation, LocationConstraint, ObfuscationSettings, QuantumResistantState, RelayList,
    Settings, TunnelState, VoucherSubmission,
};
use bridge_core::error::DaemonError;
use bridge_core::ipc::protocol::{IpcClientMessage, IpcServerMessage};
use bridge_core::ipc::{IpcServerHandle, start_ipc_server};
use bridge_core::{Bridge, DaemonClient, Event};

use common::AccountToken;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::{self, BoxStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

/// Test constants for authentication
pub const TEST_AUTH_TOKEN: &str = "test-token-12345";

pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Daemon that answers every query with defaults and records the calls it receives.
pub struct StubDaemon {
    calls: watch::Sender<Vec<String>>,
    events_tx: mpsc::UnboundedSender<DaemonEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<DaemonEvent>>>,
}

impl StubDaemon {
    pub fn new() -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            calls: watch::Sender::new(Vec::new()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        })
    }

    pub fn push_event(&self, event: DaemonEvent) {
        self.events_tx.send(event).expect("event stream dropped");
    }

    /// Wait until the daemon has been asked `name`.
    pub async fn wait_for_call(&self, name: &str) {
        let mut calls = self.calls.subscribe();
        tokio::time::timeout(
            RECEIVE_TIMEOUT,
            calls.wait_for(|calls| calls.iter().any(|call| call == name)),
        )
        .await
        .unwrap_or_else(|_| panic!("daemon never received {name}"))
        .expect("call log closed");
    }

    pub fn was_called(&self, name: &str) -> bool {
        self.calls.borrow().iter().any(|call| call == name)
    }

    fn record(&self, name: &str) {
        self.calls.send_modify(|calls| calls.push(name.to_string()));
    }
}

impl DaemonClient for StubDaemon {
    async fn connect_tunnel(&self) -> Result<bool, DaemonError> {
        self.record("connect_tunnel");
        Ok(true)
    }
    async fn disconnect_tunnel(&self) -> Result<bool, DaemonError> {
        self.record("disconnect_tunnel");
        Ok(true)
    }
    async fn reconnect_tunnel(&self) -> Result<bool, DaemonError> {
        self.record("reconnect_tunnel");
        Ok(true)
    }
    async fn get_tunnel_state(&self) -> Result<TunnelState, DaemonError> {
        self.record("get_tunnel_state");
        Ok(TunnelState::default())
    }
    async fn get_settings(&self) -> Result<Settings, DaemonError> {
        self.record("get_settings");
        Ok(Settings::default())
    }
    async fn set_allow_lan(&self, _allow: bool) -> Result<(), DaemonError> {
        self.record("set_allow_lan");
        Ok(())
    }
    async fn set_auto_connect(&self, _auto_connect: bool) -> Result<(), DaemonError> {
        self.record("set_auto_connect");
        Ok(())
    }
    async fn set_wireguard_mtu(&self, _mtu: Option<u16>) -> Result<(), DaemonError> {
        self.record("set_wireguard_mtu");
        Ok(())
    }
    async fn set_quantum_resistant(&self, _state: QuantumResistantState) -> Result<(), DaemonError> {
        self.record("set_quantum_resistant");
        Ok(())
    }
    async fn set_obfuscation(&self, _settings: ObfuscationSettings) -> Result<(), DaemonError> {
        self.record("set_obfuscation");
        Ok(())
    }
    async fn set_dns_options(&self, _options: DnsOptions) -> Result<(), DaemonError> {
        self.record("set_dns_options");
        Ok(())
    }
    async fn set_relay_location(
        &self,
        _location: Constraint<LocationConstraint>,
    ) -> Result<(), DaemonError> {
        self.record("set_relay_location");
        Ok(())
    }
    async fn get_relay_locations(&self) -> Result<RelayList, DaemonError> {
        self.record("get_relay_locations");
        Ok(RelayList::default())
    }
    async fn get_device(&self) -> Result<DeviceState, DaemonError> {
        self.record("get_device");
        Ok(DeviceState::LoggedOut)
    }
    async fn create_account(&self) -> Result<AccountToken, DaemonError> {
        self.record("create_account");
        Ok(AccountToken::from("1234123412341234"))
    }
    async fn login_account(&self, _token: &AccountToken) -> Result<(), DaemonError> {
        self.record("login_account");
        Ok(())
    }
    async fn logout_account(&self) -> Result<(), DaemonError> {
        self.record("logout_account");
        Ok(())
    }
    async fn get_account_history(&self) -> Result<Option<AccountToken>, DaemonError> {
        self.record("get_account_history");
        Ok(None)
    }
    async fn clear_account_history(&self) -> Result<(), DaemonError> {
        self.record("clear_account_history");
        Ok(())
    }
    async fn get_account_data(&self, _token: &AccountToken) -> Result<AccountData, DaemonError> {
        self.record("get_account_data");
        Ok(AccountData {
            expiry: "2030-01-01T00:00:00Z".to_string(),
        })
    }
    async fn submit_voucher(&self, _code: &str) -> Result<VoucherSubmission, DaemonError> {
        self.record("submit_voucher");
        Err(DaemonError::invalid_voucher("unknown voucher"))
    }
    async fn rotate_wireguard_key(&self) -> Result<(), DaemonError> {
        self.record("rotate_wireguard_key");
        Ok(())
    }
    async fn verify_wireguard_key(&self) -> Result<bool, DaemonError> {
        self.record("verify_wireguard_key");
        Ok(true)
    }
    async fn get_current_location(&self) -> Result<Option<GeoIpLocation>, DaemonError> {
        self.record("get_current_location");
        Ok(None)
    }
    async fn get_version_info(&self) -> Result<AppVersionInfo, DaemonError> {
        self.record("get_version_info");
        Ok(AppVersionInfo {
            current_version: "2025.1".to_string(),
            supported: true,
            suggested_upgrade: None,
        })
    }
    fn events(&self) -> BoxStream<'static, DaemonEvent> {
        match self.events_rx.lock().expect("events lock").take() {
            Some(receiver) => stream::unfold(receiver, |mut receiver| async move {
                receiver.recv().await.map(|event| (event, receiver))
            })
            .boxed(),
            None => stream::pending().boxed(),
        }
    }
    async fn closed(&self) {
        std::future::pending::<()>().await
    }
}

/// Test helper: Start a bridge (optionally with a daemon) and an IPC server on a free port.
pub async fn start_test_bridge(
    daemon: Option<Arc<StubDaemon>>,
) -> (Bridge<StubDaemon>, IpcServerHandle) {
    let bridge = Bridge::<StubDaemon>::start(&RetryConfig::default());
    if let Some(daemon) = daemon {
        bridge.daemon_available(daemon);
    }
    let handle = start_ipc_server(0, Some(String::from(TEST_AUTH_TOKEN)), bridge.clone())
        .await
        .expect("Failed to start IPC server");
    (bridge, handle)
}

/// Test helper: Connect to IPC server and return WebSocket stream.
pub async fn connect_to_server(handle: &IpcServerHandle) -> Client {
    let (ws_stream, _) = connect_async(handle.url())
        .await
        .expect("Failed to connect to WebSocket server");
    ws_stream
}

/// Test helper: Send a JSON client message.
pub async fn send_message(ws: &mut Client, message: &IpcClientMessage) {
    let json = serde_json::to_string(message).expect("Failed to encode message");
    ws.send(Message::text(json))
        .await
        .expect("Failed to send message");
}

/// Test helper: Receive and decode the next server message.
pub async fn receive_message(ws: &mut Client) -> IpcServerMessage {
    let frame = tokio::time::timeout(RECEIVE_TIMEOUT, ws.next())
        .await
        .expect("Timed out waiting for a message")
        .expect("No message received")
        .expect("Error receiving message");

    serde_json::from_str(frame.to_text().expect("Expected a text frame"))
        .expect("Failed to decode server message")
}

/// Test helper: Send auth message and return `(success, error)` from the response.
pub async fn authenticate(ws: &mut Client, token: &str) -> (bool, Option<String>) {
    send_message(
        ws,
        &IpcClientMessage::Auth {
            token: token.to_string(),
        },
    )
    .await;

    match receive_message(ws).await {
        IpcServerMessage::AuthResponse { success, error } => (success, error),
        other => panic!("Expected AuthResponse, got {other:?}"),
    }
}

/// Test helper: Collect events until (and including) `ListenerReady`.
pub async fn receive_snapshot(ws: &mut Client) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        match receive_message(ws).await {
            IpcServerMessage::Event { event } => {
                let ready = matches!(event, Event::ListenerReady { .. });
                events.push(event);
                if ready {
                    return events;
                }
            }
            other => panic!("Expected snapshot event, got {other:?}"),
        }
    }
}

/// Test helper: Receive until `matches` accepts a message.
pub async fn receive_until(
    ws: &mut Client,
    matches: impl Fn(&IpcServerMessage) -> bool,
) -> IpcServerMessage {
    loop {
        let message = receive_message(ws).await;
        if matches(&message) {
            return message;
        }
    }
}

/// Test helper: Check if WebSocket connection is closed.
pub async fn is_connection_closed(ws: &mut Client) -> bool {
    match tokio::time::timeout(Duration::from_millis(100), ws.next()).await {
        Err(_) => true,
        Ok(None) => true,
        Ok(Some(Ok(Message::Close(_)))) => true,
        Ok(Some(Ok(_))) => false,
        Ok(Some(Err(_))) => true,
    }
}

/// Test helper: Poll `condition` every 10ms until it holds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(RECEIVE_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Condition never became true");
}
