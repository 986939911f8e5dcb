use crate::actors::account::AccountUpdate;
use crate::actors::daemon_events::{UpdateRoutes, spawn_event_pump};
use crate::actors::location::LocationUpdate;
use crate::daemon::models::{
    AccountHistory, DaemonEvent, DeviceState, DnsOptions, RelayList, RelayListCountry, Settings,
    TunnelState,
};
use crate::sync::{EventNotifier, Intermittent};
use crate::tests::support::{MockDaemon, connected, within};

use common::AccountToken;

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};

struct Sinks {
    connection: UnboundedReceiver<TunnelState>,
    location: UnboundedReceiver<LocationUpdate>,
    settings: UnboundedReceiver<Settings>,
    dns: UnboundedReceiver<DnsOptions>,
    relay: UnboundedReceiver<RelayList>,
    account: UnboundedReceiver<AccountUpdate>,
    key_rotation: UnboundedReceiver<DeviceState>,
}

fn routes() -> (UpdateRoutes, Sinks) {
    let (connection, connection_rx) = mpsc::unbounded_channel();
    let (location, location_rx) = mpsc::unbounded_channel();
    let (settings, settings_rx) = mpsc::unbounded_channel();
    let (dns, dns_rx) = mpsc::unbounded_channel();
    let (relay, relay_rx) = mpsc::unbounded_channel();
    let (account, account_rx) = mpsc::unbounded_channel();
    let (key_rotation, key_rotation_rx) = mpsc::unbounded_channel();

    let routes = UpdateRoutes {
        connection,
        location,
        settings,
        dns,
        relay,
        account,
        key_rotation,
        version: EventNotifier::new(),
    };
    let sinks = Sinks {
        connection: connection_rx,
        location: location_rx,
        settings: settings_rx,
        dns: dns_rx,
        relay: relay_rx,
        account: account_rx,
        key_rotation: key_rotation_rx,
    };
    (routes, sinks)
}

/// **VALUE**: Verifies events that several features depend on reach all of them.
///
/// **WHY THIS MATTERS**: The location actor derives its subject from the tunnel state
/// and the DNS actor edits against the settings. A missed fan-out leaves them stale.
///
/// **BUG THIS CATCHES**: Would catch a tunnel state routed only to the connection
/// actor, or settings never reaching the DNS actor.
#[tokio::test]
async fn given_shared_events_when_routed_then_every_owner_receives_them() {
    // GIVEN: Routes to every feature
    let (routes, mut sinks) = routes();
    let mut settings = Settings::default();
    settings.tunnel_options.dns_options.custom_options.addresses =
        vec!["1.1.1.1".parse().unwrap()];

    // WHEN: Routing a tunnel state, settings and a device state
    routes.route(DaemonEvent::TunnelState(connected("10.0.0.1:51820")));
    routes.route(DaemonEvent::Settings(settings.clone()));
    routes.route(DaemonEvent::Device(DeviceState::Revoked));

    // THEN: Each shared event reached both owners
    assert_eq!(sinks.connection.recv().await, Some(connected("10.0.0.1:51820")));
    assert!(matches!(
        sinks.location.recv().await,
        Some(LocationUpdate::TunnelState(TunnelState::Connected { .. }))
    ));
    assert_eq!(sinks.settings.recv().await, Some(settings.clone()));
    assert_eq!(
        sinks.dns.recv().await,
        Some(settings.tunnel_options.dns_options)
    );
    assert_eq!(sinks.key_rotation.recv().await, Some(DeviceState::Revoked));
    assert!(matches!(
        sinks.account.recv().await,
        Some(AccountUpdate::Device(DeviceState::Revoked))
    ));
}

/// **VALUE**: Verifies the pump loads initial state on connect, then follows the
/// event stream.
///
/// **BUG THIS CATCHES**: Would catch listeners seeing nothing until the first change
/// after a (re)connect, because only pushed events were forwarded.
#[tokio::test]
async fn given_daemon_becomes_available_when_pump_runs_then_initial_state_then_events() {
    // GIVEN: A daemon remembering an account, and a pump with no daemon yet
    let daemon = MockDaemon::with_script(|s| s.history = Some(AccountToken::from("9876")));
    let cell = Intermittent::<Arc<MockDaemon>>::new();
    let (routes, mut sinks) = routes();
    let version = routes.version.clone();
    let pump = spawn_event_pump(cell.clone(), routes);

    // WHEN: The daemon becomes available and later pushes a relay list
    cell.set(Arc::clone(&daemon));

    // THEN: Initial state is routed to every owner
    assert_eq!(within(sinks.connection.recv()).await, Some(TunnelState::default()));
    assert!(within(sinks.settings.recv()).await.is_some());
    assert_eq!(within(sinks.relay.recv()).await, Some(RelayList::default()));
    assert!(matches!(
        within(sinks.account.recv()).await,
        Some(AccountUpdate::Device(DeviceState::LoggedOut))
    ));
    assert!(matches!(
        within(sinks.account.recv()).await,
        Some(AccountUpdate::History(AccountHistory::Available(_)))
    ));
    assert!(version.latest().is_some());

    // AND: Pushed events follow
    let relays = RelayList {
        countries: vec![RelayListCountry {
            name: "Sweden".to_string(),
            code: "se".to_string(),
            cities: Vec::new(),
        }],
    };
    daemon.push_event(DaemonEvent::RelayList(relays.clone()));
    assert_eq!(within(sinks.relay.recv()).await, Some(relays));

    pump.abort();
}

/// **VALUE**: Verifies the pump reloads state from a replacement daemon.
#[tokio::test]
async fn given_daemon_replaced_when_pump_running_then_state_reloaded_from_new_daemon() {
    // GIVEN: A pump following a first daemon
    let first = MockDaemon::new();
    let cell = Intermittent::<Arc<MockDaemon>>::new();
    let (routes, mut sinks) = routes();
    let pump = spawn_event_pump(cell.clone(), routes);
    cell.set(Arc::clone(&first));
    assert!(within(sinks.connection.recv()).await.is_some());

    // WHEN: The connection drops and a second daemon replaces it
    let second = MockDaemon::with_script(|s| s.tunnel_state = connected("10.0.0.9:51820"));
    cell.clear();
    cell.set(Arc::clone(&second));

    // THEN: The new daemon's state is loaded
    assert_eq!(
        within(sinks.connection.recv()).await,
        Some(connected("10.0.0.9:51820"))
    );
    assert_eq!(second.count("get_tunnel_state"), 1);

    pump.abort();
}
