use crate::actors::location::{LocationActor, LocationCommand, LocationSubject, LocationUpdate};
use crate::actors::{Feature, spawn_feature};
use crate::daemon::models::GeoIpLocation;
use crate::retry::BackoffPolicy;
use crate::sync::EventNotifier;
use crate::tests::support::{
    MockDaemon, available, connected, connecting, disconnected, eventually, location, settle,
};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

const TTL: Duration = Duration::from_secs(60);

fn actor(
    daemon: &Arc<MockDaemon>,
) -> (
    LocationActor,
    EventNotifier<Option<GeoIpLocation>>,
    mpsc::UnboundedSender<LocationUpdate>,
    mpsc::UnboundedReceiver<LocationUpdate>,
) {
    let published = EventNotifier::new();
    let (updates, updates_rx) = mpsc::unbounded_channel();
    let actor = LocationActor::new(
        available(daemon),
        published.clone(),
        updates.clone(),
        BackoffPolicy::location_polling(),
        TTL,
    );
    (actor, published, updates, updates_rx)
}

/// **VALUE**: Verifies the location is polled until the daemon resolves it.
///
/// **WHY THIS MATTERS**: Right after connecting the daemon answers "no location yet".
/// Without polling the UI would show an unknown location until the next reconnect.
///
/// **BUG THIS CATCHES**: Would catch `None` answers being treated as final.
#[tokio::test(start_paused = true)]
async fn given_daemon_resolving_when_tunnel_connects_then_location_published_after_polls() {
    // GIVEN: A daemon that needs two polls before it knows the location
    let daemon = MockDaemon::with_script(|s| {
        s.locations.push_back(Ok(None));
        s.locations.push_back(Ok(None));
        s.locations.push_back(Ok(Some(location("Sweden"))));
    });
    let (feature, published, updates, updates_rx) = actor(&daemon);
    let _handle = spawn_feature(feature, available(&daemon), updates_rx);

    // WHEN: The tunnel connects
    updates
        .send(LocationUpdate::TunnelState(connected("185.65.135.1:51820")))
        .unwrap();

    // THEN: None is published first, then the resolved location
    eventually(|| published.latest() == Some(Some(location("Sweden")))).await;
    assert_eq!(daemon.count("get_current_location"), 3);
}

/// **VALUE**: Verifies transitional tunnel states publish an unknown location and
/// stop polling.
///
/// **BUG THIS CATCHES**: Would catch the previous relay's location lingering while the
/// tunnel is connecting somewhere else.
#[tokio::test(start_paused = true)]
async fn given_known_location_when_tunnel_starts_connecting_then_location_cleared() {
    // GIVEN: A resolved location while disconnected
    let daemon = MockDaemon::with_script(|s| s.locations.push_back(Ok(Some(location("Home")))));
    let (feature, published, updates, updates_rx) = actor(&daemon);
    let _handle = spawn_feature(feature, available(&daemon), updates_rx);
    updates
        .send(LocationUpdate::TunnelState(disconnected()))
        .unwrap();
    eventually(|| published.latest() == Some(Some(location("Home")))).await;

    // WHEN: The tunnel starts connecting
    updates
        .send(LocationUpdate::TunnelState(connecting()))
        .unwrap();

    // THEN: The location is unknown and no poll runs for the transitional state
    eventually(|| published.latest() == Some(None)).await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(daemon.count("get_current_location"), 1);
}

/// **VALUE**: Verifies a result for a superseded subject is not published.
#[tokio::test]
async fn given_subject_changed_when_stale_result_applied_then_ignored() {
    // GIVEN: An actor whose tunnel moved to a new relay
    let daemon = MockDaemon::new();
    let (mut feature, published, _updates, _updates_rx) = actor(&daemon);
    Feature::<MockDaemon>::apply(
        &mut feature,
        LocationUpdate::TunnelState(connected("10.0.0.2:51820")),
    );
    assert_eq!(
        feature.subject(),
        Some(LocationSubject::Connected("10.0.0.2:51820".parse().unwrap()))
    );

    // WHEN: A result for the old relay arrives
    Feature::<MockDaemon>::apply(
        &mut feature,
        LocationUpdate::Resolved {
            subject: LocationSubject::Connected("10.0.0.1:51820".parse().unwrap()),
            location: location("Old"),
        },
    );

    // THEN: The published value is still the unknown location of the new subject
    assert_eq!(published.latest(), Some(None));
}

/// **VALUE**: Verifies an explicit fetch while the tunnel is moving is deferred.
#[tokio::test]
async fn given_transitional_state_when_fetch_requested_then_no_daemon_call() {
    // GIVEN: An actor that only knows the tunnel is connecting
    let daemon = MockDaemon::new();
    let (feature, _published, updates, updates_rx) = actor(&daemon);
    let handle = spawn_feature(feature, available(&daemon), updates_rx);
    updates
        .send(LocationUpdate::TunnelState(connecting()))
        .unwrap();
    settle().await;

    // WHEN: A fetch is requested
    handle.send(LocationCommand::FetchLocation).unwrap();
    settle().await;

    // THEN: The daemon is not asked
    assert_eq!(daemon.count("get_current_location"), 0);
}
