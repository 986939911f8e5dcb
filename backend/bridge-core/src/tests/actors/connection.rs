use crate::actors::connection::{ConnectionActor, ConnectionCommand};
use crate::actors::spawn_feature;
use crate::daemon::models::TunnelState;
use crate::sync::{EventNotifier, Intermittent};
use crate::tests::support::{MockDaemon, available, connected, eventually, settle, within};

use std::sync::Arc;

use tokio::sync::mpsc;

/// **VALUE**: Verifies that while one command is in flight, a burst of commands
/// collapses to the last one.
///
/// **WHY THIS MATTERS**: Connection requests are user intents. After the in-flight
/// call returns, only the latest intent is still relevant.
///
/// **BUG THIS CATCHES**: Would catch the connection actor using an unbounded queue
/// (every click replayed) or dropping the in-flight command.
#[tokio::test]
async fn given_command_in_flight_when_burst_submitted_then_only_first_and_last_run() {
    // GIVEN: A connection actor whose daemon holds every call
    let daemon = MockDaemon::new();
    daemon.hold_calls();
    let (_updates, updates_rx) = mpsc::unbounded_channel::<TunnelState>();
    let actor = spawn_feature(
        ConnectionActor::new(EventNotifier::new()),
        available(&daemon),
        updates_rx,
    );
    actor.send(ConnectionCommand::Connect).unwrap();
    within(daemon.wait_for("connect_tunnel", 1)).await;

    // WHEN: Three more commands arrive while connect is in flight
    actor.send(ConnectionCommand::Reconnect).unwrap();
    actor.send(ConnectionCommand::Connect).unwrap();
    actor.send(ConnectionCommand::Disconnect).unwrap();
    daemon.release(2);
    within(daemon.wait_for("disconnect_tunnel", 1)).await;
    settle().await;

    // THEN: Only the in-flight connect and the final disconnect reached the daemon
    assert_eq!(daemon.calls(), vec!["connect_tunnel", "disconnect_tunnel"]);
    assert_eq!(daemon.max_in_flight(), 1);
}

/// **VALUE**: Verifies commands submitted while the daemon is away run once it
/// becomes available.
///
/// **WHY THIS MATTERS**: The UI may be up before the daemon. A connect pressed at
/// that moment must not be lost or fail.
///
/// **BUG THIS CATCHES**: Would catch an actor that errors out or drops commands when
/// the availability cell is empty.
#[tokio::test]
async fn given_no_daemon_when_command_submitted_then_runs_after_daemon_appears() {
    // GIVEN: An actor with an empty daemon cell
    let daemon = MockDaemon::new();
    let cell = Intermittent::<Arc<MockDaemon>>::new();
    let (_updates, updates_rx) = mpsc::unbounded_channel::<TunnelState>();
    let actor = spawn_feature(ConnectionActor::new(EventNotifier::new()), cell.clone(), updates_rx);

    // WHEN: Connect is submitted before the daemon exists
    actor.send(ConnectionCommand::Connect).unwrap();
    settle().await;
    assert!(daemon.calls().is_empty(), "no daemon, no call");

    // THEN: Making the daemon available lets the command through
    cell.set(Arc::clone(&daemon));
    within(daemon.wait_for("connect_tunnel", 1)).await;
}

/// **VALUE**: Verifies pushed tunnel states are published by the actor.
#[tokio::test]
async fn given_tunnel_state_update_when_applied_then_published() {
    // GIVEN: A running connection actor
    let daemon = MockDaemon::new();
    let tunnel_state = EventNotifier::new();
    let (updates, updates_rx) = mpsc::unbounded_channel();
    let _actor = spawn_feature(
        ConnectionActor::new(tunnel_state.clone()),
        available(&daemon),
        updates_rx,
    );

    // WHEN: The pump forwards a connected state
    updates.send(connected("10.0.0.1:51820")).unwrap();

    // THEN: It becomes the notifier's latest value
    eventually(|| tunnel_state.latest() == Some(connected("10.0.0.1:51820"))).await;
}

/// **VALUE**: Verifies `stop` ends the loop and later sends fail.
#[tokio::test]
async fn given_running_actor_when_stopped_then_task_finishes_and_sends_fail() {
    // GIVEN: A running actor and a clone of its sender
    let daemon = MockDaemon::new();
    let (_updates, updates_rx) = mpsc::unbounded_channel::<TunnelState>();
    let actor = spawn_feature(
        ConnectionActor::new(EventNotifier::new()),
        available(&daemon),
        updates_rx,
    );
    let sender = actor.sender();

    // WHEN: Stopping it
    within(actor.stop()).await;

    // THEN: Nothing more can be submitted
    assert!(sender.send(ConnectionCommand::Connect).is_err());
}
