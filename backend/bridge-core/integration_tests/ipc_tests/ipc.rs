use crate::ipc_tests::helpers::{
    StubDaemon, TEST_AUTH_TOKEN, authenticate, connect_to_server, is_connection_closed,
    receive_snapshot, receive_until, send_message, start_test_bridge, wait_until,
};

use bridge_core::daemon::models::{ActionAfterDisconnect, DaemonEvent, TunnelState};
use bridge_core::ipc::protocol::{IpcClientMessage, IpcServerMessage};
use bridge_core::{BridgeCommand, Event};

use futures_util::SinkExt;
use tokio_tungstenite::tungstenite::Message;

/// **VALUE**: Verifies the full handshake: auth, state snapshot, then `ListenerReady`.
///
/// **WHY THIS MATTERS**: A client builds its whole view from the snapshot. If the
/// replay is missing or `ListenerReady` never arrives, the UI cannot tell when it is
/// up to date.
///
/// **BUG THIS CATCHES**: Would catch if authenticated connections were never
/// registered with the hub, or if the snapshot were sent after live events.
#[tokio::test]
async fn given_valid_token_when_client_authenticates_then_receives_snapshot_ending_in_listener_ready()
 {
    // GIVEN: A bridge with a daemon and a running IPC server
    let daemon = StubDaemon::new();
    let (bridge, handle) = start_test_bridge(Some(daemon.clone())).await;
    wait_until(|| bridge.sources().tunnel_state.latest().is_some()).await;

    // WHEN: Client connects with the right token
    let mut ws = connect_to_server(&handle).await;
    let (success, error) = authenticate(&mut ws, TEST_AUTH_TOKEN).await;

    // THEN: Auth succeeds and the snapshot ends with ListenerReady
    assert!(success, "Auth should succeed with the right token");
    assert!(error.is_none());

    let snapshot = receive_snapshot(&mut ws).await;
    let kinds: Vec<&str> = snapshot.iter().map(Event::kind).collect();
    assert_eq!(kinds.last(), Some(&"ListenerReady"));
    assert!(
        kinds.contains(&"TunnelStateChanged"),
        "Snapshot should replay the tunnel state, got {kinds:?}"
    );

    handle.shutdown();
    bridge.shutdown();
}

/// **VALUE**: Verifies a wrong token is refused and the connection closed.
///
/// **WHY THIS MATTERS**: Any local process can open the port; the token is the only
/// thing keeping them from driving the VPN.
///
/// **BUG THIS CATCHES**: Would catch if token comparison were skipped or if the
/// server kept the connection open after a failed auth.
#[tokio::test]
async fn given_invalid_token_when_client_authenticates_then_rejected_and_closed() {
    // GIVEN: A running IPC server
    let (bridge, handle) = start_test_bridge(Some(StubDaemon::new())).await;
    let mut ws = connect_to_server(&handle).await;

    // WHEN: Client authenticates with a wrong token
    let (success, error) = authenticate(&mut ws, "wrong-token").await;

    // THEN: Auth fails with a reason and the server closes the connection
    assert!(!success, "Auth should fail with a wrong token");
    assert!(error.is_some(), "Failed auth should carry an error");
    assert!(
        is_connection_closed(&mut ws).await,
        "Connection should close after failed auth"
    );

    handle.shutdown();
    bridge.shutdown();
}

/// **VALUE**: Verifies a command before authentication closes the connection.
///
/// **BUG THIS CATCHES**: Would catch if the server accepted commands from an
/// unauthenticated client.
#[tokio::test]
async fn given_unauthenticated_client_when_command_sent_first_then_connection_closed() {
    // GIVEN: A bridge with a daemon
    let daemon = StubDaemon::new();
    let (bridge, handle) = start_test_bridge(Some(daemon.clone())).await;
    let mut ws = connect_to_server(&handle).await;

    // WHEN: The first frame is a command instead of auth
    send_message(
        &mut ws,
        &IpcClientMessage::Command {
            command: BridgeCommand::Connect,
        },
    )
    .await;

    // THEN: The connection is closed and the daemon never saw the command
    assert!(is_connection_closed(&mut ws).await);
    assert!(!daemon.was_called("connect_tunnel"));

    handle.shutdown();
    bridge.shutdown();
}

/// **VALUE**: Verifies a command frame travels from the socket to the daemon.
///
/// **BUG THIS CATCHES**: Would catch if commands were decoded but never submitted
/// to the bridge, or routed to the wrong feature.
#[tokio::test]
async fn given_authenticated_client_when_connect_command_sent_then_daemon_connects() {
    // GIVEN: An authenticated client
    let daemon = StubDaemon::new();
    let (bridge, handle) = start_test_bridge(Some(daemon.clone())).await;
    let mut ws = connect_to_server(&handle).await;
    assert!(authenticate(&mut ws, TEST_AUTH_TOKEN).await.0);
    receive_snapshot(&mut ws).await;

    // WHEN: Client sends Connect
    send_message(
        &mut ws,
        &IpcClientMessage::Command {
            command: BridgeCommand::Connect,
        },
    )
    .await;

    // THEN: The daemon is asked to connect
    daemon.wait_for_call("connect_tunnel").await;

    handle.shutdown();
    bridge.shutdown();
}

/// **VALUE**: Verifies commands sent before the daemon is up are queued.
///
/// **WHY THIS MATTERS**: The bridge starts before the daemon connection; a user
/// clicking "connect" during startup should not be ignored.
///
/// **BUG THIS CATCHES**: Would catch if the reader loop blocked on registration, or
/// if commands were refused while no daemon was available.
#[tokio::test]
async fn given_no_daemon_when_command_sent_then_runs_once_daemon_available() {
    // GIVEN: A bridge without a daemon and an authenticated client
    let (bridge, handle) = start_test_bridge(None).await;
    let mut ws = connect_to_server(&handle).await;
    assert!(authenticate(&mut ws, TEST_AUTH_TOKEN).await.0);

    // WHEN: Client sends Connect, then the daemon comes up
    send_message(
        &mut ws,
        &IpcClientMessage::Command {
            command: BridgeCommand::Connect,
        },
    )
    .await;
    let daemon = StubDaemon::new();
    bridge.daemon_available(daemon.clone());

    // THEN: The queued command reaches the daemon and the snapshot follows
    daemon.wait_for_call("connect_tunnel").await;
    let snapshot = receive_snapshot(&mut ws).await;
    assert!(matches!(
        snapshot.last(),
        Some(Event::ListenerReady { .. })
    ));

    handle.shutdown();
    bridge.shutdown();
}

/// **VALUE**: Verifies malformed frames get an error reply without dropping the client.
///
/// **BUG THIS CATCHES**: Would catch if a decode error tore down the connection, or
/// if a second auth message were treated as a fresh handshake.
#[tokio::test]
async fn given_authenticated_client_when_malformed_frames_sent_then_error_replies() {
    // GIVEN: An authenticated client
    let (bridge, handle) = start_test_bridge(Some(StubDaemon::new())).await;
    let mut ws = connect_to_server(&handle).await;
    assert!(authenticate(&mut ws, TEST_AUTH_TOKEN).await.0);
    receive_snapshot(&mut ws).await;

    // WHEN: Client sends garbage
    ws.send(Message::text("{not json"))
        .await
        .expect("Failed to send frame");

    // THEN: An error comes back
    let reply = receive_until(&mut ws, |m| matches!(m, IpcServerMessage::Error { .. })).await;
    assert!(matches!(reply, IpcServerMessage::Error { .. }));

    // WHEN: Client sends a second auth
    send_message(
        &mut ws,
        &IpcClientMessage::Auth {
            token: TEST_AUTH_TOKEN.to_string(),
        },
    )
    .await;

    // THEN: It is refused and the connection stays usable
    let reply = receive_until(&mut ws, |m| matches!(m, IpcServerMessage::Error { .. })).await;
    match reply {
        IpcServerMessage::Error { message } => assert!(message.contains("Already authenticated")),
        other => panic!("Expected Error, got {other:?}"),
    }
    assert_eq!(bridge.hub().listener_count(), 1);

    handle.shutdown();
    bridge.shutdown();
}

/// **VALUE**: Verifies daemon events are broadcast to every connected client.
///
/// **BUG THIS CATCHES**: Would catch if only the first listener received live
/// events, or if live delivery stopped after the snapshot.
#[tokio::test]
async fn given_two_clients_when_daemon_pushes_event_then_both_receive_it() {
    // GIVEN: Two authenticated clients
    let daemon = StubDaemon::new();
    let (bridge, handle) = start_test_bridge(Some(daemon.clone())).await;

    let mut first = connect_to_server(&handle).await;
    assert!(authenticate(&mut first, TEST_AUTH_TOKEN).await.0);
    receive_snapshot(&mut first).await;

    let mut second = connect_to_server(&handle).await;
    assert!(authenticate(&mut second, TEST_AUTH_TOKEN).await.0);
    receive_snapshot(&mut second).await;

    // WHEN: The daemon reports a state change
    let disconnecting = TunnelState::Disconnecting {
        after: ActionAfterDisconnect::Reconnect,
    };
    daemon.push_event(DaemonEvent::TunnelState(disconnecting.clone()));

    // THEN: Both clients receive it
    for ws in [&mut first, &mut second] {
        let message = receive_until(ws, |m| {
            matches!(
                m,
                IpcServerMessage::Event {
                    event: Event::TunnelStateChanged(TunnelState::Disconnecting { .. })
                }
            )
        })
        .await;
        assert_eq!(
            message,
            IpcServerMessage::Event {
                event: Event::TunnelStateChanged(disconnecting.clone())
            }
        );
    }

    handle.shutdown();
    bridge.shutdown();
}

/// **VALUE**: Verifies a disconnecting client is removed from the hub.
///
/// **BUG THIS CATCHES**: Would catch a listener leak where closed sockets stay
/// registered forever.
#[tokio::test]
async fn given_registered_client_when_it_disconnects_then_listener_removed() {
    // GIVEN: One registered client
    let (bridge, handle) = start_test_bridge(Some(StubDaemon::new())).await;
    let mut ws = connect_to_server(&handle).await;
    assert!(authenticate(&mut ws, TEST_AUTH_TOKEN).await.0);
    receive_snapshot(&mut ws).await;
    assert_eq!(bridge.hub().listener_count(), 1);

    // WHEN: The client closes its socket
    ws.close(None).await.expect("Failed to close");

    // THEN: The hub drops the listener
    wait_until(|| bridge.hub().listener_count() == 0).await;

    handle.shutdown();
    bridge.shutdown();
}
