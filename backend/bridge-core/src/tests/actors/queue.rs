use crate::actors::{BackpressurePolicy, command_queue};
use crate::error::actor::ActorError;
use crate::tests::support::within;

/// **VALUE**: Verifies an unbounded queue hands commands out in submission order.
///
/// **BUG THIS CATCHES**: Would catch a LIFO pop, which would apply a user's settings
/// edits in reverse.
#[tokio::test]
async fn given_unbounded_queue_when_three_commands_sent_then_received_in_order() {
    // GIVEN: An unbounded queue
    let (sender, mut receiver) = command_queue::<u32>("test", BackpressurePolicy::Unbounded);

    // WHEN: Sending three commands before anyone receives
    for command in [1, 2, 3] {
        sender.send(command).unwrap();
    }

    // THEN: They come out in order
    assert_eq!(sender.pending(), 3);
    assert_eq!(within(receiver.recv()).await, Some(1));
    assert_eq!(within(receiver.recv()).await, Some(2));
    assert_eq!(within(receiver.recv()).await, Some(3));
}

/// **VALUE**: Verifies a conflated queue keeps only the newest pending command.
///
/// **WHY THIS MATTERS**: Connect/disconnect spam must collapse to the user's last
/// intent instead of replaying every click.
#[tokio::test]
async fn given_conflated_queue_when_commands_pile_up_then_only_newest_survives() {
    // GIVEN: A conflated queue
    let (sender, mut receiver) = command_queue::<&str>("test", BackpressurePolicy::Conflated);

    // WHEN: Several commands are queued before the consumer runs
    sender.send("connect").unwrap();
    sender.send("disconnect").unwrap();
    sender.send("reconnect").unwrap();

    // THEN: Only the last one is pending
    assert_eq!(sender.pending(), 1);
    assert_eq!(within(receiver.recv()).await, Some("reconnect"));
}

/// **VALUE**: Verifies a closed queue rejects senders and ends the consumer.
///
/// **BUG THIS CATCHES**: Would catch commands being silently swallowed after
/// shutdown instead of reporting `QueueClosed` to the caller.
#[tokio::test]
async fn given_closed_queue_when_sending_then_queue_closed_error_and_receiver_ends() {
    // GIVEN: A queue with one pending command
    let (sender, mut receiver) = command_queue::<u8>("settings", BackpressurePolicy::Unbounded);
    sender.send(1).unwrap();

    // WHEN: Closing it
    sender.close();

    // THEN: Sends fail with the actor's name, and the consumer sees the end
    let error = sender.send(2).unwrap_err();
    assert!(matches!(error, ActorError::QueueClosed { actor: "settings", .. }));
    assert!(sender.is_closed());
    assert_eq!(within(receiver.recv()).await, None);
}

/// **VALUE**: Verifies a consumer parked on an empty queue wakes on send.
#[tokio::test]
async fn given_waiting_receiver_when_command_sent_then_receiver_wakes() {
    // GIVEN: A consumer waiting on an empty queue
    let (sender, mut receiver) = command_queue::<u8>("test", BackpressurePolicy::Unbounded);
    let consumer = tokio::spawn(async move { receiver.recv().await });
    tokio::task::yield_now().await;

    // WHEN: A command arrives
    sender.send(7).unwrap();

    // THEN: The consumer gets it
    assert_eq!(within(consumer).await.unwrap(), Some(7));
}
