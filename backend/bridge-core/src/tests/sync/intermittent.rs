use crate::sync::Intermittent;
use crate::tests::support::{settle, within};

use std::time::Duration;

/// **VALUE**: Verifies that every pending waiter is released by a single `set`.
///
/// **WHY THIS MATTERS**: All feature actors and the hub park on the daemon cell at
/// the same time. If only one of them wakes, the rest never execute their commands.
///
/// **BUG THIS CATCHES**: Would catch a cell built on a single-waiter primitive
/// (e.g. `Notify::notify_one`) or a oneshot channel.
#[tokio::test]
async fn given_two_waiters_when_value_set_then_both_receive_it() {
    // GIVEN: An empty cell with two pending waiters
    let cell = Intermittent::<u32>::new();
    let first = tokio::spawn({
        let cell = cell.clone();
        async move { cell.wait().await }
    });
    let second = tokio::spawn({
        let cell = cell.clone();
        async move { cell.wait().await }
    });
    settle().await;

    // WHEN: A value is published
    cell.set(7);

    // THEN: Both waiters complete with it
    assert_eq!(within(first).await.unwrap(), 7);
    assert_eq!(within(second).await.unwrap(), 7);
}

/// **VALUE**: Verifies that `clear` does not cancel waiters.
///
/// **WHY THIS MATTERS**: A daemon restart clears the cell. Commands queued while it
/// was away must run against the next connection, not fail.
///
/// **BUG THIS CATCHES**: Would catch `wait` returning early (or erroring) when the
/// cell transitions to empty.
#[tokio::test(start_paused = true)]
async fn given_pending_waiter_when_cell_cleared_then_keeps_waiting_for_next_value() {
    // GIVEN: A waiter on an empty cell
    let cell = Intermittent::<&'static str>::new();
    let waiter = tokio::spawn({
        let cell = cell.clone();
        async move { cell.wait().await }
    });
    settle().await;

    // WHEN: The cell is cleared (again) and time passes
    assert_eq!(cell.clear(), None);
    tokio::time::sleep(Duration::from_secs(30)).await;

    // THEN: The waiter is still pending, and completes on the next set
    assert!(!waiter.is_finished(), "clear must not release waiters");
    cell.set("second connection");
    assert_eq!(within(waiter).await.unwrap(), "second connection");
}

/// **VALUE**: Verifies the non-suspending accessors track set/clear.
///
/// **BUG THIS CATCHES**: Would catch `clear` not returning the previous value, which
/// the bridge uses to log the dropped connection.
#[test]
fn given_value_when_cleared_then_peek_is_empty_and_old_value_returned() {
    // GIVEN: A cell holding a value
    let cell = Intermittent::new();
    cell.set(1u8);
    assert!(cell.is_available());
    assert_eq!(cell.peek(), Some(1));

    // WHEN: Clearing it
    let previous = cell.clear();

    // THEN: The old value comes back and the cell is empty
    assert_eq!(previous, Some(1));
    assert!(!cell.is_available());
    assert_eq!(cell.peek(), None);
}

/// **VALUE**: Verifies that a waiter arriving after `set` returns immediately.
///
/// **BUG THIS CATCHES**: Would catch `wait` only reacting to changes and ignoring the
/// value already present.
#[tokio::test]
async fn given_value_already_set_when_waiting_then_returns_immediately() {
    // GIVEN: A cell that already holds a value
    let cell = Intermittent::new();
    cell.set(String::from("daemon"));

    // WHEN/THEN: Waiting completes without any further set
    assert_eq!(within(cell.wait()).await, "daemon");
}
