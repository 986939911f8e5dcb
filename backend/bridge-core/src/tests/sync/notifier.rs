use crate::sync::{EventNotifier, SubscriberId};

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(&u32) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |value: &u32| sink.lock().unwrap().push(*value))
}

/// **VALUE**: Verifies that a late subscriber is replayed the latest value, once.
///
/// **WHY THIS MATTERS**: Hub snapshots and late UI listeners depend on the last value
/// being available without waiting for the next change.
///
/// **BUG THIS CATCHES**: Would catch a notifier that only forwards future values, or
/// one that replays the whole history.
#[test]
fn given_published_values_when_subscribing_then_receives_only_latest() {
    // GIVEN: A notifier that already published two values
    let notifier = EventNotifier::new();
    notifier.notify(1);
    notifier.notify(2);

    // WHEN: A subscriber attaches
    let (seen, callback) = recorder();
    notifier.subscribe(SubscriberId::new(), callback);

    // THEN: It sees the latest value exactly once
    assert_eq!(*seen.lock().unwrap(), vec![2]);
    assert_eq!(notifier.latest(), Some(2));
}

/// **VALUE**: Verifies that a subscriber receives values in publish order.
#[test]
fn given_subscriber_when_values_published_then_receives_all_in_order() {
    // GIVEN: A subscriber on an empty notifier
    let notifier = EventNotifier::new();
    let (seen, callback) = recorder();
    notifier.subscribe(SubscriberId::new(), callback);

    // WHEN: Publishing three values
    for value in [10, 20, 30] {
        notifier.notify(value);
    }

    // THEN: All arrive in order (no replay, nothing was published at subscribe time)
    assert_eq!(*seen.lock().unwrap(), vec![10, 20, 30]);
}

/// **VALUE**: Verifies that unsubscribe is idempotent and stops delivery.
///
/// **BUG THIS CATCHES**: Would catch a second unsubscribe panicking or reporting
/// success for an id that is no longer present.
#[test]
fn given_subscriber_when_unsubscribed_twice_then_second_call_is_noop() {
    // GIVEN: One subscription
    let notifier = EventNotifier::new();
    let id = SubscriberId::new();
    let (seen, callback) = recorder();
    notifier.subscribe(id, callback);

    // WHEN: Unsubscribing twice and publishing
    assert!(notifier.unsubscribe(id));
    assert!(!notifier.unsubscribe(id));
    notifier.notify(5);

    // THEN: Nothing was delivered, but the value is still cached
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(notifier.latest(), Some(5));
    assert_eq!(notifier.subscriber_count(), 0);
}

/// **VALUE**: Verifies that re-subscribing with the same id replaces the callback.
///
/// **BUG THIS CATCHES**: Would catch duplicate deliveries when the hub re-subscribes
/// its forwarding callbacks under its fixed id.
#[test]
fn given_same_id_when_subscribing_again_then_callback_is_replaced() {
    // GIVEN: Two callbacks registered under one id
    let notifier = EventNotifier::new();
    let id = SubscriberId::new();
    let (first, first_callback) = recorder();
    let (second, second_callback) = recorder();
    notifier.subscribe(id, first_callback);
    notifier.subscribe(id, second_callback);

    // WHEN: Publishing
    notifier.notify(3);

    // THEN: Only the replacement sees it
    assert!(first.lock().unwrap().is_empty());
    assert_eq!(*second.lock().unwrap(), vec![3]);
    assert_eq!(notifier.subscriber_count(), 1);
}

/// **VALUE**: Verifies `unsubscribe_all` detaches everyone.
#[test]
fn given_many_subscribers_when_unsubscribe_all_then_none_remain() {
    // GIVEN: Three subscribers
    let notifier = EventNotifier::<u32>::new();
    for _ in 0..3 {
        notifier.subscribe(SubscriberId::new(), |_| {});
    }
    assert_eq!(notifier.subscriber_count(), 3);

    // WHEN: Detaching all of them
    notifier.unsubscribe_all();

    // THEN: The map is empty
    assert_eq!(notifier.subscriber_count(), 0);
}

/// **VALUE**: Verifies a subscriber added while a notify is delivering gets that value
/// once, from its own replay, and is not also called by the in-flight notify.
///
/// **WHY THIS MATTERS**: The hub subscribes listeners while actors are publishing; a
/// listener that saw the same tunnel state twice would render a duplicate transition.
///
/// **BUG THIS CATCHES**: Would catch a notify that re-reads the subscriber table
/// mid-delivery, or a subscribe that skips the replay because a delivery is running.
#[test]
fn given_slow_delivery_when_subscribing_concurrently_then_new_subscriber_sees_value_once() {
    // GIVEN: A subscriber that blocks inside its callback until released
    let notifier = EventNotifier::new();
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    notifier.subscribe(SubscriberId::new(), move |value: &u32| {
        entered_tx.send(*value).unwrap();
        release_rx.lock().unwrap().recv().unwrap();
    });

    // WHEN: A notify is stuck in that callback and another thread subscribes
    let publisher = thread::spawn({
        let notifier = notifier.clone();
        move || notifier.notify(7)
    });
    assert_eq!(entered_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);

    let (seen, callback) = recorder();
    let subscriber = thread::spawn({
        let notifier = notifier.clone();
        move || notifier.subscribe(SubscriberId::new(), callback)
    });
    thread::sleep(Duration::from_millis(50));
    assert!(!subscriber.is_finished(), "subscribe must wait for the delivery");
    assert!(seen.lock().unwrap().is_empty());

    release_tx.send(()).unwrap();
    publisher.join().unwrap();
    subscriber.join().unwrap();

    // THEN: The new subscriber got the value exactly once, through its replay
    assert_eq!(*seen.lock().unwrap(), vec![7]);

    // AND: It receives the next value normally
    release_tx.send(()).unwrap();
    notifier.notify(8);
    assert_eq!(*seen.lock().unwrap(), vec![7, 8]);
}
