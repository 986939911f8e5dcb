use crate::actors::dns::{DnsActor, DnsCommand, edit};
use crate::actors::spawn_feature;
use crate::daemon::models::{DnsOptions, DnsState};
use crate::error::daemon::DaemonError;
use crate::sync::{EventNotifier, SubscriberId};
use crate::tests::support::{MockDaemon, available, settle, within};

use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

fn ip(address: &str) -> IpAddr {
    address.parse().unwrap()
}

fn with_custom(addresses: &[&str]) -> DnsOptions {
    let mut options = DnsOptions::default();
    options.custom_options.addresses = addresses.iter().map(|a| ip(a)).collect();
    options
}

/// **VALUE**: Verifies the custom-server edits produce the expected address lists.
///
/// **WHY THIS MATTERS**: The daemon replaces the whole DNS configuration on every set,
/// so a wrong local edit silently wipes the user's other servers.
#[test]
fn given_custom_servers_when_edited_then_list_updated_in_place() {
    // GIVEN: Two custom servers
    let options = with_custom(&["1.1.1.1", "9.9.9.9"]);

    // WHEN/THEN: Replacing index 1 keeps index 0
    let replaced = edit(
        options.clone(),
        DnsCommand::SetCustomDns {
            index: 1,
            address: ip("8.8.8.8"),
        },
    )
    .unwrap();
    assert_eq!(replaced, with_custom(&["1.1.1.1", "8.8.8.8"]));

    // WHEN/THEN: Setting at index == len appends
    let appended = edit(
        options.clone(),
        DnsCommand::SetCustomDns {
            index: 2,
            address: ip("8.8.4.4"),
        },
    )
    .unwrap();
    assert_eq!(appended, with_custom(&["1.1.1.1", "9.9.9.9", "8.8.4.4"]));

    // WHEN/THEN: Deleting removes exactly that address
    let deleted = edit(options, DnsCommand::DeleteCustomDns(ip("1.1.1.1"))).unwrap();
    assert_eq!(deleted, with_custom(&["9.9.9.9"]));
}

/// **VALUE**: Verifies edits that change nothing are reported as no-ops.
///
/// **BUG THIS CATCHES**: Would catch duplicate servers being added, or an
/// out-of-range index panicking the actor.
#[test]
fn given_noop_edits_when_applied_then_none_returned() {
    // GIVEN: One custom server, default state
    let options = with_custom(&["1.1.1.1"]);

    // WHEN/THEN: Each edit below leaves the options as they are
    assert_eq!(edit(options.clone(), DnsCommand::AddCustomDns(ip("1.1.1.1"))), None);
    assert_eq!(edit(options.clone(), DnsCommand::DeleteCustomDns(ip("8.8.8.8"))), None);
    assert_eq!(edit(options.clone(), DnsCommand::SetDnsState(DnsState::Default)), None);
    assert_eq!(
        edit(
            options,
            DnsCommand::SetCustomDns {
                index: 5,
                address: ip("8.8.8.8"),
            },
        ),
        None
    );
}

/// **VALUE**: Verifies queued edits build on each other before the daemon confirms.
///
/// **WHY THIS MATTERS**: Two "add server" clicks in a row must add both servers, even
/// though the settings event for the first has not arrived yet.
///
/// **BUG THIS CATCHES**: Would catch each edit being computed against stale options,
/// so the second set overwrites the first.
#[tokio::test]
async fn given_two_adds_when_executed_back_to_back_then_daemon_ends_with_both() {
    // GIVEN: A DNS actor that has not seen any settings yet
    let daemon = MockDaemon::new();
    let (_updates, updates_rx) = mpsc::unbounded_channel::<DnsOptions>();
    let actor = spawn_feature(DnsActor::new(EventNotifier::new()), available(&daemon), updates_rx);

    // WHEN: Two servers are added and custom DNS is enabled
    actor.send(DnsCommand::AddCustomDns(ip("1.1.1.1"))).unwrap();
    actor.send(DnsCommand::AddCustomDns(ip("9.9.9.9"))).unwrap();
    actor.send(DnsCommand::SetDnsState(DnsState::Custom)).unwrap();
    within(daemon.wait_for("set_dns_options", 3)).await;
    settle().await;

    // THEN: Settings were read once, and the final options contain everything
    assert_eq!(daemon.count("get_settings"), 1);
    let mut stored = None;
    daemon.script(|s| stored = Some(s.settings.tunnel_options.dns_options.clone()));
    let mut expected = with_custom(&["1.1.1.1", "9.9.9.9"]);
    expected.state = DnsState::Custom;
    assert_eq!(stored, Some(expected));
}

/// **VALUE**: Verifies a no-op edit makes no daemon call.
#[tokio::test]
async fn given_pushed_options_when_noop_edit_submitted_then_daemon_not_called() {
    // GIVEN: An actor that received the current options from a settings update
    let daemon = MockDaemon::new();
    let (updates, updates_rx) = mpsc::unbounded_channel();
    let actor = spawn_feature(DnsActor::new(EventNotifier::new()), available(&daemon), updates_rx);
    updates.send(with_custom(&["1.1.1.1"])).unwrap();
    settle().await;

    // WHEN: Adding a server that is already there, then deleting one that is not
    actor.send(DnsCommand::AddCustomDns(ip("1.1.1.1"))).unwrap();
    actor.send(DnsCommand::DeleteCustomDns(ip("8.8.8.8"))).unwrap();
    settle().await;

    // THEN: Nothing reached the daemon
    assert!(daemon.calls().is_empty(), "unexpected calls: {:?}", daemon.calls());
}

/// **VALUE**: Verifies every change to the DNS options is published, and repeats are not.
///
/// **WHY THIS MATTERS**: The UI renders the DNS screen from the published options; a
/// silent actor leaves it showing the options from before the user's edit.
///
/// **BUG THIS CATCHES**: Would catch an actor that updates its local copy without
/// notifying, or one that re-publishes the daemon's echo of its own edit.
#[tokio::test]
async fn given_subscriber_when_options_pushed_and_edited_then_each_change_published_once() {
    // GIVEN: A DNS actor whose notifier has one subscriber
    let daemon = MockDaemon::new();
    let notifier = EventNotifier::new();
    let published = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&published);
    notifier.subscribe(SubscriberId::new(), move |options: &DnsOptions| {
        sink.lock().unwrap().push(options.clone())
    });
    let (updates, updates_rx) = mpsc::unbounded_channel();
    let actor = spawn_feature(DnsActor::new(notifier.clone()), available(&daemon), updates_rx);

    // WHEN: Settings push the current options, then the user adds a server
    updates.send(with_custom(&["1.1.1.1"])).unwrap();
    settle().await;
    actor.send(DnsCommand::AddCustomDns(ip("9.9.9.9"))).unwrap();
    within(daemon.wait_for("set_dns_options", 1)).await;
    settle().await;

    // AND: The daemon echoes the edited options back through settings
    updates.send(with_custom(&["1.1.1.1", "9.9.9.9"])).unwrap();
    settle().await;

    // THEN: The pushed value and the edit were each published once, the echo was not
    assert_eq!(
        *published.lock().unwrap(),
        vec![with_custom(&["1.1.1.1"]), with_custom(&["1.1.1.1", "9.9.9.9"])]
    );
    assert_eq!(notifier.latest(), Some(with_custom(&["1.1.1.1", "9.9.9.9"])));
}

/// **VALUE**: Verifies a failed set publishes nothing.
///
/// **BUG THIS CATCHES**: Would catch the actor publishing the edit before the daemon
/// accepted it, leaving the UI showing a server that was never configured.
#[tokio::test]
async fn given_daemon_rejects_set_when_edited_then_nothing_published() {
    // GIVEN: A DNS actor holding pushed options, with a daemon that rejects DNS sets
    let daemon = MockDaemon::new();
    daemon.script(|s| s.set_dns = Err(DaemonError::rpc("rejected")));
    let notifier = EventNotifier::new();
    let (updates, updates_rx) = mpsc::unbounded_channel();
    let actor = spawn_feature(DnsActor::new(notifier.clone()), available(&daemon), updates_rx);
    updates.send(with_custom(&["1.1.1.1"])).unwrap();
    settle().await;

    // WHEN: The user adds a server
    actor.send(DnsCommand::AddCustomDns(ip("9.9.9.9"))).unwrap();
    within(daemon.wait_for("set_dns_options", 1)).await;
    settle().await;

    // THEN: Only the pushed options were ever published
    assert_eq!(notifier.latest(), Some(with_custom(&["1.1.1.1"])));
}
