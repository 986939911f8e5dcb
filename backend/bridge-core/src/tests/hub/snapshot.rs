use crate::daemon::models::{
    AccountExpiry, DnsOptions, DnsState, KeyStatus, Settings, TunnelState, VoucherSubmissionResult,
};
use crate::event::Event;
use crate::hub::SnapshotSources;

fn custom_dns() -> DnsOptions {
    DnsOptions {
        state: DnsState::Custom,
        ..DnsOptions::default()
    }
}

/// **VALUE**: Verifies the snapshot only contains state that has been published.
///
/// **BUG THIS CATCHES**: Would catch default values being invented for state the
/// daemon never reported.
#[test]
fn given_fresh_sources_when_snapshotting_then_empty() {
    let sources = SnapshotSources::default();
    assert!(sources.snapshot().is_empty());
}

/// **VALUE**: Verifies snapshot ordering is stable and excludes outcomes.
///
/// **WHY THIS MATTERS**: UIs rely on the tunnel state arriving before dependent
/// values, and one-off results must not be replayed.
#[test]
fn given_state_and_outcomes_published_when_snapshotting_then_state_only_in_fixed_order() {
    // GIVEN: State published out of order, plus a voucher outcome
    let sources = SnapshotSources::default();
    sources.key_status.notify(KeyStatus::Rotated);
    sources.dns_options.notify(custom_dns());
    sources.account_expiry.notify(AccountExpiry::Missing);
    sources.settings.notify(Settings::default());
    sources.tunnel_state.notify(TunnelState::default());
    sources.voucher.notify(VoucherSubmissionResult::Invalid);

    // WHEN: Taking the snapshot
    let snapshot = sources.snapshot();

    // THEN: Tunnel state first, key status last, no voucher result
    assert_eq!(
        snapshot,
        vec![
            Event::TunnelStateChanged(TunnelState::default()),
            Event::SettingsChanged(Settings::default()),
            Event::DnsOptionsChanged(custom_dns()),
            Event::AccountExpiryChanged(AccountExpiry::Missing),
            Event::KeyStatusChanged(KeyStatus::Rotated),
        ]
    );
}
