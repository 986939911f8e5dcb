use crate::daemon::models::{
    AccountCreationResult, AccountExpiry, AccountHistory, AppVersionInfo, DeviceState,
    DnsOptions, GeoIpLocation, KeyStatus, LoginResult, RelayList, Settings, TunnelState,
    VoucherSubmissionResult,
};
use crate::event::Event;
use crate::hub::Registry;
use crate::sync::{EventNotifier, SubscriberId, lock};

use std::sync::{Arc, Mutex};

/// Every notifier the hub listens to.
///
/// The first group is *state*: its latest values make up a registration snapshot. The
/// second group is *outcomes* of one-off commands (a login attempt, a voucher): those
/// are broadcast live but never replayed, since a late listener did not issue them.
///
/// `Default` creates fresh notifiers; the bridge hands clones of them to the actors.
#[derive(Clone, Default)]
pub struct SnapshotSources {
    pub tunnel_state: EventNotifier<TunnelState>,
    pub settings: EventNotifier<Settings>,
    pub dns_options: EventNotifier<DnsOptions>,
    pub location: EventNotifier<Option<GeoIpLocation>>,
    pub relay_list: EventNotifier<RelayList>,
    pub device: EventNotifier<DeviceState>,
    pub account_history: EventNotifier<AccountHistory>,
    pub account_expiry: EventNotifier<AccountExpiry>,
    pub key_status: EventNotifier<KeyStatus>,
    pub version_info: EventNotifier<AppVersionInfo>,

    pub login: EventNotifier<LoginResult>,
    pub account_creation: EventNotifier<AccountCreationResult>,
    pub voucher: EventNotifier<VoucherSubmissionResult>,

    subscriber: SubscriberId,
}

impl SnapshotSources {
    /// Current state, one event per value that has been published at least once.
    pub fn snapshot(&self) -> Vec<Event> {
        let mut events = Vec::new();

        if let Some(state) = self.tunnel_state.latest() {
            events.push(Event::TunnelStateChanged(state));
        }
        if let Some(settings) = self.settings.latest() {
            events.push(Event::SettingsChanged(settings));
        }
        if let Some(options) = self.dns_options.latest() {
            events.push(Event::DnsOptionsChanged(options));
        }
        if let Some(location) = self.location.latest() {
            events.push(Event::LocationChanged(location));
        }
        if let Some(relays) = self.relay_list.latest() {
            events.push(Event::RelayListChanged(relays));
        }
        if let Some(device) = self.device.latest() {
            events.push(Event::DeviceStateChanged(device));
        }
        if let Some(history) = self.account_history.latest() {
            events.push(Event::AccountHistoryChanged(history));
        }
        if let Some(expiry) = self.account_expiry.latest() {
            events.push(Event::AccountExpiryChanged(expiry));
        }
        if let Some(status) = self.key_status.latest() {
            events.push(Event::KeyStatusChanged(status));
        }
        if let Some(version) = self.version_info.latest() {
            events.push(Event::VersionInfoChanged(version));
        }

        events
    }

    pub(crate) fn subscribe_all(&self, registry: &Arc<Mutex<Registry>>) {
        forward(&self.tunnel_state, self.subscriber, registry, |v| {
            Event::TunnelStateChanged(v.clone())
        });
        forward(&self.settings, self.subscriber, registry, |v| {
            Event::SettingsChanged(v.clone())
        });
        forward(&self.dns_options, self.subscriber, registry, |v| {
            Event::DnsOptionsChanged(v.clone())
        });
        forward(&self.location, self.subscriber, registry, |v| {
            Event::LocationChanged(v.clone())
        });
        forward(&self.relay_list, self.subscriber, registry, |v| {
            Event::RelayListChanged(v.clone())
        });
        forward(&self.device, self.subscriber, registry, |v| {
            Event::DeviceStateChanged(v.clone())
        });
        forward(&self.account_history, self.subscriber, registry, |v| {
            Event::AccountHistoryChanged(v.clone())
        });
        forward(&self.account_expiry, self.subscriber, registry, |v| {
            Event::AccountExpiryChanged(v.clone())
        });
        forward(&self.key_status, self.subscriber, registry, |v| {
            Event::KeyStatusChanged(v.clone())
        });
        forward(&self.version_info, self.subscriber, registry, |v| {
            Event::VersionInfoChanged(v.clone())
        });
        forward(&self.login, self.subscriber, registry, |v| Event::LoginResult(*v));
        forward(&self.account_creation, self.subscriber, registry, |v| {
            Event::AccountCreated(v.clone())
        });
        forward(&self.voucher, self.subscriber, registry, |v| {
            Event::VoucherSubmitted(v.clone())
        });
    }

    pub(crate) fn unsubscribe_all(&self) {
        self.tunnel_state.unsubscribe(self.subscriber);
        self.settings.unsubscribe(self.subscriber);
        self.dns_options.unsubscribe(self.subscriber);
        self.location.unsubscribe(self.subscriber);
        self.relay_list.unsubscribe(self.subscriber);
        self.device.unsubscribe(self.subscriber);
        self.account_history.unsubscribe(self.subscriber);
        self.account_expiry.unsubscribe(self.subscriber);
        self.key_status.unsubscribe(self.subscriber);
        self.version_info.unsubscribe(self.subscriber);
        self.login.unsubscribe(self.subscriber);
        self.account_creation.unsubscribe(self.subscriber);
        self.voucher.unsubscribe(self.subscriber);
    }
}

fn forward<T, F>(
    notifier: &EventNotifier<T>,
    subscriber: SubscriberId,
    registry: &Arc<Mutex<Registry>>,
    to_event: F,
) where
    T: Clone + Send + Sync + 'static,
    F: Fn(&T) -> Event + Send + Sync + 'static,
{
    let registry = Arc::clone(registry);
    notifier.subscribe(subscriber, move |value| {
        lock(&registry).broadcast(&to_event(value));
    });
}
