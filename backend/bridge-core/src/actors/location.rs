//! Exit location lookup.
//!
//! The location depends on where the tunnel exits, so the fetch subject is derived from
//! the tunnel state. While the tunnel is moving between states the location is unknown:
//! the cache is invalidated and `None` is published. Once the tunnel settles, the daemon
//! is polled through the fetch cache until it reports a location (it answers `None`
//! while its own lookup is still running).

use crate::actors::{BackpressurePolicy, Feature};
use crate::daemon::DaemonClient;
use crate::daemon::models::{GeoIpLocation, TunnelState};
use crate::error::daemon::DaemonError;
use crate::error::fetch::FetchError;
use crate::retry::{BackoffPolicy, FetchCache, FetchWatcher, RetryDecision};
use crate::sync::{EventNotifier, Intermittent};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationCommand {
    FetchLocation,
}

#[derive(Debug, Clone)]
pub enum LocationUpdate {
    TunnelState(TunnelState),
    Resolved {
        subject: LocationSubject,
        location: GeoIpLocation,
    },
}

/// What the current location depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationSubject {
    Disconnected,
    Connected(SocketAddr),
}

impl LocationSubject {
    /// `None` for transitional states.
    pub fn from_tunnel_state(state: &TunnelState) -> Option<Self> {
        match state {
            TunnelState::Disconnected { .. } => Some(LocationSubject::Disconnected),
            TunnelState::Connected { endpoint, .. } => {
                Some(LocationSubject::Connected(endpoint.address))
            }
            TunnelState::Connecting { .. }
            | TunnelState::Disconnecting { .. }
            | TunnelState::Error { .. } => None,
        }
    }
}

pub struct LocationActor {
    cache: FetchCache<LocationSubject, GeoIpLocation>,
    location: EventNotifier<Option<GeoIpLocation>>,
    subject: Option<LocationSubject>,
    updates: mpsc::UnboundedSender<LocationUpdate>,
}

impl LocationActor {
    pub fn new<D: DaemonClient>(
        daemon: Intermittent<Arc<D>>,
        location: EventNotifier<Option<GeoIpLocation>>,
        updates: mpsc::UnboundedSender<LocationUpdate>,
        backoff: BackoffPolicy,
        ttl: Duration,
    ) -> Self {
        let cache = FetchCache::new("location", ttl, backoff, move |_subject| {
            let daemon = daemon.clone();
            async move {
                let client = daemon.wait().await;
                client
                    .get_current_location()
                    .await?
                    .ok_or_else(|| FetchError::unavailable("daemon has not resolved a location yet"))
            }
        });

        Self {
            cache,
            location,
            subject: None,
            updates,
        }
    }

    pub fn subject(&self) -> Option<LocationSubject> {
        self.subject
    }

    fn request(&self, subject: LocationSubject) {
        let watcher = LocationWatcher {
            subject,
            updates: self.updates.clone(),
        };
        self.cache.fetch(subject, Some(Box::new(watcher)));
    }

    fn on_tunnel_state(&mut self, state: &TunnelState) {
        match LocationSubject::from_tunnel_state(state) {
            None => {
                self.subject = None;
                self.cache.invalidate();
                self.location.notify(None);
            }
            Some(subject) if self.subject == Some(subject) => {}
            Some(subject) => {
                debug!("Location subject is now {subject:?}");
                self.subject = Some(subject);
                self.location.notify(None);
                self.request(subject);
            }
        }
    }
}

impl<D: DaemonClient> Feature<D> for LocationActor {
    type Command = LocationCommand;
    type Update = LocationUpdate;

    const NAME: &'static str = "location";
    const POLICY: BackpressurePolicy = BackpressurePolicy::Conflated;

    async fn execute(&mut self, _daemon: &D, command: LocationCommand) -> Result<(), DaemonError> {
        match command {
            LocationCommand::FetchLocation => match self.subject {
                Some(subject) => self.request(subject),
                None => debug!("Tunnel is changing state, location fetch deferred"),
            },
        }
        Ok(())
    }

    fn apply(&mut self, update: LocationUpdate) {
        match update {
            LocationUpdate::TunnelState(state) => self.on_tunnel_state(&state),
            // A result can be queued behind a tunnel state change that superseded it.
            LocationUpdate::Resolved { subject, location } => {
                if self.subject == Some(subject) {
                    self.location.notify(Some(location));
                }
            }
        }
    }
}

struct LocationWatcher {
    subject: LocationSubject,
    updates: mpsc::UnboundedSender<LocationUpdate>,
}

impl FetchWatcher<GeoIpLocation> for LocationWatcher {
    fn on_finish(&mut self, location: &GeoIpLocation) {
        let _ = self.updates.send(LocationUpdate::Resolved {
            subject: self.subject,
            location: location.clone(),
        });
    }

    fn on_error(&mut self, error: &FetchError) -> RetryDecision {
        if error.is_cancelled() {
            return RetryDecision::Stop;
        }
        RetryDecision::Retry
    }
}
