use crate::actors::{BackpressurePolicy, Feature};
use crate::daemon::DaemonClient;
use crate::daemon::models::{Constraint, LocationConstraint, RelayList};
use crate::error::daemon::DaemonError;
use crate::sync::EventNotifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayCommand {
    SelectLocation(Constraint<LocationConstraint>),
}

/// Relay selection. Conflated: scrolling through the location list only commits the
/// last pick.
pub struct RelayActor {
    relay_list: EventNotifier<RelayList>,
}

impl RelayActor {
    pub fn new(relay_list: EventNotifier<RelayList>) -> Self {
        Self { relay_list }
    }
}

impl<D: DaemonClient> Feature<D> for RelayActor {
    type Command = RelayCommand;
    type Update = RelayList;

    const NAME: &'static str = "relay";
    const POLICY: BackpressurePolicy = BackpressurePolicy::Conflated;

    async fn execute(&mut self, daemon: &D, command: RelayCommand) -> Result<(), DaemonError> {
        match command {
            RelayCommand::SelectLocation(constraint) => daemon.set_relay_location(constraint).await,
        }
    }

    fn apply(&mut self, relay_list: RelayList) {
        self.relay_list.notify(relay_list);
    }
}
