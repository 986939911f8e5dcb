use crate::actors::{BackpressurePolicy, Feature};
use crate::daemon::DaemonClient;
use crate::daemon::models::{ObfuscationSettings, QuantumResistantState, Settings};
use crate::error::daemon::DaemonError;
use crate::sync::EventNotifier;

#[derive(Debug, Clone, PartialEq)]
pub enum SettingsCommand {
    SetAllowLan(bool),
    SetAutoConnect(bool),
    SetWireguardMtu(Option<u16>),
    SetQuantumResistant(QuantumResistantState),
    SetObfuscation(ObfuscationSettings),
}

/// Writes individual settings. The daemon answers every write with a settings event,
/// which comes back through [`Feature::apply`] and is republished from there.
pub struct SettingsActor {
    settings: EventNotifier<Settings>,
}

impl SettingsActor {
    pub fn new(settings: EventNotifier<Settings>) -> Self {
        Self { settings }
    }
}

impl<D: DaemonClient> Feature<D> for SettingsActor {
    type Command = SettingsCommand;
    type Update = Settings;

    const NAME: &'static str = "settings";
    const POLICY: BackpressurePolicy = BackpressurePolicy::Unbounded;

    async fn execute(&mut self, daemon: &D, command: SettingsCommand) -> Result<(), DaemonError> {
        match command {
            SettingsCommand::SetAllowLan(allow) => daemon.set_allow_lan(allow).await,
            SettingsCommand::SetAutoConnect(enabled) => daemon.set_auto_connect(enabled).await,
            SettingsCommand::SetWireguardMtu(mtu) => daemon.set_wireguard_mtu(mtu).await,
            SettingsCommand::SetQuantumResistant(state) => {
                daemon.set_quantum_resistant(state).await
            }
            SettingsCommand::SetObfuscation(settings) => daemon.set_obfuscation(settings).await,
        }
    }

    fn apply(&mut self, settings: Settings) {
        self.settings.notify(settings);
    }
}
