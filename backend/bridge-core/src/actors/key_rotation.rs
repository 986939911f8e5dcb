use crate::actors::{BackpressurePolicy, Feature};
use crate::daemon::DaemonClient;
use crate::daemon::models::{DeviceState, KeyStatus};
use crate::error::daemon::DaemonError;
use crate::sync::EventNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRotationCommand {
    RotateKey,
    VerifyKey,
}

/// WireGuard key maintenance. The status resets whenever the device is logged out,
/// since the key belonged to that device.
pub struct KeyRotationActor {
    status: EventNotifier<KeyStatus>,
}

impl KeyRotationActor {
    pub fn new(status: EventNotifier<KeyStatus>) -> Self {
        Self { status }
    }
}

impl<D: DaemonClient> Feature<D> for KeyRotationActor {
    type Command = KeyRotationCommand;
    type Update = DeviceState;

    const NAME: &'static str = "key_rotation";
    const POLICY: BackpressurePolicy = BackpressurePolicy::Unbounded;

    async fn execute(
        &mut self,
        daemon: &D,
        command: KeyRotationCommand,
    ) -> Result<(), DaemonError> {
        let status = match command {
            KeyRotationCommand::RotateKey => match daemon.rotate_wireguard_key().await {
                Ok(()) => KeyStatus::Rotated,
                Err(e) => KeyStatus::Failed {
                    reason: e.message().to_string(),
                },
            },
            KeyRotationCommand::VerifyKey => match daemon.verify_wireguard_key().await {
                Ok(valid) => KeyStatus::Verified { valid },
                Err(e) => KeyStatus::Failed {
                    reason: e.message().to_string(),
                },
            },
        };

        self.status.notify(status);
        Ok(())
    }

    fn apply(&mut self, device: DeviceState) {
        if device.account_token().is_none() && self.status.latest() != Some(KeyStatus::Unknown) {
            self.status.notify(KeyStatus::Unknown);
        }
    }
}
