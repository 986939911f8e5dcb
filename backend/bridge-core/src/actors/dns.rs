//! DNS options.
//!
//! The daemon only accepts whole [`DnsOptions`] values, so every edit is computed
//! against a local copy. The copy is refreshed from every settings update and, if the
//! actor has not seen one yet, read from the daemon. Every change to the copy is
//! published.

use crate::actors::{BackpressurePolicy, Feature};
use crate::daemon::DaemonClient;
use crate::daemon::models::{DnsOptions, DnsState};
use crate::error::daemon::DaemonError;
use crate::sync::EventNotifier;

use std::net::IpAddr;

use log::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsCommand {
    SetDnsOptions(DnsOptions),
    SetDnsState(DnsState),
    AddCustomDns(IpAddr),
    SetCustomDns { index: usize, address: IpAddr },
    DeleteCustomDns(IpAddr),
}

pub struct DnsActor {
    cached: Option<DnsOptions>,
    dns_options: EventNotifier<DnsOptions>,
}

impl DnsActor {
    pub fn new(dns_options: EventNotifier<DnsOptions>) -> Self {
        Self {
            cached: None,
            dns_options,
        }
    }

    pub fn cached(&self) -> Option<&DnsOptions> {
        self.cached.as_ref()
    }

    /// Replace the local copy, publishing it if it changed.
    fn store(&mut self, options: DnsOptions) {
        if self.cached.as_ref() == Some(&options) {
            return;
        }
        self.cached = Some(options.clone());
        self.dns_options.notify(options);
    }

    async fn current<D: DaemonClient>(&self, daemon: &D) -> Result<DnsOptions, DaemonError> {
        match &self.cached {
            Some(options) => Ok(options.clone()),
            None => {
                debug!("No cached DNS options, reading settings from the daemon");
                Ok(daemon.get_settings().await?.tunnel_options.dns_options)
            }
        }
    }
}

/// Apply an edit to `options`. Returns `None` when the edit does not change anything
/// or cannot be applied.
pub(crate) fn edit(mut options: DnsOptions, command: DnsCommand) -> Option<DnsOptions> {
    let addresses = &mut options.custom_options.addresses;

    match command {
        DnsCommand::SetDnsOptions(replacement) => return Some(replacement),
        DnsCommand::SetDnsState(state) => {
            if options.state == state {
                return None;
            }
            options.state = state;
        }
        DnsCommand::AddCustomDns(address) => {
            if addresses.contains(&address) {
                return None;
            }
            addresses.push(address);
        }
        DnsCommand::SetCustomDns { index, address } => {
            if index < addresses.len() {
                addresses[index] = address;
            } else if index == addresses.len() {
                addresses.push(address);
            } else {
                warn!(
                    "Custom DNS index {index} out of range ({} entries)",
                    addresses.len()
                );
                return None;
            }
        }
        DnsCommand::DeleteCustomDns(address) => {
            let before = addresses.len();
            addresses.retain(|existing| *existing != address);
            if addresses.len() == before {
                return None;
            }
        }
    }

    Some(options)
}

impl<D: DaemonClient> Feature<D> for DnsActor {
    type Command = DnsCommand;
    type Update = DnsOptions;

    const NAME: &'static str = "dns";
    const POLICY: BackpressurePolicy = BackpressurePolicy::Unbounded;

    async fn execute(&mut self, daemon: &D, command: DnsCommand) -> Result<(), DaemonError> {
        let current = self.current(daemon).await?;
        self.store(current.clone());

        let Some(updated) = edit(current, command) else {
            debug!("DNS edit left options unchanged");
            return Ok(());
        };

        daemon.set_dns_options(updated.clone()).await?;
        // The settings event will confirm this; later edits in the queue build on it now.
        self.store(updated);
        Ok(())
    }

    fn apply(&mut self, options: DnsOptions) {
        self.store(options);
    }
}
