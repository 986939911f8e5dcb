//! Account and device.
//!
//! Owns everything that depends on which account is logged in: device state, the
//! account history slot, and the account expiry. Expiry comes from a fetch cache keyed
//! by the account token, so logging into a different account cancels the lookup for
//! the previous one.

use crate::actors::{BackpressurePolicy, Feature};
use crate::daemon::DaemonClient;
use crate::daemon::models::{
    AccountCreationResult, AccountData, AccountExpiry, AccountHistory, DeviceState, LoginResult,
};
use crate::error::daemon::DaemonError;
use crate::error::fetch::FetchError;
use crate::retry::{BackoffPolicy, FetchCache, FetchWatcher, RetryDecision};
use crate::sync::{EventNotifier, Intermittent};

use common::AccountToken;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountCommand {
    CreateAccount,
    Login(AccountToken),
    Logout,
    ClearAccountHistory,
    /// Re-read the history slot. Queued after commands that change it.
    FetchAccountHistory,
    RefreshAccountExpiry,
}

#[derive(Debug, Clone)]
pub enum AccountUpdate {
    Device(DeviceState),
    History(AccountHistory),
    Expiry {
        token: AccountToken,
        expiry: AccountExpiry,
    },
}

/// Notifiers published by the account actor.
#[derive(Clone, Default)]
pub struct AccountNotifiers {
    pub device: EventNotifier<DeviceState>,
    pub history: EventNotifier<AccountHistory>,
    pub expiry: EventNotifier<AccountExpiry>,
    pub login: EventNotifier<LoginResult>,
    pub creation: EventNotifier<AccountCreationResult>,
}

pub struct AccountActor {
    notifiers: AccountNotifiers,
    expiry_cache: FetchCache<AccountToken, AccountData>,
    updates: mpsc::UnboundedSender<AccountUpdate>,
    logged_in: Option<AccountToken>,
}

impl AccountActor {
    pub fn new<D: DaemonClient>(
        daemon: Intermittent<Arc<D>>,
        notifiers: AccountNotifiers,
        updates: mpsc::UnboundedSender<AccountUpdate>,
        backoff: BackoffPolicy,
        ttl: Duration,
    ) -> Self {
        let expiry_cache = FetchCache::new("account_expiry", ttl, backoff, move |token| {
            let daemon = daemon.clone();
            async move {
                let client = daemon.wait().await;
                Ok::<_, FetchError>(client.get_account_data(&token).await?)
            }
        });

        Self {
            notifiers,
            expiry_cache,
            updates,
            logged_in: None,
        }
    }

    fn fetch_expiry(&self, token: AccountToken) {
        let watcher = ExpiryWatcher {
            token: token.clone(),
            updates: self.updates.clone(),
        };
        self.expiry_cache.fetch(token, Some(Box::new(watcher)));
    }

    fn on_device(&mut self, device: DeviceState) {
        match device.account_token() {
            Some(token) if self.logged_in.as_ref() != Some(token) => {
                info!("Logged in, fetching account expiry");
                self.logged_in = Some(token.clone());
                self.fetch_expiry(token.clone());
            }
            Some(_) => {}
            None => {
                if self.logged_in.take().is_some() {
                    info!("Logged out, dropping account expiry");
                }
                self.expiry_cache.invalidate();
                self.notifiers.expiry.notify(AccountExpiry::Missing);
            }
        }

        self.notifiers.device.notify(device);
    }
}

fn login_outcome(result: Result<(), DaemonError>) -> LoginResult {
    match result {
        Ok(()) => LoginResult::Ok,
        Err(DaemonError::InvalidAccount { .. }) => LoginResult::InvalidAccount,
        Err(DaemonError::MaxDevicesReached { .. }) => LoginResult::MaxDevicesReached,
        Err(DaemonError::Rpc { .. } | DaemonError::Connection { .. }) => LoginResult::RpcError,
        Err(e) => {
            warn!("Unexpected login failure: {e}");
            LoginResult::OtherError
        }
    }
}

impl<D: DaemonClient> Feature<D> for AccountActor {
    type Command = AccountCommand;
    type Update = AccountUpdate;

    const NAME: &'static str = "account";
    const POLICY: BackpressurePolicy = BackpressurePolicy::Unbounded;

    async fn execute(&mut self, daemon: &D, command: AccountCommand) -> Result<(), DaemonError> {
        match command {
            AccountCommand::CreateAccount => {
                let result = match daemon.create_account().await {
                    Ok(token) => AccountCreationResult::Success(token),
                    Err(e) => {
                        warn!("Account creation failed: {e}");
                        AccountCreationResult::Failure
                    }
                };
                self.notifiers.creation.notify(result);
            }
            AccountCommand::Login(token) => {
                let outcome = login_outcome(daemon.login_account(&token).await);
                info!("Login finished: {outcome:?}");
                self.notifiers.login.notify(outcome);
            }
            AccountCommand::Logout => daemon.logout_account().await?,
            AccountCommand::ClearAccountHistory => {
                daemon.clear_account_history().await?;
                self.notifiers.history.notify(AccountHistory::Missing);
            }
            AccountCommand::FetchAccountHistory => {
                let history = AccountHistory::from(daemon.get_account_history().await?);
                self.notifiers.history.notify(history);
            }
            AccountCommand::RefreshAccountExpiry => match self.logged_in.clone() {
                Some(token) => {
                    self.expiry_cache.invalidate();
                    self.fetch_expiry(token);
                }
                None => debug!("Not logged in, no expiry to refresh"),
            },
        }
        Ok(())
    }

    fn apply(&mut self, update: AccountUpdate) {
        match update {
            AccountUpdate::Device(device) => self.on_device(device),
            AccountUpdate::History(history) => self.notifiers.history.notify(history),
            AccountUpdate::Expiry { token, expiry } => {
                if self.logged_in.as_ref() == Some(&token) {
                    self.notifiers.expiry.notify(expiry);
                }
            }
        }
    }
}

struct ExpiryWatcher {
    token: AccountToken,
    updates: mpsc::UnboundedSender<AccountUpdate>,
}

impl ExpiryWatcher {
    fn report(&self, expiry: AccountExpiry) {
        let _ = self.updates.send(AccountUpdate::Expiry {
            token: self.token.clone(),
            expiry,
        });
    }
}

impl FetchWatcher<AccountData> for ExpiryWatcher {
    fn on_finish(&mut self, data: &AccountData) {
        self.report(AccountExpiry::Available(data.clone()));
    }

    fn on_error(&mut self, error: &FetchError) -> RetryDecision {
        match error {
            FetchError::Cancelled { .. } => RetryDecision::Stop,
            FetchError::Daemon(e) if e.is_permanent() => {
                warn!("Account token rejected, not retrying expiry lookup");
                self.report(AccountExpiry::Missing);
                RetryDecision::Stop
            }
            _ => RetryDecision::Retry,
        }
    }
}
