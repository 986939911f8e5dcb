use crate::actors::{BackpressurePolicy, Feature};
use crate::daemon::DaemonClient;
use crate::daemon::models::VoucherSubmissionResult;
use crate::error::daemon::DaemonError;
use crate::sync::EventNotifier;

use std::convert::Infallible;
use std::fmt;

use log::{info, warn};

#[derive(Clone, PartialEq, Eq)]
pub enum VoucherCommand {
    SubmitVoucher(String),
}

// Voucher codes are redeemable secrets.
impl fmt::Debug for VoucherCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoucherCommand::SubmitVoucher(_) => f.write_str("SubmitVoucher([REDACTED])"),
        }
    }
}

pub struct VoucherActor {
    results: EventNotifier<VoucherSubmissionResult>,
}

impl VoucherActor {
    pub fn new(results: EventNotifier<VoucherSubmissionResult>) -> Self {
        Self { results }
    }
}

impl<D: DaemonClient> Feature<D> for VoucherActor {
    type Command = VoucherCommand;
    type Update = Infallible;

    const NAME: &'static str = "voucher";
    const POLICY: BackpressurePolicy = BackpressurePolicy::Unbounded;

    async fn execute(&mut self, daemon: &D, command: VoucherCommand) -> Result<(), DaemonError> {
        let VoucherCommand::SubmitVoucher(code) = command;

        let result = match daemon.submit_voucher(code.trim()).await {
            Ok(submission) => {
                info!("Voucher added {}s", submission.time_added_secs);
                VoucherSubmissionResult::Ok(submission)
            }
            Err(DaemonError::InvalidVoucher { .. }) => VoucherSubmissionResult::Invalid,
            Err(DaemonError::VoucherAlreadyUsed { .. }) => VoucherSubmissionResult::AlreadyUsed,
            Err(e) => {
                warn!("Voucher submission failed: {e}");
                VoucherSubmissionResult::RpcError
            }
        };

        self.results.notify(result);
        Ok(())
    }

    fn apply(&mut self, update: Infallible) {
        match update {}
    }
}
