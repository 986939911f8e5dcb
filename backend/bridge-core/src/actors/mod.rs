//! Feature actors.
//!
//! Each feature of the daemon (tunnel connection, settings, DNS, account, ...) is owned
//! by one actor. An actor is a dedicated task that:
//! - drains its own [command queue](queue) strictly in order, one daemon call at a time,
//! - waits on the availability cell before every call, so commands submitted while the
//!   daemon is away simply queue up,
//! - applies *updates* (daemon-pushed state, fetch results) to its own published values.
//!
//! The loop is the only writer of the actor's notifiers, which is what lets listeners
//! and the hub read them without coordinating with each other.
//!
//! # Architecture
//!
//! ```text
//! Bridge::submit ──► CommandSender ──► [queue] ──► actor loop ──► DaemonClient
//!                                                     ▲   │
//! event pump / fetch watchers ──► update channel ─────┘   └──► EventNotifier ──► Hub
//! ```

pub mod account;
pub mod connection;
pub mod daemon_events;
pub mod dns;
pub mod key_rotation;
pub mod location;
pub mod queue;
pub mod relay;
pub mod settings;
pub mod voucher;

pub use queue::{BackpressurePolicy, CommandReceiver, CommandSender, command_queue};

use crate::daemon::DaemonClient;
use crate::error::actor::ActorError;
use crate::error::daemon::DaemonError;
use crate::sync::Intermittent;

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One feature's command handling and state, independent of the loop that drives it.
pub trait Feature<D: DaemonClient>: Send + 'static {
    type Command: Debug + Send + 'static;
    type Update: Send + 'static;

    const NAME: &'static str;
    const POLICY: BackpressurePolicy;

    /// Perform the daemon call(s) for one command.
    ///
    /// Failures the feature can express as a typed outcome are published and `Ok` is
    /// returned; anything else is returned and logged by the loop.
    fn execute(
        &mut self,
        daemon: &D,
        command: Self::Command,
    ) -> impl Future<Output = Result<(), DaemonError>> + Send;

    /// Fold a pushed update into the feature's published state.
    fn apply(&mut self, update: Self::Update);
}

/// Handle to a running feature actor.
pub struct ActorHandle<C> {
    commands: CommandSender<C>,
    task: JoinHandle<()>,
}

impl<C> ActorHandle<C> {
    #[track_caller]
    pub fn send(&self, command: C) -> Result<(), ActorError> {
        self.commands.send(command)
    }

    pub fn sender(&self) -> CommandSender<C> {
        self.commands.clone()
    }

    /// Close the queue. The in-flight command, if any, runs to completion.
    pub fn close(&self) {
        self.commands.close();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Close the queue and wait for the loop to exit.
    pub async fn stop(self) {
        self.commands.close();
        if let Err(e) = self.task.await {
            warn!("{} actor task ended abnormally: {e}", self.commands.actor());
        }
    }
}

/// Spawn the loop for `feature`.
///
/// `updates` is created by the caller so the feature can hold a sender to its own
/// update channel (fetch watchers report back through it).
pub fn spawn_feature<F, D>(
    mut feature: F,
    daemon: Intermittent<Arc<D>>,
    mut updates: mpsc::UnboundedReceiver<F::Update>,
) -> ActorHandle<F::Command>
where
    F: Feature<D>,
    D: DaemonClient,
{
    let (commands, mut receiver) = command_queue::<F::Command>(F::NAME, F::POLICY);

    let task = tokio::spawn(async move {
        info!("{} actor started", F::NAME);
        let mut updates_open = true;

        loop {
            tokio::select! {
                biased;

                update = updates.recv(), if updates_open => match update {
                    Some(update) => feature.apply(update),
                    None => updates_open = false,
                },

                command = receiver.recv() => {
                    let Some(command) = command else {
                        break;
                    };

                    debug!("{} actor executing {:?}", F::NAME, command);
                    let client = daemon.wait().await;
                    if let Err(e) = feature.execute(&*client, command).await {
                        warn!("{} command failed: {e}", F::NAME);
                    }
                }
            }
        }

        warn!("{} actor stopped", F::NAME);
    });

    ActorHandle { commands, task }
}
