//! Broadcast hub: the listener registry.
//!
//! The hub is an actor like the features. Its queue is the only path that adds or
//! removes listeners, which is what makes registration atomic with respect to the
//! snapshot: while a listener is being registered the registry lock is held, so no
//! broadcast can slip in between "snapshot sent" and "listener added".
//!
//! Broadcasting happens on the publishing actor's task (the notifier callback), under
//! the same lock. A listener whose transport rejects an event is pruned after the
//! iteration; other listeners never notice.

mod snapshot;

pub use snapshot::SnapshotSources;

use crate::actors::{BackpressurePolicy, CommandSender, command_queue};
use crate::daemon::DaemonClient;
use crate::error::actor::ActorError;
use crate::error::transport::TransportError;
use crate::event::Event;
use crate::sync::{Intermittent, lock};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique listener identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Delivery channel to one listener.
///
/// Called with the registry lock held, so implementations must not block.
pub trait ListenerTransport: Send + Sync + 'static {
    fn send(&self, event: &Event) -> Result<(), TransportError>;
}

impl ListenerTransport for mpsc::UnboundedSender<Event> {
    fn send(&self, event: &Event) -> Result<(), TransportError> {
        mpsc::UnboundedSender::send(self, event.clone())
            .map_err(|_| TransportError::disconnected("listener channel closed"))
    }
}

#[derive(Default)]
pub(crate) struct Registry {
    listeners: BTreeMap<ListenerId, Box<dyn ListenerTransport>>,
}

impl Registry {
    pub(crate) fn broadcast(&mut self, event: &Event) {
        let mut dead = Vec::new();

        for (id, transport) in &self.listeners {
            if let Err(e) = transport.send(event) {
                debug!("{id} rejected {}: {e}", event.kind());
                dead.push(*id);
            }
        }

        for id in dead {
            self.listeners.remove(&id);
            info!("Pruned {id}");
        }
    }
}

enum HubCommand {
    Register {
        transport: Box<dyn ListenerTransport>,
        reply: oneshot::Sender<Option<ListenerId>>,
    },
    Unregister(ListenerId),
}

impl fmt::Debug for HubCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubCommand::Register { .. } => f.write_str("Register"),
            HubCommand::Unregister(id) => write!(f, "Unregister({id})"),
        }
    }
}

/// Cloneable handle to the hub actor.
#[derive(Clone)]
pub struct HubHandle {
    commands: CommandSender<HubCommand>,
    registry: Arc<Mutex<Registry>>,
}

impl HubHandle {
    /// Register a listener and replay the current state to it.
    ///
    /// Suspends until the daemon is available. The transport receives one event per
    /// published value, then [`Event::ListenerReady`], then live events. Returns `None`
    /// if the transport failed during the snapshot, in which case it is not retained.
    ///
    /// # Errors
    ///
    /// [`ActorError`] if the hub has shut down.
    pub async fn register<T: ListenerTransport>(
        &self,
        transport: T,
    ) -> Result<Option<ListenerId>, ActorError> {
        let (reply, response) = oneshot::channel();
        self.commands.send(HubCommand::Register {
            transport: Box::new(transport),
            reply,
        })?;

        response
            .await
            .map_err(|_| ActorError::reply_dropped(BroadcastHub::NAME))
    }

    /// Remove a listener. Unknown ids are ignored.
    #[track_caller]
    pub fn unregister(&self, id: ListenerId) -> Result<(), ActorError> {
        self.commands.send(HubCommand::Unregister(id))
    }

    /// Deliver `event` to every registered listener from outside the actors.
    pub fn send_event(&self, event: &Event) {
        lock(&self.registry).broadcast(event);
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }

    pub fn is_registered(&self, id: ListenerId) -> bool {
        lock(&self.registry).listeners.contains_key(&id)
    }

    pub(crate) fn close(&self) {
        self.commands.close();
    }
}

pub struct BroadcastHub;

impl BroadcastHub {
    pub const NAME: &'static str = "hub";

    /// Spawn the hub actor and subscribe it to every source in `sources`.
    pub fn spawn<D: DaemonClient>(
        daemon: Intermittent<Arc<D>>,
        sources: SnapshotSources,
    ) -> (HubHandle, JoinHandle<()>) {
        let registry = Arc::new(Mutex::new(Registry::default()));
        let (commands, mut receiver) =
            command_queue::<HubCommand>(Self::NAME, BackpressurePolicy::Unbounded);

        sources.subscribe_all(&registry);

        let hub_registry = Arc::clone(&registry);
        let task = tokio::spawn(async move {
            info!("{} actor started", Self::NAME);

            while let Some(command) = receiver.recv().await {
                match command {
                    HubCommand::Register { transport, reply } => {
                        daemon.wait().await;
                        let accepted = register(&hub_registry, &sources, transport);
                        if reply.send(accepted).is_err() {
                            debug!("Registration caller went away");
                        }
                    }
                    HubCommand::Unregister(id) => {
                        if lock(&hub_registry).listeners.remove(&id).is_some() {
                            info!("Unregistered {id}");
                        }
                    }
                }
            }

            sources.unsubscribe_all();
            warn!("{} actor stopped", Self::NAME);
        });

        (HubHandle { commands, registry }, task)
    }
}

fn register(
    registry: &Mutex<Registry>,
    sources: &SnapshotSources,
    transport: Box<dyn ListenerTransport>,
) -> Option<ListenerId> {
    let id = ListenerId::next();
    let mut registry = lock(registry);

    let mut batch = sources.snapshot();
    batch.push(Event::ListenerReady { listener_id: id });

    for event in &batch {
        if let Err(e) = transport.send(event) {
            warn!("{id} failed during snapshot, not registering: {e}");
            return None;
        }
    }

    registry.listeners.insert(id, transport);
    info!("Registered {id} ({} events replayed)", batch.len());
    Some(id)
}
