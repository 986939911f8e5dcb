//! Single-consumer command queues with an explicit backpressure policy.
//!
//! tokio's mpsc channels cannot drop queued items on push, which is what a conflated
//! queue needs, so the queue is a `VecDeque` behind a mutex with a [`Notify`] to wake
//! the consumer.

use crate::error::actor::ActorError;
use crate::sync::lock;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use log::trace;
use tokio::sync::Notify;

/// What happens to pending commands when a new one arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// Keep every command, in order.
    Unbounded,
    /// Keep only the newest pending command. The in-flight command is not affected.
    Conflated,
}

struct Slots<C> {
    items: VecDeque<C>,
    closed: bool,
}

struct Queue<C> {
    actor: &'static str,
    policy: BackpressurePolicy,
    slots: Mutex<Slots<C>>,
    wake: Notify,
}

pub struct CommandSender<C> {
    queue: Arc<Queue<C>>,
}

impl<C> Clone for CommandSender<C> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}

pub struct CommandReceiver<C> {
    queue: Arc<Queue<C>>,
}

pub fn command_queue<C>(
    actor: &'static str,
    policy: BackpressurePolicy,
) -> (CommandSender<C>, CommandReceiver<C>) {
    let queue = Arc::new(Queue {
        actor,
        policy,
        slots: Mutex::new(Slots {
            items: VecDeque::new(),
            closed: false,
        }),
        wake: Notify::new(),
    });

    (
        CommandSender {
            queue: Arc::clone(&queue),
        },
        CommandReceiver { queue },
    )
}

impl<C> CommandSender<C> {
    /// Enqueue without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::QueueClosed`] once the queue has been closed.
    #[track_caller]
    pub fn send(&self, command: C) -> Result<(), ActorError> {
        {
            let mut slots = lock(&self.queue.slots);
            if slots.closed {
                return Err(ActorError::queue_closed(self.queue.actor));
            }

            if self.queue.policy == BackpressurePolicy::Conflated && !slots.items.is_empty() {
                trace!(
                    "{} dropped {} superseded command(s)",
                    self.queue.actor,
                    slots.items.len()
                );
                slots.items.clear();
            }
            slots.items.push_back(command);
        }

        self.queue.wake.notify_one();
        Ok(())
    }

    /// Stop accepting commands. Pending commands are discarded; the consumer sees
    /// `None` on its next receive.
    pub fn close(&self) {
        {
            let mut slots = lock(&self.queue.slots);
            slots.closed = true;
            slots.items.clear();
        }
        self.queue.wake.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.queue.slots).closed
    }

    pub fn pending(&self) -> usize {
        lock(&self.queue.slots).items.len()
    }

    pub fn actor(&self) -> &'static str {
        self.queue.actor
    }
}

impl<C> CommandReceiver<C> {
    /// Next command in submission order, or `None` once closed. Cancel safe.
    pub async fn recv(&mut self) -> Option<C> {
        loop {
            {
                let mut slots = lock(&self.queue.slots);
                if slots.closed {
                    return None;
                }
                if let Some(command) = slots.items.pop_front() {
                    return Some(command);
                }
            }

            self.queue.wake.notified().await;
        }
    }
}
