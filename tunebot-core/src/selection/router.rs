//! One-shot reaction gates keyed by message.
//!
//! A waiter opens a gate on the message it presented; the dispatcher feeds
//! every reaction through [`ReactionRouter::dispatch`]. The first event that
//! passes the gate's predicate fulfils it and removes it; everything else is
//! dropped on the floor. Dropping the [`ReactionGate`] unregisters it, so a
//! finished or cancelled wait never leaves a listener behind.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use tunebot_common::models::{MessageId, ReactionEvent};

use crate::Error;

type Predicate = Box<dyn Fn(&ReactionEvent) -> bool + Send + Sync>;

struct Gate {
    id: u64,
    predicate: Predicate,
    tx: oneshot::Sender<ReactionEvent>,
}

#[derive(Default)]
pub struct ReactionRouter {
    gates: DashMap<MessageId, Gate>,
    next_id: AtomicU64,
}

impl ReactionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a gate on `message_id`. Only one gate per message may be open.
    pub fn open_gate<F>(self: &Arc<Self>, message_id: MessageId, predicate: F) -> Result<ReactionGate, Error>
    where
        F: Fn(&ReactionEvent) -> bool + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        match self.gates.entry(message_id) {
            Entry::Occupied(_) => {
                return Err(Error::DuplicateSelectionInProgress(message_id.to_string()));
            }
            Entry::Vacant(slot) => {
                slot.insert(Gate {
                    id,
                    predicate: Box::new(predicate),
                    tx,
                });
            }
        }
        debug!("(ReactionRouter) gate {id} opened on message {message_id}");
        Ok(ReactionGate {
            router: Arc::clone(self),
            message_id,
            id,
            rx,
        })
    }

    /// Offers `event` to the gate on its message. Returns whether it fulfilled one.
    pub fn dispatch(&self, event: &ReactionEvent) -> bool {
        let message_id = event.message.message_id;
        match self.gates.remove_if(&message_id, |_, gate| (gate.predicate)(event)) {
            Some((_, gate)) => {
                debug!(
                    "(ReactionRouter) gate {} on message {message_id} fulfilled by user {}",
                    gate.id, event.user_id
                );
                // Receiver may already be gone if the waiter timed out concurrently.
                gate.tx.send(event.clone()).is_ok()
            }
            None => {
                trace!("(ReactionRouter) ignored reaction {} on message {message_id}", event.emoji);
                false
            }
        }
    }

    /// Number of gates currently waiting.
    pub fn pending(&self) -> usize {
        self.gates.len()
    }

    fn close(&self, message_id: MessageId, id: u64) {
        if self.gates.remove_if(&message_id, |_, gate| gate.id == id).is_some() {
            debug!("(ReactionRouter) gate {id} on message {message_id} closed unfulfilled");
        }
    }
}

/// The waiting end of a gate.
pub struct ReactionGate {
    router: Arc<ReactionRouter>,
    message_id: MessageId,
    id: u64,
    rx: oneshot::Receiver<ReactionEvent>,
}

impl ReactionGate {
    /// Resolves with the first matching event. `None` if the router dropped the gate.
    pub async fn recv(&mut self) -> Option<ReactionEvent> {
        (&mut self.rx).await.ok()
    }
}

impl Drop for ReactionGate {
    fn drop(&mut self) {
        self.router.close(self.message_id, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tunebot_common::models::MessageRef;
    use twilight_model::id::Id;

    fn reaction(message: u64, user: u64, emoji: &str) -> ReactionEvent {
        ReactionEvent {
            message: MessageRef {
                channel_id: Id::new(10),
                message_id: Id::new(message),
            },
            guild_id: Some(Id::new(1)),
            user_id: Id::new(user),
            emoji: emoji.to_string(),
        }
    }

    #[tokio::test]
    async fn first_matching_event_wins() {
        let router = Arc::new(ReactionRouter::new());
        let mut gate = router
            .open_gate(Id::new(5), |ev| ev.user_id == Id::new(7))
            .unwrap();

        assert!(!router.dispatch(&reaction(5, 8, "1️⃣")));
        assert!(!router.dispatch(&reaction(6, 7, "1️⃣")));
        assert!(router.dispatch(&reaction(5, 7, "2️⃣")));
        assert!(!router.dispatch(&reaction(5, 7, "3️⃣")));

        assert_eq!(gate.recv().await.map(|ev| ev.emoji), Some("2️⃣".to_string()));
        assert_eq!(router.pending(), 0);
    }

    #[test]
    fn dropping_the_gate_unregisters_it() {
        let router = Arc::new(ReactionRouter::new());
        let gate = router.open_gate(Id::new(5), |_| true).unwrap();
        assert_eq!(router.pending(), 1);
        drop(gate);
        assert_eq!(router.pending(), 0);
        assert!(!router.dispatch(&reaction(5, 7, "1️⃣")));
    }

    #[test]
    fn one_gate_per_message() {
        let router = Arc::new(ReactionRouter::new());
        let _gate = router.open_gate(Id::new(5), |_| true).unwrap();
        assert!(matches!(
            router.open_gate(Id::new(5), |_| true),
            Err(Error::DuplicateSelectionInProgress(_))
        ));
        assert!(router.open_gate(Id::new(6), |_| true).is_ok());
    }

    #[test]
    fn stale_gate_drop_does_not_close_a_newer_gate() {
        let router = Arc::new(ReactionRouter::new());
        let mut first = router.open_gate(Id::new(5), |_| true).unwrap();
        assert!(router.dispatch(&reaction(5, 7, "1️⃣")));
        let _second = router.open_gate(Id::new(5), |_| true).unwrap();
        assert!(first.rx.try_recv().is_ok());
        drop(first);
        assert_eq!(router.pending(), 1);
    }
}
