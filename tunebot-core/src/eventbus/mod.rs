//! src/eventbus/mod.rs
//!
//! Gateway callbacks are flattened into `BotEvent`s on one channel. A single
//! dispatcher task owns the receiving end, so command routing, reaction
//! delivery and voice teardown are handled in arrival order.

use tokio::sync::{mpsc, watch};
use tracing::trace;

use tunebot_common::models::{CommandOrigin, GuildId, ReactionEvent};

/// A chat message that looked like a command, after bot authors were filtered out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMessage {
    pub origin: CommandOrigin,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEvent {
    Command(CommandMessage),
    Reaction(ReactionEvent),
    /// The voice transport reported that a guild's connection went away.
    VoiceDisconnected { guild_id: GuildId },
}

impl BotEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            BotEvent::Command(_) => "command",
            BotEvent::Reaction(_) => "reaction",
            BotEvent::VoiceDisconnected { .. } => "voice_disconnected",
        }
    }
}

/// Publishing side of the event channel. Cheap to clone; every shard runner
/// and voice event handler holds one.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<BotEvent>,
    shutdown_tx: watch::Sender<bool>,
    pub shutdown_rx: watch::Receiver<bool>,
}

impl EventBus {
    /// Creates the bus and the single receiver the dispatcher consumes.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BotEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        (
            Self {
                tx,
                shutdown_tx,
                shutdown_rx,
            },
            rx,
        )
    }

    pub fn publish(&self, event: BotEvent) {
        trace!("(EventBus) publish {}", event.event_type());
        // Only fails once the dispatcher is gone, i.e. during shutdown.
        let _ = self.tx.send(event);
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }
}
