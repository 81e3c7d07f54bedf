use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tunebot_common::models::{GuildId, MessageRef};
use tunebot_common::traits::Notifier;

use crate::eventbus::{BotEvent, CommandMessage};
use crate::selection::ReactionRouter;
use crate::services::command::ChatCommand;
use crate::services::orchestrator::SessionOrchestrator;
use crate::voice::{PlaybackController, VoiceSessionManager};

/// Consumes the event channel and routes each event to its owner.
///
/// Commands run as their own tasks so neither a user deliberating over a
/// result set nor a slow chat reply holds up reaction delivery.
pub struct Dispatcher {
    orchestrator: Arc<SessionOrchestrator>,
    router: Arc<ReactionRouter>,
    voice: Arc<VoiceSessionManager>,
    playback: Arc<PlaybackController>,
    notifier: Arc<dyn Notifier>,
    command_prefix: String,
}

impl Dispatcher {
    pub fn new(
        orchestrator: Arc<SessionOrchestrator>,
        router: Arc<ReactionRouter>,
        voice: Arc<VoiceSessionManager>,
        playback: Arc<PlaybackController>,
        notifier: Arc<dyn Notifier>,
        command_prefix: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator,
            router,
            voice,
            playback,
            notifier,
            command_prefix: command_prefix.into(),
        }
    }

    /// Runs until the channel closes or `shutdown` flips to true.
    pub async fn run(
        self: Arc<Self>,
        mut events: UnboundedReceiver<BotEvent>,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        info!("Dispatcher: started");
        loop {
            tokio::select! {
                maybe_event = events.recv() => match maybe_event {
                    Some(event) => {
                        self.handle_event(event).await;
                    }
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Dispatcher: shutting down");
    }

    /// Handles one event. Returns the spawned task for commands.
    pub async fn handle_event(self: &Arc<Self>, event: BotEvent) -> Option<JoinHandle<()>> {
        match event {
            BotEvent::Command(message) => self.handle_command(message).await,
            BotEvent::Reaction(reaction) => {
                if self.router.dispatch(&reaction) {
                    debug!(
                        "Dispatcher: reaction {} resolved a selection on message {}",
                        reaction.emoji, reaction.message.message_id
                    );
                }
                None
            }
            BotEvent::VoiceDisconnected { guild_id } => {
                self.handle_voice_disconnect(guild_id).await;
                None
            }
        }
    }

    async fn handle_command(self: &Arc<Self>, message: CommandMessage) -> Option<JoinHandle<()>> {
        let command = ChatCommand::parse(&self.command_prefix, &message.content)?;
        debug!(
            "Dispatcher: '{}' from user {} on message {}",
            command.name(),
            message.origin.author_id,
            message.origin.message.message_id
        );
        match command {
            ChatCommand::Play(query) => {
                let orchestrator = Arc::clone(&self.orchestrator);
                Some(tokio::spawn(async move {
                    orchestrator.run_play_command(message.origin, &query).await;
                }))
            }
            ChatCommand::List => Some(self.spawn_reply(message.origin.message, "list")),
            ChatCommand::Delete => Some(self.spawn_reply(message.origin.message, "delete")),
        }
    }

    async fn handle_voice_disconnect(&self, guild_id: GuildId) {
        if self.playback.fault_if_disconnected(guild_id, "voice connection lost").await {
            warn!("Dispatcher: playback in guild {guild_id} lost its voice connection");
        }
        if self.voice.handle_transport_disconnect(guild_id).await {
            info!("Dispatcher: forgot dead voice session in guild {guild_id}");
        }
    }

    fn spawn_reply(&self, target: MessageRef, text: &'static str) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&target, text).await {
                warn!("Dispatcher: failed to reply to message {}: {e}", target.message_id);
            }
        })
    }
}
