//! src/services/orchestrator.rs
//!
//! End-to-end flow of one play command: validate, search, join voice, present
//! choices, collect the pick, open the stream, attach playback, and relay
//! playback notifications back to the chat.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use tunebot_common::models::{
    ChannelId, CommandOrigin, GuildId, MessageId, MessageRef, PlaybackEvent, ResultSet, MAX_RESULTS,
};
use tunebot_common::traits::{MediaSource, Notifier, Search, VoiceChannelLookup};

use crate::selection::{ReactionRouter, SelectionCollector};
use crate::voice::{PlaybackController, PlaybackHandle, VoiceSession, VoiceSessionManager};
use crate::{Error, ErrorKind};

/// The external services a session needs.
#[derive(Clone)]
pub struct Collaborators {
    pub search: Arc<dyn Search>,
    pub notifier: Arc<dyn Notifier>,
    pub media: Arc<dyn MediaSource>,
    pub voice_lookup: Arc<dyn VoiceChannelLookup>,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub search_limit: usize,
    pub selection_window: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            search_limit: MAX_RESULTS,
            selection_window: SelectionCollector::DEFAULT_WINDOW,
        }
    }
}

pub struct SessionOrchestrator {
    services: Collaborators,
    voice: Arc<VoiceSessionManager>,
    playback: Arc<PlaybackController>,
    collector: SelectionCollector,
    settings: SessionSettings,
    /// Originating messages whose selection is still unresolved.
    pending: Arc<DashMap<MessageId, ()>>,
    /// Commands currently in flight per guild.
    in_flight: Arc<DashMap<GuildId, usize>>,
}

impl SessionOrchestrator {
    pub fn new(
        services: Collaborators,
        voice: Arc<VoiceSessionManager>,
        playback: Arc<PlaybackController>,
        router: Arc<ReactionRouter>,
        settings: SessionSettings,
    ) -> Self {
        let collector = SelectionCollector::new(router, Arc::clone(&services.notifier), settings.selection_window);
        Self {
            services,
            voice,
            playback,
            collector,
            settings,
            pending: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Runs a play command and reports any failure back to the requester.
    /// Never returns an error: every outcome ends as a chat reply.
    pub async fn run_play_command(&self, origin: CommandOrigin, query: &str) -> Option<PlaybackHandle> {
        match self.handle_play(&origin, query).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                match e.kind() {
                    ErrorKind::UserRecoverable => {
                        info!("Play command {} ended: {e}", origin.message.message_id)
                    }
                    ErrorKind::CollaboratorFailure => {
                        error!("Play command {} failed: {e}", origin.message.message_id)
                    }
                    ErrorKind::InvariantViolation => {
                        error!("Play command {} aborted on internal fault: {e}", origin.message.message_id)
                    }
                }
                self.reply(&origin.message, &e.user_message()).await;
                None
            }
        }
    }

    /// The play flow proper. Failures are returned, not reported.
    pub async fn handle_play(&self, origin: &CommandOrigin, query: &str) -> Result<PlaybackHandle, Error> {
        let pending = PendingSelection::claim(&self.pending, origin.message.message_id)?;

        let query = query.trim();
        if query.is_empty() {
            return Err(Error::EmptyQuery);
        }

        let guild_id = origin.guild_id.ok_or(Error::NoVoiceChannel)?;
        let channel_id = self
            .services
            .voice_lookup
            .voice_channel_of(guild_id, origin.author_id)
            .ok_or(Error::NoVoiceChannel)?;
        let _activity = GuildActivity::enter(&self.in_flight, guild_id);

        debug!("Searching '{query}' for user {} in guild {guild_id}", origin.author_id);
        let candidates = self
            .services
            .search
            .find(query, self.settings.search_limit)
            .await
            .map_err(|e| match e {
                Error::SearchUnavailable(_) => e,
                other => Error::SearchUnavailable(other.to_string()),
            })?;
        let results = ResultSet::build_with_limit(candidates, self.settings.search_limit)?;

        self.join_voice(guild_id, channel_id).await?;

        let outcome = self
            .select_and_play(origin, results, guild_id, channel_id, pending)
            .await;
        if outcome.is_err() {
            self.release_if_idle(guild_id).await;
        }
        outcome
    }

    async fn select_and_play(
        &self,
        origin: &CommandOrigin,
        results: ResultSet,
        guild_id: GuildId,
        channel_id: ChannelId,
        pending: PendingSelection,
    ) -> Result<PlaybackHandle, Error> {
        let presentation = self.services.notifier.present_choices(origin, &results).await?;
        let request = self.collector.request(results, origin.author_id);
        let selection = self.collector.collect(presentation, request).await?;
        drop(pending);

        let media_id = selection
            .candidate
            .media_id()
            .ok_or_else(|| Error::InvalidSelection(selection.candidate.title.clone()))?;
        let source = self
            .services
            .media
            .open_audio_stream(media_id)
            .await
            .map_err(|e| match e {
                Error::MediaUnavailable(_) => e,
                other => Error::MediaUnavailable(other.to_string()),
            })?;

        // The connection may have dropped while the user was choosing.
        let session = self.join_voice(guild_id, channel_id).await?;
        let mut handle = self.playback.attach(&session, source).await?;
        info!(
            "Playing '{}' ({media_id}) in guild {guild_id} for user {}",
            selection.candidate.title, origin.author_id
        );

        if let Some(events) = handle.take_events() {
            self.forward_events(origin.message, events);
        }
        Ok(handle)
    }

    /// Joins the requester's channel. Following a requester into another
    /// channel ends whatever was playing in the old one.
    async fn join_voice(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<VoiceSession, Error> {
        if let Some(current) = self.voice.get(guild_id).await {
            if current.channel_id() != channel_id && self.playback.stop(guild_id).await {
                info!(
                    "Stopped playback in channel {} of guild {guild_id} to move to channel {channel_id}",
                    current.channel_id()
                );
            }
        }
        self.voice.ensure_connected(guild_id, channel_id).await
    }

    fn forward_events(&self, target: MessageRef, mut events: mpsc::UnboundedReceiver<PlaybackEvent>) {
        let notifier = Arc::clone(&self.services.notifier);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let PlaybackEvent::Errored(reason) = &event {
                    warn!("Playback for message {} errored: {reason}", target.message_id);
                }
                if let Err(e) = notifier.notify(&target, event.notice()).await {
                    warn!("Failed to relay playback event to message {}: {e}", target.message_id);
                }
            }
        });
    }

    /// Leaves voice after a failed command unless someone else still needs it.
    async fn release_if_idle(&self, guild_id: GuildId) {
        let others = self
            .in_flight
            .get(&guild_id)
            .map(|count| *count.value())
            .unwrap_or(0)
            .saturating_sub(1);
        if others > 0 || self.playback.is_active(guild_id).await {
            return;
        }
        if let Err(e) = self.voice.release(guild_id).await {
            warn!("Failed to release voice in guild {guild_id}: {e}");
        }
    }

    async fn reply(&self, target: &MessageRef, text: &str) {
        if let Err(e) = self.services.notifier.notify(target, text).await {
            warn!("Failed to reply to message {}: {e}", target.message_id);
        }
    }
}

/// Marks an originating message as having a selection in progress.
struct PendingSelection {
    pending: Arc<DashMap<MessageId, ()>>,
    message_id: MessageId,
}

impl PendingSelection {
    fn claim(pending: &Arc<DashMap<MessageId, ()>>, message_id: MessageId) -> Result<Self, Error> {
        if pending.insert(message_id, ()).is_some() {
            return Err(Error::DuplicateSelectionInProgress(message_id.to_string()));
        }
        Ok(Self {
            pending: Arc::clone(pending),
            message_id,
        })
    }
}

impl Drop for PendingSelection {
    fn drop(&mut self) {
        self.pending.remove(&self.message_id);
    }
}

struct GuildActivity {
    in_flight: Arc<DashMap<GuildId, usize>>,
    guild_id: GuildId,
}

impl GuildActivity {
    fn enter(in_flight: &Arc<DashMap<GuildId, usize>>, guild_id: GuildId) -> Self {
        *in_flight.entry(guild_id).or_insert(0) += 1;
        Self {
            in_flight: Arc::clone(in_flight),
            guild_id,
        }
    }
}

impl Drop for GuildActivity {
    fn drop(&mut self) {
        self.in_flight.remove_if_mut(&self.guild_id, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
    }
}
