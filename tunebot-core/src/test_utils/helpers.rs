// File: tunebot-core/src/test_utils/helpers.rs

use std::sync::Arc;
use std::time::Duration;

use twilight_model::id::Id;

use tunebot_common::models::{
    Candidate, ChannelId, CommandOrigin, GuildId, MessageRef, PresentationHandle, ReactionEvent, SelectionToken,
    UserId,
};

use crate::eventbus::{BotEvent, CommandMessage};
use crate::selection::ReactionRouter;
use crate::services::{Collaborators, Dispatcher, SessionOrchestrator, SessionSettings};
use crate::test_utils::fakes::{FakeMedia, FakeSearch, FakeVoiceTransport, RecordingNotifier, StaticVoiceLookup};
use crate::voice::{PlaybackController, VoiceSessionManager};

pub const GUILD: u64 = 100;
pub const TEXT_CHANNEL: u64 = 200;
pub const VOICE_CHANNEL: u64 = 300;
pub const OTHER_VOICE_CHANNEL: u64 = 301;
pub const ALICE: u64 = 1;
pub const BOB: u64 = 2;

pub fn guild(id: u64) -> GuildId {
    Id::new(id)
}

pub fn channel(id: u64) -> ChannelId {
    Id::new(id)
}

pub fn user(id: u64) -> UserId {
    Id::new(id)
}

/// `n` playable candidates: `vid1`..`vidN`.
pub fn candidates(n: usize) -> Vec<Candidate> {
    (1..=n)
        .map(|i| Candidate::new(format!("vid{i}"), format!("Song {i}"), format!("Description of song {i}")))
        .collect()
}

/// A command sent in the default guild's text channel.
pub fn origin(message_id: u64, author: u64) -> CommandOrigin {
    CommandOrigin {
        message: MessageRef {
            channel_id: channel(TEXT_CHANNEL),
            message_id: Id::new(message_id),
        },
        guild_id: Some(guild(GUILD)),
        author_id: user(author),
    }
}

pub fn command(message_id: u64, author: u64, content: &str) -> BotEvent {
    BotEvent::Command(CommandMessage {
        origin: origin(message_id, author),
        content: content.to_string(),
    })
}

/// A reaction by `author` picking choice number `number` (1-based).
pub fn pick(presentation: &PresentationHandle, author: u64, number: usize) -> ReactionEvent {
    let emoji = presentation
        .tokens
        .get(number - 1)
        .map(SelectionToken::emoji)
        .unwrap_or("❓");
    reaction(presentation, author, emoji)
}

pub fn reaction(presentation: &PresentationHandle, author: u64, emoji: &str) -> ReactionEvent {
    ReactionEvent {
        message: presentation.message,
        guild_id: Some(guild(GUILD)),
        user_id: user(author),
        emoji: emoji.to_string(),
    }
}

/// The whole service graph wired to fakes. Alice sits in the default
/// voice channel; Bob is not in voice until a test puts him there.
pub struct TestBot {
    pub search: Arc<FakeSearch>,
    pub notifier: Arc<RecordingNotifier>,
    pub media: Arc<FakeMedia>,
    pub lookup: Arc<StaticVoiceLookup>,
    pub transport: Arc<FakeVoiceTransport>,
    pub voice: Arc<VoiceSessionManager>,
    pub playback: Arc<PlaybackController>,
    pub router: Arc<ReactionRouter>,
    pub orchestrator: Arc<SessionOrchestrator>,
    pub dispatcher: Arc<Dispatcher>,
}

impl TestBot {
    pub fn new() -> Self {
        Self::with_parts(FakeSearch::returning(candidates(5)), FakeVoiceTransport::new(), Duration::from_secs(30))
    }

    pub fn with_parts(search: FakeSearch, transport: FakeVoiceTransport, window: Duration) -> Self {
        let search = Arc::new(search);
        let notifier = Arc::new(RecordingNotifier::new());
        let media = Arc::new(FakeMedia::new());
        let lookup = Arc::new(StaticVoiceLookup::new().with(guild(GUILD), user(ALICE), channel(VOICE_CHANNEL)));
        let transport = Arc::new(transport);

        let voice = Arc::new(VoiceSessionManager::new(transport.clone()));
        let playback = Arc::new(PlaybackController::new());
        let router = Arc::new(ReactionRouter::new());
        let services = Collaborators {
            search: search.clone(),
            notifier: notifier.clone(),
            media: media.clone(),
            voice_lookup: lookup.clone(),
        };
        let settings = SessionSettings {
            selection_window: window,
            ..SessionSettings::default()
        };
        let orchestrator = Arc::new(SessionOrchestrator::new(
            services,
            Arc::clone(&voice),
            Arc::clone(&playback),
            Arc::clone(&router),
            settings,
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&orchestrator),
            Arc::clone(&router),
            Arc::clone(&voice),
            Arc::clone(&playback),
            notifier.clone(),
            "@",
        ));

        Self {
            search,
            notifier,
            media,
            lookup,
            transport,
            voice,
            playback,
            router,
            orchestrator,
            dispatcher,
        }
    }
}

impl Default for TestBot {
    fn default() -> Self {
        Self::new()
    }
}

/// Yields until some selection is waiting on `router`.
pub async fn wait_for_gate(router: &ReactionRouter) {
    while router.pending() == 0 {
        tokio::task::yield_now().await;
    }
}
