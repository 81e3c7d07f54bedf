//! tunebot-server/src/context.rs
//!
//! Wires the Discord platform, Songbird voice and the YouTube search client
//! into one service graph.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use tunebot_core::eventbus::{BotEvent, EventBus};
use tunebot_core::platforms::PlatformIntegration;
use tunebot_core::platforms::discord::{CacheVoiceLookup, DiscordNotifier, DiscordPlatform};
use tunebot_core::platforms::songbird::{SongbirdTransport, YoutubeMedia};
use tunebot_core::selection::ReactionRouter;
use tunebot_core::services::{Collaborators, Dispatcher, SessionOrchestrator, SessionSettings, YoutubeSearch};
use tunebot_core::voice::{PlaybackController, VoiceSessionManager};
use tunebot_core::{BotConfig, DefaultHttpClient, Error};

pub struct ServerContext {
    pub event_bus: EventBus,
    pub platform: DiscordPlatform,
    pub dispatcher: Arc<Dispatcher>,
    pub voice: Arc<VoiceSessionManager>,
    pub playback: Arc<PlaybackController>,
}

impl ServerContext {
    /// Connects to Discord and builds everything that hangs off it. Returns
    /// the receiving end of the event bus for the dispatcher.
    pub async fn new(config: &BotConfig) -> Result<(Self, UnboundedReceiver<BotEvent>), Error> {
        let (event_bus, events) = EventBus::new();

        let mut platform = DiscordPlatform::new(config.discord_token.clone(), event_bus.clone());
        platform.connect().await?;
        let http = platform.http()?;
        let cache = platform.cache()?;
        let songbird = platform.songbird()?;

        let web = reqwest::Client::new();
        let notifier = Arc::new(DiscordNotifier::new(http));
        let services = Collaborators {
            search: Arc::new(YoutubeSearch::new(
                Arc::new(DefaultHttpClient::with_client(web.clone())),
                config.youtube_api_key.clone(),
            )),
            notifier: notifier.clone(),
            media: Arc::new(YoutubeMedia::new(
                web,
                config
                    .transcoder_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
            )),
            voice_lookup: Arc::new(CacheVoiceLookup::new(cache)),
        };

        let voice = Arc::new(VoiceSessionManager::new(Arc::new(SongbirdTransport::new(
            songbird,
            event_bus.clone(),
        ))));
        let playback = Arc::new(PlaybackController::new());
        let router = Arc::new(ReactionRouter::new());
        let settings = SessionSettings {
            search_limit: config.search_limit,
            selection_window: config.selection_timeout,
        };
        let orchestrator = Arc::new(SessionOrchestrator::new(
            services,
            Arc::clone(&voice),
            Arc::clone(&playback),
            Arc::clone(&router),
            settings,
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            orchestrator,
            router,
            Arc::clone(&voice),
            Arc::clone(&playback),
            notifier,
            config.command_prefix.clone(),
        ));
        info!("Service graph ready (search limit {}, selection window {:?})", settings.search_limit, settings.selection_window);

        Ok((
            Self {
                event_bus,
                platform,
                dispatcher,
                voice,
                playback,
            },
            events,
        ))
    }
}
