use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use songbird::Songbird;
use songbird::shards::TwilightMap;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use twilight_cache_inmemory::{InMemoryCache, ResourceType};
use twilight_gateway::{
    self as gateway,
    CloseFrame,
    Config,
    Event,
    EventTypeFlags,
    Intents,
    MessageSender,
    Shard,
    StreamExt,
};
use twilight_http::Client as HttpClient;
use twilight_http::client::ClientBuilder;
use twilight_model::channel::message::EmojiReactionType;
use twilight_model::gateway::payload::incoming::Ready as ReadyPayload;

use tunebot_common::models::{CommandOrigin, MessageRef, ReactionEvent};

use crate::Error;
use crate::eventbus::{BotEvent, CommandMessage, EventBus};
use crate::platforms::{ConnectionStatus, PlatformIntegration};

/// Translates a gateway event into the bot's own event vocabulary.
/// Bot-authored messages and custom-emoji reactions are dropped here.
pub fn translate_event(event: &Event) -> Option<BotEvent> {
    match event {
        Event::MessageCreate(msg) => {
            if msg.author.bot {
                trace!("Ignoring bot message from {}", msg.author.name);
                return None;
            }
            Some(BotEvent::Command(CommandMessage {
                origin: CommandOrigin {
                    message: MessageRef {
                        channel_id: msg.channel_id,
                        message_id: msg.id,
                    },
                    guild_id: msg.guild_id,
                    author_id: msg.author.id,
                },
                content: msg.content.clone(),
            }))
        }
        Event::ReactionAdd(reaction) => match &reaction.emoji {
            EmojiReactionType::Unicode { name } => Some(BotEvent::Reaction(ReactionEvent {
                message: MessageRef {
                    channel_id: reaction.channel_id,
                    message_id: reaction.message_id,
                },
                guild_id: reaction.guild_id,
                user_id: reaction.user_id,
                emoji: name.clone(),
            })),
            _ => None,
        },
        _ => None,
    }
}

/// Drives one shard: keeps the cache and songbird fed, and forwards
/// everything the bot reacts to onto the event bus.
async fn shard_runner(
    mut shard: Shard,
    bus: EventBus,
    cache: Arc<InMemoryCache>,
    songbird: Arc<Songbird>,
) {
    let shard_id = shard.id().number();
    info!("(ShardRunner) Shard {shard_id} started. Listening for events.");

    while let Some(item) = shard.next_event(EventTypeFlags::all()).await {
        let event = match item {
            Ok(event) => event,
            Err(err) => {
                error!("Shard {shard_id} => error receiving event: {err:?}");
                continue;
            }
        };

        cache.update(&event);
        songbird.process(&event).await;

        if let Event::Ready(ready) = &event {
            let data: &ReadyPayload = ready;
            info!("Shard {shard_id} => READY as {} (ID={})", data.user.name, data.user.id);
            continue;
        }

        match translate_event(&event) {
            Some(bot_event) => bus.publish(bot_event),
            None => trace!("Shard {shard_id} => unhandled event kind {:?}", event.kind()),
        }

        if bus.is_shutdown() {
            debug!("Shard {shard_id} => shutdown requested");
            break;
        }
    }

    warn!("(ShardRunner) Shard {shard_id} event loop ended.");
}

/// Gateway + REST + voice signalling for one bot account.
pub struct DiscordPlatform {
    pub token: String,
    pub connection_status: ConnectionStatus,

    pub shard_tasks: Vec<JoinHandle<()>>,
    pub shard_senders: Vec<MessageSender>,

    pub http: Option<Arc<HttpClient>>,
    pub cache: Option<Arc<InMemoryCache>>,
    pub songbird: Option<Arc<Songbird>>,
    event_bus: EventBus,
}

impl DiscordPlatform {
    pub fn new(token: String, event_bus: EventBus) -> Self {
        Self {
            token,
            connection_status: ConnectionStatus::Disconnected,
            shard_tasks: Vec::new(),
            shard_senders: Vec::new(),
            http: None,
            cache: None,
            songbird: None,
            event_bus,
        }
    }

    pub fn http(&self) -> Result<Arc<HttpClient>, Error> {
        self.http
            .clone()
            .ok_or_else(|| Error::Platform("Discord platform is not connected".into()))
    }

    pub fn cache(&self) -> Result<Arc<InMemoryCache>, Error> {
        self.cache
            .clone()
            .ok_or_else(|| Error::Platform("Discord platform is not connected".into()))
    }

    pub fn songbird(&self) -> Result<Arc<Songbird>, Error> {
        self.songbird
            .clone()
            .ok_or_else(|| Error::Platform("Discord platform is not connected".into()))
    }
}

#[async_trait]
impl PlatformIntegration for DiscordPlatform {
    async fn connect(&mut self) -> Result<(), Error> {
        if matches!(self.connection_status, ConnectionStatus::Connected) {
            info!("(DiscordPlatform) Already connected => skipping");
            return Ok(());
        }
        if self.token.is_empty() {
            return Err(Error::Config("Discord token is empty".into()));
        }

        let http_client = Arc::new(
            ClientBuilder::new()
                .token(self.token.clone())
                .timeout(Duration::from_secs(30))
                .build(),
        );

        let cache = Arc::new(
            InMemoryCache::builder()
                .resource_types(ResourceType::GUILD | ResourceType::CHANNEL | ResourceType::VOICE_STATE)
                .build(),
        );

        let config = Config::new(
            self.token.clone(),
            Intents::GUILDS
                | Intents::GUILD_MESSAGES
                | Intents::MESSAGE_CONTENT
                | Intents::GUILD_VOICE_STATES
                | Intents::GUILD_MESSAGE_REACTIONS,
        );

        let shards: Vec<Shard> = gateway::create_recommended(&http_client, config, |_, b| b.build())
            .await
            .map_err(|e| Error::Platform(format!("create_recommended error: {e}")))?
            .collect();

        let bot_user = http_client
            .current_user()
            .await
            .map_err(|e| Error::Platform(format!("current_user error: {e:?}")))?
            .model()
            .await
            .map_err(|e| Error::Platform(format!("current_user body error: {e:?}")))?;

        let senders: HashMap<u32, MessageSender> = shards
            .iter()
            .map(|shard| (shard.id().number(), shard.sender()))
            .collect();
        let songbird = Arc::new(Songbird::twilight(Arc::new(TwilightMap::new(senders)), bot_user.id));

        for shard in shards {
            self.shard_senders.push(shard.sender());
            let handle = tokio::spawn(shard_runner(
                shard,
                self.event_bus.clone(),
                Arc::clone(&cache),
                Arc::clone(&songbird),
            ));
            self.shard_tasks.push(handle);
        }

        self.http = Some(http_client);
        self.cache = Some(cache);
        self.songbird = Some(songbird);
        self.connection_status = ConnectionStatus::Connected;
        info!("(DiscordPlatform) connected as {} with {} shard(s)", bot_user.name, self.shard_tasks.len());
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Error> {
        self.connection_status = ConnectionStatus::Disconnected;

        // Gracefully close shards
        for sender in &self.shard_senders {
            let _ = sender.close(CloseFrame::NORMAL);
        }
        for task in &mut self.shard_tasks {
            if let Err(e) = task.await {
                warn!("(DiscordPlatform) shard task ended abnormally: {e}");
            }
        }

        self.shard_senders.clear();
        self.shard_tasks.clear();
        Ok(())
    }
}
