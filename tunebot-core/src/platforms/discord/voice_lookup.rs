use std::sync::Arc;

use twilight_cache_inmemory::InMemoryCache;

use tunebot_common::models::{ChannelId, GuildId, UserId};
use tunebot_common::traits::VoiceChannelLookup;

/// Answers "which voice channel is this member in" from the gateway cache.
/// Needs the cache to track `ResourceType::VOICE_STATE`.
pub struct CacheVoiceLookup {
    cache: Arc<InMemoryCache>,
}

impl CacheVoiceLookup {
    pub fn new(cache: Arc<InMemoryCache>) -> Self {
        Self { cache }
    }
}

impl VoiceChannelLookup for CacheVoiceLookup {
    fn voice_channel_of(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
        self.cache
            .voice_state(user_id, guild_id)
            .map(|state| state.channel_id())
    }
}
