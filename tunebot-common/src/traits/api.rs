//! Collaborators the session controller talks to. Each one is a narrow seam
//! so the selection/playback flow can run against fakes in tests.

use async_trait::async_trait;

use crate::error::Error;
use crate::models::{
    Candidate, ChannelId, CommandOrigin, GuildId, MessageRef, PresentationHandle, ResultSet, UserId,
};
use crate::traits::voice_traits::StreamSource;

/// Video index lookup.
#[async_trait]
pub trait Search: Send + Sync {
    /// Up to `limit` candidates for `query`. Failures surface as
    /// [`Error::SearchUnavailable`].
    async fn find(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, Error>;
}

/// Chat-side presentation: embeds, replies and reaction affordances.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn present_choices(
        &self,
        origin: &CommandOrigin,
        results: &ResultSet,
    ) -> Result<PresentationHandle, Error>;

    /// Replies to `target` with plain text.
    async fn notify(&self, target: &MessageRef, text: &str) -> Result<(), Error>;

    /// Removes the reaction choices added by `present_choices`.
    async fn clear_choices(&self, presentation: &PresentationHandle) -> Result<(), Error>;
}

/// Turns a candidate id into a playable audio stream.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn open_audio_stream(&self, candidate_id: &str) -> Result<StreamSource, Error>;
}

/// Where a member currently sits in voice.
pub trait VoiceChannelLookup: Send + Sync {
    fn voice_channel_of(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId>;
}
