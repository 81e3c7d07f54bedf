use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::Error;
use crate::models::{ChannelId, GuildId, TrackSignal};

/// Opaque audio stream produced by a [`MediaSource`](crate::traits::MediaSource)
/// and consumed by the matching [`VoiceConnection`].
pub struct StreamSource {
    pub label: String,
    payload: Box<dyn Any + Send>,
}

impl StreamSource {
    pub fn new<T: Any + Send>(label: impl Into<String>, payload: T) -> Self {
        Self {
            label: label.into(),
            payload: Box::new(payload),
        }
    }

    /// Recovers the concrete payload. Fails if the source was produced for a
    /// different transport.
    pub fn into_payload<T: Any>(self) -> Result<T, Error> {
        let label = self.label;
        self.payload
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| Error::MediaUnavailable(format!("stream '{label}' has an unexpected payload type")))
    }
}

impl fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSource").field("label", &self.label).finish_non_exhaustive()
    }
}

/// Control over one attached stream.
pub trait TrackControl: Send + Sync {
    fn stop(&self) -> Result<(), Error>;
}

/// A live connection to one guild's voice channel.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Starts streaming `source` into the connection's output sink. Status
    /// signals for this stream are pushed to `signals` as they happen.
    async fn play(
        &self,
        source: StreamSource,
        signals: UnboundedSender<TrackSignal>,
    ) -> Result<Box<dyn TrackControl>, Error>;
}

/// Voice signalling: join and leave channels.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, Error>;

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), Error>;
}
