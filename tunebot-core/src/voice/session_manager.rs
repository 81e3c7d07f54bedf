use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tunebot_common::models::{ChannelId, GuildId};
use tunebot_common::traits::{VoiceConnection, VoiceTransport};

use crate::Error;

/// The live connection between the bot and one guild's voice channel.
/// Clones share the same underlying connection.
#[derive(Clone)]
pub struct VoiceSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    guild_id: GuildId,
    channel_id: ChannelId,
    connection: Arc<dyn VoiceConnection>,
}

impl VoiceSession {
    fn new(guild_id: GuildId, channel_id: ChannelId, connection: Arc<dyn VoiceConnection>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                guild_id,
                channel_id,
                connection,
            }),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.inner.guild_id
    }

    pub fn channel_id(&self) -> ChannelId {
        self.inner.channel_id
    }

    pub fn connection(&self) -> &Arc<dyn VoiceConnection> {
        &self.inner.connection
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    /// True when both handles refer to the same connection attempt.
    pub fn same_session(&self, other: &VoiceSession) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for VoiceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceSession")
            .field("guild_id", &self.inner.guild_id)
            .field("channel_id", &self.inner.channel_id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

type Slot = Arc<Mutex<Option<VoiceSession>>>;

/// Owns at most one [`VoiceSession`] per guild. Every operation on a guild
/// runs under that guild's lock, so a connect can never race a disconnect.
pub struct VoiceSessionManager {
    transport: Arc<dyn VoiceTransport>,
    slots: DashMap<GuildId, Slot>,
}

impl VoiceSessionManager {
    pub fn new(transport: Arc<dyn VoiceTransport>) -> Self {
        Self {
            transport,
            slots: DashMap::new(),
        }
    }

    fn slot(&self, guild_id: GuildId) -> Slot {
        Arc::clone(self.slots.entry(guild_id).or_default().value())
    }

    /// Returns the guild's session on `channel_id`, joining or migrating as needed.
    pub async fn ensure_connected(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<VoiceSession, Error> {
        let slot = self.slot(guild_id);
        let mut current = slot.lock().await;

        if let Some(existing) = current.as_ref() {
            if existing.channel_id() == channel_id && existing.is_connected() {
                debug!("(VoiceSessionManager) reusing session in guild {guild_id} channel {channel_id}");
                return Ok(existing.clone());
            }
            if existing.is_connected() {
                info!(
                    "(VoiceSessionManager) migrating guild {guild_id} from channel {} to {channel_id}",
                    existing.channel_id()
                );
            } else {
                debug!("(VoiceSessionManager) replacing dead session in guild {guild_id}");
            }
            if let Err(e) = self.transport.disconnect(guild_id).await {
                warn!("(VoiceSessionManager) disconnect before migration failed in guild {guild_id}: {e}");
            }
            *current = None;
        }

        let connection = self
            .transport
            .connect(guild_id, channel_id)
            .await
            .map_err(|e| match e {
                Error::VoiceConnect(_) => e,
                other => Error::VoiceConnect(other.to_string()),
            })?;
        let session = VoiceSession::new(guild_id, channel_id, connection);
        *current = Some(session.clone());
        info!("(VoiceSessionManager) joined channel {channel_id} in guild {guild_id}");
        Ok(session)
    }

    /// Tears down and forgets the guild's session. No-op if there is none.
    pub async fn release(&self, guild_id: GuildId) -> Result<(), Error> {
        let Some(slot) = self.slots.get(&guild_id).map(|s| Arc::clone(s.value())) else {
            return Ok(());
        };
        let mut current = slot.lock().await;
        if let Some(session) = current.take() {
            info!("(VoiceSessionManager) leaving channel {} in guild {guild_id}", session.channel_id());
            self.transport.disconnect(guild_id).await?;
        }
        Ok(())
    }

    /// The transport says a connection in this guild dropped. Forgets the
    /// stored session if it is the one that died; a newer live session stays.
    pub async fn handle_transport_disconnect(&self, guild_id: GuildId) -> bool {
        let Some(slot) = self.slots.get(&guild_id).map(|s| Arc::clone(s.value())) else {
            return false;
        };
        let mut current = slot.lock().await;
        match current.as_ref() {
            Some(session) if !session.is_connected() => {
                warn!(
                    "(VoiceSessionManager) transport dropped channel {} in guild {guild_id}",
                    session.channel_id()
                );
                *current = None;
                true
            }
            _ => false,
        }
    }

    /// Releases every guild's session. Returns how many were torn down.
    pub async fn release_all(&self) -> usize {
        let guilds: Vec<GuildId> = self.slots.iter().map(|entry| *entry.key()).collect();
        let mut released = 0;
        for guild_id in guilds {
            if self.get(guild_id).await.is_none() {
                continue;
            }
            match self.release(guild_id).await {
                Ok(()) => released += 1,
                Err(e) => warn!("(VoiceSessionManager) failed to leave guild {guild_id}: {e}"),
            }
        }
        released
    }

    pub async fn get(&self, guild_id: GuildId) -> Option<VoiceSession> {
        let slot = self.slots.get(&guild_id).map(|s| Arc::clone(s.value()))?;
        let current = slot.lock().await;
        current.clone()
    }
}
