use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker};
use twilight_model::id::Id;

use crate::models::selection::SelectionToken;

pub type GuildId = Id<GuildMarker>;
pub type ChannelId = Id<ChannelMarker>;
pub type UserId = Id<UserMarker>;
pub type MessageId = Id<MessageMarker>;

/// Addresses one chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

/// The chat message that carried a command, and who sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOrigin {
    pub message: MessageRef,
    pub guild_id: Option<GuildId>,
    pub author_id: UserId,
}

/// What the notifier hands back after displaying a result set: the message
/// holding the embed and the reaction choices attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationHandle {
    pub message: MessageRef,
    pub tokens: Vec<SelectionToken>,
}

/// A reaction added to some message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub message: MessageRef,
    pub guild_id: Option<GuildId>,
    pub user_id: UserId,
    /// Unicode emoji name; custom emoji are never forwarded.
    pub emoji: String,
}
