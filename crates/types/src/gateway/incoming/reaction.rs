use serde::{Deserialize, Serialize};
use twilight_model::id::Id;
use twilight_model::id::marker::{
    ChannelMarker, EmojiMarker, GuildMarker, MessageMarker, UserMarker,
};

/// Payload shared by `MESSAGE_REACTION_ADD` and `MESSAGE_REACTION_REMOVE`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct Reaction {
    pub user_id: Id<UserMarker>,
    pub channel_id: Id<ChannelMarker>,
    pub message_id: Id<MessageMarker>,
    #[serde(default)]
    pub guild_id: Option<Id<GuildMarker>>,
    pub emoji: ReactionEmoji,
}

/// Unicode emojis only carry a name, custom ones also have an id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct ReactionEmoji {
    #[serde(default)]
    pub id: Option<Id<EmojiMarker>>,
    #[serde(default)]
    pub name: Option<String>,
}
