use serde::{Deserialize, Serialize};
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker};

/// Joins, moves or leaves (with `channel_id` set to `None`) a voice channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct UpdateVoiceState {
    pub guild_id: Id<GuildMarker>,
    pub channel_id: Option<Id<ChannelMarker>>,
    pub self_mute: bool,
    pub self_deaf: bool,
}

impl UpdateVoiceState {
    #[must_use]
    pub const fn new(guild_id: Id<GuildMarker>, channel_id: Option<Id<ChannelMarker>>) -> Self {
        Self {
            guild_id,
            channel_id,
            self_mute: false,
            self_deaf: true,
        }
    }
}
