use serde::{Deserialize, Serialize};
use twilight_model::id::Id;
use twilight_model::id::marker::GuildMarker;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct VoiceServerUpdate {
    pub token: String,
    pub guild_id: Id<GuildMarker>,
    /// `None` while the voice server is being reallocated.
    pub endpoint: Option<String>,
}
