use serde::{Deserialize, Serialize};
use twilight_model::id::Id;
use twilight_model::id::marker::GuildMarker;

use super::VoiceState;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct GuildCreate {
    pub id: Id<GuildMarker>,
    #[serde(default)]
    pub voice_states: Vec<VoiceState>,
}
