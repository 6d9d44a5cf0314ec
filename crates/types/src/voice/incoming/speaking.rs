use serde::{Deserialize, Serialize};
use twilight_model::id::{Id, marker::UserMarker};

use crate::voice::SpeakingFlags;

/// Speaking state of another user in the channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct Speaking {
    pub user_id: Id<UserMarker>,
    pub ssrc: u32,
    pub speaking: SpeakingFlags,
}
