use serde::{Deserialize, Serialize};
use twilight_model::id::{Id, marker::UserMarker};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ClientConnect {
    /// Users present in the voice channel.
    ///
    /// The first one received after connecting lists everybody already
    /// in the channel, so it is not a join notification.
    pub user_ids: Vec<Id<UserMarker>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ClientDisconnect {
    pub user_id: Id<UserMarker>,
}
