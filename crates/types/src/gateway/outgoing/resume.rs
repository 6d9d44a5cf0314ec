use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct Resume {
    pub token: String,
    pub session_id: String,
    /// Last sequence number received before the connection dropped.
    pub seq: i32,
}
