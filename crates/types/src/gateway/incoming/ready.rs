use serde::{Deserialize, Serialize};

use super::User;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct Ready {
    pub user: User,
    pub session_id: String,
    /// Gateway URL to use when resuming this session.
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use twilight_model::id::Id;

    #[test]
    fn ignores_unused_fields() {
        let json = r#"{
            "v": 10,
            "user": { "id": "80351110224678912", "username": "turntable", "bot": true },
            "guilds": [{ "id": "41771983423143937", "unavailable": true }],
            "session_id": "d1b8f3a0c2",
            "resume_gateway_url": "wss://gateway-us-east1-b.discord.gg",
            "application": { "id": "80351110224678912", "flags": 0 }
        }"#;

        let ready = serde_json::from_str::<Ready>(json).unwrap();
        assert_eq!(
            ready,
            Ready {
                user: User {
                    id: Id::new(80_351_110_224_678_912),
                    username: "turntable".to_string(),
                    bot: true,
                },
                session_id: "d1b8f3a0c2".to_string(),
                resume_gateway_url: Some("wss://gateway-us-east1-b.discord.gg".to_string()),
            }
        );
    }
}
