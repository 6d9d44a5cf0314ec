use serde::{Deserialize, Serialize};
use twilight_model::gateway::Intents;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Identify {
    pub token: String,
    pub intents: Intents,
    pub properties: IdentifyProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct IdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl IdentifyProperties {
    /// Properties naming this library as both browser and device.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: name.to_string(),
            device: name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn intents_are_bits() {
        let payload = Identify {
            token: "secret".to_string(),
            intents: Intents::GUILDS | Intents::GUILD_VOICE_STATES,
            properties: IdentifyProperties {
                os: "linux".to_string(),
                browser: "turntable".to_string(),
                device: "turntable".to_string(),
            },
        };

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "token": "secret",
                "intents": 129,
                "properties": {
                    "os": "linux",
                    "browser": "turntable",
                    "device": "turntable",
                },
            })
        );
    }
}
