use serde::{Deserialize, Serialize};

/// Names of the dispatch events this crate knows how to decode.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum EventType {
    Ready,
    Resumed,
    GuildCreate,
    MessageCreate,
    #[serde(rename = "MESSAGE_REACTION_ADD")]
    ReactionAdd,
    #[serde(rename = "MESSAGE_REACTION_REMOVE")]
    ReactionRemove,
    VoiceStateUpdate,
    VoiceServerUpdate,
}

impl EventType {
    /// Tries to match the `t` field of a dispatch to an event type.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "READY" => Self::Ready,
            "RESUMED" => Self::Resumed,
            "GUILD_CREATE" => Self::GuildCreate,
            "MESSAGE_CREATE" => Self::MessageCreate,
            "MESSAGE_REACTION_ADD" => Self::ReactionAdd,
            "MESSAGE_REACTION_REMOVE" => Self::ReactionRemove,
            "VOICE_STATE_UPDATE" => Self::VoiceStateUpdate,
            "VOICE_SERVER_UPDATE" => Self::VoiceServerUpdate,
            _ => return None,
        })
    }

    /// Name of the event as it appears on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Resumed => "RESUMED",
            Self::GuildCreate => "GUILD_CREATE",
            Self::MessageCreate => "MESSAGE_CREATE",
            Self::ReactionAdd => "MESSAGE_REACTION_ADD",
            Self::ReactionRemove => "MESSAGE_REACTION_REMOVE",
            Self::VoiceStateUpdate => "VOICE_STATE_UPDATE",
            Self::VoiceServerUpdate => "VOICE_SERVER_UPDATE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EventType;
    use serde_test::Token;

    #[test]
    fn names_match_serde() {
        for kind in [
            EventType::Ready,
            EventType::ReactionAdd,
            EventType::VoiceServerUpdate,
        ] {
            assert_eq!(EventType::from_name(kind.name()), Some(kind));
        }

        serde_test::assert_tokens(
            &EventType::ReactionRemove,
            &[Token::UnitVariant {
                name: "EventType",
                variant: "MESSAGE_REACTION_REMOVE",
            }],
        );
        assert_eq!(EventType::from_name("TYPING_START"), None);
    }
}
