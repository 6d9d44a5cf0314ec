use serde::{Deserialize, Serialize};

use crate::voice::SpeakingFlags;

/// Announces that this client is about to send audio.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct SetSpeaking {
    pub speaking: SpeakingFlags,
    pub delay: u32,
    pub ssrc: u32,
}

impl SetSpeaking {
    #[must_use]
    pub const fn microphone(ssrc: u32) -> Self {
        Self {
            speaking: SpeakingFlags::MICROPHONE,
            delay: 0,
            ssrc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_test::Token;

    #[test]
    fn flags_are_bits() {
        serde_test::assert_tokens(
            &SetSpeaking::microphone(9),
            &[
                Token::Struct {
                    name: "SetSpeaking",
                    len: 3,
                },
                Token::Str("speaking"),
                Token::U8(1),
                Token::Str("delay"),
                Token::U32(0),
                Token::Str("ssrc"),
                Token::U32(9),
                Token::StructEnd,
            ],
        );
    }
}
