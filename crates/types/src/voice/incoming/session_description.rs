use serde::{Deserialize, Serialize};

use crate::RTP_KEY_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct SessionDescription {
    pub mode: String,
    pub secret_key: [u8; RTP_KEY_LEN],
    #[serde(default)]
    pub encodings: Vec<Encoding>,
}

/// Media encoding the voice server expects from this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct Encoding {
    pub ssrc: u32,
}

impl SessionDescription {
    /// SSRC of the first encoding descriptor, if the server sent any.
    #[must_use]
    pub fn ssrc(&self) -> Option<u32> {
        self.encodings.first().map(|encoding| encoding.ssrc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_and_encodings() {
        let json = format!(
            r#"{{"mode":"xsalsa20_poly1305_lite","secret_key":{:?},"encodings":[{{"ssrc":42,"rid":"f"}}],"media_session_id":"x"}}"#,
            [7u8; RTP_KEY_LEN]
        );

        let session = serde_json::from_str::<SessionDescription>(&json).unwrap();
        assert_eq!(session.secret_key, [7; RTP_KEY_LEN]);
        assert_eq!(session.ssrc(), Some(42));
    }

    #[test]
    fn missing_encodings() {
        let json = format!(r#"{{"mode":"m","secret_key":{:?}}}"#, [0u8; RTP_KEY_LEN]);
        let session = serde_json::from_str::<SessionDescription>(&json).unwrap();
        assert_eq!(session.ssrc(), None);
    }
}
