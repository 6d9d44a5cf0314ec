use serde::{Deserialize, Serialize};
use std::net::IpAddr;

// `heartbeat_interval` is an erroneous field and should be ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct Ready {
    pub ssrc: u32,
    #[serde(with = "crate::deserializers::ip_string")]
    pub ip: IpAddr,
    pub port: u16,
    #[serde(default)]
    pub modes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_test::{Configure, Token};
    use std::net::Ipv4Addr;

    #[test]
    fn structure() {
        let payload = Ready {
            ssrc: 1,
            ip: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 1234,
            modes: vec!["xsalsa20_poly1305_lite".to_string()],
        };
        serde_test::assert_tokens(
            &payload.compact(),
            &[
                Token::Struct {
                    name: "Ready",
                    len: 4,
                },
                Token::Str("ssrc"),
                Token::U32(1),
                Token::Str("ip"),
                Token::Str("127.0.0.1"),
                Token::Str("port"),
                Token::U16(1234),
                Token::Str("modes"),
                Token::Seq { len: Some(1) },
                Token::Str("xsalsa20_poly1305_lite"),
                Token::SeqEnd,
                Token::StructEnd,
            ],
        );
    }
}
