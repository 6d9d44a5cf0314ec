//! Wire models of the voice signaling gateway.
pub mod incoming;
pub mod opcode;
pub mod outgoing;

pub use self::opcode::OpCode;

use bitflags::bitflags;
use serde::de::value::U8Deserializer;
use serde::de::{DeserializeSeed, IntoDeserializer, MapAccess, Unexpected};
use serde::{Deserialize, Serialize};
use twilight_model::gateway::event::GatewayEventDeserializer;

#[allow(clippy::wildcard_imports)]
use self::incoming::*;
use crate::deserializers::envelope::{self, Field};

/// Any frame the voice gateway may send.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    ClientConnect(ClientConnect),
    ClientDisconnect(ClientDisconnect),
    HeartbeatAck,
    Hello(Hello),
    Ready(Ready),
    Resumed,
    SessionDescription(SessionDescription),
    Speaking(Speaking),
}

impl Event {
    #[must_use]
    pub const fn opcode(&self) -> OpCode {
        match self {
            Self::ClientConnect(_) => OpCode::ClientConnect,
            Self::ClientDisconnect(_) => OpCode::ClientDisconnect,
            Self::HeartbeatAck => OpCode::HeartbeatAck,
            Self::Hello(_) => OpCode::Hello,
            Self::Ready(_) => OpCode::Ready,
            Self::Resumed => OpCode::Resumed,
            Self::SessionDescription(_) => OpCode::SessionDescription,
            Self::Speaking(_) => OpCode::Speaking,
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
    pub struct SpeakingFlags: u8 {
        const MICROPHONE = 1 << 0;
        const SOUNDSHARE = 1 << 1;
        const PRIORITY = 1 << 2;
    }
}

impl<'de> Deserialize<'de> for SpeakingFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Self::from_bits_truncate(u8::deserialize(deserializer)?))
    }
}

impl Serialize for SpeakingFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.bits())
    }
}

pub struct VoiceGatewayEventDeserializer<'a>(GatewayEventDeserializer<'a>);

impl<'a> VoiceGatewayEventDeserializer<'a> {
    /// Create a new voice gateway deserializer from the gateway deserializer.
    #[must_use]
    pub fn new(deserializer: GatewayEventDeserializer<'a>) -> Self {
        Self(deserializer)
    }

    /// Scans the envelope of a raw frame.
    ///
    /// Returns [`None`] if the frame does not have an opcode.
    #[must_use]
    pub fn from_json(json: &'a str) -> Option<Self> {
        GatewayEventDeserializer::from_json(json).map(Self)
    }
}

impl<'a> std::ops::Deref for VoiceGatewayEventDeserializer<'a> {
    type Target = GatewayEventDeserializer<'a>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

struct VoiceGatewayEventVisitor(u8);

impl<'de> serde::de::Visitor<'de> for VoiceGatewayEventVisitor {
    type Value = Event;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("struct VoiceGatewayEvent")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        static VALID_OPCODES: &[&str] = &[
            "CLIENT_CONNECT",
            "CLIENT_DISCONNECT",
            "HEARTBEAT_ACK",
            "HELLO",
            "READY",
            "RESUMED",
            "SESSION_DESCRIPTION",
            "SPEAKING",
        ];

        let op_deser: U8Deserializer<A::Error> = self.0.into_deserializer();
        let op = OpCode::deserialize(op_deser).ok().ok_or_else(|| {
            let unexpected = Unexpected::Unsigned(u64::from(self.0));
            serde::de::Error::invalid_value(unexpected, &"an opcode")
        })?;

        Ok(match op {
            OpCode::ClientConnect => Event::ClientConnect(envelope::field(&mut map, Field::D)?),
            OpCode::ClientDisconnect => {
                Event::ClientDisconnect(envelope::field(&mut map, Field::D)?)
            }
            OpCode::HeartbeatAck => {
                envelope::ignore_all(&mut map)?;
                Event::HeartbeatAck
            }
            OpCode::Hello => Event::Hello(envelope::field(&mut map, Field::D)?),
            OpCode::Ready => Event::Ready(envelope::field(&mut map, Field::D)?),
            OpCode::Resumed => {
                envelope::ignore_all(&mut map)?;
                Event::Resumed
            }
            OpCode::SessionDescription => {
                Event::SessionDescription(envelope::field(&mut map, Field::D)?)
            }
            OpCode::Speaking => Event::Speaking(envelope::field(&mut map, Field::D)?),
            OpCode::Identify => {
                return Err(serde::de::Error::unknown_field("Identify", VALID_OPCODES));
            }
            OpCode::SelectProtocol => {
                return Err(serde::de::Error::unknown_field(
                    "SelectProtocol",
                    VALID_OPCODES,
                ));
            }
            OpCode::Heartbeat => {
                return Err(serde::de::Error::unknown_field("Heartbeat", VALID_OPCODES));
            }
            OpCode::Resume => return Err(serde::de::Error::unknown_field("Resume", VALID_OPCODES)),
        })
    }
}

impl<'de> DeserializeSeed<'de> for VoiceGatewayEventDeserializer<'_> {
    type Value = Event;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        const FIELDS: &[&str] = &["op", "d"];

        deserializer.deserialize_struct(
            "VoiceGatewayEvent",
            FIELDS,
            VoiceGatewayEventVisitor(self.op()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::de::DeserializeOwned;
    use static_assertions::assert_impl_all;
    use std::{fmt::Debug, hash::Hash, net::IpAddr};

    assert_impl_all!(
        SpeakingFlags: Copy,
        Clone,
        Debug,
        DeserializeOwned,
        Eq,
        Hash,
        PartialEq,
        Send,
        Serialize,
        Sync,
    );

    fn parse(json: &str) -> Result<Event, serde_json::Error> {
        let deserializer = VoiceGatewayEventDeserializer::from_json(json).unwrap();
        let mut json = serde_json::Deserializer::from_str(json);
        deserializer.deserialize(&mut json)
    }

    #[test]
    fn ready() {
        let event = parse(
            r#"{"op":2,"d":{"ssrc":1,"ip":"127.0.0.1","port":1234,"modes":["xsalsa20_poly1305_lite"],"heartbeat_interval":1}}"#,
        )
        .unwrap();

        assert_eq!(
            event,
            Event::Ready(Ready {
                ssrc: 1,
                ip: "127.0.0.1".parse::<IpAddr>().unwrap(),
                port: 1234,
                modes: vec!["xsalsa20_poly1305_lite".to_string()],
            })
        );
        assert_eq!(event.opcode(), OpCode::Ready);
    }

    #[test]
    fn data_may_come_before_opcode() {
        let event = parse(r#"{"d":{"heartbeat_interval":13750.0},"op":8}"#).unwrap();
        assert_eq!(
            event,
            Event::Hello(Hello {
                heartbeat_interval: 13750
            })
        );
    }

    #[test]
    fn speaking_flags_are_truncated() {
        let event = parse(r#"{"op":5,"d":{"user_id":"7","ssrc":3,"speaking":255}}"#).unwrap();
        let Event::Speaking(speaking) = event else {
            panic!("expected speaking event");
        };
        assert_eq!(speaking.speaking, SpeakingFlags::all());
    }

    #[test]
    fn client_bound_opcodes_are_rejected() {
        assert!(parse(r#"{"op":0,"d":{}}"#).is_err());
        assert!(parse(r#"{"op":12,"d":{}}"#).is_err());
    }
}
