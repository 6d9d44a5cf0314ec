//! Wire models of the main event gateway.
pub mod event;
pub mod incoming;
pub mod opcode;
pub mod outgoing;

pub use self::event::EventType;
pub use self::opcode::OpCode;

use serde::Deserialize;
use serde::de::value::U8Deserializer;
use serde::de::{DeserializeSeed, IntoDeserializer, MapAccess, Unexpected};
use twilight_model::gateway::event::GatewayEventDeserializer as RawDeserializer;

#[allow(clippy::wildcard_imports)]
use self::incoming::*;
use crate::deserializers::envelope::{self, Field};

/// Any frame the main gateway may send.
///
/// Sequence numbers are not part of the event, they are taken from
/// the envelope by the session that owns the connection.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Dispatch(DispatchEvent),
    /// The gateway requests an immediate heartbeat.
    Heartbeat,
    HeartbeatAck,
    Hello(Hello),
    /// Whether the invalidated session may be resumed.
    InvalidSession(bool),
    Reconnect,
}

/// Dispatch events carried by opcode 0.
#[derive(Clone, Debug, PartialEq)]
pub enum DispatchEvent {
    GuildCreate(GuildCreate),
    MessageCreate(MessageCreate),
    ReactionAdd(Reaction),
    ReactionRemove(Reaction),
    Ready(Ready),
    Resumed,
    VoiceServerUpdate(VoiceServerUpdate),
    VoiceStateUpdate(VoiceState),
    /// A dispatch this crate does not model. It still counts for the sequence.
    Unknown(String),
}

impl DispatchEvent {
    /// Gets the event type, [`None`] for unmodelled dispatches.
    #[must_use]
    pub const fn kind(&self) -> Option<EventType> {
        Some(match self {
            Self::GuildCreate(_) => EventType::GuildCreate,
            Self::MessageCreate(_) => EventType::MessageCreate,
            Self::ReactionAdd(_) => EventType::ReactionAdd,
            Self::ReactionRemove(_) => EventType::ReactionRemove,
            Self::Ready(_) => EventType::Ready,
            Self::Resumed => EventType::Resumed,
            Self::VoiceServerUpdate(_) => EventType::VoiceServerUpdate,
            Self::VoiceStateUpdate(_) => EventType::VoiceStateUpdate,
            Self::Unknown(_) => return None,
        })
    }
}

pub struct MainGatewayEventDeserializer<'a>(RawDeserializer<'a>);

impl<'a> MainGatewayEventDeserializer<'a> {
    /// Create a new main gateway deserializer from the gateway deserializer.
    #[must_use]
    pub fn new(deserializer: RawDeserializer<'a>) -> Self {
        Self(deserializer)
    }

    /// Scans the envelope of a raw frame.
    ///
    /// Returns [`None`] if the frame does not have an opcode.
    #[must_use]
    pub fn from_json(json: &'a str) -> Option<Self> {
        RawDeserializer::from_json(json).map(Self)
    }
}

impl<'a> std::ops::Deref for MainGatewayEventDeserializer<'a> {
    type Target = RawDeserializer<'a>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

struct MainGatewayEventVisitor<'a> {
    op: u8,
    event_type: Option<&'a str>,
}

impl<'de> serde::de::Visitor<'de> for MainGatewayEventVisitor<'_> {
    type Value = Event;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("struct GatewayEvent")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        static VALID_OPCODES: &[&str] = &[
            "DISPATCH",
            "HEARTBEAT",
            "HEARTBEAT_ACK",
            "HELLO",
            "INVALID_SESSION",
            "RECONNECT",
        ];

        let op_deser: U8Deserializer<A::Error> = self.op.into_deserializer();
        let op = OpCode::deserialize(op_deser).ok().ok_or_else(|| {
            let unexpected = Unexpected::Unsigned(u64::from(self.op));
            serde::de::Error::invalid_value(unexpected, &"an opcode")
        })?;

        Ok(match op {
            OpCode::Dispatch => {
                let name = self
                    .event_type
                    .ok_or_else(|| serde::de::Error::missing_field("t"))?;

                let Some(kind) = EventType::from_name(name) else {
                    envelope::ignore_all(&mut map)?;
                    return Ok(Event::Dispatch(DispatchEvent::Unknown(name.to_string())));
                };

                Event::Dispatch(match kind {
                    EventType::GuildCreate => {
                        DispatchEvent::GuildCreate(envelope::field(&mut map, Field::D)?)
                    }
                    EventType::MessageCreate => {
                        DispatchEvent::MessageCreate(envelope::field(&mut map, Field::D)?)
                    }
                    EventType::ReactionAdd => {
                        DispatchEvent::ReactionAdd(envelope::field(&mut map, Field::D)?)
                    }
                    EventType::ReactionRemove => {
                        DispatchEvent::ReactionRemove(envelope::field(&mut map, Field::D)?)
                    }
                    EventType::Ready => DispatchEvent::Ready(envelope::field(&mut map, Field::D)?),
                    EventType::Resumed => {
                        envelope::ignore_all(&mut map)?;
                        DispatchEvent::Resumed
                    }
                    EventType::VoiceServerUpdate => {
                        DispatchEvent::VoiceServerUpdate(envelope::field(&mut map, Field::D)?)
                    }
                    EventType::VoiceStateUpdate => {
                        DispatchEvent::VoiceStateUpdate(envelope::field(&mut map, Field::D)?)
                    }
                })
            }
            OpCode::Heartbeat => {
                envelope::ignore_all(&mut map)?;
                Event::Heartbeat
            }
            OpCode::HeartbeatAck => {
                envelope::ignore_all(&mut map)?;
                Event::HeartbeatAck
            }
            OpCode::Hello => Event::Hello(envelope::field(&mut map, Field::D)?),
            OpCode::InvalidSession => {
                let resumable = envelope::field::<Option<bool>, _>(&mut map, Field::D)?;
                Event::InvalidSession(resumable.unwrap_or_default())
            }
            OpCode::Reconnect => {
                envelope::ignore_all(&mut map)?;
                Event::Reconnect
            }
            OpCode::Identify => {
                return Err(serde::de::Error::unknown_field("Identify", VALID_OPCODES));
            }
            OpCode::VoiceStateUpdate => {
                return Err(serde::de::Error::unknown_field(
                    "VoiceStateUpdate",
                    VALID_OPCODES,
                ));
            }
            OpCode::Resume => return Err(serde::de::Error::unknown_field("Resume", VALID_OPCODES)),
        })
    }
}

impl<'de> DeserializeSeed<'de> for MainGatewayEventDeserializer<'_> {
    type Value = Event;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        const FIELDS: &[&str] = &["op", "d", "s", "t"];

        deserializer.deserialize_struct(
            "GatewayEvent",
            FIELDS,
            MainGatewayEventVisitor {
                op: self.0.op(),
                event_type: self.0.event_type(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use twilight_model::id::Id;

    fn parse(json: &str) -> Event {
        let deserializer = MainGatewayEventDeserializer::from_json(json).unwrap();
        let mut json = serde_json::Deserializer::from_str(json);
        deserializer.deserialize(&mut json).unwrap()
    }

    #[test]
    fn hello() {
        let event =
            parse(r#"{"t":null,"s":null,"op":10,"d":{"heartbeat_interval":41250,"_trace":["x"]}}"#);
        assert_eq!(
            event,
            Event::Hello(Hello {
                heartbeat_interval: 41250
            })
        );
    }

    #[test]
    fn voice_server_update() {
        let event = parse(
            r#"{"t":"VOICE_SERVER_UPDATE","s":4,"op":0,"d":{"token":"abc","guild_id":"41771983423143937","endpoint":"sweden3456.discord.media:443"}}"#,
        );
        assert_eq!(
            event,
            Event::Dispatch(DispatchEvent::VoiceServerUpdate(VoiceServerUpdate {
                token: "abc".to_string(),
                guild_id: Id::new(41_771_983_423_143_937),
                endpoint: Some("sweden3456.discord.media:443".to_string()),
            }))
        );
    }

    #[test]
    fn unmodelled_dispatch_is_kept() {
        let event = parse(r#"{"t":"TYPING_START","s":9,"op":0,"d":{"user_id":"1"}}"#);
        assert_eq!(
            event,
            Event::Dispatch(DispatchEvent::Unknown("TYPING_START".to_string()))
        );
    }

    #[test]
    fn invalid_session() {
        assert_eq!(parse(r#"{"op":9,"d":false}"#), Event::InvalidSession(false));
        assert_eq!(parse(r#"{"op":9,"d":true}"#), Event::InvalidSession(true));
        assert_eq!(parse(r#"{"op":7,"d":null}"#), Event::Reconnect);
    }
}
