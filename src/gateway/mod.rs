//! Main event gateway protocol.
use serde::de::DeserializeSeed;
use std::time::Duration;
use turntable_types::GatewayCloseCode;
use turntable_types::gateway::outgoing::{Identify, Resume, UpdateVoiceState};
use turntable_types::gateway::{
    DispatchEvent, Event, EventType, MainGatewayEventDeserializer, OpCode,
};

use crate::net::session::{Frame, Protocol, Resumable, ResumeToken, SessionError, encode};
use crate::options::GatewayConfig;

/// Session client of the main gateway.
pub type MainSession = crate::net::SessionClient<MainGateway>;

/// Op-code table and payload schema of the main event gateway.
#[derive(Debug, Clone)]
pub struct MainGateway {
    config: GatewayConfig,
}

impl MainGateway {
    #[must_use]
    pub const fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Joins, moves between or leaves (with `None`) voice channels.
    pub fn update_voice_state(
        session: &crate::net::SessionSender<Self>,
        payload: &UpdateVoiceState,
    ) -> Result<(), SessionError> {
        session.send(OpCode::VoiceStateUpdate, payload)
    }
}

impl Protocol for MainGateway {
    type Event = DispatchEvent;
    type Kind = EventType;
    type OpCode = OpCode;

    const NAME: &'static str = "main";

    fn identify(&self) -> Result<String, SessionError> {
        encode(
            OpCode::Identify,
            &Identify {
                token: self.config.token.expose().to_string(),
                intents: self.config.intents,
                properties: self.config.properties.clone(),
            },
        )
    }

    fn resume(&self, token: &ResumeToken) -> Result<String, SessionError> {
        encode(
            OpCode::Resume,
            &Resume {
                token: self.config.token.expose().to_string(),
                session_id: token.session_id.clone(),
                seq: token.sequence.unwrap_or_default(),
            },
        )
    }

    fn heartbeat(&self, sequence: Option<i32>) -> Result<String, SessionError> {
        encode(OpCode::Heartbeat, &sequence)
    }

    fn parse(&self, text: &str) -> Result<Frame<DispatchEvent>, SessionError> {
        let Some(deserializer) = MainGatewayEventDeserializer::from_json(text) else {
            return Err(SessionError::deserializing(text, None));
        };

        // Sequences beyond i32 are not handed out by the gateway.
        let sequence = deserializer
            .sequence()
            .and_then(|sequence| i32::try_from(sequence).ok());

        let op = deserializer.op();
        let mut json = serde_json::Deserializer::from_str(text);
        let event = match deserializer.deserialize(&mut json) {
            Ok(event) => event,
            Err(source) if op == OpCode::Dispatch as u8 => {
                return Ok(Frame::Malformed {
                    sequence,
                    reason: source.to_string(),
                });
            }
            Err(source) => return Err(SessionError::deserializing(text, Some(Box::new(source)))),
        };

        Ok(match event {
            Event::Dispatch(event) => Frame::Dispatch { sequence, event },
            Event::Heartbeat => Frame::HeartbeatRequest,
            Event::HeartbeatAck => Frame::HeartbeatAck,
            Event::Hello(hello) => Frame::Hello(Duration::from_millis(hello.heartbeat_interval)),
            Event::InvalidSession(resumable) => Frame::InvalidSession { resumable },
            Event::Reconnect => Frame::Reconnect,
        })
    }

    fn kind(event: &DispatchEvent) -> Option<EventType> {
        event.kind()
    }

    fn resumable(&self, event: &DispatchEvent) -> Option<Resumable> {
        match event {
            DispatchEvent::Ready(ready) => Some(Resumable {
                session_id: ready.session_id.clone(),
                resume_url: ready.resume_gateway_url.clone(),
            }),
            _ => None,
        }
    }

    fn endpoint(host: &str) -> String {
        GatewayConfig::endpoint(host)
    }

    fn can_reconnect(code: u16) -> bool {
        GatewayCloseCode::try_from(code).map_or(true, |code| code.can_reconnect())
    }
}
