//! Voice signaling gateway: protocol, handshake and the published
//! connection parameters.
use serde::de::DeserializeSeed;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use turntable_types::voice::outgoing::{Identify, Resume};
use turntable_types::voice::{Event, OpCode, VoiceGatewayEventDeserializer};
use turntable_types::{VOICE_API_VERSION, VoiceCloseCode};

use crate::crypto::{AEAD_KEY_LEN, EncryptMode};
use crate::net::session::{Frame, Protocol, Resumable, ResumeToken, SessionError, encode};
use crate::options::VoiceCredentials;

mod handshake;
mod signaling;

pub use self::handshake::{HandshakeAction, VoiceHandshake};
pub use self::signaling::{InfoPublisher, VoiceEvent, VoiceSignaling};

/// Parameters of an established voice session.
///
/// Issued once per session description. A new one means a new key, and
/// with it fresh packet counters.
#[derive(Clone, PartialEq, Eq)]
pub struct VoiceConnectionInfo {
    pub host: IpAddr,
    pub port: u16,
    pub ssrc: u32,
    pub secret_key: [u8; AEAD_KEY_LEN],
    pub mode: EncryptMode,
}

impl VoiceConnectionInfo {
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl std::fmt::Debug for VoiceConnectionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceConnectionInfo")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("ssrc", &self.ssrc)
            .field("secret_key", &"<redacted>")
            .field("mode", &self.mode)
            .finish()
    }
}

/// Op-code table and payload schema of the voice gateway.
#[derive(Debug, Clone)]
pub struct VoiceGateway {
    credentials: VoiceCredentials,
}

impl VoiceGateway {
    #[must_use]
    pub const fn new(credentials: VoiceCredentials) -> Self {
        Self { credentials }
    }

    #[must_use]
    pub const fn credentials(&self) -> &VoiceCredentials {
        &self.credentials
    }
}

impl Protocol for VoiceGateway {
    type Event = Event;
    type Kind = OpCode;
    type OpCode = OpCode;

    const NAME: &'static str = "voice";

    fn identify(&self) -> Result<String, SessionError> {
        encode(
            OpCode::Identify,
            &Identify {
                guild_id: self.credentials.guild_id,
                user_id: self.credentials.user_id,
                session_id: self.credentials.session_id.clone(),
                token: self.credentials.token.expose().to_string(),
            },
        )
    }

    fn resume(&self, token: &ResumeToken) -> Result<String, SessionError> {
        encode(
            OpCode::Resume,
            &Resume {
                guild_id: self.credentials.guild_id,
                session_id: token.session_id.clone(),
                token: self.credentials.token.expose().to_string(),
            },
        )
    }

    /// Voice heartbeats carry a nonce instead of a sequence.
    fn heartbeat(&self, _sequence: Option<i32>) -> Result<String, SessionError> {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        encode(OpCode::Heartbeat, &u64::try_from(nonce).unwrap_or_default())
    }

    fn parse(&self, text: &str) -> Result<Frame<Event>, SessionError> {
        let Some(deserializer) = VoiceGatewayEventDeserializer::from_json(text) else {
            return Err(SessionError::deserializing(text, None));
        };

        let mut json = serde_json::Deserializer::from_str(text);
        let event = deserializer
            .deserialize(&mut json)
            .map_err(|source| SessionError::deserializing(text, Some(Box::new(source))))?;

        Ok(match event {
            Event::Hello(hello) => Frame::Hello(Duration::from_millis(hello.heartbeat_interval)),
            Event::HeartbeatAck => Frame::HeartbeatAck,
            event => Frame::Dispatch {
                sequence: None,
                event,
            },
        })
    }

    fn kind(event: &Event) -> Option<OpCode> {
        Some(event.opcode())
    }

    fn resumable(&self, event: &Event) -> Option<Resumable> {
        matches!(event, Event::Ready(_)).then(|| Resumable {
            session_id: self.credentials.session_id.clone(),
            resume_url: None,
        })
    }

    fn endpoint(host: &str) -> String {
        let host = host
            .trim_start_matches("wss://")
            .trim_start_matches("ws://")
            .trim_end_matches('/');
        format!("wss://{host}/?v={VOICE_API_VERSION}")
    }

    fn can_reconnect(code: u16) -> bool {
        VoiceCloseCode::try_from(code).map_or(true, |code| code.can_reconnect())
    }
}
