use serde::Serialize;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use super::error::{SessionError, SessionErrorType};
use super::state::{Resumable, ResumeToken};

/// Control frames and dispatches, as far as the session cares.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame<E> {
    /// Start heartbeating at this period and perform the handshake.
    Hello(Duration),
    HeartbeatAck,
    /// The gateway asks for a heartbeat right away.
    HeartbeatRequest,
    /// Reconnect and resume.
    Reconnect,
    InvalidSession { resumable: bool },
    Dispatch { sequence: Option<i32>, event: E },
    /// A dispatch whose envelope was read but whose payload was not.
    Malformed {
        sequence: Option<i32>,
        reason: String,
    },
}

/// Op-code table and payload schema of a gateway.
///
/// A [`SessionClient`] runs the same state machine for every protocol,
/// only the frames it reads and writes differ.
///
/// [`SessionClient`]: super::SessionClient
pub trait Protocol: Send + Unpin + 'static {
    type Event: Debug + Send + 'static;
    type Kind: Copy + Debug + Eq + Hash + Send + Unpin + 'static;
    type OpCode: Copy + Debug + Into<u8> + Send + 'static;

    /// Name of the gateway used in logs.
    const NAME: &'static str;

    /// Payload starting a new session.
    fn identify(&self) -> Result<String, SessionError>;

    /// Payload resuming a previous session.
    fn resume(&self, token: &ResumeToken) -> Result<String, SessionError>;

    /// Heartbeat payload carrying the last sequence seen.
    fn heartbeat(&self, sequence: Option<i32>) -> Result<String, SessionError>;

    fn parse(&self, text: &str) -> Result<Frame<Self::Event>, SessionError>;

    /// Dispatch type used to route events to handlers.
    fn kind(event: &Self::Event) -> Option<Self::Kind>;

    /// Whether this dispatch makes the session resumable.
    fn resumable(&self, event: &Self::Event) -> Option<Resumable>;

    /// Websocket URL of `host`, used when the gateway hands out a resume URL.
    fn endpoint(host: &str) -> String;

    /// Whether reconnecting after this close code makes sense.
    fn can_reconnect(code: u16) -> bool;
}

#[derive(Serialize)]
struct Payload<'a, T> {
    op: u8,
    d: &'a T,
}

/// Serializes a payload into a gateway frame.
pub fn encode<T: Serialize>(op: impl Into<u8>, data: &T) -> Result<String, SessionError> {
    serde_json::to_string(&Payload {
        op: op.into(),
        d: data,
    })
    .map_err(|source| SessionError {
        kind: SessionErrorType::Serializing,
        source: Some(Box::new(source)),
    })
}

#[cfg(test)]
mod tests {
    use super::encode;

    #[test]
    fn envelope() {
        assert_eq!(encode(1u8, &Some(42)).unwrap(), r#"{"op":1,"d":42}"#);
        assert_eq!(encode(1u8, &None::<i32>).unwrap(), r#"{"op":1,"d":null}"#);
    }
}
