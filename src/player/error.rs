use std::error::Error;

use crate::audio::AudioError;
use crate::net::udp::TransportError;
use crate::packet::PacketError;
use crate::source::ResolveError;

/// Playing a track or the queue failed.
#[derive(Debug)]
pub struct PlaybackError {
    pub(crate) kind: PlaybackErrorType,
    pub(crate) source: Option<Box<dyn Error + Send + Sync>>,
}

impl PlaybackError {
    #[must_use]
    pub const fn kind(&self) -> &PlaybackErrorType {
        &self.kind
    }

    pub(crate) const fn new(kind: PlaybackErrorType) -> Self {
        Self { kind, source: None }
    }
}

impl std::fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            PlaybackErrorType::Resolve => f.write_str("could not resolve track"),
            PlaybackErrorType::Audio => f.write_str("could not decode or encode track"),
            PlaybackErrorType::Transport => f.write_str("could not reach the voice server"),
            PlaybackErrorType::Packet => f.write_str("could not build voice packet"),
            PlaybackErrorType::VoiceClosed => f.write_str("voice connection has been closed"),
            PlaybackErrorType::Unavailable => f.write_str("voice transport is held elsewhere"),
        }
    }
}

impl Error for PlaybackError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn Error + 'static))
    }
}

impl From<ResolveError> for PlaybackError {
    fn from(source: ResolveError) -> Self {
        Self {
            kind: PlaybackErrorType::Resolve,
            source: Some(Box::new(source)),
        }
    }
}

impl From<AudioError> for PlaybackError {
    fn from(source: AudioError) -> Self {
        Self {
            kind: PlaybackErrorType::Audio,
            source: Some(Box::new(source)),
        }
    }
}

impl From<TransportError> for PlaybackError {
    fn from(source: TransportError) -> Self {
        Self {
            kind: PlaybackErrorType::Transport,
            source: Some(Box::new(source)),
        }
    }
}

impl From<PacketError> for PlaybackError {
    fn from(source: PacketError) -> Self {
        Self {
            kind: PlaybackErrorType::Packet,
            source: Some(Box::new(source)),
        }
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum PlaybackErrorType {
    /// The audio source could not provide the track.
    Resolve,

    /// The track could not be decoded or encoded.
    Audio,

    /// The datagram socket could not be pointed at the voice server.
    Transport,

    /// A frame could not be sealed into a voice packet.
    Packet,

    /// The voice session ended for good while waiting for its connection
    /// info.
    VoiceClosed,

    /// The datagram socket is not available to a new playback loop.
    Unavailable,
}
