//! RTP-style voice packets sealed with the lite secretbox mode.
//!
//! ```text
//! 0      2          4           8      12                     n    n+4
//! +------+----------+-----------+------+----------------------+------+
//! | 80 78| sequence | timestamp | ssrc | tag | encrypted opus | nonce|
//! +------+----------+-----------+------+----------------------+------+
//! ```
//!
//! Integers are big-endian. The 24-byte secretbox nonce is the 4-byte
//! nonce counter followed by zeros, the counter is repeated in plain
//! text after the ciphertext.
use crate::crypto::{Aead, EncryptMode};
use crate::voice::VoiceConnectionInfo;

mod error;

pub use self::error::{PacketError, PacketErrorType};

/// Version byte and Opus payload type.
pub const RTP_MARKER: [u8; 2] = [0x80, 0x78];
pub const RTP_HEADER_LEN: usize = 12;
const NONCE_SUFFIX_LEN: usize = 4;

/// Counters stamped on every packet of a voice session.
///
/// A nonce must never repeat under the same key, so counters live as long
/// as the key and are replaced together with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketCounters {
    sequence: u16,
    timestamp: u32,
    nonce: u32,
}

impl PacketCounters {
    #[must_use]
    pub const fn new(sequence: u16, timestamp: u32, nonce: u32) -> Self {
        Self {
            sequence,
            timestamp,
            nonce,
        }
    }

    /// Counters for a fresh key: random sequence and timestamp, nonce at zero.
    #[must_use]
    pub fn random() -> Self {
        Self::new(fastrand::u16(..), fastrand::u32(..), 0)
    }

    #[must_use]
    pub const fn sequence(&self) -> u16 {
        self.sequence
    }

    #[must_use]
    pub const fn timestamp(&self) -> u32 {
        self.timestamp
    }

    #[must_use]
    pub const fn nonce(&self) -> u32 {
        self.nonce
    }

    fn advance(&mut self, samples: u32) {
        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(samples);
        self.nonce = self.nonce.wrapping_add(1);
    }
}

/// Header fields and payload of a decoded packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPacket {
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub nonce: u32,
    pub payload: Vec<u8>,
}

/// Seals encoded audio frames into voice packets for one session key.
#[derive(Debug)]
pub struct PacketCodec {
    aead: Box<dyn Aead>,
    ssrc: u32,
}

impl PacketCodec {
    #[must_use]
    pub fn new(info: &VoiceConnectionInfo) -> Self {
        Self {
            aead: EncryptMode::XSalsa20Poly1305Lite.aead(&info.secret_key),
            ssrc: info.ssrc,
        }
    }

    #[must_use]
    pub const fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Builds the packet of `frame`, then advances `counters` by one packet
    /// covering `samples` samples per channel.
    pub fn encode(
        &self,
        frame: &[u8],
        samples: u32,
        counters: &mut PacketCounters,
    ) -> Result<Vec<u8>, PacketError> {
        let nonce = counters.nonce.to_be_bytes();
        let sealed = self
            .aead
            .encrypt(&Self::full_nonce(nonce), frame)
            .map_err(|source| PacketError {
                kind: PacketErrorType::Crypto,
                source: Some(Box::new(source)),
            })?;

        let mut packet = Vec::with_capacity(RTP_HEADER_LEN + sealed.len() + NONCE_SUFFIX_LEN);
        packet.extend_from_slice(&RTP_MARKER);
        packet.extend_from_slice(&counters.sequence.to_be_bytes());
        packet.extend_from_slice(&counters.timestamp.to_be_bytes());
        packet.extend_from_slice(&self.ssrc.to_be_bytes());
        packet.extend_from_slice(&sealed);
        packet.extend_from_slice(&nonce);

        counters.advance(samples);
        Ok(packet)
    }

    /// Reads a packet sealed with this session key.
    pub fn decode(&self, packet: &[u8]) -> Result<DecodedPacket, PacketError> {
        let malformed = || PacketError {
            kind: PacketErrorType::Malformed,
            source: None,
        };

        if packet.len() < RTP_HEADER_LEN + NONCE_SUFFIX_LEN || packet[..2] != RTP_MARKER {
            return Err(malformed());
        }

        let (header, rest) = packet.split_at(RTP_HEADER_LEN);
        let (sealed, nonce) = rest.split_at(rest.len() - NONCE_SUFFIX_LEN);
        let nonce: [u8; NONCE_SUFFIX_LEN] = nonce.try_into().map_err(|_| malformed())?;

        let payload = self
            .aead
            .decrypt(&Self::full_nonce(nonce), sealed)
            .map_err(|source| PacketError {
                kind: PacketErrorType::Crypto,
                source: Some(Box::new(source)),
            })?;

        Ok(DecodedPacket {
            sequence: u16::from_be_bytes([header[2], header[3]]),
            timestamp: u32::from_be_bytes([header[4], header[5], header[6], header[7]]),
            ssrc: u32::from_be_bytes([header[8], header[9], header[10], header[11]]),
            nonce: u32::from_be_bytes(nonce),
            payload,
        })
    }

    fn full_nonce(counter: [u8; NONCE_SUFFIX_LEN]) -> [u8; 24] {
        let mut nonce = [0u8; 24];
        nonce[..NONCE_SUFFIX_LEN].copy_from_slice(&counter);
        nonce
    }
}
