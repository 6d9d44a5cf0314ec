use std::error::Error;

/// Building or reading a voice packet failed.
#[derive(Debug)]
pub struct PacketError {
    pub(crate) kind: PacketErrorType,
    pub(crate) source: Option<Box<dyn Error + Send + Sync>>,
}

impl PacketError {
    #[must_use]
    pub const fn kind(&self) -> &PacketErrorType {
        &self.kind
    }
}

impl std::fmt::Display for PacketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            PacketErrorType::Crypto => f.write_str("could not seal or open voice payload"),
            PacketErrorType::Malformed => f.write_str("voice packet is malformed"),
        }
    }
}

impl Error for PacketError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn Error + 'static))
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum PacketErrorType {
    /// Encryption or authentication failed.
    Crypto,

    /// The packet is too short or does not start with the RTP marker.
    Malformed,
}
