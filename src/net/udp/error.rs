use std::error::Error;

/// Voice datagram socket failed.
#[derive(Debug)]
pub struct TransportError {
    pub(crate) kind: TransportErrorType,
    pub(crate) source: Option<Box<dyn Error + Send + Sync>>,
}

impl TransportError {
    #[must_use]
    pub const fn kind(&self) -> &TransportErrorType {
        &self.kind
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TransportErrorType::Connect => f.write_str("could not connect to the voice server"),
            TransportErrorType::NotConnected => f.write_str("socket is not connected"),
            TransportErrorType::Receiving => f.write_str("could not receive voice packet"),
            TransportErrorType::Sending => f.write_str("could not send voice packet"),
        }
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn Error + 'static))
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum TransportErrorType {
    /// Binding or connecting the socket failed.
    Connect,

    /// Tried to use the socket before connecting it.
    NotConnected,

    /// Receiving a datagram failed.
    Receiving,

    /// Sending a datagram failed.
    Sending,
}
