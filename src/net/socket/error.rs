use std::error::Error;

/// Websocket transport failed.
///
/// None of these are fatal, the socket reconnects on the next poll.
#[derive(Debug)]
pub struct SocketError {
    pub(crate) kind: SocketErrorType,
    pub(crate) source: Option<Box<dyn Error + Send + Sync>>,
}

impl SocketError {
    #[must_use]
    pub const fn kind(&self) -> &SocketErrorType {
        &self.kind
    }

    pub(crate) fn connecting<E: Error + Send + Sync + 'static>(source: E) -> Self {
        Self {
            kind: SocketErrorType::Connecting,
            source: Some(Box::new(source)),
        }
    }
}

impl std::fmt::Display for SocketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            SocketErrorType::Connecting => f.write_str("could not connect to the gateway"),
            SocketErrorType::Sending => f.write_str("could not send message to the gateway"),
        }
    }
}

impl Error for SocketError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn Error + 'static))
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum SocketErrorType {
    /// Establishing the websocket connection failed.
    Connecting,

    /// The socket has been dropped.
    Sending,
}
