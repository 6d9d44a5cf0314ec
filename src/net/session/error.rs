use std::error::Error;

/// Processing a gateway session failed.
#[derive(Debug)]
pub struct SessionError {
    pub(crate) kind: SessionErrorType,
    pub(crate) source: Option<Box<dyn Error + Send + Sync>>,
}

impl SessionError {
    #[must_use]
    pub const fn kind(&self) -> &SessionErrorType {
        &self.kind
    }

    pub(crate) fn deserializing(event: &str, source: Option<Box<dyn Error + Send + Sync>>) -> Self {
        Self {
            kind: SessionErrorType::Deserializing {
                event: event.to_owned(),
            },
            source,
        }
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            SessionErrorType::Deserializing { event } => {
                f.write_str("gateway event could not be deserialized: ")?;
                f.write_str(event)
            }
            SessionErrorType::Serializing => f.write_str("payload could not be serialized"),
            SessionErrorType::Sending => f.write_str("session has been dropped"),
            SessionErrorType::Socket => f.write_str("gateway connection failed"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn Error + 'static))
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum SessionErrorType {
    /// A frame could not be parsed. It has been dropped.
    Deserializing { event: String },

    /// An outgoing payload could not be serialized.
    Serializing,

    /// The session the message was meant for does not exist anymore.
    Sending,

    /// The websocket failed, it reconnects on the next poll.
    Socket,
}
