//! Text channel collaborator used for announcements and reactions.
use std::error::Error;
use std::fmt::Display;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, MessageMarker};

/// Plain request/response calls against the platform's REST surface.
///
/// Calls are not retried, failures are only logged.
#[async_trait::async_trait]
pub trait Messenger: Send + Sync + 'static {
    async fn send_message(
        &self,
        channel: Id<ChannelMarker>,
        content: &str,
    ) -> Result<Id<MessageMarker>, MessengerError>;

    async fn edit_message(
        &self,
        channel: Id<ChannelMarker>,
        message: Id<MessageMarker>,
        content: &str,
    ) -> Result<(), MessengerError>;

    async fn add_reaction(
        &self,
        channel: Id<ChannelMarker>,
        message: Id<MessageMarker>,
        emoji: &str,
    ) -> Result<(), MessengerError>;
}

/// A REST call failed.
#[derive(Debug)]
pub struct MessengerError {
    pub(crate) kind: MessengerErrorType,
    pub(crate) source: Option<Box<dyn Error + Send + Sync>>,
}

impl MessengerError {
    #[must_use]
    pub const fn new(kind: MessengerErrorType) -> Self {
        Self { kind, source: None }
    }

    #[must_use]
    pub fn with_source<E: Into<Box<dyn Error + Send + Sync>>>(
        kind: MessengerErrorType,
        source: E,
    ) -> Self {
        Self {
            kind,
            source: Some(source.into()),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &MessengerErrorType {
        &self.kind
    }
}

impl Display for MessengerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            MessengerErrorType::Forbidden => f.write_str("missing permissions for channel"),
            MessengerErrorType::Request => f.write_str("request failed"),
        }
    }
}

impl Error for MessengerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn Error + 'static))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessengerErrorType {
    Forbidden,
    Request,
}
