//! Track references and the collaborator resolving them into audio.
use std::error::Error;
use std::fmt::Display;
use std::time::Duration;

/// Opaque reference to a track, meaningful only to a [`TrackResolver`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackId(Box<str>);

impl TrackId {
    #[must_use]
    pub fn new(id: impl Into<Box<str>>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: String,
    pub duration: Duration,
    /// Name of whoever published the track.
    pub owner: String,
}

/// Metadata and the complete compressed audio of a track.
#[derive(Clone)]
pub struct ResolvedTrack {
    pub metadata: TrackMetadata,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for ResolvedTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedTrack")
            .field("metadata", &self.metadata)
            .field("data", &self.data.len())
            .finish()
    }
}

/// Fetches tracks from a third-party audio source.
#[async_trait::async_trait]
pub trait TrackResolver: Send + Sync + 'static {
    async fn resolve(&self, track: &TrackId) -> Result<ResolvedTrack, ResolveError>;
}

/// A track could not be resolved.
#[derive(Debug)]
pub struct ResolveError {
    pub(crate) kind: ResolveErrorType,
    pub(crate) source: Option<Box<dyn Error + Send + Sync>>,
}

impl ResolveError {
    #[must_use]
    pub const fn new(kind: ResolveErrorType) -> Self {
        Self { kind, source: None }
    }

    #[must_use]
    pub fn with_source<E: Into<Box<dyn Error + Send + Sync>>>(
        kind: ResolveErrorType,
        source: E,
    ) -> Self {
        Self {
            kind,
            source: Some(source.into()),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &ResolveErrorType {
        &self.kind
    }
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ResolveErrorType::NotFound => f.write_str("track does not exist"),
            ResolveErrorType::Unavailable => f.write_str("track source is unavailable"),
        }
    }
}

impl Error for ResolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn Error + 'static))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResolveErrorType {
    NotFound,
    /// The source could not be reached or refused to serve the track.
    Unavailable,
}
