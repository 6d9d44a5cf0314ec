use std::error::Error;

/// A track could not be turned into encoded frames.
///
/// Aborts the current track only.
#[derive(Debug)]
pub struct AudioError {
    pub(crate) kind: AudioErrorType,
    pub(crate) source: Option<Box<dyn Error + Send + Sync>>,
}

impl AudioError {
    #[must_use]
    pub const fn kind(&self) -> &AudioErrorType {
        &self.kind
    }

    pub(crate) const fn new(kind: AudioErrorType) -> Self {
        Self { kind, source: None }
    }

    pub(crate) fn with_source<E: Into<Box<dyn Error + Send + Sync>>>(
        kind: AudioErrorType,
        source: E,
    ) -> Self {
        Self {
            kind,
            source: Some(source.into()),
        }
    }
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            AudioErrorType::Probing => f.write_str("could not recognize audio container"),
            AudioErrorType::NoTrack => f.write_str("source has no decodable audio track"),
            AudioErrorType::UnsupportedFormat { reason } => {
                f.write_str("unsupported audio format: ")?;
                f.write_str(reason)
            }
            AudioErrorType::Decoding => f.write_str("could not decode audio"),
            AudioErrorType::Resampling => f.write_str("could not resample audio"),
            AudioErrorType::Encoding => f.write_str("could not encode audio frame"),
        }
    }
}

impl Error for AudioError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn Error + 'static))
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum AudioErrorType {
    Probing,
    NoTrack,
    UnsupportedFormat { reason: &'static str },
    Decoding,
    Resampling,
    Encoding,
}
