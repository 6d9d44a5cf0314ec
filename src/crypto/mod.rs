//! Authenticated encryption of voice packets.
use std::fmt::{Debug, Display};
use std::str::FromStr;

pub mod secretbox;

pub use self::secretbox::XSalsa20Poly1305;

/// Secret key size to encrypt/decrypt voice packets
pub const AEAD_KEY_LEN: usize = turntable_types::RTP_KEY_LEN;

/// Authenticated encryption over a 32-byte session key.
///
/// Ciphertexts carry their authentication tag.
pub trait Aead: Debug + Sync + Send {
    fn mode(&self) -> EncryptMode;
    fn encrypt(&self, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, AeadError>;
    fn decrypt(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, AeadError>;
}

/// Encryption modes this client can negotiate with the voice server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EncryptMode {
    /// Secretbox with a 4-byte incrementing nonce appended to each packet.
    XSalsa20Poly1305Lite,
}

impl EncryptMode {
    #[must_use]
    pub fn aead(&self, key: &[u8; AEAD_KEY_LEN]) -> Box<dyn Aead> {
        match self {
            Self::XSalsa20Poly1305Lite => Box::new(XSalsa20Poly1305::new_sized(key)),
        }
    }

    /// Gets the required size of a nonce for a particular mode.
    #[must_use]
    pub const fn nonce_size(&self) -> usize {
        match self {
            Self::XSalsa20Poly1305Lite => secretbox::NONCE_LEN,
        }
    }

    /// Returns the name of a mode as it will appear during negotiation.
    #[must_use]
    pub const fn to_request_str(self) -> &'static str {
        match self {
            Self::XSalsa20Poly1305Lite => "xsalsa20_poly1305_lite",
        }
    }
}

impl Display for EncryptMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_request_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEncryptMode {
    mode: String,
}

impl UnknownEncryptMode {
    #[must_use]
    pub fn mode(&self) -> &str {
        &self.mode
    }
}

impl Display for UnknownEncryptMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("unknown encrypt mode: ")?;
        Debug::fmt(&self.mode, f)
    }
}

impl std::error::Error for UnknownEncryptMode {}

impl FromStr for EncryptMode {
    type Err = UnknownEncryptMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xsalsa20_poly1305_lite" => Ok(Self::XSalsa20Poly1305Lite),
            _ => Err(UnknownEncryptMode {
                mode: s.to_string(),
            }),
        }
    }
}

pub struct AeadError {
    pub(crate) kind: AeadErrorType,
}

impl AeadError {
    #[must_use]
    pub fn kind(&self) -> &AeadErrorType {
        &self.kind
    }
}

impl Debug for AeadError {
    #[cfg(not(test))]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadError").finish_non_exhaustive()
    }

    #[cfg(test)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadError")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Display for AeadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Nothing about the cause is leaked on purpose.
        f.write_str("aead error")
    }
}

impl std::error::Error for AeadError {}

#[cfg_attr(test, derive(Debug))]
#[non_exhaustive]
pub enum AeadErrorType {
    /// General AEAD error. Nothing too specific.
    Unspecified,

    /// Invalid nonce length.
    InvalidNonceLength { expected: usize },
}
