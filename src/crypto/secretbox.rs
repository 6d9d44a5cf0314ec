use super::{AEAD_KEY_LEN, Aead, AeadError, AeadErrorType, EncryptMode};
use std::fmt::Debug;
use xsalsa20poly1305::aead::AeadInPlace;
use xsalsa20poly1305::{KeyInit, Nonce, Tag, XSalsa20Poly1305 as Cipher};

pub const NONCE_LEN: usize = 24;
pub const TAG_LEN: usize = 16;

/// Secretbox construction: the tag is written in front of the ciphertext.
pub struct XSalsa20Poly1305 {
    cipher: Cipher,
}

impl Debug for XSalsa20Poly1305 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XSalsa20Poly1305").finish_non_exhaustive()
    }
}

impl XSalsa20Poly1305 {
    #[must_use]
    pub fn new(key: &[u8]) -> Option<Self> {
        let key: &[u8; AEAD_KEY_LEN] = key.try_into().ok()?;
        Some(Self::new_sized(key))
    }

    #[must_use]
    pub fn new_sized(key: &[u8; AEAD_KEY_LEN]) -> Self {
        Self {
            cipher: Cipher::new(&(*key).into()),
        }
    }

    fn nonce(nonce: &[u8]) -> Result<&Nonce, AeadError> {
        if nonce.len() == NONCE_LEN {
            Ok(Nonce::from_slice(nonce))
        } else {
            Err(AeadError {
                kind: AeadErrorType::InvalidNonceLength {
                    expected: NONCE_LEN,
                },
            })
        }
    }
}

impl Aead for XSalsa20Poly1305 {
    fn mode(&self) -> EncryptMode {
        EncryptMode::XSalsa20Poly1305Lite
    }

    fn encrypt(&self, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, AeadError> {
        let nonce = Self::nonce(nonce)?;

        let mut buffer = vec![0u8; TAG_LEN + plaintext.len()];
        buffer[TAG_LEN..].copy_from_slice(plaintext);

        let tag = self
            .cipher
            .encrypt_in_place_detached(nonce, b"", &mut buffer[TAG_LEN..])
            .map_err(|_| AeadError {
                kind: AeadErrorType::Unspecified,
            })?;
        buffer[..TAG_LEN].copy_from_slice(&tag[..]);

        Ok(buffer)
    }

    fn decrypt(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, AeadError> {
        let nonce = Self::nonce(nonce)?;
        if ciphertext.len() < TAG_LEN {
            return Err(AeadError {
                kind: AeadErrorType::Unspecified,
            });
        }

        let (tag, data) = ciphertext.split_at(TAG_LEN);
        let mut buffer = data.to_vec();
        self.cipher
            .decrypt_in_place_detached(nonce, b"", &mut buffer, Tag::from_slice(tag))
            .map_err(|_| AeadError {
                kind: AeadErrorType::Unspecified,
            })?;

        Ok(buffer)
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::{Aead, NONCE_LEN, TAG_LEN, XSalsa20Poly1305};
    use crate::crypto::AeadErrorType;

    const SECRET_KEY: &str = "fb5e9f96f291742023f321c7f4f967a2d90f4e7dadb2d9bd66774ad3ebb3ac5d";

    fn cipher() -> XSalsa20Poly1305 {
        XSalsa20Poly1305::new(&hex::decode(SECRET_KEY).unwrap()).unwrap()
    }

    #[test]
    fn tag_comes_first() {
        let nonce = [0u8; NONCE_LEN];
        let sealed = cipher().encrypt(&nonce, b"Hello, World!").unwrap();
        assert_eq!(sealed.len(), TAG_LEN + 13);
        assert_ne!(&sealed[TAG_LEN..], b"Hello, World!");

        let opened = cipher().decrypt(&nonce, &sealed).unwrap();
        assert_eq!(opened, b"Hello, World!");
    }

    #[test]
    fn different_nonce_different_ciphertext() {
        let mut nonce = [0u8; NONCE_LEN];
        let first = cipher().encrypt(&nonce, b"frame").unwrap();
        nonce[3] = 1;
        let second = cipher().encrypt(&nonce, b"frame").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn tampering_is_detected() {
        let nonce = [0u8; NONCE_LEN];
        let mut sealed = cipher().encrypt(&nonce, b"Hello, World!").unwrap();
        sealed[TAG_LEN] ^= 1;
        assert!(cipher().decrypt(&nonce, &sealed).is_err());
        assert!(cipher().decrypt(&nonce, &sealed[..4]).is_err());
    }

    #[test]
    fn rejects_short_keys_and_nonces() {
        assert!(XSalsa20Poly1305::new(&[0u8; 16]).is_none());

        let error = cipher().encrypt(&[0u8; 12], b"frame").unwrap_err();
        assert!(matches!(
            error.kind(),
            AeadErrorType::InvalidNonceLength { expected: 24 }
        ));
    }
}
