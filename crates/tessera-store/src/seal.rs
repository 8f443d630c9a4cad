//! Sealed-envelope format for face samples at rest.
//!
//! ```text
//! [MAGIC 8B]["TESSERA1"]
//! [VERSION 1B][0x01]
//! [NONCE 12B][random]
//! [CIPHERTEXT variable][AES-256-GCM, 16B tag appended]
//! ```
//!
//! The sample's file stem is bound as AAD, so a ciphertext copied into
//! another identity's directory fails authentication instead of decrypting
//! under the wrong name.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use thiserror::Error;

use crate::keyvault::SealKey;

const MAGIC: &[u8; 8] = b"TESSERA1";
const VERSION: u8 = 0x01;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = MAGIC.len() + 1 + NONCE_LEN;
const MIN_SEALED_LEN: usize = HEADER_LEN + TAG_LEN;

#[derive(Error, Debug)]
pub enum SealError {
    #[error("sealed data too small: {0} bytes")]
    Truncated(usize),
    #[error("not a sealed sample (bad magic)")]
    BadMagic,
    #[error("unsupported seal version: {0:#04x}")]
    UnsupportedVersion(u8),
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed: wrong key or tampered data")]
    Decrypt,
}

/// Encrypt `plaintext` under `key`, binding `aad` into the authentication tag.
pub fn seal(key: &SealKey, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, SealError> {
    let cipher = Aes256Gcm::new_from_slice(key.expose()).map_err(|_| SealError::Encrypt)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| SealError::Encrypt)?;

    let mut sealed = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    sealed.extend_from_slice(MAGIC);
    sealed.push(VERSION);
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypt a sealed envelope. Fails on truncation, foreign formats, a
/// version this build does not understand, a wrong key, tampering, or an
/// AAD mismatch.
pub fn unseal(key: &SealKey, sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>, SealError> {
    if sealed.len() < MIN_SEALED_LEN {
        return Err(SealError::Truncated(sealed.len()));
    }
    if &sealed[..MAGIC.len()] != MAGIC {
        return Err(SealError::BadMagic);
    }
    let version = sealed[MAGIC.len()];
    if version != VERSION {
        return Err(SealError::UnsupportedVersion(version));
    }

    let nonce = Nonce::from_slice(&sealed[MAGIC.len() + 1..HEADER_LEN]);
    let cipher = Aes256Gcm::new_from_slice(key.expose()).map_err(|_| SealError::Decrypt)?;

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: &sealed[HEADER_LEN..],
                aad,
            },
        )
        .map_err(|_| SealError::Decrypt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> SealKey {
        SealKey::from_bytes([byte; 32])
    }

    #[test]
    fn roundtrip() {
        let k = key(0x42);
        let plain = b"not actually a jpeg";
        let sealed = seal(&k, plain, b"1_1_stamp").unwrap();
        let opened = unseal(&k, &sealed, b"1_1_stamp").unwrap();
        assert_eq!(opened, plain);
    }

    #[test]
    fn ciphertext_never_contains_plaintext() {
        let k = key(0x42);
        let plain = b"face sample bytes face sample bytes";
        let sealed = seal(&k, plain, b"aad").unwrap();

        assert_ne!(sealed.as_slice(), plain.as_slice());
        assert!(!sealed
            .windows(plain.len())
            .any(|window| window == plain.as_slice()));
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = seal(&key(0x01), b"secret", b"aad").unwrap();
        assert!(matches!(
            unseal(&key(0x02), &sealed, b"aad"),
            Err(SealError::Decrypt)
        ));
    }

    #[test]
    fn wrong_aad_fails() {
        let sealed = seal(&key(0x01), b"secret", b"7_3_stamp").unwrap();
        assert!(matches!(
            unseal(&key(0x01), &sealed, b"8_3_stamp"),
            Err(SealError::Decrypt)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let k = key(0x01);
        let mut sealed = seal(&k, b"secret", b"aad").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;
        assert!(matches!(unseal(&k, &sealed, b"aad"), Err(SealError::Decrypt)));
    }

    #[test]
    fn foreign_bytes_rejected_by_shape() {
        let k = key(0x01);
        assert!(matches!(unseal(&k, b"tiny", b""), Err(SealError::Truncated(4))));

        let mut wrong_magic = seal(&k, b"x", b"").unwrap();
        wrong_magic[0] = b'X';
        assert!(matches!(unseal(&k, &wrong_magic, b""), Err(SealError::BadMagic)));

        let mut future = seal(&k, b"x", b"").unwrap();
        future[8] = 0x02;
        assert!(matches!(
            unseal(&k, &future, b""),
            Err(SealError::UnsupportedVersion(0x02))
        ));
    }

    #[test]
    fn nonces_are_unique_per_seal() {
        let k = key(0x01);
        let a = seal(&k, b"same plaintext", b"aad").unwrap();
        let b = seal(&k, b"same plaintext", b"aad").unwrap();
        assert_ne!(a[9..9 + NONCE_LEN], b[9..9 + NONCE_LEN]);
        assert_ne!(a, b);
    }
}
