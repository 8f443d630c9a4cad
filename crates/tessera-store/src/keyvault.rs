//! Process-wide sealing key, generated once and persisted to `secret.key`.
//!
//! The key encrypts every stored face sample across all identities. Losing
//! or regenerating it makes every previously sealed sample permanently
//! undecryptable, so the vault never overwrites an existing key file.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;
use zeroize::Zeroizing;

/// AES-256 key length. `secret.key` holds exactly this many raw bytes.
pub const KEY_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum KeyVaultError {
    #[error("key file unreadable: {0}")]
    Io(#[from] std::io::Error),
    /// The key file exists but does not hold a valid key. Fatal: nothing
    /// sealed with the real key can be recovered until the file is restored.
    #[error("key file corrupt: expected {expected} bytes, found {actual}")]
    Corrupt { expected: usize, actual: usize },
}

/// In-memory sealing key, zeroized on drop.
#[derive(Clone)]
pub struct SealKey(Zeroizing<[u8; KEY_LEN]>);

impl SealKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn expose(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    /// Short SHA-256 digest prefix, safe to log. Never log key bytes.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&*self.0);
        digest[..8].iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Owner of the `secret.key` file.
pub struct KeyVault {
    path: PathBuf,
}

impl KeyVault {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the persisted key, generating and persisting one on first use.
    ///
    /// Idempotent across calls and process restarts. A key file of the
    /// wrong length is a fatal configuration error, distinct from "no
    /// samples enrolled".
    pub fn get_or_create(&self) -> Result<SealKey, KeyVaultError> {
        if self.path.exists() {
            let bytes = std::fs::read(&self.path)?;
            let raw: [u8; KEY_LEN] =
                bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| KeyVaultError::Corrupt {
                        expected: KEY_LEN,
                        actual: bytes.len(),
                    })?;
            let key = SealKey::from_bytes(raw);
            tracing::debug!(fingerprint = %key.fingerprint(), "sealing key loaded");
            return Ok(key);
        }

        let key = SealKey::generate();
        let mut file = std::fs::File::create(&self.path)?;
        file.write_all(key.expose())?;
        file.sync_all()?;
        tracing::info!(
            path = %self.path.display(),
            fingerprint = %key.fingerprint(),
            "generated new sealing key"
        );
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_once_then_reloads_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let vault = KeyVault::new(dir.path().join("secret.key"));

        let first = vault.get_or_create().unwrap();
        let second = vault.get_or_create().unwrap();
        assert_eq!(first.expose(), second.expose());

        // A fresh vault over the same file simulates a process restart.
        let restarted = KeyVault::new(dir.path().join("secret.key"));
        let third = restarted.get_or_create().unwrap();
        assert_eq!(first.expose(), third.expose());
    }

    #[test]
    fn key_file_holds_raw_key_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.key");
        let key = KeyVault::new(&path).get_or_create().unwrap();

        let on_disk = std::fs::read(&path).unwrap();
        assert_eq!(on_disk.len(), KEY_LEN);
        assert_eq!(on_disk.as_slice(), key.expose());
    }

    #[test]
    fn truncated_key_file_is_corrupt_not_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.key");
        std::fs::write(&path, b"short").unwrap();

        match KeyVault::new(&path).get_or_create() {
            Err(KeyVaultError::Corrupt { expected, actual }) => {
                assert_eq!(expected, KEY_LEN);
                assert_eq!(actual, 5);
            }
            Err(other) => panic!("expected Corrupt, got {other:?}"),
            Ok(_) => panic!("expected Corrupt, got a key"),
        }
        // The broken file must survive untouched for operator forensics.
        assert_eq!(std::fs::read(&path).unwrap(), b"short");
    }

    #[test]
    fn distinct_vaults_generate_distinct_keys() {
        let dir = tempfile::tempdir().unwrap();
        let a = KeyVault::new(dir.path().join("a.key")).get_or_create().unwrap();
        let b = KeyVault::new(dir.path().join("b.key")).get_or_create().unwrap();
        assert_ne!(a.expose(), b.expose());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
