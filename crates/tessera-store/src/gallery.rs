//! Encrypted per-identity sample store under `certified/`.
//!
//! One directory per identity id; one sealed JPEG per captured sample,
//! named `<id>_<seq>_<timestamp>.jpg`. Plaintext image bytes exist only in
//! memory: samples are sealed before the first disk write, and decrypted
//! samples are re-encoded into embeddings without touching disk.

use chrono::{DateTime, Local};
use std::io::Cursor;
use std::path::PathBuf;
use thiserror::Error;

use tessera_core::{Embedding, FaceCapability, FaceError, RawImage};

use crate::keyvault::SealKey;
use crate::seal;

/// Timestamp component of a sample file name, e.g. `2025-03-09_14-30-05`.
pub const SAMPLE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Error, Debug)]
pub enum GalleryError {
    /// The identity has no directory, or nothing in it survived
    /// decryption + face extraction. Distinct from "identity not found"
    /// and from a single sample failing to decrypt.
    #[error("no enrolled data for identity {0}")]
    NoEnrolledData(u32),
    #[error("sample store unreadable: {0}")]
    Io(#[from] std::io::Error),
    #[error("sample image encode failed: {0}")]
    Encode(String),
    #[error("sample sealing failed: {0}")]
    Seal(String),
    #[error(transparent)]
    Face(#[from] FaceError),
}

/// One usable stored embedding and the sample file it came from.
#[derive(Debug, Clone)]
pub struct GalleryEmbedding {
    pub embedding: Embedding,
    pub source: String,
}

/// Owner of the encrypted sample tree.
pub struct EmbeddingStore {
    root: PathBuf,
    key: SealKey,
}

impl EmbeddingStore {
    /// `root` is the `certified/` directory; `key` comes from the KeyVault.
    pub fn new(root: impl Into<PathBuf>, key: SealKey) -> Self {
        Self {
            root: root.into(),
            key,
        }
    }

    fn identity_dir(&self, identity_id: u32) -> PathBuf {
        self.root.join(identity_id.to_string())
    }

    /// Seal one captured sample and write it. Creates the identity's
    /// directory on first use. Returns the file name written.
    pub fn store_sample(
        &self,
        identity_id: u32,
        seq: u32,
        captured_at: DateTime<Local>,
        image: &RawImage,
    ) -> Result<String, GalleryError> {
        let jpeg = encode_jpeg(image)?;

        let file_name = format!(
            "{identity_id}_{seq}_{}.jpg",
            captured_at.format(SAMPLE_TIMESTAMP_FORMAT)
        );
        let stem = file_name.trim_end_matches(".jpg");
        let sealed = seal::seal(&self.key, &jpeg, stem.as_bytes())
            .map_err(|e| GalleryError::Seal(e.to_string()))?;

        let dir = self.identity_dir(identity_id);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(&file_name), sealed)?;
        tracing::debug!(identity_id, seq, file = %file_name, "sample sealed and stored");
        Ok(file_name)
    }

    /// Decrypt every sample for `identity_id` and extract embeddings.
    ///
    /// Per-file failures (wrong key, tampering, undecodable image) are
    /// logged and skipped; they only escalate by leaving the gallery
    /// empty, which is reported as `NoEnrolledData`. Each usable sample
    /// contributes its primary face.
    pub fn load_gallery(
        &self,
        identity_id: u32,
        face: &mut dyn FaceCapability,
    ) -> Result<Vec<GalleryEmbedding>, GalleryError> {
        let dir = self.identity_dir(identity_id);
        if !dir.is_dir() {
            return Err(GalleryError::NoEnrolledData(identity_id));
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        let mut gallery = Vec::new();
        for path in files {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            let sealed = std::fs::read(&path)?;
            let jpeg = match seal::unseal(&self.key, &sealed, stem.as_bytes()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(file = %file_name, error = %e, "skipping undecryptable sample");
                    continue;
                }
            };

            let image = match decode_jpeg(&jpeg) {
                Ok(img) => img,
                Err(e) => {
                    tracing::warn!(file = %file_name, error = %e, "skipping undecodable sample");
                    continue;
                }
            };

            let mut embeddings = face.detect_and_encode(&image)?;
            if embeddings.is_empty() {
                tracing::debug!(file = %file_name, "no face in stored sample; skipping");
                continue;
            }
            gallery.push(GalleryEmbedding {
                embedding: embeddings.swap_remove(0),
                source: file_name,
            });
        }

        if gallery.is_empty() {
            return Err(GalleryError::NoEnrolledData(identity_id));
        }
        tracing::debug!(identity_id, usable = gallery.len(), "gallery loaded");
        Ok(gallery)
    }
}

fn encode_jpeg(image: &RawImage) -> Result<Vec<u8>, GalleryError> {
    let gray = image::GrayImage::from_raw(image.width, image.height, image.data.clone())
        .ok_or_else(|| GalleryError::Encode("pixel buffer does not match dimensions".into()))?;
    let mut bytes = Vec::new();
    gray.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
        .map_err(|e| GalleryError::Encode(e.to_string()))?;
    Ok(bytes)
}

fn decode_jpeg(bytes: &[u8]) -> Result<RawImage, String> {
    let decoded = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
    let gray = decoded.to_luma8();
    let (width, height) = gray.dimensions();
    RawImage::new(gray.into_raw(), width, height).ok_or_else(|| "dimension mismatch".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Derives a deterministic embedding from mean brightness, so tests can
    /// craft "identities" out of flat-gray images.
    struct BrightnessFace;

    impl FaceCapability for BrightnessFace {
        fn detect_and_encode(&mut self, image: &RawImage) -> Result<Vec<Embedding>, FaceError> {
            if image.data.is_empty() {
                return Ok(Vec::new());
            }
            let mean =
                image.data.iter().map(|&b| b as f32).sum::<f32>() / image.data.len() as f32;
            Ok(vec![Embedding {
                values: vec![mean / 255.0, 1.0],
                model_version: None,
            }])
        }
    }

    /// Sees no faces anywhere.
    struct BlindFace;

    impl FaceCapability for BlindFace {
        fn detect_and_encode(&mut self, _image: &RawImage) -> Result<Vec<Embedding>, FaceError> {
            Ok(Vec::new())
        }
    }

    fn flat_image(level: u8) -> RawImage {
        RawImage::new(vec![level; 64 * 64], 64, 64).unwrap()
    }

    fn captured_at(seq: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 9, 14, 30, seq).unwrap()
    }

    fn store_in(dir: &tempfile::TempDir, key: &SealKey) -> EmbeddingStore {
        EmbeddingStore::new(dir.path().join("certified"), key.clone())
    }

    #[test]
    fn stored_sample_is_ciphertext_with_contract_name() {
        let dir = tempfile::tempdir().unwrap();
        let key = SealKey::from_bytes([7u8; 32]);
        let store = store_in(&dir, &key);

        let name = store
            .store_sample(1, 1, captured_at(0), &flat_image(128))
            .unwrap();
        assert_eq!(name, "1_1_2025-03-09_14-30-00.jpg");

        let on_disk = std::fs::read(dir.path().join("certified/1").join(&name)).unwrap();
        assert_eq!(&on_disk[..8], b"TESSERA1");
        // JPEGs start with the SOI marker; ciphertext must not.
        assert_ne!(&on_disk[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn load_gallery_roundtrips_every_sample() {
        let dir = tempfile::tempdir().unwrap();
        let key = SealKey::from_bytes([7u8; 32]);
        let store = store_in(&dir, &key);

        for seq in 1..=3u32 {
            store
                .store_sample(1, seq, captured_at(seq), &flat_image(100 + seq as u8))
                .unwrap();
        }

        let gallery = store.load_gallery(1, &mut BrightnessFace).unwrap();
        assert_eq!(gallery.len(), 3);
        assert!(gallery
            .iter()
            .all(|entry| entry.source.starts_with("1_") && entry.source.ends_with(".jpg")));
    }

    #[test]
    fn missing_directory_is_no_enrolled_data() {
        let dir = tempfile::tempdir().unwrap();
        let key = SealKey::from_bytes([7u8; 32]);
        let store = store_in(&dir, &key);

        assert!(matches!(
            store.load_gallery(42, &mut BrightnessFace),
            Err(GalleryError::NoEnrolledData(42))
        ));
    }

    #[test]
    fn rotated_key_empties_the_gallery() {
        let dir = tempfile::tempdir().unwrap();
        let enrolled_key = SealKey::from_bytes([7u8; 32]);
        store_in(&dir, &enrolled_key)
            .store_sample(1, 1, captured_at(1), &flat_image(128))
            .unwrap();

        // Simulates secret.key being replaced after enrollment.
        let rotated = SealKey::from_bytes([8u8; 32]);
        assert!(matches!(
            store_in(&dir, &rotated).load_gallery(1, &mut BrightnessFace),
            Err(GalleryError::NoEnrolledData(1))
        ));
    }

    #[test]
    fn sample_copied_between_identities_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let key = SealKey::from_bytes([7u8; 32]);
        let store = store_in(&dir, &key);

        let name = store
            .store_sample(1, 1, captured_at(1), &flat_image(128))
            .unwrap();
        // Own sample still loads.
        assert_eq!(store.load_gallery(1, &mut BrightnessFace).unwrap().len(), 1);

        // Graft identity 1's ciphertext into identity 2's directory under a
        // name claiming to be identity 2's. AAD binding must reject it.
        let foreign_dir = dir.path().join("certified/2");
        std::fs::create_dir_all(&foreign_dir).unwrap();
        let sealed = std::fs::read(dir.path().join("certified/1").join(&name)).unwrap();
        std::fs::write(foreign_dir.join("2_1_2025-03-09_14-30-01.jpg"), sealed).unwrap();

        assert!(matches!(
            store.load_gallery(2, &mut BrightnessFace),
            Err(GalleryError::NoEnrolledData(2))
        ));
    }

    #[test]
    fn one_bad_sample_does_not_abort_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let key = SealKey::from_bytes([7u8; 32]);
        let store = store_in(&dir, &key);

        store
            .store_sample(1, 1, captured_at(1), &flat_image(128))
            .unwrap();
        std::fs::write(
            dir.path().join("certified/1/1_2_2025-03-09_14-30-02.jpg"),
            b"garbage, not a sealed sample",
        )
        .unwrap();

        let gallery = store.load_gallery(1, &mut BrightnessFace).unwrap();
        assert_eq!(gallery.len(), 1);
    }

    #[test]
    fn faceless_samples_contribute_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let key = SealKey::from_bytes([7u8; 32]);
        let store = store_in(&dir, &key);
        store
            .store_sample(1, 1, captured_at(1), &flat_image(128))
            .unwrap();

        assert!(matches!(
            store.load_gallery(1, &mut BlindFace),
            Err(GalleryError::NoEnrolledData(1))
        ));
    }
}
