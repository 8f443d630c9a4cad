//! Trait seams for the external collaborators the engine consumes: the
//! face detection/embedding capability and the probe capture device.
//!
//! The engine never talks to a camera or an inference runtime directly;
//! workflows hand it implementations of these traits.

use crate::types::{Embedding, RawImage};
use thiserror::Error;

/// Default cosine-similarity threshold for a positive face match.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.40;

#[derive(Error, Debug)]
pub enum FaceError {
    #[error("face model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Opaque face capability: image in, zero-or-more embeddings out.
///
/// Implementations must order the returned embeddings by detection
/// confidence, most prominent face first — downstream policy evaluates
/// only the first one.
pub trait FaceCapability {
    fn detect_and_encode(&mut self, image: &RawImage) -> Result<Vec<Embedding>, FaceError>;

    /// Compare a probe embedding against each gallery embedding using the
    /// capability's default threshold. One boolean per gallery entry.
    fn compare(&self, gallery: &[Embedding], probe: &Embedding) -> Vec<bool> {
        gallery
            .iter()
            .map(|stored| stored.similarity(probe) >= DEFAULT_MATCH_THRESHOLD)
            .collect()
    }
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("capture device failure: {0}")]
    Device(String),
    #[error("capture timed out after {0} ms")]
    Timeout(u64),
}

/// Live-frame source for verification. One call, one frame.
pub trait ProbeSource {
    fn capture_probe(&mut self) -> Result<RawImage, ProbeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullFace;

    impl FaceCapability for NullFace {
        fn detect_and_encode(&mut self, _image: &RawImage) -> Result<Vec<Embedding>, FaceError> {
            Ok(Vec::new())
        }
    }

    fn emb(values: &[f32]) -> Embedding {
        Embedding {
            values: values.to_vec(),
            model_version: None,
        }
    }

    #[test]
    fn default_compare_uses_threshold() {
        let face = NullFace;
        let probe = emb(&[1.0, 0.0]);
        let gallery = vec![emb(&[1.0, 0.0]), emb(&[0.0, 1.0]), emb(&[0.8, 0.6])];

        let verdicts = face.compare(&gallery, &probe);
        assert_eq!(verdicts, vec![true, false, true]);
    }

    #[test]
    fn default_compare_empty_gallery() {
        let face = NullFace;
        let probe = emb(&[1.0, 0.0]);
        assert!(face.compare(&[], &probe).is_empty());
    }
}
