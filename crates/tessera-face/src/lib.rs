//! tessera-face — production implementation of the face capability.
//!
//! SCRFD face detection and ArcFace embedding extraction over ONNX
//! Runtime. Detections are aligned to the canonical 112x112 ArcFace crop
//! via a 5-point similarity transform before embedding.

mod align;
mod detect;
mod embed;

use std::path::{Path, PathBuf};
use thiserror::Error;

use tessera_core::{Embedding, FaceCapability, FaceError, RawImage};

pub use detect::Detection;

/// SCRFD detection model file, expected under the model directory.
pub const DETECT_MODEL_FILE: &str = "det_10g.onnx";
/// ArcFace recognition model file, expected under the model directory.
pub const EMBED_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum FaceEngineError {
    #[error("model file not found: {0} — download from insightface and place in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

impl From<FaceEngineError> for FaceError {
    fn from(err: FaceEngineError) -> Self {
        match err {
            FaceEngineError::ModelNotFound(path) => FaceError::ModelUnavailable(path),
            other => FaceError::Inference(other.to_string()),
        }
    }
}

/// Detector + embedder pair behind the [`FaceCapability`] seam.
pub struct FaceEngine {
    detector: detect::Detector,
    embedder: embed::Embedder,
}

impl FaceEngine {
    /// Load both models from `model_dir`. Fails fast if either file is
    /// missing so a misconfigured install is caught before any capture.
    pub fn load(model_dir: &Path) -> Result<Self, FaceEngineError> {
        let detector = detect::Detector::load(&model_path(model_dir, DETECT_MODEL_FILE)?)?;
        let embedder = embed::Embedder::load(&model_path(model_dir, EMBED_MODEL_FILE)?)?;
        tracing::info!(dir = %model_dir.display(), "face engine ready");
        Ok(Self { detector, embedder })
    }

    /// Detect faces and extract one embedding per detection, ordered by
    /// detection confidence (most prominent face first).
    pub fn encode_faces(&mut self, image: &RawImage) -> Result<Vec<Embedding>, FaceEngineError> {
        let detections = self.detector.detect(image)?;
        let mut embeddings = Vec::with_capacity(detections.len());
        for det in &detections {
            embeddings.push(self.embedder.embed(image, &det.landmarks)?);
        }
        tracing::debug!(faces = embeddings.len(), "encoded probe image");
        Ok(embeddings)
    }
}

impl FaceCapability for FaceEngine {
    fn detect_and_encode(&mut self, image: &RawImage) -> Result<Vec<Embedding>, FaceError> {
        Ok(self.encode_faces(image)?)
    }
}

fn model_path(dir: &Path, file: &str) -> Result<PathBuf, FaceEngineError> {
    let path = dir.join(file);
    if !path.is_file() {
        return Err(FaceEngineError::ModelNotFound(
            path.to_string_lossy().into_owned(),
        ));
    }
    Ok(path)
}
