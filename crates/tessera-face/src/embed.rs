//! ArcFace embedding extraction from aligned 112x112 face crops.

use crate::align::{self, ALIGNED_SIZE};
use crate::FaceEngineError;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use tessera_core::{Embedding, RawImage};

const PIXEL_MEAN: f32 = 127.5;
// ArcFace normalization is symmetric: same mean and std (not 128.0).
const PIXEL_STD: f32 = 127.5;
const EMBEDDING_DIM: usize = 512;
const MODEL_VERSION: &str = "w600k_r50";

pub struct Embedder {
    session: Session,
}

impl Embedder {
    pub fn load(model_path: &Path) -> Result<Self, FaceEngineError> {
        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;
        tracing::info!(path = %model_path.display(), "ArcFace embedder loaded");
        Ok(Self { session })
    }

    /// Align the face to the canonical crop, run the model, and return the
    /// L2-normalized 512-d embedding.
    pub fn embed(
        &mut self,
        image: &RawImage,
        landmarks: &[(f32, f32); 5],
    ) -> Result<Embedding, FaceEngineError> {
        let aligned = align::align_crop(&image.data, image.width, image.height, landmarks);
        let input = preprocess(&aligned);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| FaceEngineError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != EMBEDDING_DIM {
            return Err(FaceEngineError::InferenceFailed(format!(
                "expected {EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding {
            values: l2_normalize(raw),
            model_version: Some(MODEL_VERSION.to_string()),
        })
    }
}

/// Aligned grayscale crop into an NCHW float tensor, luma replicated
/// across the three channels.
fn preprocess(aligned: &[u8]) -> Array4<f32> {
    let mut tensor = Array4::<f32>::zeros((1, 3, ALIGNED_SIZE, ALIGNED_SIZE));
    for y in 0..ALIGNED_SIZE {
        for x in 0..ALIGNED_SIZE {
            let pixel = aligned.get(y * ALIGNED_SIZE + x).copied().unwrap_or(0) as f32;
            let normalized = (pixel - PIXEL_MEAN) / PIXEL_STD;
            tensor[[0, 0, y, x]] = normalized;
            tensor[[0, 1, y, x]] = normalized;
            tensor[[0, 2, y, x]] = normalized;
        }
    }
    tensor
}

fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw.to_vec()
    }
}
