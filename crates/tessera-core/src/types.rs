use serde::{Deserialize, Serialize};

/// A decoded 8-bit grayscale image, as handed to the face capability.
///
/// Camera frames and decrypted gallery samples are both normalized to this
/// representation before detection.
#[derive(Debug, Clone)]
pub struct RawImage {
    /// Grayscale pixel data, row-major, `width * height` bytes.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RawImage {
    /// Returns `None` if `data` does not hold exactly `width * height` bytes.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        if data.len() == (width as usize) * (height as usize) {
            Some(Self {
                data,
                width,
                height,
            })
        } else {
            None
        }
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    /// Compute cosine similarity between two embeddings.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar. Always processes
    /// all dimensions; no early return on mismatched prefixes.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            dot / denom
        } else {
            0.0
        }
    }
}
