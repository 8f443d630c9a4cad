//! Configuration, loaded from `TESSERA_*` environment variables with
//! defaults.

use std::path::PathBuf;
use std::time::Duration;
use tessera_core::DEFAULT_MATCH_THRESHOLD;
use tessera_store::StorePaths;

pub struct Config {
    /// Directory holding records.csv, attendance.csv, secret.key, certified/.
    pub data_dir: PathBuf,
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Cosine similarity threshold for a positive match.
    pub similarity_threshold: f32,
    /// Deadline for a single frame capture.
    pub capture_timeout_ms: u64,
    /// Samples requested per enrollment session (hard cap 10).
    pub samples_per_enrollment: usize,
}

impl Config {
    /// Load configuration from `TESSERA_*` environment variables.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("TESSERA_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        let model_dir = std::env::var("TESSERA_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/usr/share/tessera/models"));

        Self {
            data_dir,
            camera_device: std::env::var("TESSERA_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir,
            similarity_threshold: env_f32("TESSERA_SIMILARITY_THRESHOLD", DEFAULT_MATCH_THRESHOLD),
            capture_timeout_ms: env_u64("TESSERA_CAPTURE_TIMEOUT_MS", 5000),
            samples_per_enrollment: env_usize("TESSERA_SAMPLES_PER_ENROLLMENT", 10),
        }
    }

    pub fn store_paths(&self) -> StorePaths {
        StorePaths::new(&self.data_dir)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("tessera")
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
