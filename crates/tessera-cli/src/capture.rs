//! Camera-backed implementations of the capture seams.

use std::io::Write;

use tessera_core::{ProbeError, ProbeSource, RawImage};
use tessera_hw::{Camera, CameraError, Frame};

use crate::workflow::SampleSource;

fn frame_to_image(frame: Frame) -> Result<RawImage, ProbeError> {
    RawImage::new(frame.data, frame.width, frame.height)
        .ok_or_else(|| ProbeError::Device("frame buffer does not match dimensions".into()))
}

fn map_camera_error(err: CameraError) -> ProbeError {
    match err {
        CameraError::Timeout(ms) => ProbeError::Timeout(ms),
        other => ProbeError::Device(other.to_string()),
    }
}

/// Single live frame for verification.
pub struct CameraProbe {
    camera: Camera,
}

impl CameraProbe {
    pub fn new(camera: Camera) -> Self {
        Self { camera }
    }
}

impl ProbeSource for CameraProbe {
    fn capture_probe(&mut self) -> Result<RawImage, ProbeError> {
        let frame = self.camera.capture_frame().map_err(map_camera_error)?;
        if frame.is_dark {
            tracing::warn!("probe frame is dark; detection will likely find no face");
        }
        frame_to_image(frame)
    }
}

/// Interactive enrollment capture: prompt on stdout, trigger on ENTER,
/// stop on `q`.
pub struct OperatorSampleSource {
    camera: Camera,
    samples_requested: usize,
}

impl OperatorSampleSource {
    pub fn new(camera: Camera, samples_requested: usize) -> Self {
        Self {
            camera,
            samples_requested,
        }
    }
}

impl SampleSource for OperatorSampleSource {
    fn next_sample(&mut self, seq: usize, guidance: &str) -> Result<Option<RawImage>, ProbeError> {
        println!("[{seq}/{}] {guidance}", self.samples_requested);
        print!("Press ENTER to capture, q + ENTER to stop: ");
        std::io::stdout()
            .flush()
            .map_err(|e| ProbeError::Device(e.to_string()))?;

        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .map_err(|e| ProbeError::Device(e.to_string()))?;
        if line.trim().eq_ignore_ascii_case("q") {
            return Ok(None);
        }

        // Prefer a non-dark frame; fall back to whatever the device produced.
        let (mut frames, dark_skipped) =
            self.camera.capture_frames(1).map_err(map_camera_error)?;
        if dark_skipped > 0 {
            tracing::debug!(dark_skipped, "dark frames skipped during enrollment capture");
        }
        let frame = match frames.pop() {
            Some(frame) => frame,
            None => self.camera.capture_frame().map_err(map_camera_error)?,
        };
        frame_to_image(frame).map(Some)
    }
}
