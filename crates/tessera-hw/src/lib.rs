//! tessera-hw — V4L2 camera capture.
//!
//! Grayscale frame acquisition with format negotiation, dark-frame
//! filtering, and a poll(2)-based capture deadline so a stalled device
//! fails instead of blocking the session forever.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::Frame;
