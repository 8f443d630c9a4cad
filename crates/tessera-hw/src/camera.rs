//! V4L2 camera capture via the `v4l` crate.
//!
//! Every dequeue is gated by poll(2) with a deadline, so a disconnected or
//! wedged camera surfaces `CameraError::Timeout` instead of blocking the
//! operator session indefinitely.

use crate::frame::{self, Frame};
use std::os::fd::AsRawFd;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::{CaptureStream, Stream};
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const DARK_FRAME_PCT: f32 = 0.95;
const STREAM_BUFFERS: u32 = 4;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("no frame within {0} ms")]
    Timeout(u64),
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel, extract Y channel).
    Yuyv,
    /// 8-bit grayscale (1 byte/pixel).
    Grey,
    /// 16-bit little-endian grayscale (2 bytes/pixel).
    Y16,
}

/// V4L2 camera device handle.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub fourcc: FourCC,
    pixel_format: PixelFormat,
    capture_timeout: Duration,
}

impl Camera {
    /// Open a V4L2 device by path (e.g., "/dev/video0") and negotiate a
    /// grayscale-convertible format at 640x480.
    pub fn open(device_path: &str, capture_timeout: Duration) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;
        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            return Err(CameraError::StreamingNotSupported);
        }

        let mut fmt = device
            .format()
            .map_err(|e| CameraError::FormatNegotiationFailed(format!("failed to get format: {e}")))?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = 640;
        fmt.height = 480;

        let negotiated = device
            .set_format(&fmt)
            .map_err(|e| CameraError::FormatNegotiationFailed(format!("failed to set format: {e}")))?;

        let fourcc = negotiated.fourcc;
        let pixel_format = if fourcc == FourCC::new(b"GREY") {
            PixelFormat::Grey
        } else if fourcc == FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else if fourcc == FourCC::new(b"Y16 ") || fourcc == FourCC::new(b"Y16\0") {
            PixelFormat::Y16
        } else {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {fourcc:?} (need YUYV, GREY, or Y16)"
            )));
        };

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?fourcc,
            "negotiated format"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            fourcc,
            pixel_format,
            capture_timeout,
        })
    }

    /// Capture a single frame, converting to grayscale.
    pub fn capture_frame(&self) -> Result<Frame, CameraError> {
        let mut stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CameraError::CaptureFailed(format!("failed to create mmap stream: {e}")))?;
        stream
            .start()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to start stream: {e}")))?;

        self.wait_readable()?;
        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;

        let gray = self.buf_to_grayscale(buf)?;
        let is_dark = frame::is_dark_frame(&gray, DARK_FRAME_PCT);

        Ok(Frame {
            data: gray,
            width: self.width,
            height: self.height,
            captured_at: std::time::Instant::now(),
            sequence: meta.sequence,
            is_dark,
        })
    }

    /// Capture up to `count` non-dark frames, attempting at most
    /// `count * 3` raw captures. Returns the frames and the number of dark
    /// frames skipped.
    pub fn capture_frames(&self, count: usize) -> Result<(Vec<Frame>, usize), CameraError> {
        let max_attempts = count * 3;
        let mut good_frames = Vec::with_capacity(count);
        let mut dark_count = 0usize;

        let mut stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CameraError::CaptureFailed(format!("failed to create mmap stream: {e}")))?;
        stream
            .start()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to start stream: {e}")))?;

        for _ in 0..max_attempts {
            if good_frames.len() >= count {
                break;
            }

            self.wait_readable()?;
            let (buf, meta) = stream
                .next()
                .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;

            let gray = self.buf_to_grayscale(buf)?;
            if frame::is_dark_frame(&gray, DARK_FRAME_PCT) {
                dark_count += 1;
                tracing::debug!(seq = meta.sequence, "skipping dark frame");
                continue;
            }

            good_frames.push(Frame {
                data: gray,
                width: self.width,
                height: self.height,
                captured_at: std::time::Instant::now(),
                sequence: meta.sequence,
                is_dark: false,
            });
        }

        Ok((good_frames, dark_count))
    }

    /// Block until the device has a frame ready, up to the capture timeout.
    fn wait_readable(&self) -> Result<(), CameraError> {
        let timeout_ms = self.capture_timeout.as_millis().min(i32::MAX as u128) as libc::c_int;
        let mut pfd = libc::pollfd {
            fd: self.device.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };

        // SAFETY: pfd is a valid pollfd for the duration of the call.
        let ret = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        match ret {
            0 => Err(CameraError::Timeout(timeout_ms as u64)),
            n if n < 0 => Err(CameraError::CaptureFailed(format!(
                "poll failed: {}",
                std::io::Error::last_os_error()
            ))),
            _ => Ok(()),
        }
    }

    /// Convert a raw buffer to grayscale based on the negotiated format.
    fn buf_to_grayscale(&self, buf: &[u8]) -> Result<Vec<u8>, CameraError> {
        let pixels = (self.width * self.height) as usize;

        match self.pixel_format {
            PixelFormat::Grey => {
                if buf.len() < pixels {
                    return Err(CameraError::CaptureFailed(format!(
                        "GREY buffer too short: expected {pixels}, got {}",
                        buf.len()
                    )));
                }
                Ok(buf[..pixels].to_vec())
            }
            PixelFormat::Y16 => {
                let expected_bytes = pixels * 2;
                if buf.len() < expected_bytes {
                    return Err(CameraError::CaptureFailed(format!(
                        "Y16 buffer too short: expected {expected_bytes}, got {}",
                        buf.len()
                    )));
                }
                // 16-bit little-endian per pixel, keep the high byte.
                let mut gray = Vec::with_capacity(pixels);
                for idx in 0..pixels {
                    let low = buf[idx * 2] as u16;
                    let high = buf[idx * 2 + 1] as u16;
                    let value = (high << 8) | low;
                    gray.push((value >> 8) as u8);
                }
                Ok(gray)
            }
            PixelFormat::Yuyv => frame::yuyv_to_grayscale(buf, self.width, self.height)
                .map_err(|e| CameraError::CaptureFailed(format!("YUYV conversion failed: {e}"))),
        }
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps
                .capabilities
                .contains(v4l::capability::Flags::VIDEO_CAPTURE)
            {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}
