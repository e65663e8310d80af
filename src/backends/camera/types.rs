// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CameraBackendType {
    /// Video4Linux2 capture devices (`/dev/video*`)
    #[default]
    V4l2,
    /// Still images from a directory replayed as a virtual camera
    FileSource,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::V4l2 => write!(f, "V4L2"),
            CameraBackendType::FileSource => write!(f, "file source"),
        }
    }
}

/// A camera input as reported by enumeration
///
/// Created by the backend and never mutated afterwards. The label is only
/// known once the platform is willing to describe the device, so it stays
/// optional rather than defaulting to an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    /// Opaque identifier, stable per physical camera
    pub id: String,
    /// Human-readable name, if the platform exposes one
    pub label: Option<String>,
}

impl Device {
    pub fn new(id: impl Into<String>, label: Option<String>) -> Self {
        Self {
            id: id.into(),
            label: label.filter(|l| !l.trim().is_empty()),
        }
    }

    /// Label for display, falling back to the identifier
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} ({})", label, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Pixel layout of a [`VideoFrame`]
///
/// Compressed capture formats (MJPEG) are decoded on the capture thread, so
/// only raw layouts reach the decode engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit grayscale (1 byte per pixel)
    Gray8,
    /// Packed 4:2:2 (Y0 U Y1 V), the usual raw webcam format
    YUYV,
    /// 24-bit RGB without alpha
    RGB24,
    /// 32-bit RGBA
    RGBA,
}

impl PixelFormat {
    /// Bytes per pixel in the packed row
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::YUYV => 2,
            Self::RGB24 => 3,
            Self::RGBA => 4,
        }
    }

    /// Parse a V4L2 FourCC string
    pub fn from_fourcc(fourcc: &str) -> Option<Self> {
        match fourcc {
            "YUYV" | "YUY2" => Some(Self::YUYV),
            "GREY" | "Y800" => Some(Self::Gray8),
            "RGB3" => Some(Self::RGB24),
            "AB24" => Some(Self::RGBA),
            _ => None,
        }
    }
}

/// A single frame delivered to a video sink
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    pub data: Arc<[u8]>,
    /// Capture sequence number within the stream
    pub sequence: u64,
    pub captured_at: Instant,
}

impl VideoFrame {
    /// Build a tightly packed grayscale frame
    pub fn gray(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Gray8,
            stride: width,
            data: Arc::from(data),
            sequence: 0,
            captured_at: Instant::now(),
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Extract a tightly packed 8-bit luma plane
    ///
    /// Rows that would run past the end of `data` are filled with black so a
    /// truncated buffer never panics the decode path.
    pub fn luma(&self) -> Vec<u8> {
        let width = self.width as usize;
        let height = self.height as usize;
        let stride = self.stride as usize;
        let bpp = self.format.bytes_per_pixel();

        let mut luma = Vec::with_capacity(width * height);
        for y in 0..height {
            let row_start = y * stride;
            let row_end = row_start + width * bpp;
            let Some(row) = self.data.get(row_start..row_end) else {
                luma.resize(luma.len() + width, 0);
                continue;
            };

            match self.format {
                PixelFormat::Gray8 => luma.extend_from_slice(row),
                // Y sits at every even byte
                PixelFormat::YUYV => luma.extend(row.iter().step_by(2)),
                PixelFormat::RGB24 | PixelFormat::RGBA => {
                    luma.extend(row.chunks_exact(bpp).map(|px| rgb_to_luma(px[0], px[1], px[2])))
                }
            }
        }
        luma
    }
}

/// BT.601 luma from 8-bit RGB
fn rgb_to_luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// The OS refused access to the device
    PermissionDenied(String),
    /// Another process holds the device
    Busy(String),
    /// No usable capture format
    FormatNotSupported(String),
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl BackendError {
    /// Classify an I/O error raised while touching `device`
    pub fn from_io(device: &str, err: &std::io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::EACCES) | Some(libc::EPERM) => {
                BackendError::PermissionDenied(format!("{}: {}", device, err))
            }
            Some(libc::EBUSY) => BackendError::Busy(format!("{}: {}", device, err)),
            Some(libc::ENOENT) | Some(libc::ENODEV) | Some(libc::ENXIO) => {
                BackendError::DeviceNotFound(format!("{}: {}", device, err))
            }
            _ => BackendError::IoError(format!("{}: {}", device, err)),
        }
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            BackendError::Busy(msg) => write!(f, "Device busy: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}
