// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Decode loop pacing
pub mod scanning {
    use super::Duration;

    /// Delay between two decode attempts that found nothing
    pub const ATTEMPT_INTERVAL: Duration = Duration::from_millis(100);

    /// Delay after a detection before decoding resumes (continuous mode only)
    pub const SUCCESS_INTERVAL: Duration = Duration::from_millis(500);

    /// Frames larger than this (either side) are downscaled before decoding
    pub const MAX_DECODE_DIMENSION: u32 = 640;

    /// Capacity of the controller's event broadcast channel
    pub const EVENT_CHANNEL_CAPACITY: usize = 64;
}

/// Camera capture defaults
pub mod capture {
    use super::Duration;

    /// Requested capture width
    pub const DEFAULT_WIDTH: u32 = 1280;

    /// Requested capture height
    pub const DEFAULT_HEIGHT: u32 = 720;

    /// Number of mmap buffers queued on a V4L2 device
    pub const V4L2_BUFFER_COUNT: u32 = 4;

    /// Longest a capture thread waits for a frame before rechecking whether
    /// it has been stopped
    pub const V4L2_DEQUEUE_TIMEOUT: Duration = Duration::from_millis(500);

    /// Capture formats in order of preference
    ///
    /// Raw formats first, MJPEG last because it has to be decoded on the
    /// capture thread before the luma plane is available.
    pub const PREFERRED_FOURCCS: &[&[u8; 4]] = &[b"YUYV", b"GREY", b"MJPG"];
}

/// File format support
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Virtual camera timing constants
pub mod virtual_camera {
    use super::Duration;

    /// Frame rate for image streaming (~30fps)
    pub const IMAGE_STREAM_FRAME_DURATION: Duration = Duration::from_millis(33);
}
