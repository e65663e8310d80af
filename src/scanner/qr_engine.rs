// SPDX-License-Identifier: GPL-3.0-only

//! QR code decode engine
//!
//! Frames are reduced to their luma plane, downscaled so neither side exceeds
//! `max_dimension`, and handed to rqrr. The first grid that decodes wins.

use super::engine::{DecodeEngine, EngineError};
use super::luma::downscale_luma;
use crate::backends::camera::VideoFrame;
use crate::constants::scanning::MAX_DECODE_DIMENSION;
use std::time::Instant;
use tracing::{debug, trace};

/// QR decoder backed by rqrr
#[derive(Debug, Clone)]
pub struct QrEngine {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
}

impl Default for QrEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QrEngine {
    pub fn new() -> Self {
        Self {
            max_dimension: MAX_DECODE_DIMENSION,
        }
    }

    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }
}

impl DecodeEngine for QrEngine {
    fn name(&self) -> &str {
        "qr"
    }

    fn decode(&self, frame: &VideoFrame) -> Result<Option<String>, EngineError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(EngineError::InvalidFrame(format!(
                "{}x{} frame",
                frame.width, frame.height
            )));
        }

        let start = Instant::now();
        let luma = frame.luma();
        let (plane, width, height) =
            downscale_luma(&luma, frame.width, frame.height, self.max_dimension);
        trace!(
            width,
            height,
            prepare_ms = start.elapsed().as_millis(),
            "Prepared luma plane"
        );

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            width as usize,
            height as usize,
            |x, y| plane[y * width as usize + x],
        );
        let grids = prepared.detect_grids();
        trace!(count = grids.len(), "QR grids located");

        for grid in grids {
            match grid.decode() {
                Ok((_meta, content)) => {
                    debug!(
                        content = %content,
                        total_ms = start.elapsed().as_millis(),
                        "Decoded QR code"
                    );
                    return Ok(Some(content));
                }
                Err(e) => debug!(error = ?e, "Failed to decode QR grid"),
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_frame_has_no_result() {
        let engine = QrEngine::new();
        let frame = VideoFrame::gray(64, 48, vec![255; 64 * 48]);
        assert_eq!(engine.decode(&frame), Ok(None));
    }

    #[test]
    fn test_zero_sized_frame_is_invalid() {
        let engine = QrEngine::new();
        let frame = VideoFrame::gray(0, 10, Vec::new());
        assert!(matches!(
            engine.decode(&frame),
            Err(EngineError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_max_dimension_is_at_least_one() {
        assert_eq!(QrEngine::with_max_dimension(0).max_dimension(), 1);
    }
}
