// SPDX-License-Identifier: GPL-3.0-only

//! Multi-format barcode decode engine
//!
//! Reads the linear product codes (EAN-13, EAN-8, UPC-A, UPC-E, Code 128,
//! Code 39, ITF) as well as QR, Data Matrix, Aztec and PDF417 through rxing.
//! Frames go through the same luma extraction and downscaling as
//! [`QrEngine`](super::QrEngine).

use super::engine::{DecodeEngine, EngineError};
use super::luma::downscale_luma;
use crate::backends::camera::VideoFrame;
use crate::constants::scanning::MAX_DECODE_DIMENSION;
use rxing::Exceptions;
use std::time::Instant;
use tracing::{debug, trace};

/// Decoder for every format rxing supports
#[derive(Debug, Clone)]
pub struct MultiFormatEngine {
    max_dimension: u32,
}

impl Default for MultiFormatEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiFormatEngine {
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

impl DecodeEngine for MultiFormatEngine {
    fn name(&self) -> &str {
        "multi-format"
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
        trace!(width, height, "Prepared luma plane");

        match rxing::helpers::detect_in_luma(plane, width, height, None) {
            Ok(result) => {
                debug!(
                    format = ?result.getBarcodeFormat(),
                    content = %result.getText(),
                    total_ms = start.elapsed().as_millis(),
                    "Decoded barcode"
                );
                Ok(Some(result.getText().to_string()))
            }
            // Nothing readable in this frame
            Err(
                Exceptions::NotFoundException(_)
                | Exceptions::ChecksumException(_)
                | Exceptions::FormatException(_),
            ) => Ok(None),
            Err(e) => Err(EngineError::Internal(format!("{:?}", e))),
        }
    }
}
