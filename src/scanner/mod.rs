// SPDX-License-Identifier: GPL-3.0-only

//! Continuous barcode scanning
//!
//! - [`catalog`]: camera enumeration
//! - [`session`]: one exclusive camera binding
//! - [`engine`]: decode engine trait and the continuous decode loop
//! - [`multi_format_engine`]: product barcodes and 2D codes with rxing
//! - [`qr_engine`]: QR-only decoding with rqrr
//! - [`state`]: controller state, snapshots and events
//! - [`controller`]: the lifecycle orchestrator tying them together

pub mod catalog;
pub mod controller;
pub mod engine;
mod luma;
pub mod multi_format_engine;
pub mod qr_engine;
pub mod session;
pub mod state;

pub use catalog::{DeviceCatalog, DeviceListing};
pub use controller::{DetectionCallback, ScanController, ScanControllerBuilder};
pub use engine::{
    DecodeEngine, DecodeLoop, DecodeOutcome, DecodePacing, DecoderKind, EngineError,
};
pub use multi_format_engine::MultiFormatEngine;
pub use qr_engine::QrEngine;
pub use session::CaptureSession;
pub use state::{DetectionEvent, ScanEvent, ScanSnapshot, ScanState};

use std::sync::Arc;

/// Build the decode engine for `kind`, downscaling frames to `max_dimension`
pub fn create_engine(kind: DecoderKind, max_dimension: u32) -> Arc<dyn DecodeEngine> {
    match kind {
        DecoderKind::MultiFormat => Arc::new(MultiFormatEngine::with_max_dimension(max_dimension)),
        DecoderKind::Qr => Arc::new(QrEngine::with_max_dimension(max_dimension)),
    }
}
