// SPDX-License-Identifier: GPL-3.0-only

//! Barcode Scanner - continuous camera capture and decode
//!
//! The crate drives a camera, feeds its frames to a decode engine and
//! reports what it finds, while making sure a camera is never held by two
//! sessions at once.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera backend abstraction (V4L2, image directory)
//! - [`scanner`]: Scan controller, capture sessions and decode engines
//! - [`config`]: User configuration handling
//! - [`constants`]: Defaults and timing
//! - [`errors`]: Error types
//!
//! # Example
//!
//! ```ignore
//! let controller = ScanController::from_config(&Config::load()?)
//!     .on_detected(|event| println!("{}", event.payload))
//!     .build();
//! controller.refresh_devices().await?;
//! controller.start(None).await?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod scanner;

// Re-export commonly used types
pub use config::Config;
pub use errors::{AppError, AppResult, ScanError, ScanResult};
pub use scanner::{
    DecodeEngine, DecoderKind, DetectionEvent, ScanController, ScanEvent, ScanSnapshot,
    ScanState,
};
