// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! The scanner never talks to hardware directly. It asks a [`CameraBackend`]
//! for the list of cameras and for a live [`MediaStream`] bound to one of
//! them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   ScanController    │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ DeviceCatalog /     │
//! │ CaptureSession      │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  CameraBackend Trait│  ← Common interface
//! └──────────┬──────────┘
//!            │
//!      ┌─────┴──────┐
//!      ▼            ▼
//!  ┌──────┐   ┌───────────┐
//!  │ V4L2 │   │File source│
//!  └──────┘   └───────────┘
//! ```

pub mod file_source;
pub mod frame_loop;
pub mod stream;
pub mod types;
pub mod v4l2;

pub use stream::{FrameFeeder, FrameSlot, MediaStream, MediaTrack, VideoSink};
pub use types::*;

use crate::config::Config;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Platform camera access
///
/// Both operations may suspend for an unbounded time (a permission prompt,
/// a slow USB device), so they return futures rather than blocking.
pub trait CameraBackend: Send + Sync {
    /// Enumerate camera inputs in a stable order
    fn enumerate_devices(&self) -> BoxFuture<'_, BackendResult<Vec<Device>>>;

    /// Open a stream on `device_id`, or on the platform default when `None`
    ///
    /// Frames must be delivered through `feeder`. Producers should stop on
    /// their own once `feeder.push` returns `false`.
    fn open_stream(
        &self,
        device_id: Option<String>,
        feeder: FrameFeeder,
    ) -> BoxFuture<'_, BackendResult<MediaStream>>;

    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;
}

/// Build the backend selected in `config`
pub fn get_backend(config: &Config) -> Arc<dyn CameraBackend> {
    match config.backend {
        CameraBackendType::V4l2 => Arc::new(v4l2::V4l2Backend::new(
            config.capture_width,
            config.capture_height,
        )),
        CameraBackendType::FileSource => {
            Arc::new(file_source::FileSourceBackend::new(config.image_directory()))
        }
    }
}
