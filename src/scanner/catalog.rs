// SPDX-License-Identifier: GPL-3.0-only

//! Camera enumeration

use crate::backends::camera::{CameraBackend, Device};
use crate::errors::ScanError;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of one enumeration pass
///
/// A failed pass still yields a (empty) device list so callers can render
/// without branching; the failure is carried next to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceListing {
    pub devices: Vec<Device>,
    pub failure: Option<ScanError>,
}

/// Enumerates camera inputs through a backend
///
/// Labels frequently only appear after the user has granted camera access,
/// so the list is re-queried after every session start and stop instead of
/// being cached.
pub struct DeviceCatalog {
    backend: Arc<dyn CameraBackend>,
}

impl DeviceCatalog {
    pub fn new(backend: Arc<dyn CameraBackend>) -> Self {
        Self { backend }
    }

    /// Query the platform for camera inputs
    pub async fn list_devices(&self) -> DeviceListing {
        match self.backend.enumerate_devices().await {
            Ok(devices) => {
                info!(count = devices.len(), backend = %self.backend.backend_type(), "Listed cameras");
                DeviceListing {
                    devices,
                    failure: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "Camera enumeration failed");
                DeviceListing {
                    devices: Vec::new(),
                    failure: Some(ScanError::DeviceEnumerationFailed(e.to_string())),
                }
            }
        }
    }
}

impl std::fmt::Debug for DeviceCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCatalog")
            .field("backend", &self.backend.backend_type())
            .finish()
    }
}
