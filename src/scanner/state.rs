// SPDX-License-Identifier: GPL-3.0-only

//! Controller state and the values it publishes

use crate::backends::camera::Device;
use crate::errors::ScanError;
use chrono::{DateTime, Utc};

/// Lifecycle of a [`ScanController`](super::ScanController)
///
/// ```text
/// Idle ──start──▶ Starting ──opened──▶ Scanning ──result──▶ Detected ──teardown──▶ Idle
///   ▲                │                    │  │
///   │                └──failed──▶ Error ◀─┘  └──stop──▶ Stopping ──▶ Idle
///   └──────────── acknowledge ──────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanState {
    #[default]
    Idle,
    /// Waiting for the camera stream (may include a permission prompt)
    Starting,
    /// Decoding frames
    Scanning,
    /// A payload was found; transient while the session is torn down
    Detected,
    /// Releasing the session
    Stopping,
    /// Acquisition or decoding failed; see the stored error
    Error,
}

impl ScanState {
    /// Whether a capture session may be open in this state
    pub fn is_active(&self) -> bool {
        matches!(self, ScanState::Starting | ScanState::Scanning)
    }
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScanState::Idle => "idle",
            ScanState::Starting => "starting",
            ScanState::Scanning => "scanning",
            ScanState::Detected => "detected",
            ScanState::Stopping => "stopping",
            ScanState::Error => "error",
        };
        f.write_str(name)
    }
}

/// A decoded payload; never mutated after creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionEvent {
    /// Whatever the decode engine accepted, treated as an opaque identifier
    pub payload: String,
    pub detected_at: DateTime<Utc>,
    /// Scan attempt that produced it
    pub generation: u64,
}

impl DetectionEvent {
    pub fn new(payload: impl Into<String>, generation: u64) -> Self {
        Self {
            payload: payload.into(),
            detected_at: Utc::now(),
            generation,
        }
    }
}

/// Everything a UI needs to render the scanner
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanSnapshot {
    pub state: ScanState,
    /// Device the current or last session is bound to (`None` = platform default)
    pub device_id: Option<String>,
    pub devices: Vec<Device>,
    /// Camera picker position, clamped to `devices`
    pub selected_index: usize,
    pub last_detection: Option<DetectionEvent>,
    pub error: Option<ScanError>,
    /// Set when the last enumeration failed; `devices` is empty then
    pub enumeration_error: Option<ScanError>,
    pub generation: u64,
    pub disposed: bool,
}

/// Discrete notifications, in the order they happened
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    StateChanged { from: ScanState, to: ScanState },
    Detected(DetectionEvent),
    Failed(ScanError),
    DevicesChanged(Vec<Device>),
}
