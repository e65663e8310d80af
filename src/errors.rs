// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanner

use crate::backends::camera::types::BackendError;
use crate::scanner::engine::EngineError;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type for controller operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Top-level error used by the CLI and configuration layer
#[derive(Debug, Clone)]
pub enum AppError {
    /// Scanner controller errors
    Scan(ScanError),
    /// Camera backend errors outside a controller
    Backend(BackendError),
    /// Configuration errors
    Config(String),
    /// Filesystem errors
    Io(String),
    /// Generic error with message
    Other(String),
}

/// Failures surfaced by the scan controller
///
/// Every variant except [`ScanError::ControllerDisposed`] is environmental and
/// recoverable by calling `start` again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// No camera, permission denied, or the device is held by someone else
    DeviceUnavailable(String),
    /// The platform refused to list camera devices
    DeviceEnumerationFailed(String),
    /// The decode engine reported an internal error
    DecodeEngineFault(String),
    /// An operation was invoked after `dispose()`
    ControllerDisposed,
}

impl ScanError {
    /// Whether retrying `start` can clear this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ScanError::ControllerDisposed)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Scan(e) => write!(f, "Scanner error: {}", e),
            AppError::Backend(e) => write!(f, "Camera error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::DeviceUnavailable(msg) => write!(f, "Camera unavailable: {}", msg),
            ScanError::DeviceEnumerationFailed(msg) => {
                write!(f, "Could not list cameras: {}", msg)
            }
            ScanError::DecodeEngineFault(msg) => write!(f, "Decoder fault: {}", msg),
            ScanError::ControllerDisposed => write!(f, "Scanner has been disposed"),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for ScanError {}

impl From<ScanError> for AppError {
    fn from(err: ScanError) -> Self {
        AppError::Scan(err)
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Backend(err)
    }
}

impl From<EngineError> for ScanError {
    fn from(err: EngineError) -> Self {
        ScanError::DecodeEngineFault(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_disposed_is_unrecoverable() {
        assert!(ScanError::DeviceUnavailable("busy".into()).is_recoverable());
        assert!(ScanError::DeviceEnumerationFailed("x".into()).is_recoverable());
        assert!(ScanError::DecodeEngineFault("x".into()).is_recoverable());
        assert!(!ScanError::ControllerDisposed.is_recoverable());
    }

    #[test]
    fn test_backend_error_wraps_into_app_error() {
        let err: AppError = BackendError::Busy("/dev/video0".into()).into();
        assert!(matches!(err, AppError::Backend(BackendError::Busy(_))));
        assert!(err.to_string().contains("/dev/video0"));
    }
}
