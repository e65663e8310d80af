// SPDX-License-Identifier: GPL-3.0-only

//! Exclusive ownership of one live camera binding

use crate::backends::camera::{CameraBackend, MediaStream, VideoSink};
use crate::errors::{ScanError, ScanResult};
use tracing::{debug, info, warn};

/// A camera stream bound to a video sink
///
/// `close` stops every track and detaches the sink. It is idempotent, since
/// explicit stop, error recovery and disposal can all reach it.
pub struct CaptureSession {
    requested_device: Option<String>,
    stream: Option<MediaStream>,
    sink: VideoSink,
}

impl CaptureSession {
    /// Acquire a stream on `device_id` (or the platform default) and attach it to a fresh sink
    pub async fn open(
        backend: &dyn CameraBackend,
        device_id: Option<String>,
    ) -> ScanResult<Self> {
        let sink = VideoSink::new();
        let feeder = sink.attach();

        match backend.open_stream(device_id.clone(), feeder).await {
            Ok(stream) => {
                info!(
                    requested = ?device_id,
                    device = %stream.device_id(),
                    tracks = stream.active_tracks(),
                    "Capture session opened"
                );
                Ok(Self {
                    requested_device: device_id,
                    stream: Some(stream),
                    sink,
                })
            }
            Err(e) => {
                sink.detach();
                warn!(requested = ?device_id, error = %e, "Could not open camera");
                Err(ScanError::DeviceUnavailable(e.to_string()))
            }
        }
    }

    /// Device id passed to `open` (`None` = platform default)
    pub fn requested_device(&self) -> Option<&str> {
        self.requested_device.as_deref()
    }

    /// Device the stream is actually bound to, while open
    pub fn bound_device(&self) -> Option<&str> {
        self.stream.as_ref().map(|s| s.device_id())
    }

    pub fn sink(&self) -> &VideoSink {
        &self.sink
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn active_tracks(&self) -> usize {
        self.stream.as_ref().map_or(0, |s| s.active_tracks())
    }

    /// Stop all tracks, detach the sink and release the stream handle
    pub async fn close(&mut self) {
        let was_attached = self.sink.detach();
        let Some(mut stream) = self.stream.take() else {
            if was_attached {
                debug!("Detached sink of a session without a stream");
            }
            return;
        };

        let device = stream.device_id().to_string();
        // Track shutdown joins capture threads
        let stopped = tokio::task::spawn_blocking(move || {
            stream.stop_all();
            stream
        })
        .await;

        match stopped {
            Ok(stream) => {
                debug_assert_eq!(stream.active_tracks(), 0);
                info!(
                    device = %device,
                    requested = ?self.requested_device,
                    frames = self.sink.frames_delivered(),
                    "Capture session closed"
                );
            }
            Err(e) => warn!(device = %device, error = %e, "Track shutdown task failed"),
        }
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("requested_device", &self.requested_device)
            .field("stream", &self.stream)
            .field("sink_attached", &self.sink.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{
        BackendError, BackendResult, CameraBackendType, Device, FrameFeeder, MediaTrack,
    };
    use futures::future::BoxFuture;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlagTrack {
        live: bool,
        stops: Arc<AtomicUsize>,
    }

    impl MediaTrack for FlagTrack {
        fn label(&self) -> &str {
            "flag"
        }

        fn is_live(&self) -> bool {
            self.live
        }

        fn stop(&mut self) {
            if self.live {
                self.live = false;
                self.stops.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    struct OneShotBackend {
        stops: Arc<AtomicUsize>,
        fail: bool,
    }

    impl CameraBackend for OneShotBackend {
        fn enumerate_devices(&self) -> BoxFuture<'_, BackendResult<Vec<Device>>> {
            Box::pin(async { Ok(vec![Device::new("cam-1", None)]) })
        }

        fn open_stream(
            &self,
            device_id: Option<String>,
            _feeder: FrameFeeder,
        ) -> BoxFuture<'_, BackendResult<MediaStream>> {
            let stops = Arc::clone(&self.stops);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    return Err(BackendError::PermissionDenied("cam-1".into()));
                }
                let id = device_id.unwrap_or_else(|| "cam-1".to_string());
                Ok(MediaStream::new(
                    id,
                    vec![Box::new(FlagTrack { live: true, stops })],
                ))
            })
        }

        fn backend_type(&self) -> CameraBackendType {
            CameraBackendType::FileSource
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let stops = Arc::new(AtomicUsize::new(0));
        let backend = OneShotBackend {
            stops: Arc::clone(&stops),
            fail: false,
        };

        let mut session = CaptureSession::open(&backend, None).await.unwrap();
        assert_eq!(session.bound_device(), Some("cam-1"));
        assert_eq!(session.requested_device(), None);
        assert!(session.sink().is_attached());

        for _ in 0..3 {
            session.close().await;
        }

        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert!(!session.is_open());
        assert!(!session.sink().is_attached());
        assert_eq!(session.active_tracks(), 0);
    }

    #[tokio::test]
    async fn test_open_failure_is_device_unavailable() {
        let backend = OneShotBackend {
            stops: Arc::new(AtomicUsize::new(0)),
            fail: true,
        };

        let err = CaptureSession::open(&backend, Some("cam-1".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::DeviceUnavailable(_)));
    }
}
