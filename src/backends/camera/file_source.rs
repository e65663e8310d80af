// SPDX-License-Identifier: GPL-3.0-only

//! Image-directory virtual camera
//!
//! Every supported image in a directory shows up as one camera. Opening a
//! stream replays that image at a fixed frame rate, which is enough to drive
//! the scanner end to end without hardware.

use super::frame_loop::{CaptureLoopController, LoopAction};
use super::stream::{FrameFeeder, MediaStream, MediaTrack};
use super::types::{
    BackendError, BackendResult, CameraBackendType, Device, PixelFormat, VideoFrame,
};
use super::CameraBackend;
use crate::constants::{file_formats, virtual_camera as vc_timing};
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Backend serving still images as cameras
#[derive(Debug, Clone)]
pub struct FileSourceBackend {
    directory: Option<PathBuf>,
}

impl FileSourceBackend {
    pub fn new(directory: Option<PathBuf>) -> Self {
        Self { directory }
    }
}

impl CameraBackend for FileSourceBackend {
    fn enumerate_devices(&self) -> BoxFuture<'_, BackendResult<Vec<Device>>> {
        let directory = self.directory.clone();
        Box::pin(async move {
            let directory = directory.ok_or_else(|| {
                BackendError::NotAvailable("no image directory configured".to_string())
            })?;
            tokio::task::spawn_blocking(move || list_images(&directory))
                .await
                .map_err(|e| BackendError::Other(format!("enumeration task failed: {}", e)))?
        })
    }

    fn open_stream(
        &self,
        device_id: Option<String>,
        feeder: FrameFeeder,
    ) -> BoxFuture<'_, BackendResult<MediaStream>> {
        Box::pin(async move {
            let path = match device_id {
                Some(id) => PathBuf::from(id),
                None => {
                    let devices = self.enumerate_devices().await?;
                    let first = devices.into_iter().next().ok_or_else(|| {
                        BackendError::DeviceNotFound("image directory is empty".to_string())
                    })?;
                    PathBuf::from(first.id)
                }
            };

            let load_path = path.clone();
            let frame = tokio::task::spawn_blocking(move || load_image_as_frame(&load_path))
                .await
                .map_err(|e| BackendError::Other(format!("image load task failed: {}", e)))??;

            let id = path.to_string_lossy().to_string();
            let track = FileSourceTrack::start(&id, frame, feeder);
            Ok(MediaStream::new(id, vec![Box::new(track)]))
        })
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::FileSource
    }
}

/// Sorted list of images in `directory`, one device each
fn list_images(directory: &Path) -> BackendResult<Vec<Device>> {
    let dir_name = directory.display().to_string();
    let entries =
        std::fs::read_dir(directory).map_err(|e| BackendError::from_io(&dir_name, &e))?;

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(file_formats::is_image_extension)
        })
        .collect();
    paths.sort();

    debug!(directory = %dir_name, count = paths.len(), "Enumerated image sources");

    Ok(paths
        .into_iter()
        .map(|path| {
            let label = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string());
            Device::new(path.to_string_lossy(), label)
        })
        .collect())
}

/// Load an image file as a grayscale frame
pub fn load_image_as_frame(path: &Path) -> BackendResult<VideoFrame> {
    info!(path = %path.display(), "Loading image file");

    let img = image::open(path).map_err(|e| match e {
        image::ImageError::IoError(io) => BackendError::from_io(&path.display().to_string(), &io),
        other => BackendError::FormatNotSupported(format!(
            "Failed to load image '{}': {}",
            path.display(),
            other
        )),
    })?;

    let luma = img.to_luma8();
    let width = luma.width();
    let height = luma.height();

    Ok(VideoFrame {
        width,
        height,
        format: PixelFormat::Gray8,
        stride: width,
        data: Arc::from(luma.into_raw()),
        sequence: 0,
        captured_at: Instant::now(),
    })
}

/// Track replaying one frame on a capture loop thread
struct FileSourceTrack {
    label: String,
    capture: CaptureLoopController,
}

impl FileSourceTrack {
    fn start(label: &str, frame: VideoFrame, feeder: FrameFeeder) -> Self {
        let mut sequence = 0u64;
        let capture = CaptureLoopController::start(
            "file-source",
            Some(vc_timing::IMAGE_STREAM_FRAME_DURATION),
            move || {
                sequence += 1;
                let mut next = frame.clone().with_sequence(sequence);
                next.captured_at = Instant::now();
                if feeder.push(next) {
                    LoopAction::Continue
                } else {
                    LoopAction::Stop
                }
            },
        );

        Self {
            label: label.to_string(),
            capture,
        }
    }
}

impl MediaTrack for FileSourceTrack {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_live(&self) -> bool {
        self.capture.is_running()
    }

    fn stop(&mut self) {
        self.capture.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::stream::VideoSink;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "barcode-scanner-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(path: &Path) {
        let img = image::GrayImage::from_pixel(8, 4, image::Luma([200u8]));
        img.save(path).unwrap();
    }

    #[tokio::test]
    async fn test_enumerates_only_images_sorted() {
        let dir = temp_dir("enumerate");
        write_png(&dir.join("b.png"));
        write_png(&dir.join("a.png"));
        std::fs::write(dir.join("notes.txt"), "not an image").unwrap();

        let backend = FileSourceBackend::new(Some(dir.clone()));
        let devices = backend.enumerate_devices().await.unwrap();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].label.as_deref(), Some("a"));
        assert_eq!(devices[1].label.as_deref(), Some("b"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_missing_directory_is_not_available() {
        let backend = FileSourceBackend::new(None);
        assert!(matches!(
            backend.enumerate_devices().await,
            Err(BackendError::NotAvailable(_))
        ));
    }

    #[tokio::test]
    async fn test_open_streams_frames_until_stopped() {
        let dir = temp_dir("stream");
        write_png(&dir.join("code.png"));

        let backend = FileSourceBackend::new(Some(dir.clone()));
        let sink = VideoSink::new();
        let mut stream = backend.open_stream(None, sink.attach()).await.unwrap();

        let mut frames = sink.subscribe();
        frames.changed().await.unwrap();
        let frame = frames.borrow_and_update().clone().unwrap();
        assert_eq!((frame.width, frame.height), (8, 4));
        assert_eq!(stream.active_tracks(), 1);

        stream.stop_all();
        assert_eq!(stream.active_tracks(), 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let err = load_image_as_frame(Path::new("/nonexistent/code.png")).unwrap_err();
        assert!(matches!(err, BackendError::DeviceNotFound(_)));
    }
}
