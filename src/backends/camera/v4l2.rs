// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera backend
//!
//! Enumerates `/dev/video*` capture nodes and streams frames from them with
//! the v4l crate. Each open stream owns one capture thread; the device file
//! and its mmap buffers live on that thread and are released when it exits.

use super::CameraBackend;
use super::stream::{FrameFeeder, MediaStream, MediaTrack};
use super::types::{
    BackendError, BackendResult, CameraBackendType, Device, PixelFormat, VideoFrame,
};
use crate::constants::capture;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use v4l::Device as V4lDevice;
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Format, FourCC};

/// Backend for Video4Linux2 capture devices
#[derive(Debug, Clone)]
pub struct V4l2Backend {
    width: u32,
    height: u32,
}

impl V4l2Backend {
    /// Create a backend requesting `width`x`height` from devices
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl CameraBackend for V4l2Backend {
    fn enumerate_devices(&self) -> BoxFuture<'_, BackendResult<Vec<Device>>> {
        Box::pin(async move {
            tokio::task::spawn_blocking(enumerate_capture_nodes)
                .await
                .map_err(|e| BackendError::Other(format!("enumeration task failed: {}", e)))
        })
    }

    fn open_stream(
        &self,
        device_id: Option<String>,
        feeder: FrameFeeder,
    ) -> BoxFuture<'_, BackendResult<MediaStream>> {
        let width = self.width;
        let height = self.height;

        Box::pin(async move {
            let (ready_tx, ready_rx) = oneshot::channel();
            let running = Arc::new(AtomicBool::new(true));
            let running_clone = Arc::clone(&running);

            let thread_handle = std::thread::spawn(move || {
                capture_thread(device_id, width, height, feeder, running_clone, ready_tx)
            });

            match ready_rx.await {
                Ok(Ok(path)) => {
                    let track = V4l2Track {
                        path: path.clone(),
                        running,
                        thread_handle: Some(thread_handle),
                    };
                    Ok(MediaStream::new(path, vec![Box::new(track)]))
                }
                Ok(Err(e)) => Err(e),
                Err(_) => Err(BackendError::Other(
                    "capture thread exited before the device was ready".to_string(),
                )),
            }
        })
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }
}

/// List every node that can capture video
///
/// Nodes we are not allowed to open are still listed, without a label,
/// so the user can see that a camera exists and fix its permissions.
fn enumerate_capture_nodes() -> Vec<Device> {
    let mut nodes = v4l::context::enum_devices();
    nodes.sort_by_key(|node| node.index());

    let mut devices = Vec::new();
    for node in nodes {
        let path = node.path().to_string_lossy().to_string();
        match V4lDevice::with_path(node.path()) {
            Ok(dev) => match dev.query_caps() {
                Ok(caps) if caps.capabilities.contains(Flags::VIDEO_CAPTURE) => {
                    devices.push(Device::new(path, Some(caps.card)));
                }
                Ok(_) => debug!(path = %path, "Skipping node without video capture"),
                Err(e) => {
                    debug!(path = %path, error = %e, "Could not query capabilities");
                    devices.push(Device::new(path, node.name()));
                }
            },
            Err(e) => {
                debug!(path = %path, error = %e, "Could not open node for enumeration");
                devices.push(Device::new(path, None));
            }
        }
    }

    info!(count = devices.len(), "Enumerated V4L2 capture devices");
    devices
}

/// First node that opens and reports video capture
fn default_capture_node() -> Option<String> {
    let mut nodes = v4l::context::enum_devices();
    nodes.sort_by_key(|node| node.index());

    nodes.into_iter().find_map(|node| {
        let dev = V4lDevice::with_path(node.path()).ok()?;
        let caps = dev.query_caps().ok()?;
        caps.capabilities
            .contains(Flags::VIDEO_CAPTURE)
            .then(|| node.path().to_string_lossy().to_string())
    })
}

/// Pick the first preferred format the device accepts
fn negotiate_format(
    dev: &mut V4lDevice,
    path: &str,
    width: u32,
    height: u32,
) -> BackendResult<Format> {
    for fourcc in capture::PREFERRED_FOURCCS {
        let wanted = FourCC::new(fourcc);
        let request = Format::new(width, height, wanted);
        match dev.set_format(&request) {
            Ok(applied) if applied.fourcc == wanted => {
                info!(
                    path,
                    width = applied.width,
                    height = applied.height,
                    fourcc = %applied.fourcc,
                    "Negotiated capture format"
                );
                return Ok(applied);
            }
            Ok(applied) => {
                debug!(path, wanted = %wanted, got = %applied.fourcc, "Format not accepted");
            }
            Err(e) => return Err(BackendError::from_io(path, &e)),
        }
    }

    Err(BackendError::FormatNotSupported(format!(
        "{} offers none of YUYV, GREY, MJPG",
        path
    )))
}

/// Open the device, report readiness, then capture until stopped
fn capture_thread(
    device_id: Option<String>,
    width: u32,
    height: u32,
    feeder: FrameFeeder,
    running: Arc<AtomicBool>,
    ready: oneshot::Sender<BackendResult<String>>,
) {
    let path = match device_id.or_else(default_capture_node) {
        Some(path) => path,
        None => {
            let _ = ready.send(Err(BackendError::DeviceNotFound(
                "no V4L2 capture device".to_string(),
            )));
            return;
        }
    };

    info!(path = %path, "Opening V4L2 device");

    let mut dev = match V4lDevice::with_path(&path) {
        Ok(dev) => dev,
        Err(e) => {
            let _ = ready.send(Err(BackendError::from_io(&path, &e)));
            return;
        }
    };

    let format = match negotiate_format(&mut dev, &path, width, height) {
        Ok(format) => format,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let mut stream =
        match MmapStream::with_buffers(&mut dev, Type::VideoCapture, capture::V4L2_BUFFER_COUNT) {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready.send(Err(BackendError::from_io(&path, &e)));
                return;
            }
        };

    // A camera that stops delivering (unplugged, stalled) must not pin this
    // thread in DQBUF, or stopping the track would never return
    stream.set_timeout(capture::V4L2_DEQUEUE_TIMEOUT);

    if ready.send(Ok(path.clone())).is_err() {
        // Nobody is waiting for this stream any more
        debug!(path = %path, "Open was abandoned, releasing device");
        return;
    }

    info!(path = %path, "V4L2 capture stream started");

    let mut sequence = 0u64;
    while running.load(Ordering::SeqCst) && feeder.is_attached() {
        match stream.next() {
            Ok((buf, _meta)) => {
                sequence += 1;
                let Some(frame) = convert_frame(buf, &format, sequence) else {
                    continue;
                };
                if !feeder.push(frame) {
                    debug!(path = %path, "Sink detached, ending capture");
                    break;
                }
            }
            Err(e) => match classify_dequeue_error(&e) {
                DequeueError::Timeout => {
                    debug!(path = %path, "No frame within timeout");
                }
                DequeueError::DeviceGone => {
                    warn!(path = %path, error = %e, "Camera disappeared, ending capture");
                    break;
                }
                DequeueError::Transient => {
                    warn!(path = %path, error = %e, "Failed to capture frame");
                    std::thread::sleep(Duration::from_millis(10));
                }
            },
        }
    }

    info!(path = %path, frames = sequence, "V4L2 capture loop ended");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DequeueError {
    /// No frame arrived within the stream timeout
    Timeout,
    /// The device node is gone
    DeviceGone,
    /// Anything else; worth retrying
    Transient,
}

fn classify_dequeue_error(e: &std::io::Error) -> DequeueError {
    if e.kind() == std::io::ErrorKind::TimedOut {
        return DequeueError::Timeout;
    }
    match e.raw_os_error() {
        Some(libc::ENODEV) | Some(libc::ENXIO) => DequeueError::DeviceGone,
        _ => DequeueError::Transient,
    }
}

/// Wrap a raw buffer as a frame, decoding MJPEG to grayscale
fn convert_frame(buf: &[u8], format: &Format, sequence: u64) -> Option<VideoFrame> {
    let captured_at = Instant::now();
    let fourcc = format.fourcc.str().unwrap_or_default();

    if fourcc == "MJPG" {
        let decoded = match image::load_from_memory_with_format(buf, image::ImageFormat::Jpeg) {
            Ok(img) => img.to_luma8(),
            Err(e) => {
                debug!(sequence, error = %e, "Dropping undecodable MJPEG frame");
                return None;
            }
        };
        let (width, height) = decoded.dimensions();
        return Some(VideoFrame {
            width,
            height,
            format: PixelFormat::Gray8,
            stride: width,
            data: Arc::from(decoded.into_raw()),
            sequence,
            captured_at,
        });
    }

    let Some(pixel_format) = PixelFormat::from_fourcc(fourcc) else {
        error!(fourcc, "Negotiated a format the converter does not handle");
        return None;
    };
    let min_stride = format.width * pixel_format.bytes_per_pixel() as u32;

    Some(VideoFrame {
        width: format.width,
        height: format.height,
        format: pixel_format,
        stride: format.stride.max(min_stride),
        data: Arc::from(buf),
        sequence,
        captured_at,
    })
}

/// The capture thread of one open V4L2 stream
struct V4l2Track {
    path: String,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MediaTrack for V4l2Track {
    fn label(&self) -> &str {
        &self.path
    }

    fn is_live(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            match handle.join() {
                Ok(()) => info!(path = %self.path, "Capture thread stopped"),
                Err(_) => warn!(path = %self.path, "Capture thread panicked"),
            }
        }
    }
}
