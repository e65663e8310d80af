// SPDX-License-Identifier: GPL-3.0-only

//! Live media streams and the video sink they feed
//!
//! A backend answers `open_stream` with a [`MediaStream`]: a bundle of
//! [`MediaTrack`]s (usually one capture thread) that push frames into a
//! [`FrameFeeder`]. The feeder writes into a [`VideoSink`], a latest-frame
//! slot that the decode loop watches. Stopping tracks and detaching the sink
//! are both idempotent so teardown can be reached from several paths.

use super::types::VideoFrame;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Contents of the sink: the most recent frame, or nothing
pub type FrameSlot = Option<Arc<VideoFrame>>;

/// One producer of frames inside a stream
pub trait MediaTrack: Send {
    /// Name for logging
    fn label(&self) -> &str;

    /// Whether the track is still producing
    fn is_live(&self) -> bool;

    /// Stop producing and release the underlying hardware
    ///
    /// May block while a capture thread winds down. Calling it on a stopped
    /// track must be a no-op.
    fn stop(&mut self);
}

/// A live media stream handle returned by a backend
pub struct MediaStream {
    device_id: String,
    tracks: Vec<Box<dyn MediaTrack>>,
}

impl MediaStream {
    pub fn new(device_id: impl Into<String>, tracks: Vec<Box<dyn MediaTrack>>) -> Self {
        Self {
            device_id: device_id.into(),
            tracks,
        }
    }

    /// Device the stream was opened on
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Number of tracks still producing frames
    pub fn active_tracks(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_live()).count()
    }

    /// Stop every live track
    pub fn stop_all(&mut self) {
        for track in self.tracks.iter_mut() {
            if track.is_live() {
                debug!(device = %self.device_id, track = track.label(), "Stopping track");
                track.stop();
            }
        }
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        if self.active_tracks() > 0 {
            warn!(device = %self.device_id, "Media stream dropped with live tracks, stopping them");
            self.stop_all();
        }
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("device_id", &self.device_id)
            .field("tracks", &self.tracks.len())
            .field("active", &self.active_tracks())
            .finish()
    }
}

struct SinkShared {
    slot: watch::Sender<FrameSlot>,
    attached: AtomicBool,
    delivered: AtomicU64,
}

/// Latest-frame slot a stream renders into
///
/// Cloning yields another handle to the same sink.
#[derive(Clone)]
pub struct VideoSink {
    shared: Arc<SinkShared>,
}

impl Default for VideoSink {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoSink {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            shared: Arc::new(SinkShared {
                slot,
                attached: AtomicBool::new(false),
                delivered: AtomicU64::new(0),
            }),
        }
    }

    /// Mark the sink as bound to a stream and hand out the producer side
    pub fn attach(&self) -> FrameFeeder {
        self.shared.attached.store(true, Ordering::SeqCst);
        FrameFeeder {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Unbind the sink and clear the displayed frame
    ///
    /// Returns `false` if the sink was already detached.
    pub fn detach(&self) -> bool {
        let was_attached = self.shared.attached.swap(false, Ordering::SeqCst);
        if was_attached {
            self.shared.slot.send_replace(None);
        }
        was_attached
    }

    pub fn is_attached(&self) -> bool {
        self.shared.attached.load(Ordering::SeqCst)
    }

    /// Watch for new frames
    pub fn subscribe(&self) -> watch::Receiver<FrameSlot> {
        self.shared.slot.subscribe()
    }

    /// Most recent frame, if any
    pub fn latest(&self) -> FrameSlot {
        self.shared.slot.borrow().clone()
    }

    /// Frames pushed since creation
    pub fn frames_delivered(&self) -> u64 {
        self.shared.delivered.load(Ordering::Relaxed)
    }
}

/// Producer handle given to a backend when a stream is opened
#[derive(Clone)]
pub struct FrameFeeder {
    shared: Arc<SinkShared>,
}

impl FrameFeeder {
    /// Publish a frame
    ///
    /// Returns `false` once the sink has been detached; producers should stop.
    pub fn push(&self, frame: VideoFrame) -> bool {
        if !self.shared.attached.load(Ordering::SeqCst) {
            return false;
        }
        self.shared.slot.send_replace(Some(Arc::new(frame)));
        self.shared.delivered.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn is_attached(&self) -> bool {
        self.shared.attached.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingTrack {
        live: bool,
        stops: Arc<AtomicU64>,
    }

    impl MediaTrack for CountingTrack {
        fn label(&self) -> &str {
            "counting"
        }

        fn is_live(&self) -> bool {
            self.live
        }

        fn stop(&mut self) {
            self.live = false;
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_feeder_rejects_after_detach() {
        let sink = VideoSink::new();
        let feeder = sink.attach();
        assert!(feeder.push(VideoFrame::gray(1, 1, vec![0])));
        assert!(sink.latest().is_some());

        assert!(sink.detach());
        assert!(!sink.detach());
        assert!(sink.latest().is_none());
        assert!(!feeder.push(VideoFrame::gray(1, 1, vec![0])));
        assert_eq!(sink.frames_delivered(), 1);
    }

    #[test]
    fn test_stop_all_only_stops_live_tracks() {
        let stops = Arc::new(AtomicU64::new(0));
        let mut stream = MediaStream::new(
            "cam-1",
            vec![Box::new(CountingTrack {
                live: true,
                stops: Arc::clone(&stops),
            })],
        );
        assert_eq!(stream.active_tracks(), 1);
        stream.stop_all();
        stream.stop_all();
        assert_eq!(stream.active_tracks(), 0);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_stops_live_tracks() {
        let stops = Arc::new(AtomicU64::new(0));
        drop(MediaStream::new(
            "cam-1",
            vec![Box::new(CountingTrack {
                live: true,
                stops: Arc::clone(&stops),
            })],
        ));
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }
}
