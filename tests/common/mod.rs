// SPDX-License-Identifier: GPL-3.0-only

//! Scripted camera backend and decode engine for controller tests

#![allow(dead_code)]

use barcode_scanner::backends::camera::{
    BackendError, BackendResult, CameraBackend, CameraBackendType, Device, FrameFeeder,
    MediaStream, MediaTrack, VideoFrame,
};
use barcode_scanner::scanner::{DecodeEngine, EngineError};
use barcode_scanner::{ScanController, ScanEvent, ScanSnapshot};
use futures::future::BoxFuture;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, broadcast};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// In-memory cameras with controllable open latency and failures
#[derive(Default)]
pub struct ScriptedBackend {
    devices: Mutex<Vec<Device>>,
    enumeration_failure: Mutex<Option<BackendError>>,
    held: Mutex<HashMap<String, Arc<Notify>>>,
    failing: Mutex<HashMap<String, BackendError>>,
    tracks: Mutex<Vec<(String, Arc<AtomicBool>)>>,
    opens_started: AtomicUsize,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn with_devices(ids: &[&str]) -> Arc<Self> {
        let backend = Self::default();
        backend.set_devices(ids);
        Arc::new(backend)
    }

    pub fn set_devices(&self, ids: &[&str]) {
        *self.devices.lock().unwrap() = ids
            .iter()
            .map(|id| Device::new(*id, Some(format!("Camera {}", id))))
            .collect();
    }

    /// Opens of `device` block until `release` is called
    pub fn hold(&self, device: &str) {
        self.held
            .lock()
            .unwrap()
            .insert(device.to_string(), Arc::new(Notify::new()));
    }

    pub fn release(&self, device: &str) {
        if let Some(gate) = self.held.lock().unwrap().remove(device) {
            gate.notify_one();
        }
    }

    pub fn fail_open(&self, device: &str, error: BackendError) {
        self.failing
            .lock()
            .unwrap()
            .insert(device.to_string(), error);
    }

    pub fn fail_enumeration(&self, error: BackendError) {
        *self.enumeration_failure.lock().unwrap() = Some(error);
    }

    pub fn opens_started(&self) -> usize {
        self.opens_started.load(Ordering::SeqCst)
    }

    /// Streams with at least one live track
    pub fn live_streams(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live_streams(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn is_live(&self, device: &str) -> bool {
        self.tracks
            .lock()
            .unwrap()
            .iter()
            .any(|(id, live)| id == device && live.load(Ordering::SeqCst))
    }
}

impl CameraBackend for ScriptedBackend {
    fn enumerate_devices(&self) -> BoxFuture<'_, BackendResult<Vec<Device>>> {
        Box::pin(async move {
            if let Some(error) = self.enumeration_failure.lock().unwrap().clone() {
                return Err(error);
            }
            Ok(self.devices.lock().unwrap().clone())
        })
    }

    fn open_stream(
        &self,
        device_id: Option<String>,
        feeder: FrameFeeder,
    ) -> BoxFuture<'_, BackendResult<MediaStream>> {
        Box::pin(async move {
            let id = device_id.unwrap_or_else(|| {
                self.devices
                    .lock()
                    .unwrap()
                    .first()
                    .map(|d| d.id.clone())
                    .unwrap_or_else(|| "default".to_string())
            });
            self.opens_started.fetch_add(1, Ordering::SeqCst);

            let gate = self.held.lock().unwrap().get(&id).cloned();
            if let Some(gate) = gate {
                gate.notified().await;
            }

            let failure = self.failing.lock().unwrap().get(&id).cloned();
            if let Some(error) = failure {
                return Err(error);
            }

            let live = Arc::new(AtomicBool::new(true));
            let now_live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_live.fetch_max(now_live, Ordering::SeqCst);
            self.tracks
                .lock()
                .unwrap()
                .push((id.clone(), Arc::clone(&live)));

            let producer_live = Arc::clone(&live);
            tokio::spawn(async move {
                let mut sequence = 0u64;
                while producer_live.load(Ordering::SeqCst) {
                    sequence += 1;
                    let frame = VideoFrame::gray(4, 4, vec![(sequence % 251) as u8; 16])
                        .with_sequence(sequence);
                    if !feeder.push(frame) {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
            });

            let track = ScriptedTrack {
                label: id.clone(),
                live,
                live_streams: Arc::clone(&self.live),
            };
            Ok(MediaStream::new(id, vec![Box::new(track)]))
        })
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::FileSource
    }
}

struct ScriptedTrack {
    label: String,
    live: Arc<AtomicBool>,
    live_streams: Arc<AtomicUsize>,
}

impl MediaTrack for ScriptedTrack {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        if self.live.swap(false, Ordering::SeqCst) {
            self.live_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Engine that replays a script of results, then a fallback forever
pub struct ScriptedEngine {
    script: Mutex<VecDeque<Result<Option<String>, EngineError>>>,
    fallback: Result<Option<String>, EngineError>,
    calls: AtomicUsize,
    resets: AtomicUsize,
}

impl ScriptedEngine {
    fn new(
        script: VecDeque<Result<Option<String>, EngineError>>,
        fallback: Result<Option<String>, EngineError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            fallback,
            calls: AtomicUsize::new(0),
            resets: AtomicUsize::new(0),
        })
    }

    pub fn never() -> Arc<Self> {
        Self::new(VecDeque::new(), Ok(None))
    }

    /// `misses` empty frames, one hit, then nothing
    pub fn hit_after(misses: usize, payload: &str) -> Arc<Self> {
        let mut script: VecDeque<_> = (0..misses).map(|_| Ok(None)).collect();
        script.push_back(Ok(Some(payload.to_string())));
        Self::new(script, Ok(None))
    }

    /// Every frame decodes to `payload`
    pub fn always(payload: &str) -> Arc<Self> {
        Self::new(VecDeque::new(), Ok(Some(payload.to_string())))
    }

    /// `misses` empty frames, then an internal error on every frame
    pub fn fault_after(misses: usize, message: &str) -> Arc<Self> {
        let script = (0..misses).map(|_| Ok(None)).collect();
        Self::new(script, Err(EngineError::Internal(message.to_string())))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

impl DecodeEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn decode(&self, _frame: &VideoFrame) -> Result<Option<String>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Wait until the published snapshot satisfies `predicate`
pub async fn wait_for_snapshot<F>(controller: &ScanController, predicate: F) -> ScanSnapshot
where
    F: FnMut(&ScanSnapshot) -> bool,
{
    let mut rx = controller.watch();
    let snapshot = tokio::time::timeout(TIMEOUT, rx.wait_for(predicate))
        .await
        .expect("timed out waiting for controller state")
        .expect("controller dropped")
        .clone();
    snapshot
}

/// Poll `condition` until it holds
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition never became true");
}

/// Everything currently buffered on an event receiver
pub fn drain_events(rx: &mut broadcast::Receiver<ScanEvent>) -> Vec<ScanEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}
