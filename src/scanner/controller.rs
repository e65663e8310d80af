// SPDX-License-Identifier: GPL-3.0-only

//! Scan lifecycle orchestration
//!
//! [`ScanController`] owns at most one [`CaptureSession`] and one
//! [`DecodeLoop`] at a time. Every `start`, `stop`, `dispose` and pausing
//! detection bumps a generation counter; work started for an older
//! generation (a slow camera open, a decode attempt already in flight)
//! checks the counter before touching shared state and backs out when it
//! has been superseded.
//!
//! Acquisitions are serialized by an async gate, and a new acquisition
//! waits until every in-flight teardown has released its camera. A device
//! is therefore never opened while a previous session still holds it.

use super::catalog::{DeviceCatalog, DeviceListing};
use super::engine::{DecodeEngine, DecodeLoop, DecodeOutcome, DecodePacing};
use super::multi_format_engine::MultiFormatEngine;
use super::session::CaptureSession;
use super::state::{DetectionEvent, ScanEvent, ScanSnapshot, ScanState};
use crate::backends::camera::frame_loop::LoopAction;
use crate::backends::camera::{self, CameraBackend, Device};
use crate::config::Config;
use crate::constants::scanning::EVENT_CHANNEL_CAPACITY;
use crate::errors::{ScanError, ScanResult};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Called once per detection, outside any controller lock
pub type DetectionCallback = Arc<dyn Fn(&DetectionEvent) + Send + Sync>;

/// Continuous barcode scanner bound to one camera backend
///
/// Cheap to clone; all clones drive the same controller.
#[derive(Clone)]
pub struct ScanController {
    shared: Arc<Shared>,
}

/// Configures a [`ScanController`]
pub struct ScanControllerBuilder {
    backend: Arc<dyn CameraBackend>,
    engine: Option<Arc<dyn DecodeEngine>>,
    pause_on_detect: bool,
    pacing: DecodePacing,
    on_detected: Option<DetectionCallback>,
}

impl ScanControllerBuilder {
    /// Decode engine (defaults to [`MultiFormatEngine`])
    pub fn engine(mut self, engine: Arc<dyn DecodeEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Stop after the first detection (default) or keep scanning
    pub fn pause_on_detect(mut self, pause: bool) -> Self {
        self.pause_on_detect = pause;
        self
    }

    pub fn pacing(mut self, pacing: DecodePacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Register the detection callback
    pub fn on_detected<F>(mut self, callback: F) -> Self
    where
        F: Fn(&DetectionEvent) + Send + Sync + 'static,
    {
        self.on_detected = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> ScanController {
        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(MultiFormatEngine::new()) as Arc<dyn DecodeEngine>);
        let (snapshot, _) = watch::channel(ScanSnapshot::default());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        info!(
            backend = %self.backend.backend_type(),
            engine = engine.name(),
            pause_on_detect = self.pause_on_detect,
            "Scan controller created"
        );

        ScanController {
            shared: Arc::new(Shared {
                catalog: DeviceCatalog::new(Arc::clone(&self.backend)),
                backend: self.backend,
                engine: Mutex::new(Some(engine)),
                pause_on_detect: self.pause_on_detect,
                pacing: self.pacing,
                on_detected: self.on_detected,
                inner: Mutex::new(Inner::default()),
                acquisition: tokio::sync::Mutex::new(()),
                releases: ReleaseTracker::new(),
                snapshot,
                events,
            }),
        }
    }
}

impl ScanController {
    pub fn builder(backend: Arc<dyn CameraBackend>) -> ScanControllerBuilder {
        ScanControllerBuilder {
            backend,
            engine: None,
            pause_on_detect: true,
            pacing: DecodePacing::default(),
            on_detected: None,
        }
    }

    /// Controller for the backend, engine and pacing described by `config`
    pub fn from_config(config: &Config) -> ScanControllerBuilder {
        Self::builder(camera::get_backend(config))
            .engine(super::create_engine(
                config.decoder,
                config.max_decode_dimension,
            ))
            .pause_on_detect(config.pause_on_detect)
            .pacing(DecodePacing {
                attempt_interval: config.attempt_interval(),
                success_interval: config.success_interval(),
            })
    }

    /// Begin scanning on `device_id`, or on the platform default
    ///
    /// Supersedes any session or pending start. Acquisition failures are not
    /// returned; they move the controller to [`ScanState::Error`] with the
    /// cause in the snapshot. Only a disposed controller yields `Err`.
    pub async fn start(&self, device_id: Option<String>) -> ScanResult<()> {
        let shared = &self.shared;

        let (generation, previous) = {
            let mut inner = shared.lock_inner();
            if inner.disposed {
                return Err(ScanError::ControllerDisposed);
            }
            inner.generation += 1;
            inner.device_id = device_id.clone();
            inner.error = None;
            if !shared.pause_on_detect {
                inner.last_detection = None;
            }
            if let Some(index) = device_id
                .as_deref()
                .and_then(|id| inner.devices.iter().position(|d| d.id == id))
            {
                inner.selected_index = index;
            }
            let previous = inner.take_active(&shared.releases);
            shared.transition(&mut inner, ScanState::Starting);
            (inner.generation, previous)
        };

        info!(generation, device = ?device_id, "Starting scan");

        if let Some(previous) = previous {
            debug!(generation, "Releasing previous session before acquiring");
            previous.run(shared.engine()).await;
        }

        let acquisition = shared.acquisition.lock().await;
        shared.releases.settled().await;

        if !shared.is_current(generation) {
            debug!(generation, "Start superseded before acquisition");
            return Ok(());
        }

        let session = match CaptureSession::open(shared.backend.as_ref(), device_id).await {
            Ok(session) => session,
            Err(e) => {
                let mut inner = shared.lock_inner();
                if inner.generation != generation {
                    debug!(generation, error = %e, "Ignoring failure of a superseded start");
                    return Ok(());
                }
                warn!(generation, error = %e, "Camera acquisition failed");
                inner.error = Some(e.clone());
                shared.emit(ScanEvent::Failed(e));
                shared.transition(&mut inner, ScanState::Error);
                return Ok(());
            }
        };

        let stale = {
            let mut inner = shared.lock_inner();
            match shared.engine() {
                Some(engine) if inner.generation == generation && !inner.disposed => {
                    let weak = Arc::downgrade(&self.shared);
                    let decode_loop = DecodeLoop::spawn(
                        engine,
                        session.sink(),
                        shared.pacing,
                        generation,
                        move |g, outcome| Shared::on_decode(&weak, g, outcome),
                    );
                    info!(
                        generation,
                        requested = ?session.requested_device(),
                        device = ?session.bound_device(),
                        "Scanning"
                    );
                    inner.session = Some(session);
                    inner.decode_loop = Some(decode_loop);
                    shared.transition(&mut inner, ScanState::Scanning);
                    None
                }
                _ => Some(session),
            }
        };

        // A session handed back lost the race and must be closed
        if let Some(mut stale) = stale {
            debug!(generation, "Camera opened for a superseded start, releasing it");
            stale.close().await;
            return Ok(());
        }

        drop(acquisition);
        self.refresh_after_transition().await;
        Ok(())
    }

    /// Stop scanning and release the camera
    ///
    /// Returns once tracks are stopped, the sink is detached and the engine
    /// has been reset. A no-op when already idle.
    pub async fn stop(&self) -> ScanResult<()> {
        let shared = &self.shared;

        let (generation, teardown) = {
            let mut inner = shared.lock_inner();
            if inner.disposed {
                return Err(ScanError::ControllerDisposed);
            }
            if inner.state == ScanState::Idle && !inner.has_active() {
                return Ok(());
            }
            inner.generation += 1;
            let teardown = inner.take_active(&shared.releases);
            shared.transition(&mut inner, ScanState::Stopping);
            (inner.generation, teardown)
        };

        info!(generation, "Stopping scan");
        if let Some(teardown) = teardown {
            teardown.run(shared.engine()).await;
        }
        shared.releases.settled().await;
        shared.settle_idle(generation);
        self.refresh_after_transition().await;
        Ok(())
    }

    /// Stop, then start on `device_id`
    pub async fn switch_device(&self, device_id: impl Into<String>) -> ScanResult<()> {
        let device_id = device_id.into();
        info!(device = %device_id, "Switching camera");
        self.stop().await?;
        self.start(Some(device_id)).await
    }

    /// Stop, then start on the selected device (or the last requested one)
    pub async fn restart(&self) -> ScanResult<()> {
        let device_id = {
            let inner = self.shared.lock_inner();
            inner
                .devices
                .get(inner.selected_index)
                .map(|d| d.id.clone())
                .or_else(|| inner.device_id.clone())
        };
        self.stop().await?;
        self.start(device_id).await
    }

    /// Move the camera picker to `index` without starting
    pub fn select_device(&self, index: usize) -> ScanResult<Option<Device>> {
        let shared = &self.shared;
        let mut inner = shared.lock_inner();
        if inner.disposed {
            return Err(ScanError::ControllerDisposed);
        }
        let Some(device) = inner.devices.get(index).cloned() else {
            debug!(index, count = inner.devices.len(), "Selection out of range");
            return Ok(None);
        };
        inner.selected_index = index;
        shared.publish(&inner);
        Ok(Some(device))
    }

    /// Switch to the next camera, wrapping around
    ///
    /// Returns `false` when there is nothing to switch to.
    pub async fn next_device(&self) -> ScanResult<bool> {
        let next = {
            let inner = self.shared.lock_inner();
            if inner.disposed {
                return Err(ScanError::ControllerDisposed);
            }
            if inner.devices.len() <= 1 {
                None
            } else {
                let index = (inner.selected_index + 1) % inner.devices.len();
                Some(inner.devices[index].id.clone())
            }
        };

        match next {
            Some(device_id) => {
                self.switch_device(device_id).await?;
                Ok(true)
            }
            None => {
                debug!("Only one camera available, not switching");
                Ok(false)
            }
        }
    }

    /// Dismiss a detection or an error and return to idle
    ///
    /// A pausing teardown that is still releasing the camera finishes in the
    /// background; the next `start` waits for it.
    pub fn acknowledge(&self) -> ScanResult<()> {
        let shared = &self.shared;
        let mut inner = shared.lock_inner();
        if inner.disposed {
            return Err(ScanError::ControllerDisposed);
        }
        match inner.state {
            ScanState::Detected | ScanState::Error => {
                inner.last_detection = None;
                inner.error = None;
                shared.transition(&mut inner, ScanState::Idle);
            }
            state => debug!(%state, "Nothing to acknowledge"),
        }
        Ok(())
    }

    /// Forget the last detection
    pub fn clear_result(&self) -> ScanResult<()> {
        let mut inner = self.shared.lock_inner();
        if inner.disposed {
            return Err(ScanError::ControllerDisposed);
        }
        if inner.last_detection.take().is_some() {
            self.shared.publish(&inner);
        }
        Ok(())
    }

    /// Tear everything down and release the decode engine
    ///
    /// A pending acquisition resolving afterwards closes its camera without
    /// touching state. Every later operation returns
    /// [`ScanError::ControllerDisposed`].
    pub async fn dispose(&self) -> ScanResult<()> {
        let shared = &self.shared;

        let (generation, teardown) = {
            let mut inner = shared.lock_inner();
            if inner.disposed {
                return Err(ScanError::ControllerDisposed);
            }
            inner.disposed = true;
            inner.generation += 1;
            let teardown = inner.take_active(&shared.releases);
            if inner.state != ScanState::Idle {
                shared.transition(&mut inner, ScanState::Stopping);
            } else {
                shared.publish(&inner);
            }
            (inner.generation, teardown)
        };

        info!(generation, "Disposing scan controller");
        if let Some(teardown) = teardown {
            teardown.run(None).await;
        }
        // A pausing detection may still be releasing its camera
        shared.releases.settled().await;

        let engine = shared
            .engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(engine) = engine {
            engine.reset();
            debug!(engine = engine.name(), "Released decode engine");
        }

        let mut inner = shared.lock_inner();
        inner.error = None;
        shared.transition(&mut inner, ScanState::Idle);
        Ok(())
    }

    /// Re-enumerate cameras and publish the result
    ///
    /// An enumeration failure is reported in the listing, not as `Err`.
    pub async fn refresh_devices(&self) -> ScanResult<DeviceListing> {
        if self.is_disposed() {
            return Err(ScanError::ControllerDisposed);
        }
        let listing = self.shared.catalog.list_devices().await;

        let mut inner = self.shared.lock_inner();
        if inner.disposed {
            return Err(ScanError::ControllerDisposed);
        }

        let changed = inner.devices != listing.devices;
        inner.devices = listing.devices.clone();
        inner.enumeration_error = listing.failure.clone();
        inner.selected_index = match inner.devices.len() {
            0 => 0,
            n => inner.selected_index.min(n - 1),
        };
        if changed {
            self.shared
                .emit(ScanEvent::DevicesChanged(inner.devices.clone()));
        }
        self.shared.publish(&inner);
        Ok(listing)
    }

    /// Pick up labels that appear once a camera has been opened
    async fn refresh_after_transition(&self) {
        if let Err(e) = self.refresh_devices().await {
            debug!(error = %e, "Skipping device refresh");
        }
    }

    /// Current state and everything around it
    pub fn snapshot(&self) -> ScanSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    pub fn state(&self) -> ScanState {
        self.shared.lock_inner().state
    }

    /// Follow snapshots as they change
    pub fn watch(&self) -> watch::Receiver<ScanSnapshot> {
        self.shared.snapshot.subscribe()
    }

    /// Receive discrete events (transitions, detections, failures)
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.shared.events.subscribe()
    }

    /// Device the open session is bound to, if any
    pub fn active_device(&self) -> Option<String> {
        self.shared
            .lock_inner()
            .session
            .as_ref()
            .and_then(|s| s.bound_device().map(str::to_string))
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.lock_inner().disposed
    }
}

impl std::fmt::Debug for ScanController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock_inner();
        f.debug_struct("ScanController")
            .field("state", &inner.state)
            .field("generation", &inner.generation)
            .field("session", &inner.session)
            .field("disposed", &inner.disposed)
            .finish()
    }
}

struct Shared {
    backend: Arc<dyn CameraBackend>,
    catalog: DeviceCatalog,
    engine: Mutex<Option<Arc<dyn DecodeEngine>>>,
    pause_on_detect: bool,
    pacing: DecodePacing,
    on_detected: Option<DetectionCallback>,
    inner: Mutex<Inner>,
    /// Held for the duration of every camera open
    acquisition: tokio::sync::Mutex<()>,
    releases: ReleaseTracker,
    snapshot: watch::Sender<ScanSnapshot>,
    events: broadcast::Sender<ScanEvent>,
}

#[derive(Default)]
struct Inner {
    state: ScanState,
    generation: u64,
    device_id: Option<String>,
    devices: Vec<Device>,
    selected_index: usize,
    last_detection: Option<DetectionEvent>,
    error: Option<ScanError>,
    enumeration_error: Option<ScanError>,
    session: Option<CaptureSession>,
    decode_loop: Option<DecodeLoop>,
    disposed: bool,
}

impl Inner {
    fn has_active(&self) -> bool {
        self.session.is_some() || self.decode_loop.is_some()
    }

    /// Move the live session and decode loop out for release
    fn take_active(&mut self, releases: &ReleaseTracker) -> Option<Teardown> {
        if !self.has_active() {
            return None;
        }
        Some(Teardown {
            session: self.session.take(),
            decode_loop: self.decode_loop.take(),
            _pending: releases.begin(),
        })
    }

    fn snapshot(&self) -> ScanSnapshot {
        ScanSnapshot {
            state: self.state,
            device_id: self.device_id.clone(),
            devices: self.devices.clone(),
            selected_index: self.selected_index,
            last_detection: self.last_detection.clone(),
            error: self.error.clone(),
            enumeration_error: self.enumeration_error.clone(),
            generation: self.generation,
            disposed: self.disposed,
        }
    }
}

impl Shared {
    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn engine(&self) -> Option<Arc<dyn DecodeEngine>> {
        self.engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_current(&self, generation: u64) -> bool {
        let inner = self.lock_inner();
        inner.generation == generation && !inner.disposed
    }

    fn publish(&self, inner: &Inner) {
        self.snapshot.send_replace(inner.snapshot());
    }

    fn emit(&self, event: ScanEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    fn transition(&self, inner: &mut Inner, to: ScanState) {
        let from = inner.state;
        if from != to {
            inner.state = to;
            debug!(%from, %to, generation = inner.generation, "Scan state changed");
            self.emit(ScanEvent::StateChanged { from, to });
        }
        self.publish(inner);
    }

    /// Finish a stop or a pausing detection, unless something newer took over
    fn settle_idle(&self, generation: u64) {
        let mut inner = self.lock_inner();
        if inner.generation != generation {
            debug!(generation, current = inner.generation, "Teardown superseded");
            return;
        }
        if matches!(inner.state, ScanState::Stopping | ScanState::Detected) {
            inner.error = None;
            self.transition(&mut inner, ScanState::Idle);
        }
    }

    fn on_decode(weak: &Weak<Shared>, generation: u64, outcome: DecodeOutcome) -> LoopAction {
        match weak.upgrade() {
            Some(shared) => shared.handle_decode(generation, outcome),
            None => LoopAction::Stop,
        }
    }

    /// Apply one decode attempt made for `generation`
    fn handle_decode(self: &Arc<Self>, generation: u64, outcome: DecodeOutcome) -> LoopAction {
        match outcome {
            DecodeOutcome::NoResult => {
                if self.is_current(generation) {
                    LoopAction::Continue
                } else {
                    LoopAction::Stop
                }
            }
            DecodeOutcome::Detected(payload) => self.handle_detection(generation, payload),
            DecodeOutcome::Fault(message) => {
                let (next_generation, teardown) = {
                    let mut inner = self.lock_inner();
                    if inner.generation != generation
                        || inner.disposed
                        || inner.state != ScanState::Scanning
                    {
                        return LoopAction::Stop;
                    }
                    warn!(generation, error = %message, "Decode engine fault");
                    let error = ScanError::DecodeEngineFault(message);
                    inner.error = Some(error.clone());
                    inner.generation += 1;
                    let teardown = inner.take_active(&self.releases);
                    self.emit(ScanEvent::Failed(error));
                    self.transition(&mut inner, ScanState::Error);
                    (inner.generation, teardown)
                };
                self.spawn_teardown(next_generation, teardown);
                LoopAction::Stop
            }
        }
    }

    fn handle_detection(self: &Arc<Self>, generation: u64, payload: String) -> LoopAction {
        let (event, paused) = {
            let mut inner = self.lock_inner();
            if inner.generation != generation
                || inner.disposed
                || inner.state != ScanState::Scanning
            {
                debug!(generation, "Discarding detection from a superseded scan");
                return LoopAction::Stop;
            }

            let event = DetectionEvent::new(payload, generation);
            inner.last_detection = Some(event.clone());
            self.emit(ScanEvent::Detected(event.clone()));

            if self.pause_on_detect {
                inner.generation += 1;
                let teardown = inner.take_active(&self.releases);
                self.transition(&mut inner, ScanState::Detected);
                (event, Some((inner.generation, teardown)))
            } else {
                self.publish(&inner);
                (event, None)
            }
        };

        info!(generation, payload = %event.payload, "Barcode detected");
        if let Some(callback) = &self.on_detected {
            callback(&event);
        }

        match paused {
            Some((next_generation, teardown)) => {
                self.spawn_teardown(next_generation, teardown);
                LoopAction::Stop
            }
            None => LoopAction::Continue,
        }
    }

    /// Release a session from inside the decode loop without blocking it
    fn spawn_teardown(self: &Arc<Self>, generation: u64, teardown: Option<Teardown>) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            if let Some(teardown) = teardown {
                teardown.run(shared.engine()).await;
            }
            shared.settle_idle(generation);
            let controller = ScanController { shared };
            controller.refresh_after_transition().await;
        });
    }
}

/// A session and decode loop on their way out
struct Teardown {
    session: Option<CaptureSession>,
    decode_loop: Option<DecodeLoop>,
    _pending: ReleaseGuard,
}

impl Teardown {
    async fn run(mut self, engine: Option<Arc<dyn DecodeEngine>>) {
        if let Some(mut decode_loop) = self.decode_loop.take() {
            decode_loop.shutdown().await;
            debug!(generation = decode_loop.generation(), "Decode loop stopped");
        }
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
        if let Some(engine) = engine {
            engine.reset();
        }
    }
}

/// Counts teardowns whose camera has not been released yet
struct ReleaseTracker {
    pending: Arc<watch::Sender<usize>>,
}

impl ReleaseTracker {
    fn new() -> Self {
        let (pending, _) = watch::channel(0);
        Self {
            pending: Arc::new(pending),
        }
    }

    fn begin(&self) -> ReleaseGuard {
        self.pending.send_modify(|n| *n += 1);
        ReleaseGuard {
            pending: Arc::clone(&self.pending),
        }
    }

    /// Wait until no teardown is in flight
    async fn settled(&self) {
        let mut rx = self.pending.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

struct ReleaseGuard {
    pending: Arc<watch::Sender<usize>>,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.pending.send_modify(|n| *n = n.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{
        BackendError, BackendResult, CameraBackendType, FrameFeeder, MediaStream,
    };
    use futures::future::BoxFuture;

    struct NoCameraBackend;

    impl CameraBackend for NoCameraBackend {
        fn enumerate_devices(&self) -> BoxFuture<'_, BackendResult<Vec<Device>>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn open_stream(
            &self,
            _device_id: Option<String>,
            _feeder: FrameFeeder,
        ) -> BoxFuture<'_, BackendResult<MediaStream>> {
            Box::pin(async { Err(BackendError::DeviceNotFound("no camera".into())) })
        }

        fn backend_type(&self) -> CameraBackendType {
            CameraBackendType::FileSource
        }
    }

    fn controller() -> ScanController {
        ScanController::builder(Arc::new(NoCameraBackend)).build()
    }

    #[tokio::test]
    async fn test_stale_detection_never_mutates_state() {
        let controller = controller();
        {
            let mut inner = controller.shared.lock_inner();
            inner.generation = 5;
            inner.state = ScanState::Scanning;
        }
        let before = controller.shared.lock_inner().snapshot();

        let action = controller
            .shared
            .handle_decode(4, DecodeOutcome::Detected("old".into()));
        assert_eq!(action, LoopAction::Stop);
        let action = controller
            .shared
            .handle_decode(4, DecodeOutcome::Fault("old".into()));
        assert_eq!(action, LoopAction::Stop);

        let after = controller.shared.lock_inner().snapshot();
        assert_eq!(before, after);
        assert!(after.last_detection.is_none());
    }

    #[tokio::test]
    async fn test_no_result_continues_only_for_current_generation() {
        let controller = controller();
        controller.shared.lock_inner().generation = 2;

        assert_eq!(
            controller.shared.handle_decode(2, DecodeOutcome::NoResult),
            LoopAction::Continue
        );
        assert_eq!(
            controller.shared.handle_decode(1, DecodeOutcome::NoResult),
            LoopAction::Stop
        );
    }

    #[tokio::test]
    async fn test_open_failure_moves_to_error() {
        let controller = controller();
        controller.start(None).await.unwrap();

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.state, ScanState::Error);
        assert!(matches!(
            snapshot.error,
            Some(ScanError::DeviceUnavailable(_))
        ));

        controller.acknowledge().unwrap();
        assert_eq!(controller.state(), ScanState::Idle);
        assert!(controller.snapshot().error.is_none());
    }

    #[tokio::test]
    async fn test_release_tracker_settles_after_guards_drop() {
        let tracker = ReleaseTracker::new();
        let guard = tracker.begin();
        let second = tracker.begin();
        drop(guard);
        assert_eq!(*tracker.pending.borrow(), 1);
        drop(second);
        tracker.settled().await;
        assert_eq!(*tracker.pending.borrow(), 0);
    }
}
