// SPDX-License-Identifier: GPL-3.0-only

//! Decode engine abstraction and the continuous decode loop
//!
//! The engine itself is a black box: given a frame it either finds a payload
//! or it does not. [`DecodeLoop`] turns it into a continuous scanner by
//! feeding it every new frame from a [`VideoSink`] and reporting each
//! attempt to a callback tagged with the generation it was started for.

use crate::backends::camera::frame_loop::LoopAction;
use crate::backends::camera::{VideoFrame, VideoSink};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Errors raised inside a decode engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The frame cannot be decoded at all (zero size, truncated data)
    InvalidFrame(String),
    /// The engine failed internally
    Internal(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
            EngineError::Internal(msg) => write!(f, "Engine failure: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

/// Something that extracts a barcode payload from a frame
///
/// Implementations are CPU-bound and are always called from the blocking pool.
pub trait DecodeEngine: Send + Sync {
    /// Name for logging
    fn name(&self) -> &str;

    /// Attempt to decode one frame; `Ok(None)` means nothing was found
    fn decode(&self, frame: &VideoFrame) -> Result<Option<String>, EngineError>;

    /// Drop any per-stream state
    ///
    /// Called on every teardown, after the last decode of the old session has
    /// returned.
    fn reset(&self) {}
}

/// Which decode engine to build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecoderKind {
    /// EAN, UPC, Code 128, QR and the other formats rxing reads
    #[default]
    MultiFormat,
    /// QR codes only, via rqrr
    Qr,
}

impl fmt::Display for DecoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderKind::MultiFormat => write!(f, "multi-format"),
            DecoderKind::Qr => write!(f, "QR"),
        }
    }
}

/// Result of one decode attempt, as seen by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Nothing found in this frame
    NoResult,
    /// A payload was decoded
    Detected(String),
    /// The engine reported an error
    Fault(String),
}

/// Delays applied between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodePacing {
    /// After an attempt that found nothing
    pub attempt_interval: Duration,
    /// After a detection, when scanning continues
    pub success_interval: Duration,
}

impl DecodePacing {
    /// No delays; every new frame is decoded
    pub const IMMEDIATE: DecodePacing = DecodePacing {
        attempt_interval: Duration::ZERO,
        success_interval: Duration::ZERO,
    };
}

impl Default for DecodePacing {
    fn default() -> Self {
        Self {
            attempt_interval: crate::constants::scanning::ATTEMPT_INTERVAL,
            success_interval: crate::constants::scanning::SUCCESS_INTERVAL,
        }
    }
}

/// A running decode task bound to one sink
pub struct DecodeLoop {
    task: Option<JoinHandle<()>>,
    generation: u64,
    /// Held by the blocking decode in flight
    busy: Arc<Mutex<()>>,
}

impl DecodeLoop {
    /// Start decoding frames from `sink`
    ///
    /// `on_outcome` receives `generation` with every attempt and decides
    /// whether the loop keeps going. The loop also ends when the sink is
    /// detached.
    pub fn spawn<F>(
        engine: Arc<dyn DecodeEngine>,
        sink: &VideoSink,
        pacing: DecodePacing,
        generation: u64,
        on_outcome: F,
    ) -> Self
    where
        F: Fn(u64, DecodeOutcome) -> LoopAction + Send + 'static,
    {
        let mut frames = sink.subscribe();
        let mut pending = frames.borrow_and_update().clone();
        let busy = Arc::new(Mutex::new(()));
        let task_busy = Arc::clone(&busy);

        let task = tokio::spawn(async move {
            debug!(generation, engine = engine.name(), "Decode loop started");
            let mut attempts = 0u64;

            loop {
                let frame = match pending.take() {
                    Some(frame) => frame,
                    None => {
                        if frames.changed().await.is_err() {
                            break;
                        }
                        match frames.borrow_and_update().clone() {
                            Some(frame) => frame,
                            None => {
                                debug!(generation, "Sink cleared, ending decode loop");
                                break;
                            }
                        }
                    }
                };

                attempts += 1;
                let worker = Arc::clone(&engine);
                let permit = Arc::clone(&task_busy).lock_owned().await;
                let attempt = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    worker.decode(&frame)
                });
                let outcome = match attempt.await {
                    Ok(Ok(Some(payload))) => DecodeOutcome::Detected(payload),
                    Ok(Ok(None)) => DecodeOutcome::NoResult,
                    Ok(Err(e)) => DecodeOutcome::Fault(e.to_string()),
                    Err(e) => {
                        warn!(generation, error = %e, "Decode task panicked");
                        DecodeOutcome::Fault(format!("decode task failed: {}", e))
                    }
                };
                trace!(generation, attempts, ?outcome, "Decode attempt");

                let pause = match outcome {
                    DecodeOutcome::Detected(_) => pacing.success_interval,
                    _ => pacing.attempt_interval,
                };

                if on_outcome(generation, outcome) == LoopAction::Stop {
                    break;
                }

                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
            }

            debug!(generation, attempts, "Decode loop finished");
        });

        Self {
            task: Some(task),
            generation,
            busy,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel the loop; safe to call repeatedly
    ///
    /// A decode already running on the blocking pool is not interrupted.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Cancel the loop and wait for the decode in flight, if any, to return
    pub async fn shutdown(&mut self) {
        self.stop();
        let _idle = self.busy.lock().await;
        trace!(generation = self.generation, "Decode loop drained");
    }
}

impl Drop for DecodeLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for DecodeLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeLoop")
            .field("generation", &self.generation)
            .field("running", &self.is_running())
            .finish()
    }
}
