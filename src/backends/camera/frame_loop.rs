// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for capture loops
//!
//! Producers that have to block (reading a device, sleeping between replayed
//! frames) run on a dedicated thread owned by a [`CaptureLoopController`].
//! [`LoopAction`] is also the answer the scan controller gives the decode
//! loop after every attempt.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Action returned by a loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Longest uninterrupted sleep while pacing, so a stop request is noticed quickly
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Controller for a capture loop running in a separate thread
///
/// # Example
///
/// ```ignore
/// let mut controller = CaptureLoopController::start("replay", Some(frame_period), move || {
///     if feeder.push(next_frame()) {
///         LoopAction::Continue
///     } else {
///         LoopAction::Stop
///     }
/// });
///
/// controller.stop();
/// ```
pub struct CaptureLoopController {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl CaptureLoopController {
    /// Start a new capture loop in a separate thread
    ///
    /// `loop_fn` runs until it returns [`LoopAction::Stop`] or `stop()` is
    /// called. With `period` set, iterations start at most once per period.
    pub fn start<F>(name: &str, period: Option<Duration>, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, ?period, "Starting capture loop");

        let thread_handle = thread::spawn(move || {
            debug!(name = %name_clone, "Capture loop thread started");

            loop {
                if stop_signal_clone.load(Ordering::SeqCst) {
                    debug!(name = %name_clone, "Stop signal received");
                    break;
                }

                let iteration_start = Instant::now();
                if loop_fn() == LoopAction::Stop {
                    debug!(name = %name_clone, "Loop requested stop");
                    break;
                }

                if let Some(period) = period {
                    pace(iteration_start, period, &stop_signal_clone);
                }
            }

            info!(name = %name_clone, "Capture loop thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop without waiting for it
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    ///
    /// Safe to call more than once.
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!(name = %self.name, "Waiting for capture loop thread to finish");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Capture loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Capture loop thread finished");
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CaptureLoopController dropped, stopping loop");
            self.stop();
        }
    }
}

/// Sleep out the rest of `period`, waking early on a stop request
fn pace(iteration_start: Instant, period: Duration, stop_signal: &AtomicBool) {
    let deadline = iteration_start + period;
    loop {
        let now = Instant::now();
        if now >= deadline || stop_signal.load(Ordering::SeqCst) {
            return;
        }
        thread::sleep((deadline - now).min(STOP_POLL_INTERVAL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_basic_loop() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut controller = CaptureLoopController::start("test-loop", None, move || {
            let count = counter_clone.fetch_add(1, Ordering::SeqCst);
            if count >= 10 {
                LoopAction::Stop
            } else {
                LoopAction::Continue
            }
        });

        controller.join();

        assert_eq!(counter.load(Ordering::SeqCst), 11);
        assert!(!controller.is_running());
    }

    #[test]
    fn test_stop_interrupts_long_period() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut controller =
            CaptureLoopController::start("test-paced", Some(Duration::from_secs(30)), move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                LoopAction::Continue
            });

        thread::sleep(Duration::from_millis(50));
        let stop_started = Instant::now();
        controller.stop();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(stop_started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut controller = CaptureLoopController::start("test-idempotent", None, || {
            thread::sleep(Duration::from_millis(5));
            LoopAction::Continue
        });

        assert!(controller.is_running());
        controller.stop();
        controller.stop();
        assert!(!controller.is_running());
    }
}
