//! [`ProcessingLoop`] – the frame-to-heightmap worker.
//!
//! A single long-lived thread owns the frame source, the
//! [`FilterChain`] and the reducer. Each iteration:
//!
//! 1. **Acquire** – wait (bounded by `acquisition_timeout`) for the next
//!    frame. Timeouts and device errors are retried with exponential backoff
//!    and become fatal after `max_acquisition_retries` consecutive failures.
//! 2. **Gate** – snapshot the shared distance window and push it into the
//!    threshold stage.
//! 3. **Filter** – run [`FilterChain::process`].
//! 4. **Reduce** – [`build_heightmap`] with the session's depth scale.
//! 5. **Emit** – publish a [`HeightmapSample`] on the [`HeightmapBus`]
//!    without waiting for consumers.
//!
//! A frame that cannot be filtered or reduced is logged and skipped; it never
//! ends the stream. The loop runs until [`ScanHandle::stop`] is called or a
//! fatal error occurs, and reports the outcome exactly once on the completion
//! channel.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use heightscan_hal::SimDepthSource;
//! use heightscan_middleware::HeightmapBus;
//! use heightscan_perception::chain::{FilterChain, FilterSettings};
//! use heightscan_perception::range::RangeParameters;
//! use heightscan_runtime::control::ControlPlane;
//! use heightscan_runtime::processing_loop::{LoopConfig, ProcessingLoop};
//!
//! let chain = FilterChain::new(&FilterSettings::default());
//! let control = Arc::new(ControlPlane::new(RangeParameters::default(), chain.toggles()));
//! let mut handle = ProcessingLoop::spawn(
//!     Box::new(SimDepthSource::new("sim_depth")),
//!     chain,
//!     Arc::clone(&control),
//!     HeightmapBus::default(),
//!     LoopConfig::default(),
//! )
//! .expect("no other worker is running");
//!
//! let mut samples = handle.take_progress().unwrap();
//! let first = samples.blocking_recv().unwrap();
//! println!("{} columns", first.heightmap.len());
//! handle.stop();
//! handle.join().unwrap();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use heightscan_hal::{DepthSource, StreamConfig};
use heightscan_middleware::{HeightmapBus, HeightmapReceiver};
use heightscan_perception::chain::FilterChain;
use heightscan_perception::heightmap::build_heightmap;
use heightscan_types::{DepthFrame, HeightmapSample, ScanError};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::control::{ControlPlane, LoopState};
use crate::retry::{AcquisitionRetry, RetryDecision};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Longest uninterrupted sleep while backing off, so a stop request is seen
/// promptly.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(10);

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`ProcessingLoop`].
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Stream requested from the frame source.
    pub stream: StreamConfig,
    /// Upper bound on a single frame wait.
    pub acquisition_timeout: Duration,
    /// Consecutive acquisition failures tolerated before the loop stops.
    pub max_acquisition_retries: u32,
    /// Backoff after the first failure; doubles on each further failure.
    pub backoff_base: Duration,
    /// Upper bound on a single backoff.
    pub backoff_cap: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            acquisition_timeout: Duration::from_millis(1000),
            max_acquisition_retries: 5,
            backoff_base: Duration::from_millis(50),
            backoff_cap: Duration::from_secs(1),
        }
    }
}

/// Why a loop ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// [`ScanHandle::stop`] was called.
    Cancelled,
}

// ─────────────────────────────────────────────────────────────────────────────
// ProcessingLoop
// ─────────────────────────────────────────────────────────────────────────────

/// Worker state moved onto the processing thread.
pub struct ProcessingLoop {
    source: Box<dyn DepthSource>,
    chain: FilterChain,
    control: Arc<ControlPlane>,
    bus: HeightmapBus,
    config: LoopConfig,
    stop: Arc<AtomicBool>,
    processed: u64,
    skipped: u64,
}

impl ProcessingLoop {
    /// Start a worker thread and return immediately.
    ///
    /// Startup failures such as a missing depth sensor are reported through
    /// the returned handle's completion channel, not here.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::WorkerAlreadyRunning`] if `control` already has a
    /// live worker.
    pub fn spawn(
        source: Box<dyn DepthSource>,
        chain: FilterChain,
        control: Arc<ControlPlane>,
        bus: HeightmapBus,
        config: LoopConfig,
    ) -> Result<ScanHandle, ScanError> {
        let claim = control.claim_worker()?;
        control.set_state(LoopState::Starting);

        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = oneshot::channel();
        let progress = bus.subscribe();

        let worker = ProcessingLoop {
            source,
            chain,
            control: Arc::clone(&control),
            bus: bus.clone(),
            config,
            stop: Arc::clone(&stop),
            processed: 0,
            skipped: 0,
        };

        let thread = thread::spawn(move || {
            let control = Arc::clone(&worker.control);
            let result = worker.run();
            control.set_state(LoopState::Stopped);
            drop(claim);
            if done_tx.send(result).is_err() {
                debug!("completion receiver dropped before the loop finished");
            }
        });

        Ok(ScanHandle {
            stop,
            control,
            bus,
            progress: Some(progress),
            completion: Some(done_rx),
            thread: Some(thread),
        })
    }

    fn run(mut self) -> Result<LoopExit, ScanError> {
        let result = self.run_inner();
        self.source.stop();
        match &result {
            Ok(exit) => info!(
                source = self.source.id(),
                processed = self.processed,
                skipped = self.skipped,
                exit = ?exit,
                "processing loop stopped"
            ),
            Err(e) => error!(
                source = self.source.id(),
                processed = self.processed,
                skipped = self.skipped,
                error = %e,
                "processing loop failed"
            ),
        }
        result
    }

    fn run_inner(&mut self) -> Result<LoopExit, ScanError> {
        let session = self.source.start(&self.config.stream)?;
        info!(
            source = self.source.id(),
            depth_scale = session.depth_scale,
            width = session.width,
            height = session.height,
            "processing loop running"
        );
        self.control.set_state(LoopState::Running);

        let mut retry = AcquisitionRetry::new(
            self.config.max_acquisition_retries,
            self.config.backoff_base,
            self.config.backoff_cap,
        );

        loop {
            if self.stop_requested() {
                return Ok(LoopExit::Cancelled);
            }

            let frame = match self.source.wait_for_frame(self.config.acquisition_timeout) {
                Ok(frame) => {
                    retry.record_success();
                    frame
                }
                Err(e) if e.is_acquisition() => match retry.record_failure() {
                    RetryDecision::Retry { attempt, backoff } => {
                        warn!(
                            error = %e,
                            attempt,
                            backoff_ms = backoff.as_millis() as u64,
                            "frame acquisition failed; retrying"
                        );
                        self.sleep_unless_stopped(backoff);
                        continue;
                    }
                    RetryDecision::GiveUp { failures } => {
                        error!(error = %e, failures, "frame acquisition failed; giving up");
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            };

            let frame_number = frame.frame_number;
            let started = Instant::now();
            match self.process_frame(frame, session.depth_scale) {
                Ok(sample) => {
                    let receivers = self.bus.publish(sample);
                    self.processed += 1;
                    debug!(
                        frame = frame_number,
                        receivers,
                        elapsed_us = started.elapsed().as_micros() as u64,
                        "heightmap published"
                    );
                }
                Err(e) => {
                    self.skipped += 1;
                    warn!(frame = frame_number, error = %e, "frame skipped");
                }
            }
        }
    }

    fn process_frame(
        &mut self,
        frame: DepthFrame,
        depth_scale: f32,
    ) -> Result<HeightmapSample, ScanError> {
        self.chain.apply_distance_range(self.control.distance_range())?;
        let filtered = self.chain.process(frame)?;
        let heightmap = build_heightmap(&filtered, depth_scale)?;
        Ok(HeightmapSample {
            frame_number: filtered.frame_number,
            timestamp: filtered.timestamp,
            width: filtered.width,
            height: filtered.height,
            heightmap,
        })
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn sleep_unless_stopped(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.stop_requested() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            thread::sleep(remaining.min(STOP_POLL_INTERVAL));
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ScanHandle
// ─────────────────────────────────────────────────────────────────────────────

/// Caller-side handle to a running [`ProcessingLoop`].
///
/// Dropping the handle stops the worker and waits for its thread.
pub struct ScanHandle {
    stop: Arc<AtomicBool>,
    control: Arc<ControlPlane>,
    bus: HeightmapBus,
    progress: Option<HeightmapReceiver>,
    completion: Option<oneshot::Receiver<Result<LoopExit, ScanError>>>,
    thread: Option<JoinHandle<()>>,
}

impl ScanHandle {
    /// Ask the worker to stop after the current iteration.
    pub fn stop(&self) {
        if !self.stop.swap(true, Ordering::AcqRel) {
            info!("processing loop stop requested");
        }
    }

    pub fn state(&self) -> LoopState {
        self.control.state()
    }

    pub fn control(&self) -> &Arc<ControlPlane> {
        &self.control
    }

    /// The progress subscription opened before the worker started, so it
    /// holds every sample from the first frame on. `None` once taken.
    pub fn take_progress(&mut self) -> Option<HeightmapReceiver> {
        self.progress.take()
    }

    /// An additional subscription that sees samples published from now on.
    pub fn subscribe(&self) -> HeightmapReceiver {
        self.bus.subscribe()
    }

    /// Wait asynchronously for the loop's outcome.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that ended the loop, or
    /// [`ScanError::Channel`] if the outcome was already consumed or the
    /// worker vanished without reporting one.
    pub async fn completion(&mut self) -> Result<LoopExit, ScanError> {
        let rx = self
            .completion
            .take()
            .ok_or_else(|| ScanError::Channel("completion already consumed".to_string()))?;
        rx.await
            .map_err(|_| ScanError::Channel("worker exited without reporting".to_string()))?
    }

    /// Block until the worker thread exits and return its outcome.
    ///
    /// Does not request a stop; call [`stop`][Self::stop] first to end a
    /// healthy loop.
    ///
    /// # Errors
    ///
    /// As for [`completion`][Self::completion].
    pub fn join(mut self) -> Result<LoopExit, ScanError> {
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            return Err(ScanError::Channel("worker thread panicked".to_string()));
        }
        let mut rx = self
            .completion
            .take()
            .ok_or_else(|| ScanError::Channel("completion already consumed".to_string()))?;
        rx.try_recv()
            .map_err(|_| ScanError::Channel("worker exited without reporting".to_string()))?
    }
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.stop();
            let _ = thread.join();
        }
    }
}
