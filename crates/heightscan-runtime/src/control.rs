//! [`ControlPlane`] – state shared between the processing worker and the
//! outside world.
//!
//! Holds the distance window, the filter-stage enable flags and the worker
//! lifecycle. Every field is independently atomic, so control calls never
//! block the worker and may come from any thread at any time.
//!
//! # Example
//!
//! ```rust
//! use heightscan_perception::chain::{FilterChain, FilterSettings};
//! use heightscan_perception::range::RangeParameters;
//! use heightscan_runtime::control::{ControlPlane, LoopState};
//!
//! let chain = FilterChain::new(&FilterSettings::default());
//! let control = ControlPlane::new(RangeParameters::default(), chain.toggles());
//!
//! control.set_distance_range(0.5, 3.0);
//! control.update_distance_range(0.1, -0.5);
//! assert_eq!(control.get_min_distance(), 0.6);
//! assert_eq!(control.get_max_distance(), 2.5);
//!
//! control.set_stage_enabled("Spatial", false).unwrap();
//! assert_eq!(control.stage_enabled("Spatial"), Some(false));
//! assert_eq!(control.state(), LoopState::Idle);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use heightscan_perception::chain::StageToggles;
use heightscan_perception::range::{DistanceRange, RangeParameters};
use heightscan_types::ScanError;
use tracing::{debug, info};

// ─────────────────────────────────────────────────────────────────────────────
// LoopState
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle of the processing worker attached to a [`ControlPlane`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoopState {
    /// No worker has been spawned yet.
    Idle = 0,
    /// Opening the frame source and querying its depth scale.
    Starting = 1,
    /// Steady-state frame processing.
    Running = 2,
    /// Cancelled or failed; terminal for that worker.
    Stopped = 3,
}

impl LoopState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LoopState::Starting,
            2 => LoopState::Running,
            3 => LoopState::Stopped,
            _ => LoopState::Idle,
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoopState::Idle => "idle",
            LoopState::Starting => "starting",
            LoopState::Running => "running",
            LoopState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ControlPlane
// ─────────────────────────────────────────────────────────────────────────────

/// Shared, lock-free control surface for one scanning session.
///
/// Wrap it in an [`Arc`] and hand clones to both the worker
/// ([`ProcessingLoop::spawn`][crate::processing_loop::ProcessingLoop::spawn])
/// and the control handlers.
pub struct ControlPlane {
    range: RangeParameters,
    toggles: StageToggles,
    state: AtomicU8,
    worker_claimed: AtomicBool,
}

impl ControlPlane {
    /// Build a control plane around an initial window and the toggles of the
    /// chain the worker will own.
    pub fn new(range: RangeParameters, toggles: StageToggles) -> Self {
        Self {
            range,
            toggles,
            state: AtomicU8::new(LoopState::Idle as u8),
            worker_claimed: AtomicBool::new(false),
        }
    }

    // ── Distance window ──────────────────────────────────────────────────────

    /// Clamp to `[0, 16]` m, round to 0.1 m and store. Never fails.
    pub fn set_distance_range(&self, min_distance: f32, max_distance: f32) {
        self.range.set_distance_range(min_distance, max_distance);
    }

    /// Shift both bounds, then clamp and round as
    /// [`set_distance_range`][Self::set_distance_range] does.
    pub fn update_distance_range(&self, delta_min: f32, delta_max: f32) {
        self.range.update_distance_range(delta_min, delta_max);
    }

    pub fn get_min_distance(&self) -> f32 {
        self.range.get_min_distance()
    }

    pub fn get_max_distance(&self) -> f32 {
        self.range.get_max_distance()
    }

    pub fn distance_range(&self) -> DistanceRange {
        self.range.snapshot()
    }

    pub fn range(&self) -> &RangeParameters {
        &self.range
    }

    // ── Filter stages ────────────────────────────────────────────────────────

    /// Enable or disable a filter stage by name (case-insensitive). Takes
    /// effect from the next frame.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::UnknownStage`] if no stage has that name.
    pub fn set_stage_enabled(&self, name: &str, enabled: bool) -> Result<(), ScanError> {
        self.toggles.set(name, enabled)?;
        info!(stage = name, enabled, "filter stage toggled");
        Ok(())
    }

    pub fn stage_enabled(&self, name: &str) -> Option<bool> {
        self.toggles.is_enabled(name)
    }

    /// Stage names in chain order.
    pub fn stage_names(&self) -> Vec<String> {
        self.toggles.names().map(str::to_string).collect()
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: LoopState) {
        let previous = LoopState::from_u8(self.state.swap(state as u8, Ordering::AcqRel));
        if previous != state {
            debug!(from = %previous, to = %state, "loop state changed");
        }
    }

    /// `true` while a worker holds this control plane.
    pub fn has_worker(&self) -> bool {
        self.worker_claimed.load(Ordering::Acquire)
    }

    /// Reserve this control plane for a single worker.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::WorkerAlreadyRunning`] if another worker still
    /// holds the claim.
    pub(crate) fn claim_worker(self: &Arc<Self>) -> Result<WorkerClaim, ScanError> {
        self.worker_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ScanError::WorkerAlreadyRunning)?;
        Ok(WorkerClaim {
            control: Arc::clone(self),
        })
    }
}

impl fmt::Debug for ControlPlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlPlane")
            .field("range", &self.range.snapshot())
            .field("toggles", &self.toggles)
            .field("state", &self.state())
            .finish()
    }
}

/// Exclusive right to run a worker against a [`ControlPlane`]; released on
/// drop.
pub(crate) struct WorkerClaim {
    control: Arc<ControlPlane>,
}

impl Drop for WorkerClaim {
    fn drop(&mut self) {
        self.control.worker_claimed.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heightscan_perception::chain::{FilterChain, FilterSettings};

    fn control() -> Arc<ControlPlane> {
        let chain = FilterChain::new(&FilterSettings::default());
        Arc::new(ControlPlane::new(RangeParameters::default(), chain.toggles()))
    }

    #[test]
    fn range_calls_never_fail_and_normalize() {
        let c = control();
        c.set_distance_range(-5.0, 20.0);
        assert_eq!(c.distance_range(), DistanceRange { min: 0.0, max: 16.0 });
        c.set_distance_range(0.37, 0.44);
        assert_eq!(c.get_min_distance(), 0.4);
        assert_eq!(c.get_max_distance(), 0.4);
    }

    #[test]
    fn stage_toggles_reach_the_chain() {
        let chain = FilterChain::new(&FilterSettings::default());
        let c = ControlPlane::new(RangeParameters::default(), chain.toggles());

        c.set_stage_enabled("temporal", false).unwrap();
        let stage = chain.stage("Temporal").unwrap();
        assert!(!stage.is_enabled());
        assert_eq!(
            c.stage_names(),
            vec!["Decimate", "Threshold", "Disparity", "Spatial", "Temporal"]
        );
    }

    #[test]
    fn unknown_stage_is_rejected() {
        let c = control();
        assert!(matches!(
            c.set_stage_enabled("Blur", true),
            Err(ScanError::UnknownStage(_))
        ));
        assert_eq!(c.stage_enabled("Blur"), None);
    }

    #[test]
    fn only_one_worker_claim_at_a_time() {
        let c = control();
        let first = c.claim_worker().unwrap();
        assert!(c.has_worker());
        assert!(matches!(
            c.claim_worker(),
            Err(ScanError::WorkerAlreadyRunning)
        ));
        drop(first);
        assert!(!c.has_worker());
        assert!(c.claim_worker().is_ok());
    }

    #[test]
    fn state_roundtrips_through_atomic() {
        let c = control();
        for s in [
            LoopState::Starting,
            LoopState::Running,
            LoopState::Stopped,
            LoopState::Idle,
        ] {
            c.set_state(s);
            assert_eq!(c.state(), s);
        }
        assert_eq!(LoopState::Running.to_string(), "running");
    }
}
