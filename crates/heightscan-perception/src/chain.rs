//! Ordered, individually-toggleable depth filter chain.
//!
//! A [`FilterChain`] owns a fixed sequence of [`FilterStage`]s. Each stage
//! wraps one [`DepthFilter`] operation behind a shared enable flag that the
//! control plane may flip at any time through [`StageToggles`]. One stage is
//! designated the *forward transform*: whenever it runs during
//! [`FilterChain::process`], the chain applies its inverse transform exactly
//! once after the last stage.
//!
//! The default chain built by [`FilterChain::new`] runs, in order:
//!
//! ```text
//! Decimate → Threshold → Disparity → Spatial → Temporal → (to depth)
//! ```
//!
//! # Example
//!
//! ```rust
//! use heightscan_perception::chain::{FilterChain, FilterSettings};
//! use heightscan_types::DepthFrame;
//!
//! let mut chain = FilterChain::new(&FilterSettings::default());
//! let toggles = chain.toggles();
//! for name in toggles.names() {
//!     toggles.set(name, false).unwrap();
//! }
//!
//! let frame = DepthFrame::from_depth(4, 2, 0.001, vec![1000; 8]);
//! let out = chain.process(frame.clone()).unwrap();
//! assert_eq!(out, frame);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use heightscan_types::{DepthFrame, ScanError};
use tracing::trace;

use crate::filters::{
    DecimationFilter, DisparityTransform, SpatialFilter, TemporalFilter, ThresholdFilter,
};
use crate::range::DistanceRange;

/// Name of the decimation stage in the default chain.
pub const DECIMATE_STAGE: &str = "Decimate";
/// Name of the threshold stage in the default chain.
pub const THRESHOLD_STAGE: &str = "Threshold";
/// Name of the forward disparity transform stage in the default chain.
pub const DISPARITY_STAGE: &str = "Disparity";
/// Name of the spatial smoothing stage in the default chain.
pub const SPATIAL_STAGE: &str = "Spatial";
/// Name of the temporal smoothing stage in the default chain.
pub const TEMPORAL_STAGE: &str = "Temporal";

// ────────────────────────────────────────────────────────────────────────────
// Filter options
// ────────────────────────────────────────────────────────────────────────────

/// Tunable parameters a filter may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOption {
    /// Decimation factor, or number of smoothing iterations.
    FilterMagnitude,
    /// Weight of the current sample in a smoothing blend.
    SmoothAlpha,
    /// Largest step between neighbours that is still smoothed.
    SmoothDelta,
    /// Lower distance bound in metres.
    MinDistance,
    /// Upper distance bound in metres.
    MaxDistance,
}

impl fmt::Display for FilterOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterOption::FilterMagnitude => "FilterMagnitude",
            FilterOption::SmoothAlpha => "SmoothAlpha",
            FilterOption::SmoothDelta => "SmoothDelta",
            FilterOption::MinDistance => "MinDistance",
            FilterOption::MaxDistance => "MaxDistance",
        };
        f.write_str(name)
    }
}

/// Inclusive value range and default of a supported [`FilterOption`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl OptionRange {
    pub const fn new(min: f32, max: f32, default: f32) -> Self {
        Self { min, max, default }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

// ────────────────────────────────────────────────────────────────────────────
// DepthFilter trait
// ────────────────────────────────────────────────────────────────────────────

/// One frame-to-frame transform.
///
/// Filters may keep state between frames (see
/// [`TemporalFilter`][crate::filters::TemporalFilter]), so `process` takes
/// `&mut self`. Options are validated by the owning [`FilterChain`] against
/// [`option_range`][Self::option_range] before
/// [`apply_option`][Self::apply_option] is called.
pub trait DepthFilter: Send {
    /// Transform `frame`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::MalformedFrame`] if the frame cannot be
    /// processed.
    fn process(&mut self, frame: DepthFrame) -> Result<DepthFrame, ScanError>;

    /// Range of `option`, or `None` if the filter does not support it.
    fn option_range(&self, _option: FilterOption) -> Option<OptionRange> {
        None
    }

    /// Current value of `option`, or `None` if unsupported.
    fn option(&self, _option: FilterOption) -> Option<f32> {
        None
    }

    /// Store an already validated option value.
    fn apply_option(&mut self, _option: FilterOption, _value: f32) {}

    /// `true` if the filter exposes `option`.
    fn supports(&self, option: FilterOption) -> bool {
        self.option_range(option).is_some()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FilterStage
// ────────────────────────────────────────────────────────────────────────────

/// A named, independently enable-gated filter.
pub struct FilterStage {
    name: String,
    enabled: Arc<AtomicBool>,
    operation: Box<dyn DepthFilter>,
}

impl FilterStage {
    /// Wrap `operation` in a stage that starts enabled.
    pub fn new(name: impl Into<String>, operation: Box<dyn DepthFilter>) -> Self {
        Self {
            name: name.into(),
            enabled: Arc::new(AtomicBool::new(true)),
            operation,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}

impl fmt::Debug for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterStage")
            .field("name", &self.name)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// StageToggles
// ────────────────────────────────────────────────────────────────────────────

/// Cloneable handle onto the enable flags of a chain's stages.
///
/// Obtained from [`FilterChain::toggles`] before the chain is moved into the
/// processing worker. Toggles take effect on the next frame.
#[derive(Clone, Default)]
pub struct StageToggles {
    flags: Vec<(String, Arc<AtomicBool>)>,
}

impl StageToggles {
    /// Enable or disable the stage called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::UnknownStage`] if no stage has that name.
    pub fn set(&self, name: &str, enabled: bool) -> Result<(), ScanError> {
        let flag = self
            .flag(name)
            .ok_or_else(|| ScanError::UnknownStage(name.to_string()))?;
        flag.store(enabled, Ordering::Release);
        Ok(())
    }

    /// Current enable state of `name`, or `None` for unknown stages.
    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.flag(name).map(|f| f.load(Ordering::Acquire))
    }

    /// Stage names in processing order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.flags.iter().map(|(name, _)| name.as_str())
    }

    fn flag(&self, name: &str) -> Option<&Arc<AtomicBool>> {
        self.flags
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, flag)| flag)
    }
}

impl fmt::Debug for StageToggles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.flags
                    .iter()
                    .map(|(n, flag)| (n, flag.load(Ordering::Acquire))),
            )
            .finish()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FilterSettings
// ────────────────────────────────────────────────────────────────────────────

/// Construction-time parameters of the default chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSettings {
    /// Decimation factor per axis.
    pub decimation_magnitude: u32,
    /// Spatial smoothing weight of the current sample.
    pub spatial_alpha: f32,
    /// Spatial edge threshold, in the units of the frame being smoothed.
    pub spatial_delta: f32,
    /// Spatial smoothing iterations.
    pub spatial_iterations: u32,
    /// Temporal smoothing weight of the current frame.
    pub temporal_alpha: f32,
    /// Temporal change threshold.
    pub temporal_delta: f32,
    /// Disparity = `disparity_factor / metres`.
    pub disparity_factor: f32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            decimation_magnitude: DecimationFilter::DEFAULT_MAGNITUDE,
            spatial_alpha: SpatialFilter::DEFAULT_ALPHA,
            spatial_delta: SpatialFilter::DEFAULT_DELTA,
            spatial_iterations: SpatialFilter::DEFAULT_ITERATIONS,
            temporal_alpha: TemporalFilter::DEFAULT_ALPHA,
            temporal_delta: TemporalFilter::DEFAULT_DELTA,
            disparity_factor: DisparityTransform::DEFAULT_FACTOR,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FilterChain
// ────────────────────────────────────────────────────────────────────────────

/// Fixed-order sequence of [`FilterStage`]s with disparity bookkeeping.
pub struct FilterChain {
    stages: Vec<FilterStage>,
    forward_transform_name: String,
    inverse: Box<dyn DepthFilter>,
}

impl FilterChain {
    /// Build the default five-stage chain.
    ///
    /// Out-of-range settings fall back to the affected filter's clamped
    /// value; see the individual filter constructors.
    pub fn new(settings: &FilterSettings) -> Self {
        let stages = vec![
            FilterStage::new(
                DECIMATE_STAGE,
                Box::new(DecimationFilter::new(settings.decimation_magnitude)),
            ),
            FilterStage::new(THRESHOLD_STAGE, Box::new(ThresholdFilter::default())),
            FilterStage::new(
                DISPARITY_STAGE,
                Box::new(DisparityTransform::to_disparity(settings.disparity_factor)),
            ),
            FilterStage::new(
                SPATIAL_STAGE,
                Box::new(SpatialFilter::new(
                    settings.spatial_alpha,
                    settings.spatial_delta,
                    settings.spatial_iterations,
                )),
            ),
            FilterStage::new(
                TEMPORAL_STAGE,
                Box::new(TemporalFilter::new(
                    settings.temporal_alpha,
                    settings.temporal_delta,
                )),
            ),
        ];
        Self {
            stages,
            forward_transform_name: DISPARITY_STAGE.to_string(),
            inverse: Box::new(DisparityTransform::to_depth(settings.disparity_factor)),
        }
    }

    /// Build a chain from arbitrary stages.
    ///
    /// `forward_transform_name` names the stage whose execution owes one
    /// application of `inverse` at the end of [`process`][Self::process].
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Config`] when two stages share a name.
    pub fn with_stages(
        stages: Vec<FilterStage>,
        forward_transform_name: impl Into<String>,
        inverse: Box<dyn DepthFilter>,
    ) -> Result<Self, ScanError> {
        for (i, stage) in stages.iter().enumerate() {
            if stages[..i].iter().any(|s| s.name == stage.name) {
                return Err(ScanError::Config(format!(
                    "duplicate filter stage name '{}'",
                    stage.name
                )));
            }
        }
        Ok(Self {
            stages,
            forward_transform_name: forward_transform_name.into(),
            inverse,
        })
    }

    /// Run every enabled stage over `frame` in order.
    ///
    /// If the forward-transform stage ran, the inverse transform is applied
    /// exactly once after the last stage. With every stage disabled the
    /// frame is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::MalformedFrame`] if the buffer does not match the
    /// frame dimensions, or the first error raised by a stage.
    pub fn process(&mut self, frame: DepthFrame) -> Result<DepthFrame, ScanError> {
        if !frame.is_well_formed() {
            return Err(ScanError::MalformedFrame(format!(
                "frame {} has {} samples, expected {}x{}",
                frame.frame_number,
                frame.pixels.len(),
                frame.width,
                frame.height
            )));
        }

        let mut working = frame;
        let mut revert_disparity = false;
        for stage in &mut self.stages {
            if !stage.is_enabled() {
                continue;
            }
            working = stage.operation.process(working)?;
            trace!(stage = %stage.name, width = working.width, height = working.height, "stage applied");
            if stage.name == self.forward_transform_name {
                revert_disparity = true;
            }
        }
        if revert_disparity {
            working = self.inverse.process(working)?;
        }
        Ok(working)
    }

    /// Push both distance bounds into the threshold stage, if the chain has
    /// one.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidOption`] if a bound is outside the
    /// threshold filter's accepted range.
    pub fn apply_distance_range(&mut self, range: DistanceRange) -> Result<(), ScanError> {
        if self.stage(THRESHOLD_STAGE).is_none() {
            return Ok(());
        }
        self.set_option(THRESHOLD_STAGE, FilterOption::MinDistance, range.min)?;
        self.set_option(THRESHOLD_STAGE, FilterOption::MaxDistance, range.max)
    }

    /// Set `option` on the stage called `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::UnknownStage`] for unknown stage names and
    /// [`ScanError::InvalidOption`] if the option is unsupported or `value` is
    /// out of range.
    pub fn set_option(
        &mut self,
        stage: &str,
        option: FilterOption,
        value: f32,
    ) -> Result<(), ScanError> {
        let target = self
            .stages
            .iter_mut()
            .find(|s| s.name == stage)
            .ok_or_else(|| ScanError::UnknownStage(stage.to_string()))?;
        let invalid = || ScanError::InvalidOption {
            stage: stage.to_string(),
            option: option.to_string(),
            value,
        };
        let range = target.operation.option_range(option).ok_or_else(invalid)?;
        if !range.contains(value) {
            return Err(invalid());
        }
        target.operation.apply_option(option, value);
        Ok(())
    }

    /// Current value of `option` on `stage`.
    pub fn option(&self, stage: &str, option: FilterOption) -> Option<f32> {
        self.stage(stage).and_then(|s| s.operation.option(option))
    }

    /// Handle onto every stage's enable flag.
    pub fn toggles(&self) -> StageToggles {
        StageToggles {
            flags: self
                .stages
                .iter()
                .map(|s| (s.name.clone(), Arc::clone(&s.enabled)))
                .collect(),
        }
    }

    /// The stage called `name`, if any.
    pub fn stage(&self, name: &str) -> Option<&FilterStage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Stages in processing order.
    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    pub fn forward_transform_name(&self) -> &str {
        &self.forward_transform_name
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("stages", &self.stages)
            .field("forward_transform_name", &self.forward_transform_name)
            .finish()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use heightscan_types::PixelData;

    /// Records every invocation into a shared log and adds `delta` to each
    /// depth sample.
    struct Recording {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        delta: u16,
    }

    impl DepthFilter for Recording {
        fn process(&mut self, mut frame: DepthFrame) -> Result<DepthFrame, ScanError> {
            self.log.lock().unwrap().push(self.label);
            if let PixelData::Depth(samples) = &mut frame.pixels {
                for s in samples.iter_mut() {
                    *s += self.delta;
                }
            }
            Ok(frame)
        }
    }

    fn recording_chain(log: &Arc<Mutex<Vec<&'static str>>>) -> FilterChain {
        let stage = |label: &'static str| {
            FilterStage::new(
                label,
                Box::new(Recording {
                    label,
                    log: Arc::clone(log),
                    delta: 1,
                }),
            )
        };
        FilterChain::with_stages(
            vec![
                stage("Decimate"),
                stage("Threshold"),
                stage("Disparity"),
                stage("Spatial"),
                stage("Temporal"),
            ],
            "Disparity",
            Box::new(Recording {
                label: "Inverse",
                log: Arc::clone(log),
                delta: 100,
            }),
        )
        .unwrap()
    }

    fn frame() -> DepthFrame {
        DepthFrame::from_depth(3, 2, 0.001, vec![1000, 1200, 0, 900, 0, 1500])
    }

    #[test]
    fn stages_run_in_fixed_order_then_inverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = recording_chain(&log);
        chain.process(frame()).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["Decimate", "Threshold", "Disparity", "Spatial", "Temporal", "Inverse"]
        );
    }

    #[test]
    fn all_disabled_is_identity() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = recording_chain(&log);
        let toggles = chain.toggles();
        let names: Vec<String> = toggles.names().map(str::to_string).collect();
        for name in &names {
            toggles.set(name, false).unwrap();
        }
        let input = frame();
        let out = chain.process(input.clone()).unwrap();
        assert_eq!(out, input);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn only_forward_transform_applies_inverse_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = recording_chain(&log);
        let toggles = chain.toggles();
        for name in ["Decimate", "Threshold", "Spatial", "Temporal"] {
            toggles.set(name, false).unwrap();
        }
        chain.process(frame()).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["Disparity", "Inverse"]);
    }

    #[test]
    fn disabled_forward_transform_skips_inverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = recording_chain(&log);
        chain.toggles().set("Disparity", false).unwrap();
        chain.process(frame()).unwrap();
        let log = log.lock().unwrap();
        assert!(!log.contains(&"Inverse"));
        assert_eq!(*log, vec!["Decimate", "Threshold", "Spatial", "Temporal"]);
    }

    #[test]
    fn inverse_runs_once_per_call_across_frames() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = recording_chain(&log);
        chain.process(frame()).unwrap();
        chain.process(frame()).unwrap();
        let inverses = log.lock().unwrap().iter().filter(|l| **l == "Inverse").count();
        assert_eq!(inverses, 2);
    }

    #[test]
    fn toggle_takes_effect_on_next_frame() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = recording_chain(&log);
        let toggles = chain.toggles();
        chain.process(frame()).unwrap();
        toggles.set("Spatial", false).unwrap();
        log.lock().unwrap().clear();
        chain.process(frame()).unwrap();
        assert!(!log.lock().unwrap().contains(&"Spatial"));
        assert_eq!(toggles.is_enabled("spatial"), Some(false));
    }

    #[test]
    fn unknown_toggle_is_rejected() {
        let chain = FilterChain::new(&FilterSettings::default());
        let err = chain.toggles().set("Bilateral", true).unwrap_err();
        assert_eq!(err, ScanError::UnknownStage("Bilateral".to_string()));
        assert_eq!(chain.toggles().is_enabled("Bilateral"), None);
    }

    #[test]
    fn duplicate_stage_names_are_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = || {
            Box::new(Recording {
                label: "x",
                log: Arc::clone(&log),
                delta: 0,
            })
        };
        let result = FilterChain::with_stages(
            vec![FilterStage::new("A", make()), FilterStage::new("A", make())],
            "A",
            make(),
        );
        assert!(matches!(result, Err(ScanError::Config(_))));
    }

    #[test]
    fn malformed_frame_is_rejected_before_any_stage() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = recording_chain(&log);
        let bad = DepthFrame::from_depth(4, 4, 0.001, vec![1; 3]);
        let err = chain.process(bad).unwrap_err();
        assert!(matches!(err, ScanError::MalformedFrame(_)));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn default_chain_order_and_names() {
        let chain = FilterChain::new(&FilterSettings::default());
        let names: Vec<&str> = chain.stages().iter().map(FilterStage::name).collect();
        assert_eq!(
            names,
            vec![DECIMATE_STAGE, THRESHOLD_STAGE, DISPARITY_STAGE, SPATIAL_STAGE, TEMPORAL_STAGE]
        );
        assert_eq!(chain.forward_transform_name(), DISPARITY_STAGE);
        assert!(chain.stages().iter().all(FilterStage::is_enabled));
    }

    #[test]
    fn default_chain_returns_depth_domain() {
        let mut chain = FilterChain::new(&FilterSettings::default());
        let input = DepthFrame::from_depth(8, 4, 0.001, vec![1500; 32]);
        let out = chain.process(input).unwrap();
        assert!(!out.pixels.is_disparity());
        assert_eq!((out.width, out.height), (4, 2));
        let samples = out.depth_samples().unwrap();
        assert!(samples.iter().all(|&s| s.abs_diff(1500) <= 1));
    }

    #[test]
    fn distance_range_reaches_threshold_stage() {
        let mut chain = FilterChain::new(&FilterSettings::default());
        chain
            .apply_distance_range(DistanceRange { min: 0.5, max: 2.5 })
            .unwrap();
        assert_eq!(chain.option(THRESHOLD_STAGE, FilterOption::MinDistance), Some(0.5));
        assert_eq!(chain.option(THRESHOLD_STAGE, FilterOption::MaxDistance), Some(2.5));
    }

    #[test]
    fn set_option_validates_range_and_support() {
        let mut chain = FilterChain::new(&FilterSettings::default());
        chain
            .set_option(SPATIAL_STAGE, FilterOption::SmoothAlpha, 0.75)
            .unwrap();
        assert_eq!(chain.option(SPATIAL_STAGE, FilterOption::SmoothAlpha), Some(0.75));

        let out_of_range = chain.set_option(SPATIAL_STAGE, FilterOption::SmoothAlpha, 3.0);
        assert!(matches!(out_of_range, Err(ScanError::InvalidOption { .. })));

        let unsupported = chain.set_option(DISPARITY_STAGE, FilterOption::SmoothAlpha, 0.5);
        assert!(matches!(unsupported, Err(ScanError::InvalidOption { .. })));

        let unknown = chain.set_option("Hole", FilterOption::SmoothAlpha, 0.5);
        assert!(matches!(unknown, Err(ScanError::UnknownStage(_))));
    }

    #[test]
    fn stage_debug_shows_enable_state() {
        let stage = FilterStage::new("Threshold", Box::new(ThresholdFilter::default()));
        stage.set_enabled(false);
        let dbg = format!("{stage:?}");
        assert!(dbg.contains("Threshold"));
        assert!(dbg.contains("false"));
    }
}
