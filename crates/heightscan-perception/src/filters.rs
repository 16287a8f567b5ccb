//! Concrete depth-cleanup filters used by the default
//! [`FilterChain`][crate::chain::FilterChain].
//!
//! | Filter | Effect |
//! |---|---|
//! | [`DecimationFilter`] | Shrinks the frame by an integer factor, ignoring holes. |
//! | [`ThresholdFilter`] | Removes samples outside a metric distance window. |
//! | [`DisparityTransform`] | Converts between depth and disparity (`factor / metres`). |
//! | [`SpatialFilter`] | Edge-preserving recursive smoothing along rows and columns. |
//! | [`TemporalFilter`] | Blends each pixel with its value in the previous frame. |
//!
//! Every filter treats `0` as "no reading" in both domains and never turns a
//! hole into a reading.

use heightscan_types::{DepthFrame, PixelData, ScanError};

use crate::chain::{DepthFilter, FilterOption, OptionRange};

// ────────────────────────────────────────────────────────────────────────────
// Sample abstraction
// ────────────────────────────────────────────────────────────────────────────

/// Pixel types a filter can operate on.
trait Sample: Copy + PartialOrd {
    fn is_valid(self) -> bool;
    fn to_f32(self) -> f32;
    fn from_f32(value: f32) -> Self;
}

impl Sample for u16 {
    fn is_valid(self) -> bool {
        self > 0
    }

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn from_f32(value: f32) -> Self {
        value.round().clamp(0.0, u16::MAX as f32) as u16
    }
}

impl Sample for f32 {
    fn is_valid(self) -> bool {
        self > 0.0
    }

    fn to_f32(self) -> f32 {
        self
    }

    fn from_f32(value: f32) -> Self {
        value
    }
}

fn ensure_well_formed(frame: &DepthFrame) -> Result<(), ScanError> {
    if frame.is_well_formed() {
        Ok(())
    } else {
        Err(ScanError::MalformedFrame(format!(
            "frame {} has {} samples, expected {}x{}",
            frame.frame_number,
            frame.pixels.len(),
            frame.width,
            frame.height
        )))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Decimation
// ────────────────────────────────────────────────────────────────────────────

/// Downsamples a frame by `magnitude` along both axes.
///
/// Each output pixel summarises one `magnitude × magnitude` block using only
/// its valid samples: the median for magnitudes 2–3, the mean for 4–8. A block
/// without valid samples produces a hole. Trailing rows and columns that do
/// not fill a whole block are dropped.
#[derive(Debug, Clone)]
pub struct DecimationFilter {
    magnitude: u32,
}

impl DecimationFilter {
    pub const DEFAULT_MAGNITUDE: u32 = 2;
    const RANGE: OptionRange = OptionRange::new(1.0, 8.0, Self::DEFAULT_MAGNITUDE as f32);

    /// Create a filter; `magnitude` is clamped to `[1, 8]`.
    pub fn new(magnitude: u32) -> Self {
        Self {
            magnitude: magnitude.clamp(1, 8),
        }
    }

    pub fn magnitude(&self) -> u32 {
        self.magnitude
    }

    fn decimate<T: Sample>(&self, src: &[T], width: usize, out_w: usize, out_h: usize) -> Vec<T> {
        let m = self.magnitude as usize;
        let mut block: Vec<T> = Vec::with_capacity(m * m);
        let mut out = Vec::with_capacity(out_w * out_h);
        for by in 0..out_h {
            for bx in 0..out_w {
                block.clear();
                for y in by * m..(by + 1) * m {
                    let row = &src[y * width + bx * m..y * width + (bx + 1) * m];
                    block.extend(row.iter().copied().filter(|s| s.is_valid()));
                }
                out.push(self.summarise(&mut block));
            }
        }
        out
    }

    fn summarise<T: Sample>(&self, block: &mut [T]) -> T {
        if block.is_empty() {
            return T::from_f32(0.0);
        }
        if self.magnitude <= 3 {
            block.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            block[block.len() / 2]
        } else {
            let sum: f32 = block.iter().map(|s| s.to_f32()).sum();
            T::from_f32(sum / block.len() as f32)
        }
    }
}

impl Default for DecimationFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAGNITUDE)
    }
}

impl DepthFilter for DecimationFilter {
    fn process(&mut self, frame: DepthFrame) -> Result<DepthFrame, ScanError> {
        ensure_well_formed(&frame)?;
        let m = self.magnitude;
        let (out_w, out_h) = (frame.width / m, frame.height / m);
        if m == 1 || out_w == 0 || out_h == 0 {
            return Ok(frame);
        }
        let width = frame.width as usize;
        let (ow, oh) = (out_w as usize, out_h as usize);
        let pixels = match &frame.pixels {
            PixelData::Depth(d) => PixelData::Depth(self.decimate(d, width, ow, oh)),
            PixelData::Disparity(d) => PixelData::Disparity(self.decimate(d, width, ow, oh)),
        };
        Ok(DepthFrame {
            width: out_w,
            height: out_h,
            pixels,
            ..frame
        })
    }

    fn option_range(&self, option: FilterOption) -> Option<OptionRange> {
        (option == FilterOption::FilterMagnitude).then_some(Self::RANGE)
    }

    fn option(&self, option: FilterOption) -> Option<f32> {
        (option == FilterOption::FilterMagnitude).then_some(self.magnitude as f32)
    }

    fn apply_option(&mut self, option: FilterOption, value: f32) {
        if option == FilterOption::FilterMagnitude {
            self.magnitude = (value.round() as u32).clamp(1, 8);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Threshold
// ────────────────────────────────────────────────────────────────────────────

/// Zeroes every depth sample whose metric distance lies outside
/// `[min_distance, max_distance]`.
///
/// Frames already in the disparity domain pass through untouched.
#[derive(Debug, Clone)]
pub struct ThresholdFilter {
    min_distance: f32,
    max_distance: f32,
}

impl ThresholdFilter {
    pub const DEFAULT_MIN_DISTANCE: f32 = 0.1;
    pub const DEFAULT_MAX_DISTANCE: f32 = 4.0;
    const MIN_RANGE: OptionRange = OptionRange::new(0.0, 16.0, Self::DEFAULT_MIN_DISTANCE);
    const MAX_RANGE: OptionRange = OptionRange::new(0.0, 16.0, Self::DEFAULT_MAX_DISTANCE);

    pub fn new(min_distance: f32, max_distance: f32) -> Self {
        Self {
            min_distance: min_distance.clamp(0.0, 16.0),
            max_distance: max_distance.clamp(0.0, 16.0),
        }
    }
}

impl Default for ThresholdFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_DISTANCE, Self::DEFAULT_MAX_DISTANCE)
    }
}

impl DepthFilter for ThresholdFilter {
    fn process(&mut self, mut frame: DepthFrame) -> Result<DepthFrame, ScanError> {
        ensure_well_formed(&frame)?;
        let scale = frame.depth_scale;
        if let PixelData::Depth(samples) = &mut frame.pixels {
            for s in samples.iter_mut() {
                let metres = *s as f32 * scale;
                if metres < self.min_distance || metres > self.max_distance {
                    *s = 0;
                }
            }
        }
        Ok(frame)
    }

    fn option_range(&self, option: FilterOption) -> Option<OptionRange> {
        match option {
            FilterOption::MinDistance => Some(Self::MIN_RANGE),
            FilterOption::MaxDistance => Some(Self::MAX_RANGE),
            _ => None,
        }
    }

    fn option(&self, option: FilterOption) -> Option<f32> {
        match option {
            FilterOption::MinDistance => Some(self.min_distance),
            FilterOption::MaxDistance => Some(self.max_distance),
            _ => None,
        }
    }

    fn apply_option(&mut self, option: FilterOption, value: f32) {
        match option {
            FilterOption::MinDistance => self.min_distance = value,
            FilterOption::MaxDistance => self.max_distance = value,
            _ => {}
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Disparity transform
// ────────────────────────────────────────────────────────────────────────────

/// Converts depth frames to disparity (`factor / metres`) or back.
///
/// A transform applied to a frame that is already in its target domain is a
/// no-op, so an unmatched inverse never corrupts data.
#[derive(Debug, Clone)]
pub struct DisparityTransform {
    to_disparity: bool,
    factor: f32,
}

impl DisparityTransform {
    /// Focal length × baseline × sub-pixel steps of a 380 px, 50 mm stereo
    /// pair with 1/32 px disparity resolution.
    pub const DEFAULT_FACTOR: f32 = 608.0;

    pub fn to_disparity(factor: f32) -> Self {
        Self {
            to_disparity: true,
            factor,
        }
    }

    pub fn to_depth(factor: f32) -> Self {
        Self {
            to_disparity: false,
            factor,
        }
    }

    pub fn is_forward(&self) -> bool {
        self.to_disparity
    }
}

impl DepthFilter for DisparityTransform {
    fn process(&mut self, frame: DepthFrame) -> Result<DepthFrame, ScanError> {
        ensure_well_formed(&frame)?;
        if frame.pixels.is_disparity() == self.to_disparity {
            return Ok(frame);
        }
        let scale = frame.depth_scale;
        if !(scale > 0.0) || !(self.factor > 0.0) {
            return Err(ScanError::MalformedFrame(format!(
                "cannot convert frame {} with depth scale {scale} and factor {}",
                frame.frame_number, self.factor
            )));
        }
        let factor = self.factor;
        let pixels = match frame.pixels {
            PixelData::Depth(samples) => PixelData::Disparity(
                samples
                    .into_iter()
                    .map(|s| if s > 0 { factor / (s as f32 * scale) } else { 0.0 })
                    .collect(),
            ),
            PixelData::Disparity(values) => PixelData::Depth(
                values
                    .into_iter()
                    .map(|d| if d > 0.0 { u16::from_f32(factor / (d * scale)) } else { 0 })
                    .collect(),
            ),
        };
        Ok(DepthFrame { pixels, ..frame })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Spatial smoothing
// ────────────────────────────────────────────────────────────────────────────

/// Edge-preserving spatial smoothing.
///
/// Each iteration sweeps every row left→right and right→left, then every
/// column top→bottom and bottom→top. Along a sweep a valid sample is blended
/// with its already-smoothed predecessor as `α·v + (1−α)·prev` when the two
/// differ by less than `delta`; larger steps are treated as edges and left
/// alone. Holes interrupt the sweep.
#[derive(Debug, Clone)]
pub struct SpatialFilter {
    alpha: f32,
    delta: f32,
    iterations: u32,
}

impl SpatialFilter {
    pub const DEFAULT_ALPHA: f32 = 0.5;
    pub const DEFAULT_DELTA: f32 = 20.0;
    pub const DEFAULT_ITERATIONS: u32 = 2;
    const ALPHA_RANGE: OptionRange = OptionRange::new(0.25, 1.0, Self::DEFAULT_ALPHA);
    const DELTA_RANGE: OptionRange = OptionRange::new(1.0, 50.0, Self::DEFAULT_DELTA);
    const ITERATIONS_RANGE: OptionRange =
        OptionRange::new(1.0, 5.0, Self::DEFAULT_ITERATIONS as f32);

    /// Create a filter; each parameter is clamped to its option range.
    pub fn new(alpha: f32, delta: f32, iterations: u32) -> Self {
        Self {
            alpha: alpha.clamp(Self::ALPHA_RANGE.min, Self::ALPHA_RANGE.max),
            delta: delta.clamp(Self::DELTA_RANGE.min, Self::DELTA_RANGE.max),
            iterations: iterations.clamp(1, 5),
        }
    }

    fn smooth<T: Sample>(&self, src: &[T], width: usize, height: usize) -> Vec<T> {
        let mut buf: Vec<f32> = src.iter().map(|s| s.to_f32()).collect();
        for _ in 0..self.iterations {
            for y in 0..height {
                let row = y * width;
                self.sweep(&mut buf, (0..width).map(|x| row + x));
                self.sweep(&mut buf, (0..width).rev().map(|x| row + x));
            }
            for x in 0..width {
                self.sweep(&mut buf, (0..height).map(|y| y * width + x));
                self.sweep(&mut buf, (0..height).rev().map(|y| y * width + x));
            }
        }
        buf.into_iter().map(T::from_f32).collect()
    }

    fn sweep(&self, buf: &mut [f32], indices: impl Iterator<Item = usize>) {
        let mut prev: Option<f32> = None;
        for i in indices {
            let cur = buf[i];
            if cur <= 0.0 {
                prev = None;
                continue;
            }
            if let Some(p) = prev
                && (cur - p).abs() < self.delta
            {
                buf[i] = self.alpha * cur + (1.0 - self.alpha) * p;
            }
            prev = Some(buf[i]);
        }
    }
}

impl Default for SpatialFilter {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_ALPHA,
            Self::DEFAULT_DELTA,
            Self::DEFAULT_ITERATIONS,
        )
    }
}

impl DepthFilter for SpatialFilter {
    fn process(&mut self, frame: DepthFrame) -> Result<DepthFrame, ScanError> {
        ensure_well_formed(&frame)?;
        let (w, h) = (frame.width as usize, frame.height as usize);
        let pixels = match &frame.pixels {
            PixelData::Depth(d) => PixelData::Depth(self.smooth(d, w, h)),
            PixelData::Disparity(d) => PixelData::Disparity(self.smooth(d, w, h)),
        };
        Ok(DepthFrame { pixels, ..frame })
    }

    fn option_range(&self, option: FilterOption) -> Option<OptionRange> {
        match option {
            FilterOption::SmoothAlpha => Some(Self::ALPHA_RANGE),
            FilterOption::SmoothDelta => Some(Self::DELTA_RANGE),
            FilterOption::FilterMagnitude => Some(Self::ITERATIONS_RANGE),
            _ => None,
        }
    }

    fn option(&self, option: FilterOption) -> Option<f32> {
        match option {
            FilterOption::SmoothAlpha => Some(self.alpha),
            FilterOption::SmoothDelta => Some(self.delta),
            FilterOption::FilterMagnitude => Some(self.iterations as f32),
            _ => None,
        }
    }

    fn apply_option(&mut self, option: FilterOption, value: f32) {
        match option {
            FilterOption::SmoothAlpha => self.alpha = value,
            FilterOption::SmoothDelta => self.delta = value,
            FilterOption::FilterMagnitude => self.iterations = value.round() as u32,
            _ => {}
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Temporal smoothing
// ────────────────────────────────────────────────────────────────────────────

struct History {
    width: u32,
    height: u32,
    disparity: bool,
    values: Vec<f32>,
}

/// Blends each pixel with its value in the previous output frame.
///
/// A pixel is blended as `α·v + (1−α)·prev` only when both the current and the
/// previous value are valid and differ by less than `delta`. The history is
/// discarded whenever the frame size or pixel domain changes, e.g. after the
/// decimation or disparity stage is toggled.
pub struct TemporalFilter {
    alpha: f32,
    delta: f32,
    history: Option<History>,
}

impl TemporalFilter {
    pub const DEFAULT_ALPHA: f32 = 0.4;
    pub const DEFAULT_DELTA: f32 = 20.0;
    const ALPHA_RANGE: OptionRange = OptionRange::new(0.0, 1.0, Self::DEFAULT_ALPHA);
    const DELTA_RANGE: OptionRange = OptionRange::new(1.0, 100.0, Self::DEFAULT_DELTA);

    /// Create a filter; each parameter is clamped to its option range.
    pub fn new(alpha: f32, delta: f32) -> Self {
        Self {
            alpha: alpha.clamp(Self::ALPHA_RANGE.min, Self::ALPHA_RANGE.max),
            delta: delta.clamp(Self::DELTA_RANGE.min, Self::DELTA_RANGE.max),
            history: None,
        }
    }

    /// Forget the previous frame.
    pub fn reset(&mut self) {
        self.history = None;
    }

    fn blend<T: Sample>(&mut self, frame: &DepthFrame, src: &[T]) -> Vec<T> {
        let disparity = frame.pixels.is_disparity();
        let mut current: Vec<f32> = src.iter().map(|s| s.to_f32()).collect();

        let matches = self.history.as_ref().is_some_and(|h| {
            h.width == frame.width && h.height == frame.height && h.disparity == disparity
        });
        if let (true, Some(history)) = (matches, &self.history) {
            for (cur, &prev) in current.iter_mut().zip(&history.values) {
                if *cur > 0.0 && prev > 0.0 && (*cur - prev).abs() < self.delta {
                    *cur = self.alpha * *cur + (1.0 - self.alpha) * prev;
                }
            }
        }

        let out: Vec<T> = current.iter().map(|&v| T::from_f32(v)).collect();
        self.history = Some(History {
            width: frame.width,
            height: frame.height,
            disparity,
            values: out.iter().map(|s| s.to_f32()).collect(),
        });
        out
    }
}

impl Default for TemporalFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ALPHA, Self::DEFAULT_DELTA)
    }
}

impl DepthFilter for TemporalFilter {
    fn process(&mut self, frame: DepthFrame) -> Result<DepthFrame, ScanError> {
        ensure_well_formed(&frame)?;
        let pixels = match &frame.pixels {
            PixelData::Depth(d) => PixelData::Depth(self.blend(&frame, d)),
            PixelData::Disparity(d) => PixelData::Disparity(self.blend(&frame, d)),
        };
        Ok(DepthFrame { pixels, ..frame })
    }

    fn option_range(&self, option: FilterOption) -> Option<OptionRange> {
        match option {
            FilterOption::SmoothAlpha => Some(Self::ALPHA_RANGE),
            FilterOption::SmoothDelta => Some(Self::DELTA_RANGE),
            _ => None,
        }
    }

    fn option(&self, option: FilterOption) -> Option<f32> {
        match option {
            FilterOption::SmoothAlpha => Some(self.alpha),
            FilterOption::SmoothDelta => Some(self.delta),
            _ => None,
        }
    }

    fn apply_option(&mut self, option: FilterOption, value: f32) {
        match option {
            FilterOption::SmoothAlpha => self.alpha = value,
            FilterOption::SmoothDelta => self.delta = value,
            _ => {}
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(width: u32, height: u32, samples: Vec<u16>) -> DepthFrame {
        DepthFrame::from_depth(width, height, 0.001, samples)
    }

    fn samples(frame: &DepthFrame) -> Vec<u16> {
        frame.depth_samples().expect("depth domain").to_vec()
    }

    // ── Decimation ──────────────────────────────────────────────────────────

    #[test]
    fn decimation_halves_dimensions_with_median() {
        let mut f = DecimationFilter::new(2);
        #[rustfmt::skip]
        let input = depth(4, 2, vec![
            10, 20,  5, 5,
            30, 40,  5, 5,
        ]);
        let out = f.process(input).unwrap();
        assert_eq!((out.width, out.height), (2, 1));
        // Sorted block [10, 20, 30, 40] → element at len/2.
        assert_eq!(samples(&out), vec![30, 5]);
    }

    #[test]
    fn decimation_ignores_holes_and_keeps_empty_blocks_empty() {
        let mut f = DecimationFilter::new(2);
        #[rustfmt::skip]
        let input = depth(4, 2, vec![
            0, 0,  0, 7,
            0, 0,  0, 0,
        ]);
        let out = f.process(input).unwrap();
        assert_eq!(samples(&out), vec![0, 7]);
    }

    #[test]
    fn decimation_uses_mean_for_large_magnitudes() {
        let mut f = DecimationFilter::new(4);
        let mut block = vec![100u16; 16];
        block[0] = 200;
        let out = f.process(depth(4, 4, block)).unwrap();
        // (200 + 15 * 100) / 16 = 106.25 → 106
        assert_eq!(samples(&out), vec![106]);
    }

    #[test]
    fn decimation_drops_partial_blocks() {
        let mut f = DecimationFilter::new(2);
        let out = f.process(depth(5, 3, vec![1; 15])).unwrap();
        assert_eq!((out.width, out.height), (2, 1));
        assert!(out.is_well_formed());
    }

    #[test]
    fn decimation_leaves_tiny_frames_alone() {
        let mut f = DecimationFilter::new(4);
        let input = depth(3, 3, vec![9; 9]);
        let out = f.process(input.clone()).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn decimation_magnitude_is_clamped() {
        assert_eq!(DecimationFilter::new(0).magnitude(), 1);
        assert_eq!(DecimationFilter::new(20).magnitude(), 8);
    }

    // ── Threshold ───────────────────────────────────────────────────────────

    #[test]
    fn threshold_removes_out_of_window_samples() {
        let mut f = ThresholdFilter::new(0.5, 2.0);
        let out = f
            .process(depth(5, 1, vec![0, 400, 600, 1990, 2010]))
            .unwrap();
        assert_eq!(samples(&out), vec![0, 0, 600, 1990, 0]);
    }

    #[test]
    fn inverted_threshold_window_removes_everything() {
        let mut f = ThresholdFilter::new(3.0, 1.0);
        let out = f.process(depth(3, 1, vec![500, 2000, 3500])).unwrap();
        assert_eq!(samples(&out), vec![0, 0, 0]);
    }

    #[test]
    fn threshold_passes_disparity_frames_through() {
        let mut f = ThresholdFilter::new(1.0, 2.0);
        let mut frame = depth(2, 1, vec![0, 0]);
        frame.pixels = PixelData::Disparity(vec![1000.0, 2.0]);
        let out = f.process(frame.clone()).unwrap();
        assert_eq!(out, frame);
    }

    // ── Disparity ───────────────────────────────────────────────────────────

    #[test]
    fn disparity_roundtrip_preserves_depth() {
        let mut fwd = DisparityTransform::to_disparity(DisparityTransform::DEFAULT_FACTOR);
        let mut inv = DisparityTransform::to_depth(DisparityTransform::DEFAULT_FACTOR);
        let input = depth(4, 1, vec![0, 300, 1500, 8000]);

        let disparity = fwd.process(input.clone()).unwrap();
        let PixelData::Disparity(values) = &disparity.pixels else {
            panic!("expected disparity domain");
        };
        assert_eq!(values[0], 0.0);
        // Nearer points have larger disparity.
        assert!(values[1] > values[2] && values[2] > values[3]);

        let back = inv.process(disparity).unwrap();
        for (a, b) in samples(&back).iter().zip(samples(&input).iter()) {
            assert!(a.abs_diff(*b) <= 1, "{a} vs {b}");
        }
    }

    #[test]
    fn transform_into_current_domain_is_noop() {
        let mut inv = DisparityTransform::to_depth(DisparityTransform::DEFAULT_FACTOR);
        let input = depth(2, 1, vec![10, 20]);
        assert_eq!(inv.process(input.clone()).unwrap(), input);
        assert!(!inv.is_forward());
    }

    #[test]
    fn disparity_rejects_non_positive_scale() {
        let mut fwd = DisparityTransform::to_disparity(DisparityTransform::DEFAULT_FACTOR);
        let mut frame = depth(1, 1, vec![10]);
        frame.depth_scale = 0.0;
        assert!(matches!(fwd.process(frame), Err(ScanError::MalformedFrame(_))));
    }

    // ── Spatial ─────────────────────────────────────────────────────────────

    #[test]
    fn spatial_smooths_small_steps() {
        let mut f = SpatialFilter::new(0.5, 20.0, 1);
        let out = f.process(depth(3, 1, vec![100, 110, 100])).unwrap();
        let s = samples(&out);
        assert!(s[1] < 110 && s[1] > 100, "middle sample smoothed: {s:?}");
    }

    #[test]
    fn spatial_preserves_edges_and_holes() {
        let mut f = SpatialFilter::new(0.5, 20.0, 2);
        let out = f.process(depth(4, 1, vec![100, 500, 0, 100])).unwrap();
        assert_eq!(samples(&out), vec![100, 500, 0, 100]);
    }

    #[test]
    fn spatial_leaves_uniform_frames_unchanged() {
        let mut f = SpatialFilter::default();
        let input = depth(3, 3, vec![777; 9]);
        assert_eq!(f.process(input.clone()).unwrap(), input);
    }

    // ── Temporal ────────────────────────────────────────────────────────────

    #[test]
    fn temporal_first_frame_passes_through() {
        let mut f = TemporalFilter::default();
        let input = depth(2, 1, vec![100, 0]);
        assert_eq!(f.process(input.clone()).unwrap(), input);
    }

    #[test]
    fn temporal_blends_with_previous_frame() {
        let mut f = TemporalFilter::new(0.5, 20.0);
        f.process(depth(3, 1, vec![100, 100, 0])).unwrap();
        let out = f.process(depth(3, 1, vec![110, 200, 50])).unwrap();
        // 110 blends, 200 is a jump, 50 had no history.
        assert_eq!(samples(&out), vec![105, 200, 50]);
    }

    #[test]
    fn temporal_history_resets_on_size_change() {
        let mut f = TemporalFilter::new(0.5, 20.0);
        f.process(depth(2, 1, vec![100, 100])).unwrap();
        let out = f.process(depth(1, 2, vec![110, 110])).unwrap();
        assert_eq!(samples(&out), vec![110, 110]);

        f.reset();
        let out = f.process(depth(1, 2, vec![90, 90])).unwrap();
        assert_eq!(samples(&out), vec![90, 90]);
    }

    // ── Options ─────────────────────────────────────────────────────────────

    #[test]
    fn option_support_matches_filter_kind() {
        let threshold = ThresholdFilter::default();
        assert!(threshold.supports(FilterOption::MinDistance));
        assert!(!threshold.supports(FilterOption::SmoothAlpha));
        assert_eq!(threshold.option(FilterOption::MaxDistance), Some(4.0));

        let spatial = SpatialFilter::default();
        assert!(spatial.supports(FilterOption::FilterMagnitude));
        assert!(!spatial.supports(FilterOption::MinDistance));

        let disparity = DisparityTransform::to_disparity(1.0);
        assert!(!disparity.supports(FilterOption::SmoothDelta));
    }

    #[test]
    fn filters_reject_malformed_frames() {
        let bad = depth(2, 2, vec![1]);
        assert!(DecimationFilter::default().process(bad.clone()).is_err());
        assert!(ThresholdFilter::default().process(bad.clone()).is_err());
        assert!(SpatialFilter::default().process(bad.clone()).is_err());
        assert!(TemporalFilter::default().process(bad).is_err());
    }
}
