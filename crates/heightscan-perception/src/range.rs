//! Shared distance window gating the threshold stage.
//!
//! [`RangeParameters`] is written by the control plane at arbitrary times and
//! read once per frame by the processing loop. Each bound is an independent
//! atomic; the pair is never read or written as a transaction, so a reader may
//! briefly observe a new `min` with an old `max`. That window lasts at most one
//! frame and corrects itself on the next snapshot.
//!
//! # Example
//!
//! ```rust
//! use heightscan_perception::range::RangeParameters;
//!
//! let range = RangeParameters::default();
//! range.set_distance_range(-5.0, 20.0);
//! assert_eq!(range.get_min_distance(), 0.0);
//! assert_eq!(range.get_max_distance(), 16.0);
//!
//! range.update_distance_range(0.25, -1.0);
//! assert_eq!(range.get_min_distance(), 0.3);
//! assert_eq!(range.get_max_distance(), 15.0);
//! ```

use std::sync::atomic::{AtomicU32, Ordering};

use tracing::debug;

use crate::filters::ThresholdFilter;

/// Smallest distance, in metres, either bound may take.
pub const MIN_LIMIT: f32 = 0.0;
/// Largest distance, in metres, either bound may take.
pub const MAX_LIMIT: f32 = 16.0;

/// A point-in-time copy of both bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceRange {
    pub min: f32,
    pub max: f32,
}

/// Clamp to `[MIN_LIMIT, MAX_LIMIT]` and round to the nearest tenth.
///
/// NaN is treated as `0.0`.
pub fn normalize_distance(value: f32) -> f32 {
    let value = if value.is_nan() { 0.0 } else { value };
    (value.clamp(MIN_LIMIT, MAX_LIMIT) * 10.0).round() / 10.0
}

/// Lock-free pair of clamped, rounded distance bounds.
#[derive(Debug)]
pub struct RangeParameters {
    min_bits: AtomicU32,
    max_bits: AtomicU32,
}

impl RangeParameters {
    /// Create a window; both inputs go through [`normalize_distance`].
    pub fn new(min_distance: f32, max_distance: f32) -> Self {
        Self {
            min_bits: AtomicU32::new(normalize_distance(min_distance).to_bits()),
            max_bits: AtomicU32::new(normalize_distance(max_distance).to_bits()),
        }
    }

    /// Clamp and round each bound independently, then store. Never fails.
    pub fn set_distance_range(&self, min_distance: f32, max_distance: f32) {
        let min = normalize_distance(min_distance);
        let max = normalize_distance(max_distance);
        self.min_bits.store(min.to_bits(), Ordering::Release);
        self.max_bits.store(max.to_bits(), Ordering::Release);
        debug!(min, max, "distance range updated");
    }

    /// Shift both bounds by the given deltas, with the same clamping and
    /// rounding as [`set_distance_range`][Self::set_distance_range].
    pub fn update_distance_range(&self, delta_min: f32, delta_max: f32) {
        let min = self.get_min_distance() + delta_min;
        let max = self.get_max_distance() + delta_max;
        self.set_distance_range(min, max);
    }

    pub fn get_min_distance(&self) -> f32 {
        f32::from_bits(self.min_bits.load(Ordering::Acquire))
    }

    pub fn get_max_distance(&self) -> f32 {
        f32::from_bits(self.max_bits.load(Ordering::Acquire))
    }

    /// Read both bounds. Not atomic as a pair.
    pub fn snapshot(&self) -> DistanceRange {
        DistanceRange {
            min: self.get_min_distance(),
            max: self.get_max_distance(),
        }
    }
}

impl Default for RangeParameters {
    fn default() -> Self {
        Self::new(
            ThresholdFilter::DEFAULT_MIN_DISTANCE,
            ThresholdFilter::DEFAULT_MAX_DISTANCE,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn is_tenth(v: f32) -> bool {
        ((v * 10.0).round() / 10.0 - v).abs() < 1e-6
    }

    #[test]
    fn defaults_match_threshold_filter() {
        let range = RangeParameters::default();
        assert_eq!(range.get_min_distance(), 0.1);
        assert_eq!(range.get_max_distance(), 4.0);
    }

    #[test]
    fn out_of_range_input_is_clamped() {
        let range = RangeParameters::default();
        range.set_distance_range(-5.0, 20.0);
        assert_eq!(range.get_min_distance(), 0.0);
        assert_eq!(range.get_max_distance(), 16.0);
    }

    #[test]
    fn bounds_round_to_nearest_tenth() {
        let range = RangeParameters::default();
        range.set_distance_range(0.37, 0.44);
        assert_eq!(range.get_min_distance(), 0.4);
        assert_eq!(range.get_max_distance(), 0.4);
    }

    #[test]
    fn nan_and_infinities_are_absorbed() {
        let range = RangeParameters::default();
        range.set_distance_range(f32::NAN, f32::INFINITY);
        assert_eq!(range.get_min_distance(), 0.0);
        assert_eq!(range.get_max_distance(), 16.0);
        range.set_distance_range(f32::NEG_INFINITY, f32::NAN);
        assert_eq!(range.snapshot(), DistanceRange { min: 0.0, max: 0.0 });
    }

    #[test]
    fn every_input_lands_on_a_tenth_within_limits() {
        let range = RangeParameters::default();
        let mut v = -20.0f32;
        while v < 20.0 {
            range.set_distance_range(v, -v);
            for bound in [range.get_min_distance(), range.get_max_distance()] {
                assert!((MIN_LIMIT..=MAX_LIMIT).contains(&bound), "{v} -> {bound}");
                assert!(is_tenth(bound), "{v} -> {bound}");
            }
            v += 0.137;
        }
    }

    #[test]
    fn update_is_set_with_shifted_values() {
        let cases = [
            (1.0, 3.0, 0.25, -0.5),
            (0.1, 4.0, -1.0, 20.0),
            (15.9, 0.0, 0.3, 0.04),
            (2.2, 2.2, 0.0, 0.0),
        ];
        for (a, b, d1, d2) in cases {
            let updated = RangeParameters::default();
            updated.set_distance_range(a, b);
            let base = updated.snapshot();
            updated.update_distance_range(d1, d2);

            let expected = RangeParameters::default();
            expected.set_distance_range(base.min + d1, base.max + d2);
            assert_eq!(updated.snapshot(), expected.snapshot());
        }
    }

    #[test]
    fn concurrent_writers_never_produce_unnormalized_values() {
        let range = Arc::new(RangeParameters::default());
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let range = Arc::clone(&range);
                thread::spawn(move || {
                    for step in 0..500 {
                        let v = (i * 500 + step) as f32 * 0.013 - 3.0;
                        range.set_distance_range(v, v * 2.0);
                        range.update_distance_range(0.05, -0.05);
                    }
                })
            })
            .collect();

        for _ in 0..2000 {
            let snap = range.snapshot();
            assert!((MIN_LIMIT..=MAX_LIMIT).contains(&snap.min));
            assert!((MIN_LIMIT..=MAX_LIMIT).contains(&snap.max));
        }
        for w in writers {
            w.join().unwrap();
        }
        assert!(is_tenth(range.get_min_distance()));
        assert!(is_tenth(range.get_max_distance()));
    }
}
