//! Collapse a filtered depth frame into a 1-D height profile.
//!
//! For every column the result is `height - 1 - y`, where `y` is the topmost
//! row holding a valid sample (`depth_scale * raw > 0`). Columns without any
//! valid sample stay at `0`.
//!
//! Rows are scanned in parallel with rayon. Each column slot only ever grows
//! via `fetch_max`, and a smaller `y` always maps to a larger value, so the
//! topmost hit wins no matter which row finishes first.

use std::sync::atomic::{AtomicI32, Ordering};

use heightscan_types::{DepthFrame, ScanError};
use rayon::prelude::*;

/// Build the heightmap for `frame`, returning `frame.width` entries.
///
/// # Errors
///
/// Returns [`ScanError::MalformedFrame`] if the frame is still in the
/// disparity domain or its buffer length disagrees with its dimensions.
pub fn build_heightmap(frame: &DepthFrame, depth_scale: f32) -> Result<Vec<i32>, ScanError> {
    let samples = frame.depth_samples().ok_or_else(|| {
        ScanError::MalformedFrame(format!(
            "frame {} is still in the disparity domain",
            frame.frame_number
        ))
    })?;
    if !frame.is_well_formed() {
        return Err(ScanError::MalformedFrame(format!(
            "frame {} has {} samples, expected {}x{}",
            frame.frame_number,
            samples.len(),
            frame.width,
            frame.height
        )));
    }

    let width = frame.width as usize;
    let height = frame.height as usize;
    if width == 0 || height == 0 {
        return Ok(vec![0; width]);
    }

    let columns: Vec<AtomicI32> = (0..width).map(|_| AtomicI32::new(0)).collect();
    samples
        .par_chunks(width)
        .enumerate()
        .for_each(|(y, row)| {
            let value = (height - 1 - y) as i32;
            for (slot, &raw) in columns.iter().zip(row) {
                let distance = depth_scale * raw as f32;
                if distance > 0.0 {
                    slot.fetch_max(value, Ordering::Relaxed);
                }
            }
        });

    Ok(columns.into_iter().map(AtomicI32::into_inner).collect())
}
