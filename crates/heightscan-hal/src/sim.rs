//! In-process simulated depth source for CI/CD testing without physical
//! hardware.
//!
//! [`SimDepthSource`] either renders a scrolling synthetic terrain (a sine
//! profile that advances one step per frame) or replays a scripted list of
//! frames. It can also be configured to behave like a device without a depth
//! sensor, or to start failing after a number of frames, so that the
//! processing loop's error paths can be exercised headlessly.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use heightscan_hal::depth_source::{DepthSource, StreamConfig};
//! use heightscan_hal::sim::SimDepthSource;
//!
//! let mut source = SimDepthSource::new("sim_depth").with_frame_interval(Duration::ZERO);
//! let session = source
//!     .start(&StreamConfig { width: 32, height: 16, fps: 30 })
//!     .expect("sim start must succeed");
//! let frame = source.wait_for_frame(Duration::from_millis(100)).unwrap();
//! assert_eq!(frame.width, 32);
//! assert!((session.depth_scale - 0.001).abs() < f32::EPSILON);
//! ```

use std::collections::VecDeque;
use std::f32::consts::PI;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use heightscan_types::{DepthFrame, PixelData, ScanError};
use tracing::{debug, info};

use crate::depth_source::{DepthSource, StreamConfig, StreamSession};

/// Depth scale reported by the simulated sensor (1 raw unit = 1 mm).
pub const SIM_DEPTH_SCALE: f32 = 0.001;

/// Distance, in metres, at which the simulated terrain is rendered.
const TERRAIN_DISTANCE_M: f32 = 1.5;

/// Phase advance of the terrain profile per frame.
const TERRAIN_PHASE_STEP: f32 = 2.0 * PI / 20.0;

enum Scene {
    Terrain { phase: f32 },
    Scripted(VecDeque<DepthFrame>),
}

/// A simulated depth camera.
pub struct SimDepthSource {
    id: String,
    depth_scale: f32,
    has_depth_sensor: bool,
    scene: Scene,
    fail_after: Option<u64>,
    frame_interval: Option<Duration>,
    session: Option<StreamSession>,
    delivered: u64,
    last_frame_at: Option<Instant>,
}

impl SimDepthSource {
    /// Create a terrain-rendering source paced at the stream's frame rate.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            depth_scale: SIM_DEPTH_SCALE,
            has_depth_sensor: true,
            scene: Scene::Terrain { phase: 0.0 },
            fail_after: None,
            frame_interval: None,
            session: None,
            delivered: 0,
            last_frame_at: None,
        }
    }

    /// Replay `frames` in order instead of rendering terrain. Once the script
    /// is exhausted every wait times out.
    pub fn with_frames(mut self, frames: impl IntoIterator<Item = DepthFrame>) -> Self {
        self.scene = Scene::Scripted(frames.into_iter().collect());
        self
    }

    /// Override the pacing derived from [`StreamConfig::fps`].
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    /// Override the reported depth scale.
    pub fn with_depth_scale(mut self, depth_scale: f32) -> Self {
        self.depth_scale = depth_scale;
        self
    }

    /// Behave like a device whose sensor list contains no depth sensor.
    pub fn without_depth_sensor(mut self) -> Self {
        self.has_depth_sensor = false;
        self
    }

    /// Deliver `frames` frames, then report an acquisition failure on every
    /// subsequent wait.
    pub fn fail_after(mut self, frames: u64) -> Self {
        self.fail_after = Some(frames);
        self
    }

    /// Number of frames delivered since [`start`][DepthSource::start].
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    fn render_terrain(&self, session: &StreamSession, phase: f32) -> Vec<u16> {
        let (w, h) = (session.width as usize, session.height as usize);
        let raw = (TERRAIN_DISTANCE_M / self.depth_scale).round() as u16;
        let mut samples = vec![0u16; w * h];
        for x in 0..w {
            let angle = 10.0 * PI * (x as f32 / w as f32) + phase;
            // Surface rises between h/8 and 3h/8 rows above the bottom edge.
            let surface = ((angle.sin() + 1.0) * h as f32 / 8.0 + h as f32 / 8.0) as usize;
            let top = h.saturating_sub(surface.min(h));
            for y in top..h {
                samples[y * w + x] = raw;
            }
        }
        samples
    }

    fn advance_phase(&mut self) -> f32 {
        match &mut self.scene {
            Scene::Terrain { phase } => {
                let current = *phase;
                *phase = (current + TERRAIN_PHASE_STEP) % (2.0 * PI);
                current
            }
            Scene::Scripted(_) => 0.0,
        }
    }

    fn pace(&self, interval: Duration, timeout: Duration) -> Result<(), ScanError> {
        let wait = match self.last_frame_at {
            Some(last) => (last + interval).saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        };
        if wait > timeout {
            thread::sleep(timeout);
            return Err(self.timeout_error(timeout));
        }
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        Ok(())
    }

    fn timeout_error(&self, timeout: Duration) -> ScanError {
        ScanError::AcquisitionTimeout {
            source_id: self.id.clone(),
            waited_ms: timeout.as_millis() as u64,
        }
    }
}

impl DepthSource for SimDepthSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn start(&mut self, config: &StreamConfig) -> Result<StreamSession, ScanError> {
        if !self.has_depth_sensor {
            return Err(ScanError::DeviceNotFound(format!(
                "{} does not have a depth sensor",
                self.id
            )));
        }
        if self.frame_interval.is_none() {
            self.frame_interval = Some(config.frame_interval());
        }
        let session = StreamSession {
            depth_scale: self.depth_scale,
            width: config.width,
            height: config.height,
        };
        info!(
            source = %self.id,
            width = session.width,
            height = session.height,
            fps = config.fps,
            "simulated depth stream started"
        );
        self.session = Some(session);
        self.delivered = 0;
        self.last_frame_at = None;
        Ok(session)
    }

    fn wait_for_frame(&mut self, timeout: Duration) -> Result<DepthFrame, ScanError> {
        let Some(session) = self.session else {
            return Err(ScanError::AcquisitionFailed {
                source_id: self.id.clone(),
                details: "stream not started".to_string(),
            });
        };
        if self.fail_after.is_some_and(|n| self.delivered >= n) {
            return Err(ScanError::AcquisitionFailed {
                source_id: self.id.clone(),
                details: "simulated device disconnect".to_string(),
            });
        }

        let interval = self.frame_interval.unwrap_or_default();
        let frame_number = self.delivered + 1;

        let mut frame = if let Scene::Scripted(frames) = &mut self.scene {
            match frames.pop_front() {
                Some(frame) => frame,
                None => {
                    thread::sleep(timeout);
                    return Err(self.timeout_error(timeout));
                }
            }
        } else {
            self.pace(interval, timeout)?;
            let phase = self.advance_phase();
            DepthFrame {
                frame_number: 0,
                timestamp: Utc::now(),
                width: session.width,
                height: session.height,
                depth_scale: self.depth_scale,
                pixels: PixelData::Depth(self.render_terrain(&session, phase)),
            }
        };

        frame.frame_number = frame_number;
        self.delivered = frame_number;
        self.last_frame_at = Some(Instant::now());
        debug!(source = %self.id, frame = frame_number, "simulated frame delivered");
        Ok(frame)
    }

    fn stop(&mut self) {
        if self.session.take().is_some() {
            info!(source = %self.id, frames = self.delivered, "simulated depth stream stopped");
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> StreamConfig {
        StreamConfig {
            width: 40,
            height: 16,
            fps: 30,
        }
    }

    #[test]
    fn terrain_frame_matches_requested_dimensions() {
        let mut src = SimDepthSource::new("sim").with_frame_interval(Duration::ZERO);
        src.start(&small_config()).unwrap();
        let frame = src.wait_for_frame(Duration::from_millis(50)).unwrap();
        assert_eq!(frame.width, 40);
        assert_eq!(frame.height, 16);
        assert!(frame.is_well_formed());
        assert_eq!(frame.frame_number, 1);
    }

    #[test]
    fn terrain_bottom_row_is_always_valid() {
        let mut src = SimDepthSource::new("sim").with_frame_interval(Duration::ZERO);
        src.start(&small_config()).unwrap();
        let frame = src.wait_for_frame(Duration::from_millis(50)).unwrap();
        let samples = frame.depth_samples().unwrap();
        let bottom = &samples[15 * 40..];
        assert!(bottom.iter().all(|&s| s == 1500));
        // Top row is above the tallest possible surface.
        assert!(samples[..40].iter().all(|&s| s == 0));
    }

    #[test]
    fn terrain_scrolls_between_frames() {
        let mut src = SimDepthSource::new("sim").with_frame_interval(Duration::ZERO);
        src.start(&small_config()).unwrap();
        let a = src.wait_for_frame(Duration::from_millis(50)).unwrap();
        let b = src.wait_for_frame(Duration::from_millis(50)).unwrap();
        assert_ne!(a.pixels, b.pixels);
        assert_eq!(b.frame_number, 2);
    }

    #[test]
    fn missing_depth_sensor_fails_start() {
        let mut src = SimDepthSource::new("rgb_only").without_depth_sensor();
        let err = src.start(&small_config()).unwrap_err();
        assert!(matches!(err, ScanError::DeviceNotFound(_)));
    }

    #[test]
    fn wait_before_start_fails() {
        let mut src = SimDepthSource::new("sim");
        let err = src.wait_for_frame(Duration::from_millis(1)).unwrap_err();
        assert!(matches!(err, ScanError::AcquisitionFailed { .. }));
    }

    #[test]
    fn scripted_frames_replay_then_time_out() {
        let frame = DepthFrame::from_depth(2, 2, SIM_DEPTH_SCALE, vec![0, 1, 2, 3]);
        let mut src = SimDepthSource::new("script").with_frames(vec![frame.clone()]);
        src.start(&small_config()).unwrap();

        let got = src.wait_for_frame(Duration::from_millis(5)).unwrap();
        assert_eq!(got.pixels, frame.pixels);

        let err = src.wait_for_frame(Duration::from_millis(5)).unwrap_err();
        assert!(matches!(err, ScanError::AcquisitionTimeout { waited_ms: 5, .. }));
    }

    #[test]
    fn fail_after_reports_disconnect() {
        let mut src = SimDepthSource::new("flaky")
            .with_frame_interval(Duration::ZERO)
            .fail_after(1);
        src.start(&small_config()).unwrap();
        assert!(src.wait_for_frame(Duration::from_millis(5)).is_ok());
        let err = src.wait_for_frame(Duration::from_millis(5)).unwrap_err();
        assert!(matches!(err, ScanError::AcquisitionFailed { .. }));
        assert_eq!(src.delivered(), 1);
    }

    #[test]
    fn slow_source_times_out_within_bound() {
        let mut src = SimDepthSource::new("slow").with_frame_interval(Duration::from_secs(10));
        src.start(&small_config()).unwrap();
        // First frame is immediate, the second would take 10 s.
        src.wait_for_frame(Duration::from_millis(5)).unwrap();
        let started = Instant::now();
        let err = src.wait_for_frame(Duration::from_millis(20)).unwrap_err();
        assert!(err.is_acquisition());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn stop_ends_the_session() {
        let mut src = SimDepthSource::new("sim").with_frame_interval(Duration::ZERO);
        src.start(&small_config()).unwrap();
        src.stop();
        assert!(src.wait_for_frame(Duration::from_millis(1)).is_err());
        // Second stop is a no-op.
        src.stop();
    }
}
