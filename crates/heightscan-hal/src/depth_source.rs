//! Generic `DepthSource` trait and supporting types for depth-capture hardware.

use std::time::Duration;

use heightscan_types::{DepthFrame, ScanError};

/// Stream parameters requested from a depth source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Requested frame width in pixels.
    pub width: u32,
    /// Requested frame height in pixels.
    pub height: u32,
    /// Requested frame rate in frames per second.
    pub fps: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

impl StreamConfig {
    /// Nominal time between two frames at the requested rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }
}

/// Properties of a started stream that stay constant until it is stopped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamSession {
    /// Metres per raw depth unit, as reported by the depth sensor.
    pub depth_scale: f32,
    /// Negotiated frame width.
    pub width: u32,
    /// Negotiated frame height.
    pub height: u32,
}

/// A depth camera or any other producer of [`DepthFrame`]s.
///
/// Implementations own the device handle. The processing loop calls
/// [`start`][Self::start] once, then [`wait_for_frame`][Self::wait_for_frame]
/// repeatedly from its worker thread.
pub trait DepthSource: Send {
    /// Stable identifier for this source, e.g. `"front_depth"`.
    fn id(&self) -> &str;

    /// Configure and start streaming.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::DeviceNotFound`] if the device has no depth
    /// sensor, or [`ScanError::AcquisitionFailed`] if the stream cannot be
    /// opened.
    fn start(&mut self, config: &StreamConfig) -> Result<StreamSession, ScanError>;

    /// Block until the next frame arrives or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::AcquisitionTimeout`] when no frame arrived in
    /// time and [`ScanError::AcquisitionFailed`] when the device reported an
    /// error.
    fn wait_for_frame(&mut self, timeout: Duration) -> Result<DepthFrame, ScanError>;

    /// Stop streaming and release the device. Safe to call more than once.
    fn stop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockDepthSource {
        id: String,
        started: bool,
    }

    impl DepthSource for MockDepthSource {
        fn id(&self) -> &str {
            &self.id
        }

        fn start(&mut self, config: &StreamConfig) -> Result<StreamSession, ScanError> {
            self.started = true;
            Ok(StreamSession {
                depth_scale: 0.001,
                width: config.width,
                height: config.height,
            })
        }

        fn wait_for_frame(&mut self, _timeout: Duration) -> Result<DepthFrame, ScanError> {
            Ok(DepthFrame::from_depth(2, 2, 0.001, vec![0u16; 4]))
        }
    }

    #[test]
    fn mock_source_start_and_capture() {
        let mut src = MockDepthSource {
            id: "front_depth".to_string(),
            started: false,
        };
        assert_eq!(src.id(), "front_depth");
        let session = src.start(&StreamConfig::default()).unwrap();
        assert!(src.started);
        assert_eq!(session.width, 640);
        let frame = src.wait_for_frame(Duration::from_millis(10)).unwrap();
        assert_eq!(frame.width, 2);
        assert_eq!(frame.pixel_count(), 4);
        src.stop();
    }

    #[test]
    fn frame_interval_follows_fps() {
        let cfg = StreamConfig {
            fps: 20,
            ..StreamConfig::default()
        };
        assert_eq!(cfg.frame_interval(), Duration::from_millis(50));
    }

    #[test]
    fn zero_fps_does_not_divide_by_zero() {
        let cfg = StreamConfig {
            fps: 0,
            ..StreamConfig::default()
        };
        assert_eq!(cfg.frame_interval(), Duration::from_secs(1));
    }
}
