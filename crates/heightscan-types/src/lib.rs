use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pixel payload of a frame in flight through the filter chain.
///
/// Sources always deliver [`PixelData::Depth`]; the disparity transform
/// converts to [`PixelData::Disparity`] and its inverse converts back.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    /// Raw depth units, multiply by the frame's `depth_scale` for metres.
    Depth(Vec<u16>),
    /// Disparity values (inverse distance); `0.0` marks an invalid pixel.
    Disparity(Vec<f32>),
}

impl PixelData {
    /// Number of pixels in the buffer.
    pub fn len(&self) -> usize {
        match self {
            PixelData::Depth(d) => d.len(),
            PixelData::Disparity(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` while the payload is in the disparity domain.
    pub fn is_disparity(&self) -> bool {
        matches!(self, PixelData::Disparity(_))
    }
}

/// A single depth frame: a row-major buffer plus the metadata needed to turn
/// raw samples into metric distances.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthFrame {
    /// Monotonic frame counter assigned by the source.
    pub frame_number: u64,
    /// Capture time reported by the source.
    pub timestamp: DateTime<Utc>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Metres per raw depth unit. Constant for a streaming session.
    pub depth_scale: f32,
    /// Row-major pixel payload, `width * height` entries.
    pub pixels: PixelData,
}

impl DepthFrame {
    /// Build a depth-domain frame from raw samples.
    pub fn from_depth(width: u32, height: u32, depth_scale: f32, samples: Vec<u16>) -> Self {
        Self {
            frame_number: 0,
            timestamp: Utc::now(),
            width,
            height,
            depth_scale,
            pixels: PixelData::Depth(samples),
        }
    }

    /// Number of pixels implied by the frame dimensions.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// `true` when the buffer length agrees with `width * height`.
    pub fn is_well_formed(&self) -> bool {
        self.pixels.len() == self.pixel_count()
    }

    /// Raw depth samples, or `None` while the frame is in the disparity domain.
    pub fn depth_samples(&self) -> Option<&[u16]> {
        match &self.pixels {
            PixelData::Depth(d) => Some(d),
            PixelData::Disparity(_) => None,
        }
    }
}

/// One processed frame as published on the output channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightmapSample {
    pub frame_number: u64,
    pub timestamp: DateTime<Utc>,
    /// Width of the filtered frame; equals `heightmap.len()`.
    pub width: u32,
    /// Height of the filtered frame.
    pub height: u32,
    /// Per-column height above the bottom edge; `0` means no valid reading.
    pub heightmap: Vec<i32>,
}

/// Error type shared by every heightscan crate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScanError {
    #[error("Device Not Found: {0}")]
    DeviceNotFound(String),

    #[error("Acquisition Timeout on {source_id} after {waited_ms} ms")]
    AcquisitionTimeout { source_id: String, waited_ms: u64 },

    #[error("Acquisition Failure on {source_id}: {details}")]
    AcquisitionFailed { source_id: String, details: String },

    #[error("Malformed Frame: {0}")]
    MalformedFrame(String),

    #[error("Invalid Option {option} = {value} for stage {stage}")]
    InvalidOption {
        stage: String,
        option: String,
        value: f32,
    },

    #[error("Unknown Filter Stage: {0}")]
    UnknownStage(String),

    #[error("A processing worker is already running for this session")]
    WorkerAlreadyRunning,

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}

impl ScanError {
    /// `true` for errors raised while waiting on the frame source, which the
    /// processing loop retries before giving up.
    pub fn is_acquisition(&self) -> bool {
        matches!(
            self,
            ScanError::AcquisitionTimeout { .. } | ScanError::AcquisitionFailed { .. }
        )
    }
}
