//! Configuration Vault – reads/writes `~/.heightscan/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use heightscan_hal::StreamConfig;
use heightscan_perception::chain::FilterSettings;
use heightscan_runtime::LoopConfig;

/// Persisted user configuration stored in `~/.heightscan/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Requested depth stream width in pixels.
    #[serde(default = "default_stream_width")]
    pub stream_width: u32,

    /// Requested depth stream height in pixels.
    #[serde(default = "default_stream_height")]
    pub stream_height: u32,

    /// Requested frame rate.
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Initial near bound of the distance window, in metres.
    #[serde(default = "default_min_distance")]
    pub min_distance: f32,

    /// Initial far bound of the distance window, in metres.
    #[serde(default = "default_max_distance")]
    pub max_distance: f32,

    /// Upper bound on a single frame wait.
    #[serde(default = "default_acquisition_timeout_ms")]
    pub acquisition_timeout_ms: u64,

    /// Consecutive acquisition failures tolerated before the scan stops.
    #[serde(default = "default_max_acquisition_retries")]
    pub max_acquisition_retries: u32,

    /// Samples buffered per consumer before the oldest are dropped.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Print every N-th heightmap.
    #[serde(default = "default_print_every")]
    pub print_every: u64,

    /// Print heightmaps as JSON lines instead of a summary.
    #[serde(default)]
    pub emit_json: bool,

    /// Filter stages disabled at startup, e.g. `["Temporal"]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_filters: Vec<String>,

    #[serde(default = "default_decimation_magnitude")]
    pub decimation_magnitude: u32,

    #[serde(default = "default_spatial_alpha")]
    pub spatial_alpha: f32,

    #[serde(default = "default_spatial_delta")]
    pub spatial_delta: f32,

    #[serde(default = "default_temporal_alpha")]
    pub temporal_alpha: f32,

    #[serde(default = "default_temporal_delta")]
    pub temporal_delta: f32,
}

fn default_stream_width() -> u32 {
    StreamConfig::default().width
}
fn default_stream_height() -> u32 {
    StreamConfig::default().height
}
fn default_fps() -> u32 {
    StreamConfig::default().fps
}
fn default_min_distance() -> f32 {
    0.1
}
fn default_max_distance() -> f32 {
    4.0
}
fn default_acquisition_timeout_ms() -> u64 {
    LoopConfig::default().acquisition_timeout.as_millis() as u64
}
fn default_max_acquisition_retries() -> u32 {
    LoopConfig::default().max_acquisition_retries
}
fn default_channel_capacity() -> usize {
    heightscan_middleware::bus::DEFAULT_CAPACITY
}
fn default_print_every() -> u64 {
    30
}
fn default_decimation_magnitude() -> u32 {
    FilterSettings::default().decimation_magnitude
}
fn default_spatial_alpha() -> f32 {
    FilterSettings::default().spatial_alpha
}
fn default_spatial_delta() -> f32 {
    FilterSettings::default().spatial_delta
}
fn default_temporal_alpha() -> f32 {
    FilterSettings::default().temporal_alpha
}
fn default_temporal_delta() -> f32 {
    FilterSettings::default().temporal_delta
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stream_width: default_stream_width(),
            stream_height: default_stream_height(),
            fps: default_fps(),
            min_distance: default_min_distance(),
            max_distance: default_max_distance(),
            acquisition_timeout_ms: default_acquisition_timeout_ms(),
            max_acquisition_retries: default_max_acquisition_retries(),
            channel_capacity: default_channel_capacity(),
            print_every: default_print_every(),
            emit_json: false,
            disabled_filters: Vec::new(),
            decimation_magnitude: default_decimation_magnitude(),
            spatial_alpha: default_spatial_alpha(),
            spatial_delta: default_spatial_delta(),
            temporal_alpha: default_temporal_alpha(),
            temporal_delta: default_temporal_delta(),
        }
    }
}

impl Config {
    /// Processing-loop settings derived from this config.
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            stream: StreamConfig {
                width: self.stream_width,
                height: self.stream_height,
                fps: self.fps,
            },
            acquisition_timeout: Duration::from_millis(self.acquisition_timeout_ms),
            max_acquisition_retries: self.max_acquisition_retries,
            ..LoopConfig::default()
        }
    }

    /// Filter-chain settings derived from this config.
    pub fn filter_settings(&self) -> FilterSettings {
        FilterSettings {
            decimation_magnitude: self.decimation_magnitude,
            spatial_alpha: self.spatial_alpha,
            spatial_delta: self.spatial_delta,
            temporal_alpha: self.temporal_alpha,
            temporal_delta: self.temporal_delta,
            ..FilterSettings::default()
        }
    }
}

/// Return the path to `~/.heightscan/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".heightscan").join("config.toml")
}

/// Load the config from disk. Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `HEIGHTSCAN_*` environment variable overrides to `cfg`. Values
/// that do not parse are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `HEIGHTSCAN_MIN_DISTANCE` | `min_distance` |
/// | `HEIGHTSCAN_MAX_DISTANCE` | `max_distance` |
/// | `HEIGHTSCAN_FPS` | `fps` |
/// | `HEIGHTSCAN_EMIT_JSON` | `emit_json` (`true`/`false`/`1`/`0`) |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("HEIGHTSCAN_MIN_DISTANCE")
        && let Ok(d) = v.trim().parse::<f32>()
    {
        cfg.min_distance = d;
    }
    if let Ok(v) = std::env::var("HEIGHTSCAN_MAX_DISTANCE")
        && let Ok(d) = v.trim().parse::<f32>()
    {
        cfg.max_distance = d;
    }
    if let Ok(v) = std::env::var("HEIGHTSCAN_FPS")
        && let Ok(fps) = v.trim().parse::<u32>()
    {
        cfg.fps = fps;
    }
    if let Ok(v) = std::env::var("HEIGHTSCAN_EMIT_JSON") {
        match v.trim() {
            "1" | "true" => cfg.emit_json = true,
            "0" | "false" => cfg.emit_json = false,
            _ => {}
        }
    }
}

/// Save the config to disk, creating `~/.heightscan/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
