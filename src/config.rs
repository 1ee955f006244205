use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureConfig {
    /// Minimum spacing between throttled captures.
    pub throttle_ms: u64,
    /// Hard cap on frames per session.
    pub max_frames: u32,
    /// Background capture interval; 0 disables periodic capture.
    pub periodic_capture_ms: u64,
    /// Inactivity before periodic capture pauses; 0 disables idle detection.
    pub idle_timeout_ms: u64,
    /// Periodic flush interval; 0 leaves flushing to explicit calls.
    pub flush_interval_ms: u64,
    /// Downscale frames wider than this before buffering.
    pub frame_max_width: Option<u32>,
    pub jpeg_quality: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 500,
            max_frames: 300,
            periodic_capture_ms: 2_000,
            idle_timeout_ms: 30_000,
            flush_interval_ms: 10_000,
            frame_max_width: None,
            jpeg_quality: 70,
        }
    }
}

impl CaptureConfig {
    pub fn periodic_interval(&self) -> Option<Duration> {
        non_zero_millis(self.periodic_capture_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.idle_timeout_ms)
    }

    pub fn flush_interval(&self) -> Option<Duration> {
        non_zero_millis(self.flush_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadConfig {
    pub endpoint: String,
    pub token: String,
    pub token_header: String,
    pub timeout_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000/api/sessions".into(),
            token: String::new(),
            token_header: "x-api-key".into(),
            timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ReplayConfig {
    /// Fraction of users captured, in `[0, 1]`.
    pub sample_rate: f64,
    pub capture: CaptureConfig,
    pub upload: UploadConfig,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            sample_rate: 1.0,
            capture: CaptureConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl ReplayConfig {
    /// Reads a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
