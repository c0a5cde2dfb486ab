use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::capture::{DEFAULT_CAPTURE_COOLDOWN_MS, DEFAULT_STABILITY_THRESHOLD_PX};
use crate::detect::DetectorConfig;
use crate::sensor::OrientationConfig;

const DEFAULT_DB_PATH: &str = "sheetscan.db";
const DEFAULT_SOURCE_URL: &str = "synthetic://sheet";
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;

#[derive(Debug, Deserialize, Default)]
struct ScanConfigFile {
    db_path: Option<String>,
    vision_disabled: Option<bool>,
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    sensor: Option<SensorConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    fps: Option<u32>,
    min_contour_area_ratio: Option<f64>,
    max_contour_area_ratio: Option<f64>,
    approx_poly_epsilon: Option<f64>,
    stable_frames_threshold: Option<u32>,
    blur_threshold: Option<f64>,
    stability_threshold_px: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct SensorConfigFile {
    poll_interval_ms: Option<u64>,
    flat_tolerance_rad: Option<f64>,
    still_tolerance: Option<f64>,
    stability_duration_ms: Option<u64>,
    capture_cooldown_ms: Option<u64>,
}

/// Resolved daemon configuration: JSON file selected by `SHEETSCAN_CONFIG`,
/// then environment overrides, then validation. Immutable once a capture
/// session starts.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub db_path: String,
    pub source: SourceSettings,
    pub detector: DetectorConfig,
    pub stability_threshold_px: f64,
    pub sensor: OrientationConfig,
    pub capture_cooldown_ms: u64,
    /// Run the noop detector and rely on the orientation fallback.
    pub vision_disabled: bool,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl ScanConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SHEETSCAN_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ScanConfigFile) -> Self {
        let detector_defaults = DetectorConfig::default();
        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorConfig {
            fps: detector_file.fps.unwrap_or(detector_defaults.fps),
            min_contour_area_ratio: detector_file
                .min_contour_area_ratio
                .unwrap_or(detector_defaults.min_contour_area_ratio),
            max_contour_area_ratio: detector_file
                .max_contour_area_ratio
                .unwrap_or(detector_defaults.max_contour_area_ratio),
            approx_poly_epsilon: detector_file
                .approx_poly_epsilon
                .unwrap_or(detector_defaults.approx_poly_epsilon),
            stable_frames_threshold: detector_file
                .stable_frames_threshold
                .unwrap_or(detector_defaults.stable_frames_threshold),
            blur_threshold: detector_file
                .blur_threshold
                .unwrap_or(detector_defaults.blur_threshold),
        };

        let sensor_defaults = OrientationConfig::default();
        let sensor_file = file.sensor.unwrap_or_default();
        let sensor = OrientationConfig {
            poll_interval_ms: sensor_file
                .poll_interval_ms
                .unwrap_or(sensor_defaults.poll_interval_ms),
            flat_tolerance_rad: sensor_file
                .flat_tolerance_rad
                .unwrap_or(sensor_defaults.flat_tolerance_rad),
            still_tolerance: sensor_file
                .still_tolerance
                .unwrap_or(sensor_defaults.still_tolerance),
            stability_duration_ms: sensor_file
                .stability_duration_ms
                .unwrap_or(sensor_defaults.stability_duration_ms),
        };

        let source_file = file.source.unwrap_or_default();
        let source = SourceSettings {
            url: source_file
                .url
                .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            width: source_file.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
            height: source_file.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
        };

        Self {
            db_path: file.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            source,
            detector,
            stability_threshold_px: detector_file
                .stability_threshold_px
                .unwrap_or(DEFAULT_STABILITY_THRESHOLD_PX),
            sensor,
            capture_cooldown_ms: sensor_file
                .capture_cooldown_ms
                .unwrap_or(DEFAULT_CAPTURE_COOLDOWN_MS),
            vision_disabled: file.vision_disabled.unwrap_or(false),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("SHEETSCAN_DB_PATH") {
            if !path.trim().is_empty() {
                self.db_path = path;
            }
        }
        if let Ok(url) = std::env::var("SHEETSCAN_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(fps) = std::env::var("SHEETSCAN_FPS") {
            self.detector.fps = fps
                .parse()
                .map_err(|_| anyhow!("SHEETSCAN_FPS must be an integer frame rate"))?;
        }
        if let Ok(flag) = std::env::var("SHEETSCAN_VISION_DISABLED") {
            self.vision_disabled = matches!(flag.trim(), "1" | "true" | "yes");
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.detector.fps == 0 {
            return Err(anyhow!("detector fps must be greater than zero"));
        }
        if self.detector.min_contour_area_ratio <= 0.0
            || self.detector.max_contour_area_ratio > 1.0
            || self.detector.min_contour_area_ratio >= self.detector.max_contour_area_ratio
        {
            return Err(anyhow!(
                "contour area ratios must satisfy 0 < min < max <= 1"
            ));
        }
        if self.detector.approx_poly_epsilon <= 0.0 {
            return Err(anyhow!("approx_poly_epsilon must be positive"));
        }
        if self.detector.stable_frames_threshold == 0 {
            return Err(anyhow!("stable_frames_threshold must be at least 1"));
        }
        if self.stability_threshold_px <= 0.0 {
            return Err(anyhow!("stability_threshold_px must be positive"));
        }
        if self.sensor.poll_interval_ms == 0 || self.sensor.stability_duration_ms == 0 {
            return Err(anyhow!("sensor intervals must be greater than zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source dimensions must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ScanConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
