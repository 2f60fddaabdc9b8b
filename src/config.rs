//! Application settings.
//!
//! Handles loading, validating, and merging `config.toml`. The file lives in
//! the config directory (`~/.config/geosnap/` on Linux, overridable with
//! `--config-dir`). Stock defaults are the base layer; the user file only
//! needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! theme_mode = "auto"             # auto | light | dark
//!
//! [capture]
//! resolution = "camera"           # camera | 1920x1080 | 1280x720
//! image_quality = 0.8             # JPEG compression factor, 0.1-1.0
//! location_source = "gps_networks" # gps_only | gps_networks
//! auto_save = false               # Also save to the gallery after upload
//! preview_before_save = true      # Stop after capture and wait for "save"
//!
//! [overlay]
//! show_coordinates = true
//! show_date_time = true
//! coordinate_format = "decimal"   # degrees_minutes | decimal | both
//! decimal_places = 6              # 2-15
//! text_color = "#FFFFFF"
//! text_outline = true
//! text_position = "bottom-left"   # top-left | top-right | bottom-left | bottom-right | center
//! font_size = 16
//! queue_capacity = 8              # Pending compositions before new ones are rejected
//!
//! [drive]
//! root_folder = "Техосмотр"
//!
//! [reminder]
//! enabled = true
//! delay_secs = 1800
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{Quality, TextPosition, parse_hex_color};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "config.toml";

/// Overlay text heights offered to the user, in pixels.
pub const FONT_SIZE_RANGE: std::ops::RangeInclusive<u32> = 12..=32;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// User preferences read by every pipeline stage.
///
/// Passed by reference into each call; there is no global instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub theme_mode: ThemeMode,
    pub capture: CaptureConfig,
    pub overlay: OverlayConfig,
    pub drive: DriveConfig,
    pub subscription: SubscriptionConfig,
    pub gallery: GalleryConfig,
    pub reminder: ReminderConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeMode {
    #[default]
    Auto,
    Light,
    Dark,
}

/// Target resolution for uploaded photos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// Keep whatever the camera produced.
    #[default]
    #[serde(rename = "camera")]
    Camera,
    #[serde(rename = "1920x1080")]
    FullHd,
    #[serde(rename = "1280x720")]
    Hd,
}

impl Resolution {
    /// Fixed output size, or `None` to keep camera dimensions.
    pub fn target(self) -> Option<(u32, u32)> {
        match self {
            Self::Camera => None,
            Self::FullHd => Some((1920, 1080)),
            Self::Hd => Some((1280, 720)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    GpsOnly,
    #[default]
    GpsNetworks,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateFormat {
    DegreesMinutes,
    #[default]
    Decimal,
    Both,
}

/// Capture and post-processing preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    pub resolution: Resolution,
    /// JPEG compression factor in `0.1..=1.0`.
    pub image_quality: f64,
    pub location_source: LocationSource,
    pub auto_save: bool,
    pub preview_before_save: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::Camera,
            image_quality: 0.8,
            location_source: LocationSource::GpsNetworks,
            auto_save: false,
            preview_before_save: true,
        }
    }
}

impl CaptureConfig {
    pub fn set_image_quality(&mut self, value: f64) {
        self.image_quality = if value.is_nan() {
            Self::default().image_quality
        } else {
            value.clamp(0.1, 1.0)
        };
    }

    /// The compression factor as an encoder quality.
    pub fn quality(&self) -> Quality {
        Quality::from_fraction(self.image_quality)
    }
}

/// Text burned onto photos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverlayConfig {
    pub show_coordinates: bool,
    pub show_date_time: bool,
    pub coordinate_format: CoordinateFormat,
    /// Digits after the decimal point in decimal format (2-15).
    pub decimal_places: u32,
    /// `#RRGGBB` or `#RGB`.
    pub text_color: String,
    pub text_outline: bool,
    pub text_position: TextPosition,
    pub font_size: u32,
    /// Maximum number of compositions waiting for the renderer.
    pub queue_capacity: usize,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            show_coordinates: true,
            show_date_time: true,
            coordinate_format: CoordinateFormat::Decimal,
            decimal_places: 6,
            text_color: "#FFFFFF".to_string(),
            text_outline: true,
            text_position: TextPosition::BottomLeft,
            font_size: 16,
            queue_capacity: 8,
        }
    }
}

impl OverlayConfig {
    pub fn set_decimal_places(&mut self, value: u32) {
        self.decimal_places = value.clamp(2, 15);
    }

    pub fn set_font_size(&mut self, value: u32) {
        self.font_size = value.clamp(*FONT_SIZE_RANGE.start(), *FONT_SIZE_RANGE.end());
    }

    /// Parsed text color; falls back to white for an unparseable value.
    pub fn color(&self) -> [u8; 3] {
        parse_hex_color(&self.text_color).unwrap_or([255, 255, 255])
    }
}

/// Google Drive destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriveConfig {
    /// Top-level folder; date folders are created inside it.
    pub root_folder: String,
    pub api_base: String,
    pub upload_base: String,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            root_folder: "Техосмотр".to_string(),
            api_base: "https://www.googleapis.com/drive/v3".to_string(),
            upload_base: "https://www.googleapis.com/upload/drive/v3".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubscriptionConfig {
    pub status_url: String,
    pub payment_url: String,
    /// Minimum spacing between status requests.
    pub min_interval_secs: u64,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            status_url: "https://example.com/api/subscription/status".to_string(),
            payment_url: "https://example.com/payment".to_string(),
            min_interval_secs: 5,
        }
    }
}

/// Local copies of uploaded photos.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Where gallery saves go. When absent, `<Pictures>/geosnap`.
    pub directory: Option<String>,
}

impl GalleryConfig {
    pub fn resolved_directory(&self) -> PathBuf {
        match &self.directory {
            Some(dir) => PathBuf::from(dir),
            None => dirs::picture_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join("geosnap"),
        }
    }
}

/// "Take the second photo" reminder after an upload starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReminderConfig {
    pub enabled: bool,
    pub delay_secs: u64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_secs: 1800,
        }
    }
}

impl Settings {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let q = self.capture.image_quality;
        if !(0.1..=1.0).contains(&q) {
            return Err(ConfigError::Validation(
                "capture.image_quality must be 0.1-1.0".into(),
            ));
        }
        if !(2..=15).contains(&self.overlay.decimal_places) {
            return Err(ConfigError::Validation(
                "overlay.decimal_places must be 2-15".into(),
            ));
        }
        if !FONT_SIZE_RANGE.contains(&self.overlay.font_size) {
            return Err(ConfigError::Validation(format!(
                "overlay.font_size must be {}-{}",
                FONT_SIZE_RANGE.start(),
                FONT_SIZE_RANGE.end()
            )));
        }
        if parse_hex_color(&self.overlay.text_color).is_none() {
            return Err(ConfigError::Validation(format!(
                "overlay.text_color must be #RRGGBB or #RGB, got {:?}",
                self.overlay.text_color
            )));
        }
        if self.overlay.queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "overlay.queue_capacity must be at least 1".into(),
            ));
        }
        if self.drive.root_folder.trim().is_empty() {
            return Err(ConfigError::Validation(
                "drive.root_folder must not be empty".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Default config directory: `<config_dir>/geosnap`.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("geosnap")
}

/// Returns the stock default settings as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Settings::default()).expect("default settings must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<Settings, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let settings: Settings = merged.try_into()?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings from `config.toml` in the given directory.
pub fn load_config(dir: &Path) -> Result<Settings, ConfigError> {
    resolve_config(load_raw_config(dir)?)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# geosnap configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# UI theme of companion apps: "auto", "light" or "dark".
theme_mode = "auto"

# ---------------------------------------------------------------------------
# Capture and post-processing
# ---------------------------------------------------------------------------
[capture]
# Upload resolution. "camera" keeps the original size; "1920x1080" and
# "1280x720" stretch the photo to exactly that size.
resolution = "camera"

# JPEG compression factor, 0.1 (smallest) to 1.0 (best).
image_quality = 0.8

# "gps_only" asks for the highest accuracy fix; "gps_networks" accepts
# network-assisted (balanced) positioning.
location_source = "gps_networks"

# Also copy uploaded photos into the local gallery.
auto_save = false

# Stop after capture so the photo can be reviewed before "save".
preview_before_save = true

# ---------------------------------------------------------------------------
# Text overlay
# ---------------------------------------------------------------------------
[overlay]
show_coordinates = true
show_date_time = true

# "decimal" (55.751244; 37.618423), "degrees_minutes" (55° 45' 4.48" N ...)
# or "both" (rendered as decimal).
coordinate_format = "decimal"

# Digits after the decimal point, 2-15.
decimal_places = 6

text_color = "#FFFFFF"
text_outline = true

# "top-left", "top-right", "bottom-left", "bottom-right" or "center".
text_position = "bottom-left"

# Text height in pixels, 12-32.
font_size = 16

# Compositions allowed to wait for the renderer before new ones are rejected.
queue_capacity = 8

# ---------------------------------------------------------------------------
# Google Drive
# ---------------------------------------------------------------------------
[drive]
# Photos go to <root_folder>/<YYYY-MM-DD>/.
root_folder = "Техосмотр"
api_base = "https://www.googleapis.com/drive/v3"
upload_base = "https://www.googleapis.com/upload/drive/v3"

# ---------------------------------------------------------------------------
# Subscription
# ---------------------------------------------------------------------------
[subscription]
status_url = "https://example.com/api/subscription/status"
payment_url = "https://example.com/payment"
# At most one status request per this many seconds.
min_interval_secs = 5

# ---------------------------------------------------------------------------
# Gallery
# ---------------------------------------------------------------------------
[gallery]
# Directory for local copies. Defaults to <Pictures>/geosnap.
# directory = "/home/me/Pictures/geosnap"

# ---------------------------------------------------------------------------
# Reminder
# ---------------------------------------------------------------------------
[reminder]
# Remind to take the second photo after an upload starts.
enabled = true
delay_secs = 1800
"##
}
