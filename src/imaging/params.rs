//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides what files to produce) and the [`backend`](super::backend)
//! (which does the actual pixel work). This separation allows swapping backends
//! (e.g. for testing with a mock) without changing pipeline logic.
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality (1–100, default 90). Clamped on construction.
//! - [`TextPosition`]: Where the burned-in text block is anchored.
//! - [`EncodeParams`]: Re-encode a photo as JPEG, optionally resizing to exact dimensions.
//! - [`OverlayParams`]: Cover-fit a photo to a canvas and burn text lines onto it.
//! - [`ExifParams`]: Copy a JPEG while replacing its EXIF block.

use super::exif::ExifTags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    /// Highest quality; used when an intermediate file must not lose detail.
    pub const MAX: Quality = Quality(100);

    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    /// Convert a `0.0..=1.0` compression factor into a JPEG quality.
    pub fn from_fraction(fraction: f64) -> Self {
        if !fraction.is_finite() {
            return Self::default();
        }
        Self::new((fraction * 100.0).round().max(0.0) as u32)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Anchor of the overlay text block on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextPosition {
    TopLeft,
    TopRight,
    #[default]
    BottomLeft,
    BottomRight,
    Center,
}

impl TextPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
            Self::Center => "center",
        }
    }
}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TextPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top-left" => Ok(Self::TopLeft),
            "top-right" => Ok(Self::TopRight),
            "bottom-left" => Ok(Self::BottomLeft),
            "bottom-right" => Ok(Self::BottomRight),
            "center" => Ok(Self::Center),
            other => Err(format!("unknown text position: {other}")),
        }
    }
}

/// Parse a `#RRGGBB` or `#RGB` color string.
pub fn parse_hex_color(value: &str) -> Option<[u8; 3]> {
    let hex = value.strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        6 => Some([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        ]),
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                rgb[i] = v * 17;
            }
            Some(rgb)
        }
        _ => None,
    }
}

/// Re-encode a photo as JPEG.
///
/// With `resize` set the output has exactly those dimensions (the image is
/// stretched, aspect ratio is not preserved). Without it the original pixel
/// dimensions are kept and only the compression changes.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub resize: Option<(u32, u32)>,
    pub quality: Quality,
}

/// Burn text lines onto a photo.
///
/// The source is scaled to cover `width`×`height` and center-cropped, then the
/// text block is drawn at `position`. Output is always a JPEG at
/// [`Quality::MAX`].
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub lines: Vec<String>,
    pub position: TextPosition,
    /// Text height in pixels.
    pub font_size: u32,
    pub color: [u8; 3],
    /// Draw a translucent dark halo behind the glyphs.
    pub outline: bool,
}

/// Copy a JPEG to `output`, replacing any EXIF block with `tags`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExifParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub tags: ExifTags,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_90() {
        assert_eq!(Quality::default().value(), 90);
    }

    #[test]
    fn quality_from_fraction() {
        assert_eq!(Quality::from_fraction(0.8).value(), 80);
        assert_eq!(Quality::from_fraction(1.0).value(), 100);
        assert_eq!(Quality::from_fraction(0.1).value(), 10);
        assert_eq!(Quality::from_fraction(0.0).value(), 1);
        assert_eq!(Quality::from_fraction(f64::NAN), Quality::default());
    }

    #[test]
    fn text_position_parses_kebab_case() {
        assert_eq!("top-right".parse::<TextPosition>(), Ok(TextPosition::TopRight));
        assert_eq!("center".parse::<TextPosition>(), Ok(TextPosition::Center));
        assert!("middle".parse::<TextPosition>().is_err());
        assert_eq!(TextPosition::BottomLeft.to_string(), "bottom-left");
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#FFFFFF"), Some([255, 255, 255]));
        assert_eq!(parse_hex_color("#1a2B3c"), Some([0x1a, 0x2b, 0x3c]));
        assert_eq!(parse_hex_color("#f00"), Some([255, 0, 0]));
        assert_eq!(parse_hex_color("FFFFFF"), None);
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("#GGGGGG"), None);
    }
}
