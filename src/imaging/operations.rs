//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, ImageBackend};
use super::exif::{ExifTags, GpsAltitude, GpsPosition};
use super::params::{EncodeParams, ExifParams, Quality};
use chrono::{DateTime, TimeZone};
use std::fmt::Display;
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Written into `UserComment` whenever GPS tags are added.
pub const GPS_COMMENT: &str = "GPS location added by geosnap";

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &dyn ImageBackend, path: &Path) -> Result<(u32, u32)> {
    let dims = backend.identify(path)?;
    Ok((dims.width, dims.height))
}

/// Plan a JPEG re-encode without executing it.
///
/// `target` of `None` keeps the source dimensions (compress only).
pub fn plan_encode(
    source: &Path,
    output: &Path,
    target: Option<(u32, u32)>,
    quality: Quality,
) -> EncodeParams {
    EncodeParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        resize: target,
        quality,
    }
}

/// Resize (when `target` is set) and compress a photo.
pub fn encode_photo(
    backend: &dyn ImageBackend,
    source: &Path,
    output: &Path,
    target: Option<(u32, u32)>,
    quality: Quality,
) -> Result<()> {
    backend.encode(&plan_encode(source, output, target, quality))
}

/// EXIF date format: `YYYY:MM:DD HH:MM:SS`.
pub fn exif_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    dt.format("%Y:%m:%d %H:%M:%S").to_string()
}

/// Build the tag set written by the upload pipeline.
///
/// Coordinates are signed decimal degrees; altitude is dropped unless finite.
pub fn gps_exif_tags(
    latitude: f64,
    longitude: f64,
    altitude: Option<f64>,
    taken_at: &str,
) -> ExifTags {
    ExifTags {
        gps: Some(GpsPosition::from_signed(latitude, longitude)),
        altitude: altitude
            .filter(|a| a.is_finite())
            .map(GpsAltitude::from_signed),
        date_time_original: Some(taken_at.to_string()),
        create_date: Some(taken_at.to_string()),
        user_comment: Some(GPS_COMMENT.to_string()),
    }
}

/// Write `tags` into a copy of `source` at `output`.
pub fn tag_photo(
    backend: &dyn ImageBackend,
    source: &Path,
    output: &Path,
    tags: ExifTags,
) -> Result<()> {
    backend.write_exif(&ExifParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        tags,
    })
}
