//! Coordinate extraction and resolution.
//!
//! A photo's position can come from two independent sources:
//!
//! - **Live fix**: the location provider, queried right after the shutter.
//! - **Embedded EXIF**: the key/value map the camera returns with the asset.
//!   Camera APIs disagree on casing, so both `GPSLatitude` and `gpsLatitude`
//!   are accepted. A `GPSLatitudeRef` of `S` (or `GPSLongitudeRef` of `W`)
//!   flips the sign of an absolute value.
//!
//! ## Resolution priority
//!
//! Each coordinate is resolved independently. The first finite value wins:
//!
//! ```text
//! latitude:  resolve(&[live.latitude,  exif.latitude])
//! longitude: resolve(&[live.longitude, exif.longitude])
//! ```

use serde_json::{Map, Value};

/// First finite value in priority order.
pub fn resolve(sources: &[Option<f64>]) -> Option<f64> {
    sources
        .iter()
        .copied()
        .flatten()
        .find(|v| v.is_finite())
}

fn number(exif: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|k| exif.get(*k).and_then(Value::as_f64))
}

fn reference(exif: &Map<String, Value>, keys: &[&str]) -> Option<char> {
    keys.iter()
        .find_map(|k| exif.get(*k).and_then(Value::as_str))
        .and_then(|s| s.trim().chars().next())
        .map(|c| c.to_ascii_uppercase())
}

fn signed(value: f64, reference: Option<char>, negative: char) -> f64 {
    if reference == Some(negative) {
        -value.abs()
    } else {
        value
    }
}

/// Coordinates from a camera EXIF map, as `(latitude, longitude)`.
pub fn coords_from_exif(exif: &Map<String, Value>) -> (Option<f64>, Option<f64>) {
    let lat = number(exif, &["GPSLatitude", "gpsLatitude"]).map(|v| {
        signed(v, reference(exif, &["GPSLatitudeRef", "gpsLatitudeRef"]), 'S')
    });
    let lon = number(exif, &["GPSLongitude", "gpsLongitude"]).map(|v| {
        signed(v, reference(exif, &["GPSLongitudeRef", "gpsLongitudeRef"]), 'W')
    });
    (lat, lon)
}

/// Coordinates usable for EXIF tagging: both present, finite and in range.
pub fn valid_gps(latitude: Option<f64>, longitude: Option<f64>) -> Option<(f64, f64)> {
    let (lat, lon) = latitude.zip(longitude)?;
    (lat.is_finite() && lon.is_finite() && lat.abs() <= 90.0 && lon.abs() <= 180.0)
        .then_some((lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn resolve_picks_first_finite() {
        assert_eq!(resolve(&[Some(1.0), Some(2.0)]), Some(1.0));
        assert_eq!(resolve(&[None, Some(2.0)]), Some(2.0));
        assert_eq!(resolve(&[Some(f64::NAN), Some(2.0)]), Some(2.0));
        assert_eq!(resolve(&[None, None]), None);
        assert_eq!(resolve(&[]), None);
    }

    #[test]
    fn exif_pascal_case() {
        let exif = map(json!({"GPSLatitude": 55.75, "GPSLongitude": 37.61}));
        assert_eq!(coords_from_exif(&exif), (Some(55.75), Some(37.61)));
    }

    #[test]
    fn exif_camel_case() {
        let exif = map(json!({"gpsLatitude": 10.5, "gpsLongitude": 20.25}));
        assert_eq!(coords_from_exif(&exif), (Some(10.5), Some(20.25)));
    }

    #[test]
    fn exif_pascal_case_wins_over_camel() {
        let exif = map(json!({"GPSLatitude": 1.0, "gpsLatitude": 2.0}));
        assert_eq!(coords_from_exif(&exif).0, Some(1.0));
    }

    #[test]
    fn exif_refs_flip_sign() {
        let exif = map(json!({
            "GPSLatitude": 33.9, "GPSLatitudeRef": "S",
            "GPSLongitude": 70.6, "GPSLongitudeRef": "w"
        }));
        assert_eq!(coords_from_exif(&exif), (Some(-33.9), Some(-70.6)));
    }

    #[test]
    fn exif_non_numeric_ignored() {
        let exif = map(json!({"GPSLatitude": "55.75", "GPSLongitude": null}));
        assert_eq!(coords_from_exif(&exif), (None, None));
        assert_eq!(coords_from_exif(&Map::new()), (None, None));
    }

    #[test]
    fn valid_gps_ranges() {
        assert_eq!(valid_gps(Some(45.0), Some(-122.0)), Some((45.0, -122.0)));
        assert_eq!(valid_gps(Some(90.0), Some(180.0)), Some((90.0, 180.0)));
        assert_eq!(valid_gps(Some(91.0), Some(0.0)), None);
        assert_eq!(valid_gps(Some(0.0), Some(-180.5)), None);
        assert_eq!(valid_gps(Some(f64::INFINITY), Some(0.0)), None);
        assert_eq!(valid_gps(None, Some(0.0)), None);
    }
}
