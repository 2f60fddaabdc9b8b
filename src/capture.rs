//! Shutter and post-capture metadata.
//!
//! The camera opens immediately. Location is not awaited before the shutter;
//! file size, location and pixel dimensions are gathered concurrently only
//! after a photo exists, each failing independently to `None`.

use crate::config::Settings;
use crate::imaging::ImageBackend;
use crate::location::foreground_location_or_none;
use crate::metadata::{coords_from_exif, resolve};
use crate::platform::{Capability, Device, ensure_permission};
use crate::types::PhotoData;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("camera failure: {0}")]
    Camera(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the camera is asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOptions {
    /// Capture compression, `1.0` = none. Compression happens at upload time.
    pub quality: f64,
    /// Return the EXIF map along with the file.
    pub exif: bool,
    /// Resolution hint from the settings.
    pub resolution: Option<(u32, u32)>,
}

impl CaptureOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            quality: 1.0,
            exif: true,
            resolution: settings.capture.resolution.target(),
        }
    }
}

/// A file produced by the shutter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapturedAsset {
    pub path: PathBuf,
    /// Camera-provided metadata keyed by tag name (`GPSLatitude`, ...).
    pub exif: Map<String, Value>,
}

#[async_trait]
pub trait Camera: Send + Sync {
    /// Take a photo. `Ok(None)` means the user cancelled.
    async fn capture(&self, options: &CaptureOptions) -> Result<Option<CapturedAsset>, CaptureError>;
}

async fn file_size(path: &Path) -> Option<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Some(meta.len()),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("size of {} unavailable: {e}", path.display());
            None
        }
    }
}

async fn pixel_dimensions(backend: Arc<dyn ImageBackend>, path: PathBuf) -> Option<(u32, u32)> {
    let result = tokio::task::spawn_blocking(move || backend.identify(&path)).await;
    match result {
        Ok(Ok(dims)) => Some((dims.width, dims.height)),
        Ok(Err(e)) => {
            tracing::debug!("dimensions unavailable: {e}");
            None
        }
        Err(e) => {
            tracing::debug!("dimension task failed: {e}");
            None
        }
    }
}

/// Take a photo and collect its metadata.
///
/// Returns `None` when permission is denied (after an alert), when the user
/// cancels, or when the camera fails (after an alert). Callers treat `None`
/// as "no photo, do nothing further".
pub async fn take_picture(
    settings: &Settings,
    device: &Device,
    backend: &Arc<dyn ImageBackend>,
) -> Option<PhotoData> {
    if !ensure_permission(device.permissions.as_ref(), Capability::Camera).await {
        device.notices.alert(
            "Camera permission",
            "Camera access is required to take photos.",
        );
        return None;
    }

    let options = CaptureOptions::from_settings(settings);
    let asset = match device.camera.capture(&options).await {
        Ok(Some(asset)) => asset,
        Ok(None) => {
            tracing::info!("capture cancelled");
            return None;
        }
        Err(e) => {
            tracing::error!("capture failed: {e}");
            device.notices.alert("Error", "Failed to take a picture");
            return None;
        }
    };

    let (size, fix, dims) = tokio::join!(
        file_size(&asset.path),
        foreground_location_or_none(
            device.permissions.as_ref(),
            device.location.as_ref(),
            settings.capture.location_source,
        ),
        pixel_dimensions(Arc::clone(backend), asset.path.clone()),
    );

    let (exif_lat, exif_lon) = if fix.latitude.is_none() || fix.longitude.is_none() {
        coords_from_exif(&asset.exif)
    } else {
        (None, None)
    };

    let photo = PhotoData {
        path: asset.path,
        file_size_bytes: size,
        latitude: resolve(&[fix.latitude, exif_lat]),
        longitude: resolve(&[fix.longitude, exif_lon]),
        width: dims.map(|d| d.0),
        height: dims.map(|d| d.1),
    };
    tracing::info!(
        path = %photo.path.display(),
        latitude = ?photo.latitude,
        longitude = ?photo.longitude,
        "photo captured"
    );
    Some(photo)
}
