//! Upload preparation: resize, compress, GPS tagging.
//!
//! ```text
//! photo.jpg ──encode──► <work>/photo-upload-N.jpg ──exif──► <work>/photo-upload-N-gps.jpg
//!            (resize to W×H or compress only)      (only with valid coordinates)
//! ```
//!
//! `N` counts calls on one processor (shared by its clones), so two photos
//! with the same file name never write over each other's upload copy.
//!
//! Preparation never fails from the caller's point of view: if any step
//! errors, the original photo is uploaded unchanged.

use crate::config::Settings;
use crate::imaging::{
    BackendError, ImageBackend, encode_photo, exif_datetime, gps_exif_tags, tag_photo,
};
use crate::location::foreground_location_or_none;
use crate::metadata::valid_gps;
use crate::naming::stage_path;
use crate::platform::Device;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Image processing failed: {0}")]
    Imaging(#[from] BackendError),
    #[error("Image task failed: {0}")]
    Task(String),
}

async fn blocking<F>(f: F) -> Result<(), ProcessError>
where
    F: FnOnce() -> Result<(), BackendError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ProcessError::Task(e.to_string()))??;
    Ok(())
}

/// Turns captured (or composed) photos into upload-ready JPEGs.
#[derive(Clone)]
pub struct UploadProcessor {
    backend: Arc<dyn ImageBackend>,
    work_dir: PathBuf,
    seq: Arc<AtomicU64>,
}

impl UploadProcessor {
    pub fn new(backend: Arc<dyn ImageBackend>, work_dir: &Path) -> Self {
        Self {
            backend,
            work_dir: work_dir.to_path_buf(),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Resize and compress per the settings, then embed GPS tags when the
    /// coordinates are valid. Returns `path` itself if anything fails.
    pub async fn process_photo_for_upload(
        &self,
        settings: &Settings,
        device: &Device,
        path: &Path,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> PathBuf {
        match self.try_process(settings, device, path, latitude, longitude).await {
            Ok(out) => out,
            Err(e) => {
                tracing::error!("processing {} failed, uploading original: {e}", path.display());
                path.to_path_buf()
            }
        }
    }

    async fn try_process(
        &self,
        settings: &Settings,
        device: &Device,
        path: &Path,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<PathBuf, ProcessError> {
        let target = settings.capture.resolution.target();
        let quality = settings.capture.quality();
        let n = self.seq.fetch_add(1, Ordering::SeqCst);
        let encoded = stage_path(&self.work_dir, path, &format!("upload-{n}"));

        {
            let backend = Arc::clone(&self.backend);
            let source = path.to_path_buf();
            let output = encoded.clone();
            blocking(move || encode_photo(backend.as_ref(), &source, &output, target, quality))
                .await?;
        }
        tracing::debug!(?target, quality = quality.value(), "photo encoded");

        let Some((lat, lon)) = valid_gps(latitude, longitude) else {
            tracing::debug!("no valid coordinates, skipping GPS tags");
            return Ok(encoded);
        };

        let fix = foreground_location_or_none(
            device.permissions.as_ref(),
            device.location.as_ref(),
            settings.capture.location_source,
        )
        .await;
        let tags = gps_exif_tags(lat, lon, fix.altitude, &exif_datetime(&Local::now()));

        let tagged = stage_path(&self.work_dir, path, &format!("upload-{n}-gps"));
        {
            let backend = Arc::clone(&self.backend);
            let source = encoded.clone();
            let output = tagged.clone();
            blocking(move || tag_photo(backend.as_ref(), &source, &output, tags)).await?;
        }
        tracing::info!(latitude = lat, longitude = lon, altitude = ?fix.altitude, "GPS tags written");
        Ok(tagged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Resolution;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::{GPS_COMMENT, GpsAltitude, GpsPosition};
    use crate::test_helpers::{MockLocation, TestDevice};
    use tempfile::TempDir;

    fn setup(backend: MockBackend) -> (TempDir, Arc<MockBackend>, UploadProcessor) {
        let tmp = TempDir::new().unwrap();
        let backend = Arc::new(backend);
        let processor = UploadProcessor::new(backend.clone(), tmp.path());
        (tmp, backend, processor)
    }

    fn exif_ops(backend: &MockBackend) -> Vec<RecordedOp> {
        backend
            .get_operations()
            .into_iter()
            .filter(|op| matches!(op, RecordedOp::WriteExif { .. }))
            .collect()
    }

    #[tokio::test]
    async fn fixed_resolution_resizes_exactly() {
        let (tmp, backend, processor) = setup(MockBackend::new());
        let mut settings = Settings::default();
        settings.capture.resolution = Resolution::FullHd;
        let t = TestDevice::new();

        let out = processor
            .process_photo_for_upload(&settings, &t.device(), Path::new("/in/shot.jpg"), None, None)
            .await;

        assert_eq!(out, tmp.path().join("shot-upload-0.jpg"));
        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::Encode {
                source: "/in/shot.jpg".into(),
                output: tmp.path().join("shot-upload-0.jpg").to_string_lossy().into(),
                resize: Some((1920, 1080)),
                quality: 80,
            }]
        );
    }

    #[tokio::test]
    async fn camera_resolution_compresses_only() {
        let (_tmp, backend, processor) = setup(MockBackend::new());
        let mut settings = Settings::default();
        settings.capture.set_image_quality(0.5);
        let t = TestDevice::new();

        processor
            .process_photo_for_upload(&settings, &t.device(), Path::new("/in/a.jpg"), None, None)
            .await;

        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::Encode { resize: None, quality: 50, .. }
        ));
    }

    #[tokio::test]
    async fn valid_coordinates_are_tagged_with_fresh_altitude() {
        let (tmp, backend, processor) = setup(MockBackend::new());
        let t = TestDevice::new().location(MockLocation::at(0.0, 0.0, Some(-12.0)));

        let out = processor
            .process_photo_for_upload(
                &Settings::default(),
                &t.device(),
                Path::new("/in/a.jpg"),
                Some(-33.8688),
                Some(151.2093),
            )
            .await;

        assert_eq!(out, tmp.path().join("a-upload-0-gps.jpg"));
        let ops = exif_ops(&backend);
        assert_eq!(ops.len(), 1);
        let RecordedOp::WriteExif { source, tags, .. } = &ops[0] else {
            unreachable!()
        };
        assert_eq!(source, &tmp.path().join("a-upload-0.jpg").to_string_lossy());
        assert_eq!(tags.gps, Some(GpsPosition::from_signed(-33.8688, 151.2093)));
        assert_eq!(tags.altitude, Some(GpsAltitude::from_signed(-12.0)));
        assert_eq!(tags.user_comment.as_deref(), Some(GPS_COMMENT));
        assert_eq!(tags.date_time_original, tags.create_date);
        assert_eq!(tags.date_time_original.as_ref().map(|d| d.len()), Some(19));
    }

    #[tokio::test]
    async fn altitude_omitted_when_fix_unavailable() {
        let (_tmp, backend, processor) = setup(MockBackend::new());
        let t = TestDevice::new().location(MockLocation::failing());

        processor
            .process_photo_for_upload(&Settings::default(), &t.device(), Path::new("/a.jpg"), Some(1.0), Some(2.0))
            .await;

        let RecordedOp::WriteExif { tags, .. } = &exif_ops(&backend)[0] else {
            unreachable!()
        };
        assert!(tags.gps.is_some());
        assert_eq!(tags.altitude, None);
    }

    #[tokio::test]
    async fn invalid_coordinates_skip_tagging() {
        for (lat, lon) in [
            (None, Some(2.0)),
            (Some(95.0), Some(2.0)),
            (Some(1.0), Some(f64::NAN)),
        ] {
            let (tmp, backend, processor) = setup(MockBackend::new());
            let t = TestDevice::new();
            let out = processor
                .process_photo_for_upload(&Settings::default(), &t.device(), Path::new("/a.jpg"), lat, lon)
                .await;
            assert_eq!(out, tmp.path().join("a-upload-0.jpg"));
            assert!(exif_ops(&backend).is_empty());
        }
    }

    #[tokio::test]
    async fn same_file_name_gets_distinct_upload_copies() {
        let (tmp, _backend, processor) = setup(MockBackend::new());
        let clone = processor.clone();
        let t = TestDevice::new().location(MockLocation::at(0.0, 0.0, None));
        let settings = Settings::default();

        let first = processor
            .process_photo_for_upload(&settings, &t.device(), Path::new("/day1/shot.jpg"), Some(1.0), Some(2.0))
            .await;
        let second = clone
            .process_photo_for_upload(&settings, &t.device(), Path::new("/day2/shot.jpg"), Some(1.0), Some(2.0))
            .await;

        assert_eq!(first, tmp.path().join("shot-upload-0-gps.jpg"));
        assert_eq!(second, tmp.path().join("shot-upload-1-gps.jpg"));
    }

    #[tokio::test]
    async fn failure_returns_original() {
        let backend = MockBackend::new();
        backend.fail_encode.store(true, Ordering::SeqCst);
        let (_tmp, backend, processor) = setup(backend);
        let t = TestDevice::new();

        let out = processor
            .process_photo_for_upload(&Settings::default(), &t.device(), Path::new("/in/a.jpg"), Some(1.0), Some(2.0))
            .await;

        assert_eq!(out, PathBuf::from("/in/a.jpg"));
        assert!(exif_ops(&backend).is_empty());
    }
}
