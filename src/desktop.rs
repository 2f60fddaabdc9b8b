//! File-system backed platform services for running the pipeline on a
//! desktop.
//!
//! | Service | Desktop behavior |
//! |---|---|
//! | camera | imports an existing image file as the shutter result |
//! | permissions | everything granted except what `--deny` names |
//! | location | a fixed position from the command line, or none |
//! | notices | printed to stderr |
//! | gallery | copies into a directory |

use crate::capture::{Camera, CaptureError, CaptureOptions, CapturedAsset};
use crate::imaging::ImageBackend;
use crate::location::{Accuracy, LocationError, LocationProvider, Position};
use crate::output::format_notice;
use crate::platform::{Capability, NoticeKind, Notices, PermissionStatus, Permissions, Gallery};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// "Takes" a photo by copying a file into the work directory.
pub struct FileCamera {
    source: Option<PathBuf>,
    work_dir: PathBuf,
    backend: Arc<dyn ImageBackend>,
}

impl FileCamera {
    /// `source` of `None` behaves like the user cancelling the camera.
    pub fn new(source: Option<PathBuf>, work_dir: &Path, backend: Arc<dyn ImageBackend>) -> Self {
        Self {
            source,
            work_dir: work_dir.to_path_buf(),
            backend,
        }
    }
}

#[async_trait]
impl Camera for FileCamera {
    async fn capture(&self, options: &CaptureOptions) -> Result<Option<CapturedAsset>, CaptureError> {
        let Some(source) = &self.source else {
            return Ok(None);
        };
        if !tokio::fs::try_exists(source).await? {
            return Err(CaptureError::Camera(format!("{} not found", source.display())));
        }
        let name = source
            .file_name()
            .ok_or_else(|| CaptureError::Camera(format!("{} is not a file", source.display())))?;

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let path = self.work_dir.join(name);
        if path != *source {
            tokio::fs::copy(source, &path).await?;
        }

        let exif = if options.exif {
            let backend = Arc::clone(&self.backend);
            let p = path.clone();
            match tokio::task::spawn_blocking(move || backend.read_exif(&p)).await {
                Ok(Ok(tags)) => tags.to_json_map(),
                Ok(Err(e)) => {
                    tracing::debug!("no EXIF in {}: {e}", path.display());
                    Default::default()
                }
                Err(e) => return Err(CaptureError::Camera(e.to_string())),
            }
        } else {
            Default::default()
        };
        Ok(Some(CapturedAsset { path, exif }))
    }
}

/// Grants everything except the listed capabilities.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissions {
    denied: Vec<Capability>,
}

impl StaticPermissions {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn denying(denied: &[Capability]) -> Self {
        Self {
            denied: denied.to_vec(),
        }
    }

    fn answer(&self, capability: Capability) -> PermissionStatus {
        if self.denied.contains(&capability) {
            PermissionStatus::Denied
        } else {
            PermissionStatus::Granted
        }
    }
}

#[async_trait]
impl Permissions for StaticPermissions {
    async fn status(&self, capability: Capability) -> PermissionStatus {
        self.answer(capability)
    }

    async fn request(&self, capability: Capability) -> PermissionStatus {
        self.answer(capability)
    }
}

/// Always reports the same position, or none.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedLocation {
    position: Option<Position>,
}

impl FixedLocation {
    pub fn new(position: Option<Position>) -> Self {
        Self { position }
    }

    /// Position from optional command-line coordinates; both are required.
    pub fn from_args(latitude: Option<f64>, longitude: Option<f64>, altitude: Option<f64>) -> Self {
        Self::new(latitude.zip(longitude).map(|(latitude, longitude)| Position {
            latitude,
            longitude,
            altitude,
        }))
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(&self, _accuracy: Accuracy) -> Result<Position, LocationError> {
        self.position
            .ok_or_else(|| LocationError::Unavailable("no position given".into()))
    }
}

/// Prints notices to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotices;

impl Notices for LogNotices {
    fn alert(&self, title: &str, message: &str) {
        tracing::warn!(%title, "{message}");
        eprintln!("{title}: {message}");
    }

    fn toast(&self, message: &str, kind: NoticeKind) {
        tracing::info!(?kind, "{message}");
        eprintln!("{}", format_notice(kind, message));
    }
}

/// Gallery that copies photos into one directory.
#[derive(Debug, Clone)]
pub struct DirectoryGallery {
    dir: PathBuf,
}

impl DirectoryGallery {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// First free `name`, `name-1`, `name-2`, ... in the gallery.
    async fn free_path(&self, photo: &Path) -> std::io::Result<PathBuf> {
        let stem = photo
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".into());
        let ext = photo
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "jpg".into());
        let mut candidate = self.dir.join(format!("{stem}.{ext}"));
        let mut n = 1;
        while tokio::fs::try_exists(&candidate).await? {
            candidate = self.dir.join(format!("{stem}-{n}.{ext}"));
            n += 1;
        }
        Ok(candidate)
    }
}

#[async_trait]
impl Gallery for DirectoryGallery {
    async fn save(&self, photo: &Path) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let dest = self.free_path(photo).await?;
        tokio::fs::copy(photo, &dest).await?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{ExifTags, GpsPosition, RustBackend};
    use crate::imaging::exif::embed_exif;
    use crate::metadata::coords_from_exif;
    use crate::test_helpers::create_test_jpeg;
    use tempfile::TempDir;

    fn options() -> CaptureOptions {
        CaptureOptions {
            quality: 1.0,
            exif: true,
            resolution: None,
        }
    }

    #[tokio::test]
    async fn camera_without_source_cancels() {
        let tmp = TempDir::new().unwrap();
        let camera = FileCamera::new(None, tmp.path(), Arc::new(RustBackend::new()));
        assert!(camera.capture(&options()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn camera_missing_file_errors() {
        let tmp = TempDir::new().unwrap();
        let camera = FileCamera::new(
            Some(tmp.path().join("nope.jpg")),
            tmp.path(),
            Arc::new(RustBackend::new()),
        );
        assert!(matches!(
            camera.capture(&options()).await,
            Err(CaptureError::Camera(_))
        ));
    }

    #[tokio::test]
    async fn camera_copies_and_reads_gps() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("in/shot.jpg");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        create_test_jpeg(&source, 16, 16);
        let tags = ExifTags {
            gps: Some(GpsPosition::from_signed(-33.5, 151.25)),
            ..ExifTags::default()
        };
        let tagged = embed_exif(&std::fs::read(&source).unwrap(), &tags).unwrap();
        std::fs::write(&source, tagged).unwrap();

        let work = tmp.path().join("work");
        let camera = FileCamera::new(Some(source), &work, Arc::new(RustBackend::new()));
        let asset = camera.capture(&options()).await.unwrap().unwrap();

        assert_eq!(asset.path, work.join("shot.jpg"));
        assert!(asset.path.exists());
        let (lat, lon) = coords_from_exif(&asset.exif);
        assert!((lat.unwrap() + 33.5).abs() < 1e-4);
        assert!((lon.unwrap() - 151.25).abs() < 1e-4);
    }

    #[tokio::test]
    async fn static_permissions_deny_listed() {
        let perms = StaticPermissions::denying(&[Capability::Location]);
        assert_eq!(perms.status(Capability::Camera).await, PermissionStatus::Granted);
        assert_eq!(perms.request(Capability::Location).await, PermissionStatus::Denied);
    }

    #[tokio::test]
    async fn fixed_location_needs_both_coordinates() {
        let loc = FixedLocation::from_args(Some(1.0), None, Some(5.0));
        assert!(loc.current_position(Accuracy::Highest).await.is_err());

        let loc = FixedLocation::from_args(Some(1.0), Some(2.0), Some(5.0));
        let p = loc.current_position(Accuracy::Balanced).await.unwrap();
        assert_eq!((p.latitude, p.longitude, p.altitude), (1.0, 2.0, Some(5.0)));
    }

    #[tokio::test]
    async fn gallery_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let photo = tmp.path().join("a.jpg");
        std::fs::write(&photo, b"one").unwrap();
        let gallery = DirectoryGallery::new(tmp.path().join("gallery"));

        let first = gallery.save(&photo).await.unwrap();
        let second = gallery.save(&photo).await.unwrap();
        assert_eq!(first, tmp.path().join("gallery/a.jpg"));
        assert_eq!(second, tmp.path().join("gallery/a-1.jpg"));
        assert_eq!(std::fs::read(second).unwrap(), b"one");
    }
}
