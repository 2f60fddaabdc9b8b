//! End-to-end photo flows: shutter to Drive, with every fallback.
//!
//! Two entry points mirror the two ways a photo leaves the app:
//!
//! - [`Session::take_photo_and_upload`]: capture, then either hand the photo
//!   back for preview or run the whole upload in place.
//! - [`Session::save_prepared_photo`]: the preview's "Save". The file is
//!   composed and processed before returning; the upload itself runs on a
//!   detached task the caller may drop.
//!
//! Neither flow returns an error. Every failure ends in a notice and, where
//! it makes sense, a local gallery copy.

use crate::capture::take_picture;
use crate::config::Settings;
use crate::drive::Drive;
use crate::imaging::ImageBackend;
use crate::overlay::{ComposeRequest, Compositor, OverlayError, overlay_lines};
use crate::platform::{Capability, Device, NoticeKind, ensure_permission};
use crate::process::UploadProcessor;
use crate::reminder::schedule_reminder;
use crate::types::{PhotoData, UploadedFile};
use chrono::{DateTime, Local, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Compose attempts before falling back to the unmodified photo.
pub const COMPOSE_ATTEMPTS: u32 = 3;
pub const COMPOSE_BACKOFF: Duration = Duration::from_millis(120);
/// Canvas used when neither the settings nor the photo give a size.
pub const FALLBACK_CANVAS: (u32, u32) = (1280, 720);

pub const MSG_UPLOADING: &str = "Uploading photo to Google Drive...";
pub const MSG_SIGN_IN: &str = "Sign in to Google to upload to Drive";
pub const MSG_UPLOAD_FAILED: &str = "Failed to upload photo to Google Drive";
pub const MSG_GALLERY_SAVED: &str = "Photo saved to gallery";
pub const MSG_GALLERY_FAILED: &str = "Failed to save photo to gallery";

pub fn uploaded_message(file: &UploadedFile) -> String {
    format!("Photo \"{}\" uploaded to Google Drive", file.name)
}

/// What [`Session::take_photo_and_upload`] ended with.
#[derive(Debug, Clone, PartialEq)]
pub enum TakeOutcome {
    /// No photo: permission denied, cancelled, or camera error.
    NoPhoto,
    /// Preview is enabled; the caller shows it and may call
    /// [`Session::save_prepared_photo`].
    Preview(PhotoData),
    /// Upload attempted in place. `file` is `None` when it failed.
    Uploaded {
        photo: PhotoData,
        file: Option<UploadedFile>,
    },
}

/// Everything a flow needs, cheap to clone into a detached task.
#[derive(Clone)]
pub struct Session {
    settings: Arc<Settings>,
    device: Device,
    backend: Arc<dyn ImageBackend>,
    compositor: Arc<Compositor>,
    processor: UploadProcessor,
    drive: Arc<Drive>,
}

impl Session {
    /// Must be called inside a tokio runtime (the compositor worker starts
    /// here).
    pub fn new(
        settings: Settings,
        device: Device,
        backend: Arc<dyn ImageBackend>,
        drive: Drive,
        work_dir: &Path,
    ) -> Self {
        let compositor = Compositor::spawn(
            Arc::clone(&backend),
            work_dir,
            settings.overlay.queue_capacity,
        );
        Self {
            processor: UploadProcessor::new(Arc::clone(&backend), work_dir),
            settings: Arc::new(settings),
            device,
            backend,
            compositor: Arc::new(compositor),
            drive: Arc::new(drive),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// Size of the overlay canvas: the fixed resolution, else the photo's own
    /// size, else [`FALLBACK_CANVAS`].
    pub fn compose_dimensions(&self, photo: &PhotoData) -> (u32, u32) {
        self.settings
            .capture
            .resolution
            .target()
            .or_else(|| photo.dimensions())
            .unwrap_or(FALLBACK_CANVAS)
    }

    fn compose_request(&self, photo: &PhotoData, lines: Vec<String>, size: (u32, u32)) -> ComposeRequest {
        let overlay = &self.settings.overlay;
        ComposeRequest {
            photo: photo.path.clone(),
            width: size.0,
            height: size.1,
            text_lines: lines,
            text_position: overlay.text_position,
            font_size: overlay.font_size,
            text_color: overlay.color(),
            text_outline: overlay.text_outline,
        }
    }

    fn lines(&self, photo: &PhotoData, taken_at: &DateTime<Local>) -> Vec<String> {
        overlay_lines(&self.settings.overlay, photo.latitude, photo.longitude, taken_at)
    }

    /// Capture a photo, then preview it or upload it right away.
    pub async fn take_photo_and_upload(&self, custom_name: Option<&str>) -> TakeOutcome {
        let Some(photo) = take_picture(&self.settings, &self.device, &self.backend).await else {
            return TakeOutcome::NoPhoto;
        };
        if self.settings.capture.preview_before_save {
            return TakeOutcome::Preview(photo);
        }
        let file = self.upload_in_place(&photo, custom_name).await;
        TakeOutcome::Uploaded { photo, file }
    }

    async fn upload_in_place(&self, photo: &PhotoData, custom_name: Option<&str>) -> Option<UploadedFile> {
        let notices = &self.device.notices;
        notices.toast(MSG_UPLOADING, NoticeKind::Info);
        let taken_at = Local::now();

        // The photo's own size: a fixed resolution is applied by the
        // processing stretch, not by cropping here.
        let lines = self.lines(photo, &taken_at);
        let base = match photo.dimensions() {
            Some(size) if !lines.is_empty() => {
                let request = self.compose_request(photo, lines, size);
                match self.compositor.compose_photo_with_overlay(request).await {
                    Ok(path) => path,
                    Err(e) => {
                        tracing::warn!("overlay failed, continuing without it: {e}");
                        photo.path.clone()
                    }
                }
            }
            _ => photo.path.clone(),
        };

        let processed = self
            .processor
            .process_photo_for_upload(&self.settings, &self.device, &base, photo.latitude, photo.longitude)
            .await;

        match self.drive.upload_photo(&processed, taken_at, custom_name).await {
            Ok(file) => {
                if self.settings.capture.auto_save {
                    self.save_to_gallery(&processed).await;
                }
                notices.toast(&uploaded_message(&file), NoticeKind::Success);
                Some(file)
            }
            Err(e) => {
                tracing::error!("upload failed: {e}");
                notices.toast(MSG_SIGN_IN, NoticeKind::Error);
                if self.settings.capture.auto_save {
                    self.save_to_gallery(&processed).await;
                }
                None
            }
        }
    }

    /// Compose with bounded retries; the original photo when every attempt
    /// fails or there is nothing to draw.
    pub async fn compose_with_retries(&self, photo: &PhotoData, taken_at: &DateTime<Local>) -> PathBuf {
        let lines = self.lines(photo, taken_at);
        if lines.is_empty() {
            return photo.path.clone();
        }
        let request = self.compose_request(photo, lines, self.compose_dimensions(photo));

        for attempt in 1..=COMPOSE_ATTEMPTS {
            match self.compositor.compose_photo_with_overlay(request.clone()).await {
                Ok(path) => return path,
                Err(e @ OverlayError::InvalidRequest(_)) => {
                    tracing::warn!("overlay request rejected: {e}");
                    break;
                }
                Err(e) => {
                    tracing::warn!(attempt, "overlay attempt failed: {e}");
                    if attempt < COMPOSE_ATTEMPTS {
                        tokio::time::sleep(COMPOSE_BACKOFF).await;
                    }
                }
            }
        }
        tracing::warn!("using photo without overlay");
        photo.path.clone()
    }

    /// Prepare a previewed photo and start its upload.
    ///
    /// Returns the detached upload task, or `None` when not signed in (the
    /// photo then only goes to the gallery, if `auto_save` is on).
    pub async fn save_prepared_photo(
        &self,
        photo: &PhotoData,
        custom_name: Option<String>,
    ) -> Option<JoinHandle<Option<UploadedFile>>> {
        if !self.drive.is_authenticated() {
            if self.settings.capture.auto_save {
                self.save_to_gallery(&photo.path).await;
            }
            self.device.notices.toast(MSG_SIGN_IN, NoticeKind::Error);
            return None;
        }

        schedule_reminder(
            self.device.reminders.as_ref(),
            self.device.notices.as_ref(),
            &self.settings.reminder,
            Utc::now(),
        )
        .await;

        let taken_at = Local::now();
        let composed = self.compose_with_retries(photo, &taken_at).await;
        let processed = self
            .processor
            .process_photo_for_upload(&self.settings, &self.device, &composed, photo.latitude, photo.longitude)
            .await;

        self.device.notices.toast(MSG_UPLOADING, NoticeKind::Info);
        let session = self.clone();
        Some(tokio::spawn(async move {
            session
                .finish_upload(&processed, taken_at, custom_name.as_deref())
                .await
        }))
    }

    async fn finish_upload(
        &self,
        processed: &Path,
        taken_at: DateTime<Local>,
        custom_name: Option<&str>,
    ) -> Option<UploadedFile> {
        match self.drive.upload_photo(processed, taken_at, custom_name).await {
            Ok(file) => {
                if self.settings.capture.auto_save {
                    self.save_to_gallery(processed).await;
                }
                self.device
                    .notices
                    .toast(&uploaded_message(&file), NoticeKind::Success);
                Some(file)
            }
            Err(e) => {
                tracing::error!("upload failed: {e}");
                self.device.notices.toast(MSG_UPLOAD_FAILED, NoticeKind::Error);
                None
            }
        }
    }

    /// Copy a photo into the gallery, asking for permission first.
    pub async fn save_to_gallery(&self, path: &Path) -> Option<PathBuf> {
        if !ensure_permission(self.device.permissions.as_ref(), Capability::MediaLibrary).await {
            self.device.notices.alert(
                "Gallery permission",
                "Gallery access is required to save photos.",
            );
            return None;
        }
        match self.device.gallery.save(path).await {
            Ok(saved) => {
                tracing::info!(path = %saved.display(), "saved to gallery");
                self.device.notices.toast(MSG_GALLERY_SAVED, NoticeKind::Success);
                Some(saved)
            }
            Err(e) => {
                tracing::error!("gallery save failed: {e}");
                self.device.notices.toast(MSG_GALLERY_FAILED, NoticeKind::Error);
                None
            }
        }
    }
}
