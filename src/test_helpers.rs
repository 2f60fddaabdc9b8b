//! Shared test doubles for the geosnap test suite.
//!
//! Every platform trait has a recording mock here, and [`TestDevice`]
//! bundles them into a [`Device`] while keeping typed handles for
//! assertions.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let t = TestDevice::new()
//!     .camera(MockCamera::returning(&path, Map::new()))
//!     .location(MockLocation::at(55.75, 37.61, None));
//!
//! let photo = take_picture(&settings, &t.device(), &backend).await;
//!
//! assert!(t.notices.alerts().is_empty());
//! assert_eq!(t.camera_calls(), 1);
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::{Rgb, RgbImage};
use serde_json::{Map, Value};

use crate::auth::{TokenSource, UserInfo};
use crate::capture::{Camera, CaptureError, CaptureOptions, CapturedAsset};
use crate::drive::{DriveApi, DriveError, DriveFile, Phase};
use crate::location::{Accuracy, LocationError, LocationProvider, Position};
use crate::platform::{
    Capability, Device, Gallery, NoticeKind, Notices, PermissionStatus, Permissions,
};
use crate::reminder::{Reminder, ReminderError, ReminderScheduler};

// =========================================================================
// Fixture images
// =========================================================================

/// Write a small gradient JPEG. Creates parent directories.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    img.save_with_format(path, image::ImageFormat::Jpeg).unwrap();
}

/// Write placeholder bytes where a photo is expected; enough for mocks.
pub fn create_placeholder_photo(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"\xFF\xD8placeholder\xFF\xD9").unwrap();
}

// =========================================================================
// Permissions
// =========================================================================

pub struct MockPermissions {
    granted: Vec<Capability>,
    granted_on_request: Vec<Capability>,
    requests: Mutex<Vec<Capability>>,
}

impl MockPermissions {
    /// Already granted for `caps`; requests for anything else are denied.
    pub fn granting(caps: &[Capability]) -> Self {
        Self {
            granted: caps.to_vec(),
            granted_on_request: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Undetermined until requested, then granted for `caps`.
    pub fn granting_on_request(caps: &[Capability]) -> Self {
        Self {
            granted: Vec::new(),
            granted_on_request: caps.to_vec(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn all() -> Self {
        Self::granting(&[
            Capability::Camera,
            Capability::Location,
            Capability::MediaLibrary,
            Capability::Notifications,
        ])
    }

    pub fn denying() -> Self {
        Self::granting(&[])
    }

    /// Capabilities requested so far, in order.
    pub fn requests(&self) -> Vec<Capability> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Permissions for MockPermissions {
    async fn status(&self, capability: Capability) -> PermissionStatus {
        if self.granted.contains(&capability) {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Undetermined
        }
    }

    async fn request(&self, capability: Capability) -> PermissionStatus {
        self.requests.lock().unwrap().push(capability);
        if self.granted.contains(&capability) || self.granted_on_request.contains(&capability) {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        }
    }
}

// =========================================================================
// Location
// =========================================================================

pub struct MockLocation {
    result: Option<Position>,
    requested: Mutex<Vec<Accuracy>>,
}

impl MockLocation {
    pub fn at(latitude: f64, longitude: f64, altitude: Option<f64>) -> Self {
        Self {
            result: Some(Position {
                latitude,
                longitude,
                altitude,
            }),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: None,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<Accuracy> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocationProvider for MockLocation {
    async fn current_position(&self, accuracy: Accuracy) -> Result<Position, LocationError> {
        self.requested.lock().unwrap().push(accuracy);
        self.result
            .ok_or_else(|| LocationError::Unavailable("mock location failure".into()))
    }
}

// =========================================================================
// Camera
// =========================================================================

enum CameraBehavior {
    Return(CapturedAsset),
    Cancel,
    Fail,
}

pub struct MockCamera {
    behavior: CameraBehavior,
    calls: AtomicUsize,
}

impl MockCamera {
    pub fn returning(path: &Path, exif: Map<String, Value>) -> Self {
        Self::with(CameraBehavior::Return(CapturedAsset {
            path: path.to_path_buf(),
            exif,
        }))
    }

    pub fn cancelling() -> Self {
        Self::with(CameraBehavior::Cancel)
    }

    pub fn failing() -> Self {
        Self::with(CameraBehavior::Fail)
    }

    fn with(behavior: CameraBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Camera for MockCamera {
    async fn capture(&self, _options: &CaptureOptions) -> Result<Option<CapturedAsset>, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            CameraBehavior::Return(asset) => Ok(Some(asset.clone())),
            CameraBehavior::Cancel => Ok(None),
            CameraBehavior::Fail => Err(CaptureError::Camera("mock camera failure".into())),
        }
    }
}

// =========================================================================
// Notices, gallery, reminders
// =========================================================================

#[derive(Default)]
pub struct RecordingNotices {
    alerts: Mutex<Vec<(String, String)>>,
    toasts: Mutex<Vec<(String, NoticeKind)>>,
}

impl RecordingNotices {
    /// Alert titles in order.
    pub fn alerts(&self) -> Vec<String> {
        self.alerts
            .lock()
            .unwrap()
            .iter()
            .map(|(title, _)| title.clone())
            .collect()
    }

    pub fn toasts(&self) -> Vec<(String, NoticeKind)> {
        self.toasts.lock().unwrap().clone()
    }

    pub fn toast_messages(&self) -> Vec<String> {
        self.toasts().into_iter().map(|(m, _)| m).collect()
    }
}

impl Notices for RecordingNotices {
    fn alert(&self, title: &str, message: &str) {
        self.alerts
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }

    fn toast(&self, message: &str, kind: NoticeKind) {
        self.toasts.lock().unwrap().push((message.to_string(), kind));
    }
}

#[derive(Default)]
pub struct MockGallery {
    saved: Mutex<Vec<PathBuf>>,
}

impl MockGallery {
    pub fn saved(&self) -> Vec<PathBuf> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl Gallery for MockGallery {
    async fn save(&self, photo: &Path) -> std::io::Result<PathBuf> {
        self.saved.lock().unwrap().push(photo.to_path_buf());
        Ok(PathBuf::from("/gallery").join(photo.file_name().unwrap_or_default()))
    }
}

#[derive(Default)]
pub struct MockReminders {
    scheduled: Mutex<Vec<Reminder>>,
    cancel_calls: AtomicUsize,
    fail: bool,
}

impl MockReminders {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn scheduled(&self) -> Vec<Reminder> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReminderScheduler for MockReminders {
    async fn cancel_all(&self) -> Result<(), ReminderError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ReminderError::NotPermitted);
        }
        self.scheduled.lock().unwrap().clear();
        Ok(())
    }

    async fn schedule(
        &self,
        title: &str,
        body: &str,
        fire_at: DateTime<Utc>,
    ) -> Result<String, ReminderError> {
        let mut scheduled = self.scheduled.lock().unwrap();
        let id = format!("reminder-{}", scheduled.len() + 1);
        scheduled.push(Reminder {
            id: id.clone(),
            title: title.to_string(),
            body: body.to_string(),
            fire_at,
        });
        Ok(id)
    }

    async fn pending(&self) -> Result<Vec<Reminder>, ReminderError> {
        Ok(self.scheduled())
    }
}

// =========================================================================
// Device bundle
// =========================================================================

/// Mocks for every platform service, with typed handles kept for asserts.
///
/// Defaults: all permissions granted, camera cancels, location fails.
pub struct TestDevice {
    pub permissions: Arc<MockPermissions>,
    pub camera: Arc<MockCamera>,
    pub location: Arc<MockLocation>,
    pub notices: Arc<RecordingNotices>,
    pub gallery: Arc<MockGallery>,
    pub reminders: Arc<MockReminders>,
}

impl TestDevice {
    pub fn new() -> Self {
        Self {
            permissions: Arc::new(MockPermissions::all()),
            camera: Arc::new(MockCamera::cancelling()),
            location: Arc::new(MockLocation::failing()),
            notices: Arc::new(RecordingNotices::default()),
            gallery: Arc::new(MockGallery::default()),
            reminders: Arc::new(MockReminders::default()),
        }
    }

    pub fn camera(mut self, camera: MockCamera) -> Self {
        self.camera = Arc::new(camera);
        self
    }

    pub fn location(mut self, location: MockLocation) -> Self {
        self.location = Arc::new(location);
        self
    }

    pub fn permissions(mut self, permissions: MockPermissions) -> Self {
        self.permissions = Arc::new(permissions);
        self
    }

    pub fn reminders(mut self, reminders: MockReminders) -> Self {
        self.reminders = Arc::new(reminders);
        self
    }

    pub fn device(&self) -> Device {
        Device {
            permissions: self.permissions.clone(),
            camera: self.camera.clone(),
            location: self.location.clone(),
            notices: self.notices.clone(),
            gallery: self.gallery.clone(),
            reminders: self.reminders.clone(),
        }
    }

    pub fn camera_calls(&self) -> usize {
        self.camera.calls()
    }
}

// =========================================================================
// Drive
// =========================================================================

pub struct StaticTokens {
    user: Option<UserInfo>,
    token: Option<String>,
}

impl StaticTokens {
    pub fn signed_in(token: &str) -> Self {
        Self {
            user: Some(UserInfo {
                email: "inspector@example.com".into(),
                name: None,
            }),
            token: Some(token.to_string()),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            user: None,
            token: None,
        }
    }

    /// Signed in, but no token can be produced.
    pub fn without_token() -> Self {
        Self {
            token: None,
            ..Self::signed_in("")
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokens {
    fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    async fn access_token(&self) -> Option<String> {
        self.token.clone()
    }

    fn user(&self) -> Option<UserInfo> {
        self.user.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriveCall {
    List { name: String, parent: String },
    Create { name: String, parent: String },
    Initiate { name: String, parent: String },
    Transfer { session: String, len: usize },
}

/// In-memory Drive. Ids are `folder-N`, `session-N` and `file-N`.
#[derive(Default)]
pub struct MockDriveApi {
    folders: Mutex<Vec<(String, String, String)>>,
    calls: Mutex<Vec<DriveCall>>,
    fail_at: Option<Phase>,
    folder_seq: AtomicUsize,
    session_seq: AtomicUsize,
    file_seq: AtomicUsize,
}

impl MockDriveApi {
    /// Pre-existing folders as `(name, parent, id)`.
    pub fn with_folders(folders: &[(&str, &str, &str)]) -> Self {
        Self {
            folders: Mutex::new(
                folders
                    .iter()
                    .map(|(n, p, id)| (n.to_string(), p.to_string(), id.to_string()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    pub fn failing_at(phase: Phase) -> Self {
        Self {
            fail_at: Some(phase),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<DriveCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: DriveCall, phase: Phase) -> Result<(), DriveError> {
        self.calls.lock().unwrap().push(call);
        if self.fail_at == Some(phase) {
            return Err(DriveError::Http {
                phase,
                status: 500,
                body: "mock failure".into(),
            });
        }
        Ok(())
    }

    fn next(seq: &AtomicUsize, prefix: &str) -> String {
        format!("{prefix}-{}", seq.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl DriveApi for MockDriveApi {
    async fn list_folders(
        &self,
        _token: &str,
        name: &str,
        parent: &str,
    ) -> Result<Vec<DriveFile>, DriveError> {
        self.record(
            DriveCall::List {
                name: name.into(),
                parent: parent.into(),
            },
            Phase::List,
        )?;
        Ok(self
            .folders
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, p, _)| n == name && p == parent)
            .map(|(n, _, id)| DriveFile {
                id: id.clone(),
                name: n.clone(),
            })
            .collect())
    }

    async fn create_folder(
        &self,
        _token: &str,
        name: &str,
        parent: &str,
    ) -> Result<String, DriveError> {
        self.record(
            DriveCall::Create {
                name: name.into(),
                parent: parent.into(),
            },
            Phase::CreateFolder,
        )?;
        let id = Self::next(&self.folder_seq, "folder");
        self.folders
            .lock()
            .unwrap()
            .push((name.into(), parent.into(), id.clone()));
        Ok(id)
    }

    async fn initiate_upload(
        &self,
        _token: &str,
        name: &str,
        parent: &str,
    ) -> Result<String, DriveError> {
        self.record(
            DriveCall::Initiate {
                name: name.into(),
                parent: parent.into(),
            },
            Phase::Initiate,
        )?;
        Ok(Self::next(&self.session_seq, "session"))
    }

    async fn transfer(
        &self,
        _token: &str,
        session_uri: &str,
        bytes: Vec<u8>,
    ) -> Result<String, DriveError> {
        self.record(
            DriveCall::Transfer {
                session: session_uri.into(),
                len: bytes.len(),
            },
            Phase::Transfer,
        )?;
        Ok(Self::next(&self.file_seq, "file"))
    }
}
