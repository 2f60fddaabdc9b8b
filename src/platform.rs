//! Device capabilities the pipeline talks to.
//!
//! Each platform service is a trait so the pipeline runs the same against a
//! phone, a desktop (see [`desktop`](crate::desktop)) or test doubles:
//!
//! | Trait | Module | Used by |
//! |---|---|---|
//! | [`Permissions`] | here | capture, location, gallery |
//! | [`Notices`] | here | every user-visible outcome |
//! | [`Gallery`] | here | local copies of uploads |
//! | [`Camera`] | [`capture`](crate::capture) | shutter |
//! | [`LocationProvider`] | [`location`](crate::location) | coordinates, altitude |
//! | [`ReminderScheduler`] | [`reminder`](crate::reminder) | "second photo" reminder |

use crate::capture::Camera;
use crate::location::LocationProvider;
use crate::reminder::ReminderScheduler;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Camera,
    Location,
    MediaLibrary,
    Notifications,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

#[async_trait]
pub trait Permissions: Send + Sync {
    async fn status(&self, capability: Capability) -> PermissionStatus;
    async fn request(&self, capability: Capability) -> PermissionStatus;
}

/// Check a permission and ask for it when not yet granted.
pub async fn ensure_permission(permissions: &dyn Permissions, capability: Capability) -> bool {
    if permissions.status(capability).await == PermissionStatus::Granted {
        return true;
    }
    let granted = permissions.request(capability).await == PermissionStatus::Granted;
    if !granted {
        tracing::debug!(?capability, "permission denied");
    }
    granted
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

/// User-facing messages: blocking alerts and transient toasts.
pub trait Notices: Send + Sync {
    fn alert(&self, title: &str, message: &str);
    fn toast(&self, message: &str, kind: NoticeKind);
}

/// The device photo library.
#[async_trait]
pub trait Gallery: Send + Sync {
    /// Store a copy of `photo`; returns where it ended up.
    async fn save(&self, photo: &Path) -> std::io::Result<PathBuf>;
}

/// All platform services, shared across tasks.
#[derive(Clone)]
pub struct Device {
    pub permissions: Arc<dyn Permissions>,
    pub camera: Arc<dyn Camera>,
    pub location: Arc<dyn LocationProvider>,
    pub notices: Arc<dyn Notices>,
    pub gallery: Arc<dyn Gallery>,
    pub reminders: Arc<dyn ReminderScheduler>,
}
