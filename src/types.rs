//! Shared types used across pipeline stages.
//!
//! These are serialized to JSON by the CLI so a capture can be handed to a
//! later `compose`/`process`/`upload` invocation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A captured photo plus the metadata gathered right after the shutter fired.
///
/// Every metadata field is best-effort: a failed lookup leaves it `None`
/// without affecting the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoData {
    pub path: PathBuf,
    pub file_size_bytes: Option<u64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl PhotoData {
    /// Both pixel dimensions, when known and non-zero.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }

    /// Both coordinates, when known.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// A file stored in Drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
}
