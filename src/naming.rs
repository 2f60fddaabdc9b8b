//! Names of uploaded files, Drive folders and intermediate files.
//!
//! | What | Format | Clock |
//! |---|---|---|
//! | Uploaded photo | `YYYY-MM-DD_HH-MM-SS.jpg`, or `<custom>.jpg` | local |
//! | Date folder | `YYYY-MM-DD` | UTC |
//! | Working copy | `<stem>-<stage>.jpg` in the work directory | - |
//!
//! The date folder follows the UTC calendar day while file names use local
//! time, so a photo taken shortly after local midnight east of Greenwich can
//! land in the previous day's folder. This matches what existing uploads
//! already look like in Drive.

use chrono::{DateTime, Local, Utc};
use std::path::{Path, PathBuf};

/// File name for an upload taken at `taken_at`.
///
/// A non-blank `custom` name wins and gets `.jpg` appended as-is.
pub fn photo_file_name(custom: Option<&str>, taken_at: &DateTime<Local>) -> String {
    match custom.map(str::trim).filter(|c| !c.is_empty()) {
        Some(name) => format!("{name}.jpg"),
        None => taken_at.format("%Y-%m-%d_%H-%M-%S.jpg").to_string(),
    }
}

/// Name of the per-day folder for an upload at `taken_at`.
pub fn date_folder_name(taken_at: &DateTime<Utc>) -> String {
    taken_at.format("%Y-%m-%d").to_string()
}

/// Path of an intermediate file derived from `source` for a pipeline stage.
///
/// `photo.jpg` + `"overlay"` → `<work_dir>/photo-overlay.jpg`.
pub fn stage_path(work_dir: &Path, source: &Path, stage: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "photo".to_string());
    work_dir.join(format!("{stem}-{stage}.jpg"))
}
