//! # geosnap
//!
//! Take a photo, stamp where and when it was taken onto it, and file it in
//! Google Drive under `<root folder>/<YYYY-MM-DD>`.
//!
//! # Architecture: One Photo, Four Steps
//!
//! ```text
//! 1. Capture   camera        →  PhotoData      (path + size, GPS, dimensions)
//! 2. Overlay   PhotoData     →  composed.jpg   (coordinates/date burned in)
//! 3. Process   composed.jpg  →  upload.jpg     (resize, compress, EXIF GPS)
//! 4. Upload    upload.jpg    →  Drive file     (root / date folder, resumable)
//! ```
//!
//! Each step degrades instead of failing: a missing location still yields a
//! photo, a failed overlay uploads the plain photo, failed processing uploads
//! the original, and a failed upload leaves a copy in the local gallery.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`capture`] | Shutter, permission prompt, concurrent metadata after capture |
//! | [`location`] | Location provider trait and "fix or nothing" lookup |
//! | [`metadata`] | Coordinate resolution: live fix, camera EXIF fallback, validity |
//! | [`overlay`] | Overlay text lines and the single-slot compositor queue |
//! | [`process`] | Upload preparation: resize/compress, GPS tagging |
//! | [`drive`] | Folder find-or-create and resumable upload |
//! | [`session`] | End-to-end flows with their notices and fallbacks |
//! | [`reminder`] | "Second photo" reminder scheduling |
//! | [`subscription`] | Subscription status and payment link |
//! | [`store`] | JSON key/value store, equipment id |
//! | [`auth`] | Signed-in user and bearer token |
//! | [`platform`] | Traits for permissions, notices, gallery; the `Device` bundle |
//! | [`desktop`] | File-system implementations of the platform traits |
//! | [`config`] | `config.toml` loading, validation, stock defaults |
//! | [`imaging`] | Pure-Rust decode/resize/JPEG encode, text raster, EXIF codec |
//! | [`naming`] | Upload file names, date folders, working-file paths |
//! | [`types`] | `PhotoData`, `UploadedFile` |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Platform Services Are Traits
//!
//! Camera, location, permissions, notices, gallery and reminders sit behind
//! traits bundled in [`platform::Device`]. The pipeline never knows whether
//! it runs on a phone, on a desktop (where the "camera" imports a file), or
//! against recording mocks in tests.
//!
//! ## One Render at a Time
//!
//! Overlay rendering holds full-size decoded images in memory. The
//! [`overlay::Compositor`] feeds a single worker from a bounded FIFO queue,
//! so at most one render runs and requests finish in the order they were
//! submitted. A full queue rejects immediately rather than piling up work.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resizing and JPEG encoding use the `image` crate; text is drawn
//! from `font8x8` bitmaps; EXIF GPS blocks are written and read by a small
//! in-crate TIFF codec. No system libraries, no font files.
//!
//! ## Prepare Before Leaving, Upload After
//!
//! Saving a previewed photo composes and processes the file before the call
//! returns, then uploads on a detached task. The caller can move on (or the
//! CLI can wait on the handle) while the transfer runs.

pub mod auth;
pub mod capture;
pub mod config;
pub mod desktop;
pub mod drive;
pub mod imaging;
pub mod location;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod overlay;
pub mod platform;
pub mod process;
pub mod reminder;
pub mod session;
pub mod store;
pub mod subscription;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
