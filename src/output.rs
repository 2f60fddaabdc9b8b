//! CLI output formatting.
//!
//! Every entity is shown as a header line followed by indented context
//! lines, so a capture, an upload and a reminder list all read the same way.
//!
//! # Output Format
//!
//! ## Capture
//!
//! ```text
//! Photo shot.jpg
//!     Source: /home/me/.cache/geosnap/shot.jpg
//!     Size: 2.4 MB
//!     Dimensions: 4000x3000
//!     Location: 55.751244; 37.618423
//! ```
//!
//! ## Upload
//!
//! ```text
//! Uploaded 2024-05-07_12-30-15.jpg
//!     Id: 1AbCdEf
//! ```
//!
//! ## Reminders
//!
//! ```text
//! Reminders
//! 001 📸 Time to take the second photo! (in 29 min)
//!     Don't forget to take a photo from another angle
//! ```
//!
//! # Architecture
//!
//! Each entity has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no clock.

use crate::overlay::format_decimal;
use crate::platform::NoticeKind;
use crate::reminder::Reminder;
use crate::subscription::SubscriptionInfo;
use crate::types::{PhotoData, UploadedFile};
use chrono::{DateTime, Utc};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn context(label: &str, value: impl std::fmt::Display) -> String {
    format!("{}{label}: {value}", indent(1))
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

/// One-line toast, prefixed by its kind.
pub fn format_notice(kind: NoticeKind, message: &str) -> String {
    let tag = match kind {
        NoticeKind::Info => "info",
        NoticeKind::Success => "ok",
        NoticeKind::Error => "error",
    };
    format!("[{tag}] {message}")
}

// ============================================================================
// Photos and uploads
// ============================================================================

/// Captured photo with whatever metadata was resolved.
pub fn format_photo(photo: &PhotoData) -> Vec<String> {
    let name = photo
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| photo.path.display().to_string());
    let mut lines = vec![format!("Photo {name}")];
    lines.push(context("Source", photo.path.display()));
    if let Some(size) = photo.file_size_bytes {
        lines.push(context("Size", format_size(size)));
    }
    if let Some((w, h)) = photo.dimensions() {
        lines.push(context("Dimensions", format!("{w}x{h}")));
    }
    match photo.coordinates() {
        Some((lat, lon)) => lines.push(context("Location", format_decimal(lat, lon, 6))),
        None => lines.push(context("Location", "unknown")),
    }
    lines
}

pub fn print_photo(photo: &PhotoData) {
    for line in format_photo(photo) {
        println!("{}", line);
    }
}

pub fn format_uploaded(file: &UploadedFile) -> Vec<String> {
    vec![format!("Uploaded {}", file.name), context("Id", &file.id)]
}

pub fn print_uploaded(file: &UploadedFile) {
    for line in format_uploaded(file) {
        println!("{}", line);
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Subscription status for this device. `info` is `None` when nothing has
/// been fetched.
pub fn format_subscription(
    info: Option<&SubscriptionInfo>,
    equipment_id: &str,
    payment_url: &str,
) -> Vec<String> {
    let mut lines = Vec::new();
    match info {
        Some(info) => {
            let status = serde_json::to_value(info.status)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            lines.push(format!("Subscription: {status} ({})", info.plan_name));
            if let Some(expires) = &info.expires_at {
                lines.push(context("Expires", expires));
            }
        }
        None => lines.push("Subscription: unknown".to_string()),
    }
    lines.push(context("Equipment", equipment_id));
    lines.push(context("Payment", payment_url));
    lines
}

// ============================================================================
// Reminders
// ============================================================================

fn relative(fire_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if fire_at <= now {
        return "due".to_string();
    }
    let minutes = (fire_at - now).num_minutes();
    if minutes < 1 {
        "in <1 min".to_string()
    } else {
        format!("in {minutes} min")
    }
}

pub fn format_reminders(reminders: &[Reminder], now: DateTime<Utc>) -> Vec<String> {
    if reminders.is_empty() {
        return vec!["No reminders scheduled".to_string()];
    }
    let mut lines = vec!["Reminders".to_string()];
    for (i, r) in reminders.iter().enumerate() {
        lines.push(format!(
            "{} {} ({})",
            format_index(i + 1),
            r.title,
            relative(r.fire_at, now)
        ));
        lines.push(format!("{}{}", indent(1), r.body));
    }
    lines
}

pub fn print_reminders(reminders: &[Reminder], now: DateTime<Utc>) {
    for line in format_reminders(reminders, now) {
        println!("{}", line);
    }
}
