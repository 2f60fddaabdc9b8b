//! Text overlay: what to write and the single-slot compositor that writes it.
//!
//! ## Compositor
//!
//! Requests go through a bounded FIFO channel to one worker task, so exactly
//! one render holds the slot at any time and requests finish in submission
//! order. Rendering itself runs on tokio's blocking pool.
//!
//! ```text
//! submit ──► [ queue (capacity N) ] ──► worker ──► spawn_blocking(compose)
//!   │                                      │
//!   └── ComposeTicket ◄── oneshot reply ◄──┘
//! ```
//!
//! A full queue rejects at once with [`OverlayError::QueueFull`]. A ticket
//! that is cancelled, or dropped, before its turn is skipped without
//! rendering.

use crate::config::{CoordinateFormat, FONT_SIZE_RANGE, OverlayConfig};
use crate::imaging::{BackendError, ImageBackend, OverlayParams, TextPosition};
use crate::naming::stage_path;
use crate::types::PhotoData;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("invalid compose request: {0}")]
    InvalidRequest(String),
    #[error("compositor queue is full")]
    QueueFull,
    #[error("compose request cancelled")]
    Cancelled,
    #[error("compositor has shut down")]
    Closed,
    #[error("render failed: {0}")]
    Render(#[from] BackendError),
    #[error("render task failed: {0}")]
    Worker(String),
}

// ============================================================================
// Text lines
// ============================================================================

/// `"{lat}; {lon}"` with `places` decimals.
pub fn format_decimal(latitude: f64, longitude: f64, places: u32) -> String {
    let p = places as usize;
    format!("{latitude:.p$}; {longitude:.p$}")
}

/// One coordinate as whole degrees, minutes and rounded seconds with a
/// hemisphere letter, e.g. `55° 45' 4" N`. Seconds that round up to 60 carry.
pub fn format_dms(value: f64, is_latitude: bool) -> String {
    let abs = value.abs();
    let mut degrees = abs.floor() as u64;
    let minutes_f = (abs - degrees as f64) * 60.0;
    let mut minutes = minutes_f.floor() as u64;
    let mut seconds = ((minutes_f - minutes as f64) * 60.0).round() as u64;
    if seconds == 60 {
        seconds = 0;
        minutes += 1;
    }
    if minutes == 60 {
        minutes = 0;
        degrees += 1;
    }
    let hemisphere = match (is_latitude, value >= 0.0) {
        (true, true) => 'N',
        (true, false) => 'S',
        (false, true) => 'E',
        (false, false) => 'W',
    };
    format!("{degrees}° {minutes}' {seconds}\" {hemisphere}")
}

/// Lines to burn onto a photo, top to bottom.
///
/// Coordinates come first when enabled and both are finite; `Both` renders
/// as decimal. The timestamp line is `DD.MM.YYYY HH:MM` in local time.
pub fn overlay_lines(
    config: &OverlayConfig,
    latitude: Option<f64>,
    longitude: Option<f64>,
    taken_at: &DateTime<Local>,
) -> Vec<String> {
    let mut lines = Vec::new();
    if config.show_coordinates
        && let (Some(lat), Some(lon)) = (latitude, longitude)
        && lat.is_finite()
        && lon.is_finite()
    {
        lines.push(match config.coordinate_format {
            CoordinateFormat::DegreesMinutes => {
                format!("{}  {}", format_dms(lat, true), format_dms(lon, false))
            }
            CoordinateFormat::Decimal | CoordinateFormat::Both => {
                format_decimal(lat, lon, config.decimal_places)
            }
        });
    }
    if config.show_date_time {
        lines.push(taken_at.format("%d.%m.%Y %H:%M").to_string());
    }
    lines
}

// ============================================================================
// Requests
// ============================================================================

/// A photo plus the text to burn onto it.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeRequest {
    pub photo: PathBuf,
    pub width: u32,
    pub height: u32,
    pub text_lines: Vec<String>,
    pub text_position: TextPosition,
    pub font_size: u32,
    pub text_color: [u8; 3],
    pub text_outline: bool,
}

impl ComposeRequest {
    /// Request at the photo's own size, styled by `config`.
    /// `None` when the photo's dimensions are unknown.
    pub fn for_photo(photo: &PhotoData, lines: Vec<String>, config: &OverlayConfig) -> Option<Self> {
        let (width, height) = photo.dimensions()?;
        Some(Self {
            photo: photo.path.clone(),
            width,
            height,
            text_lines: lines,
            text_position: config.text_position,
            font_size: config.font_size,
            text_color: config.color(),
            text_outline: config.text_outline,
        })
    }

    fn validate(&self) -> Result<(), OverlayError> {
        if self.width == 0 || self.height == 0 {
            return Err(OverlayError::InvalidRequest(format!(
                "canvas must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if !FONT_SIZE_RANGE.contains(&self.font_size) {
            return Err(OverlayError::InvalidRequest(format!(
                "font size must be {}-{}, got {}",
                FONT_SIZE_RANGE.start(),
                FONT_SIZE_RANGE.end(),
                self.font_size
            )));
        }
        Ok(())
    }

    fn into_params(self, output: PathBuf) -> OverlayParams {
        OverlayParams {
            source: self.photo,
            output,
            width: self.width,
            height: self.height,
            lines: self.text_lines,
            position: self.text_position,
            font_size: self.font_size,
            color: self.text_color,
            outline: self.text_outline,
        }
    }
}

// ============================================================================
// Compositor
// ============================================================================

/// Shared cancellation flag for one queued request.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct Job {
    params: OverlayParams,
    cancel: CancelToken,
    reply: oneshot::Sender<Result<PathBuf, OverlayError>>,
}

/// Handle to a submitted request.
pub struct ComposeTicket {
    cancel: CancelToken,
    reply: oneshot::Receiver<Result<PathBuf, OverlayError>>,
}

impl ComposeTicket {
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Skip this request if it has not started rendering yet.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the composed file.
    pub async fn wait(self) -> Result<PathBuf, OverlayError> {
        self.reply.await.unwrap_or(Err(OverlayError::Closed))
    }
}

#[derive(Default)]
struct Counters {
    active: AtomicUsize,
    peak: AtomicUsize,
}

/// Single-slot overlay renderer. Cheap to share behind an `Arc`.
pub struct Compositor {
    tx: mpsc::Sender<Job>,
    counters: Arc<Counters>,
    work_dir: PathBuf,
    seq: AtomicU64,
}

impl Compositor {
    /// Start the worker on the current tokio runtime.
    ///
    /// `capacity` bounds how many requests may wait behind the one rendering.
    pub fn spawn(backend: Arc<dyn ImageBackend>, work_dir: &Path, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(Counters::default());
        tokio::spawn(run_worker(rx, backend, Arc::clone(&counters)));
        Self {
            tx,
            counters,
            work_dir: work_dir.to_path_buf(),
            seq: AtomicU64::new(0),
        }
    }

    /// Queue a request without waiting for it.
    pub fn submit(&self, request: ComposeRequest) -> Result<ComposeTicket, OverlayError> {
        request.validate()?;
        let n = self.seq.fetch_add(1, Ordering::SeqCst);
        let output = stage_path(&self.work_dir, &request.photo, &format!("overlay-{n}"));
        let cancel = CancelToken::default();
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job {
            params: request.into_params(output),
            cancel: cancel.clone(),
            reply: reply_tx,
        };
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => OverlayError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => OverlayError::Closed,
        })?;
        Ok(ComposeTicket {
            cancel,
            reply: reply_rx,
        })
    }

    /// Burn text onto a photo and return the path of the new JPEG.
    pub async fn compose_photo_with_overlay(
        &self,
        request: ComposeRequest,
    ) -> Result<PathBuf, OverlayError> {
        self.submit(request)?.wait().await
    }

    /// Renders in progress right now (0 or 1).
    pub fn active(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    /// Highest value [`active`](Self::active) has reached.
    pub fn peak_active(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<Job>,
    backend: Arc<dyn ImageBackend>,
    counters: Arc<Counters>,
) {
    while let Some(job) = rx.recv().await {
        if job.cancel.is_cancelled() || job.reply.is_closed() {
            tracing::debug!(output = %job.params.output.display(), "skipping cancelled compose");
            let _ = job.reply.send(Err(OverlayError::Cancelled));
            continue;
        }

        let now = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak.fetch_max(now, Ordering::SeqCst);

        let backend = Arc::clone(&backend);
        let params = job.params;
        let rendered = tokio::task::spawn_blocking(move || {
            backend.compose(&params).map(|()| params.output)
        })
        .await;

        counters.active.fetch_sub(1, Ordering::SeqCst);

        let result = match rendered {
            Ok(Ok(path)) => Ok(path),
            Ok(Err(e)) => {
                tracing::warn!("overlay render failed: {e}");
                Err(OverlayError::Render(e))
            }
            Err(e) => Err(OverlayError::Worker(e.to_string())),
        };
        let _ = job.reply.send(result);
    }
    tracing::debug!("compositor worker stopped");
}
