//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the five operations the pipeline needs:
//! identify, encode, compose, write_exif and read_exif.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): pure Rust, statically
//! linked. Tests swap in the recording `MockBackend` below.

use super::exif::{ExifError, ExifTags};
use super::params::{EncodeParams, ExifParams, OverlayParams};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("EXIF error: {0}")]
    Exif(#[from] ExifError),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Send + Sync` because the compositor hands the backend to a blocking
/// worker thread.
pub trait ImageBackend: Send + Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Re-encode as JPEG, optionally resizing to exact dimensions.
    fn encode(&self, params: &EncodeParams) -> Result<(), BackendError>;

    /// Cover-fit onto a canvas and burn in text.
    fn compose(&self, params: &OverlayParams) -> Result<(), BackendError>;

    /// Copy a JPEG, replacing its EXIF block.
    fn write_exif(&self, params: &ExifParams) -> Result<(), BackendError>;

    /// Read the EXIF tags the pipeline understands.
    fn read_exif(&self, path: &Path) -> Result<ExifTags, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Mock backend that records operations instead of touching pixels.
    ///
    /// Output paths get a copy of the source file (when it exists) so later
    /// pipeline stages find something on disk.
    #[derive(Default)]
    pub struct MockBackend {
        pub identify_results: Mutex<Vec<Dimensions>>,
        pub exif_results: Mutex<Vec<ExifTags>>,
        pub operations: Mutex<Vec<RecordedOp>>,
        pub fail_compose: AtomicBool,
        pub fail_encode: AtomicBool,
        pub compose_delay: Mutex<Option<Duration>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Encode {
            source: String,
            output: String,
            resize: Option<(u32, u32)>,
            quality: u32,
        },
        Compose {
            source: String,
            output: String,
            width: u32,
            height: u32,
            lines: Vec<String>,
        },
        WriteExif {
            source: String,
            output: String,
            tags: ExifTags,
        },
        ReadExif(String),
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_dimensions(dims: Vec<Dimensions>) -> Self {
            Self {
                identify_results: Mutex::new(dims),
                ..Self::default()
            }
        }

        pub fn failing_compose() -> Self {
            let backend = Self::default();
            backend.fail_compose.store(true, Ordering::SeqCst);
            backend
        }

        pub fn slow_compose(delay: Duration) -> Self {
            let backend = Self::default();
            *backend.compose_delay.lock().unwrap() = Some(delay);
            backend
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        /// Highest number of compose calls observed running at once.
        pub fn peak_concurrent_compose(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        fn mirror(source: &Path, output: &Path) {
            if source.exists() && source != output {
                let _ = std::fs::copy(source, output);
            }
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));

            self.identify_results
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| BackendError::ProcessingFailed("No mock dimensions".to_string()))
        }

        fn encode(&self, params: &EncodeParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Encode {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                resize: params.resize,
                quality: params.quality.value(),
            });
            if self.fail_encode.load(Ordering::SeqCst) {
                return Err(BackendError::ProcessingFailed("mock encode failure".into()));
            }
            Self::mirror(&params.source, &params.output);
            Ok(())
        }

        fn compose(&self, params: &OverlayParams) -> Result<(), BackendError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            self.operations.lock().unwrap().push(RecordedOp::Compose {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                width: params.width,
                height: params.height,
                lines: params.lines.clone(),
            });
            let delay = *self.compose_delay.lock().unwrap();
            if let Some(delay) = delay {
                std::thread::sleep(delay);
            }

            let result = if self.fail_compose.load(Ordering::SeqCst) {
                Err(BackendError::ProcessingFailed("mock compose failure".into()))
            } else {
                Self::mirror(&params.source, &params.output);
                Ok(())
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }

        fn write_exif(&self, params: &ExifParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::WriteExif {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                tags: params.tags.clone(),
            });
            Self::mirror(&params.source, &params.output);
            Ok(())
        }

        fn read_exif(&self, path: &Path) -> Result<ExifTags, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::ReadExif(path.to_string_lossy().to_string()));

            Ok(self.exif_results.lock().unwrap().pop().unwrap_or_default())
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_dimensions(vec![Dimensions {
            width: 800,
            height: 600,
        }]);

        let result = backend.identify(Path::new("/test/image.jpg")).unwrap();
        assert_eq!(result.width, 800);
        assert_eq!(result.height, 600);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "/test/image.jpg"));
    }

    #[test]
    fn mock_identify_without_results_errors() {
        let backend = MockBackend::new();
        assert!(backend.identify(Path::new("/x.jpg")).is_err());
    }

    #[test]
    fn mock_records_encode() {
        let backend = MockBackend::new();

        backend
            .encode(&EncodeParams {
                source: "/source.jpg".into(),
                output: "/output.jpg".into(),
                resize: Some((1280, 720)),
                quality: crate::imaging::Quality::new(80),
            })
            .unwrap();

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            &ops[0],
            RecordedOp::Encode {
                resize: Some((1280, 720)),
                quality: 80,
                ..
            }
        ));
    }

    #[test]
    fn mock_compose_failure_is_reported() {
        let backend = MockBackend::failing_compose();
        let result = backend.compose(&OverlayParams {
            source: "/a.jpg".into(),
            output: "/b.jpg".into(),
            width: 10,
            height: 10,
            lines: vec![],
            position: Default::default(),
            font_size: 16,
            color: [255, 255, 255],
            outline: true,
        });
        assert!(result.is_err());
        assert_eq!(backend.peak_concurrent_compose(), 1);
    }
}
