//! Image processing: pure Rust, statically linked.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` |
//! | **Resize + compress** | `resize_exact` (Lanczos3) + JPEG encoder |
//! | **Text overlay** | cover crop + `font8x8` glyphs with a dark halo |
//! | **EXIF GPS** | custom APP1/TIFF codec |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for canvas and text layout (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod exif;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::glyph_scale;
pub use exif::{ExifTags, GpsAltitude, GpsPosition};
pub use operations::{
    GPS_COMMENT, encode_photo, exif_datetime, get_dimensions, gps_exif_tags, tag_photo,
};
pub use params::{
    EncodeParams, ExifParams, OverlayParams, Quality, TextPosition, parse_hex_color,
};
pub use rust_backend::RustBackend;
