//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Resize (stretch) | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Cover crop | fill dimensions + `crop_imm` |
//! | Text | `font8x8` bitmap glyphs, scaled, stroked twice for weight |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | EXIF | in-crate APP1 codec ([`exif`](super::exif)) |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{
    GLYPH_SIZE, anchor_text_block, bold_offset, calculate_fill_dimensions, center_crop_offset,
    glyph_scale, line_gap, text_block_size, text_mask_size,
};
use super::exif::{self, ExifTags};
use super::params::{EncodeParams, ExifParams, OverlayParams, Quality};
use font8x8::{BASIC_FONTS, LATIN_FONTS, UnicodeFonts};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader, RgbImage};
use std::path::Path;
use std::sync::LazyLock;

const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Radius of the outline halo around every glyph pixel.
const HALO_RADIUS: i64 = 3;
/// Opacity of the black halo.
const HALO_ALPHA: f32 = 0.7;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk. The format is sniffed from content
/// because camera files do not always carry an extension. The EXIF
/// orientation is applied, so pixels come back the way the photo is viewed.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    let decode_err = |e: image::ImageError| {
        BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
    };
    let mut decoder = ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .into_decoder()
        .map_err(decode_err)?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder).map_err(decode_err)?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Whether `orientation` turns the stored image on its side.
fn swaps_axes(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}

fn save_jpeg(img: &RgbImage, path: &Path, quality: Quality) -> Result<(), BackendError> {
    let file = std::fs::File::create(path)?;
    let writer = std::io::BufWriter::new(file);
    let mut encoder = JpegEncoder::new_with_quality(writer, quality.value() as u8);
    encoder.encode_image(img).map_err(|e| {
        BackendError::ProcessingFailed(format!("Failed to encode {}: {}", path.display(), e))
    })
}

/// Scale to cover `width`×`height`, then center-crop to exactly that size.
fn cover(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let fill = calculate_fill_dimensions((img.width(), img.height()), (width, height));
    let (x, y) = center_crop_offset(fill, (width, height));
    img.resize_exact(fill.0, fill.1, FilterType::Lanczos3)
        .crop_imm(x, y, width, height)
}

fn glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Rasterized text block: glyph coverage plus the halo around it.
///
/// Both masks are `width * height`, row-major, and include a [`HALO_RADIUS`]
/// border on every side of the text itself.
struct TextMask {
    width: u32,
    height: u32,
    glyph: Vec<bool>,
    halo: Vec<bool>,
}

impl TextMask {
    /// `size` must come from [`text_mask_size`] for the same lines and scale.
    fn render(lines: &[String], scale: u32, outline: bool, size: (u32, u32)) -> Self {
        let pad = HALO_RADIUS as u32;
        let (width, height) = size;
        let mut glyph_mask = vec![false; (width * height) as usize];

        let cell = GLYPH_SIZE * scale;
        let strokes = [0, bold_offset(scale)];
        for (li, line) in lines.iter().enumerate() {
            let y0 = pad + li as u32 * (cell + line_gap(scale));
            for (ci, c) in line.chars().enumerate() {
                let x0 = pad + ci as u32 * cell;
                for (row, bits) in glyph(c).into_iter().enumerate() {
                    for col in 0..8u32 {
                        if bits >> col & 1 == 0 {
                            continue;
                        }
                        for dx in strokes {
                            let px = x0 + col * scale + dx;
                            let py = y0 + row as u32 * scale;
                            for sy in 0..scale {
                                for sx in 0..scale {
                                    let (x, y) = (px + sx, py + sy);
                                    if x < width && y < height {
                                        glyph_mask[(y * width + x) as usize] = true;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        let mut halo = vec![false; glyph_mask.len()];
        if outline {
            let r2 = HALO_RADIUS * HALO_RADIUS;
            for y in 0..height as i64 {
                for x in 0..width as i64 {
                    if !glyph_mask[(y * width as i64 + x) as usize] {
                        continue;
                    }
                    for dy in -HALO_RADIUS..=HALO_RADIUS {
                        for dx in -HALO_RADIUS..=HALO_RADIUS {
                            let (hx, hy) = (x + dx, y + dy);
                            if dx * dx + dy * dy <= r2
                                && (0..width as i64).contains(&hx)
                                && (0..height as i64).contains(&hy)
                            {
                                halo[(hy * width as i64 + hx) as usize] = true;
                            }
                        }
                    }
                }
            }
        }

        Self {
            width,
            height,
            glyph: glyph_mask,
            halo,
        }
    }

    /// Paint onto `canvas` with the mask's top-left at `(left, top)`, clipping.
    fn paint(&self, canvas: &mut RgbImage, left: i64, top: i64, color: [u8; 3]) {
        let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
        for my in 0..self.height as i64 {
            let y = top + my;
            if !(0..ch).contains(&y) {
                continue;
            }
            for mx in 0..self.width as i64 {
                let x = left + mx;
                if !(0..cw).contains(&x) {
                    continue;
                }
                let i = (my * self.width as i64 + mx) as usize;
                let px = canvas.get_pixel_mut(x as u32, y as u32);
                if self.glyph[i] {
                    px.0 = color;
                } else if self.halo[i] {
                    for channel in px.0.iter_mut() {
                        *channel = (*channel as f32 * (1.0 - HALO_ALPHA)).round() as u8;
                    }
                }
            }
        }
    }
}

/// Burn `lines` onto `canvas` as described by `params`.
fn draw_text(canvas: &mut RgbImage, params: &OverlayParams) -> Result<(), BackendError> {
    if params.lines.is_empty() {
        return Ok(());
    }
    let scale = glyph_scale(params.font_size);
    let size = text_mask_size(&params.lines, scale, HALO_RADIUS as u32).ok_or_else(|| {
        BackendError::ProcessingFailed(format!(
            "Text at font size {} is too large to render",
            params.font_size
        ))
    })?;
    let block = text_block_size(&params.lines, scale);
    let (x, y) = anchor_text_block(
        (canvas.width(), canvas.height()),
        block,
        params.position,
    );
    let mask = TextMask::render(&params.lines, scale, params.outline, size);
    let pad = HALO_RADIUS;
    mask.paint(canvas, x - pad, y - pad, params.color);
    Ok(())
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let dims_err = |e: image::ImageError| {
            BackendError::ProcessingFailed(format!(
                "Failed to read dimensions of {}: {}",
                path.display(),
                e
            ))
        };
        let mut decoder = ImageReader::open(path)
            .map_err(BackendError::Io)?
            .with_guessed_format()
            .map_err(BackendError::Io)?
            .into_decoder()
            .map_err(dims_err)?;
        let (width, height) = decoder.dimensions();
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        if swaps_axes(orientation) {
            Ok(Dimensions { width: height, height: width })
        } else {
            Ok(Dimensions { width, height })
        }
    }

    fn encode(&self, params: &EncodeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let img = match params.resize {
            Some((w, h)) => img.resize_exact(w, h, FilterType::Lanczos3),
            None => img,
        };
        save_jpeg(&img.to_rgb8(), &params.output, params.quality)
    }

    fn compose(&self, params: &OverlayParams) -> Result<(), BackendError> {
        if params.width == 0 || params.height == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "Invalid canvas {}x{}",
                params.width, params.height
            )));
        }
        let img = load_image(&params.source)?;
        let mut canvas = cover(&img, params.width, params.height).to_rgb8();
        draw_text(&mut canvas, params)?;
        save_jpeg(&canvas, &params.output, Quality::MAX)
    }

    fn write_exif(&self, params: &ExifParams) -> Result<(), BackendError> {
        let jpeg = std::fs::read(&params.source)?;
        let tagged = exif::embed_exif(&jpeg, &params.tags)?;
        std::fs::write(&params.output, tagged)?;
        Ok(())
    }

    fn read_exif(&self, path: &Path) -> Result<ExifTags, BackendError> {
        let bytes = std::fs::read(path)?;
        Ok(exif::read_exif_from_jpeg(&bytes))
    }
}
