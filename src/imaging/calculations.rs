//! Pure calculation functions for canvas and text layout.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::TextPosition;

/// Distance between the text block and the canvas edge.
pub const TEXT_MARGIN: u32 = 12;

/// Native glyph size of the bitmap font, in pixels.
pub const GLYPH_SIZE: u32 = 8;

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height matches, width overflows
        let h = tgt_h;
        let w = ((h as f64 * src_aspect).round() as u32).max(tgt_w);
        (w, h)
    } else {
        let w = tgt_w;
        let h = ((w as f64 / src_aspect).round() as u32).max(tgt_h);
        (w, h)
    }
}

/// Top-left offset of a centered `target` crop inside `fill`.
pub fn center_crop_offset(fill: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    (
        fill.0.saturating_sub(target.0) / 2,
        fill.1.saturating_sub(target.1) / 2,
    )
}

/// Integer upscale applied to 8px glyphs to approximate `font_size`.
///
/// ```
/// # use geosnap::imaging::glyph_scale;
/// assert_eq!(glyph_scale(16), 2);
/// assert_eq!(glyph_scale(4), 1);
/// ```
pub fn glyph_scale(font_size: u32) -> u32 {
    ((font_size as f64 / GLYPH_SIZE as f64).round() as u32).max(1)
}

/// Horizontal offset of the second stroke that makes glyphs bold.
pub fn bold_offset(scale: u32) -> u32 {
    scale.div_ceil(2)
}

/// Vertical gap between consecutive lines.
pub fn line_gap(scale: u32) -> u32 {
    2 * scale
}

/// Pixel size of a block of text lines rendered at `scale`.
///
/// Width is taken from the longest line in characters. An empty block is 0×0.
pub fn text_block_size(lines: &[String], scale: u32) -> (u32, u32) {
    if lines.is_empty() {
        return (0, 0);
    }
    let cell = GLYPH_SIZE * scale;
    let longest = lines
        .iter()
        .map(|l| l.chars().count() as u32)
        .max()
        .unwrap_or(0);
    let width = if longest == 0 {
        0
    } else {
        longest * cell + bold_offset(scale)
    };
    let n = lines.len() as u32;
    let height = n * cell + (n - 1) * line_gap(scale);
    (width, height)
}

/// Most pixels a rendered text mask (halo border included) may cover.
pub const MAX_TEXT_MASK_PIXELS: u64 = 1 << 24;

/// Size of the text mask for `lines` at `scale` with a `pad` border on every
/// side, or `None` when it would exceed [`MAX_TEXT_MASK_PIXELS`].
///
/// Computed in `u64` so absurd font sizes are rejected instead of wrapping.
pub fn text_mask_size(lines: &[String], scale: u32, pad: u32) -> Option<(u32, u32)> {
    let scale = u64::from(scale);
    let cell = u64::from(GLYPH_SIZE).checked_mul(scale)?;
    let longest = lines.iter().map(|l| l.chars().count() as u64).max().unwrap_or(0);
    let text_w = if longest == 0 {
        0
    } else {
        longest.checked_mul(cell)?.checked_add(scale.div_ceil(2))?
    };
    let n = lines.len() as u64;
    let text_h = match n {
        0 => 0,
        n => n
            .checked_mul(cell)?
            .checked_add((n - 1).checked_mul(2 * scale)?)?,
    };
    let width = text_w.checked_add(2 * u64::from(pad))?;
    let height = text_h.checked_add(2 * u64::from(pad))?;
    if width.checked_mul(height)? > MAX_TEXT_MASK_PIXELS {
        return None;
    }
    Some((u32::try_from(width).ok()?, u32::try_from(height).ok()?))
}

/// Top-left corner of a `block` placed on `canvas` at `position`.
///
/// Corners keep [`TEXT_MARGIN`] from both edges. Blocks larger than the
/// canvas yield negative coordinates; drawing clips them.
pub fn anchor_text_block(canvas: (u32, u32), block: (u32, u32), position: TextPosition) -> (i64, i64) {
    let (cw, ch) = (canvas.0 as i64, canvas.1 as i64);
    let (bw, bh) = (block.0 as i64, block.1 as i64);
    let m = TEXT_MARGIN as i64;
    match position {
        TextPosition::TopLeft => (m, m),
        TextPosition::TopRight => (cw - m - bw, m),
        TextPosition::BottomLeft => (m, ch - m - bh),
        TextPosition::BottomRight => (cw - m - bw, ch - m - bh),
        TextPosition::Center => ((cw - bw) / 2, (ch - bh) / 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_wider_source() {
        // 4000x3000 (4:3) covering 1280x720 (16:9): height matches
        assert_eq!(calculate_fill_dimensions((4000, 3000), (1280, 720)), (1280, 960));
    }

    #[test]
    fn fill_taller_target() {
        // landscape 1600x900 covering portrait 720x1280: height matches
        assert_eq!(calculate_fill_dimensions((1600, 900), (720, 1280)), (2276, 1280));
    }

    #[test]
    fn fill_same_aspect_is_exact() {
        assert_eq!(calculate_fill_dimensions((3840, 2160), (1920, 1080)), (1920, 1080));
    }

    #[test]
    fn crop_offset_centers() {
        assert_eq!(center_crop_offset((1280, 960), (1280, 720)), (0, 120));
        assert_eq!(center_crop_offset((2276, 1280), (720, 1280)), (778, 0));
        assert_eq!(center_crop_offset((100, 100), (100, 100)), (0, 0));
    }

    #[test]
    fn glyph_scale_rounds_and_floors_at_one() {
        assert_eq!(glyph_scale(16), 2);
        assert_eq!(glyph_scale(20), 3);
        assert_eq!(glyph_scale(11), 1);
        assert_eq!(glyph_scale(1), 1);
        assert_eq!(glyph_scale(48), 6);
    }

    #[test]
    fn block_size_single_line() {
        let lines = vec!["55.751244; 37.618423".to_string()];
        // 20 chars × 16px + bold offset 1
        assert_eq!(text_block_size(&lines, 2), (321, 16));
    }

    #[test]
    fn block_size_counts_chars_not_bytes() {
        let lines = vec!["55° N".to_string()];
        assert_eq!(text_block_size(&lines, 1).0, 5 * 8 + 1);
    }

    #[test]
    fn block_size_multiline() {
        let lines = vec!["abc".to_string(), "abcdef".to_string()];
        // width from longest line, height 2×16 + gap 4
        assert_eq!(text_block_size(&lines, 2), (6 * 16 + 1, 36));
    }

    #[test]
    fn block_size_empty() {
        assert_eq!(text_block_size(&[], 2), (0, 0));
    }

    #[test]
    fn anchors_respect_margin() {
        let canvas = (1280, 720);
        let block = (200, 40);
        assert_eq!(anchor_text_block(canvas, block, TextPosition::TopLeft), (12, 12));
        assert_eq!(anchor_text_block(canvas, block, TextPosition::TopRight), (1068, 12));
        assert_eq!(anchor_text_block(canvas, block, TextPosition::BottomLeft), (12, 668));
        assert_eq!(anchor_text_block(canvas, block, TextPosition::BottomRight), (1068, 668));
        assert_eq!(anchor_text_block(canvas, block, TextPosition::Center), (540, 340));
    }

    #[test]
    fn oversized_block_goes_negative() {
        let (x, _) = anchor_text_block((100, 100), (300, 10), TextPosition::TopRight);
        assert_eq!(x, -212);
    }

    #[test]
    fn mask_size_adds_padding() {
        let lines = vec!["55.751244; 37.618423".to_string()];
        assert_eq!(text_mask_size(&lines, 2, 3), Some((327, 22)));
    }

    #[test]
    fn mask_size_rejects_huge_scale() {
        let lines = vec!["55.751244; 37.618423".to_string()];
        assert_eq!(text_mask_size(&lines, glyph_scale(20_000), 3), None);
        assert_eq!(text_mask_size(&lines, u32::MAX, 3), None);
    }
}
