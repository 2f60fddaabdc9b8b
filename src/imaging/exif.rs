//! Minimal EXIF codec for JPEG files.
//!
//! Writes and reads the handful of tags the upload pipeline cares about:
//!
//! | Tag | IFD | Type |
//! |---|---|---|
//! | GPSVersionID (0x0000) | GPS | BYTE\[4\] |
//! | GPSLatitudeRef / GPSLongitudeRef (0x0001 / 0x0003) | GPS | ASCII |
//! | GPSLatitude / GPSLongitude (0x0002 / 0x0004) | GPS | RATIONAL\[3\] (deg, min, sec) |
//! | GPSAltitudeRef (0x0005) | GPS | BYTE (0 = above, 1 = below sea level) |
//! | GPSAltitude (0x0006) | GPS | RATIONAL |
//! | DateTimeOriginal (0x9003) | Exif | ASCII `YYYY:MM:DD HH:MM:SS` |
//! | CreateDate (0x9004) | Exif | ASCII `YYYY:MM:DD HH:MM:SS` |
//! | UserComment (0x9286) | Exif | UNDEFINED, `ASCII\0\0\0` charset prefix |
//!
//! The block lives in a JPEG APP1 segment: `FF E1 <len> "Exif\0\0" <TIFF>`.
//! Writing always produces big-endian TIFF; reading accepts both byte orders
//! since camera firmware commonly writes little-endian.
//!
//! Zero external dependencies, pure Rust.

use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;

const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";
const COMMENT_CHARSET: &[u8; 8] = b"ASCII\0\0\0";

const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_GPS_IFD: u16 = 0x8825;
const TAG_GPS_VERSION: u16 = 0x0000;
const TAG_GPS_LATITUDE_REF: u16 = 0x0001;
const TAG_GPS_LATITUDE: u16 = 0x0002;
const TAG_GPS_LONGITUDE_REF: u16 = 0x0003;
const TAG_GPS_LONGITUDE: u16 = 0x0004;
const TAG_GPS_ALTITUDE_REF: u16 = 0x0005;
const TAG_GPS_ALTITUDE: u16 = 0x0006;
const TAG_DATE_TIME_ORIGINAL: u16 = 0x9003;
const TAG_CREATE_DATE: u16 = 0x9004;
const TAG_USER_COMMENT: u16 = 0x9286;

const FORMAT_BYTE: u16 = 1;
const FORMAT_ASCII: u16 = 2;
const FORMAT_LONG: u16 = 4;
const FORMAT_RATIONAL: u16 = 5;
const FORMAT_UNDEFINED: u16 = 7;

/// Seconds are stored with 1/10000 arc-second resolution.
const SECOND_DENOMINATOR: u32 = 10_000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExifError {
    #[error("not a JPEG file")]
    NotJpeg,
    #[error("JPEG segment structure is truncated")]
    Truncated,
    #[error("EXIF block of {0} bytes does not fit in an APP1 segment")]
    TooLarge(usize),
}

/// Latitude/longitude as absolute values plus hemisphere reference letters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsPosition {
    pub latitude: f64,
    pub latitude_ref: char,
    pub longitude: f64,
    pub longitude_ref: char,
}

impl GpsPosition {
    pub fn from_signed(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: latitude.abs(),
            latitude_ref: if latitude >= 0.0 { 'N' } else { 'S' },
            longitude: longitude.abs(),
            longitude_ref: if longitude >= 0.0 { 'E' } else { 'W' },
        }
    }

    /// Signed decimal degrees (south and west negative).
    pub fn signed(&self) -> (f64, f64) {
        let lat = if self.latitude_ref == 'S' {
            -self.latitude
        } else {
            self.latitude
        };
        let lon = if self.longitude_ref == 'W' {
            -self.longitude
        } else {
            self.longitude
        };
        (lat, lon)
    }
}

/// Altitude as an absolute value plus the sea-level reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsAltitude {
    pub meters: f64,
    pub below_sea_level: bool,
}

impl GpsAltitude {
    pub fn from_signed(meters: f64) -> Self {
        Self {
            meters: meters.abs(),
            below_sea_level: meters < 0.0,
        }
    }

    /// EXIF `GPSAltitudeRef` value.
    pub fn reference(&self) -> u8 {
        u8::from(self.below_sea_level)
    }
}

/// The tag map written to and read from a photo.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifTags {
    pub gps: Option<GpsPosition>,
    pub altitude: Option<GpsAltitude>,
    pub date_time_original: Option<String>,
    pub create_date: Option<String>,
    pub user_comment: Option<String>,
}

impl ExifTags {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Flatten into the key/value shape camera APIs hand back with a capture
    /// (`GPSLatitude`, `GPSLatitudeRef`, ...).
    pub fn to_json_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(gps) = &self.gps {
            map.insert("GPSLatitude".into(), Value::from(gps.latitude));
            map.insert("GPSLatitudeRef".into(), Value::from(gps.latitude_ref.to_string()));
            map.insert("GPSLongitude".into(), Value::from(gps.longitude));
            map.insert("GPSLongitudeRef".into(), Value::from(gps.longitude_ref.to_string()));
        }
        if let Some(alt) = &self.altitude {
            map.insert("GPSAltitude".into(), Value::from(alt.meters));
            map.insert("GPSAltitudeRef".into(), Value::from(alt.reference()));
        }
        if let Some(dt) = &self.date_time_original {
            map.insert("DateTimeOriginal".into(), Value::from(dt.clone()));
        }
        if let Some(dt) = &self.create_date {
            map.insert("CreateDate".into(), Value::from(dt.clone()));
        }
        if let Some(comment) = &self.user_comment {
            map.insert("UserComment".into(), Value::from(comment.clone()));
        }
        map
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    fn u16(self, v: u16) -> [u8; 2] {
        match self {
            Self::Big => v.to_be_bytes(),
            Self::Little => v.to_le_bytes(),
        }
    }

    fn u32(self, v: u32) -> [u8; 4] {
        match self {
            Self::Big => v.to_be_bytes(),
            Self::Little => v.to_le_bytes(),
        }
    }

    fn read_u16(self, b: &[u8]) -> Option<u16> {
        let arr: [u8; 2] = b.get(..2)?.try_into().ok()?;
        Some(match self {
            Self::Big => u16::from_be_bytes(arr),
            Self::Little => u16::from_le_bytes(arr),
        })
    }

    fn read_u32(self, b: &[u8]) -> Option<u32> {
        let arr: [u8; 4] = b.get(..4)?.try_into().ok()?;
        Some(match self {
            Self::Big => u32::from_be_bytes(arr),
            Self::Little => u32::from_le_bytes(arr),
        })
    }
}

struct Entry {
    tag: u16,
    format: u16,
    count: u32,
    value: Vec<u8>,
}

impl Entry {
    fn ascii(tag: u16, s: &str) -> Self {
        let mut value = s.as_bytes().to_vec();
        value.push(0);
        Self {
            tag,
            format: FORMAT_ASCII,
            count: value.len() as u32,
            value,
        }
    }

    fn bytes(tag: u16, b: &[u8]) -> Self {
        Self {
            tag,
            format: FORMAT_BYTE,
            count: b.len() as u32,
            value: b.to_vec(),
        }
    }

    fn undefined(tag: u16, b: Vec<u8>) -> Self {
        Self {
            tag,
            format: FORMAT_UNDEFINED,
            count: b.len() as u32,
            value: b,
        }
    }

    fn long(tag: u16, v: u32, order: ByteOrder) -> Self {
        Self {
            tag,
            format: FORMAT_LONG,
            count: 1,
            value: order.u32(v).to_vec(),
        }
    }

    fn rationals(tag: u16, pairs: &[(u32, u32)], order: ByteOrder) -> Self {
        let mut value = Vec::with_capacity(pairs.len() * 8);
        for &(num, den) in pairs {
            value.extend_from_slice(&order.u32(num));
            value.extend_from_slice(&order.u32(den));
        }
        Self {
            tag,
            format: FORMAT_RATIONAL,
            count: pairs.len() as u32,
            value,
        }
    }
}

/// Split absolute decimal degrees into degree/minute/second rationals.
fn dms_rationals(value: f64) -> [(u32, u32); 3] {
    let per_second = u64::from(SECOND_DENOMINATOR);
    let total = (value.abs() * 3600.0 * per_second as f64).round() as u64;
    let per_degree = 3600 * per_second;
    let per_minute = 60 * per_second;
    let degrees = total / per_degree;
    let rem = total % per_degree;
    [
        (degrees as u32, 1),
        ((rem / per_minute) as u32, 1),
        ((rem % per_minute) as u32, SECOND_DENOMINATOR),
    ]
}

fn gps_entries(tags: &ExifTags, order: ByteOrder) -> Vec<Entry> {
    let mut entries = Vec::new();
    if let Some(gps) = &tags.gps {
        entries.push(Entry::bytes(TAG_GPS_VERSION, &[2, 3, 0, 0]));
        entries.push(Entry::ascii(
            TAG_GPS_LATITUDE_REF,
            &gps.latitude_ref.to_string(),
        ));
        entries.push(Entry::rationals(
            TAG_GPS_LATITUDE,
            &dms_rationals(gps.latitude),
            order,
        ));
        entries.push(Entry::ascii(
            TAG_GPS_LONGITUDE_REF,
            &gps.longitude_ref.to_string(),
        ));
        entries.push(Entry::rationals(
            TAG_GPS_LONGITUDE,
            &dms_rationals(gps.longitude),
            order,
        ));
    }
    if let Some(alt) = &tags.altitude {
        let millimeters = (alt.meters * 1000.0).round().clamp(0.0, u32::MAX as f64) as u32;
        entries.push(Entry::bytes(TAG_GPS_ALTITUDE_REF, &[alt.reference()]));
        entries.push(Entry::rationals(
            TAG_GPS_ALTITUDE,
            &[(millimeters, 1000)],
            order,
        ));
    }
    entries
}

fn exif_entries(tags: &ExifTags) -> Vec<Entry> {
    let mut entries = Vec::new();
    if let Some(dt) = &tags.date_time_original {
        entries.push(Entry::ascii(TAG_DATE_TIME_ORIGINAL, dt));
    }
    if let Some(dt) = &tags.create_date {
        entries.push(Entry::ascii(TAG_CREATE_DATE, dt));
    }
    if let Some(comment) = &tags.user_comment {
        let mut value = COMMENT_CHARSET.to_vec();
        value.extend_from_slice(comment.as_bytes());
        entries.push(Entry::undefined(TAG_USER_COMMENT, value));
    }
    entries
}

/// Append an IFD at the end of `out` and return `(tag, value_field_offset)`
/// for every entry so pointer entries can be patched afterwards.
///
/// All offsets are relative to the start of `out` (the TIFF header).
fn write_ifd(out: &mut Vec<u8>, mut entries: Vec<Entry>, order: ByteOrder) -> Vec<(u16, usize)> {
    entries.sort_by_key(|e| e.tag);
    let start = out.len();
    let data_start = start + 2 + entries.len() * 12 + 4;
    let mut data: Vec<u8> = Vec::new();
    let mut slots = Vec::with_capacity(entries.len());

    out.extend_from_slice(&order.u16(entries.len() as u16));
    for entry in &entries {
        out.extend_from_slice(&order.u16(entry.tag));
        out.extend_from_slice(&order.u16(entry.format));
        out.extend_from_slice(&order.u32(entry.count));
        slots.push((entry.tag, out.len()));
        if entry.value.len() <= 4 {
            let mut inline = entry.value.clone();
            inline.resize(4, 0);
            out.extend_from_slice(&inline);
        } else {
            let offset = (data_start + data.len()) as u32;
            out.extend_from_slice(&order.u32(offset));
            data.extend_from_slice(&entry.value);
            // Keep every value (and the next IFD) word aligned
            if data.len() % 2 == 1 {
                data.push(0);
            }
        }
    }
    out.extend_from_slice(&order.u32(0));
    out.extend_from_slice(&data);
    slots
}

fn patch_u32(out: &mut [u8], at: usize, value: u32, order: ByteOrder) {
    out[at..at + 4].copy_from_slice(&order.u32(value));
}

fn encode_tiff_with(tags: &ExifTags, order: ByteOrder) -> Vec<u8> {
    let exif = exif_entries(tags);
    let gps = gps_entries(tags, order);

    let mut out = Vec::with_capacity(256);
    match order {
        ByteOrder::Big => out.extend_from_slice(b"MM"),
        ByteOrder::Little => out.extend_from_slice(b"II"),
    }
    out.extend_from_slice(&order.u16(42));
    out.extend_from_slice(&order.u32(8));

    let mut ifd0 = Vec::new();
    if !exif.is_empty() {
        ifd0.push(Entry::long(TAG_EXIF_IFD, 0, order));
    }
    if !gps.is_empty() {
        ifd0.push(Entry::long(TAG_GPS_IFD, 0, order));
    }
    let slots = write_ifd(&mut out, ifd0, order);

    for (pointer_tag, entries) in [(TAG_EXIF_IFD, exif), (TAG_GPS_IFD, gps)] {
        if entries.is_empty() {
            continue;
        }
        let offset = out.len() as u32;
        if let Some(&(_, at)) = slots.iter().find(|(tag, _)| *tag == pointer_tag) {
            patch_u32(&mut out, at, offset, order);
        }
        write_ifd(&mut out, entries, order);
    }
    out
}

/// Encode `tags` as a big-endian TIFF structure (the payload of an EXIF block).
pub fn encode_tiff(tags: &ExifTags) -> Vec<u8> {
    encode_tiff_with(tags, ByteOrder::Big)
}

/// Build a complete APP1 segment (marker, length, `Exif\0\0`, TIFF).
pub fn app1_segment(tags: &ExifTags) -> Result<Vec<u8>, ExifError> {
    let tiff = encode_tiff(tags);
    let len = 2 + EXIF_HEADER.len() + tiff.len();
    if len > usize::from(u16::MAX) {
        return Err(ExifError::TooLarge(len));
    }
    let mut segment = Vec::with_capacity(len + 2);
    segment.extend_from_slice(&[0xFF, 0xE1]);
    segment.extend_from_slice(&(len as u16).to_be_bytes());
    segment.extend_from_slice(EXIF_HEADER);
    segment.extend_from_slice(&tiff);
    Ok(segment)
}

/// Return a copy of `jpeg` whose EXIF block is replaced by `tags`.
///
/// Existing EXIF APP1 segments are dropped. The new segment goes directly
/// after SOI, or after a leading JFIF APP0 segment when there is one.
pub fn embed_exif(jpeg: &[u8], tags: &ExifTags) -> Result<Vec<u8>, ExifError> {
    let (segments, rest) = header_segments(jpeg)?;
    let app1 = app1_segment(tags)?;

    let mut out = Vec::with_capacity(jpeg.len() + app1.len());
    out.extend_from_slice(&[0xFF, 0xD8]);
    let mut kept = segments.into_iter().filter(|s| !is_exif_app1(s)).peekable();
    if let Some(first) = kept.peek()
        && first.get(1) == Some(&0xE0)
    {
        out.extend_from_slice(first);
        kept.next();
    }
    out.extend_from_slice(&app1);
    for segment in kept {
        out.extend_from_slice(segment);
    }
    out.extend_from_slice(rest);
    Ok(out)
}

/// Split a JPEG into its header segments (everything between SOI and SOS)
/// and the remaining bytes starting at SOS.
fn header_segments(jpeg: &[u8]) -> Result<(Vec<&[u8]>, &[u8]), ExifError> {
    if jpeg.len() < 4 || jpeg[0] != 0xFF || jpeg[1] != 0xD8 {
        return Err(ExifError::NotJpeg);
    }
    let mut segments = Vec::new();
    let mut pos = 2;
    loop {
        if pos >= jpeg.len() {
            return Ok((segments, &jpeg[jpeg.len()..]));
        }
        if jpeg[pos] != 0xFF {
            return Ok((segments, &jpeg[pos..]));
        }
        let marker = *jpeg.get(pos + 1).ok_or(ExifError::Truncated)?;
        match marker {
            // Fill byte
            0xFF => pos += 1,
            // Start of scan / end of image: the rest is entropy-coded data
            0xDA | 0xD9 => return Ok((segments, &jpeg[pos..])),
            // Standalone markers carry no length
            0x01 | 0xD0..=0xD7 => {
                segments.push(&jpeg[pos..pos + 2]);
                pos += 2;
            }
            _ => {
                let len_bytes = jpeg.get(pos + 2..pos + 4).ok_or(ExifError::Truncated)?;
                let len = usize::from(u16::from_be_bytes([len_bytes[0], len_bytes[1]]));
                let end = pos + 2 + len;
                if len < 2 || end > jpeg.len() {
                    return Err(ExifError::Truncated);
                }
                segments.push(&jpeg[pos..end]);
                pos = end;
            }
        }
    }
}

fn is_exif_app1(segment: &[u8]) -> bool {
    segment.len() >= 10 && segment[1] == 0xE1 && &segment[4..10] == EXIF_HEADER
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Read EXIF tags from a JPEG file.
/// Returns default (empty) tags on any read or parse failure.
pub fn read_exif(path: &Path) -> ExifTags {
    match std::fs::read(path) {
        Ok(bytes) => read_exif_from_jpeg(&bytes),
        Err(_) => ExifTags::default(),
    }
}

/// Parse EXIF tags from in-memory JPEG bytes.
pub fn read_exif_from_jpeg(jpeg: &[u8]) -> ExifTags {
    let Ok((segments, _)) = header_segments(jpeg) else {
        return ExifTags::default();
    };
    segments
        .into_iter()
        .find(|s| is_exif_app1(s))
        .and_then(|s| parse_tiff(&s[10..]))
        .unwrap_or_default()
}

struct RawEntry<'a> {
    tag: u16,
    format: u16,
    count: usize,
    value: &'a [u8],
}

struct Tiff<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

fn format_size(format: u16) -> Option<usize> {
    match format {
        1 | 2 | 6 | 7 => Some(1),
        3 | 8 => Some(2),
        4 | 9 | 11 => Some(4),
        5 | 10 | 12 => Some(8),
        _ => None,
    }
}

impl<'a> Tiff<'a> {
    fn new(data: &'a [u8]) -> Option<Self> {
        let order = match data.get(..2)? {
            b"MM" => ByteOrder::Big,
            b"II" => ByteOrder::Little,
            _ => return None,
        };
        let tiff = Self { data, order };
        (tiff.u16_at(2)? == 42).then_some(tiff)
    }

    fn u16_at(&self, offset: usize) -> Option<u16> {
        self.order.read_u16(self.data.get(offset..)?)
    }

    fn u32_at(&self, offset: usize) -> Option<u32> {
        self.order.read_u32(self.data.get(offset..)?)
    }

    fn entries(&self, offset: usize) -> Option<Vec<RawEntry<'a>>> {
        let count = usize::from(self.u16_at(offset)?);
        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let base = offset + 2 + i * 12;
            let tag = self.u16_at(base)?;
            let format = self.u16_at(base + 2)?;
            let n = self.u32_at(base + 4)? as usize;
            let Some(size) = format_size(format).and_then(|s| s.checked_mul(n)) else {
                continue;
            };
            let value = if size <= 4 {
                self.data.get(base + 8..base + 8 + size)?
            } else {
                let at = self.u32_at(base + 8)? as usize;
                match self.data.get(at..at.saturating_add(size)) {
                    Some(v) => v,
                    None => continue,
                }
            };
            entries.push(RawEntry {
                tag,
                format,
                count: n,
                value,
            });
        }
        Some(entries)
    }

    fn long(&self, entry: &RawEntry) -> Option<u32> {
        match entry.format {
            FORMAT_LONG => self.order.read_u32(entry.value),
            3 => self.order.read_u16(entry.value).map(u32::from),
            _ => None,
        }
    }

    fn rationals(&self, entry: &RawEntry) -> Vec<f64> {
        if entry.format != FORMAT_RATIONAL {
            return Vec::new();
        }
        (0..entry.count)
            .filter_map(|i| {
                let num = self.order.read_u32(entry.value.get(i * 8..)?)?;
                let den = self.order.read_u32(entry.value.get(i * 8 + 4..)?)?;
                (den != 0).then(|| f64::from(num) / f64::from(den))
            })
            .collect()
    }
}

fn ascii(entry: &RawEntry) -> Option<String> {
    let s = String::from_utf8_lossy(entry.value);
    let trimmed = s.trim_end_matches('\0').trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn comment(entry: &RawEntry) -> Option<String> {
    let body = if entry.value.len() >= 8 {
        &entry.value[8..]
    } else {
        entry.value
    };
    let s = String::from_utf8_lossy(body);
    let trimmed = s.trim_end_matches('\0').trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn degrees(parts: &[f64]) -> Option<f64> {
    match parts {
        [d, m, s, ..] => Some(d + m / 60.0 + s / 3600.0),
        [d, m] => Some(d + m / 60.0),
        [d] => Some(*d),
        [] => None,
    }
}

fn parse_tiff(data: &[u8]) -> Option<ExifTags> {
    let tiff = Tiff::new(data)?;
    let ifd0 = tiff.entries(tiff.u32_at(4)? as usize)?;
    let pointer = |tag: u16| {
        ifd0.iter()
            .find(|e| e.tag == tag)
            .and_then(|e| tiff.long(e))
            .map(|v| v as usize)
    };

    let mut tags = ExifTags::default();

    if let Some(entries) = pointer(TAG_EXIF_IFD).and_then(|off| tiff.entries(off)) {
        for entry in &entries {
            match entry.tag {
                TAG_DATE_TIME_ORIGINAL => tags.date_time_original = ascii(entry),
                TAG_CREATE_DATE => tags.create_date = ascii(entry),
                TAG_USER_COMMENT => tags.user_comment = comment(entry),
                _ => {}
            }
        }
    }

    if let Some(entries) = pointer(TAG_GPS_IFD).and_then(|off| tiff.entries(off)) {
        let find = |tag: u16| entries.iter().find(|e| e.tag == tag);
        let reference = |tag: u16, default: char| {
            find(tag)
                .and_then(ascii)
                .and_then(|s| s.chars().next())
                .unwrap_or(default)
        };
        let latitude = find(TAG_GPS_LATITUDE).and_then(|e| degrees(&tiff.rationals(e)));
        let longitude = find(TAG_GPS_LONGITUDE).and_then(|e| degrees(&tiff.rationals(e)));
        if let (Some(latitude), Some(longitude)) = (latitude, longitude) {
            tags.gps = Some(GpsPosition {
                latitude,
                latitude_ref: reference(TAG_GPS_LATITUDE_REF, 'N'),
                longitude,
                longitude_ref: reference(TAG_GPS_LONGITUDE_REF, 'E'),
            });
        }
        if let Some(meters) = find(TAG_GPS_ALTITUDE).and_then(|e| tiff.rationals(e).first().copied())
        {
            let below = find(TAG_GPS_ALTITUDE_REF)
                .and_then(|e| e.value.first().copied())
                .is_some_and(|r| r == 1);
            tags.altitude = Some(GpsAltitude {
                meters,
                below_sea_level: below,
            });
        }
    }

    Some(tags)
}
