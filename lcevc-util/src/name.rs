//! Raw filename metadata.
//!
//! Raw video files conventionally carry their own description, e.g.
//! `clip_1920x1080_25fps_10bits_420.yuv`. The name is split on `-`, `_` and
//! `.` and each part matched independently, so the order of the pieces does
//! not matter.

use std::sync::LazyLock;

use regex::Regex;

use crate::raw::ColorFormat;

static DIMENSIONS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([0-9]+)x([0-9]+)$").unwrap());
static FPS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([0-9]+)(fps|hz)$").unwrap());
static BITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([0-9]+)(bits?|bpp)$").unwrap());
static FORMAT_420_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(420|p420|420p|yuv)$").unwrap());
static FORMAT_OTHER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(y|yuyv|rgb|bgr|rgba|argb|abgr|bgra|nv12|nv21)$").unwrap());

/// Metadata recovered from a raw filename.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawMetadata {
    pub format: ColorFormat,
    pub width: u32,
    pub height: u32,
    pub rate: f32,
}

/// Parse a raw filename for picture metadata.
///
/// Returns `None` when the name does not pin down a known format and size.
pub fn parse_raw_name(name: &str) -> Option<RawMetadata> {
    let mut format_name: Option<String> = None;
    let mut bits = 8u32;
    let mut width = 0u32;
    let mut height = 0u32;
    let mut rate = 0.0f32;

    for part in name.split(['-', '_', '.']) {
        let part = part.to_ascii_lowercase();

        if let Some(captures) = DIMENSIONS_RE.captures(&part) {
            width = captures[1].parse().ok()?;
            height = captures[2].parse().ok()?;
        }
        if let Some(captures) = FPS_RE.captures(&part) {
            rate = captures[1].parse().ok()?;
        }
        if let Some(captures) = BITS_RE.captures(&part) {
            bits = captures[1].parse().ok()?;
        }
        if FORMAT_420_RE.is_match(&part) && format_name.is_none() {
            format_name = Some("p420".to_string());
        }
        if let Some(captures) = FORMAT_OTHER_RE.captures(&part) {
            if format_name.is_none() {
                format_name = Some(captures[1].to_string());
            }
        }
    }

    if width == 0 || height == 0 {
        return None;
    }

    let format = match (format_name.as_deref(), bits) {
        (Some("p420") | None, 8) => ColorFormat::I420_8,
        (Some("p420") | None, 10) => ColorFormat::I420_10_LE,
        (Some("p420") | None, 12) => ColorFormat::I420_12_LE,
        (Some("p420") | None, 14) => ColorFormat::I420_14_LE,
        (Some("p420") | None, 16) => ColorFormat::I420_16_LE,
        (Some("y"), 8) => ColorFormat::GRAY_8,
        (Some("y"), 10) => ColorFormat::GRAY_10_LE,
        (Some("y"), 12) => ColorFormat::GRAY_12_LE,
        (Some("y"), 14) => ColorFormat::GRAY_14_LE,
        (Some("y"), 16) => ColorFormat::GRAY_16_LE,
        (Some("nv12"), 8) => ColorFormat::NV12_8,
        (Some("nv21"), 8) => ColorFormat::NV21_8,
        (Some("rgb"), 8) => ColorFormat::RGB_8,
        (Some("bgr"), 8) => ColorFormat::BGR_8,
        (Some("rgba"), 8) => ColorFormat::RGBA_8,
        (Some("bgra"), 8) => ColorFormat::BGRA_8,
        (Some("argb"), 8) => ColorFormat::ARGB_8,
        (Some("abgr"), 8) => ColorFormat::ABGR_8,
        (format, bits) => {
            log::warn!("no raw format for {format:?} at {bits} bits in {name:?}");
            return None;
        }
    };

    Some(RawMetadata {
        format,
        width,
        height,
        rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typical_names_parse() {
        let meta = parse_raw_name("clip_1920x1080_25fps_10bits_420.yuv").unwrap();
        assert_eq!(meta.format, ColorFormat::I420_10_LE);
        assert_eq!((meta.width, meta.height), (1920, 1080));
        assert_eq!(meta.rate, 25.0);

        let meta = parse_raw_name("lena-640x480-y.y").unwrap();
        assert_eq!(meta.format, ColorFormat::GRAY_8);

        let meta = parse_raw_name("stream_320x180_8bit_nv12.nv12").unwrap();
        assert_eq!(meta.format, ColorFormat::NV12_8);
    }

    #[test]
    fn part_order_does_not_matter() {
        let a = parse_raw_name("a_10bits_420_1280x720.yuv").unwrap();
        let b = parse_raw_name("b_1280x720_420_10bits.yuv").unwrap();
        assert_eq!(a.format, b.format);
        assert_eq!((a.width, a.height), (b.width, b.height));
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(parse_raw_name("no_dimensions_here.yuv").is_none());
        assert!(parse_raw_name("odd_64x64_3bits_420.yuv").is_none());
    }

    #[test]
    fn format_defaults_to_420_when_only_size_is_given() {
        let meta = parse_raw_name("plain_128x96.yuv").unwrap();
        assert_eq!(meta.format, ColorFormat::I420_8);
    }
}
