//! JPEG EXIF orientation normalization
//!
//! Cameras store pixels in sensor order and record the intended rotation in
//! the EXIF Orientation tag. Viewers that ignore the tag show such photos
//! sideways, so rotated JPEGs are rewritten upright. Re-encoding drops the
//! EXIF block, so the result is never rotated twice.

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, ImageOutputFormat};
use std::io::Cursor;
use tracing::debug;

const TAG_ORIENTATION: u16 = 0x0112;
const TYPE_SHORT: u16 = 3;

/// Orientation tag value meaning "already upright"
pub const ORIENTATION_NORMAL: u16 = 1;

#[derive(Clone, Copy)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u16(self, b: &[u8], at: usize) -> Option<u16> {
        let raw: [u8; 2] = b.get(at..at + 2)?.try_into().ok()?;
        Some(match self {
            ByteOrder::Little => u16::from_le_bytes(raw),
            ByteOrder::Big => u16::from_be_bytes(raw),
        })
    }

    fn u32(self, b: &[u8], at: usize) -> Option<u32> {
        let raw: [u8; 4] = b.get(at..at + 4)?.try_into().ok()?;
        Some(match self {
            ByteOrder::Little => u32::from_le_bytes(raw),
            ByteOrder::Big => u32::from_be_bytes(raw),
        })
    }
}

/// Orientation (1..=8) from the first APP1 Exif segment, if present
pub fn exif_orientation(jpeg: &[u8]) -> Option<u16> {
    if !jpeg.starts_with(&[0xFF, 0xD8]) {
        return None;
    }

    let mut i = 2usize;
    while i + 4 <= jpeg.len() {
        if jpeg[i] != 0xFF {
            return None;
        }
        let marker = jpeg[i + 1];
        match marker {
            // Fill byte
            0xFF => {
                i += 1;
                continue;
            }
            // Start of scan or end of image: no metadata past this point
            0xDA | 0xD9 => return None,
            0x01 | 0xD0..=0xD7 => {
                i += 2;
                continue;
            }
            _ => {}
        }

        let len = u16::from_be_bytes([jpeg[i + 2], jpeg[i + 3]]) as usize;
        if len < 2 {
            return None;
        }
        let end = (i + 2 + len).min(jpeg.len());
        let segment = &jpeg[i + 4..end];

        if marker == 0xE1 && segment.starts_with(b"Exif\x00\x00") {
            return tiff_orientation(&segment[6..]);
        }
        i += 2 + len;
    }
    None
}

fn tiff_orientation(tiff: &[u8]) -> Option<u16> {
    let order = match tiff.get(0..2)? {
        b"II" => ByteOrder::Little,
        b"MM" => ByteOrder::Big,
        _ => return None,
    };
    if order.u16(tiff, 2)? != 42 {
        return None;
    }

    let ifd = order.u32(tiff, 4)? as usize;
    let count = order.u16(tiff, ifd)? as usize;
    for n in 0..count {
        let entry = ifd + 2 + n * 12;
        if order.u16(tiff, entry)? != TAG_ORIENTATION {
            continue;
        }
        if order.u16(tiff, entry + 2)? != TYPE_SHORT {
            return None;
        }
        let value = order.u16(tiff, entry + 8)?;
        return (1..=8).contains(&value).then_some(value);
    }
    None
}

/// Pixel transform that makes an image with `orientation` upright
pub fn apply_orientation(img: DynamicImage, orientation: u16) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Upright re-encoding of `jpeg`, or `None` when it is already upright
///
/// CPU-bound; run it on a blocking thread.
pub fn normalize_jpeg(jpeg: &[u8], quality: u8) -> Result<Option<Vec<u8>>> {
    let orientation = match exif_orientation(jpeg) {
        None | Some(ORIENTATION_NORMAL) => return Ok(None),
        Some(o) => o,
    };

    let img = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)
        .context("decode JPEG")?;
    let upright = apply_orientation(img, orientation);

    let mut buf = Vec::new();
    upright
        .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Jpeg(quality))
        .context("encode upright JPEG")?;

    debug!(orientation, size = buf.len(), "JPEG orientation normalized");
    Ok(Some(buf))
}
