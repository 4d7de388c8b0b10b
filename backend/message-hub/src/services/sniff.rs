//! Content-type sniffing by magic numbers
//!
//! Only the leading bytes of a blob are inspected; callers read at most
//! [`SNIFF_LEN`] bytes. Unrecognized content yields an empty string.

/// Bytes read from the start of a blob for sniffing
pub const SNIFF_LEN: usize = 8192;

/// MIME type of `data`, or `""` when unknown
pub fn sniff_mime_type(data: &[u8]) -> &'static str {
    infer::get(data).map(|kind| kind.mime_type()).unwrap_or("")
}

pub fn is_image(mime: &str) -> bool {
    mime.starts_with("image/")
}

pub fn is_video(mime: &str) -> bool {
    mime.starts_with("video/")
}
