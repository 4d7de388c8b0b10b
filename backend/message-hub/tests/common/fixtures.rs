//! Tokens, identities and media bytes for integration tests

use chrono::{Duration, Utc};
use crypto_core::jwt::{self, EncodingKey};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use message_hub::capability::{CapabilityAction, CapabilityClaims};
use message_hub::models::Identity;
use std::io::Cursor;

pub const HUB_ADDRESS: &str = "https://hub.test";

pub const TEST_PRIVATE_KEY: &str =
    include_str!("../../../libs/crypto-core/tests/keys/test_private.pem");
pub const TEST_PUBLIC_KEY: &str =
    include_str!("../../../libs/crypto-core/tests/keys/test_public.pem");

pub fn alice() -> Identity {
    Identity::new("alice", "Alice")
}

pub fn bob() -> Identity {
    Identity::new("bob", "Bob")
}

pub fn carol() -> Identity {
    Identity::new("carol", "Carol")
}

pub fn dave() -> Identity {
    Identity::new("dave", "Dave")
}

pub fn claims(subject: &Identity, action: CapabilityAction, users: &[&str]) -> CapabilityClaims {
    let now = Utc::now();
    CapabilityClaims {
        id: subject.id.clone(),
        name: subject.name.clone(),
        hub: HUB_ADDRESS.to_string(),
        scope: action,
        users: users.iter().map(|u| u.to_string()).collect(),
        exp: (now + Duration::minutes(5)).timestamp(),
        iat: Some(now.timestamp()),
    }
}

pub fn sign(claims: &CapabilityClaims) -> String {
    let key: EncodingKey = jwt::encoding_key_from_pem(TEST_PRIVATE_KEY).unwrap();
    jwt::encode_claims(claims, &key).unwrap()
}

pub fn post_token(subject: &Identity, users: &[&str]) -> String {
    sign(&claims(subject, CapabilityAction::PostMessage, users))
}

pub fn read_token(subject: &Identity, users: &[&str]) -> String {
    sign(&claims(subject, CapabilityAction::GetMessages, users))
}

/// Baseline JPEG of `width` x `height` with an optional EXIF orientation
pub fn jpeg(width: u32, height: u32, orientation: Option<u16>) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([30, 120, 200]));
    let mut plain = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut plain), ImageOutputFormat::Jpeg(90))
        .unwrap();

    match orientation {
        None => plain,
        Some(value) => {
            let mut out = plain[..2].to_vec();
            out.extend_from_slice(&exif_segment(value));
            out.extend_from_slice(&plain[2..]);
            out
        }
    }
}

/// Little-endian APP1 Exif segment holding only the orientation tag
fn exif_segment(orientation: u16) -> Vec<u8> {
    let mut tiff = b"II\x2A\x00\x08\x00\x00\x00".to_vec();
    tiff.extend_from_slice(&1u16.to_le_bytes());
    tiff.extend_from_slice(&0x0112u16.to_le_bytes());
    tiff.extend_from_slice(&3u16.to_le_bytes());
    tiff.extend_from_slice(&1u32.to_le_bytes());
    tiff.extend_from_slice(&orientation.to_le_bytes());
    tiff.extend_from_slice(&[0, 0, 0, 0, 0, 0]);

    let mut payload = b"Exif\x00\x00".to_vec();
    payload.extend_from_slice(&tiff);

    let mut segment = vec![0xFF, 0xE1];
    segment.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    segment.extend_from_slice(&payload);
    segment
}

/// Enough of an MP4 header to sniff as `video/mp4`
pub fn mp4() -> Vec<u8> {
    let mut data = vec![0x00, 0x00, 0x00, 0x18];
    data.extend_from_slice(b"ftypisom");
    data.extend_from_slice(&[0x00, 0x00, 0x02, 0x00]);
    data.extend_from_slice(b"isomiso2");
    data.extend_from_slice(&[0u8; 64]);
    data
}

/// HEIF still image header (`heic` major brand, `mif1` compatible)
pub fn heic() -> Vec<u8> {
    let mut data = vec![0x00, 0x00, 0x00, 0x18];
    data.extend_from_slice(b"ftypheic");
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    data.extend_from_slice(b"mif1heic");
    data.extend_from_slice(&[0u8; 64]);
    data
}

pub fn image_dimensions(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).unwrap();
    (img.width(), img.height())
}
