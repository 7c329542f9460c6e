//! Image encoding: `DynamicImage` → PNG bytes and base64 `ImageData`.
//!
//! VLM APIs (OpenAI, Anthropic, Gemini) accept images as base64 data-URIs
//! embedded in the JSON request body. PNG is chosen over JPEG because it
//! is lossless — box labels and arrow annotations must stay crisp for the
//! model to read role and step names reliably. `detail: "high"` instructs
//! GPT-4-class models to use the full image tile budget; without it small
//! text inside diagram boxes is lost.
//!
//! The same PNG bytes double as the picture embedded in the output
//! document, so the diagram in the SOP is byte-identical to what the
//! model analyzed.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode an image as a base64 PNG ready for the VLM API.
pub fn encode_for_vlm(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let buf = encode_png(img)?;
    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Encode already-compressed image bytes (a reference PNG read from disk)
/// as base64 `ImageData`.
pub fn encode_bytes_for_vlm(bytes: &[u8], mime: &str) -> ImageData {
    ImageData::new(STANDARD.encode(bytes), mime).with_detail("high")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid_image() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])))
    }

    #[test]
    fn encode_png_produces_png_magic() {
        let buf = encode_png(&solid_image()).expect("encode should succeed");
        assert_eq!(&buf[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn encode_for_vlm_is_valid_base64_png() {
        let data = encode_for_vlm(&solid_image()).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        assert!(!data.data.is_empty());
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn encode_bytes_wraps_without_reencoding() {
        let data = encode_bytes_for_vlm(b"raw-bytes", "image/png");
        assert_eq!(data.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&data.data).unwrap(), b"raw-bytes");
    }
}
