//! Payload encoding for the engine HTTP protocol.
//!
//! Page images travel as base64 PNG inside the JSON request body. PNG is
//! lossless, so the engine sees exactly the pixels the rasteriser produced.
//! The full pipeline receives the PDF bytes the same way.

use crate::pipeline::render::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as base64 PNG.
pub fn encode_page(page: &PageImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    page.image()
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page {} → {} bytes base64", page.index(), b64.len());
    Ok(b64)
}

/// Encode raw document bytes as base64.
pub fn encode_document(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    #[test]
    fn encode_small_page_as_png() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let data = encode_page(&PageImage::new(0, img)).expect("encode should succeed");
        let decoded = STANDARD.decode(&data).expect("valid base64");
        assert_eq!(&decoded[..8], b"\x89PNG\r\n\x1a\n");

        let back = image::load_from_memory(&decoded).unwrap();
        assert_eq!((back.width(), back.height()), (10, 10));
    }

    #[test]
    fn document_bytes_are_base64() {
        assert_eq!(encode_document(b"%PDF-1.7"), "JVBERi0xLjc=");
    }
}
