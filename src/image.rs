use base64::{Engine as _, engine::general_purpose::STANDARD};
use thiserror::Error;

// Inbound images are re-encoded to a bounded JPEG before they go anywhere
// near the provider: callers send arbitrary data URLs.
const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
const MAX_DIMENSION: u32 = 2048;
const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image data is empty")]
    Empty,

    #[error("image too large: {0} bytes (max {MAX_IMAGE_BYTES} bytes)")]
    TooLarge(usize),

    #[error("invalid base64 encoding: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("failed to encode image: {0}")]
    EncodeFailed(String),
}

// A processed inbound image, always RGB JPEG within bounds.
pub struct JpegImage {
    pub data: Vec<u8>,
}

impl JpegImage {
    pub const MIME: &'static str = "image/jpeg";
}

// Accepts either a bare base64 string or a "data:image/...;base64," URL.
pub fn process_data_url(input: &str) -> Result<JpegImage, ImageError> {
    let b64 = match input.split_once(',') {
        Some((_, tail)) => tail,
        None => input,
    };
    let b64 = b64.trim();
    if b64.is_empty() {
        return Err(ImageError::Empty);
    }

    let bytes = STANDARD.decode(b64)?;
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImageError::TooLarge(bytes.len()));
    }

    let img = image::load_from_memory(&bytes).map_err(|e| ImageError::DecodeFailed(e.to_string()))?;

    // fit to 2048x2048, preserving aspect ratio
    let img = if img.width() > MAX_DIMENSION || img.height() > MAX_DIMENSION {
        img.thumbnail(MAX_DIMENSION, MAX_DIMENSION)
    } else {
        img
    };
    let rgb = img.to_rgb8();

    let mut out = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    encoder
        .encode_image(&rgb)
        .map_err(|e| ImageError::EncodeFailed(e.to_string()))?;

    Ok(JpegImage { data: out })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_data_url(width: u32, height: u32) -> String {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(&png))
    }

    #[test]
    fn reencodes_png_data_url_to_jpeg() {
        let jpeg = process_data_url(&png_data_url(4, 4)).unwrap();
        // JPEG SOI marker
        assert_eq!(&jpeg.data[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn accepts_bare_base64_without_prefix() {
        let url = png_data_url(4, 4);
        let bare = url.split_once(',').unwrap().1;
        assert!(process_data_url(bare).is_ok());
    }

    #[test]
    fn oversized_images_are_downscaled() {
        let jpeg = process_data_url(&png_data_url(4096, 2)).unwrap();
        let reloaded = image::load_from_memory(&jpeg.data).unwrap();
        assert!(reloaded.width() <= MAX_DIMENSION);
        assert!(reloaded.height() <= MAX_DIMENSION);
    }

    #[test]
    fn rejects_oversized_payloads() {
        let blob = STANDARD.encode(vec![0u8; MAX_IMAGE_BYTES + 1]);
        assert!(matches!(process_data_url(&blob), Err(ImageError::TooLarge(_))));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(process_data_url(""), Err(ImageError::Empty)));
        assert!(matches!(process_data_url("data:image/png;base64,"), Err(ImageError::Empty)));
        assert!(matches!(
            process_data_url("data:image/png;base64,!!notbase64!!"),
            Err(ImageError::InvalidBase64(_))
        ));
        // valid base64 that is not an image
        let not_an_image = STANDARD.encode(b"hello world");
        assert!(matches!(process_data_url(&not_an_image), Err(ImageError::DecodeFailed(_))));
    }
}
