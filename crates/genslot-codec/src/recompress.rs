use base64::{engine::general_purpose, Engine as _};
use genslot_core::models::EncodedImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::io::Cursor;

use crate::{CodecError, CodecResult};

/// Downscale so neither side exceeds `max_dimension` and re-encode as JPEG.
///
/// Images already within bounds keep their dimensions; nothing is upscaled.
/// Every failure is a `Compression` error so the caller aborts instead of
/// submitting a corrupt payload.
pub fn recompress_blocking(
    image: &EncodedImage,
    max_dimension: u32,
    quality: u8,
) -> CodecResult<EncodedImage> {
    if max_dimension == 0 {
        return Err(CodecError::Compression(
            "max dimension must be greater than 0".to_string(),
        ));
    }

    let data = general_purpose::STANDARD
        .decode(image.data.as_bytes())
        .map_err(|e| CodecError::Compression(format!("invalid base64 payload: {}", e)))?;

    let img = image::ImageReader::new(Cursor::new(&data))
        .with_guessed_format()
        .map_err(|e| CodecError::Compression(e.to_string()))?
        .decode()
        .map_err(|e| CodecError::Compression(e.to_string()))?;

    let (width, height) = img.dimensions();
    let img = if width > max_dimension || height > max_dimension {
        // resize() keeps the aspect ratio and fits inside the box
        img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    } else {
        img
    };
    let (new_width, new_height) = img.dimensions();

    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buffer = Vec::with_capacity((new_width * new_height) as usize / 4);
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .map_err(|e| CodecError::Compression(e.to_string()))?;

    tracing::debug!(
        original_width = width,
        original_height = height,
        width = new_width,
        height = new_height,
        original_bytes = data.len(),
        bytes = buffer.len(),
        quality = quality,
        "Recompressed image"
    );

    let mut out = EncodedImage::new("image/jpeg", general_purpose::STANDARD.encode(&buffer));
    out.file_name = image.file_name.as_deref().map(jpeg_file_name);
    Ok(out)
}

/// Async wrapper running the CPU-bound work off the runtime threads.
pub async fn recompress(
    image: &EncodedImage,
    max_dimension: u32,
    quality: u8,
) -> CodecResult<EncodedImage> {
    let image = image.clone();
    tokio::task::spawn_blocking(move || recompress_blocking(&image, max_dimension, quality))
        .await
        .map_err(|e| CodecError::Compression(format!("recompression task failed: {}", e)))?
}

fn jpeg_file_name(name: &str) -> String {
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    format!("{}.jpg", stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::tests::png_bytes;
    use crate::encode::{encode, image_dimensions};

    #[test]
    fn test_downscale_preserves_aspect_ratio() {
        let source = encode(&png_bytes(400, 200), Some("wide.png")).unwrap().transport;
        let out = recompress_blocking(&source, 100, 80).unwrap();

        assert_eq!(out.mime_type, "image/jpeg");
        assert_eq!(out.file_name.as_deref(), Some("wide.jpg"));
        assert_eq!(image_dimensions(&out).unwrap(), (100, 50));
    }

    #[test]
    fn test_no_upscale_when_within_bounds() {
        let source = encode(&png_bytes(64, 48), None).unwrap().transport;
        let out = recompress_blocking(&source, 1280, 85).unwrap();
        assert_eq!(image_dimensions(&out).unwrap(), (64, 48));
        assert!(out.file_name.is_none());
    }

    #[test]
    fn test_original_is_untouched() {
        let source = encode(&png_bytes(300, 300), Some("sq.png")).unwrap().transport;
        let before = source.clone();
        let _ = recompress_blocking(&source, 50, 70).unwrap();
        assert_eq!(source, before);
    }

    #[test]
    fn test_corrupt_payload_is_compression_error() {
        let broken = EncodedImage::new("image/png", "aGVsbG8gd29ybGQ=");
        assert!(matches!(
            recompress_blocking(&broken, 100, 80),
            Err(CodecError::Compression(_))
        ));
        let not_base64 = EncodedImage::new("image/png", "***");
        assert!(matches!(
            recompress_blocking(&not_base64, 100, 80),
            Err(CodecError::Compression(_))
        ));
    }

    #[tokio::test]
    async fn test_async_wrapper() {
        let source = encode(&png_bytes(20, 40), None).unwrap().transport;
        let out = recompress(&source, 10, 90).await.unwrap();
        assert_eq!(image_dimensions(&out).unwrap(), (5, 10));
    }

    #[test]
    fn test_jpeg_file_name() {
        assert_eq!(jpeg_file_name("a.b.png"), "a.b.jpg");
        assert_eq!(jpeg_file_name("noext"), "noext.jpg");
        assert_eq!(jpeg_file_name(".hidden"), ".hidden.jpg");
    }
}
