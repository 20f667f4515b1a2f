use base64::{engine::general_purpose, Engine as _};
use genslot_core::models::EncodedImage;
use std::io::Cursor;
use std::path::Path;

use crate::{CodecError, CodecResult};

/// Transport form of a file plus a handle that can be displayed directly.
#[derive(Debug, Clone)]
pub struct EncodedFile {
    pub transport: EncodedImage,
    pub preview: String,
}

/// Encode raw image bytes for transport.
///
/// The format is sniffed from the content, not the file name, and the header
/// must parse; anything that is not a readable image is rejected here.
pub fn encode(data: &[u8], file_name: Option<&str>) -> CodecResult<EncodedFile> {
    if data.is_empty() {
        return Err(CodecError::Unreadable("file is empty".to_string()));
    }

    let reader = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| CodecError::Unreadable(e.to_string()))?;
    let format = reader
        .format()
        .ok_or_else(|| CodecError::Unreadable("unrecognized image format".to_string()))?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| CodecError::Unreadable(e.to_string()))?;

    let mut transport = EncodedImage::new(
        format.to_mime_type(),
        general_purpose::STANDARD.encode(data),
    );
    if let Some(name) = file_name {
        transport = transport.with_file_name(name);
    }

    tracing::debug!(
        file_name = ?file_name,
        mime_type = %transport.mime_type,
        width = width,
        height = height,
        bytes = data.len(),
        "Encoded image for transport"
    );

    let preview = transport.data_url();
    Ok(EncodedFile { transport, preview })
}

/// Read and encode an image file from disk.
pub fn encode_file(path: &Path) -> CodecResult<EncodedFile> {
    let data = std::fs::read(path)
        .map_err(|e| CodecError::Unreadable(format!("{}: {}", path.display(), e)))?;
    let file_name = path.file_name().and_then(|n| n.to_str());
    encode(&data, file_name)
}

/// Pixel dimensions of an encoded image.
pub fn image_dimensions(image: &EncodedImage) -> CodecResult<(u32, u32)> {
    let data = general_purpose::STANDARD
        .decode(image.data.as_bytes())
        .map_err(|e| CodecError::Unreadable(e.to_string()))?;
    image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| CodecError::Unreadable(e.to_string()))?
        .into_dimensions()
        .map_err(|e| CodecError::Unreadable(e.to_string()))
}
