//! Asset codec
//!
//! Turns raw image files into the base64 transport form providers accept,
//! and produces downscaled JPEG variants where payload size matters.
//! Neither operation touches its input; each returns a new buffer.

pub mod encode;
pub mod recompress;

pub use encode::{encode, encode_file, image_dimensions, EncodedFile};
pub use recompress::{recompress, recompress_blocking};

use genslot_core::AppError;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Unreadable image: {0}")]
    Unreadable(String),

    #[error("Compression failed: {0}")]
    Compression(String),
}

impl From<CodecError> for AppError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Unreadable(msg) => AppError::UnreadableFile(msg),
            CodecError::Compression(msg) => AppError::Compression(msg),
        }
    }
}

pub type CodecResult<T> = Result<T, CodecError>;
