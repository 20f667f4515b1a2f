use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// An image in transport form: base64 payload plus its MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub mime_type: String,
    /// Standard base64, no data-URL prefix
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl EncodedImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Displayable handle for previews (`data:<mime>;base64,<data>`).
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Decode the payload back into raw bytes.
    pub fn decode_bytes(&self) -> Result<Vec<u8>, AppError> {
        general_purpose::STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| AppError::UnreadableFile(format!("invalid base64 payload: {}", e)))
    }

    /// Size of the decoded payload without decoding it.
    pub fn approx_byte_len(&self) -> usize {
        let padding = self.data.bytes().rev().take_while(|b| *b == b'=').count();
        ((self.data.len() / 4) * 3).saturating_sub(padding.min(2))
    }
}

/// Something a provider produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Asset {
    Image(EncodedImage),
    ImageUrl { url: String },
    Video { url: String },
    Text { text: String },
}

impl Asset {
    pub fn is_image(&self) -> bool {
        matches!(self, Asset::Image(_) | Asset::ImageUrl { .. })
    }

    /// Displayable reference: a data URL for inline images, the remote URL
    /// otherwise. Text assets have none.
    pub fn preview(&self) -> Option<String> {
        match self {
            Asset::Image(image) => Some(image.data_url()),
            Asset::ImageUrl { url } | Asset::Video { url } => Some(url.clone()),
            Asset::Text { .. } => None,
        }
    }
}
