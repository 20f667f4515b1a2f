//! Shared HTTP plumbing: client construction and response classification.

use genslot_core::models::EncodedImage;
use genslot_core::AppError;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))
}

pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Network-level failure: nothing (or nothing usable) came back.
pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> AppError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    tracing::warn!(provider = %provider, error = %err, "{} request {}", provider, kind);
    AppError::Transport(format!("{} request {}: {}", provider, kind, err))
}

/// Map a non-success response to the error taxonomy. The provider's own
/// message is kept verbatim.
pub(crate) async fn error_from_response(provider: &str, response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = extract_message(&body).unwrap_or_else(|| format!("HTTP {}", status));

    tracing::warn!(
        provider = %provider,
        status = status.as_u16(),
        message = %message,
        "Provider rejected request"
    );

    classify(status, message)
}

pub(crate) fn classify(status: StatusCode, message: String) -> AppError {
    match status.as_u16() {
        401 | 403 => AppError::Auth(message),
        402 | 429 => AppError::Quota(message),
        400 | 422 => AppError::Validation(message),
        404 | 410 => AppError::NotFound(message),
        _ => AppError::Provider(message),
    }
}

/// Pull a human-readable message out of an error body. Accepts
/// `{"error": {"message": ..}}`, `{"error": ".."}`, `{"message": ..}`,
/// `{"detail": ..}` or plain text.
pub(crate) fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let candidates = [
            value.pointer("/error/message"),
            value.get("error"),
            value.get("message"),
            value.get("detail"),
        ];
        for candidate in candidates.into_iter().flatten() {
            if let Some(text) = candidate.as_str() {
                if !text.trim().is_empty() {
                    return Some(text.trim().to_string());
                }
            }
        }
        return None;
    }

    Some(trimmed.chars().take(500).collect())
}

/// Image payload on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireImage {
    pub mime_type: String,
    pub data: String,
}

impl From<&EncodedImage> for WireImage {
    fn from(image: &EncodedImage) -> Self {
        Self {
            mime_type: image.mime_type.clone(),
            data: image.data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_codes() {
        let msg = || "m".to_string();
        assert!(matches!(classify(StatusCode::UNAUTHORIZED, msg()), AppError::Auth(_)));
        assert!(matches!(classify(StatusCode::FORBIDDEN, msg()), AppError::Auth(_)));
        assert!(matches!(
            classify(StatusCode::TOO_MANY_REQUESTS, msg()),
            AppError::Quota(_)
        ));
        assert!(matches!(
            classify(StatusCode::PAYMENT_REQUIRED, msg()),
            AppError::Quota(_)
        ));
        assert!(matches!(
            classify(StatusCode::UNPROCESSABLE_ENTITY, msg()),
            AppError::Validation(_)
        ));
        assert!(matches!(
            classify(StatusCode::NOT_FOUND, msg()),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            classify(StatusCode::INTERNAL_SERVER_ERROR, msg()),
            AppError::Provider(_)
        ));
    }

    #[test]
    fn test_extract_message_shapes() {
        assert_eq!(
            extract_message(r#"{"error":{"message":"Invalid API key"}}"#).as_deref(),
            Some("Invalid API key")
        );
        assert_eq!(
            extract_message(r#"{"error":"rate limited"}"#).as_deref(),
            Some("rate limited")
        );
        assert_eq!(
            extract_message(r#"{"detail":"bad prompt"}"#).as_deref(),
            Some("bad prompt")
        );
        assert_eq!(extract_message("Gateway down").as_deref(), Some("Gateway down"));
        assert_eq!(extract_message(r#"{"code":7}"#), None);
        assert_eq!(extract_message("   "), None);
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://x/", "/v1/images"), "http://x/v1/images");
        assert_eq!(join_url("http://x", "v1/images"), "http://x/v1/images");
    }
}
