use anyhow::Context;
use genslot_core::models::{Asset, SlotId};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Truncate a string to `max_len` characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// One printable line per asset.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AssetSummary {
    pub kind: &'static str,
    pub detail: String,
}

pub fn summarize_asset(asset: &Asset) -> AssetSummary {
    match asset {
        Asset::Image(image) => AssetSummary {
            kind: "image",
            detail: format!(
                "{} ({} bytes)",
                image.mime_type,
                image.approx_byte_len()
            ),
        },
        Asset::ImageUrl { url } => AssetSummary {
            kind: "image_url",
            detail: url.clone(),
        },
        Asset::Video { url } => AssetSummary {
            kind: "video",
            detail: url.clone(),
        },
        Asset::Text { text } => AssetSummary {
            kind: "text",
            detail: truncate_string(text, 200),
        },
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

/// Write inline image results to `dir` as `{slot}-{n}.{ext}`. Other assets
/// are references and are not downloaded.
pub async fn write_results(
    dir: &Path,
    slot_id: SlotId,
    assets: &[Asset],
) -> anyhow::Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Create output directory {}", dir.display()))?;

    let mut written = Vec::new();
    for (index, asset) in assets.iter().enumerate() {
        let Asset::Image(image) = asset else {
            continue;
        };
        let bytes = image.decode_bytes()?;
        let path = dir.join(format!(
            "{}-{}.{}",
            slot_id,
            index + 1,
            extension_for(&image.mime_type)
        ));
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use genslot_core::models::EncodedImage;

    #[test]
    fn truncate_string_short() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("", 5), "");
    }

    #[test]
    fn truncate_string_long() {
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("hello", 0), "...");
    }

    #[test]
    fn truncate_string_multibyte() {
        assert_eq!(truncate_string("ééééé", 4), "é...");
    }

    #[test]
    fn summarize_text_and_video() {
        let text = summarize_asset(&Asset::Text {
            text: "A small dog".to_string(),
        });
        assert_eq!(text.kind, "text");
        assert_eq!(text.detail, "A small dog");

        let video = summarize_asset(&Asset::Video {
            url: "https://cdn.example.com/v.mp4".to_string(),
        });
        assert_eq!(video.kind, "video");
    }

    #[tokio::test]
    async fn write_results_skips_references() {
        let dir = tempfile::tempdir().unwrap();
        let slot_id = SlotId::new();
        let assets = vec![
            Asset::Image(EncodedImage::new("image/jpeg", "aGVsbG8=")),
            Asset::ImageUrl {
                url: "https://cdn.example.com/a.png".to_string(),
            },
        ];

        let written = write_results(dir.path(), slot_id, &assets).await.unwrap();

        assert_eq!(written.len(), 1);
        assert!(written[0].to_string_lossy().ends_with("-1.jpg"));
        assert_eq!(std::fs::read(&written[0]).unwrap(), b"hello");
    }
}
