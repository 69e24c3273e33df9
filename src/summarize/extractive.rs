//! Offline summaries that need no model.
//!
//! Text summaries are the leading tokens of the input, capped at the upper
//! length bound. Image captions name the format, pixel size when the header
//! carries it (PNG), and byte size. Output is fully deterministic.

use anyhow::Result;
use async_trait::async_trait;

use super::{truncate_tokens, LengthBounds, SummaryBackend};
use crate::mime;

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

pub struct ExtractiveBackend;

#[async_trait]
impl SummaryBackend for ExtractiveBackend {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn summarize_text(&self, text: &str, bounds: LengthBounds) -> Result<String> {
        let lead = truncate_tokens(text, bounds.max_tokens);
        let collapsed = lead.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            return Ok("Empty text file.".to_string());
        }
        Ok(collapsed)
    }

    async fn caption_image(
        &self,
        image: &[u8],
        file_type: &str,
        _bounds: LengthBounds,
    ) -> Result<String> {
        let format = match file_type {
            mime::IMAGE_PNG => "PNG",
            mime::IMAGE_JPEG => "JPEG",
            _ => "binary",
        };
        Ok(match png_dimensions(image) {
            Some((w, h)) => format!(
                "A {} image, {}x{} pixels, {} bytes.",
                format,
                w,
                h,
                image.len()
            ),
            None => format!("A {} image of {} bytes.", format, image.len()),
        })
    }
}

/// Width and height from a PNG IHDR chunk.
fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.len() < 24 || !bytes.starts_with(PNG_SIGNATURE) || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
    Some((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: LengthBounds = LengthBounds {
        min_tokens: 1,
        max_tokens: 4,
    };

    fn png_header(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
        bytes
    }

    #[tokio::test]
    async fn text_summary_is_leading_tokens() {
        let s = ExtractiveBackend
            .summarize_text("apple pie\nrecipe   with a\tlattice crust", BOUNDS)
            .await
            .unwrap();
        assert_eq!(s, "apple pie recipe with");
    }

    #[tokio::test]
    async fn blank_text_still_yields_a_summary() {
        let s = ExtractiveBackend.summarize_text(" \n ", BOUNDS).await.unwrap();
        assert_eq!(s, "Empty text file.");
    }

    #[tokio::test]
    async fn png_caption_reports_dimensions() {
        let caption = ExtractiveBackend
            .caption_image(&png_header(640, 480), "image/png", BOUNDS)
            .await
            .unwrap();
        assert_eq!(caption, "A PNG image, 640x480 pixels, 29 bytes.");
    }

    #[tokio::test]
    async fn jpeg_caption_reports_size() {
        let caption = ExtractiveBackend
            .caption_image(&[0xFF, 0xD8, 0xFF, 0xE0], "image/jpeg", BOUNDS)
            .await
            .unwrap();
        assert_eq!(caption, "A JPEG image of 4 bytes.");
    }
}
