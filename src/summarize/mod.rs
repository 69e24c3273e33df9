//! File summarization.
//!
//! [`Summarizer::summarize`] maps a stored file's MIME type and bytes to a short
//! natural-language summary. Text and source code go to a text model, JPEG and
//! PNG images go to an image-captioning model, and every other type gets the
//! fixed [`UNSUPPORTED_SUMMARY`] placeholder.
//!
//! The models themselves sit behind the [`SummaryBackend`] trait:
//!
//! | Config value | Backend |
//! |--------------|---------|
//! | `"ollama"` | [`OllamaBackend`]: local Ollama `/api/generate` (text + vision model) |
//! | `"openai"` | [`OpenAIBackend`]: `/v1/chat/completions` (needs `OPENAI_API_KEY`) |
//! | `"extractive"` | [`ExtractiveBackend`]: offline, deterministic, no model |
//!
//! A [`Summarizer`] is built once per process and shared; the backend keeps its
//! HTTP client and model names for the life of the process. Call
//! [`Summarizer::shutdown`] before exiting to release model resources.
//!
//! # Retry Strategy
//!
//! The HTTP backends retry transient failures with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

mod extractive;
mod ollama;
mod openai;

pub use extractive::ExtractiveBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAIBackend;

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::SummarizerConfig;
use crate::mime;

/// Summary returned for any file type that has no model.
pub const UNSUPPORTED_SUMMARY: &str = "Unsupported file type for summarization.";

/// How a stored file is summarized, decided by its MIME type alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    PlainText,
    /// Summarized with the text model; there is no code-aware processing.
    SourceCode,
    Image,
    Unsupported,
}

impl FileKind {
    pub fn from_mime(file_type: &str) -> Self {
        match file_type {
            mime::TEXT_PLAIN => FileKind::PlainText,
            mime::TEXT_PYTHON => FileKind::SourceCode,
            mime::IMAGE_JPEG | mime::IMAGE_PNG => FileKind::Image,
            _ => FileKind::Unsupported,
        }
    }
}

/// Generation length bounds handed to a model, in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthBounds {
    pub min_tokens: usize,
    pub max_tokens: usize,
}

/// A model serving backend.
///
/// Implementations are constructed once and reused for every call.
#[async_trait]
pub trait SummaryBackend: Send + Sync {
    /// Short identifier used in logs (e.g. `"ollama"`).
    fn name(&self) -> &str;

    /// Summarizes already-truncated text.
    async fn summarize_text(&self, text: &str, bounds: LengthBounds) -> Result<String>;

    /// Produces a caption for an encoded JPEG or PNG image.
    async fn caption_image(&self, image: &[u8], mime: &str, bounds: LengthBounds)
        -> Result<String>;

    /// Releases model resources held on behalf of this process.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Dispatches files to the configured [`SummaryBackend`].
pub struct Summarizer {
    backend: Box<dyn SummaryBackend>,
    max_input_tokens: usize,
    text_bounds: LengthBounds,
    image_bounds: LengthBounds,
}

impl Summarizer {
    /// Builds the backend named by `config.provider`.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown provider, or if the provider cannot be
    /// initialized (e.g. `OPENAI_API_KEY` missing).
    pub fn from_config(config: &SummarizerConfig) -> Result<Self> {
        let backend: Box<dyn SummaryBackend> = match config.provider.as_str() {
            "ollama" => Box::new(OllamaBackend::new(config)?),
            "openai" => Box::new(OpenAIBackend::new(config)?),
            "extractive" => Box::new(ExtractiveBackend),
            other => bail!("Unknown summarizer provider: {}", other),
        };
        tracing::info!(provider = backend.name(), "summarizer ready");
        Ok(Self::with_backend(backend, config))
    }

    /// Wraps an existing backend, taking limits from `config`.
    pub fn with_backend(backend: Box<dyn SummaryBackend>, config: &SummarizerConfig) -> Self {
        Self {
            backend,
            max_input_tokens: config.max_input_tokens,
            text_bounds: LengthBounds {
                min_tokens: config.text_min_tokens,
                max_tokens: config.text_max_tokens,
            },
            image_bounds: LengthBounds {
                min_tokens: config.image_min_tokens,
                max_tokens: config.image_max_tokens,
            },
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Summarizes one file.
    ///
    /// Supported types always yield non-empty text; unsupported types yield
    /// exactly [`UNSUPPORTED_SUMMARY`] without touching the backend.
    pub async fn summarize(&self, file_type: &str, content: &[u8]) -> Result<String> {
        let kind = FileKind::from_mime(file_type);
        let summary = match kind {
            FileKind::PlainText | FileKind::SourceCode => {
                let text = String::from_utf8_lossy(content);
                let input = truncate_tokens(&text, self.max_input_tokens);
                self.backend.summarize_text(input, self.text_bounds).await?
            }
            FileKind::Image => {
                self.backend
                    .caption_image(content, file_type, self.image_bounds)
                    .await?
            }
            FileKind::Unsupported => return Ok(UNSUPPORTED_SUMMARY.to_string()),
        };

        let summary = summary.trim();
        if summary.is_empty() {
            bail!(
                "{} backend returned an empty summary for {}",
                self.backend.name(),
                file_type
            );
        }
        tracing::debug!(?kind, chars = summary.len(), "summarized file");
        Ok(summary.to_string())
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.backend.shutdown().await
    }
}

/// Returns the prefix of `text` holding at most `max_tokens`
/// whitespace-separated tokens. Whitespace inside the prefix is preserved.
pub fn truncate_tokens(text: &str, max_tokens: usize) -> &str {
    let mut seen = 0;
    let mut in_token = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            in_token = false;
        } else if !in_token {
            if seen == max_tokens {
                return text[..i].trim_end();
            }
            seen += 1;
            in_token = true;
        }
    }
    text
}

/// POSTs `body` as JSON and returns the parsed JSON response, retrying
/// rate limits, server errors, and network failures.
pub(crate) async fn post_json_with_retry(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
    max_retries: u32,
    service: &str,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::warn!(service, attempt, ?delay, "retrying model request");
            tokio::time::sleep(delay).await;
        }

        let Some(builder) = request.try_clone() else {
            bail!("{} request body cannot be retried", service);
        };

        match builder.json(body).send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        service,
                        status,
                        body_text
                    ));
                    continue;
                }

                bail!("{} API error {}: {}", service, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!("{} connection error: {}", service, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} request failed after retries", service)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Records which entry point was hit and echoes a fixed reply.
    struct RecordingBackend {
        text_calls: Arc<AtomicUsize>,
        image_calls: Arc<AtomicUsize>,
        reply: &'static str,
    }

    #[async_trait]
    impl SummaryBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }
        async fn summarize_text(&self, _text: &str, _bounds: LengthBounds) -> Result<String> {
            self.text_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.to_string())
        }
        async fn caption_image(
            &self,
            _image: &[u8],
            _mime: &str,
            _bounds: LengthBounds,
        ) -> Result<String> {
            self.image_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.to_string())
        }
    }

    fn recording(reply: &'static str) -> (Summarizer, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let text_calls = Arc::new(AtomicUsize::new(0));
        let image_calls = Arc::new(AtomicUsize::new(0));
        let backend = RecordingBackend {
            text_calls: text_calls.clone(),
            image_calls: image_calls.clone(),
            reply,
        };
        let summarizer =
            Summarizer::with_backend(Box::new(backend), &SummarizerConfig::default());
        (summarizer, text_calls, image_calls)
    }

    #[test]
    fn kind_dispatch_table() {
        assert_eq!(FileKind::from_mime("text/plain"), FileKind::PlainText);
        assert_eq!(FileKind::from_mime("text/x-python"), FileKind::SourceCode);
        assert_eq!(FileKind::from_mime("image/jpeg"), FileKind::Image);
        assert_eq!(FileKind::from_mime("image/png"), FileKind::Image);
        assert_eq!(FileKind::from_mime("text/markdown"), FileKind::Unsupported);
        assert_eq!(FileKind::from_mime("image/gif"), FileKind::Unsupported);
        assert_eq!(
            FileKind::from_mime("application/octet-stream"),
            FileKind::Unsupported
        );
    }

    #[tokio::test]
    async fn text_and_code_share_the_text_model() {
        let (s, text_calls, image_calls) = recording("a summary");
        assert_eq!(s.summarize("text/plain", b"hello").await.unwrap(), "a summary");
        assert_eq!(
            s.summarize("text/x-python", b"print(1)").await.unwrap(),
            "a summary"
        );
        assert_eq!(text_calls.load(Ordering::SeqCst), 2);
        assert_eq!(image_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn images_go_to_the_caption_model() {
        let (s, text_calls, image_calls) = recording("a caption");
        s.summarize("image/png", &[0x89, b'P', b'N', b'G'])
            .await
            .unwrap();
        s.summarize("image/jpeg", &[0xFF, 0xD8]).await.unwrap();
        assert_eq!(image_calls.load(Ordering::SeqCst), 2);
        assert_eq!(text_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsupported_types_get_the_placeholder() {
        let (s, text_calls, image_calls) = recording("unused");
        for t in ["text/markdown", "application/octet-stream", ""] {
            assert_eq!(s.summarize(t, b"data").await.unwrap(), UNSUPPORTED_SUMMARY);
        }
        assert_eq!(text_calls.load(Ordering::SeqCst), 0);
        assert_eq!(image_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blank_model_output_is_an_error() {
        let (s, _, _) = recording("   \n");
        assert!(s.summarize("text/plain", b"hello").await.is_err());
    }

    #[tokio::test]
    async fn invalid_utf8_is_decoded_lossily() {
        let (s, text_calls, _) = recording("ok");
        s.summarize("text/plain", &[0x66, 0x6f, 0xff, 0x6f])
            .await
            .unwrap();
        assert_eq!(text_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn truncate_keeps_leading_tokens() {
        assert_eq!(truncate_tokens("a b  c\nd", 3), "a b  c");
        assert_eq!(truncate_tokens("  one two", 1), "  one");
        assert_eq!(truncate_tokens("short", 10), "short");
        assert_eq!(truncate_tokens("", 4), "");
        assert_eq!(truncate_tokens("x y", 0), "");
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = SummarizerConfig {
            provider: "bart".to_string(),
            ..SummarizerConfig::default()
        };
        assert!(Summarizer::from_config(&config).is_err());
    }
}
