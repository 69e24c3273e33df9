//! Summaries from a local Ollama instance.
//!
//! Text goes to `text_model`; images go to `image_model` (a vision model such
//! as `llava`) as base64 in the `images` field of `/api/generate`.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;

use super::{post_json_with_retry, LengthBounds, SummaryBackend};
use crate::config::SummarizerConfig;

const DEFAULT_URL: &str = "http://localhost:11434";

pub struct OllamaBackend {
    client: reqwest::Client,
    url: String,
    text_model: String,
    image_model: String,
    max_retries: u32,
}

impl OllamaBackend {
    pub fn new(config: &SummarizerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            url,
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn generate(&self, body: serde_json::Value) -> Result<String> {
        let request = self.client.post(format!("{}/api/generate", self.url));
        let json = post_json_with_retry(request, &body, self.max_retries, "Ollama")
            .await
            .map_err(|e| anyhow!("{} (is Ollama running at {}?)", e, self.url))?;
        parse_generate_response(&json)
    }
}

#[async_trait]
impl SummaryBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn summarize_text(&self, text: &str, bounds: LengthBounds) -> Result<String> {
        let body = serde_json::json!({
            "model": self.text_model,
            "prompt": text_prompt(text, bounds),
            "stream": false,
            "options": { "num_predict": bounds.max_tokens },
        });
        self.generate(body).await
    }

    async fn caption_image(
        &self,
        image: &[u8],
        _mime: &str,
        bounds: LengthBounds,
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": self.image_model,
            "prompt": image_prompt(bounds),
            "images": [base64::engine::general_purpose::STANDARD.encode(image)],
            "stream": false,
            "options": { "num_predict": bounds.max_tokens },
        });
        self.generate(body).await
    }

    /// Asks Ollama to unload both models now instead of after its idle timeout.
    async fn shutdown(&self) -> Result<()> {
        let mut models = vec![self.text_model.as_str()];
        if self.image_model != self.text_model {
            models.push(self.image_model.as_str());
        }
        for model in models {
            if let Err(e) = self.unload(model).await {
                tracing::warn!(model, error = %e, "failed to unload Ollama model");
            }
        }
        Ok(())
    }
}

impl OllamaBackend {
    async fn unload(&self, model: &str) -> Result<()> {
        let body = serde_json::json!({ "model": model, "keep_alive": 0 });
        let resp = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Ollama unload error ({}): {}", status, text);
        }
        Ok(())
    }
}

pub(super) fn text_prompt(text: &str, bounds: LengthBounds) -> String {
    format!(
        "Summarize the following content in {} to {} tokens. \
         Reply with the summary only.\n\n{}",
        bounds.min_tokens, bounds.max_tokens, text
    )
}

pub(super) fn image_prompt(bounds: LengthBounds) -> String {
    format!(
        "Write a caption describing this image in {} to {} tokens. \
         Reply with the caption only.",
        bounds.min_tokens, bounds.max_tokens
    )
}

fn parse_generate_response(json: &serde_json::Value) -> Result<String> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing response field"))
}
