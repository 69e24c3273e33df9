//! Summaries from the OpenAI chat completions API (or any compatible server).
//!
//! Requires `OPENAI_API_KEY`. Images are sent inline as base64 `data:` URLs,
//! so `image_model` must accept image input.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;

use super::ollama::{image_prompt, text_prompt};
use super::{post_json_with_retry, LengthBounds, SummaryBackend};
use crate::config::SummarizerConfig;

const DEFAULT_URL: &str = "https://api.openai.com";

pub struct OpenAIBackend {
    client: reqwest::Client,
    url: String,
    api_key: String,
    text_model: String,
    image_model: String,
    max_retries: u32,
}

impl OpenAIBackend {
    /// # Errors
    ///
    /// Returns an error if `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &SummarizerConfig) -> Result<Self> {
        let api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => key,
            _ => bail!("OPENAI_API_KEY environment variable not set"),
        };
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
            api_key,
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn complete(&self, body: serde_json::Value) -> Result<String> {
        let request = self
            .client
            .post(format!("{}/v1/chat/completions", self.url))
            .header("Authorization", format!("Bearer {}", self.api_key));
        let json = post_json_with_retry(request, &body, self.max_retries, "OpenAI").await?;
        parse_chat_response(&json)
    }
}

#[async_trait]
impl SummaryBackend for OpenAIBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn summarize_text(&self, text: &str, bounds: LengthBounds) -> Result<String> {
        let body = serde_json::json!({
            "model": self.text_model,
            "max_tokens": bounds.max_tokens,
            "messages": [
                { "role": "user", "content": text_prompt(text, bounds) }
            ],
        });
        self.complete(body).await
    }

    async fn caption_image(&self, image: &[u8], mime: &str, bounds: LengthBounds) -> Result<String> {
        let data_url = format!(
            "data:{};base64,{}",
            mime,
            base64::engine::general_purpose::STANDARD.encode(image)
        );
        let body = serde_json::json!({
            "model": self.image_model,
            "max_tokens": bounds.max_tokens,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": image_prompt(bounds) },
                    { "type": "image_url", "image_url": { "url": data_url } }
                ]
            }],
        });
        self.complete(body).await
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.pointer("/message/content"))
        .and_then(|content| content.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}
