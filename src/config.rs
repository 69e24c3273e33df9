//! TOML configuration.
//!
//! Every section is optional. A missing config file yields [`Config::default`],
//! which stores the database at `database/chatbot.db` and summarizes through a
//! local Ollama instance.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    Path::new("database").join("chatbot.db")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Upper bound on a single request body, archives included.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}
fn default_max_upload_bytes() -> usize {
    64 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,
    #[serde(default = "default_text_min_tokens")]
    pub text_min_tokens: usize,
    #[serde(default = "default_text_max_tokens")]
    pub text_max_tokens: usize,
    #[serde(default = "default_image_min_tokens")]
    pub image_min_tokens: usize,
    #[serde(default = "default_image_max_tokens")]
    pub image_max_tokens: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_cache_summaries")]
    pub cache_summaries: bool,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            url: None,
            text_model: default_text_model(),
            image_model: default_image_model(),
            max_input_tokens: default_max_input_tokens(),
            text_min_tokens: default_text_min_tokens(),
            text_max_tokens: default_text_max_tokens(),
            image_min_tokens: default_image_min_tokens(),
            image_max_tokens: default_image_max_tokens(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            cache_summaries: default_cache_summaries(),
        }
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}
fn default_text_model() -> String {
    "llama3.2".to_string()
}
fn default_image_model() -> String {
    "llava".to_string()
}
fn default_max_input_tokens() -> usize {
    1024
}
fn default_text_min_tokens() -> usize {
    150
}
fn default_text_max_tokens() -> usize {
    300
}
fn default_image_min_tokens() -> usize {
    50
}
fn default_image_max_tokens() -> usize {
    150
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_cache_summaries() -> bool {
    true
}

/// Loads and validates the config at `path`.
///
/// A missing file is not an error: the defaults are returned instead, so
/// `pchat init` works in a fresh checkout.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let s = &config.summarizer;

    match s.provider.as_str() {
        "ollama" | "openai" | "extractive" => {}
        other => anyhow::bail!(
            "Unknown summarizer provider: '{}'. Must be ollama, openai, or extractive.",
            other
        ),
    }

    if s.max_input_tokens == 0 {
        anyhow::bail!("summarizer.max_input_tokens must be > 0");
    }
    if s.timeout_secs == 0 {
        anyhow::bail!("summarizer.timeout_secs must be > 0");
    }
    if s.text_min_tokens == 0 || s.text_min_tokens > s.text_max_tokens {
        anyhow::bail!("summarizer.text_min_tokens must be in 1..=text_max_tokens");
    }
    if s.image_min_tokens == 0 || s.image_min_tokens > s.image_max_tokens {
        anyhow::bail!("summarizer.image_min_tokens must be in 1..=image_max_tokens");
    }

    if config.server.max_upload_bytes == 0 {
        anyhow::bail!("server.max_upload_bytes must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("pchat.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_config(&tmp.path().join("nope.toml")).unwrap();
        assert_eq!(cfg.db.path, Path::new("database").join("chatbot.db"));
        assert_eq!(cfg.summarizer.provider, "ollama");
        assert_eq!(cfg.summarizer.max_input_tokens, 1024);
        assert_eq!(cfg.summarizer.text_max_tokens, 300);
        assert!(cfg.summarizer.cache_summaries);
    }

    #[test]
    fn partial_sections_fill_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[db]
path = "/tmp/x.db"

[summarizer]
provider = "extractive"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.db.path, PathBuf::from("/tmp/x.db"));
        assert_eq!(cfg.summarizer.provider, "extractive");
        assert_eq!(cfg.summarizer.image_min_tokens, 50);
        assert_eq!(cfg.server.bind, "127.0.0.1:8501");
    }

    #[test]
    fn rejects_unknown_provider() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[summarizer]\nprovider = \"bart\"\n");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("Unknown summarizer provider"));
    }

    #[test]
    fn rejects_inverted_bounds() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            "[summarizer]\ntext_min_tokens = 400\ntext_max_tokens = 300\n",
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[summarizer]\ntimeout_secs = 0\n");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }
}
