//! Question answering over stored files.
//!
//! [`QueryEngine::answer`] loads every stored file, summarizes each one, runs
//! the TF-IDF [`matcher`](crate::matcher) against the query, and formats the
//! winning file into a one-line answer.
//!
//! Summaries can be cached in memory. The cache key is a SHA-256 digest of the
//! file type and content. Stored rows never change, so an entry never goes
//! stale, and re-uploads of identical bytes share one entry.

use anyhow::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::matcher::{self, Candidate};
use crate::models::StoredFile;
use crate::store;
use crate::summarize::Summarizer;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("query must not be empty")]
    EmptyQuery,
    #[error("no files stored; upload files before asking")]
    NoFiles,
}

/// The answer to one query.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// `The question is related to '<file_name>' file. Here is a summary: <summary>`
    pub text: String,
    pub file_id: i64,
    pub file_name: String,
    pub summary: String,
    pub score: f64,
}

pub fn format_answer(file_name: &str, summary: &str) -> String {
    format!(
        "The question is related to '{}' file. Here is a summary: {}",
        file_name, summary
    )
}

/// A cached summary and the id of the file it was first produced for.
#[derive(Debug, Clone)]
struct CachedSummary {
    summary: String,
    first_file_id: i64,
}

pub struct QueryEngine {
    summarizer: Arc<Summarizer>,
    cache: Option<Mutex<HashMap<String, CachedSummary>>>,
}

impl QueryEngine {
    pub fn new(summarizer: Arc<Summarizer>, cache_summaries: bool) -> Self {
        Self {
            summarizer,
            cache: cache_summaries.then(|| Mutex::new(HashMap::new())),
        }
    }

    /// Answers `query` with the stored file whose summary matches it best.
    ///
    /// # Errors
    ///
    /// [`QueryError::EmptyQuery`] for a blank query, [`QueryError::NoFiles`]
    /// when nothing is stored, and any storage or model error as-is.
    pub async fn answer(&self, config: &Config, query: &str) -> Result<Answer> {
        if query.trim().is_empty() {
            return Err(QueryError::EmptyQuery.into());
        }

        let files = store::list_files(config).await?;
        if files.is_empty() {
            return Err(QueryError::NoFiles.into());
        }

        let mut candidates = Vec::with_capacity(files.len());
        for file in &files {
            candidates.push(Candidate {
                id: file.id,
                name: file.file_name.clone(),
                summary: self.summary_for(file).await?,
            });
        }

        let best = matcher::find_best_match(query, &candidates)?;
        tracing::info!(
            file_id = best.id,
            file_name = %best.name,
            score = best.score,
            candidates = candidates.len(),
            "answered query"
        );

        Ok(Answer {
            text: format_answer(&best.name, &best.summary),
            file_id: best.id,
            file_name: best.name,
            summary: best.summary,
            score: best.score,
        })
    }

    /// Name of the summarizer backend in use.
    pub fn provider(&self) -> &str {
        self.summarizer.backend_name()
    }

    /// Number of summaries currently cached.
    pub async fn cached_summaries(&self) -> usize {
        match &self.cache {
            Some(cache) => cache.lock().await.len(),
            None => 0,
        }
    }

    async fn summary_for(&self, file: &StoredFile) -> Result<String> {
        let Some(cache) = &self.cache else {
            return self
                .summarizer
                .summarize(&file.file_type, &file.file_content)
                .await;
        };

        let key = content_key(&file.file_type, &file.file_content);
        if let Some(hit) = cache.lock().await.get(&key) {
            tracing::debug!(
                file_id = file.id,
                first_file_id = hit.first_file_id,
                "summary cache hit"
            );
            return Ok(hit.summary.clone());
        }

        let summary = self
            .summarizer
            .summarize(&file.file_type, &file.file_content)
            .await?;
        // A concurrent query may have filled the key meanwhile; keep its producer.
        cache
            .lock()
            .await
            .entry(key)
            .or_insert_with(|| CachedSummary {
                summary: summary.clone(),
                first_file_id: file.id,
            });
        Ok(summary)
    }
}

fn content_key(file_type: &str, content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_type.as_bytes());
    hasher.update([0u8]);
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SummarizerConfig;
    use crate::migrate;
    use crate::summarize::{LengthBounds, SummaryBackend};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Uses the file text itself as its summary.
    struct EchoBackend {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SummaryBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }
        async fn summarize_text(&self, text: &str, _bounds: LengthBounds) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(text.to_string())
        }
        async fn caption_image(
            &self,
            _image: &[u8],
            _mime: &str,
            _bounds: LengthBounds,
        ) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("a photo of a red bicycle".to_string())
        }
    }

    async fn setup(cache: bool) -> (TempDir, Config, QueryEngine, Arc<AtomicUsize>) {
        let tmp = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.db.path = tmp.path().join("chatbot.db");
        migrate::run_migrations(&cfg).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let backend = EchoBackend {
            calls: calls.clone(),
        };
        let summarizer =
            Summarizer::with_backend(Box::new(backend), &SummarizerConfig::default());
        let engine = QueryEngine::new(Arc::new(summarizer), cache);
        (tmp, cfg, engine, calls)
    }

    #[tokio::test]
    async fn answer_names_the_matching_file() {
        let (_tmp, cfg, engine, _) = setup(false).await;
        store::insert_file(&cfg, "pie.txt", "text/plain", b"apple pie recipe")
            .await
            .unwrap();
        store::insert_file(&cfg, "rocket.txt", "text/plain", b"rocket engine design")
            .await
            .unwrap();

        let answer = engine.answer(&cfg, "how to bake a cake").await.unwrap();
        assert_eq!(answer.file_name, "pie.txt");
        assert_eq!(
            answer.text,
            "The question is related to 'pie.txt' file. Here is a summary: apple pie recipe"
        );

        let answer = engine.answer(&cfg, "engine design").await.unwrap();
        assert_eq!(answer.file_name, "rocket.txt");
        assert!(answer.score > 0.0);
    }

    #[tokio::test]
    async fn images_and_unsupported_files_take_part() {
        let (_tmp, cfg, engine, _) = setup(false).await;
        store::insert_file(&cfg, "notes.md", "text/markdown", b"bicycle notes")
            .await
            .unwrap();
        store::insert_file(&cfg, "bike.png", "image/png", b"\x89PNG")
            .await
            .unwrap();

        let answer = engine.answer(&cfg, "red bicycle").await.unwrap();
        assert_eq!(answer.file_name, "bike.png");

        let answer = engine.answer(&cfg, "unsupported type").await.unwrap();
        assert_eq!(answer.file_name, "notes.md");
        assert_eq!(answer.summary, "Unsupported file type for summarization.");
    }

    #[tokio::test]
    async fn empty_store_is_an_error() {
        let (_tmp, cfg, engine, _) = setup(true).await;
        let err = engine.answer(&cfg, "anything").await.unwrap_err();
        assert_eq!(err.downcast_ref::<QueryError>(), Some(&QueryError::NoFiles));
    }

    #[tokio::test]
    async fn blank_query_is_an_error() {
        let (_tmp, cfg, engine, _) = setup(true).await;
        store::insert_file(&cfg, "a.txt", "text/plain", b"a file")
            .await
            .unwrap();
        let err = engine.answer(&cfg, "   ").await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<QueryError>(),
            Some(&QueryError::EmptyQuery)
        );
    }

    #[tokio::test]
    async fn uncached_engine_resummarizes_every_query() {
        let (_tmp, cfg, engine, calls) = setup(false).await;
        store::insert_file(&cfg, "a.txt", "text/plain", b"alpha")
            .await
            .unwrap();
        store::insert_file(&cfg, "b.txt", "text/plain", b"beta")
            .await
            .unwrap();

        engine.answer(&cfg, "alpha").await.unwrap();
        engine.answer(&cfg, "beta").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(engine.cached_summaries().await, 0);
    }

    #[tokio::test]
    async fn cache_reuses_summaries_across_queries_and_duplicates() {
        let (_tmp, cfg, engine, calls) = setup(true).await;
        store::insert_file(&cfg, "a.txt", "text/plain", b"alpha")
            .await
            .unwrap();
        store::insert_file(&cfg, "copy-of-a.txt", "text/plain", b"alpha")
            .await
            .unwrap();

        engine.answer(&cfg, "alpha").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store::insert_file(&cfg, "b.txt", "text/plain", b"beta")
            .await
            .unwrap();
        let answer = engine.answer(&cfg, "beta").await.unwrap();
        assert_eq!(answer.file_name, "b.txt");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(engine.cached_summaries().await, 2);
    }

    #[tokio::test]
    async fn cache_records_first_producing_file() {
        let (_tmp, cfg, engine, _) = setup(true).await;
        let first = store::insert_file(&cfg, "a.txt", "text/plain", b"alpha")
            .await
            .unwrap();
        store::insert_file(&cfg, "copy-of-a.txt", "text/plain", b"alpha")
            .await
            .unwrap();

        engine.answer(&cfg, "alpha").await.unwrap();

        let cache = engine.cache.as_ref().unwrap().lock().await;
        let entry = cache.get(&content_key("text/plain", b"alpha")).unwrap();
        assert_eq!(entry.first_file_id, first);
        assert_eq!(entry.summary, "alpha");
    }

    #[test]
    fn content_key_separates_types() {
        assert_ne!(
            content_key("text/plain", b"same"),
            content_key("text/x-python", b"same")
        );
        assert_eq!(content_key("text/plain", b"x"), content_key("text/plain", b"x"));
    }
}
