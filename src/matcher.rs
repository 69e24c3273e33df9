//! TF-IDF similarity matching between a query and file summaries.
//!
//! The vector space is fitted over the query together with every candidate
//! summary, then each candidate is scored by cosine similarity against the
//! query vector. Weighting follows the common TF-IDF vectorizer defaults:
//!
//! - tokens: lowercase, pattern `(?u)\b\w\w+\b` (words of two or more chars)
//! - tf: raw term count
//! - idf: `ln((1 + n) / (1 + df)) + 1` (smoothed)
//! - each document vector is L2-normalized
//!
//! There is no minimum score. [`find_best_match`] always returns a candidate
//! when at least one exists, even if every score is zero.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?u)\b\w\w+\b").expect("token pattern is a valid regex")
});

/// A stored file's summary offered to the matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: i64,
    pub name: String,
    pub summary: String,
}

/// The winning candidate and the scores that picked it.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub id: i64,
    pub name: String,
    pub summary: String,
    pub score: f64,
    /// Cosine similarity of every candidate, in candidate order.
    pub scores: Vec<f64>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("no candidates to match against")]
    NoCandidates,
}

/// Returns the candidate whose summary is most similar to `query`.
///
/// Ties on the maximum score go to the earliest candidate.
pub fn find_best_match(query: &str, candidates: &[Candidate]) -> Result<Match, MatchError> {
    if candidates.is_empty() {
        return Err(MatchError::NoCandidates);
    }

    let mut documents: Vec<&str> = Vec::with_capacity(candidates.len() + 1);
    documents.push(query);
    documents.extend(candidates.iter().map(|c| c.summary.as_str()));

    let vectors = tfidf_vectors(&documents);
    let (query_vec, candidate_vecs) = vectors
        .split_first()
        .ok_or(MatchError::NoCandidates)?;

    let scores: Vec<f64> = candidate_vecs
        .iter()
        .map(|v| cosine_similarity(query_vec, v))
        .collect();

    let mut best = 0;
    for (i, score) in scores.iter().enumerate().skip(1) {
        if *score > scores[best] {
            best = i;
        }
    }

    let winner = &candidates[best];
    Ok(Match {
        id: winner.id,
        name: winner.name.clone(),
        summary: winner.summary.clone(),
        score: scores[best],
        scores,
    })
}

/// Splits text into lowercase word tokens of at least two characters.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Fits a vocabulary over `documents` and returns one L2-normalized TF-IDF
/// vector per document, in input order.
pub fn tfidf_vectors(documents: &[&str]) -> Vec<Vec<f64>> {
    let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d)).collect();

    // Sorted vocabulary keeps column order, and so float summation order, stable.
    let mut vocabulary: BTreeMap<&str, usize> = BTreeMap::new();
    for tokens in &tokenized {
        for token in tokens {
            vocabulary.entry(token.as_str()).or_insert(0);
        }
    }
    for (column, index) in vocabulary.values_mut().enumerate() {
        *index = column;
    }

    let width = vocabulary.len();
    let mut counts = vec![vec![0.0f64; width]; tokenized.len()];
    let mut document_frequency = vec![0usize; width];

    for (row, tokens) in tokenized.iter().enumerate() {
        for token in tokens {
            counts[row][vocabulary[token.as_str()]] += 1.0;
        }
        for (column, count) in counts[row].iter().enumerate() {
            if *count > 0.0 {
                document_frequency[column] += 1;
            }
        }
    }

    let n = tokenized.len() as f64;
    let idf: Vec<f64> = document_frequency
        .iter()
        .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
        .collect();

    for row in counts.iter_mut() {
        for (value, weight) in row.iter_mut().zip(&idf) {
            *value *= weight;
        }
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in row.iter_mut() {
                *value /= norm;
            }
        }
    }

    counts
}

/// Cosine similarity of two equal-length vectors; `0.0` if either is all zeros.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON {
        return 0.0;
    }
    dot / denom
}
