//! # Project Chat
//!
//! A local file store that answers questions about its contents.
//!
//! Users upload project files (text, code, markdown, images, zip archives)
//! into a SQLite database. Asking a question summarizes every stored file with
//! a pretrained model, matches the question against those summaries with
//! TF-IDF cosine similarity, and answers with the best file and its summary.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────┐
//! │    Ingest    │──▶│  SQLite  │
//! │ files + zips │   │  Files   │
//! └──────────────┘   └────┬─────┘
//!                         ▼
//!                  ┌─────────────┐   ┌──────────┐
//!   query ───────▶ │ Summarizer  │──▶│ Matcher  │──▶ answer
//!                  │ text/image  │   │  TF-IDF  │
//!                  └─────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pchat init                       # create database
//! pchat upload notes.txt app.py    # store files (zips are expanded)
//! pchat ask "how is auth handled?"
//! pchat serve                      # web page + JSON API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`store`] | `Files` table reads and writes |
//! | [`mime`] | Filename-based MIME policy |
//! | [`ingest`] | File and archive uploads |
//! | [`summarize`] | Summary backends (Ollama, OpenAI, extractive) |
//! | [`matcher`] | TF-IDF similarity matching |
//! | [`query`] | Question answering |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod ingest;
pub mod matcher;
pub mod migrate;
pub mod mime;
pub mod models;
pub mod query;
pub mod server;
pub mod store;
pub mod summarize;
