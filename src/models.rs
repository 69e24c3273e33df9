//! Core data models used throughout Project Chat.
//!
//! A [`StoredFile`] is one uploaded file as persisted in the `Files` table.
//! Rows are written once and never updated or deleted.

use serde::Serialize;

/// One uploaded file, including its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub id: i64,
    pub file_name: String,
    pub file_type: String,
    /// Local time, `YYYY-MM-DD HH:MM:SS`.
    pub upload_date: String,
    pub file_content: Vec<u8>,
}

/// A stored file's metadata without its content, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub id: i64,
    pub file_name: String,
    pub file_type: String,
    pub upload_date: String,
    pub size_bytes: i64,
}

/// Result of inserting one file through the ingress layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    pub id: i64,
    pub file_name: String,
    pub file_type: String,
}
