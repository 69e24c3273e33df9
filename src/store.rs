//! Persistence for uploaded files.
//!
//! A single flat table (`Files`) created by [`crate::migrate::run_migrations`].
//! Each operation opens the database, does its work, and closes it again.

use anyhow::Result;
use chrono::Local;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::models::{FileInfo, StoredFile};

/// Format of the `upload_date` column.
pub const UPLOAD_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Inserts one file stamped with the current local time and returns its id.
pub async fn insert_file(
    config: &Config,
    file_name: &str,
    file_type: &str,
    content: &[u8],
) -> Result<i64> {
    let pool = db::connect(config).await?;
    let upload_date = Local::now().format(UPLOAD_DATE_FORMAT).to_string();

    let result = sqlx::query(
        "INSERT INTO Files (file_name, file_type, upload_date, file_content) VALUES (?, ?, ?, ?)",
    )
    .bind(file_name)
    .bind(file_type)
    .bind(&upload_date)
    .bind(content)
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(result.last_insert_rowid())
}

/// Returns every stored file, content included, in id order.
pub async fn list_files(config: &Config) -> Result<Vec<StoredFile>> {
    let pool = db::connect(config).await?;

    let rows = sqlx::query(
        "SELECT id, file_name, file_type, upload_date, file_content FROM Files ORDER BY id ASC",
    )
    .fetch_all(&pool)
    .await?;

    pool.close().await;

    Ok(rows
        .iter()
        .map(|row| StoredFile {
            id: row.get("id"),
            file_name: text_column(row, "file_name"),
            file_type: text_column(row, "file_type"),
            upload_date: text_column(row, "upload_date"),
            file_content: row
                .get::<Option<Vec<u8>>, _>("file_content")
                .unwrap_or_default(),
        })
        .collect())
}

/// Lists file metadata without loading the blobs.
pub async fn list_file_info(config: &Config) -> Result<Vec<FileInfo>> {
    let pool = db::connect(config).await?;

    let rows = sqlx::query(
        "SELECT id, file_name, file_type, upload_date, COALESCE(length(file_content), 0) AS size_bytes \
         FROM Files ORDER BY id ASC",
    )
    .fetch_all(&pool)
    .await?;

    pool.close().await;

    Ok(rows
        .iter()
        .map(|row| FileInfo {
            id: row.get("id"),
            file_name: text_column(row, "file_name"),
            file_type: text_column(row, "file_type"),
            upload_date: text_column(row, "upload_date"),
            size_bytes: row.get("size_bytes"),
        })
        .collect())
}

pub async fn count_files(config: &Config) -> Result<i64> {
    let pool = db::connect(config).await?;
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Files")
        .fetch_one(&pool)
        .await?;
    pool.close().await;
    Ok(count)
}

// The table declares its text columns nullable; rows written elsewhere may hold NULLs.
fn text_column(row: &SqliteRow, name: &str) -> String {
    row.get::<Option<String>, _>(name).unwrap_or_default()
}
